use std::ops::{Index, IndexMut};
use std::path::Path;

use flate2::Compression;
use ndarray::{Array3, ArrayD, ArrayView, ArrayViewMut, Axis, Ix2, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::gray::*;
use crate::{Idx2d, Idx3d, Predicate};

mod components;
mod snapshot;

pub use snapshot::SliceSnapshot;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// nii 格式 3D MRI 扫描, 包括 header 和体素强度. 强度值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct MrScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 丢弃末尾的单例通道维 (形如 \[W, H, z, 1\] 的第四维).
fn drop_trailing_channels<T>(mut data: ArrayD<T>) -> ArrayD<T> {
    while data.ndim() > 3 && data.len_of(Axis(data.ndim() - 1)) == 1 {
        let last = Axis(data.ndim() - 1);
        data = data.index_axis_move(last, 0);
    }
    data
}

/// 3D MRI nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    ///
    /// 该值也可以通过 `self.{z_mm, height_mm, width_mm}` 分别获取.
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取 width 方向 (自然 2D 图像的水平方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.header().pixdim[1] as f64
    }

    /// 获取 height 方向 (自然 2D 图像的垂直方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.header().pixdim[2] as f64
    }

    /// 获取空间方向 (相邻 2D 切片的方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.header().pixdim[3] as f64
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [z, h, w] = self.pix_dim();
        z == h && z == w
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

impl NiftiHeaderAttr for MrScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MrScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for MrScan {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl MrScan {
    /// 打开 nii 文件格式的 3D MRI 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = drop_trailing_channels(obj.into_volume().into_ndarray()?)
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<f32>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 根据裸强度数据和体素间距直接创建 `MrScan` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 \[z, h, w\] 组织.
    /// 2. `pix_dim` 按照 \[z, h, w\] 排列, 与 [`NiftiHeaderAttr::pix_dim`] 一致.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<f32>, pix_dim: [f32; 3]) -> Self {
        let (z, h, w) = data.dim();
        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
        let [pz, ph, pw] = pix_dim;
        header.pixdim = [1.0, pw, ph, pz, 0.0, 0.0, 0.0, 0.0];
        header.intent_name[..4].copy_from_slice(b"fake");
        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView<'_, f32, Ix2> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代 3D 扫描水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView<'_, f32, Ix2>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, f32, Ix3> {
        self.data.view_mut()
    }

    /// 取出体素数据, 丢弃 header.
    #[inline]
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    /// 获取严格正值体素的个数.
    #[inline]
    pub fn positive_count(&self) -> usize {
        self.data.iter().filter(|v| **v > 0.0).count()
    }

    /// 按行优先序收集所有严格正值体素.
    pub fn positive_values(&self) -> Vec<f32> {
        self.data.iter().copied().filter(|v| *v > 0.0).collect()
    }

    /// 计算所有严格正值体素的 (均值, 总体标准差).
    ///
    /// 若不存在严格正值体素, 则返回 `None`.
    pub fn positive_statistics(&self) -> Option<(f64, f64)> {
        let mut count = 0u64;
        let mut sum = 0.0f64;
        for v in self.data.iter().filter(|v| **v > 0.0) {
            count += 1;
            sum += *v as f64;
        }
        if count == 0 {
            return None;
        }

        let mean = sum / count as f64;
        let mut acc = 0.0f64;
        for v in self.data.iter().filter(|v| **v > 0.0) {
            let diff = *v as f64 - mean;
            acc += diff * diff;
        }
        Some((mean, (acc / count as f64).sqrt()))
    }
}

/// nii 格式 3D 二值标注, 包括 header 和真值标签. 标签值以 `u8` 保存.
#[derive(Debug, Clone)]
pub struct MrMask {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl NiftiHeaderAttr for MrMask {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for MrMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for MrMask {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl MrMask {
    /// 打开 nii 文件格式的 3D 二值标注. `path` 为 nii 文件的本地路径. 如果打开成功,
    /// 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W]
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = drop_trailing_channels(obj.into_volume().into_ndarray::<u8>()?)
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<u8>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 根据裸标签数据和体素间距直接创建 `MrMask` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 \[z, h, w\] 组织, 内部体素值必须为 0 或 1.
    ///   否则程序行为未定义.
    /// 2. `pix_dim` 按照 \[z, h, w\] 排列, 与 [`NiftiHeaderAttr::pix_dim`] 一致.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<u8>, pix_dim: [f32; 3]) -> Self {
        let (z, h, w) = data.dim();
        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
        let [pz, ph, pw] = pix_dim;
        header.pixdim = [1.0, pw, ph, pz, 0.0, 0.0, 0.0, 0.0];
        header.intent_name[..4].copy_from_slice(b"fake");
        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获取 3D 标注 z 空间的第 `z_index` 层不可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView<'_, u8, Ix2> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代 3D 标注水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView<'_, u8, Ix2>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, u8, Ix3> {
        self.data.view_mut()
    }

    /// 获取 3D 标注中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取标注的基本统计信息.
    ///
    /// 统计信息格式为: \[背景体素数, 病灶体素数\].
    /// 该操作不会统计任何其他体素信息.
    pub fn numeric_statistics(&self) -> [usize; 2] {
        let mut ans = [0; 2];
        for pixel in self.data.iter().filter(|p| **p <= 1) {
            ans[*pixel as usize] += 1;
        }
        ans
    }

    /// 将 3D 标注中值为 `old` 的体素全部替换为 `new`.
    ///
    /// 返回总共成功替换的个数.
    pub fn replace(&mut self, old: u8, new: u8) -> usize {
        let mut cnt = 0usize;
        self.data_mut()
            .iter_mut()
            .filter(|pix| **pix == old)
            .for_each(|p| {
                cnt += 1;
                *p = new;
            });
        cnt
    }

    /// 收集满足谓词 `pred` 的所有体素对应的下标, 结果按行优先存储.
    pub fn filter_pos(&self, pred: Predicate) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(ref pos, pixel)| pred(*pixel).then_some(*pos))
            .collect()
    }

    /// 收集所有病灶体素对应的下标. 结果按行优先存储.
    #[inline]
    pub fn lesion_pos(&self) -> Vec<Idx3d> {
        self.filter_pos(is_lesion)
    }

    /// 获取 `pos` 前后上下左右六个点的坐标.
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    fn diamond_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        self.check_collect([
            (z.wrapping_sub(1), h, w),
            (z.saturating_add(1), h, w),
            (z, h.wrapping_sub(1), w),
            (z, h.saturating_add(1), w),
            (z, h, w.wrapping_sub(1)),
            (z, h, w.saturating_add(1)),
        ])
    }

    /// 收集 `data` 中不越界的索引.
    #[inline]
    fn check_collect<B: FromIterator<Idx3d>, const N: usize>(&self, data: [Idx3d; N]) -> B {
        data.into_iter().filter(|p| self.check(p)).collect()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl MrMask {
    /// 借助 `rayon`, 并行地对 3D 标注每个水平不可变切片实施 `op` 操作.
    pub fn par_for_each_slice<F>(&self, op: F)
    where
        F: Fn(ArrayView<'_, u8, Ix2>) + Sync + Send,
    {
        self.data()
            .axis_iter(Axis(0))
            .into_par_iter()
            .for_each(|v| {
                op(v);
            });
    }

    /// 借助 `rayon`, 并行地获取 3D 标注中值为 `label` 的体素个数.
    pub fn par_count(&self, label: u8) -> usize {
        let cnt = AtomicUsize::new(0);
        self.par_for_each_slice(|sli| {
            let local = sli.iter().filter(|p| **p == label).count();
            cnt.fetch_add(local, Ordering::Release);
        });
        cnt.load(Ordering::Acquire)
    }
}

/// 按文件名对摄入体数据的分类.
///
/// 文件名 (不含目录部分) 小写后含有 `mask` 或 `wmh` 子串的文件视为二值掩膜,
/// 其余文件视为强度图像 (T1, FLAIR 等).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VolumeKind {
    /// 强度图像. 参与颅骨剥离与 z-score 标准化.
    Intensity,

    /// 二值掩膜. 跳过强度变换, 重采样后做阈值二值化.
    Mask,
}

impl VolumeKind {
    /// 由 `path` 末级文件名推断体数据类型. 目录部分不参与判断.
    pub fn from_filename<P: AsRef<Path>>(path: P) -> Self {
        let name = match path.as_ref().file_name() {
            Some(name) => name.to_string_lossy().to_lowercase(),
            None => return Self::Intensity,
        };
        if name.contains("mask") || name.contains("wmh") {
            Self::Mask
        } else {
            Self::Intensity
        }
    }

    /// 是否为二值掩膜?
    #[inline]
    pub const fn is_mask(self) -> bool {
        matches!(self, Self::Mask)
    }

    /// 是否为强度图像?
    #[inline]
    pub const fn is_intensity(self) -> bool {
        matches!(self, Self::Intensity)
    }
}

/// nii 格式的单个 3D MRI 体数据文件, 连同其摄入分类.
///
/// 该结构完全透明, 仅包含两个公开的 `scan` 和 `kind` 子结构,
/// 用户可以直接使用它们来实现相关上层功能.
#[derive(Debug, Clone)]
pub struct MrVolume {
    /// 体素数据本体. 无论摄入分类如何, 均以 `f32` 读取.
    pub scan: MrScan,

    /// 按文件名推断的体数据类型.
    pub kind: VolumeKind,
}

impl MrVolume {
    /// 打开 nii 文件格式的 3D MRI 体数据文件, 并按文件名推断其分类.
    /// 如果文件打开失败, 则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let kind = VolumeKind::from_filename(path.as_ref());
        let scan = MrScan::open(path)?;
        Ok(Self { scan, kind })
    }

    /// 该体数据是否为二值掩膜?
    #[inline]
    pub fn is_mask(&self) -> bool {
        self.kind.is_mask()
    }
}

/// 构造规范输出 header: 单位体素间距, 单位 sform 仿射矩阵.
///
/// 预处理输出有意不保留输入的几何信息, 下游训练不消费它们.
fn canonical_header() -> NiftiHeader {
    let mut header = NiftiHeader::default();
    header.pixdim = [1.0; 8];
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;
    header.qform_code = 0;
    header.sform_code = 2;
    header.srow_x = [1.0, 0.0, 0.0, 0.0];
    header.srow_y = [0.0, 1.0, 0.0, 0.0];
    header.srow_z = [0.0, 0.0, 1.0, 0.0];
    header
}

/// 将 \[z, H, W\] 排列的 `f32` 体数据以规范格式写出到 `path`.
///
/// 输出文件携带单位体素间距与单位 sform 仿射矩阵
/// (参见 [`save_canonical_u8`]). 当 `path` 以 `.gz` 结尾时输出会被压缩.
/// `path` 所在目录必须已存在.
pub fn save_canonical_f32<P: AsRef<Path>>(path: P, data: &Array3<f32>) -> nifti::Result<()> {
    // [z, H, W] -> [W, H, z]. 与读入时的转置互逆, 保持落盘惯例不变.
    let disk_view = data.view().permuted_axes([2, 1, 0]);
    WriterOptions::new(path.as_ref())
        .reference_header(&canonical_header())
        .compression_level(Compression::default())
        .write_nifti(&disk_view)
}

/// 将 \[z, H, W\] 排列的 `u8` 体数据以规范格式写出到 `path`.
///
/// 输出文件携带单位体素间距与单位 sform 仿射矩阵:
/// 体素坐标即世界坐标, 原始扫描的方向与间距信息被有意丢弃.
/// 当 `path` 以 `.gz` 结尾时输出会被压缩. `path` 所在目录必须已存在.
pub fn save_canonical_u8<P: AsRef<Path>>(path: P, data: &Array3<u8>) -> nifti::Result<()> {
    // [z, H, W] -> [W, H, z]. 与读入时的转置互逆, 保持落盘惯例不变.
    let disk_view = data.view().permuted_axes([2, 1, 0]);
    WriterOptions::new(path.as_ref())
        .reference_header(&canonical_header())
        .compression_level(Compression::default())
        .write_nifti(&disk_view)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn float_eq(f1: f64, f2: f64) -> bool {
        (f1 - f2).abs() < 1e-6
    }

    fn demo_scan() -> MrScan {
        let data = array![
            [[0.0f32, 10.0], [20.0, 0.0]],
            [[0.0, 40.0], [0.0, -5.0]],
            [[30.0, 0.0], [0.0, 0.0]],
        ];
        MrScan::fake(data, [3.0, 1.0, 1.0])
    }

    #[test]
    fn fake_scan_header_attrs() {
        let scan = demo_scan();
        assert!(scan.is_faked());
        assert_eq!(scan.shape(), (3, 2, 2));
        assert_eq!(scan.slice_shape(), (2, 2));
        assert_eq!(scan.len_z(), 3);
        assert_eq!(scan.size(), 12);
        assert!(scan.check(&(2, 1, 1)));
        assert!(!scan.check(&(3, 0, 0)));
        assert!(float_eq(scan.z_mm(), 3.0));
        assert!(float_eq(scan.height_mm(), 1.0));
        assert!(float_eq(scan.width_mm(), 1.0));
        assert!(!scan.is_isotropic());
        assert!(float_eq(scan.voxel(), 3.0));
    }

    #[test]
    fn positive_statistics_ignores_non_positive() {
        let scan = demo_scan();
        assert_eq!(scan.positive_count(), 4);
        assert_eq!(scan.positive_values(), vec![10.0, 20.0, 40.0, 30.0]);

        // 正值为 {10, 20, 40, 30}: 均值 25, 总体方差 125.
        let (mean, std) = scan.positive_statistics().unwrap();
        assert!(float_eq(mean, 25.0));
        assert!(float_eq(std, 125.0f64.sqrt()));
    }

    #[test]
    fn positive_statistics_of_blank_volume() {
        let scan = MrScan::fake(Array3::zeros((2, 2, 2)), [1.0, 1.0, 1.0]);
        assert_eq!(scan.positive_count(), 0);
        assert!(scan.positive_statistics().is_none());
    }

    #[test]
    fn mask_statistics() {
        let data = array![[[0u8, 1], [1, 0]], [[0, 0], [1, 0]]];
        let mut mask = MrMask::fake(data, [1.0, 1.0, 1.0]);
        assert_eq!(mask.count(1), 3);
        assert_eq!(mask.numeric_statistics(), [5, 3]);
        assert_eq!(mask.lesion_pos(), vec![(0, 0, 1), (0, 1, 0), (1, 1, 0)]);
        assert_eq!(mask.replace(1, 0), 3);
        assert_eq!(mask.count(1), 0);
    }

    #[test]
    fn volume_kind_from_filename() {
        use VolumeKind::*;

        assert_eq!(VolumeKind::from_filename("T1.nii.gz"), Intensity);
        assert_eq!(VolumeKind::from_filename("FLAIR.nii.gz"), Intensity);
        assert_eq!(VolumeKind::from_filename("wmh.nii.gz"), Mask);
        assert_eq!(VolumeKind::from_filename("WMH_seg.nii.gz"), Mask);
        assert_eq!(VolumeKind::from_filename("brain_MASK.nii.gz"), Mask);

        // 只看末级文件名, 目录部分不参与判断.
        assert_eq!(VolumeKind::from_filename("masks/T1.nii.gz"), Intensity);
        assert!(Mask.is_mask());
        assert!(Intensity.is_intensity());
    }

    #[test]
    fn save_then_open_roundtrip_f32() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.nii.gz");

        let scan = demo_scan();
        save_canonical_f32(&path, &scan.data().to_owned()).unwrap();

        let back = MrScan::open(&path).unwrap();
        assert_eq!(back.shape(), scan.shape());
        assert!(back
            .data()
            .iter()
            .zip(scan.data().iter())
            .all(|(a, b)| a == b));

        // 规范输出具有单位体素间距.
        assert_eq!(back.pix_dim(), [1.0, 1.0, 1.0]);
        assert_eq!(back.header().sform_code, 2);
    }

    #[test]
    fn save_then_open_roundtrip_u8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.nii.gz");

        let data = array![[[0u8, 1], [1, 0]], [[1, 1], [0, 0]]];
        save_canonical_u8(&path, &data).unwrap();

        let back = MrMask::open(&path).unwrap();
        assert_eq!(back.shape(), (2, 2, 2));
        assert_eq!(back.count(1), 4);
        assert_eq!(back.data(), data.view());
    }

    #[test]
    fn trailing_channel_axis_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channel.nii.gz");

        // 磁盘布局 [W, H, z, 1], 读入后应得到 [z, H, W].
        let mut disk = ndarray::Array4::<f32>::zeros((4, 3, 2, 1));
        disk[(3, 2, 1, 0)] = 7.0;
        WriterOptions::new(&path).write_nifti(&disk).unwrap();

        let scan = MrScan::open(&path).unwrap();
        assert_eq!(scan.shape(), (2, 3, 4));
        assert_eq!(scan[(1, 2, 3)], 7.0);
        assert_eq!(scan.positive_count(), 1);
    }

    #[test]
    fn volume_open_classifies_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wmh.nii.gz");

        let data = array![[[0.0f32, 1.0], [1.0, 0.0]]];
        save_canonical_f32(&path, &data).unwrap();

        let volume = MrVolume::open(&path).unwrap();
        assert!(volume.is_mask());
        assert_eq!(volume.scan.shape(), (1, 2, 2));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn par_count_matches_sequential() {
        let data = Array3::from_shape_fn((6, 5, 4), |(z, h, w)| ((z + h + w) % 2) as u8);
        let mask = MrMask::fake(data, [1.0, 1.0, 1.0]);
        assert_eq!(mask.par_count(1), mask.count(1));
    }
}
