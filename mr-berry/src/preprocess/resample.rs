//! 三次插值重采样.

use ndarray::{Array3, ArrayView, Axis, Ix3};
use num::Float;

use crate::{Idx3d, MrScan, NiftiHeaderAttr};

/// Catmull-Rom 核在 `t` 处的四个抽头权重, `t` 属于 `[0, 1)`.
///
/// 四个权重之和恒为 1, 且在 `t = 0` 处退化为原样采样.
#[inline]
fn cubic_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ]
}

macro_rules! impl_zoom {
    ($fp: ty) => {
        impl<'a> ZoomImp<'a, $fp> {
            /// 由逐轴缩放系数构造. 目标尺寸为 `round(原尺寸 * 系数)`.
            pub fn from_scale(data: ArrayView<'a, $fp, Ix3>, scale: [f64; 3]) -> Self {
                assert!(
                    scale.iter().all(|s| s.is_finite() && *s > 0.0),
                    "逐轴缩放系数必须为正有限值"
                );
                let (z, h, w) = data.dim();
                let [sz, sh, sw] = scale;
                let target = (
                    (z as f64 * sz).round() as usize,
                    (h as f64 * sh).round() as usize,
                    (w as f64 * sw).round() as usize,
                );
                Self::from_target(data, target)
            }

            /// 由确定的目标尺寸构造.
            #[inline]
            pub fn from_target(data: ArrayView<'a, $fp, Ix3>, target: Idx3d) -> Self {
                Self { data, target }
            }

            /// 逐轴执行可分离的三次插值, 返回目标尺寸的新体数据.
            pub fn run(self) -> Array3<$fp> {
                let (tz, th, tw) = self.target;
                assert!(tz * th * tw > 0, "目标尺寸不能为零");

                let mut cur = self.data.to_owned();
                for (axis, n_out) in [(Axis(0), tz), (Axis(1), th), (Axis(2), tw)] {
                    if cur.len_of(axis) != n_out {
                        cur = Self::zoom_axis(&cur, axis, n_out);
                    }
                }
                cur
            }

            /// 沿 `axis` 方向将 `src` 插值到 `n_out` 层.
            ///
            /// 输出第 `j` 层对应输入坐标 `j * (n_in - 1) / (n_out - 1)`,
            /// 两端网格点对齐; 越界抽头按边缘复制处理.
            fn zoom_axis(src: &Array3<$fp>, axis: Axis, n_out: usize) -> Array3<$fp> {
                let n_in = src.len_of(axis);
                debug_assert!(n_in > 0 && n_out > 0);

                let mut out_dim = src.raw_dim();
                out_dim[axis.index()] = n_out;
                let mut out = Array3::<$fp>::zeros(out_dim);

                let step = if n_out > 1 {
                    (n_in as f64 - 1.0) / (n_out as f64 - 1.0)
                } else {
                    0.0
                };

                for j in 0..n_out {
                    let src_pos = step * j as f64;
                    let base = src_pos.floor();
                    let weights = cubic_weights(src_pos - base);

                    let base = base as isize;
                    let taps = [base - 1, base, base + 1, base + 2]
                        .map(|i| i.clamp(0, n_in as isize - 1) as usize);

                    // 输出第 j 层 = 四个输入层的逐体素加权和.
                    let mut dst = out.index_axis_mut(axis, j);
                    for (tap, weight) in taps.into_iter().zip(weights) {
                        let lane = src.index_axis(axis, tap);
                        dst.zip_mut_with(&lane, |d, s| {
                            *d += (weight * (*s as f64)) as $fp;
                        });
                    }
                }
                out
            }
        }
    };
}

pub(crate) struct ZoomImp<'a, T: Float> {
    data: ArrayView<'a, T, Ix3>,
    target: Idx3d,
}

impl_zoom!(f32);
impl_zoom!(f64);

/// 判断两组体素间距是否足够接近.
///
/// 当且仅当所有轴的分数差 `|current - target| / target` 均不超过
/// `tolerance` 时返回 `true`, 正好落在边界上按接近处理.
/// `target` 的各分量必须为正.
pub fn spacing_close(current: [f64; 3], target: [f64; 3], tolerance: f64) -> bool {
    current
        .iter()
        .zip(target.iter())
        .all(|(c, t)| ((c - t) / t).abs() <= tolerance)
}

/// 按逐轴缩放系数对 `f32` 体数据做三次插值缩放.
/// 目标尺寸为 `round(原尺寸 * 系数)`, 不允许缩放到零尺寸.
pub fn zoom_f32(data: ArrayView<f32, Ix3>, scale: [f64; 3]) -> Array3<f32> {
    ZoomImp::<f32>::from_scale(data, scale).run()
}

/// 按逐轴缩放系数对 `f64` 体数据做三次插值缩放.
/// 目标尺寸为 `round(原尺寸 * 系数)`, 不允许缩放到零尺寸.
pub fn zoom_f64(data: ArrayView<f64, Ix3>, scale: [f64; 3]) -> Array3<f64> {
    ZoomImp::<f64>::from_scale(data, scale).run()
}

/// 将扫描重采样到 `target_spacing` 间距 (以毫米为单位, 按 \[z, h, w\] 排列).
/// 逐轴缩放系数为 `原间距 / 目标间距`.
///
/// 该函数无条件执行重采样, "间距足够接近时跳过" 的决策由调用方
/// 通过 [`spacing_close`] 实现.
pub fn resample_to_spacing(scan: &MrScan, target_spacing: [f64; 3]) -> Array3<f32> {
    let spacing = scan.pix_dim();
    let scale = [
        spacing[0] / target_spacing[0],
        spacing[1] / target_spacing[1],
        spacing[2] / target_spacing[2],
    ];
    zoom_f32(scan.data(), scale)
}

/// 将体数据缩放到固定体素尺寸 `size` (按 \[z, h, w\] 排列).
///
/// 作为独立变换提供, 预处理流水线默认不启用它.
pub fn resize_to_size(data: ArrayView<f32, Ix3>, size: Idx3d) -> Array3<f32> {
    ZoomImp::<f32>::from_target(data, size).run()
}
