//! 水平切片的灰度快照. 仅供人工质检, 不参与任何数值流程.

use std::path::Path;

use image::{GrayImage, ImageResult, Luma};
use itertools::Itertools;
use ordered_float::OrderedFloat;

use super::{MrMask, MrScan};
use crate::consts::gray::*;

/// 表明一个 3D 体数据能把水平切片保存为单通道灰度图像.
pub trait SliceSnapshot {
    /// 将第 `z_index` 层水平切片以灰度图像保存到 `path` 路径.
    /// 图像格式由 `path` 的扩展名决定 (推荐 png).
    ///
    /// 当 `z_index` 越界时 panic.
    fn snapshot<P: AsRef<Path>>(&self, path: P, z_index: usize) -> ImageResult<()>;
}

/// 按切片内最小-最大值线性拉伸到全灰度范围. 近常数切片显示为全黑.
impl SliceSnapshot for MrScan {
    fn snapshot<P: AsRef<Path>>(&self, path: P, z_index: usize) -> ImageResult<()> {
        let sli = self.slice_at(z_index);
        let (height, width) = sli.dim();

        let (lo, hi) = sli
            .iter()
            .copied()
            .map(OrderedFloat)
            .minmax()
            .into_option()
            .map(|(lo, hi)| (lo.0, hi.0))
            .unwrap_or((0.0, 0.0));
        let span = hi - lo;

        let mut buf = GrayImage::new(width as u32, height as u32);
        for ((h, w), &v) in sli.indexed_iter() {
            let pix = if span > 0.0 {
                ((v - lo) / span * f32::from(WHITE)).round() as u8
            } else {
                BLACK
            };
            buf.put_pixel(w as u32, h as u32, Luma([pix]));
        }
        buf.save(path)
    }
}

/// 会将背景/病灶体素分别映射为黑色/白色. 不允许其他体素值.
impl SliceSnapshot for MrMask {
    fn snapshot<P: AsRef<Path>>(&self, path: P, z_index: usize) -> ImageResult<()> {
        let sli = self.slice_at(z_index);
        let (height, width) = sli.dim();

        let mut buf = GrayImage::new(width as u32, height as u32);
        for ((h, w), &pix) in sli.indexed_iter() {
            let pix = match pix {
                WMH_BACKGROUND => BLACK,
                WMH_LESION => WHITE,
                any_else => panic!("只允许图像存在 0, 1 体素, 但发现了 `{any_else}`"),
            };
            buf.put_pixel(w as u32, h as u32, Luma([pix]));
        }
        buf.save(path)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn scan_snapshot_stretches_to_full_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");

        let data = array![[[0.0f32, 50.0], [100.0, 25.0]]];
        let scan = MrScan::fake(data, [1.0, 1.0, 1.0]);
        scan.snapshot(&path, 0).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [128]);
        assert_eq!(img.get_pixel(0, 1).0, [255]);
        assert_eq!(img.get_pixel(1, 1).0, [64]);
    }

    #[test]
    fn constant_slice_maps_to_black() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.png");

        let data = array![[[7.0f32, 7.0], [7.0, 7.0]]];
        let scan = MrScan::fake(data, [1.0, 1.0, 1.0]);
        scan.snapshot(&path, 0).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert!(img.pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn mask_snapshot_is_black_and_white() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");

        let data = array![[[0u8, 1], [1, 0]]];
        let mask = MrMask::fake(data, [1.0, 1.0, 1.0]);
        mask.snapshot(&path, 0).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [255]);
        assert_eq!(img.get_pixel(0, 1).0, [255]);
        assert_eq!(img.get_pixel(1, 1).0, [0]);
    }
}
