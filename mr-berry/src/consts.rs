//! 通用常量.

use crate::Idx3d;

/// 单通道颜色.
pub mod gray {
    /// WMH 二值标注中, 背景的体素值.
    pub const WMH_BACKGROUND: u8 = 0;

    /// WMH 二值标注中, 病灶 (白质高信号) 的体素值.
    pub const WMH_LESION: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 体素是否是病灶?
    #[inline]
    pub const fn is_lesion(p: u8) -> bool {
        matches!(p, WMH_LESION)
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, WMH_BACKGROUND)
    }

    /// 体素是否是前景 (任意非零值)?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        p != WMH_BACKGROUND
    }
}

/// MICCAI-2017 WMH 训练集大小 (三个站点各 20 例).
pub const WMH_TRAINING_SET_LEN: u32 = 60;

/// 单站点受试者个数.
pub const WMH_SITE_LEN: u32 = 20;

/// MICCAI-2017 WMH 训练集的三个站点目录名.
pub const WMH_SITES: [&str; 3] = ["Utrecht", "Singapore", "GE3T"];

/// 默认重采样目标间距, 以毫米为单位, 按 \[z, h, w\] 排列
/// (与 [`crate::NiftiHeaderAttr::pix_dim`] 一致).
pub const DEFAULT_TARGET_SPACING: [f64; 3] = [2.99999717, 0.95833334, 0.95833331];

/// 默认目标体素尺寸, 按 \[z, h, w\] 排列.
///
/// 目前该值只被保留为配置项, 服务于未来的 resize 阶段
/// ([`crate::preprocess::resize_to_size`]); 重采样流程不使用它.
pub const DEFAULT_TARGET_SIZE: Idx3d = (48, 240, 240);

/// 间距分数差容忍度. 当所有轴的 `|原间距 - 目标间距| / 目标间距`
/// 均不超过该值时, 跳过重采样.
pub const SPACING_TOLERANCE: f64 = 0.05;

/// 进程内颅骨剥离回退策略使用的百分位 (作用于严格正值体素).
pub const BRAIN_PERCENTILE: f64 = 10.0;

/// z-score 标准化时加在标准差上的小量, 避免近常数区域除零.
pub const NORMALIZE_EPSILON: f64 = 1e-8;

/// 掩膜重采样后的二值化阈值: 大于该值的体素记为 1, 否则记为 0.
pub const MASK_BINARIZE_THRESHOLD: f32 = 0.5;

/// 体数据文件的规定后缀.
pub const NII_GZ_SUFFIX: &str = ".nii.gz";
