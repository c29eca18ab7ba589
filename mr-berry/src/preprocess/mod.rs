//! WMH 预处理流水线.
//!
//! 把 MICCAI-2017 WMH 数据集的原始 `pre/` 体数据变换为训练可用的
//! `pre2/` 体数据. 对单个文件而言, 流水线按固定顺序执行:
//!
//! 1. 按文件名分类 (强度图像或掩膜, 见 [`VolumeKind`]);
//! 2. 强度图像执行颅骨剥离 (见 [`BrainExtractor`]) 与 z-score
//!    强度标准化, 掩膜跳过这两步;
//! 3. 体素间距偏离目标时执行三次插值重采样;
//! 4. 掩膜在重采样后重新二值化, 最后以规范头写盘.
//!
//! # 注意
//!
//! 单文件处理的错误会被就地记录并折叠为 "跳过", 只有输入输出
//! 路径相同这一调用方错误会显式返回 [`PreprocessError`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use log::{error, info};
use ndarray::{Array3, ArrayView3};
use nifti::NiftiError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::gray::{WMH_BACKGROUND, WMH_LESION};
use crate::consts::{
    BRAIN_PERCENTILE, DEFAULT_TARGET_SIZE, DEFAULT_TARGET_SPACING, MASK_BINARIZE_THRESHOLD,
    NII_GZ_SUFFIX, NORMALIZE_EPSILON, SPACING_TOLERANCE,
};
use crate::dataset::wmh::{discover_pre_volumes, pre2_output_path};
use crate::{save_canonical_f32, save_canonical_u8, Idx3d, MrScan, NiftiHeaderAttr, VolumeKind};

mod brain;
mod resample;

pub use brain::{threshold_strip, BetConfig, BrainExtractor, DEFAULT_BET_COMMAND};
pub use resample::{resample_to_spacing, resize_to_size, spacing_close, zoom_f32, zoom_f64};

/// 预处理错误.
#[derive(Debug)]
pub enum PreprocessError {
    /// 输入与输出为同一路径, 处理会破坏原始数据.
    IdenticalPaths(PathBuf),

    /// 强度图像不含任何严格正值体素, 无法估计剥离阈值.
    EmptyForeground,

    /// NIfTI 读写失败.
    Nifti(NiftiError),

    /// 文件系统或子进程 I/O 失败.
    Io(io::Error),

    /// 外部 BET 工具以非零状态退出.
    Bet(ExitStatus),
}

/// 预处理参数.
#[derive(PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PreprocessConfig {
    /// 目标体素间距, `[z, h, w]`, 以毫米为单位.
    pub target_spacing: [f64; 3],

    /// 目标体数据尺寸, `(z, h, w)`. 供重采样之后的统一裁剪缩放
    /// (见 [`resize_to_size`]) 使用, 流水线本身不消费它.
    pub target_size: Idx3d,

    /// 间距接近判定的逐轴分数容忍度, 取值 (0, 1).
    pub spacing_tolerance: f64,

    /// 进程内颅骨剥离的阈值百分位, 取值 \[0, 100\].
    pub brain_percentile: f64,

    /// 外部 BET 工具配置.
    pub bet: BetConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_spacing: DEFAULT_TARGET_SPACING,
            target_size: DEFAULT_TARGET_SIZE,
            spacing_tolerance: SPACING_TOLERANCE,
            brain_percentile: BRAIN_PERCENTILE,
            bet: BetConfig::default(),
        }
    }
}

impl PreprocessConfig {
    /// 所有参数是否都在合理范围内?
    fn valid(&self) -> bool {
        let (z, h, w) = self.target_size;
        self.target_spacing.iter().all(|s| s.is_finite() && *s > 0.0)
            && z * h * w > 0
            && 0.0 < self.spacing_tolerance
            && self.spacing_tolerance < 1.0
            && (0.0..=100.0).contains(&self.brain_percentile)
            && 0.0 < self.bet.frac
            && self.bet.frac < 1.0
    }
}

/// WMH 预处理器. 持有参数与已选定的颅骨剥离策略.
#[derive(Clone, Debug)]
pub struct WmhPreprocessor {
    config: PreprocessConfig,
    extractor: BrainExtractor,
}

impl WmhPreprocessor {
    /// 构建预处理器, 并探测一次外部 BET 工具的可用性.
    ///
    /// `config` 的任一参数越界时返回 `None`.
    pub fn new(config: PreprocessConfig) -> Option<Self> {
        config.valid().then(|| {
            let extractor = BrainExtractor::detect(config.bet.clone(), config.brain_percentile);
            Self { config, extractor }
        })
    }

    /// 以显式指定的颅骨剥离策略构建预处理器, 不做工具探测.
    ///
    /// `config` 的任一参数越界时返回 `None`.
    pub fn with_extractor(config: PreprocessConfig, extractor: BrainExtractor) -> Option<Self> {
        config.valid().then_some(Self { config, extractor })
    }

    /// 获取预处理参数.
    #[inline]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// 获取已选定的颅骨剥离策略.
    #[inline]
    pub fn extractor(&self) -> &BrainExtractor {
        &self.extractor
    }

    /// 处理单个体数据文件.
    ///
    /// # 返回值
    ///
    /// - `Err(IdenticalPaths)`: `input` 与 `output` 为同一路径;
    /// - `Ok(None)`: `input` 不存在或不以 `.nii.gz` 结尾 (静默跳过),
    ///   或处理中途失败 (错误已连同路径记入日志);
    /// - `Ok(Some(path))`: 输出就绪. 若 `output` 已存在且未要求
    ///   `overwrite`, 则不做任何读写, 直接返回现有路径.
    pub fn process_single_file<P, Q>(
        &self,
        input: P,
        output: Q,
        overwrite: bool,
    ) -> Result<Option<PathBuf>, PreprocessError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let (input, output) = (input.as_ref(), output.as_ref());
        if input == output {
            return Err(PreprocessError::IdenticalPaths(input.to_path_buf()));
        }

        let is_nii = input
            .file_name()
            .map_or(false, |name| name.to_string_lossy().ends_with(NII_GZ_SUFFIX));
        if !is_nii || !input.is_file() {
            return Ok(None);
        }

        if output.exists() && !overwrite {
            return Ok(Some(output.to_path_buf()));
        }

        match self.transform_file(input, output) {
            Ok(()) => Ok(Some(output.to_path_buf())),
            Err(err) => {
                error!("处理 `{}` 失败: {err:?}", input.display());
                Ok(None)
            }
        }
    }

    /// 对 `input` 执行完整变换并写出到 `output`.
    fn transform_file(&self, input: &Path, output: &Path) -> Result<(), PreprocessError> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(PreprocessError::Io)?;
        }

        let kind = VolumeKind::from_filename(input);
        let scan = match kind {
            VolumeKind::Intensity => {
                let mut scan = self.extractor.extract(input)?;
                normalize_intensity(&mut scan);
                scan
            }
            // 掩膜不剥离也不标准化, 直接进入重采样.
            VolumeKind::Mask => MrScan::open(input).map_err(PreprocessError::Nifti)?,
        };

        let close = spacing_close(
            scan.pix_dim(),
            self.config.target_spacing,
            self.config.spacing_tolerance,
        );
        let resampled = if close {
            scan.into_data()
        } else {
            resample_to_spacing(&scan, self.config.target_spacing)
        };

        match kind {
            VolumeKind::Intensity => save_canonical_f32(output, &resampled),
            VolumeKind::Mask => save_canonical_u8(output, &binarize_mask(resampled.view())),
        }
        .map_err(PreprocessError::Nifti)
    }

    /// 处理整个 WMH 数据集.
    ///
    /// 在 `root` 下发现全部 `*/pre/T1.nii.gz` 与 `*/pre/FLAIR.nii.gz`,
    /// 按路径字节序逐个处理, 输出写入同级 `pre2/` 目录. 已存在的
    /// 输出一律跳过, 单个文件的失败不会中断整个数据集.
    pub fn process_dataset<P: AsRef<Path>>(&self, root: P) -> DatasetReport {
        let inputs = discover_pre_volumes(root);
        let total = inputs.len();
        let mut report = DatasetReport::default();

        for (index, input) in inputs.into_iter().enumerate() {
            info!("[{}/{total}] 处理 `{}`", index + 1, input.display());

            let output = match pre2_output_path(&input) {
                Some(output) => output,
                None => {
                    error!("`{}` 不在 pre/ 目录下, 无法决定输出位置", input.display());
                    report.failed.push(input);
                    continue;
                }
            };
            if output.exists() {
                info!("输出 `{}` 已存在, 跳过", output.display());
                report.skipped.push(output);
                continue;
            }

            match self.process_single_file(&input, &output, false) {
                Ok(Some(path)) => report.processed.push(path),
                Ok(None) => report.failed.push(input),
                Err(err) => {
                    error!("处理 `{}` 失败: {err:?}", input.display());
                    report.failed.push(input);
                }
            }
        }
        report
    }
}

/// 数据集批处理报告.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DatasetReport {
    /// 本次新生成的输出文件.
    pub processed: Vec<PathBuf>,

    /// 因输出已存在而跳过的输出文件.
    pub skipped: Vec<PathBuf>,

    /// 处理失败的输入文件.
    pub failed: Vec<PathBuf>,
}

impl DatasetReport {
    /// 发现的文件总数.
    #[inline]
    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.failed.len()
    }

    /// 是否全部文件都已就绪 (新生成或先前已存在)?
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 对扫描执行 z-score 强度标准化.
///
/// 均值与总体标准差只在严格正值体素上估计; 正值体素被替换为
/// `(v - mean) / (std + epsilon)`, 非正值体素一律置零. 若扫描
/// 不含正值体素, 则整卷置零而不是产生 NaN.
pub fn normalize_intensity(scan: &mut MrScan) {
    match scan.positive_statistics() {
        Some((mean, std)) => {
            let denom = std + NORMALIZE_EPSILON;
            scan.data_mut().mapv_inplace(|v| {
                if v > 0.0 {
                    ((v as f64 - mean) / denom) as f32
                } else {
                    0.0
                }
            });
        }
        None => scan.data_mut().fill(0.0),
    }
}

/// 把 (可能经过插值的) 浮点掩膜重新二值化.
///
/// 严格大于 0.5 的体素记为病灶, 其余记为背景.
pub fn binarize_mask(data: ArrayView3<'_, f32>) -> Array3<u8> {
    data.mapv(|v| {
        if v > MASK_BINARIZE_THRESHOLD {
            WMH_LESION
        } else {
            WMH_BACKGROUND
        }
    })
}
