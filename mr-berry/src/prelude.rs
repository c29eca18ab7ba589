//! 🫐欢迎光临🫐
//!
//! 汇集了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::{
    save_canonical_f32, save_canonical_u8, MrMask, MrScan, MrVolume, NiftiHeaderAttr,
    SliceSnapshot, VolumeKind,
};

pub use crate::consts::gray::{WMH_BACKGROUND, WMH_LESION};
pub use crate::consts::{WMH_SITES, WMH_SITE_LEN, WMH_TRAINING_SET_LEN};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{self, wmh};

pub use crate::metrics::{evaluate_batch, evaluate_segmentation, SegmentationScores};

pub use crate::preprocess::{
    BetConfig, BrainExtractor, DatasetReport, PreprocessConfig, PreprocessError, WmhPreprocessor,
};
