//! 程序运行函数.

use log::{info, warn};
use mr_berry::consts::WMH_TRAINING_SET_LEN;
use mr_berry::preprocess::{DatasetReport, PreprocessConfig, WmhPreprocessor};
use utils::loader;

/// 实际运行.
pub fn run() -> DatasetReport {
    let root = loader::wmh_dir_from_env_or_home();
    assert!(root.is_dir(), "数据集根目录 `{}` 不存在", root.display());

    let worker = WmhPreprocessor::new(PreprocessConfig::default())
        .expect("Default preprocess config error");
    info!("数据集根目录: `{}`", root.display());

    let report = worker.process_dataset(&root);

    // 完整训练集: 60 名受试者, 每名 T1 + FLAIR 两个文件.
    let expected = 2 * WMH_TRAINING_SET_LEN as usize;
    if report.total() != expected {
        warn!("共发现 {} 个输入, 完整训练集应有 {expected} 个", report.total());
    }
    report
}
