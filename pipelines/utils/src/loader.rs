//! 对 `mr-berry::dataset` 的更一层封装. 提供数据集根目录解析.

use std::env;
use std::path::PathBuf;

/// 获取 WMH 训练集根目录.
///
/// 1. 若环境变量 `$WMH_TRAIN_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/WMH`.
pub fn wmh_dir_from_env_or_home() -> PathBuf {
    if let Ok(d) = env::var("WMH_TRAIN_DIR") {
        PathBuf::from(d)
    } else {
        mr_berry::dataset::home_dataset_dir_with(["WMH"]).unwrap()
    }
}
