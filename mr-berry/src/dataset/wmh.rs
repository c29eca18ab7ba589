//! MICCAI-2017 WMH 数据集的目录约定.
//!
//! 训练集由 3 个站点各 20 名受试者组成. 每名受试者目录下的 `pre/`
//! 存放配准后的原始图像, 预处理输出写入同级 `pre2/`:
//!
//! ```text
//! <root>/<site>/<subject>/pre/T1.nii.gz
//! <root>/<site>/<subject>/pre/FLAIR.nii.gz
//! <root>/<site>/<subject>/pre2/...       预处理管线生成
//! <root>/<site>/<subject>/wmh.nii.gz     专家标注
//! ```
//!
//! 受试者编号在站点之间不连续, 因此这里不做编号枚举, 只做目录发现.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// 原始输入目录名.
pub const PRE_DIR: &str = "pre";

/// 预处理输出目录名.
pub const PRE2_DIR: &str = "pre2";

/// T1 加权像文件名.
pub const T1_FILE: &str = "T1.nii.gz";

/// FLAIR 像文件名.
pub const FLAIR_FILE: &str = "FLAIR.nii.gz";

/// 受试者目录下专家标注的文件名.
pub const WMH_FILE: &str = "wmh.nii.gz";

/// 递归发现 `root` 下所有待预处理的 `pre/` 体数据文件.
///
/// 只接受 `pre` 目录的直系子文件 [`T1_FILE`] 与 [`FLAIR_FILE`], 且该
/// `pre` 目录与 `root` 之间至少隔着一层受试者目录. 结果按完整路径的
/// 字节序升序排列, 多次运行的遍历顺序因此一致. 不可读的目录一律跳过.
pub fn discover_pre_volumes<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let root = root.as_ref();
    let mut found = Vec::new();
    let mut dirs_q = VecDeque::with_capacity(16);
    dirs_q.push_back(root.to_path_buf());

    while !dirs_q.is_empty() {
        let dir = dirs_q.pop_front().unwrap();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                dirs_q.push_back(path);
            } else if is_pre_volume(root, &path) {
                found.push(path);
            }
        }
    }

    found.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    found
}

/// `path` 是否为某个受试者 `pre/` 目录下的待处理体数据?
fn is_pre_volume(root: &Path, path: &Path) -> bool {
    let named = matches!(
        path.file_name().and_then(OsStr::to_str),
        Some(T1_FILE | FLAIR_FILE)
    );
    if !named {
        return false;
    }

    let parent = match path.parent() {
        Some(parent) => parent,
        None => return false,
    };
    if parent.file_name().and_then(OsStr::to_str) != Some(PRE_DIR) {
        return false;
    }

    // `root/pre` 直下没有受试者目录, 不属于数据集布局.
    parent
        .strip_prefix(root)
        .map_or(false, |rel| rel.components().count() >= 2)
}

/// 受试者目录下专家标注文件 ([`WMH_FILE`]) 的全路径.
pub fn annotation_path<P: AsRef<Path>>(subject_dir: P) -> PathBuf {
    subject_dir.as_ref().join(WMH_FILE)
}

/// 把 `pre/` 下的输入路径映射为同级 `pre2/` 目录下的输出路径.
///
/// `input` 的父目录不叫 `pre` 时返回 `None`.
pub fn pre2_output_path<P: AsRef<Path>>(input: P) -> Option<PathBuf> {
    let input = input.as_ref();
    let file = input.file_name()?;
    let parent = input.parent()?;
    if parent.file_name().and_then(OsStr::to_str) != Some(PRE_DIR) {
        return None;
    }

    let mut ans = parent.parent()?.to_path_buf();
    ans.push(PRE2_DIR);
    ans.push(file);
    Some(ans)
}
