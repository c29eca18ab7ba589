//! 颅骨剥离.
//!
//! MICCAI-2017 WMH 的强度图像在进入强度标准化之前需要去除颅骨等
//! 非脑组织. 本模块提供两套策略: 外部 FSL BET 风格命令行工具,
//! 以及一个永远可用的进程内百分位阈值回退.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{env, fs, process};

use log::warn;
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::PreprocessError;
use crate::MrScan;

/// 默认的 BET 可执行文件名.
pub const DEFAULT_BET_COMMAND: &str = "bet";

/// 默认 BET 命令在当前 `PATH` 上的可用性. 整个进程只探测一次.
static DEFAULT_BET_ON_PATH: Lazy<bool> = Lazy::new(|| probe(DEFAULT_BET_COMMAND));

/// BET 输出中间文件的进程内序号, 用于生成互不冲突的路径.
static SCRATCH_SERIAL: AtomicUsize = AtomicUsize::new(0);

/// 探测 `command` 是否可启动. 只关心能否启动, 不关心退出码.
fn probe(command: &str) -> bool {
    Command::new(command)
        .arg("-h")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// 生成进程内唯一的 BET 输出基础路径 (不带扩展名).
fn scratch_base() -> PathBuf {
    let serial = SCRATCH_SERIAL.fetch_add(1, Ordering::Relaxed);
    env::temp_dir().join(format!("mr-berry-bet-{}-{serial}", process::id()))
}

/// 外部 BET 工具的调用配置.
#[derive(PartialEq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BetConfig {
    /// 可执行文件名或路径.
    pub command: String,

    /// 脑组织分数阈值, 取值 (0, 1). 越小保留的脑组织越多.
    pub frac: f32,

    /// 是否启用鲁棒模式 (迭代质心估计).
    pub robust: bool,

    /// 是否随剥离结果一并输出二值脑掩膜文件.
    pub mask: bool,
}

impl Default for BetConfig {
    /// `bet <in> <out> -R -f 0.5 -m`.
    fn default() -> Self {
        Self {
            command: DEFAULT_BET_COMMAND.into(),
            frac: 0.5,
            robust: true,
            mask: true,
        }
    }
}

/// 颅骨剥离策略. 决定一张强度图像如何去除非脑组织.
#[derive(Clone, Debug)]
pub enum BrainExtractor {
    /// 调用外部 BET 风格命令行工具, 在文件层面完成剥离.
    /// 第二个字段是该工具在单个文件上失败时的回退百分位.
    ExternalBet(BetConfig, f64),

    /// 进程内策略: 以严格正值体素的给定百分位为阈值,
    /// 将阈值及以下的体素全部清零.
    PercentileThreshold(f64),
}

impl BrainExtractor {
    /// 按工具可用性选定策略. `bet.command` 可启动时选择外部工具,
    /// 否则降级为百分位阈值. 探测只在构造时发生一次.
    ///
    /// `percentile` 取值 \[0, 100\], 否则程序 panic.
    pub fn detect(bet: BetConfig, percentile: f64) -> Self {
        assert!((0.0..=100.0).contains(&percentile), "百分位必须落在 [0, 100] 内");

        let available = if bet.command == DEFAULT_BET_COMMAND {
            *DEFAULT_BET_ON_PATH
        } else {
            probe(&bet.command)
        };

        if available {
            Self::ExternalBet(bet, percentile)
        } else {
            warn!("未在 PATH 上找到 `{}`, 颅骨剥离降级为百分位阈值", bet.command);
            Self::PercentileThreshold(percentile)
        }
    }

    /// 对 `input` 处的强度图像执行颅骨剥离, 返回剥离后的扫描.
    ///
    /// 外部工具在单个文件上执行失败 (无法启动、退出码非零或输出不可读)
    /// 时, 不会使该文件失败, 而是记录警告并改用百分位阈值.
    pub fn extract<P: AsRef<Path>>(&self, input: P) -> Result<MrScan, PreprocessError> {
        let input = input.as_ref();
        match self {
            Self::ExternalBet(config, fallback) => match run_bet(config, input) {
                Ok(scan) => Ok(scan),
                Err(err) => {
                    warn!(
                        "BET 在 `{}` 上执行失败 ({err:?}), 改用百分位阈值",
                        input.display()
                    );
                    threshold_strip_file(input, *fallback)
                }
            },
            Self::PercentileThreshold(q) => threshold_strip_file(input, *q),
        }
    }

    /// 是否为外部工具策略?
    #[inline]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::ExternalBet(..))
    }
}

/// 调用外部 BET 工具剥离 `input`, 读回剥离结果.
///
/// 中间文件写在系统临时目录, 用后即删; 删除失败不影响结果.
fn run_bet(config: &BetConfig, input: &Path) -> Result<MrScan, PreprocessError> {
    let base = scratch_base();
    let stripped = base.with_extension("nii.gz");
    let brain_mask = {
        let mut name = base.clone().into_os_string();
        name.push("_mask.nii.gz");
        PathBuf::from(name)
    };

    let mut cmd = Command::new(&config.command);
    cmd.arg(input).arg(&base);
    if config.robust {
        cmd.arg("-R");
    }
    cmd.arg("-f").arg(config.frac.to_string());
    if config.mask {
        cmd.arg("-m");
    }

    let status = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(PreprocessError::Io)?;
    if !status.success() {
        return Err(PreprocessError::Bet(status));
    }

    let scan = MrScan::open(&stripped).map_err(PreprocessError::Nifti);
    let _ = fs::remove_file(&stripped);
    let _ = fs::remove_file(&brain_mask);
    scan
}

/// 打开 `input` 并执行进程内百分位阈值剥离.
fn threshold_strip_file(input: &Path, percentile_q: f64) -> Result<MrScan, PreprocessError> {
    let mut scan = MrScan::open(input).map_err(PreprocessError::Nifti)?;
    threshold_strip(&mut scan, percentile_q)?;
    Ok(scan)
}

/// 进程内颅骨剥离: 以严格正值体素的 `percentile_q` 百分位为阈值,
/// 将阈值及以下的体素 (包括所有非正值体素) 全部清零.
///
/// 若扫描中不存在严格正值体素, 则返回
/// [`PreprocessError::EmptyForeground`].
pub fn threshold_strip(scan: &mut MrScan, percentile_q: f64) -> Result<(), PreprocessError> {
    let positives = scan.positive_values();
    if positives.is_empty() {
        return Err(PreprocessError::EmptyForeground);
    }

    let threshold = percentile(positives, percentile_q);
    scan.data_mut()
        .mapv_inplace(|v| if v > threshold { v } else { 0.0 });
    Ok(())
}

/// 以线性插值法计算 `values` 的 `q` 百分位:
/// `rank = (n - 1) * q / 100`, 在相邻两个次序统计量之间线性插值.
fn percentile(mut values: Vec<f32>, q: f64) -> f32 {
    debug_assert!(!values.is_empty());
    debug_assert!((0.0..=100.0).contains(&q));

    values.sort_unstable_by_key(|v| OrderedFloat(*v));
    let rank = (values.len() - 1) as f64 * q / 100.0;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    let (a, b) = (values[lo] as f64, values[hi] as f64);
    (a + (b - a) * frac) as f32
}
