#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供 MICCAI-2017 WMH 数据集的脑部 MRI (T1/FLAIR) 文件的结构化信息、
//! 预处理流水线和分割评估指标.
//!
//! 该 crate 目前仅提供 `safe` 接口. 将来可能为部分高性能场景关键路径提供 `unsafe` 接口.
//!
//! # 注意
//!
//! 1. 该 crate 目前主要负责处理 MICCAI-2017 WMH 数据, 没有对其它源的数据进行直接适配
//!   (但如果新数据按照 `{subject}/pre/{T1, FLAIR}.nii.gz` 模式进行组织, 也可以工作).
//! 2. 在非期望情况下, 程序会直接 panic, 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### 数据模型 ✅
//!
//! nii 格式 3D MRI 扫描与二值标注的读取 (轴序转置为 \[z, H, W\])、
//! 单位仿射矩阵规范化写出, 以及摄入时的 `{Intensity, Mask}` 类型标签.
//!
//! 实现位于 `mr-berry/src/data`.
//!
//! ### 颅骨剥离 ✅
//!
//! 双策略接口: 外部 BET 工具 (robust 模式, frac = 0.5) 与进程内
//! 10 百分位阈值回退. 策略在启动时按工具可用性选定.
//!
//! 实现位于 `mr-berry/src/preprocess/brain.rs`.
//!
//! ### 强度标准化 ✅
//!
//! 在脑掩膜区域 (体素值 > 0) 内做 z-score 标准化, 区域外体素重置为零.
//!
//! ### 三次插值重采样 ✅
//!
//! 各向间距差均在容差 (5%) 内时跳过; 否则按 `原间距 / 目标间距`
//! 逐轴缩放, 采用 order-3 (Catmull-Rom) 插值核. 同时提供到固定体素
//! 尺寸的 resize 变换 (流水线默认不启用).
//!
//! 实现位于 `mr-berry/src/preprocess/resample.rs`.
//!
//! ### 批处理 ✅
//!
//! 1. 单文件处理: 分类 -> 剥离/标准化 (掩膜跳过) -> 重采样 -> 掩膜二值化 -> 写出. ✅
//! 2. 全数据集处理: 递归发现 `*/pre/{T1, FLAIR}.nii.gz`, 按路径字典序排列,
//!   输出映射到兄弟目录 `pre2`, 逐文件顺序处理并汇总成败. ✅
//! 3. 单文件失败只记录日志, 不中断批处理; 幂等性由输出存在性检查保证. ✅
//!
//! 实现位于 `mr-berry/src/preprocess`.
//!
//! ### 分割评估指标 ✅
//!
//! dice / sensitivity / specificity / precision / f1 / 体积差 /
//! Hausdorff 距离 / 病灶级假阳性计数, 以及固定结构的单对评估与批量平均.
//!
//! 实现位于 `mr-berry/src/metrics`.
//!
//! ### 6-连通域提取 ✅
//!
//! 钻石邻域 BFS, 服务于病灶级假阳性计数与掩膜病灶分析.
//!
//! 实现位于 `mr-berry/src/data/components.rs`.
//!
//! ### 小功能 ✅
//!
//! 1. 数据集目录发现与 `pre -> pre2` 输出路径映射. ✅
//! 2. 2D 水平切片灰度 PNG 快照 (质检用). ✅
//! 3. `prelude` 模块. ✅
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private
//! API 提供文档.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

type Predicate = fn(u8) -> bool;

type Area3d = Vec<Idx3d>;
type Areas3d = Vec<Area3d>;

/// 3D MRI nii 文件基础数据结构.
mod data;

pub use data::{
    save_canonical_f32, save_canonical_u8, MrMask, MrScan, MrVolume, NiftiHeaderAttr,
    SliceSnapshot, VolumeKind,
};

pub mod consts;

pub mod dataset;
pub mod metrics;
pub mod preprocess;
pub mod prelude;
