//! WMH 训练集批量预处理入口.
//!
//! 从 `$WMH_TRAIN_DIR` (或 `$HOME/dataset/WMH`) 解析数据集根目录,
//! 把各受试者 `pre/` 下的 T1 与 FLAIR 体数据变换到同级 `pre2/`,
//! 最后打印批处理报告. 已存在的输出一律跳过, 因此中断后重跑安全.

mod report;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let outcome = runner::run();
    report::analyze(&outcome);

    if !outcome.is_complete() {
        std::process::exit(1);
    }
}
