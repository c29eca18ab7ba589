//! 批处理报告输出.

use mr_berry::preprocess::DatasetReport;
use std::io::{self, Write};

/// 将 `report` 的摘要写进 `w` 中.
fn describe_into<W: Write>(report: &DatasetReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "WMH pre2 批处理结果:")?;
    writeln!(w, "{S4}新生成: {}", report.processed.len())?;
    writeln!(w, "{S4}跳过 (输出已存在): {}", report.skipped.len())?;
    writeln!(w, "{S4}失败: {}", report.failed.len())?;
    for path in report.failed.iter() {
        writeln!(w, "{S4}{S4}{}", path.display())?;
    }
    write!(w, "{S4}共计: {}", report.total())?;
    Ok(())
}

/// 分析运行结果.
pub fn analyze(report: &DatasetReport) {
    utils::sep();
    let mut buf = Vec::with_capacity(512);
    describe_into(report, &mut buf).unwrap();
    println!("{}", std::str::from_utf8(&buf).unwrap());
    utils::sep();
}
