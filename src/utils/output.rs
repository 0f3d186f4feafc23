//! # 终端输出工具
//!
//! 带标签的彩色消息，以及背景拟合参数、批量统计等结果行。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块与 `main.rs` 使用
//! - 使用 `analysis/background.rs` 的 BackgroundFit
//! - 使用 `colored` crate

use crate::analysis::BackgroundFit;

use colored::{ColoredString, Colorize};

fn tagged(tag: ColoredString, msg: &str) {
    println!("{} {}", tag, msg);
}

/// 打印成功消息
pub fn print_success(msg: &str) {
    tagged("[OK]".green().bold(), msg);
}

/// 打印错误消息（stderr）
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    tagged("[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    tagged("[*]".blue().bold(), msg);
}

pub fn print_skip(msg: &str) {
    tagged("[SKIP]".dimmed(), msg);
}

/// 打印输入 -> 输出文件对
pub fn print_written(from: &str, to: &str) {
    println!("{} {} {} {}", "[OK]".green().bold(), from.dimmed(), "->".cyan(), to);
}

/// 打印一条谱线的背景拟合参数
pub fn print_background_fit(label: &str, fit: &BackgroundFit) {
    println!(
        "{} {}  shift {:+}  scale {:.4}  offset {:.4}  SSR {:.4e}  ({} pts)",
        "[FIT]".magenta().bold(),
        label,
        fit.shift,
        fit.scale,
        fit.offset,
        fit.sum_sq,
        fit.points
    );
}

/// 打印批量处理统计；跳过与失败数非零时着色
pub fn print_batch_summary(done: usize, skipped: usize, failed: usize, target: &str) {
    let skipped = match skipped {
        0 => skipped.to_string().normal(),
        n => n.to_string().yellow(),
    };
    let failed = match failed {
        0 => failed.to_string().normal(),
        n => n.to_string().red().bold(),
    };
    println!(
        "{} {} file(s) into '{}' ({} skipped, {} failed)",
        "[DONE]".green().bold(),
        done.to_string().green(),
        target,
        skipped,
        failed
    );
}

/// 打印对齐的键值对
pub fn print_field(key: &str, value: &str) {
    println!("  {:<18} {}", format!("{}:", key).bold(), value);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60).dimmed();
    println!("\n{}\n  {}\n{}\n", line, title.bold(), line);
}
