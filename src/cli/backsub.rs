//! # backsub 子命令 CLI 定义
//!
//! 用参考背景谱对单个文件或整个目录做背景扣除。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/backsub.rs`

use super::parse_shape_hint;
use crate::analysis::{FitWindow, ShiftMode};

use clap::Args;
use std::path::PathBuf;

/// backsub 子命令参数
#[derive(Args, Debug)]
pub struct BacksubArgs {
    /// Input: spectrum file or directory of spectrum files
    pub input: PathBuf,

    /// Background spectrum file (its first trace is used)
    #[arg(short, long)]
    pub background: PathBuf,

    /// Fit window in cm⁻¹, e.g. "1700-2100" (default: stored setting)
    #[arg(short, long, allow_hyphen_values = true)]
    pub window: Option<FitWindow>,

    /// Channel shift of the background: "auto" searches -5..=5, or a fixed integer
    #[arg(long, default_value = "auto", allow_hyphen_values = true)]
    pub shift: ShiftMode,

    /// Output: file path (single mode) or directory (batch mode); defaults to <stem>_sub.txt next to the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write a CSV report of the per-trace fits
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Also write the fitted background of every trace to <stem>_bg.txt
    #[arg(long, default_value_t = false)]
    pub save_background: bool,

    /// Map dimensions AxB for map inputs
    #[arg(long, value_parser = parse_shape_hint)]
    pub shape: Option<(usize, usize)>,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for input files (batch mode, comma-separated)
    #[arg(long, default_value = "*.txt")]
    pub pattern: String,

    /// Recurse into subdirectories (batch mode)
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
