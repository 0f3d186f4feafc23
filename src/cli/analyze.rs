//! # analyze 子命令 CLI 定义
//!
//! 分析功能统一入口，包含多个子命令：
//! - `nmf`: 非负矩阵分解
//! - `svd`: 奇异值谱（估计组分数）
//! - `peak`: Lorentzian 峰拟合
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/analyze/` 相应模块

use super::parse_shape_hint;
use crate::analysis::{FitWindow, NmfInit};

use clap::{Args, Subcommand};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// Analyze 主命令
// ─────────────────────────────────────────────────────────────

/// analyze 主命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

/// analyze 子命令
#[derive(Subcommand, Debug)]
pub enum AnalyzeCommands {
    /// Non-negative matrix factorization of the selected traces
    Nmf(NmfArgs),

    /// Singular value spectrum of the selected traces
    Svd(SvdArgs),

    /// Fit a Lorentzian peak in each selected trace
    Peak(PeakArgs),
}

// ─────────────────────────────────────────────────────────────
// 通用输入参数
// ─────────────────────────────────────────────────────────────

/// 数据输入：多个文件或目录会按自然顺序叠加，默认 z 为序号
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Spectrum files or directories
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Background file subtracted (auto shift, stored window) before analysis
    #[arg(short, long)]
    pub background: Option<PathBuf>,

    /// Place stacked files along x with this spacing instead of numbering layers
    #[arg(long)]
    pub step: Option<f64>,

    /// Glob pattern for files inside directory inputs (comma-separated)
    #[arg(long, default_value = "*.txt")]
    pub pattern: String,

    /// Map dimensions AxB for a single map input
    #[arg(long, value_parser = parse_shape_hint)]
    pub shape: Option<(usize, usize)>,

    /// Trace indices to use, e.g. "0,3,5-8" (default: all)
    #[arg(long)]
    pub indices: Option<String>,
}

// ─────────────────────────────────────────────────────────────
// NMF 子命令
// ─────────────────────────────────────────────────────────────

/// NMF 子命令参数；未给出的参数取自设置文件
#[derive(Args, Debug)]
pub struct NmfArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Number of components
    #[arg(short = 'k', long)]
    pub rank: Option<usize>,

    /// Regularization strength
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Share of L1 in the regularization (0 = L2 only, 1 = L1 only)
    #[arg(long)]
    pub l1_ratio: Option<f64>,

    /// Initialization: random or nndsvd
    #[arg(long)]
    pub init: Option<NmfInit>,

    /// Maximum number of iterations
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Random seed for random initialization
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output CSV for component spectra
    #[arg(short, long, default_value = "nmf_components.csv")]
    pub output: PathBuf,

    /// Output CSV for per-trace weights
    #[arg(long, default_value = "nmf_weights.csv")]
    pub weights: PathBuf,
}

// ─────────────────────────────────────────────────────────────
// SVD 子命令
// ─────────────────────────────────────────────────────────────

/// SVD 子命令参数
#[derive(Args, Debug)]
pub struct SvdArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Number of leading singular values to print
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Output CSV for the full singular value spectrum
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────
// Peak 子命令
// ─────────────────────────────────────────────────────────────

/// Peak 子命令参数
#[derive(Args, Debug)]
pub struct PeakArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Fit window in cm⁻¹, e.g. "2500-2900" (default: stored setting)
    #[arg(short, long, allow_hyphen_values = true)]
    pub window: Option<FitWindow>,

    /// Initial peak center (cm⁻¹)
    #[arg(long)]
    pub center: Option<f64>,

    /// Output CSV for the fitted parameters
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
