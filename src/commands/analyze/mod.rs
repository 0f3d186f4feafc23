//! # analyze 命令实现
//!
//! 分析功能统一入口，包含多个子命令：
//! - `nmf`: 非负矩阵分解
//! - `svd`: 奇异值谱
//! - `peak`: Lorentzian 峰拟合
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 子模块: nmf, svd, peak

pub mod nmf;
pub mod peak;
pub mod svd;

use crate::cli::analyze::{AnalyzeArgs, AnalyzeCommands};
use crate::error::Result;
use crate::settings::Settings;

/// 执行 analyze 命令
pub fn execute(args: AnalyzeArgs, settings: &Settings) -> Result<()> {
    match args.command {
        AnalyzeCommands::Nmf(nmf_args) => nmf::execute(nmf_args, settings),
        AnalyzeCommands::Svd(svd_args) => svd::execute(svd_args, settings),
        AnalyzeCommands::Peak(peak_args) => peak::execute(peak_args, settings),
    }
}
