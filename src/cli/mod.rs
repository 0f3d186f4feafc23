//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `inspect`: 查看光谱文件的类型、形状与坐标
//! - `backsub`: 背景扣除（单文件或目录批量）
//! - `analyze`: 分析功能（嵌套子命令）
//!   - `nmf`: 非负矩阵分解
//!   - `svd`: 奇异值谱
//!   - `peak`: Lorentzian 峰拟合
//! - `config`: 查看/修改持久化设置
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: inspect, backsub, analyze, config

pub mod analyze;
pub mod backsub;
pub mod config;
pub mod inspect;

use crate::settings::DEFAULT_SETTINGS_FILE;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// RamanKit - Raman 光谱处理工具箱
#[derive(Parser)]
#[command(name = "ramankit")]
#[command(version)]
#[command(about = "Raman spectroscopy toolkit: loading, background subtraction and decomposition", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file (JSON) holding stored analysis parameters
    #[arg(long, global = true, env = "RAMANKIT_SETTINGS", default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Show acquisition kind, shape, axis and coordinates of a spectrum file
    Inspect(inspect::InspectArgs),

    /// Subtract a reference background from a file or a directory of files
    Backsub(backsub::BacksubArgs),

    /// Decompose or fit loaded spectra
    Analyze(analyze::AnalyzeArgs),

    /// Show or modify stored settings
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────
// 通用参数解析
// ─────────────────────────────────────────────────────────────

/// 解析面扫形状 "AxB"
pub fn parse_shape_hint(input: &str) -> Result<(usize, usize), String> {
    let parts: Vec<&str> = input.split(['x', 'X']).map(str::trim).collect();
    if parts.len() != 2 {
        return Err(format!("Invalid shape '{}': expected AxB, e.g. 20x15", input));
    }

    let a = parts[0]
        .parse::<usize>()
        .map_err(|_| format!("Invalid shape '{}': '{}' is not a count", input, parts[0]))?;
    let b = parts[1]
        .parse::<usize>()
        .map_err(|_| format!("Invalid shape '{}': '{}' is not a count", input, parts[1]))?;

    if a == 0 || b == 0 {
        return Err(format!("Invalid shape '{}': dimensions must be positive", input));
    }
    Ok((a, b))
}

/// 解析谱线序号列表，如 "0,3,5-8"（区间含两端）
pub fn parse_indices(input: &str) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();

    for part in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo = lo
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid index range '{}'", part))?;
                let hi = hi
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid index range '{}'", part))?;
                if hi < lo {
                    return Err(format!("Invalid index range '{}': end before start", part));
                }
                indices.extend(lo..=hi);
            }
            None => indices.push(
                part.parse::<usize>()
                    .map_err(|_| format!("Invalid index '{}'", part))?,
            ),
        }
    }

    if indices.is_empty() {
        return Err("No indices given".to_string());
    }
    Ok(indices)
}
