//! # inspect 子命令 CLI 定义
//!
//! 显示光谱文件的采集类型、排布形状、波数轴与坐标。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/inspect.rs`

use super::parse_shape_hint;

use clap::Args;
use std::path::PathBuf;

/// inspect 子命令参数
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Spectrum file (tab-delimited point, line or map export)
    pub input: PathBuf,

    /// Map dimensions AxB; falls back to automatic inference if inconsistent
    #[arg(long, value_parser = parse_shape_hint)]
    pub shape: Option<(usize, usize)>,

    /// Maximum number of coordinate rows to print (0 = all)
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,
}
