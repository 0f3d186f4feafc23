//! # config 子命令 CLI 定义
//!
//! 查看或修改保存在 JSON 中的分析参数。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/config.rs`

use clap::{Args, Subcommand};

/// config 主命令参数
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// config 子命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print all stored settings
    Show,

    /// Set one value, e.g. `config set nmf.rank 3`
    Set {
        /// Setting key (background.window, peak.window, nmf.rank, nmf.init, nmf.alpha, nmf.l1_ratio, nmf.max_iter, nmf.tol, nmf.seed)
        key: String,
        /// New value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Restore default settings
    Reset,
}
