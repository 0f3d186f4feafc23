//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `models/`, `analysis/`, `settings.rs`, `utils/`
//! - 子模块: inspect, backsub, analyze, config, loading

pub mod analyze;
pub mod backsub;
pub mod config;
pub mod inspect;
pub mod loading;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use crate::settings::Settings;

/// 执行命令
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Backsub(args) => backsub::execute(args, &Settings::load(&cli.settings)?),
        Commands::Analyze(args) => analyze::execute(args, &Settings::load(&cli.settings)?),
        Commands::Config(args) => config::execute(args, &cli.settings),
    }
}
