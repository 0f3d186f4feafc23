//! # RamanKit - Raman 光谱处理工具箱
//!
//! 读取 LabRam 导出的单点谱、线扫描与二维面扫，做背景扣除与分解分析。
//!
//! ## 子命令
//! - `inspect` - 查看文件结构与坐标
//! - `backsub` - 背景扣除（单文件/目录批量）
//! - `analyze` - 分析功能
//!   - `nmf` - 非负矩阵分解
//!   - `svd` - 奇异值谱
//!   - `peak` - Lorentzian 峰拟合
//! - `config` - 设置文件管理
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── models/    (数据集)
//!   │     ├── parsers/   (表格读写)
//!   │     ├── analysis/  (背景拟合、分解、峰拟合)
//!   │     └── batch/     (批量处理)
//!   ├── settings.rs (持久化设置)
//!   ├── utils/      (输出与进度条)
//!   └── error.rs    (错误处理)
//! ```

mod analysis;
mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod settings;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli) {
        match std::error::Error::source(&e) {
            Some(source) => utils::output::print_error(&format!("{}: {}", e, source)),
            None => utils::output::print_error(&format!("{}", e)),
        }
        std::process::exit(1);
    }
}
