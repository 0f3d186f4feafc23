//! # config 命令实现
//!
//! 显示、修改或重置 JSON 设置文件。
//!
//! ## 依赖关系
//! - 使用 `cli/config.rs` 定义的参数
//! - 使用 `settings.rs`
//! - 使用 `utils/output.rs`

use crate::cli::config::{ConfigArgs, ConfigCommands};
use crate::error::Result;
use crate::settings::Settings;
use crate::utils::output;

use std::path::Path;

/// 执行 config 命令
pub fn execute(args: ConfigArgs, path: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let settings = Settings::load(path)?;
            let source = if path.exists() {
                path.display().to_string()
            } else {
                format!("{} (not found, defaults)", path.display())
            };
            output::print_header(&format!("Settings: {}", source));
            for (key, value) in settings.entries() {
                output::print_field(key, &value);
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut settings = Settings::load(path)?;
            settings.set(&key, &value)?;
            settings.save(path)?;
            output::print_success(&format!("{} = {} ({})", key, value, path.display()));
        }
        ConfigCommands::Reset => {
            Settings::default().save(path)?;
            output::print_success(&format!("Settings reset to defaults ({})", path.display()));
        }
    }
    Ok(())
}
