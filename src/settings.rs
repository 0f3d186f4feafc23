//! # 用户设置
//!
//! 持久化用户的分析参数（拟合窗口、NMF 正则化等），以 JSON 保存。
//!
//! ## 键名
//! - `background.window`: 背景拟合窗口，如 `1700-2100`
//! - `peak.window`: 峰拟合窗口，如 `2500-2900`
//! - `nmf.rank` / `nmf.init` / `nmf.alpha` / `nmf.l1_ratio` / `nmf.max_iter` / `nmf.tol` / `nmf.seed`
//!
//! ## 依赖关系
//! - 被 `commands/` 读取，被 `commands/config.rs` 修改
//! - 使用 `serde_json` 读写

use crate::analysis::{default_peak_window, FitWindow, NmfConfig};
use crate::error::{RamanError, Result};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// 设置文件默认名
pub const DEFAULT_SETTINGS_FILE: &str = "ramankit.json";

/// 所有可设置的键
pub const KEYS: &[&str] = &[
    "background.window",
    "peak.window",
    "nmf.rank",
    "nmf.init",
    "nmf.alpha",
    "nmf.l1_ratio",
    "nmf.max_iter",
    "nmf.tol",
    "nmf.seed",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub background: BackgroundSettings,
    pub peak: PeakSettings,
    pub nmf: NmfConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSettings {
    pub window: FitWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakSettings {
    pub window: FitWindow,
}

impl Default for PeakSettings {
    fn default() -> Self {
        PeakSettings {
            window: default_peak_window(),
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| RamanError::SettingsError(format!("invalid value '{}' for {}: {}", value, key, e)))
}

impl Settings {
    /// 读取设置；文件不存在时返回默认值
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("settings file {} not found, using defaults", path.display());
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path).map_err(|e| RamanError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        serde_json::from_str(&content)
            .map_err(|e| RamanError::SettingsError(format!("{}: {}", path.display(), e)))
    }

    /// 以格式化 JSON 保存
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RamanError::SettingsError(e.to_string()))?;

        fs::write(path, content).map_err(|e| RamanError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// 按点分键名修改单个值
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "background.window" => self.background.window = parse_value(key, value)?,
            "peak.window" => self.peak.window = parse_value(key, value)?,
            "nmf.rank" => {
                let rank: usize = parse_value(key, value)?;
                if rank == 0 {
                    return Err(RamanError::SettingsError("nmf.rank must be at least 1".to_string()));
                }
                self.nmf.rank = rank;
            }
            "nmf.init" => self.nmf.init = parse_value(key, value)?,
            "nmf.alpha" => {
                let alpha: f64 = parse_value(key, value)?;
                if !(alpha >= 0.0 && alpha.is_finite()) {
                    return Err(RamanError::SettingsError("nmf.alpha must be non-negative".to_string()));
                }
                self.nmf.alpha = alpha;
            }
            "nmf.l1_ratio" => {
                let ratio: f64 = parse_value(key, value)?;
                if !(0.0..=1.0).contains(&ratio) {
                    return Err(RamanError::SettingsError("nmf.l1_ratio must be within [0, 1]".to_string()));
                }
                self.nmf.l1_ratio = ratio;
            }
            "nmf.max_iter" => self.nmf.max_iter = parse_value(key, value)?,
            "nmf.tol" => self.nmf.tol = parse_value(key, value)?,
            "nmf.seed" => self.nmf.seed = parse_value(key, value)?,
            _ => {
                return Err(RamanError::SettingsError(format!(
                    "unknown key '{}' (expected one of: {})",
                    key,
                    KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// 以 (键, 值) 列表形式展示
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("background.window", self.background.window.to_string()),
            ("peak.window", self.peak.window.to_string()),
            ("nmf.rank", self.nmf.rank.to_string()),
            ("nmf.init", self.nmf.init.to_string()),
            ("nmf.alpha", self.nmf.alpha.to_string()),
            ("nmf.l1_ratio", self.nmf.l1_ratio.to_string()),
            ("nmf.max_iter", self.nmf.max_iter.to_string()),
            ("nmf.tol", self.nmf.tol.to_string()),
            ("nmf.seed", self.nmf.seed.to_string()),
        ]
    }
}
