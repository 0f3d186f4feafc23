//! # 光谱分析模块
//!
//! 提供 Raman 光谱的数值分析功能。
//!
//! ## 子模块
//! - `background`: 带通道漂移搜索的背景扣除拟合
//! - `decomposition`: NMF / SVD 分解
//! - `peak`: Lorentzian 峰拟合
//! - `export`: 分析结果导出
//!
//! ## 依赖关系
//! - 被 `models/dataset.rs` 与 `commands/` 使用
//! - 使用 `nalgebra` 做线性代数

pub mod background;
pub mod decomposition;
pub mod export;
pub mod peak;

pub use background::{BackgroundFit, BackgroundFitter, FitWindow, ShiftMode};
pub use decomposition::{explained_fraction, nmf, singular_values, NmfConfig, NmfInit, NmfModel};
pub use peak::{default_peak_window, fit_lorentzian, LorentzianFit, LorentzianParams};
