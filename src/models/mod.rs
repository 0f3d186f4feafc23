//! # 数据模型模块
//!
//! 定义拉曼光谱数据集模型：共享 x 轴、谱线、空间坐标与形状。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`analysis/` 和 `commands/` 使用
//! - 子模块: dataset

pub mod dataset;

pub use dataset::{AcquisitionKind, Coordinate, Placement, SpectralDataset, Spectrum};
