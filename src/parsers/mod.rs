//! # 解析器模块
//!
//! 读写 LabRam 导出的制表符分隔光谱表格。
//!
//! ## 依赖关系
//! - 被 `models/dataset.rs` 和 `commands/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: table

pub mod table;

pub use table::{read_table_file, write_table_file, Acquisition};
