//! # 统一错误处理模块
//!
//! 定义 ramankit 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - 解析错误：文件不可读或数值格式错误，加载失败且数据集不变
//! - 坐标轴不匹配：两条光谱的 x 轴长度或端点不一致，永不自动修正
//! - 维度错误：显式声明的形状与谱线数不一致
//! - 维度警告：自动推断的形状不能整除，操作仍然完成
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// ramankit 统一错误类型
#[derive(Error, Debug)]
pub enum RamanError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse spectrum file: {path}\nReason: {reason}")]
    ParseError { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 数据结构错误
    // ─────────────────────────────────────────────────────────────
    #[error("X-axis mismatch: {0}")]
    AxisMismatch(String),

    #[error("Dimension mismatch: shape {shape} does not cover {traces} traces")]
    DimensionError { shape: String, traces: usize },

    #[error("Dimension warning: {traces} traces are not evenly divisible, best-effort shape {shape}")]
    DimensionWarning { shape: String, traces: usize },

    #[error("Trace index {index} out of range (dataset has {len} traces)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Dataset contains no traces")]
    EmptyDataset,

    // ─────────────────────────────────────────────────────────────
    // 数值计算错误
    // ─────────────────────────────────────────────────────────────
    #[error("Least-squares system is singular: {0}")]
    SingularFit(String),

    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid range format: {0}")]
    InvalidRange(String),

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Settings error: {0}")]
    SettingsError(String),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

impl RamanError {
    /// 是否为可忽略的警告（自动推断形状不整除）
    pub fn is_warning(&self) -> bool {
        matches!(self, RamanError::DimensionWarning { .. })
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RamanError>;
