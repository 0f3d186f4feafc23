//! # 数据加载
//!
//! 将命令行输入组装为一个数据集。
//!
//! ## 规则
//! - 单个文件：直接读取，面扫可使用形状提示
//! - 多个文件或目录：目录按自然顺序展开，所有文件依次叠加，
//!   第 i 个文件的坐标 z 置为 i（单点谱即坐标 (0, 0, i)）；
//!   给出 `--step` 时改为沿 x 偏移 i·step
//! - 给出 `--background` 时先做自动平移背景扣除
//!
//! ## 依赖关系
//! - 被 `commands/analyze/` 与 `commands/backsub.rs` 调用
//! - 使用 `batch/collector.rs` 收集目录文件
//! - 使用 `models/dataset.rs`

use crate::analysis::FitWindow;
use crate::batch::FileCollector;
use crate::cli::analyze::InputArgs;
use crate::cli::parse_indices;
use crate::error::{RamanError, Result};
use crate::models::{Coordinate, Placement, SpectralDataset};
use crate::utils::output;

use std::path::{Path, PathBuf};

/// 展开输入路径：文件保持给定顺序，目录按自然顺序展开
pub fn expand_inputs(inputs: &[PathBuf], pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let found = FileCollector::new(input.clone())
                .with_pattern(pattern)?
                .collect()?;
            if found.is_empty() {
                return Err(RamanError::NoFilesFound {
                    pattern: format!("{}/{}", input.display(), pattern),
                });
            }
            files.extend(found);
        } else {
            return Err(RamanError::FileNotFound {
                path: input.display().to_string(),
            });
        }
    }

    Ok(files)
}

/// 依次叠加多个文件：默认第 i 个文件置于第 i 层，给出 `step` 时沿 x 排开
pub fn stack_files(files: &[PathBuf], step: Option<f64>) -> Result<SpectralDataset> {
    let mut dataset = SpectralDataset::new();
    for (i, path) in files.iter().enumerate() {
        let placement = match step {
            Some(step) => Placement::At(Coordinate::new(i as f64 * step, 0.0, 0.0)),
            None => Placement::Layer(i as f64),
        };
        dataset
            .append_trace(path, placement)
            .map_err(|e| with_path(e, path))?;
    }
    if dataset.is_empty() {
        return Err(RamanError::EmptyDataset);
    }
    Ok(dataset)
}

fn with_path(err: RamanError, path: &Path) -> RamanError {
    match err {
        RamanError::AxisMismatch(reason) => {
            RamanError::AxisMismatch(format!("{}: {}", path.display(), reason))
        }
        other => other,
    }
}

/// 读取参考背景文件；多条谱线时只用第一条
pub fn load_background(path: &Path) -> Result<SpectralDataset> {
    if !path.is_file() {
        return Err(RamanError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let background = SpectralDataset::load(path, None)?;
    if background.len() > 1 {
        output::print_warning(&format!(
            "Background file holds {} traces; using the first",
            background.len()
        ));
    }
    Ok(background)
}

/// 按命令行输入加载数据集，`window` 为背景拟合窗口
pub fn load_inputs(args: &InputArgs, window: FitWindow) -> Result<SpectralDataset> {
    let files = expand_inputs(&args.inputs, &args.pattern)?;

    let dataset = match files.as_slice() {
        [] => return Err(RamanError::EmptyDataset),
        [single] => SpectralDataset::load(single, args.shape)?,
        many => {
            if args.shape.is_some() {
                log::warn!("--shape ignored when stacking {} files", many.len());
            }
            stack_files(many, args.step)?
        }
    };

    match &args.background {
        Some(path) => {
            let background = load_background(path)?;
            log::info!("Subtracting background {} inside {}", path.display(), window);
            dataset.background_subtract(background.trace_at(0)?, window)
        }
        None => Ok(dataset),
    }
}

/// 解析 `--indices`
pub fn selected_indices(args: &InputArgs) -> Result<Option<Vec<usize>>> {
    args.indices
        .as_deref()
        .map(|s| parse_indices(s).map_err(RamanError::InvalidArgument))
        .transpose()
}
