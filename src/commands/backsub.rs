//! # backsub 命令实现
//!
//! 用参考背景谱对光谱文件做背景扣除。
//!
//! ## 功能
//! - 单文件：写出 `<stem>_sub.txt`（或 `--output` 指定的路径）
//! - 目录：收集匹配文件并行处理，输出到 `--output` 目录（默认原目录）
//! - 可选写出逐条谱线的拟合报告 CSV 与重建背景 `<stem>_bg.txt`
//!
//! ## 依赖关系
//! - 使用 `cli/backsub.rs` 定义的参数
//! - 使用 `commands/loading.rs` 读取参考背景
//! - 使用 `models/dataset.rs`, `analysis/background.rs`, `analysis/export.rs`
//! - 使用 `batch/` 进行目录批量处理
//! - 使用 `utils/output.rs`

use crate::analysis::export::{background_report_to_csv, BackgroundReportRow};
use crate::analysis::{BackgroundFit, FitWindow, ShiftMode};
use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::backsub::BacksubArgs;
use crate::commands::loading::load_background;
use crate::error::{RamanError, Result};
use crate::models::{Coordinate, SpectralDataset, Spectrum};
use crate::parsers::write_table_file;
use crate::settings::Settings;
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};

/// 一个文件的扣除结果：每条谱线的坐标与拟合
type FileFits = Vec<(Coordinate, BackgroundFit)>;

/// 单个文件的处理参数
struct Job<'a> {
    background: Spectrum<'a>,
    window: FitWindow,
    shift: ShiftMode,
    shape: Option<(usize, usize)>,
    overwrite: bool,
    save_background: bool,
}

/// 执行 backsub 命令
pub fn execute(args: BacksubArgs, settings: &Settings) -> Result<()> {
    if !args.input.exists() {
        return Err(RamanError::FileNotFound {
            path: args.input.display().to_string(),
        });
    }

    let window = args.window.unwrap_or(settings.background.window);
    let background_data = load_background(&args.background)?;
    let background = background_data.trace_at(0)?;

    output::print_header(&format!("Background subtraction ({} cm⁻¹, shift {})", window, args.shift));

    let job = Job {
        background,
        window,
        shift: args.shift,
        shape: args.shape,
        overwrite: args.overwrite,
        save_background: args.save_background,
    };

    let fits = if args.input.is_dir() {
        run_directory(&args, &job)?
    } else {
        run_single(&args, &job)?
    };

    if let Some(report) = &args.report {
        let rows: Vec<BackgroundReportRow<'_>> = fits
            .iter()
            .flat_map(|(path, file_fits)| {
                file_fits.iter().enumerate().map(move |(trace, (coordinate, fit))| BackgroundReportRow {
                    file: path.display().to_string(),
                    trace,
                    coordinate: *coordinate,
                    fit,
                })
            })
            .collect();
        background_report_to_csv(&rows, report)?;
        output::print_success(&format!("Fit report saved to '{}'", report.display()));
    }

    Ok(())
}

/// 单文件模式
fn run_single(args: &BacksubArgs, job: &Job<'_>) -> Result<Vec<(PathBuf, FileFits)>> {
    let output_path = match &args.output {
        Some(path) if path.is_dir() => subtracted_path(&args.input, path),
        Some(path) => path.clone(),
        None => subtracted_path(&args.input, parent_dir(&args.input)),
    };

    match process_file(&args.input, &output_path, job)? {
        Some(file_fits) => {
            output::print_written(&args.input.display().to_string(), &output_path.display().to_string());
            report_shifts(&args.input.display().to_string(), &file_fits);
            Ok(vec![(args.input.clone(), file_fits)])
        }
        None => {
            output::print_skip(&format!(
                "'{}' exists (use --overwrite to replace)",
                output_path.display()
            ));
            Ok(Vec::new())
        }
    }
}

/// 目录批量模式
fn run_directory(args: &BacksubArgs, job: &Job<'_>) -> Result<Vec<(PathBuf, FileFits)>> {
    let output_dir = args.output.clone().unwrap_or_else(|| args.input.clone());
    fs::create_dir_all(&output_dir).map_err(|e| RamanError::FileWriteError {
        path: output_dir.display().to_string(),
        source: e,
    })?;

    let background_path = fs::canonicalize(&args.background).ok();
    let files: Vec<PathBuf> = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect()?
        .into_iter()
        .filter(|f| fs::canonicalize(f).ok() != background_path)
        .filter(|f| !is_generated_output(f))
        .collect();

    if files.is_empty() {
        return Err(RamanError::NoFilesFound {
            pattern: format!("{}/{}", args.input.display(), args.pattern),
        });
    }
    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Found {} file(s) to process on {} thread(s)",
        files.len(),
        runner.jobs()
    ));

    let result = runner.run(&files, |path| {
        let output_path = subtracted_path(path, &output_dir);
        match process_file(path, &output_path, job) {
            Ok(Some(file_fits)) => ProcessResult::Success(path.to_path_buf(), file_fits),
            Ok(None) => ProcessResult::Skipped(path.to_path_buf()),
            Err(e) => ProcessResult::Failed(path.to_path_buf(), e.to_string()),
        }
    })?;

    for path in &result.skipped {
        output::print_skip(&format!("'{}' already subtracted", path.display()));
    }
    for (path, err) in &result.failures {
        output::print_error(&format!("{}: {}", path.display(), err));
    }

    output::print_batch_summary(
        result.success(),
        result.skipped.len(),
        result.failed(),
        &output_dir.display().to_string(),
    );

    Ok(result.outputs)
}

/// 处理单个文件；输出已存在且不覆盖时返回 `None`
fn process_file(input: &Path, output_path: &Path, job: &Job<'_>) -> Result<Option<FileFits>> {
    if output_path.exists() && !job.overwrite {
        return Ok(None);
    }

    let dataset = SpectralDataset::load(input, job.shape)?;
    let (subtracted, fits) = dataset.background_subtract_with_report(job.background, job.window, job.shift)?;
    write_table_file(&subtracted, output_path)?;

    if job.save_background {
        let fitted = dataset.with_traces(fits.iter().map(|fit| fit.background.clone()).collect())?;
        write_table_file(&fitted, &fitted_background_path(input, parent_dir(output_path)))?;
    }

    Ok(Some(subtracted.coordinates().iter().copied().zip(fits).collect()))
}

fn report_shifts(label: &str, file_fits: &FileFits) {
    for (i, (coordinate, fit)) in file_fits.iter().enumerate() {
        log::info!(
            "trace {} at {}: shift {}, scale {:.4}, offset {:.4}",
            i,
            coordinate,
            fit.shift,
            fit.scale,
            fit.offset
        );
    }
    if let [(_, fit)] = file_fits.as_slice() {
        output::print_background_fit(label, fit);
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn stem(input: &Path) -> &str {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
}

/// `<dir>/<stem>_sub.txt`
fn subtracted_path(input: &Path, dir: &Path) -> PathBuf {
    dir.join(format!("{}_sub.txt", stem(input)))
}

/// `<dir>/<stem>_bg.txt`
fn fitted_background_path(input: &Path, dir: &Path) -> PathBuf {
    dir.join(format!("{}_bg.txt", stem(input)))
}

/// 本命令写出的文件，目录模式下不再作为输入
fn is_generated_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.ends_with("_sub") || s.ends_with("_bg"))
        .unwrap_or(false)
}
