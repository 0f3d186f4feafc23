//! # 分析结果导出
//!
//! 将分解、背景扣除与峰拟合的结果写为 CSV。
//!
//! ## 文件格式
//! - 组分谱：`wavenumber, component_1, …, component_k`
//! - 权重：`trace, x, y, z, weight_1, …, weight_k`
//! - 奇异值：`index, value, fraction`
//! - 背景拟合报告：`file, trace, x, y, z, shift, scale, offset, sum_sq, points`
//! - 峰拟合：`trace, x, y, z, amplitude, center, width_sq, baseline, fwhm, height, sum_sq, converged`
//!
//! ## 依赖关系
//! - 被 `commands/backsub.rs` 与 `commands/analyze/` 调用
//! - 使用 `csv` 库写入

use crate::analysis::{explained_fraction, BackgroundFit, LorentzianFit, NmfModel};
use crate::error::{RamanError, Result};
use crate::models::Coordinate;

use std::fs::File;
use std::path::Path;

/// 背景拟合报告中的一行
#[derive(Debug, Clone)]
pub struct BackgroundReportRow<'a> {
    pub file: String,
    pub trace: usize,
    pub coordinate: Coordinate,
    pub fit: &'a BackgroundFit,
}

fn open_writer(output_path: &Path) -> Result<csv::Writer<File>> {
    Ok(csv::Writer::from_path(output_path)?)
}

fn finish(mut wtr: csv::Writer<File>, output_path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| RamanError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })
}

fn coordinate_cells(c: &Coordinate) -> [String; 3] {
    [format!("{}", c.x), format!("{}", c.y), format!("{}", c.z)]
}

/// 导出 NMF 组分谱
pub fn components_to_csv(model: &NmfModel, x_axis: &[f64], output_path: &Path) -> Result<()> {
    let rank = model.components.nrows();
    if model.components.ncols() != x_axis.len() {
        return Err(RamanError::AxisMismatch(format!(
            "{} component channels for {} wavenumbers",
            model.components.ncols(),
            x_axis.len()
        )));
    }

    let mut wtr = open_writer(output_path)?;

    let mut header = vec!["wavenumber".to_string()];
    header.extend((1..=rank).map(|k| format!("component_{}", k)));
    wtr.write_record(&header)?;

    for (c, wavenumber) in x_axis.iter().enumerate() {
        let mut row = Vec::with_capacity(rank + 1);
        row.push(format!("{}", wavenumber));
        row.extend((0..rank).map(|k| format!("{:.6e}", model.components[(k, c)])));
        wtr.write_record(&row)?;
    }

    finish(wtr, output_path)
}

/// 导出 NMF 权重，每行对应一条光谱及其坐标
pub fn weights_to_csv(
    model: &NmfModel,
    indices: &[usize],
    coordinates: &[Coordinate],
    output_path: &Path,
) -> Result<()> {
    let rank = model.weights.ncols();
    if model.weights.nrows() != indices.len() {
        return Err(RamanError::InvalidArgument(format!(
            "{} weight rows for {} selected traces",
            model.weights.nrows(),
            indices.len()
        )));
    }

    let mut wtr = open_writer(output_path)?;

    let mut header: Vec<String> = ["trace", "x", "y", "z"].iter().map(|s| s.to_string()).collect();
    header.extend((1..=rank).map(|k| format!("weight_{}", k)));
    wtr.write_record(&header)?;

    for (row_idx, &trace) in indices.iter().enumerate() {
        let coordinate = coordinates.get(trace).ok_or(RamanError::IndexOutOfRange {
            index: trace,
            len: coordinates.len(),
        })?;

        let mut row = vec![trace.to_string()];
        row.extend(coordinate_cells(coordinate));
        row.extend((0..rank).map(|k| format!("{:.6e}", model.weights[(row_idx, k)])));
        wtr.write_record(&row)?;
    }

    finish(wtr, output_path)
}

/// 导出奇异值及其能量占比
pub fn singular_values_to_csv(values: &[f64], output_path: &Path) -> Result<()> {
    let fractions = explained_fraction(values);
    let mut wtr = open_writer(output_path)?;

    wtr.write_record(["index", "value", "fraction"])?;
    for (i, (value, fraction)) in values.iter().zip(&fractions).enumerate() {
        wtr.write_record(&[
            (i + 1).to_string(),
            format!("{:.6e}", value),
            format!("{:.6}", fraction),
        ])?;
    }

    finish(wtr, output_path)
}

/// 导出背景扣除拟合报告
pub fn background_report_to_csv(rows: &[BackgroundReportRow<'_>], output_path: &Path) -> Result<()> {
    let mut wtr = open_writer(output_path)?;

    wtr.write_record([
        "file", "trace", "x", "y", "z", "shift", "scale", "offset", "sum_sq", "points",
    ])?;

    for row in rows {
        let mut record = vec![row.file.clone(), row.trace.to_string()];
        record.extend(coordinate_cells(&row.coordinate));
        record.extend([
            row.fit.shift.to_string(),
            format!("{:.6}", row.fit.scale),
            format!("{:.6}", row.fit.offset),
            format!("{:.6e}", row.fit.sum_sq),
            row.fit.points.to_string(),
        ]);
        wtr.write_record(&record)?;
    }

    finish(wtr, output_path)
}

/// 导出峰拟合结果；失败的光谱写空值
pub fn peak_fits_to_csv(
    fits: &[(usize, Coordinate, Option<LorentzianFit>)],
    output_path: &Path,
) -> Result<()> {
    let mut wtr = open_writer(output_path)?;

    wtr.write_record([
        "trace", "x", "y", "z", "amplitude", "center", "width_sq", "baseline", "fwhm", "height",
        "sum_sq", "converged", "iterations", "points",
    ])?;

    for (trace, coordinate, fit) in fits {
        let mut record = vec![trace.to_string()];
        record.extend(coordinate_cells(coordinate));
        match fit {
            Some(fit) => {
                let p = &fit.params;
                record.extend([
                    format!("{:.6}", p.amplitude),
                    format!("{:.4}", p.center),
                    format!("{:.6}", p.width_sq),
                    format!("{:.6}", p.baseline),
                    format!("{:.4}", p.fwhm()),
                    format!("{:.6}", p.height()),
                    format!("{:.6e}", fit.sum_sq),
                    fit.converged.to_string(),
                    fit.iterations.to_string(),
                    fit.points.to_string(),
                ]);
            }
            None => record.extend(std::iter::repeat(String::new()).take(10)),
        }
        wtr.write_record(&record)?;
    }

    finish(wtr, output_path)
}
