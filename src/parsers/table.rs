//! # 制表符分隔光谱表格解析器
//!
//! 解析 LabRam 仪器导出的 `.txt` 表格，并按结构判断采集类型。
//!
//! ## 格式说明
//! ```text
//! 单点谱:    x      y                (无表头，每行一个通道)
//! 线扫描:    <空>   w1   w2   ...    (首行为波数)
//!            c1     i11  i12  ...    (每行一条谱线，首列为坐标)
//! 二维面扫:  <空>   <空> w1   w2 ... (首行为波数)
//!            x1     y1   i11  i12 ...
//! ```
//! 空单元格与非数值单元格一律视为缺失 (NaN)。开头完全没有数值的行视为文字表头并跳过。
//!
//! ## 依赖关系
//! - 被 `models/dataset.rs` 使用
//! - 使用 `models/dataset.rs` 的 Coordinate, AcquisitionKind

use crate::error::{RamanError, Result};
use crate::models::{AcquisitionKind, Coordinate, SpectralDataset};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// 一次文件读取的结果（尚未并入数据集）
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// 采集类型
    pub kind: AcquisitionKind,
    /// 波数轴
    pub x_axis: Vec<f64>,
    /// 谱线强度
    pub traces: Vec<Vec<f64>>,
    /// 每条谱线的空间坐标
    pub coordinates: Vec<Coordinate>,
}

/// 读取并分类光谱文件
pub fn read_table_file(path: &Path) -> Result<Acquisition> {
    let content = fs::read_to_string(path).map_err(|e| RamanError::ParseError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    parse_table_content(&content, &path.display().to_string())
}

/// 从字符串内容解析并分类
pub fn parse_table_content(content: &str, source: &str) -> Result<Acquisition> {
    let rows = parse_rows(content, source)?;
    classify(rows, source)
}

/// 把文本拆成等长的数值行
fn parse_rows(content: &str, source: &str) -> Result<Vec<Vec<f64>>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        // 行首的制表符有意义，只去掉行尾回车
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let row: Vec<f64> = line.split('\t').map(parse_cell).collect();

        // 开头的纯文字表头
        if rows.is_empty() && row.iter().all(|v| v.is_nan()) {
            log::debug!("{}: skipping header line {}", source, line_no + 1);
            continue;
        }

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(parse_error(
                    source,
                    format!(
                        "line {} has {} columns, expected {}",
                        line_no + 1,
                        row.len(),
                        first.len()
                    ),
                ));
            }
        }

        rows.push(row);
    }

    if rows.is_empty() {
        return Err(parse_error(source, "no numeric rows found".to_string()));
    }
    if rows[0].len() < 2 {
        return Err(parse_error(source, "at least two columns are required".to_string()));
    }

    Ok(rows)
}

fn parse_cell(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// 按首行缺失标记判断单点、线扫描或二维面扫
fn classify(rows: Vec<Vec<f64>>, source: &str) -> Result<Acquisition> {
    let first = &rows[0];

    if !first[0].is_nan() {
        // 单点谱：首列为波数，末列为强度
        let last = first.len() - 1;
        if last > 1 {
            log::debug!(
                "{}: single spectrum with {} columns, using the last as intensity",
                source,
                first.len()
            );
        }
        let x_axis: Vec<f64> = rows.iter().map(|r| r[0]).collect();
        let trace: Vec<f64> = rows.iter().map(|r| r[last]).collect();
        validate_axis(&x_axis, source)?;

        return Ok(Acquisition {
            kind: AcquisitionKind::Point,
            x_axis,
            traces: vec![trace],
            coordinates: vec![Coordinate::ORIGIN],
        });
    }

    let (kind, data_start) = if !first[1].is_nan() {
        (AcquisitionKind::Line, 1)
    } else {
        (AcquisitionKind::Map, 2)
    };

    if first.len() <= data_start {
        return Err(parse_error(source, "header row holds no wavenumbers".to_string()));
    }
    if rows.len() < 2 {
        return Err(parse_error(source, "header row without spectra".to_string()));
    }

    let x_axis = first[data_start..].to_vec();
    validate_axis(&x_axis, source)?;

    let body = &rows[1..];
    let traces = body.iter().map(|r| r[data_start..].to_vec()).collect();
    let coordinates = body
        .iter()
        .map(|r| match kind {
            AcquisitionKind::Map => Coordinate::new(r[0], r[1], 0.0),
            _ => Coordinate::new(r[0], 0.0, 0.0),
        })
        .collect();

    Ok(Acquisition {
        kind,
        x_axis,
        traces,
        coordinates,
    })
}

/// 波数轴必须为有限值且严格单调
fn validate_axis(x_axis: &[f64], source: &str) -> Result<()> {
    if x_axis.iter().any(|v| !v.is_finite()) {
        return Err(parse_error(source, "wavenumber axis contains missing values".to_string()));
    }

    let ascending = x_axis.windows(2).all(|w| w[1] > w[0]);
    let descending = x_axis.windows(2).all(|w| w[1] < w[0]);
    if !ascending && !descending {
        return Err(parse_error(source, "wavenumber axis is not strictly monotonic".to_string()));
    }

    Ok(())
}

fn parse_error(source: &str, reason: String) -> RamanError {
    RamanError::ParseError {
        path: source.to_string(),
        reason,
    }
}

// ─────────────────────────────────────────────────────────────
// 写出
// ─────────────────────────────────────────────────────────────

/// 将数据集转换为可重新读取的制表符分隔表格
pub fn to_table_string(dataset: &SpectralDataset) -> String {
    let mut out = String::new();
    let x_axis = dataset.x_axis();
    let traces = dataset.traces();
    let coordinates = dataset.coordinates();

    let kind = match dataset.kind() {
        Some(AcquisitionKind::Point) if traces.len() == 1 => AcquisitionKind::Point,
        Some(AcquisitionKind::Map) => AcquisitionKind::Map,
        _ => AcquisitionKind::Line,
    };

    match kind {
        AcquisitionKind::Point => {
            if coordinates[0] != Coordinate::ORIGIN {
                log::warn!("Point coordinate {} is not stored in the table", coordinates[0]);
            }
            for (x, y) in x_axis.iter().zip(&traces[0]) {
                let _ = writeln!(out, "{}\t{}", x, format_cell(*y));
            }
        }
        AcquisitionKind::Line | AcquisitionKind::Map => {
            let is_map = kind == AcquisitionKind::Map;
            let dropped = coordinates
                .iter()
                .any(|c| c.z != 0.0 || (!is_map && c.y != 0.0));
            if dropped {
                log::warn!("Coordinates beyond the {} layout are not stored in the table", kind);
            }

            out.push_str(if is_map { "\t" } else { "" });
            for x in x_axis {
                let _ = write!(out, "\t{}", x);
            }
            out.push('\n');

            for (trace, coord) in traces.iter().zip(coordinates) {
                out.push_str(&format_cell(coord.x));
                if is_map {
                    let _ = write!(out, "\t{}", format_cell(coord.y));
                }
                for v in trace {
                    let _ = write!(out, "\t{}", format_cell(*v));
                }
                out.push('\n');
            }
        }
    }

    out
}

/// 缺失值写为空单元格
fn format_cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

/// 写出表格文件
pub fn write_table_file(dataset: &SpectralDataset, path: &Path) -> Result<()> {
    fs::write(path, to_table_string(dataset)).map_err(|e| RamanError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}
