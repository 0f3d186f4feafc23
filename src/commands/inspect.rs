//! # inspect 命令实现
//!
//! 读取光谱文件并显示其结构信息。
//!
//! ## 功能
//! - 采集类型、形状、谱线数
//! - 波数轴范围与通道数
//! - 坐标表格（含每条谱线的强度范围）
//!
//! ## 依赖关系
//! - 使用 `cli/inspect.rs` 定义的参数
//! - 使用 `models/dataset.rs`
//! - 使用 `utils/output.rs`

use crate::cli::inspect::InspectArgs;
use crate::error::{RamanError, Result};
use crate::models::SpectralDataset;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 坐标表格行
#[derive(Debug, Clone, Tabled)]
struct CoordinateRow {
    #[tabled(rename = "Trace")]
    trace: usize,
    #[tabled(rename = "x")]
    x: String,
    #[tabled(rename = "y")]
    y: String,
    #[tabled(rename = "z")]
    z: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

/// 执行 inspect 命令
pub fn execute(args: InspectArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(RamanError::FileNotFound {
            path: args.input.display().to_string(),
        });
    }

    let dataset = SpectralDataset::load(&args.input, args.shape)?;
    output::print_header(&format!("Inspecting {}", args.input.display()));

    let kind = dataset
        .kind()
        .map(|k| k.to_string())
        .unwrap_or_else(|| "empty".to_string());
    output::print_field("Kind", &kind);
    output::print_field("Shape (a, b, d)", &dataset.shape().to_string());
    output::print_field("Traces", &dataset.len().to_string());

    let axis = dataset.x_axis();
    if let (Some(first), Some(last)) = (axis.first(), axis.last()) {
        output::print_field(
            "Wavenumbers",
            &format!("{} channels, {} to {} cm⁻¹", axis.len(), first, last),
        );
    }

    let missing = dataset
        .traces()
        .iter()
        .flatten()
        .filter(|v| v.is_nan())
        .count();
    if missing > 0 {
        output::print_warning(&format!("{} missing intensity value(s)", missing));
    }

    let limit = if args.limit == 0 { dataset.len() } else { args.limit };
    let rows = coordinate_rows(&dataset, limit);
    if !rows.is_empty() {
        println!();
        println!("{}", Table::new(&rows));
        if dataset.len() > rows.len() {
            output::print_info(&format!(
                "{} more trace(s) not shown (use --limit 0 to list all)",
                dataset.len() - rows.len()
            ));
        }
    }

    Ok(())
}

fn coordinate_rows(dataset: &SpectralDataset, limit: usize) -> Vec<CoordinateRow> {
    dataset
        .coordinates()
        .iter()
        .zip(dataset.traces())
        .take(limit)
        .enumerate()
        .map(|(i, (c, trace))| {
            let finite = trace.iter().copied().filter(|v| v.is_finite());
            let min = finite.clone().fold(f64::INFINITY, f64::min);
            let max = finite.fold(f64::NEG_INFINITY, f64::max);
            CoordinateRow {
                trace: i,
                x: format!("{}", c.x),
                y: format!("{}", c.y),
                z: format!("{}", c.z),
                min: format_bound(min),
                max: format_bound(max),
            }
        })
        .collect()
}

fn format_bound(v: f64) -> String {
    if v.is_finite() {
        format!("{:.4}", v)
    } else {
        "-".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::table::parse_table_content;

    #[test]
    fn test_coordinate_rows() {
        let content = "\t100\t200\n0\t1\t\n1\t4\t5\n2\t7\t8\n";
        let dataset = SpectralDataset::from_acquisition(parse_table_content(content, "line").unwrap(), None).unwrap();

        let rows = coordinate_rows(&dataset, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].min, "1.0000");
        assert_eq!(rows[0].max, "1.0000");
        assert_eq!(rows[1].x, "1");
        assert_eq!(rows[1].max, "5.0000");
    }
}
