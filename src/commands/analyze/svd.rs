//! # SVD 子命令实现
//!
//! 显示选中谱线矩阵的奇异值谱，用于估计 NMF 的组分数。
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `commands/loading.rs`, `analysis/decomposition.rs`, `analysis/export.rs`

use crate::analysis::export::singular_values_to_csv;
use crate::analysis::{explained_fraction, singular_values};
use crate::cli::analyze::SvdArgs;
use crate::commands::loading::{load_inputs, selected_indices};
use crate::error::Result;
use crate::settings::Settings;
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct SingularRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Singular value")]
    value: String,
    #[tabled(rename = "Fraction")]
    fraction: String,
    #[tabled(rename = "Cumulative")]
    cumulative: String,
}

fn singular_rows(values: &[f64], top: usize) -> Vec<SingularRow> {
    let fractions = explained_fraction(values);
    let mut cumulative = 0.0;
    values
        .iter()
        .zip(&fractions)
        .take(top)
        .enumerate()
        .map(|(i, (value, fraction))| {
            cumulative += fraction;
            SingularRow {
                index: i + 1,
                value: format!("{:.6e}", value),
                fraction: format!("{:.2}%", fraction * 100.0),
                cumulative: format!("{:.2}%", cumulative * 100.0),
            }
        })
        .collect()
}

/// 执行 SVD 分析
pub fn execute(args: SvdArgs, settings: &Settings) -> Result<()> {
    let dataset = load_inputs(&args.input, settings.background.window)?;
    let indices = selected_indices(&args.input)?;
    let matrix = dataset.decomposition_matrix(indices.as_deref())?;

    output::print_header(&format!(
        "Singular values of {} trace(s) x {} channel(s)",
        matrix.nrows(),
        matrix.ncols()
    ));

    let values = singular_values(&matrix)?;
    println!("{}", Table::new(singular_rows(&values, args.top)));

    if let Some(path) = &args.output {
        singular_values_to_csv(&values, path)?;
        output::print_success(&format!("Singular values saved to '{}'", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singular_rows_accumulate() {
        let rows = singular_rows(&[4.0, 3.0, 0.0], 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fraction, "64.00%");
        assert_eq!(rows[1].cumulative, "100.00%");
    }
}
