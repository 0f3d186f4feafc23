//! # NMF 子命令实现
//!
//! 对选中的谱线做非负矩阵分解并导出组分谱与权重。
//!
//! ## 流程
//! 1. 加载输入（多个文件按层叠加）
//! 2. 在副本上扣除基线、全局归一化、选取谱线
//! 3. 分解，参数取自设置文件并由命令行覆盖
//! 4. 导出 CSV，终端显示组分摘要
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `commands/loading.rs`, `analysis/decomposition.rs`, `analysis/export.rs`

use crate::analysis::export::{components_to_csv, weights_to_csv};
use crate::analysis::{nmf, NmfConfig};
use crate::cli::analyze::NmfArgs;
use crate::commands::loading::{load_inputs, selected_indices};
use crate::error::Result;
use crate::settings::Settings;
use crate::utils::{output, progress};

use tabled::{Table, Tabled};

/// 组分摘要行
#[derive(Debug, Clone, Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: usize,
    #[tabled(rename = "Peak (cm⁻¹)")]
    peak: String,
    #[tabled(rename = "Mean weight")]
    mean_weight: String,
}

/// 设置文件中的参数，被命令行给出的值覆盖
fn merged_config(args: &NmfArgs, settings: &Settings) -> NmfConfig {
    let mut config = settings.nmf.clone();
    if let Some(rank) = args.rank {
        config.rank = rank;
    }
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(ratio) = args.l1_ratio {
        config.l1_ratio = ratio;
    }
    if let Some(init) = args.init {
        config.init = init;
    }
    if let Some(max_iter) = args.max_iter {
        config.max_iter = max_iter;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config
}

/// 执行 NMF 分析
pub fn execute(args: NmfArgs, settings: &Settings) -> Result<()> {
    let dataset = load_inputs(&args.input, settings.background.window)?;
    let indices = selected_indices(&args.input)?;
    let config = merged_config(&args, settings);

    output::print_header(&format!(
        "NMF: {} component(s), {} init, alpha {}, l1_ratio {}",
        config.rank, config.init, config.alpha, config.l1_ratio
    ));

    let matrix = dataset.decomposition_matrix(indices.as_deref())?;
    output::print_info(&format!(
        "Decomposing {} trace(s) x {} channel(s)",
        matrix.nrows(),
        matrix.ncols()
    ));

    let spinner = progress::create_spinner("Factorizing...");
    let model = nmf(&matrix, &config);
    spinner.finish_and_clear();
    let model = model?;

    output::print_success(&format!(
        "Finished after {} iteration(s), reconstruction error {:.4e}",
        model.iterations, model.reconstruction_error
    ));

    let rows: Vec<ComponentRow> = (0..model.components.nrows())
        .map(|k| {
            let row = model.components.row(k);
            let peak = row
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, f64)>, (c, &v)| match best {
                    Some((_, bv)) if bv >= v => best,
                    _ => Some((c, v)),
                })
                .map(|(c, _)| format!("{:.1}", dataset.x_axis()[c]))
                .unwrap_or_else(|| "-".to_string());
            ComponentRow {
                component: k + 1,
                peak,
                mean_weight: format!("{:.4}", model.weights.column(k).mean()),
            }
        })
        .collect();
    println!("{}", Table::new(&rows));

    let selected: Vec<usize> = indices.unwrap_or_else(|| (0..dataset.len()).collect());
    components_to_csv(&model, dataset.x_axis(), &args.output)?;
    weights_to_csv(&model, &selected, dataset.coordinates(), &args.weights)?;

    output::print_success(&format!("Components saved to '{}'", args.output.display()));
    output::print_success(&format!("Weights saved to '{}'", args.weights.display()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::NmfInit;
    use crate::cli::analyze::InputArgs;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn nmf_args(inputs: Vec<PathBuf>, dir: &Path) -> NmfArgs {
        NmfArgs {
            input: InputArgs {
                inputs,
                background: None,
                step: None,
                pattern: "p*.txt".to_string(),
                shape: None,
                indices: None,
            },
            rank: None,
            alpha: None,
            l1_ratio: None,
            init: None,
            max_iter: Some(500),
            seed: None,
            output: dir.join("components.csv"),
            weights: dir.join("weights.csv"),
        }
    }

    #[test]
    fn test_cli_values_override_settings() {
        let mut settings = Settings::default();
        settings.nmf.alpha = 0.3;
        settings.nmf.rank = 4;

        let dir = tempdir().unwrap();
        let mut args = nmf_args(vec![], dir.path());
        args.rank = Some(2);
        args.init = Some(NmfInit::Random);

        let config = merged_config(&args, &settings);
        assert_eq!(config.rank, 2);
        assert_eq!(config.alpha, 0.3);
        assert_eq!(config.init, NmfInit::Random);
        assert_eq!(config.max_iter, 500);
    }

    #[test]
    fn test_stacked_points_are_decomposed() {
        let dir = tempdir().unwrap();
        // 两个高斯组分按不同比例混合
        for (i, (a, b)) in [(1.0, 0.0), (0.7, 0.3), (0.4, 0.6), (0.0, 1.0)].iter().enumerate() {
            let content: String = (0..60)
                .map(|c| {
                    let x = 100.0 + c as f64;
                    let g1 = (-((x - 120.0) / 4.0).powi(2)).exp();
                    let g2 = (-((x - 140.0) / 4.0).powi(2)).exp();
                    format!("{}\t{}\n", x, 10.0 * (a * g1 + b * g2))
                })
                .collect();
            fs::write(dir.path().join(format!("p{}.txt", i + 1)), content).unwrap();
        }

        let args = nmf_args(vec![dir.path().to_path_buf()], dir.path());
        execute(args, &Settings::default()).unwrap();

        let components = fs::read_to_string(dir.path().join("components.csv")).unwrap();
        assert_eq!(components.lines().count(), 61);
        let weights = fs::read_to_string(dir.path().join("weights.csv")).unwrap();
        let lines: Vec<&str> = weights.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[4].starts_with("3,0,0,3,"));
    }
}
