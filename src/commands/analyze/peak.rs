//! # Peak 子命令实现
//!
//! 对每条选中的谱线在窗口内拟合 Lorentzian 峰。
//! 单条谱线拟合失败只记录警告，不影响其他谱线。
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `commands/loading.rs`, `analysis/peak.rs`, `analysis/export.rs`

use crate::analysis::export::peak_fits_to_csv;
use crate::analysis::{fit_lorentzian, FitWindow, LorentzianFit, LorentzianParams};
use crate::cli::analyze::PeakArgs;
use crate::commands::loading::{load_inputs, selected_indices};
use crate::error::{RamanError, Result};
use crate::models::{Coordinate, SpectralDataset};
use crate::settings::Settings;
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct PeakRow {
    #[tabled(rename = "Trace")]
    trace: usize,
    #[tabled(rename = "Center (cm⁻¹)")]
    center: String,
    #[tabled(rename = "FWHM (cm⁻¹)")]
    fwhm: String,
    #[tabled(rename = "Height")]
    height: String,
    #[tabled(rename = "Converged")]
    converged: String,
}

/// 逐条拟合；失败的谱线结果为 `None`
fn fit_traces(
    dataset: &SpectralDataset,
    indices: &[usize],
    window: FitWindow,
    initial: LorentzianParams,
) -> Result<Vec<(usize, Coordinate, Option<LorentzianFit>)>> {
    indices
        .iter()
        .map(|&i| {
            let spectrum = dataset.trace_at(i)?;
            let coordinate = dataset.coordinate_at(i)?;
            let fit = match fit_lorentzian(spectrum.x, spectrum.y, window, initial) {
                Ok(fit) => Some(fit),
                Err(e) => {
                    log::warn!("trace {}: {}", i, e);
                    None
                }
            };
            Ok((i, coordinate, fit))
        })
        .collect()
}

/// 执行峰拟合
pub fn execute(args: PeakArgs, settings: &Settings) -> Result<()> {
    let dataset = load_inputs(&args.input, settings.background.window)?;
    let indices = selected_indices(&args.input)?.unwrap_or_else(|| (0..dataset.len()).collect());
    let window = args.window.unwrap_or(settings.peak.window);

    let mut initial = LorentzianParams::default();
    if let Some(center) = args.center {
        if !window.contains(center) {
            return Err(RamanError::InvalidArgument(format!(
                "initial center {} lies outside window {}",
                center, window
            )));
        }
        initial.center = center;
    }

    output::print_header(&format!("Lorentzian fit in {} cm⁻¹", window));

    let fits = fit_traces(&dataset, &indices, window, initial)?;
    let failed = fits.iter().filter(|(_, _, fit)| fit.is_none()).count();

    let rows: Vec<PeakRow> = fits
        .iter()
        .filter_map(|(trace, _, fit)| {
            fit.as_ref().map(|fit| PeakRow {
                trace: *trace,
                center: format!("{:.2}", fit.params.center),
                fwhm: format!("{:.2}", fit.params.fwhm()),
                height: format!("{:.4}", fit.params.height()),
                converged: (if fit.converged { "yes" } else { "no" }).to_string(),
            })
        })
        .collect();
    if !rows.is_empty() {
        println!("{}", Table::new(&rows));
    }
    if failed > 0 {
        output::print_warning(&format!("{} trace(s) could not be fitted", failed));
    }

    if let Some(path) = &args.output {
        peak_fits_to_csv(&fits, path)?;
        output::print_success(&format!("Peak parameters saved to '{}'", path.display()));
    }

    Ok(())
}
