//! # Lorentzian 峰拟合
//!
//! 在波数窗口内拟合四参数 Lorentzian 模型：
//! ```text
//! y = P0 / ((x − P1)² + P2) + P3
//! ```
//! 默认初值 (4443, 2700, 313, 0)、默认窗口 2500–2900 cm⁻¹，对应石墨烯 2D 峰。
//!
//! ## 算法
//! Levenberg–Marquardt，解析 Jacobian，阻尼按 JᵀJ 对角元缩放。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/peak.rs` 调用
//! - 使用 `analysis/background.rs` 的 FitWindow
//! - 使用 `nalgebra` 求解 4×4 正规方程

use crate::analysis::background::FitWindow;
use crate::error::{RamanError, Result};

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

/// 最大迭代次数
const MAX_ITERATIONS: usize = 500;

/// 阻尼上限，超过即认为无法继续下降
const MAX_DAMPING: f64 = 1e12;

/// 相对收敛阈值
const TOLERANCE: f64 = 1e-12;

/// 默认峰拟合窗口
pub fn default_peak_window() -> FitWindow {
    FitWindow {
        start: 2500.0,
        end: 2900.0,
    }
}

/// Lorentzian 参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorentzianParams {
    /// P0: 面积相关的振幅
    pub amplitude: f64,
    /// P1: 峰位
    pub center: f64,
    /// P2: 半高半宽的平方
    pub width_sq: f64,
    /// P3: 常数基线
    pub baseline: f64,
}

impl Default for LorentzianParams {
    fn default() -> Self {
        LorentzianParams {
            amplitude: 4443.0,
            center: 2700.0,
            width_sq: 313.0,
            baseline: 0.0,
        }
    }
}

impl LorentzianParams {
    fn from_vector(p: &Vector4<f64>) -> Self {
        LorentzianParams {
            amplitude: p[0],
            center: p[1],
            width_sq: p[2],
            baseline: p[3],
        }
    }

    fn to_vector(self) -> Vector4<f64> {
        Vector4::new(self.amplitude, self.center, self.width_sq, self.baseline)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.amplitude / ((x - self.center).powi(2) + self.width_sq) + self.baseline
    }

    /// 半高全宽 2·√P2
    pub fn fwhm(&self) -> f64 {
        2.0 * self.width_sq.max(0.0).sqrt()
    }

    /// 峰高（扣除基线）P0/P2
    pub fn height(&self) -> f64 {
        self.amplitude / self.width_sq
    }

    /// 对四个参数的偏导
    fn gradient(&self, x: f64) -> Vector4<f64> {
        let dx = x - self.center;
        let denom = dx * dx + self.width_sq;
        let denom_sq = denom * denom;
        Vector4::new(
            1.0 / denom,
            2.0 * self.amplitude * dx / denom_sq,
            -self.amplitude / denom_sq,
            1.0,
        )
    }
}

/// 峰拟合结果
#[derive(Debug, Clone)]
pub struct LorentzianFit {
    pub params: LorentzianParams,
    /// 窗口内残差平方和
    pub sum_sq: f64,
    pub iterations: usize,
    pub converged: bool,
    /// 窗口内点数
    pub points: usize,
}

/// 在窗口内拟合 Lorentzian 峰
pub fn fit_lorentzian(
    x: &[f64],
    y: &[f64],
    window: FitWindow,
    initial: LorentzianParams,
) -> Result<LorentzianFit> {
    if x.len() != y.len() {
        return Err(RamanError::AxisMismatch(format!(
            "{} wavenumbers for {} intensities",
            x.len(),
            y.len()
        )));
    }

    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|&(&xv, &yv)| window.contains(xv) && yv.is_finite())
        .map(|(&xv, &yv)| (xv, yv))
        .unzip();

    if xs.len() < 4 {
        return Err(RamanError::InvalidArgument(format!(
            "only {} points inside window {}, need at least 4",
            xs.len(),
            window
        )));
    }

    let sse = |p: &LorentzianParams| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&xv, &yv)| (yv - p.evaluate(xv)).powi(2))
            .sum()
    };

    let mut params = initial;
    let mut current = sse(&params);
    let mut damping = 1e-3;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        let mut jtj = Matrix4::<f64>::zeros();
        let mut jtr = Vector4::<f64>::zeros();
        for (&xv, &yv) in xs.iter().zip(&ys) {
            let g = params.gradient(xv);
            let r = yv - params.evaluate(xv);
            jtj += g * g.transpose();
            jtr += g * r;
        }

        // 阻尼循环：直到找到下降方向或阻尼过大
        let mut improved = false;
        while damping < MAX_DAMPING {
            let mut lhs = jtj;
            for i in 0..4 {
                lhs[(i, i)] += damping * jtj[(i, i)].max(f64::MIN_POSITIVE);
            }

            let step = match lhs.try_inverse() {
                Some(inv) => inv * jtr,
                None => {
                    damping *= 10.0;
                    continue;
                }
            };

            let candidate = LorentzianParams::from_vector(&(params.to_vector() + step));
            let candidate_sse = sse(&candidate);

            if candidate.width_sq > 0.0 && candidate_sse.is_finite() && candidate_sse <= current {
                let reduction = current - candidate_sse;
                let step_small = step.norm() <= TOLERANCE * (params.to_vector().norm() + TOLERANCE);
                params = candidate;
                current = candidate_sse;
                damping = (damping / 10.0).max(1e-12);
                improved = true;
                if reduction <= TOLERANCE * current.max(TOLERANCE) || step_small {
                    converged = true;
                }
                break;
            }
            damping *= 10.0;
        }

        if !improved {
            // 无法再下降：已位于（局部）极小
            converged = true;
            break;
        }
        if converged {
            break;
        }
    }

    log::debug!(
        "Lorentzian fit: {} iterations, converged = {}, SSR = {:.4e}",
        iterations,
        converged,
        current
    );

    Ok(LorentzianFit {
        params,
        sum_sq: current,
        iterations,
        converged,
        points: xs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_synthetic_2d_peak() {
        let truth = LorentzianParams {
            amplitude: 6000.0,
            center: 2690.0,
            width_sq: 400.0,
            baseline: 12.0,
        };
        let x: Vec<f64> = (0..600).map(|i| 2400.0 + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| truth.evaluate(v)).collect();

        let fit = fit_lorentzian(&x, &y, default_peak_window(), LorentzianParams::default()).unwrap();

        assert!(fit.converged);
        assert_eq!(fit.points, 399);
        assert!((fit.params.center - 2690.0).abs() < 1e-3);
        assert!((fit.params.width_sq - 400.0).abs() / 400.0 < 1e-3);
        assert!((fit.params.amplitude - 6000.0).abs() / 6000.0 < 1e-3);
        assert!((fit.params.baseline - 12.0).abs() < 1e-2);
        assert!((fit.params.fwhm() - 40.0).abs() < 0.05);
    }

    #[test]
    fn test_fit_needs_points_in_window() {
        let x = [100.0, 200.0, 300.0];
        let y = [1.0, 2.0, 3.0];
        let result = fit_lorentzian(&x, &y, default_peak_window(), LorentzianParams::default());
        assert!(matches!(result, Err(RamanError::InvalidArgument(_))));
    }

    #[test]
    fn test_params_derived_values() {
        let p = LorentzianParams {
            amplitude: 100.0,
            center: 0.0,
            width_sq: 25.0,
            baseline: 1.0,
        };
        assert_eq!(p.fwhm(), 10.0);
        assert_eq!(p.height(), 4.0);
        assert_eq!(p.evaluate(0.0), 5.0);
    }
}
