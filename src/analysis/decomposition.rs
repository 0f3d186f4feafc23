//! # 光谱分解
//!
//! 对选中谱线矩阵（行 = 谱线，列 = 通道）做非负矩阵分解 (NMF) 与奇异值分析，
//! 用于识别组分光谱。
//!
//! ## NMF 目标函数
//! ```text
//! ½‖X − WH‖² + α·ρ·(|W|₁ + |H|₁) + ½·α·(1 − ρ)·(‖W‖² + ‖H‖²)
//! ```
//! α 为正则化强度，ρ 为 L1 占比。使用乘法更新，因子始终非负。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/` 调用
//! - 输入来自 `SpectralDataset::decomposition_matrix`
//! - 使用 `nalgebra` 做矩阵运算与 SVD，`rand` 做随机初始化

use crate::error::{RamanError, Result};

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 乘法更新分母中的保护项
const EPSILON: f64 = 1e-12;

/// 每隔多少次迭代检查一次收敛
const CONVERGENCE_CHECK_INTERVAL: usize = 10;

/// NMF 初始化策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NmfInit {
    /// 按数据均值缩放的均匀随机数
    Random,
    /// 非负双 SVD，零元素以数据均值填充
    Nndsvd,
}

impl fmt::Display for NmfInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NmfInit::Random => write!(f, "random"),
            NmfInit::Nndsvd => write!(f, "nndsvd"),
        }
    }
}

impl FromStr for NmfInit {
    type Err = RamanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "random" => Ok(NmfInit::Random),
            "nndsvd" => Ok(NmfInit::Nndsvd),
            _ => Err(RamanError::InvalidArgument(format!(
                "Unknown NMF initialization '{}': use random or nndsvd",
                s
            ))),
        }
    }
}

/// NMF 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmfConfig {
    /// 组分数
    pub rank: usize,
    /// 初始化策略
    pub init: NmfInit,
    /// 正则化强度 α
    pub alpha: f64,
    /// L1 占比 ρ (0 = 纯 L2, 1 = 纯 L1)
    pub l1_ratio: f64,
    /// 最大迭代次数
    pub max_iter: usize,
    /// 相对误差下降阈值，0 表示跑满迭代
    pub tol: f64,
    /// 随机初始化种子
    pub seed: u64,
}

impl Default for NmfConfig {
    fn default() -> Self {
        NmfConfig {
            rank: 2,
            init: NmfInit::Nndsvd,
            alpha: 0.0,
            l1_ratio: 0.0,
            max_iter: 200,
            tol: 1e-4,
            seed: 0,
        }
    }
}

/// NMF 结果：X ≈ weights · components
#[derive(Debug, Clone)]
pub struct NmfModel {
    /// 组分光谱 (rank × 通道)
    pub components: DMatrix<f64>,
    /// 每条谱线的组分权重 (谱线 × rank)
    pub weights: DMatrix<f64>,
    /// Frobenius 重建误差 ‖X − WH‖
    pub reconstruction_error: f64,
    /// 实际迭代次数
    pub iterations: usize,
}

/// 非负矩阵分解
pub fn nmf(x: &DMatrix<f64>, config: &NmfConfig) -> Result<NmfModel> {
    validate_nmf(x, config)?;

    let (mut w, mut h) = match config.init {
        NmfInit::Random => random_init(x, config.rank, config.seed),
        NmfInit::Nndsvd => nndsvd_init(x, config.rank)?,
    };

    let l1 = config.alpha * config.l1_ratio;
    let l2 = config.alpha * (1.0 - config.l1_ratio);

    let initial_error = (x - &w * &h).norm();
    let mut previous_error = initial_error;
    let mut iterations = 0;

    for iter in 1..=config.max_iter {
        iterations = iter;

        // H ← H ∘ (WᵀX) / (WᵀWH + l1 + l2·H)
        let numerator = w.transpose() * x;
        let mut denominator = (w.transpose() * &w) * &h;
        denominator += h.scale(l2);
        denominator.add_scalar_mut(l1 + EPSILON);
        h.component_mul_assign(&numerator.component_div(&denominator));

        // W ← W ∘ (XHᵀ) / (WHHᵀ + l1 + l2·W)
        let numerator = x * h.transpose();
        let mut denominator = &w * (&h * h.transpose());
        denominator += w.scale(l2);
        denominator.add_scalar_mut(l1 + EPSILON);
        w.component_mul_assign(&numerator.component_div(&denominator));

        if config.tol > 0.0 && initial_error > 0.0 && iter % CONVERGENCE_CHECK_INTERVAL == 0 {
            let error = (x - &w * &h).norm();
            if (previous_error - error) / initial_error < config.tol {
                log::debug!("NMF converged after {} iterations", iter);
                break;
            }
            previous_error = error;
        }
    }

    let reconstruction_error = (x - &w * &h).norm();
    log::info!(
        "NMF rank {} finished: {} iterations, reconstruction error {:.4e}",
        config.rank,
        iterations,
        reconstruction_error
    );

    Ok(NmfModel {
        components: h,
        weights: w,
        reconstruction_error,
        iterations,
    })
}

fn validate_nmf(x: &DMatrix<f64>, config: &NmfConfig) -> Result<()> {
    let (n, m) = x.shape();
    if n == 0 || m == 0 {
        return Err(RamanError::Decomposition("input matrix is empty".to_string()));
    }
    if config.rank == 0 || config.rank > n.min(m) {
        return Err(RamanError::Decomposition(format!(
            "rank {} must be between 1 and {}",
            config.rank,
            n.min(m)
        )));
    }
    if !(config.alpha >= 0.0) {
        return Err(RamanError::Decomposition(format!(
            "alpha must be non-negative, got {}",
            config.alpha
        )));
    }
    if !(0.0..=1.0).contains(&config.l1_ratio) {
        return Err(RamanError::Decomposition(format!(
            "l1_ratio must lie in [0, 1], got {}",
            config.l1_ratio
        )));
    }
    if x.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(RamanError::Decomposition(
            "input must be finite and non-negative (run baseline subtraction first)".to_string(),
        ));
    }
    Ok(())
}

fn random_init(x: &DMatrix<f64>, rank: usize, seed: u64) -> (DMatrix<f64>, DMatrix<f64>) {
    let (n, m) = x.shape();
    let scale = (x.mean() / rank as f64).sqrt();
    let mut rng = StdRng::seed_from_u64(seed);

    let w = DMatrix::from_fn(n, rank, |_, _| scale * rng.gen::<f64>());
    let h = DMatrix::from_fn(rank, m, |_, _| scale * rng.gen::<f64>());
    (w, h)
}

/// NNDSVD 初始化 (Boutsidis & Gallopoulos)
fn nndsvd_init(x: &DMatrix<f64>, rank: usize) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let (n, m) = x.shape();
    let svd = x.clone().svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| RamanError::Decomposition("SVD returned no left vectors".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| RamanError::Decomposition("SVD returned no right vectors".to_string()))?;
    let sigma = svd.singular_values;

    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&a, &b| sigma[b].total_cmp(&sigma[a]));

    let mut w = DMatrix::zeros(n, rank);
    let mut h = DMatrix::zeros(rank, m);

    for (j, &k) in order.iter().take(rank).enumerate() {
        let left: Vec<f64> = u.column(k).iter().copied().collect();
        let right: Vec<f64> = v_t.row(k).iter().copied().collect();

        let (left, right, weight) = if j == 0 {
            let left: Vec<f64> = left.iter().map(|v| v.abs()).collect();
            let right: Vec<f64> = right.iter().map(|v| v.abs()).collect();
            (left, right, 1.0)
        } else {
            let (left_pos, left_neg) = split_signs(&left);
            let (right_pos, right_neg) = split_signs(&right);
            let pos = norm(&left_pos) * norm(&right_pos);
            let neg = norm(&left_neg) * norm(&right_neg);
            if pos > neg {
                (unit(&left_pos), unit(&right_pos), pos)
            } else {
                (unit(&left_neg), unit(&right_neg), neg)
            }
        };

        let factor = (sigma[k] * weight).sqrt();
        for (i, v) in left.iter().enumerate() {
            w[(i, j)] = factor * v;
        }
        for (c, v) in right.iter().enumerate() {
            h[(j, c)] = factor * v;
        }
    }

    // 零元素在乘法更新中无法恢复
    let fill = x.mean();
    w.iter_mut().filter(|v| **v <= 0.0).for_each(|v| *v = fill);
    h.iter_mut().filter(|v| **v <= 0.0).for_each(|v| *v = fill);

    Ok((w, h))
}

fn split_signs(v: &[f64]) -> (Vec<f64>, Vec<f64>) {
    (
        v.iter().map(|x| x.max(0.0)).collect(),
        v.iter().map(|x| (-x).max(0.0)).collect(),
    )
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn unit(v: &[f64]) -> Vec<f64> {
    let n = norm(v);
    if n > 0.0 {
        v.iter().map(|x| x / n).collect()
    } else {
        v.to_vec()
    }
}

/// 奇异值（降序）
pub fn singular_values(x: &DMatrix<f64>) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Err(RamanError::Decomposition("input matrix is empty".to_string()));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(RamanError::Decomposition("input contains missing values".to_string()));
    }

    let mut values: Vec<f64> = x.singular_values().iter().copied().collect();
    values.sort_by(|a, b| b.total_cmp(a));
    Ok(values)
}

/// 各奇异值对应的方差占比 s²/Σs²
pub fn explained_fraction(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().map(|s| s * s).sum();
    if total <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|s| s * s / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank_two_matrix() -> DMatrix<f64> {
        let w0 = DMatrix::from_row_slice(6, 2, &[
            1.0, 0.1, //
            0.8, 0.3, //
            0.5, 0.5, //
            0.3, 0.8, //
            0.1, 1.0, //
            0.6, 0.6,
        ]);
        let h0 = DMatrix::from_fn(2, 8, |r, c| {
            let center = if r == 0 { 2.0 } else { 5.0 };
            (-(c as f64 - center).powi(2) / 2.0).exp()
        });
        w0 * h0
    }

    #[test]
    fn test_nmf_recovers_rank_two() {
        let x = rank_two_matrix();
        let config = NmfConfig {
            rank: 2,
            max_iter: 3000,
            tol: 0.0,
            ..NmfConfig::default()
        };

        let model = nmf(&x, &config).unwrap();
        assert_eq!(model.components.shape(), (2, 8));
        assert_eq!(model.weights.shape(), (6, 2));
        assert_eq!(model.iterations, 3000);
        assert!(model.components.iter().all(|v| *v >= 0.0));
        assert!(model.weights.iter().all(|v| *v >= 0.0));
        assert!(model.reconstruction_error / x.norm() < 0.05);
    }

    #[test]
    fn test_nmf_random_init_is_seeded() {
        let x = rank_two_matrix();
        let config = NmfConfig {
            init: NmfInit::Random,
            seed: 7,
            max_iter: 50,
            ..NmfConfig::default()
        };

        let a = nmf(&x, &config).unwrap();
        let b = nmf(&x, &config).unwrap();
        assert_eq!(a.components, b.components);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn test_nmf_regularized_stays_non_negative() {
        let x = rank_two_matrix();
        let config = NmfConfig {
            alpha: 0.1,
            l1_ratio: 0.5,
            ..NmfConfig::default()
        };
        let model = nmf(&x, &config).unwrap();
        assert!(model.components.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(model.reconstruction_error.is_finite());
    }

    #[test]
    fn test_nmf_rejects_bad_input() {
        let x = rank_two_matrix();
        let bad_rank = NmfConfig {
            rank: 7,
            ..NmfConfig::default()
        };
        assert!(nmf(&x, &bad_rank).is_err());

        let bad_ratio = NmfConfig {
            l1_ratio: 1.5,
            ..NmfConfig::default()
        };
        assert!(nmf(&x, &bad_ratio).is_err());

        let mut negative = x.clone();
        negative[(0, 0)] = -1.0;
        assert!(matches!(
            nmf(&negative, &NmfConfig::default()),
            Err(RamanError::Decomposition(_))
        ));
    }

    #[test]
    fn test_singular_values_rank_one() {
        let x = DMatrix::from_fn(4, 5, |r, c| (r + 1) as f64 * (c + 1) as f64);
        let values = singular_values(&x).unwrap();
        assert_eq!(values.len(), 4);
        assert!(values[0] > 1.0);
        assert!(values[1..].iter().all(|v| v.abs() < 1e-9 * values[0]));
        assert!(values.windows(2).all(|w| w[0] >= w[1]));

        let fractions = explained_fraction(&values);
        assert!((fractions[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_nmf_init_parse() {
        assert_eq!("NNDSVD".parse::<NmfInit>().unwrap(), NmfInit::Nndsvd);
        assert_eq!("random".parse::<NmfInit>().unwrap(), NmfInit::Random);
        assert!("svd".parse::<NmfInit>().is_err());
    }
}
