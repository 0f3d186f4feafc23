//! # 背景拟合与扣除
//!
//! 将参考背景谱通过仿射变换 `s·bg + c` 拟合到样品谱，并扣除。
//!
//! ## 算法概述
//! 1. 按通道平移背景（空出的通道填 NaN），正平移向后移
//! 2. 只取波数严格位于拟合窗口内的通道
//! 3. 解 2×2 正规方程
//!    `[[Σbg², Σbg], [Σbg, N]]·[s; c] = [Σ(x·bg); Σx]`，x 为样品、bg 为背景
//! 4. 全谱重建背景并求残差，窗口内残差平方和作为拟合优度
//!
//! 自动平移模式在 -5..=5 内逐一拟合，取残差平方和最小者（相同时取先出现者）。
//!
//! ## 依赖关系
//! - 被 `models/dataset.rs` 和 `commands/backsub.rs` 调用
//! - 使用 `models/dataset.rs` 的 Spectrum
//! - 使用 `nalgebra` 求解正规方程，`rayon` 并行搜索平移

use crate::error::{RamanError, Result};
use crate::models::Spectrum;

use nalgebra::{Matrix2, Vector2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// 自动平移的搜索范围（通道数）
pub const AUTO_SHIFT_RANGE: RangeInclusive<i32> = -5..=5;

/// 拟合窗口（波数，开区间）
///
/// 反序列化同样经过 `FitWindow::new` 检查。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct FitWindow {
    pub start: f64,
    pub end: f64,
}

#[derive(Deserialize)]
struct WindowBounds {
    start: f64,
    end: f64,
}

impl TryFrom<WindowBounds> for FitWindow {
    type Error = RamanError;

    fn try_from(bounds: WindowBounds) -> Result<Self> {
        FitWindow::new(bounds.start, bounds.end)
    }
}

impl FitWindow {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !(start < end) {
            return Err(RamanError::InvalidRange(format!(
                "{}-{} (start must be below end)",
                start, end
            )));
        }
        Ok(FitWindow { start, end })
    }

    /// 波数是否严格位于窗口内
    pub fn contains(&self, x: f64) -> bool {
        x > self.start && x < self.end
    }
}

impl Default for FitWindow {
    fn default() -> Self {
        FitWindow {
            start: 1700.0,
            end: 2100.0,
        }
    }
}

impl fmt::Display for FitWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for FitWindow {
    type Err = RamanError;

    /// 解析 "1700-2100" 形式的范围，起点可为负数 ("-50-200")
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RamanError::InvalidRange(s.to_string());
        let text = s.trim();

        // 首字符可能是负号，分隔符从第二个字符起查找
        let split = text
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .map(|(i, _)| i)
            .ok_or_else(invalid)?;

        let start: f64 = text[..split].trim().parse().map_err(|_| invalid())?;
        let end: f64 = text[split + 1..].trim().parse().map_err(|_| invalid())?;

        FitWindow::new(start, end)
    }
}

/// 背景平移方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftMode {
    /// 固定平移通道数
    Fixed(i32),
    /// 在 `AUTO_SHIFT_RANGE` 内自动搜索
    Auto,
}

impl fmt::Display for ShiftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftMode::Fixed(n) => write!(f, "{}", n),
            ShiftMode::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for ShiftMode {
    type Err = RamanError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(ShiftMode::Auto);
        }
        s.parse::<i32>()
            .map(ShiftMode::Fixed)
            .map_err(|_| RamanError::InvalidArgument(format!("Invalid shift '{}': use 'auto' or an integer", s)))
    }
}

/// 单次背景拟合结果
#[derive(Debug, Clone)]
pub struct BackgroundFit {
    /// 扣除背景后的全谱 (样品 - 重建背景)
    pub residual: Vec<f64>,
    /// 全谱重建背景 `scale·bg + offset`
    pub background: Vec<f64>,
    /// 窗口内残差平方和
    pub sum_sq: f64,
    /// 使用的平移通道数
    pub shift: i32,
    /// 缩放系数 s
    pub scale: f64,
    /// 偏移量 c
    pub offset: f64,
    /// 窗口内通道数
    pub points: usize,
}

/// 背景拟合器（无状态，仅保存拟合窗口）
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundFitter {
    window: FitWindow,
}

impl BackgroundFitter {
    pub fn new(window: FitWindow) -> Self {
        Self { window }
    }

    /// 以背景预测样品并扣除
    pub fn fit(&self, sample: Spectrum<'_>, background: Spectrum<'_>, shift: ShiftMode) -> Result<BackgroundFit> {
        match shift {
            ShiftMode::Fixed(n) => self.fit_shifted(sample, background, n),
            ShiftMode::Auto => self.fit_auto(sample, background),
        }
    }

    /// 自动平移：并行计算全部候选，按 -5..=5 顺序取第一个最小值
    fn fit_auto(&self, sample: Spectrum<'_>, background: Spectrum<'_>) -> Result<BackgroundFit> {
        check_axes(sample, background)?;

        let candidates: Vec<Result<BackgroundFit>> = AUTO_SHIFT_RANGE
            .into_par_iter()
            .map(|n| self.fit_shifted(sample, background, n))
            .collect();

        let mut best: Option<BackgroundFit> = None;
        let mut best_sq = f64::INFINITY;
        for candidate in candidates {
            match candidate {
                Ok(fit) if fit.sum_sq < best_sq => {
                    best_sq = fit.sum_sq;
                    best = Some(fit);
                }
                Ok(_) => {}
                Err(e) => log::debug!("Shift candidate rejected: {}", e),
            }
        }

        best.ok_or_else(|| {
            RamanError::SingularFit(format!(
                "no shift in {:?} gives a finite fit inside window {}",
                AUTO_SHIFT_RANGE, self.window
            ))
        })
    }

    /// 固定平移下的仿射最小二乘拟合
    fn fit_shifted(&self, sample: Spectrum<'_>, background: Spectrum<'_>, shift: i32) -> Result<BackgroundFit> {
        check_axes(sample, background)?;

        let shifted = shift_channels(background.y, shift);

        let mut sum_bg2 = 0.0;
        let mut sum_bg = 0.0;
        let mut sum_xbg = 0.0;
        let mut sum_x = 0.0;
        let mut points = 0usize;

        for ((&wavenumber, &x), &bg) in sample.x.iter().zip(sample.y).zip(&shifted) {
            if self.window.contains(wavenumber) {
                sum_bg2 += bg * bg;
                sum_bg += bg;
                sum_xbg += x * bg;
                sum_x += x;
                points += 1;
            }
        }

        let normal = Matrix2::new(sum_bg2, sum_bg, sum_bg, points as f64);
        let rhs = Vector2::new(sum_xbg, sum_x);
        let inverse = normal.try_inverse().ok_or_else(|| {
            RamanError::SingularFit(format!(
                "{} points inside window {} at shift {}",
                points, self.window, shift
            ))
        })?;
        let solution = inverse * rhs;
        let (scale, offset) = (solution[0], solution[1]);

        let fitted: Vec<f64> = shifted.iter().map(|&bg| scale * bg + offset).collect();
        let residual: Vec<f64> = sample.y.iter().zip(&fitted).map(|(&x, &b)| x - b).collect();
        let sum_sq: f64 = sample
            .x
            .iter()
            .zip(&residual)
            .filter(|&(&wavenumber, _)| self.window.contains(wavenumber))
            .map(|(_, &r)| r * r)
            .sum();

        Ok(BackgroundFit {
            residual,
            background: fitted,
            sum_sq,
            shift,
            scale,
            offset,
            points,
        })
    }
}

/// 样品与背景必须等长且起点相同
fn check_axes(sample: Spectrum<'_>, background: Spectrum<'_>) -> Result<()> {
    if sample.x.len() != sample.y.len() || background.x.len() != background.y.len() {
        return Err(RamanError::AxisMismatch(
            "intensity length differs from its axis".to_string(),
        ));
    }
    if sample.x.len() != background.x.len() {
        return Err(RamanError::AxisMismatch(format!(
            "sample has {} channels, background has {}",
            sample.x.len(),
            background.x.len()
        )));
    }
    if sample.x.first() != background.x.first() {
        return Err(RamanError::AxisMismatch(format!(
            "sample starts at {:?}, background at {:?}",
            sample.x.first(),
            background.x.first()
        )));
    }
    Ok(())
}

/// 按通道平移，空出的通道填 NaN
fn shift_channels(values: &[f64], shift: i32) -> Vec<f64> {
    let n = values.len();
    let k = (shift.unsigned_abs() as usize).min(n);
    let mut out = vec![f64::NAN; n];

    if shift >= 0 {
        out[k..].copy_from_slice(&values[..n - k]);
    } else {
        out[..n - k].copy_from_slice(&values[k..]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> Vec<f64> {
        (0..100).map(|i| 1600.0 + 6.0 * i as f64).collect()
    }

    fn curved_background(x: &[f64]) -> Vec<f64> {
        x.iter()
            .map(|&v| 40.0 + 0.0005 * (v - 1850.0).powi(2) + 8.0 * (v / 23.0).sin())
            .collect()
    }

    #[test]
    fn test_fit_window_parse() {
        let window: FitWindow = "1700-2100".parse().unwrap();
        assert_eq!(window, FitWindow::default());
        assert!("2100-1700".parse::<FitWindow>().is_err());
        assert!("abc".parse::<FitWindow>().is_err());
        assert!(window.contains(1800.0));
        assert!(!window.contains(1700.0));
        assert!(!window.contains(2100.0));

        let negative: FitWindow = "-50-200".parse().unwrap();
        assert_eq!(negative, FitWindow { start: -50.0, end: 200.0 });
        let both: FitWindow = " -200 - -50 ".parse().unwrap();
        assert_eq!(both, FitWindow { start: -200.0, end: -50.0 });
        assert!("1700".parse::<FitWindow>().is_err());
        assert!("1700-2100-2500".parse::<FitWindow>().is_err());
    }

    #[test]
    fn test_fit_window_deserialize_is_checked() {
        let window: FitWindow = serde_json::from_str(r#"{"start":1700,"end":2100}"#).unwrap();
        assert_eq!(window, FitWindow::default());
        assert!(serde_json::from_str::<FitWindow>(r#"{"start":2100,"end":1700}"#).is_err());
        assert!(serde_json::from_str::<FitWindow>(r#"{"start":2000,"end":2000}"#).is_err());
    }

    #[test]
    fn test_shift_mode_parse() {
        assert_eq!("auto".parse::<ShiftMode>().unwrap(), ShiftMode::Auto);
        assert_eq!("-3".parse::<ShiftMode>().unwrap(), ShiftMode::Fixed(-3));
        assert!("left".parse::<ShiftMode>().is_err());
    }

    #[test]
    fn test_shift_channels() {
        let v = [1.0, 2.0, 3.0, 4.0];
        let fwd = shift_channels(&v, 1);
        assert!(fwd[0].is_nan());
        assert_eq!(&fwd[1..], &[1.0, 2.0, 3.0]);

        let back = shift_channels(&v, -2);
        assert_eq!(&back[..2], &[3.0, 4.0]);
        assert!(back[2].is_nan() && back[3].is_nan());

        assert!(shift_channels(&v, 9).iter().all(|x| x.is_nan()));
        assert_eq!(shift_channels(&v, 0), v.to_vec());
    }

    #[test]
    fn test_auto_shift_recovers_affine_background() {
        let x = axis();
        let bg = curved_background(&x);
        let sample: Vec<f64> = bg.iter().map(|b| 2.0 * b + 1.0).collect();

        let fitter = BackgroundFitter::new(FitWindow::default());
        let fit = fitter
            .fit(Spectrum { x: &x, y: &sample }, Spectrum { x: &x, y: &bg }, ShiftMode::Auto)
            .unwrap();

        assert_eq!(fit.shift, 0);
        assert!((fit.scale - 2.0).abs() < 1e-9);
        assert!((fit.offset - 1.0).abs() < 1e-7);
        assert!(fit.sum_sq < 1e-12);
        for ((r, b), s) in fit.residual.iter().zip(&fit.background).zip(&sample) {
            assert!((r + b - s).abs() < 1e-9 * s.abs());
        }
    }

    #[test]
    fn test_auto_shift_finds_drift() {
        let x = axis();
        let bg = curved_background(&x);
        // 样品中的背景相对参考谱向后漂移 3 个通道
        let drifted = shift_channels(&bg, 3);
        let sample: Vec<f64> = drifted.iter().map(|b| 0.5 * b + 4.0).collect();

        let fitter = BackgroundFitter::new(FitWindow::default());
        let fit = fitter
            .fit(Spectrum { x: &x, y: &sample }, Spectrum { x: &x, y: &bg }, ShiftMode::Auto)
            .unwrap();

        assert_eq!(fit.shift, 3);
        assert!((fit.scale - 0.5).abs() < 1e-9);
        assert!(fit.residual[0].is_nan());
    }

    #[test]
    fn test_auto_shift_tie_keeps_lowest_shift() {
        let x = axis();
        // 周期为 3 的背景：平移 -3、0、3 在窗口内完全相同
        let bg: Vec<f64> = (0..x.len()).map(|i| [1.0, 2.0, 4.0][i % 3]).collect();
        let sample: Vec<f64> = bg.iter().map(|b| 2.0 * b + 1.0).collect();
        let sample = Spectrum { x: &x, y: &sample };
        let background = Spectrum { x: &x, y: &bg };

        let fitter = BackgroundFitter::new(FitWindow::default());
        let tied: Vec<f64> = [-3, 0, 3]
            .iter()
            .map(|&n| fitter.fit(sample, background, ShiftMode::Fixed(n)).unwrap().sum_sq)
            .collect();
        assert_eq!(tied[0], tied[1]);
        assert_eq!(tied[1], tied[2]);

        let fit = fitter.fit(sample, background, ShiftMode::Auto).unwrap();
        assert_eq!(fit.shift, -3);
        assert_eq!(fit.sum_sq, tied[0]);
        assert!((fit.scale - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_shift_reports_its_shift() {
        let x = axis();
        let bg = curved_background(&x);
        let sample: Vec<f64> = bg.iter().map(|b| 3.0 * b).collect();

        let fitter = BackgroundFitter::default();
        let fit = fitter
            .fit(Spectrum { x: &x, y: &sample }, Spectrum { x: &x, y: &bg }, ShiftMode::Fixed(-2))
            .unwrap();
        assert_eq!(fit.shift, -2);
        assert!(fit.sum_sq > 0.0);
        assert!(fit.points > 0);
    }

    #[test]
    fn test_axis_mismatch() {
        let x = axis();
        let bg = curved_background(&x);
        let fitter = BackgroundFitter::default();

        let short_x = &x[..50];
        let result = fitter.fit(
            Spectrum { x: short_x, y: &bg[..50] },
            Spectrum { x: &x, y: &bg },
            ShiftMode::Auto,
        );
        assert!(matches!(result, Err(RamanError::AxisMismatch(_))));

        let moved: Vec<f64> = x.iter().map(|v| v + 1.0).collect();
        let result = fitter.fit(
            Spectrum { x: &moved, y: &bg },
            Spectrum { x: &x, y: &bg },
            ShiftMode::Fixed(0),
        );
        assert!(matches!(result, Err(RamanError::AxisMismatch(_))));
    }

    #[test]
    fn test_empty_window_is_singular() {
        let x = axis();
        let bg = curved_background(&x);
        let fitter = BackgroundFitter::new(FitWindow::new(100.0, 200.0).unwrap());
        let result = fitter.fit(Spectrum { x: &x, y: &bg }, Spectrum { x: &x, y: &bg }, ShiftMode::Fixed(0));
        assert!(matches!(result, Err(RamanError::SingularFit(_))));

        let result = fitter.fit(Spectrum { x: &x, y: &bg }, Spectrum { x: &x, y: &bg }, ShiftMode::Auto);
        assert!(matches!(result, Err(RamanError::SingularFit(_))));
    }
}
