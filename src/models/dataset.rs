//! # 拉曼光谱数据集模型
//!
//! 一次采集（单点、线扫描或二维面扫）的全部原始数据：
//! 共享波数轴、若干强度谱线、每条谱线的空间坐标，以及描述谱线排布的形状 (a, b, d)。
//!
//! ## 不变量
//! - 所有谱线与 `x_axis` 等长
//! - `coordinates` 与 `traces` 一一对应，插入顺序即谱线编号
//! - 显式设置的形状满足 a·b·d == 谱线数
//! - 谱线只追加、不删除；背景扣除等分析总是返回新数据集
//!
//! ## 依赖关系
//! - 被 `parsers/table.rs`、`analysis/` 和 `commands/` 使用
//! - 使用 `parsers/table.rs` 读取文件
//! - 使用 `analysis/background.rs` 执行背景扣除

use crate::analysis::{BackgroundFit, BackgroundFitter, FitWindow, ShiftMode};
use crate::error::{RamanError, Result};
use crate::parsers::{read_table_file, Acquisition};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 谱线的空间坐标 (x, y, z)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Coordinate { x, y, z }
    }

    fn offset_by(self, other: Coordinate) -> Self {
        Coordinate::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {}]", self.x, self.y, self.z)
    }
}

/// 谱线排布形状 (a, b, d)
///
/// 单点为 (1,1,1)，线扫描为 (N,1,1)，二维面扫为 (N,M,1)，叠加多层面扫时 d 为层数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub a: usize,
    pub b: usize,
    pub d: usize,
}

impl Shape {
    /// 空数据集的形状
    pub const EMPTY: Shape = Shape { a: 0, b: 1, d: 1 };

    pub fn new(a: usize, b: usize, d: usize) -> Self {
        Shape { a, b, d }
    }

    /// 形状覆盖的谱线数 a·b·d
    pub fn volume(&self) -> usize {
        self.a * self.b * self.d
    }

    /// 除第一维外都退化为 1
    pub fn is_degenerate(&self) -> bool {
        self.b == 1 && self.d == 1
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a, self.b, self.d)
    }
}

/// 采集类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionKind {
    /// 单点谱
    Point,
    /// 线扫描
    Line,
    /// 二维面扫
    Map,
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionKind::Point => write!(f, "point"),
            AcquisitionKind::Line => write!(f, "line"),
            AcquisitionKind::Map => write!(f, "map"),
        }
    }
}

/// 追加谱线时的坐标标记
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// 以此坐标为偏移（单点谱即为其坐标）
    At(Coordinate),
    /// 设置所有新谱线的 z（面扫层号）
    Layer(f64),
}

/// 一条光谱的只读视图 (x 轴, 强度)
#[derive(Debug, Clone, Copy)]
pub struct Spectrum<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
}

/// 拉曼光谱数据集
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralDataset {
    x_axis: Vec<f64>,
    traces: Vec<Vec<f64>>,
    coordinates: Vec<Coordinate>,
    shape: Shape,
    kind: Option<AcquisitionKind>,
}

impl Default for SpectralDataset {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralDataset {
    /// 创建空数据集
    pub fn new() -> Self {
        SpectralDataset {
            x_axis: Vec::new(),
            traces: Vec::new(),
            coordinates: Vec::new(),
            shape: Shape::EMPTY,
            kind: None,
        }
    }

    /// 从文件读取数据集
    ///
    /// `shape_hint` 仅对二维面扫生效；与谱线数不符时记录警告并回退到自动推断。
    pub fn load(path: &Path, shape_hint: Option<(usize, usize)>) -> Result<Self> {
        let acquisition = read_table_file(path)?;
        log::info!(
            "Loaded {} acquisition with {} traces from {}",
            acquisition.kind,
            acquisition.traces.len(),
            path.display()
        );
        Self::from_acquisition(acquisition, shape_hint)
    }

    /// 从已分类的读取结果构建数据集
    ///
    /// 面扫形状推断不能整除时只记录警告，其余形状错误向上传递。
    pub fn from_acquisition(acquisition: Acquisition, shape_hint: Option<(usize, usize)>) -> Result<Self> {
        let n = acquisition.traces.len();
        let mut dataset = SpectralDataset {
            x_axis: acquisition.x_axis,
            traces: acquisition.traces,
            coordinates: acquisition.coordinates,
            shape: Shape::new(n, 1, 1),
            kind: Some(acquisition.kind),
        };

        if acquisition.kind == AcquisitionKind::Map {
            if let Some((a, b)) = shape_hint {
                match dataset.set_shape(a, b, 1) {
                    Ok(()) => return Ok(dataset),
                    Err(e) => log::warn!("{}; falling back to automatic dimensions", e),
                }
            }
            match dataset.infer_shape() {
                Ok(_) => {}
                Err(e) if e.is_warning() => log::warn!("{}", e),
                Err(e) => return Err(e),
            }
        }

        Ok(dataset)
    }

    /// 从各部分直接构建，检查长度一致性与形状
    #[cfg(test)]
    pub(crate) fn from_parts(
        x_axis: Vec<f64>,
        traces: Vec<Vec<f64>>,
        coordinates: Vec<Coordinate>,
        shape: Shape,
        kind: AcquisitionKind,
    ) -> Result<Self> {
        if coordinates.len() != traces.len() {
            return Err(RamanError::InvalidArgument(format!(
                "{} coordinates for {} traces",
                coordinates.len(),
                traces.len()
            )));
        }
        if let Some(i) = traces.iter().position(|t| t.len() != x_axis.len()) {
            return Err(RamanError::AxisMismatch(format!(
                "trace {} has {} channels, axis has {}",
                i,
                traces[i].len(),
                x_axis.len()
            )));
        }
        if shape.volume() != traces.len() {
            return Err(RamanError::DimensionError {
                shape: shape.to_string(),
                traces: traces.len(),
            });
        }

        Ok(SpectralDataset {
            x_axis,
            traces,
            coordinates,
            shape,
            kind: Some(kind),
        })
    }

    // ─────────────────────────────────────────────────────────────
    // 访问器
    // ─────────────────────────────────────────────────────────────

    pub fn x_axis(&self) -> &[f64] {
        &self.x_axis
    }

    pub fn traces(&self) -> &[Vec<f64>] {
        &self.traces
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn kind(&self) -> Option<AcquisitionKind> {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// 第 i 条谱线 (0 起始)
    pub fn trace_at(&self, i: usize) -> Result<Spectrum<'_>> {
        let trace = self.traces.get(i).ok_or(RamanError::IndexOutOfRange {
            index: i,
            len: self.traces.len(),
        })?;

        Ok(Spectrum {
            x: &self.x_axis,
            y: trace,
        })
    }

    /// 第 i 条谱线的坐标
    pub fn coordinate_at(&self, i: usize) -> Result<Coordinate> {
        self.coordinates
            .get(i)
            .copied()
            .ok_or(RamanError::IndexOutOfRange {
                index: i,
                len: self.coordinates.len(),
            })
    }

    // ─────────────────────────────────────────────────────────────
    // 追加谱线
    // ─────────────────────────────────────────────────────────────

    /// 读取文件并追加其谱线
    pub fn append_trace(&mut self, path: &Path, placement: Placement) -> Result<()> {
        let acquisition = read_table_file(path)?;
        self.append_acquisition(acquisition, placement)
    }

    /// 追加一次读取结果；失败时数据集保持不变
    pub fn append_acquisition(&mut self, acquisition: Acquisition, placement: Placement) -> Result<()> {
        let Acquisition {
            kind,
            x_axis,
            traces,
            mut coordinates,
        } = acquisition;
        let added = traces.len();

        for coord in coordinates.iter_mut() {
            *coord = match placement {
                Placement::At(offset) => coord.offset_by(offset),
                Placement::Layer(z) => Coordinate { z, ..*coord },
            };
        }

        if self.is_empty() {
            log::debug!("Adopting {} acquisition as the first data", kind);
            *self = Self::from_acquisition(
                Acquisition {
                    kind,
                    x_axis,
                    traces,
                    coordinates,
                },
                None,
            )?;
            return Ok(());
        }

        self.check_axis(&x_axis)?;

        let shape = match kind {
            AcquisitionKind::Point | AcquisitionKind::Line => {
                let extended = Shape::new(self.shape.a + added, self.shape.b, self.shape.d);
                if !self.shape.is_degenerate() {
                    return Err(RamanError::DimensionError {
                        shape: extended.to_string(),
                        traces: self.len() + added,
                    });
                }
                extended
            }
            AcquisitionKind::Map => {
                let layer = self.shape.a * self.shape.b;
                if added != layer {
                    return Err(RamanError::DimensionError {
                        shape: Shape::new(self.shape.a, self.shape.b, self.shape.d + 1).to_string(),
                        traces: self.len() + added,
                    });
                }
                Shape::new(self.shape.a, self.shape.b, self.shape.d + 1)
            }
        };

        self.traces.extend(traces);
        self.coordinates.extend(coordinates);
        self.shape = shape;
        if self.kind == Some(AcquisitionKind::Point) {
            self.kind = Some(AcquisitionKind::Line);
        }

        log::debug!("Appended {} traces, shape is now {}", added, self.shape);
        Ok(())
    }

    /// 新 x 轴需与现有 x 轴等长且首尾值相同（不检查中间值）
    pub fn check_axis(&self, other: &[f64]) -> Result<()> {
        if other.len() != self.x_axis.len() {
            return Err(RamanError::AxisMismatch(format!(
                "expected {} channels, found {}",
                self.x_axis.len(),
                other.len()
            )));
        }

        let endpoints = |axis: &[f64]| (axis.first().copied(), axis.last().copied());
        if endpoints(other) != endpoints(&self.x_axis) {
            return Err(RamanError::AxisMismatch(format!(
                "axis endpoints {:?} differ from {:?}",
                endpoints(other),
                endpoints(&self.x_axis)
            )));
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // 形状
    // ─────────────────────────────────────────────────────────────

    /// 显式设置形状；a·b·d 与谱线数不符时返回 DimensionError 且形状不变
    pub fn set_shape(&mut self, a: usize, b: usize, d: usize) -> Result<()> {
        let shape = Shape::new(a, b, d);
        if shape.volume() != self.len() {
            return Err(RamanError::DimensionError {
                shape: shape.to_string(),
                traces: self.len(),
            });
        }
        self.shape = shape;
        Ok(())
    }

    /// 根据坐标自动推断形状 (a, b, 1)
    ///
    /// `a` 为与第 0 个坐标第一分量相同的前导坐标个数，`b = n / a`。
    /// 不能整除时仍设置 `b` 为向下取整的结果，并返回 `DimensionWarning`。
    pub fn infer_shape(&mut self) -> Result<Shape> {
        let n = self.coordinates.len();
        if n == 0 {
            self.shape = Shape::EMPTY;
            return Ok(self.shape);
        }

        let first = self.coordinates[0].x;
        let mut a = 1;
        while a < n && self.coordinates[a].x == first {
            a += 1;
        }

        self.shape = Shape::new(a, n / a, 1);
        if n % a != 0 {
            return Err(RamanError::DimensionWarning {
                shape: self.shape.to_string(),
                traces: n,
            });
        }

        Ok(self.shape)
    }

    // ─────────────────────────────────────────────────────────────
    // 分析入口
    // ─────────────────────────────────────────────────────────────

    /// 选中谱线组成的矩阵（行 = 谱线，列 = 通道）；`None` 表示全部谱线
    pub fn selection_matrix(&self, indices: Option<&[usize]>) -> Result<DMatrix<f64>> {
        let all: Vec<usize>;
        let rows = match indices {
            Some(rows) => rows,
            None => {
                all = (0..self.len()).collect();
                &all
            }
        };

        if rows.is_empty() {
            return Err(RamanError::EmptyDataset);
        }
        if let Some(&bad) = rows.iter().find(|&&i| i >= self.len()) {
            return Err(RamanError::IndexOutOfRange {
                index: bad,
                len: self.len(),
            });
        }

        Ok(DMatrix::from_fn(rows.len(), self.x_axis.len(), |r, c| {
            self.traces[rows[r]][c]
        }))
    }

    /// 背景扣除，返回新数据集
    pub fn background_subtract(&self, background: Spectrum<'_>, window: FitWindow) -> Result<Self> {
        self.background_subtract_with_report(background, window, ShiftMode::Auto)
            .map(|(dataset, _)| dataset)
    }

    /// 背景扣除，同时返回每条谱线的拟合结果
    ///
    /// 坐标与形状原样复制，仅替换强度值。
    pub fn background_subtract_with_report(
        &self,
        background: Spectrum<'_>,
        window: FitWindow,
        shift: ShiftMode,
    ) -> Result<(Self, Vec<BackgroundFit>)> {
        if self.is_empty() {
            return Err(RamanError::EmptyDataset);
        }

        let fitter = BackgroundFitter::new(window);
        let mut subtracted = self.clone();
        let mut fits = Vec::with_capacity(self.len());

        for (i, trace) in subtracted.traces.iter_mut().enumerate() {
            let sample = Spectrum {
                x: &self.x_axis,
                y: &self.traces[i],
            };
            let fit = fitter.fit(sample, background, shift)?;
            log::debug!(
                "Trace {}: shift {}, scale {:.4}, offset {:.4}, SSR {:.4e}",
                i,
                fit.shift,
                fit.scale,
                fit.offset,
                fit.sum_sq
            );
            trace.copy_from_slice(&fit.residual);
            fits.push(fit);
        }

        Ok((subtracted, fits))
    }

    /// 坐标与形状不变，换上新的谱线强度
    pub fn with_traces(&self, traces: Vec<Vec<f64>>) -> Result<Self> {
        if traces.len() != self.len() {
            return Err(RamanError::InvalidArgument(format!(
                "{} traces given for a dataset of {}",
                traces.len(),
                self.len()
            )));
        }
        if let Some(i) = traces.iter().position(|t| t.len() != self.x_axis.len()) {
            return Err(RamanError::AxisMismatch(format!(
                "trace {} has {} channels, axis has {}",
                i,
                traces[i].len(),
                self.x_axis.len()
            )));
        }

        Ok(SpectralDataset {
            x_axis: self.x_axis.clone(),
            traces,
            coordinates: self.coordinates.clone(),
            shape: self.shape,
            kind: self.kind,
        })
    }

    /// 每条谱线减去自身最小值
    pub fn baseline_subtract(&mut self) {
        for trace in self.traces.iter_mut() {
            let min = trace.iter().copied().fold(f64::INFINITY, f64::min);
            if !min.is_finite() {
                continue;
            }
            for v in trace.iter_mut() {
                *v -= min;
            }
        }
    }

    /// 所有谱线除以全局最大值（非逐条归一化），返回所用的最大值
    ///
    /// 应在 `baseline_subtract` 之后调用。
    pub fn normalize(&mut self) -> Result<f64> {
        if self.is_empty() {
            return Err(RamanError::EmptyDataset);
        }

        let max = self
            .traces
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() || max <= 0.0 {
            return Err(RamanError::InvalidArgument(format!(
                "cannot normalize by global maximum {}",
                max
            )));
        }

        for v in self.traces.iter_mut().flatten() {
            *v /= max;
        }

        Ok(max)
    }

    /// 分解用矩阵：在副本上扣除基线并全局归一化后取选中谱线
    pub fn decomposition_matrix(&self, indices: Option<&[usize]>) -> Result<DMatrix<f64>> {
        let mut prepared = self.clone();
        prepared.baseline_subtract();
        prepared.normalize()?;
        prepared.selection_matrix(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::table::parse_table_content;

    fn line_dataset() -> SpectralDataset {
        let content = "\t100\t200\t300\n0\t1\t2\t3\n1\t4\t5\t6\n2\t7\t8\t9\n";
        SpectralDataset::from_acquisition(parse_table_content(content, "line").unwrap(), None).unwrap()
    }

    fn point(x_axis: &[f64], y: &[f64]) -> Acquisition {
        Acquisition {
            kind: AcquisitionKind::Point,
            x_axis: x_axis.to_vec(),
            traces: vec![y.to_vec()],
            coordinates: vec![Coordinate::ORIGIN],
        }
    }

    fn map_dataset(coords: &[(f64, f64)]) -> SpectralDataset {
        let traces = coords.iter().map(|_| vec![1.0, 2.0]).collect();
        let coordinates = coords
            .iter()
            .map(|&(x, y)| Coordinate::new(x, y, 0.0))
            .collect();
        SpectralDataset::from_acquisition(
            Acquisition {
                kind: AcquisitionKind::Map,
                x_axis: vec![100.0, 200.0],
                traces,
                coordinates,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_single_point_example() {
        let content = "\t\t\n100\t0.0\t1.0\n200\t0.5\t0.8\n";
        let acq = parse_table_content(content, "example").unwrap();
        let dataset = SpectralDataset::from_acquisition(acq, None).unwrap();

        assert_eq!(dataset.kind(), Some(AcquisitionKind::Point));
        assert_eq!(dataset.x_axis(), &[100.0, 200.0]);
        assert_eq!(dataset.traces(), &[vec![1.0, 0.8]]);
        assert_eq!(dataset.coordinates(), &[Coordinate::ORIGIN]);
        assert_eq!(dataset.shape(), Shape::new(1, 1, 1));
    }

    #[test]
    fn test_trace_at() {
        let dataset = line_dataset();
        let trace = dataset.trace_at(1).unwrap();
        assert_eq!(trace.x, &[100.0, 200.0, 300.0]);
        assert_eq!(trace.y, &[4.0, 5.0, 6.0]);
        assert!(matches!(
            dataset.trace_at(3),
            Err(RamanError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(dataset.coordinate_at(2).unwrap(), Coordinate::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_append_points_from_empty() {
        let axis = [100.0, 150.0, 200.0];
        let mut dataset = SpectralDataset::new();
        assert_eq!(dataset.shape(), Shape::EMPTY);

        for i in 1..=3 {
            dataset
                .append_acquisition(point(&axis, &[1.0, 2.0, i as f64]), Placement::Layer(i as f64))
                .unwrap();
        }

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.shape(), Shape::new(3, 1, 1));
        assert_eq!(dataset.coordinates()[2], Coordinate::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_append_at_coordinate() {
        let axis = [100.0, 200.0];
        let mut dataset = SpectralDataset::new();
        dataset
            .append_acquisition(point(&axis, &[1.0, 2.0]), Placement::At(Coordinate::new(1.0, 2.0, 3.0)))
            .unwrap();
        assert_eq!(dataset.coordinates(), &[Coordinate::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_append_axis_mismatch_leaves_dataset_unchanged() {
        let mut dataset = line_dataset();
        let before = dataset.clone();

        // 长度不同
        let result = dataset.append_acquisition(point(&[100.0, 300.0], &[1.0, 2.0]), Placement::Layer(0.0));
        assert!(matches!(result, Err(RamanError::AxisMismatch(_))));
        assert_eq!(dataset, before);

        // 末端不同
        let result = dataset.append_acquisition(
            point(&[100.0, 200.0, 301.0], &[1.0, 2.0, 3.0]),
            Placement::Layer(0.0),
        );
        assert!(matches!(result, Err(RamanError::AxisMismatch(_))));

        // 首端不同
        let result = dataset.append_acquisition(
            point(&[99.0, 200.0, 300.0], &[1.0, 2.0, 3.0]),
            Placement::Layer(0.0),
        );
        assert!(matches!(result, Err(RamanError::AxisMismatch(_))));
        assert_eq!(dataset, before);
    }

    #[test]
    fn test_append_tolerates_midpoint_difference() {
        let mut dataset = line_dataset();
        dataset
            .append_acquisition(point(&[100.0, 250.0, 300.0], &[1.0, 1.0, 1.0]), Placement::Layer(0.0))
            .unwrap();
        assert_eq!(dataset.shape(), Shape::new(4, 1, 1));
    }

    #[test]
    fn test_append_point_onto_map_is_dimension_error() {
        let mut dataset = map_dataset(&[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(dataset.shape(), Shape::new(2, 2, 1));
        let before = dataset.clone();

        let result = dataset.append_acquisition(point(&[100.0, 200.0], &[1.0, 2.0]), Placement::Layer(1.0));
        assert!(matches!(result, Err(RamanError::DimensionError { .. })));
        assert_eq!(dataset, before);
    }

    #[test]
    fn test_append_map_layer() {
        let coords = [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)];
        let mut dataset = map_dataset(&coords);
        let layer = map_dataset(&coords);
        let acquisition = Acquisition {
            kind: AcquisitionKind::Map,
            x_axis: layer.x_axis().to_vec(),
            traces: layer.traces().to_vec(),
            coordinates: layer.coordinates().to_vec(),
        };

        dataset
            .append_acquisition(acquisition.clone(), Placement::Layer(1.0))
            .unwrap();
        assert_eq!(dataset.shape(), Shape::new(2, 2, 2));
        assert_eq!(dataset.len(), 8);
        assert_eq!(dataset.coordinates()[7].z, 1.0);

        // 层大小不符
        let mut short = acquisition;
        short.traces.pop();
        short.coordinates.pop();
        assert!(matches!(
            dataset.append_acquisition(short, Placement::Layer(2.0)),
            Err(RamanError::DimensionError { .. })
        ));
    }

    #[test]
    fn test_infer_shape_divisible() {
        let mut dataset = map_dataset(&[
            (0.0, 0.0),
            (0.0, 1.0),
            (0.0, 2.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (1.0, 2.0),
        ]);
        assert_eq!(dataset.infer_shape().unwrap(), Shape::new(3, 2, 1));
    }

    #[test]
    fn test_infer_shape_not_divisible() {
        let mut dataset = map_dataset(&[
            (0.0, 0.0),
            (0.0, 1.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (2.0, 0.0),
        ]);
        let err = dataset.infer_shape().unwrap_err();
        assert!(err.is_warning());
        assert_eq!(dataset.shape(), Shape::new(2, 2, 1));

        // 读取时该警告不会中断加载
        let content = "\t\t100\t200\n0\t0\t1\t2\n0\t1\t3\t4\n1\t0\t5\t6\n";
        let acq = parse_table_content(content, "uneven map").unwrap();
        let loaded = SpectralDataset::from_acquisition(acq, None).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.shape(), Shape::new(2, 1, 1));
    }

    #[test]
    fn test_set_shape_mismatch() {
        let mut dataset = line_dataset();
        let err = dataset.set_shape(2, 2, 1).unwrap_err();
        assert!(matches!(err, RamanError::DimensionError { traces: 3, .. }));
        assert!(!err.is_warning());
        assert_eq!(dataset.shape(), Shape::new(3, 1, 1));
        dataset.set_shape(1, 3, 1).unwrap();
        assert_eq!(dataset.shape(), Shape::new(1, 3, 1));
    }

    #[test]
    fn test_map_shape_hint_fallback() {
        let content = "\t\t100\t200\n0\t0\t1\t2\n0\t1\t3\t4\n1\t0\t5\t6\n1\t1\t7\t8\n";
        let acq = parse_table_content(content, "map").unwrap();

        let hinted = SpectralDataset::from_acquisition(acq.clone(), Some((4, 1))).unwrap();
        assert_eq!(hinted.shape(), Shape::new(4, 1, 1));

        let fallback = SpectralDataset::from_acquisition(acq, Some((3, 3))).unwrap();
        assert_eq!(fallback.shape(), Shape::new(2, 2, 1));
    }

    #[test]
    fn test_selection_matrix() {
        let dataset = line_dataset();
        let all = dataset.selection_matrix(None).unwrap();
        assert_eq!(all.shape(), (3, 3));
        assert_eq!(all[(2, 0)], 7.0);

        let some = dataset.selection_matrix(Some(&[2, 0])).unwrap();
        assert_eq!(some.shape(), (2, 3));
        assert_eq!(some[(0, 1)], 8.0);
        assert_eq!(some[(1, 1)], 2.0);

        assert!(dataset.selection_matrix(Some(&[5])).is_err());
    }

    #[test]
    fn test_baseline_then_normalize() {
        let mut dataset = line_dataset();
        dataset.baseline_subtract();
        for trace in dataset.traces() {
            let min = trace.iter().copied().fold(f64::INFINITY, f64::min);
            assert_eq!(min, 0.0);
        }

        let max = dataset.normalize().unwrap();
        assert_eq!(max, 2.0);
        let global = dataset
            .traces()
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(global, 1.0);
    }

    #[test]
    fn test_normalize_rejects_zero_data() {
        let mut dataset = SpectralDataset::from_parts(
            vec![1.0, 2.0],
            vec![vec![0.0, 0.0]],
            vec![Coordinate::ORIGIN],
            Shape::new(1, 1, 1),
            AcquisitionKind::Point,
        )
        .unwrap();
        assert!(dataset.normalize().is_err());
        assert!(SpectralDataset::new().normalize().is_err());
    }

    #[test]
    fn test_decomposition_matrix_does_not_mutate() {
        let dataset = line_dataset();
        let matrix = dataset.decomposition_matrix(None).unwrap();
        assert_eq!(dataset.traces()[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(matrix[(0, 2)], 1.0);
        assert_eq!(matrix[(1, 0)], 0.0);
    }

    #[test]
    fn test_background_subtract_keeps_geometry() {
        let x: Vec<f64> = (0..120).map(|i| 1600.0 + 5.0 * i as f64).collect();
        let bg: Vec<f64> = x
            .iter()
            .map(|&v| 50.0 + 0.001 * (v - 1900.0).powi(2) + 10.0 * (v / 37.0).sin())
            .collect();

        let traces: Vec<Vec<f64>> = (1..=3)
            .map(|k| {
                x.iter()
                    .zip(&bg)
                    .map(|(&v, &b)| k as f64 * b + 3.0 + 20.0 * (-(v - 1650.0).powi(2) / 50.0).exp())
                    .collect()
            })
            .collect();
        let coordinates = vec![
            Coordinate::new(0.0, 0.0, 0.0),
            Coordinate::new(1.0, 0.0, 0.0),
            Coordinate::new(2.0, 0.0, 0.0),
        ];
        let dataset = SpectralDataset::from_parts(
            x.clone(),
            traces,
            coordinates,
            Shape::new(3, 1, 1),
            AcquisitionKind::Line,
        )
        .unwrap();

        let original = dataset.clone();
        let background = Spectrum { x: &x, y: &bg };
        let (subtracted, fits) = dataset
            .background_subtract_with_report(background, FitWindow::default(), ShiftMode::Auto)
            .unwrap();

        assert_eq!(subtracted.coordinates(), dataset.coordinates());
        assert_eq!(subtracted.shape(), dataset.shape());
        assert_eq!(subtracted.x_axis(), dataset.x_axis());

        for (i, fit) in fits.iter().enumerate() {
            assert_eq!(fit.shift, 0);
            assert!((fit.scale - (i + 1) as f64).abs() < 1e-9);
            for ((orig, res), recon) in dataset.traces()[i]
                .iter()
                .zip(&subtracted.traces()[i])
                .zip(&fit.background)
            {
                assert!((res + recon - orig).abs() <= 1e-9 * orig.abs().max(1.0));
            }
        }

        // 原数据集未被修改
        assert_eq!(dataset, original);
        assert_ne!(subtracted.traces(), dataset.traces());

        let auto = dataset.background_subtract(background, FitWindow::default()).unwrap();
        assert_eq!(auto, subtracted);
    }

    #[test]
    fn test_with_traces() {
        let dataset = line_dataset();
        let replaced = dataset
            .with_traces(vec![vec![0.0; 3], vec![1.0; 3], vec![2.0; 3]])
            .unwrap();
        assert_eq!(replaced.coordinates(), dataset.coordinates());
        assert_eq!(replaced.shape(), dataset.shape());
        assert_eq!(replaced.traces()[2], vec![2.0; 3]);

        assert!(matches!(
            dataset.with_traces(vec![vec![0.0; 3]]),
            Err(RamanError::InvalidArgument(_))
        ));
        assert!(matches!(
            dataset.with_traces(vec![vec![0.0; 2], vec![0.0; 3], vec![0.0; 3]]),
            Err(RamanError::AxisMismatch(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.txt");
        std::fs::write(&path, "\t100\t200\n0\t1\t2\n1\t3\t4\n").unwrap();

        let dataset = SpectralDataset::load(&path, None).unwrap();
        assert_eq!(dataset.kind(), Some(AcquisitionKind::Line));
        assert_eq!(dataset.shape(), Shape::new(2, 1, 1));

        let missing = SpectralDataset::load(&dir.path().join("missing.txt"), None);
        assert!(matches!(missing, Err(RamanError::ParseError { .. })));
    }

    #[test]
    fn test_append_trace_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut dataset = SpectralDataset::new();
        for i in 1..=2 {
            let path = dir.path().join(format!("p{}.txt", i));
            std::fs::write(&path, format!("100\t{}\n200\t{}\n", i, i + 1)).unwrap();
            dataset
                .append_trace(&path, Placement::Layer(i as f64))
                .unwrap();
        }
        assert_eq!(dataset.shape(), Shape::new(2, 1, 1));
        assert_eq!(dataset.kind(), Some(AcquisitionKind::Line));
        assert_eq!(dataset.traces()[1], vec![2.0, 3.0]);

        let before = dataset.clone();
        let missing = dataset.append_trace(&dir.path().join("missing.txt"), Placement::Layer(3.0));
        assert!(matches!(missing, Err(RamanError::ParseError { .. })));
        assert_eq!(dataset, before);
    }
}
