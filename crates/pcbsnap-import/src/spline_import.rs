//! 样条转三次贝塞尔
//!
//! 导入的样条（控制点 + 节点，或只有拟合点）先构造成 B 样条，
//! 再分解为首尾相接的贝塞尔段。一次和二次段精确升阶为三次。

use crate::error::ImportError;
use pcbsnap_core::item::{BezierItem, BoardItem, ItemKind};
use pcbsnap_core::layer::LayerId;
use pcbsnap_core::math::Point2;
use pcbsnap_core::spline::{approx_equal, BSpline, KnotKind};

/// 样条定义（二维）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SplineDefinition {
    pub degree: usize,
    pub control_points: Vec<Point2>,
    /// 为空时使用两端夹紧的均匀节点
    pub knots: Vec<f64>,
    pub weights: Vec<f64>,
    /// 没有控制点时用自然三次样条插值
    pub fit_points: Vec<Point2>,
}

impl SplineDefinition {
    pub fn new(degree: usize, control_points: Vec<Point2>, knots: Vec<f64>) -> Self {
        Self {
            degree,
            control_points,
            knots,
            ..Default::default()
        }
    }

    pub fn from_fit_points(fit_points: Vec<Point2>) -> Self {
        Self {
            degree: 3,
            fit_points,
            ..Default::default()
        }
    }

    /// 权重不全相等（有理样条）
    pub fn has_unequal_weights(&self) -> bool {
        self.weights.windows(2).any(|w| !approx_equal(w[0], w[1]))
    }

    fn to_bspline(&self) -> Result<BSpline, ImportError> {
        if self.control_points.is_empty() {
            if self.fit_points.is_empty() {
                return Err(ImportError::InvalidSpline("no control or fit points".to_string()));
            }
            return Ok(BSpline::interpolate_cubic_natural(&flatten(&self.fit_points), 2)?);
        }

        if self.degree == 0 || self.degree > 3 {
            return Err(ImportError::InvalidSpline(format!(
                "unsupported degree {}",
                self.degree
            )));
        }

        let ctrlp = flatten(&self.control_points);
        if self.knots.is_empty() {
            let curve = BSpline::new(self.control_points.len(), 2, self.degree, KnotKind::Clamped)?;
            Ok(curve.with_control_points(&ctrlp)?)
        } else {
            Ok(BSpline::from_parts(self.degree, 2, &ctrlp, &self.knots)?)
        }
    }
}

fn flatten(points: &[Point2]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

/// 三次贝塞尔段
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub start: Point2,
    pub ctrl1: Point2,
    pub ctrl2: Point2,
    pub end: Point2,
}

impl CubicBezier {
    /// 由一个贝塞尔段的控制点构造，低阶段精确升阶
    fn from_segment(points: &[Point2]) -> Option<Self> {
        match *points {
            [p0, p1] => Some(Self {
                start: p0,
                ctrl1: p0 + (p1 - p0) / 3.0,
                ctrl2: p0 + (p1 - p0) * (2.0 / 3.0),
                end: p1,
            }),
            [p0, p1, p2] => Some(Self {
                start: p0,
                ctrl1: p0 + (p1 - p0) * (2.0 / 3.0),
                ctrl2: p2 + (p1 - p2) * (2.0 / 3.0),
                end: p2,
            }),
            [p0, p1, p2, p3] => Some(Self {
                start: p0,
                ctrl1: p1,
                ctrl2: p2,
                end: p3,
            }),
            _ => None,
        }
    }

    /// 起点、控制点1、控制点2、终点，共 8 个数
    pub fn to_flat(&self) -> [f64; 8] {
        [
            self.start.x,
            self.start.y,
            self.ctrl1.x,
            self.ctrl1.y,
            self.ctrl2.x,
            self.ctrl2.y,
            self.end.x,
            self.end.y,
        ]
    }

    /// 四个点都落在起点的 `tolerance` 范围内
    pub fn is_degenerate(&self, tolerance: f64) -> bool {
        [self.ctrl1, self.ctrl2, self.end]
            .iter()
            .all(|p| (p - self.start).norm() <= tolerance)
    }

    pub fn to_item(&self, layer: LayerId) -> BoardItem {
        BoardItem::on_layer(
            ItemKind::Bezier(BezierItem {
                start: self.start,
                ctrl1: self.ctrl1,
                ctrl2: self.ctrl2,
                end: self.end,
                width: 0.0,
            }),
            layer,
        )
    }
}

/// 把样条分解为三次贝塞尔段，丢弃退化段
pub fn spline_to_cubic_beziers(
    def: &SplineDefinition,
    tolerance: f64,
) -> Result<Vec<CubicBezier>, ImportError> {
    let beziers = def.to_bspline()?.to_beziers()?;
    let order = beziers.order();
    let dim = beziers.dimension();
    let ctrlp = beziers.control_points();

    if ctrlp.len() % (order * dim) != 0 {
        return Err(ImportError::MalformedBezier {
            points: ctrlp.len() / dim,
        });
    }

    let points: Vec<Point2> = ctrlp.chunks(dim).map(|c| Point2::new(c[0], c[1])).collect();
    let mut segments = Vec::with_capacity(points.len() / order);
    for chunk in points.chunks(order) {
        let segment = CubicBezier::from_segment(chunk).ok_or(ImportError::MalformedBezier {
            points: points.len(),
        })?;
        if !segment.is_degenerate(tolerance) {
            segments.push(segment);
        }
    }

    if segments.is_empty() {
        return Err(ImportError::MalformedBezier {
            points: points.len(),
        });
    }
    Ok(segments)
}

/// 导入报告
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    messages: Vec<String>,
    imported: usize,
    skipped: usize,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// 没有任何诊断消息
    pub fn is_clean(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn record_imported(&mut self, count: usize) {
        self.imported += count;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn imported(&self) -> usize {
        self.imported
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// 导入单条样条；失败时记录诊断并返回空列表
pub fn import_spline(
    def: &SplineDefinition,
    layer: LayerId,
    tolerance: f64,
    report: &mut ImportReport,
) -> Vec<BoardItem> {
    match spline_to_cubic_beziers(def, tolerance) {
        Ok(segments) => {
            report.record_imported(segments.len());
            segments.iter().map(|s| s.to_item(layer)).collect()
        }
        Err(err) => {
            tracing::warn!(error = %err, "dropping spline");
            report.add_message(err.report_message());
            report.record_skipped();
            Vec::new()
        }
    }
}
