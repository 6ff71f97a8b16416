//! 理想化几何图元
//!
//! 捕捉引擎只关心零线宽的几何抽象（与线宽无关）：
//! - 线段 (Segment)
//! - 无限直线 (Line)
//! - 射线 (HalfLine)
//! - 圆 (Circle)
//! - 圆弧 (Arc)
//! - 多边形 (Polygon)
//!
//! [`Primitive`] 是可求交的图元集合，任意两个图元之间都可以求交点、
//! 求最近点。

use crate::math::{cross, normalize_angle, BoundingBox2, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// 线段
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point2,
    pub end: Point2,
}

impl Segment {
    pub fn new(start: Point2, end: Point2) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// 线段方向向量（单位向量），退化线段返回零向量
    pub fn direction(&self) -> Vector2 {
        let v = self.end - self.start;
        let len = v.norm();
        if len < EPSILON {
            Vector2::zeros()
        } else {
            v / len
        }
    }

    pub fn midpoint(&self) -> Point2 {
        Point2::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    pub fn is_degenerate(&self) -> bool {
        self.length() < EPSILON
    }

    /// 线段上离 `point` 最近的点
    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        let v = self.end - self.start;
        let w = point - self.start;

        let c1 = w.dot(&v);
        if c1 <= 0.0 {
            return self.start;
        }

        let c2 = v.dot(&v);
        if c2 <= c1 {
            return self.end;
        }

        self.start + v * (c1 / c2)
    }

    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        (point - self.nearest_point(point)).norm()
    }

    /// 线段所在的无限直线
    pub fn supporting_line(&self) -> Line {
        Line::through(self.start, self.end)
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points([self.start, self.end])
    }
}

/// 无限直线（过 `origin`，方向 `direction`）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub origin: Point2,
    pub direction: Vector2,
}

impl Line {
    pub fn new(origin: Point2, direction: Vector2) -> Self {
        Self { origin, direction }
    }

    /// 过两点的直线
    pub fn through(a: Point2, b: Point2) -> Self {
        Self {
            origin: a,
            direction: b - a,
        }
    }

    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        let len_sq = self.direction.norm_squared();
        if len_sq < EPSILON * EPSILON {
            return self.origin;
        }
        let t = (point - self.origin).dot(&self.direction) / len_sq;
        self.origin + self.direction * t
    }
}

/// 射线（从 `start` 出发沿 `direction` 无限延伸）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalfLine {
    pub start: Point2,
    pub direction: Vector2,
}

impl HalfLine {
    pub fn new(start: Point2, direction: Vector2) -> Self {
        Self { start, direction }
    }

    /// 从 `start` 出发、经过 `through` 的射线
    pub fn through(start: Point2, through: Point2) -> Self {
        Self {
            start,
            direction: through - start,
        }
    }

    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        let len_sq = self.direction.norm_squared();
        if len_sq < EPSILON * EPSILON {
            return self.start;
        }
        let t = ((point - self.start).dot(&self.direction) / len_sq).max(0.0);
        self.start + self.direction * t
    }
}

/// 圆
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 获取圆上指定角度的点
    pub fn point_at_angle(&self, angle: f64) -> Point2 {
        Point2::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }

    /// 0°、90°、180°、270° 四个象限点
    pub fn quadrant_points(&self) -> [Point2; 4] {
        [
            self.point_at_angle(0.0),
            self.point_at_angle(FRAC_PI_2),
            self.point_at_angle(PI),
            self.point_at_angle(3.0 * FRAC_PI_2),
        ]
    }

    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        let v = point - self.center;
        let len = v.norm();
        if len < EPSILON {
            // 圆心处任何方向都等距
            return self.point_at_angle(0.0);
        }
        self.center + v * (self.radius / len)
    }

    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        ((point - self.center).norm() - self.radius).abs()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::around(self.center, self.radius)
    }
}

/// 圆弧（从 `start_angle` 逆时针到 `end_angle`，单位弧度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Arc {
    pub fn new(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }

    /// 从起点、中间点、终点三点创建圆弧
    pub fn from_three_points(p1: Point2, p2: Point2, p3: Point2) -> Option<Self> {
        let d = 2.0 * (p1.x * (p2.y - p3.y) + p2.x * (p3.y - p1.y) + p3.x * (p1.y - p2.y));

        if d.abs() < EPSILON {
            return None; // 三点共线
        }

        let ux = ((p1.x * p1.x + p1.y * p1.y) * (p2.y - p3.y)
            + (p2.x * p2.x + p2.y * p2.y) * (p3.y - p1.y)
            + (p3.x * p3.x + p3.y * p3.y) * (p1.y - p2.y))
            / d;
        let uy = ((p1.x * p1.x + p1.y * p1.y) * (p3.x - p2.x)
            + (p2.x * p2.x + p2.y * p2.y) * (p1.x - p3.x)
            + (p3.x * p3.x + p3.y * p3.y) * (p2.x - p1.x))
            / d;

        let center = Point2::new(ux, uy);
        let radius = (p1 - center).norm();
        let angle_of = |p: Point2| (p.y - center.y).atan2(p.x - center.x);

        let a1 = angle_of(p1);
        let a2 = angle_of(p2);
        let a3 = angle_of(p3);

        // 中间点不在逆时针方向上时，交换起止点保持逆时针约定
        if normalize_angle(a2 - a1) <= normalize_angle(a3 - a1) {
            Some(Self::new(center, radius, a1, a3))
        } else {
            Some(Self::new(center, radius, a3, a1))
        }
    }

    /// 扫过的角度，范围 (0, 2π]
    pub fn sweep_angle(&self) -> f64 {
        let sweep = normalize_angle(self.end_angle - self.start_angle);
        if sweep < EPSILON {
            TAU
        } else {
            sweep
        }
    }

    pub fn length(&self) -> f64 {
        self.sweep_angle() * self.radius
    }

    pub fn start_point(&self) -> Point2 {
        self.supporting_circle().point_at_angle(self.start_angle)
    }

    pub fn end_point(&self) -> Point2 {
        self.supporting_circle().point_at_angle(self.end_angle)
    }

    pub fn mid_point(&self) -> Point2 {
        self.supporting_circle()
            .point_at_angle(self.start_angle + self.sweep_angle() / 2.0)
    }

    pub fn supporting_circle(&self) -> Circle {
        Circle::new(self.center, self.radius)
    }

    /// 检查角度是否在弧的范围内
    pub fn contains_angle(&self, angle: f64) -> bool {
        let rel = normalize_angle(angle - self.start_angle);
        let sweep = self.sweep_angle();
        rel <= sweep + 1e-12 || (TAU - rel) < 1e-12
    }

    /// 检查圆上的点是否落在弧的角度范围内
    pub fn contains_point(&self, point: &Point2) -> bool {
        self.contains_angle((point.y - self.center.y).atan2(point.x - self.center.x))
    }

    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        let on_circle = self.supporting_circle().nearest_point(point);
        if self.contains_point(&on_circle) {
            return on_circle;
        }
        let start = self.start_point();
        let end = self.end_point();
        if (point - start).norm() <= (point - end).norm() {
            start
        } else {
            end
        }
    }

    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        (point - self.nearest_point(point)).norm()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        let mut bbox = BoundingBox2::from_points([self.start_point(), self.end_point()]);

        // 检查象限点
        for angle in [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2] {
            if self.contains_angle(angle) {
                bbox.expand_to_include(&self.supporting_circle().point_at_angle(angle));
            }
        }

        bbox
    }
}

/// 闭合多边形
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Point2>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point2>) -> Self {
        Self { vertices }
    }

    /// 边（闭合，最后一条边连回首顶点）
    pub fn edges(&self) -> impl Iterator<Item = Segment> + '_ {
        let n = self.vertices.len();
        let count = if n < 2 { 0 } else { n };
        (0..count).map(move |i| Segment::new(self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// 顶点的算术平均
    pub fn centroid(&self) -> Option<Point2> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Some(Point2::from(sum / self.vertices.len() as f64))
    }

    /// 射线法判断点是否在多边形内部
    pub fn contains(&self, point: &Point2) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[j];
            if (a.y > point.y) != (b.y > point.y) {
                let x = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
                if point.x < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        self.edges()
            .map(|e| e.distance_to_point(point))
            .fold(f64::MAX, f64::min)
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points(self.vertices.iter().copied())
    }
}

/// 可求交的理想化图元
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Segment(Segment),
    Line(Line),
    HalfLine(HalfLine),
    Circle(Circle),
    Arc(Arc),
    Rect(BoundingBox2),
}

/// 求交时使用的基本图元：直线族（参数区间）或圆族（可选角度区间）
#[derive(Debug, Clone, Copy)]
enum Elementary {
    Linear {
        origin: Point2,
        /// 单位方向
        dir: Vector2,
        t_min: f64,
        t_max: f64,
    },
    Circular {
        circle: Circle,
        arc: Option<Arc>,
    },
}

impl Elementary {
    fn linear(origin: Point2, direction: Vector2, t_min: f64, t_max: f64) -> Option<Self> {
        let len = direction.norm();
        if len < EPSILON {
            return None;
        }
        Some(Elementary::Linear {
            origin,
            dir: direction / len,
            t_min: t_min * len,
            t_max: t_max * len,
        })
    }

    fn accepts_linear(t: f64, t_min: f64, t_max: f64) -> bool {
        let tol = EPSILON * (1.0 + t.abs());
        t >= t_min - tol && t <= t_max + tol
    }

    fn accepts_circular(arc: &Option<Arc>, point: &Point2) -> bool {
        arc.as_ref().map_or(true, |a| a.contains_point(point))
    }
}

impl Primitive {
    fn elementary(&self) -> Vec<Elementary> {
        match self {
            Primitive::Segment(s) => Elementary::linear(s.start, s.end - s.start, 0.0, 1.0)
                .into_iter()
                .collect(),
            Primitive::Line(l) => {
                Elementary::linear(l.origin, l.direction, f64::NEG_INFINITY, f64::INFINITY)
                    .into_iter()
                    .collect()
            }
            Primitive::HalfLine(h) => Elementary::linear(h.start, h.direction, 0.0, f64::INFINITY)
                .into_iter()
                .collect(),
            Primitive::Circle(c) => vec![Elementary::Circular {
                circle: *c,
                arc: None,
            }],
            Primitive::Arc(a) => vec![Elementary::Circular {
                circle: a.supporting_circle(),
                arc: Some(*a),
            }],
            Primitive::Rect(r) => {
                let c = r.corners();
                (0..4)
                    .filter_map(|i| Elementary::linear(c[i], c[(i + 1) % 4] - c[i], 0.0, 1.0))
                    .collect()
            }
        }
    }

    /// 计算两个图元的交点
    pub fn intersect(&self, other: &Primitive) -> Vec<Point2> {
        let mut points = Vec::new();
        for a in self.elementary() {
            for b in other.elementary() {
                intersect_elementary(&a, &b, &mut points);
            }
        }
        points
    }

    /// 图元上离 `point` 最近的点
    pub fn nearest_point(&self, point: &Point2) -> Point2 {
        match self {
            Primitive::Segment(s) => s.nearest_point(point),
            Primitive::Line(l) => l.nearest_point(point),
            Primitive::HalfLine(h) => h.nearest_point(point),
            Primitive::Circle(c) => c.nearest_point(point),
            Primitive::Arc(a) => a.nearest_point(point),
            Primitive::Rect(r) => {
                let c = r.corners();
                (0..4)
                    .map(|i| Segment::new(c[i], c[(i + 1) % 4]).nearest_point(point))
                    .min_by(|p, q| {
                        (p - point)
                            .norm()
                            .partial_cmp(&(q - point).norm())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .unwrap_or(r.min)
            }
        }
    }

    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        (point - self.nearest_point(point)).norm()
    }

    /// 图元类型名称（用于日志）
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Segment(_) => "Segment",
            Primitive::Line(_) => "Line",
            Primitive::HalfLine(_) => "HalfLine",
            Primitive::Circle(_) => "Circle",
            Primitive::Arc(_) => "Arc",
            Primitive::Rect(_) => "Rect",
        }
    }
}

fn intersect_elementary(a: &Elementary, b: &Elementary, out: &mut Vec<Point2>) {
    match (a, b) {
        (
            Elementary::Linear {
                origin: o1,
                dir: d1,
                t_min: min1,
                t_max: max1,
            },
            Elementary::Linear {
                origin: o2,
                dir: d2,
                t_min: min2,
                t_max: max2,
            },
        ) => {
            let denom = cross(d1, d2);

            // 平行（包括共线重叠）不产生交点
            if denom.abs() < EPSILON {
                return;
            }

            let d = o2 - o1;
            let t1 = cross(&d, d2) / denom;
            let t2 = cross(&d, d1) / denom;

            if Elementary::accepts_linear(t1, *min1, *max1) && Elementary::accepts_linear(t2, *min2, *max2) {
                out.push(o1 + d1 * t1);
            }
        }
        (
            Elementary::Linear {
                origin,
                dir,
                t_min,
                t_max,
            },
            Elementary::Circular { circle, arc },
        )
        | (
            Elementary::Circular { circle, arc },
            Elementary::Linear {
                origin,
                dir,
                t_min,
                t_max,
            },
        ) => {
            // |o + t·d - c|² = r²，d 为单位向量
            let f = origin - circle.center;
            let b = f.dot(dir);
            let c = f.dot(&f) - circle.radius * circle.radius;
            let discriminant = b * b - c;
            let tol = EPSILON * (1.0 + circle.radius * circle.radius);

            if discriminant < -tol {
                return;
            }

            let roots: Vec<f64> = if discriminant.abs() <= tol {
                // 相切
                vec![-b]
            } else {
                let sqrt_disc = discriminant.sqrt();
                vec![-b - sqrt_disc, -b + sqrt_disc]
            };

            for t in roots {
                if !Elementary::accepts_linear(t, *t_min, *t_max) {
                    continue;
                }
                let p = origin + dir * t;
                if Elementary::accepts_circular(arc, &p) {
                    out.push(p);
                }
            }
        }
        (
            Elementary::Circular {
                circle: c1,
                arc: arc1,
            },
            Elementary::Circular {
                circle: c2,
                arc: arc2,
            },
        ) => {
            for p in circle_circle_intersection(c1, c2) {
                if Elementary::accepts_circular(arc1, &p) && Elementary::accepts_circular(arc2, &p) {
                    out.push(p);
                }
            }
        }
    }
}

/// 圆-圆交点
fn circle_circle_intersection(c1: &Circle, c2: &Circle) -> Vec<Point2> {
    let d = (c2.center - c1.center).norm();

    // 不相交或同心
    if d > c1.radius + c2.radius + EPSILON || d < (c1.radius - c2.radius).abs() - EPSILON || d < EPSILON {
        return vec![];
    }

    let a = (c1.radius * c1.radius - c2.radius * c2.radius + d * d) / (2.0 * d);
    let h = (c1.radius * c1.radius - a * a).max(0.0).sqrt();

    let p = c1.center + (c2.center - c1.center) * (a / d);

    let dir = (c2.center - c1.center) / d;
    let perp = Vector2::new(-dir.y, dir.x);

    if h < EPSILON {
        // 一个交点（相切）
        vec![p]
    } else {
        vec![p + perp * h, p - perp * h]
    }
}
