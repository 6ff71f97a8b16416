//! 数学基础类型
//!
//! 基于 nalgebra 的二维点/向量别名，以及轴对齐包围盒。

use serde::{Deserialize, Serialize};

pub type Point2 = nalgebra::Point2<f64>;
pub type Vector2 = nalgebra::Vector2<f64>;

/// 几何比较的通用容差
pub const EPSILON: f64 = 1e-9;

/// 判断两个点是否重合（容差 EPSILON）
pub fn points_coincide(a: &Point2, b: &Point2) -> bool {
    (a - b).norm() <= EPSILON
}

/// 二维向量叉积（z 分量）
pub fn cross(a: &Vector2, b: &Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// 将角度归一化到 [0, 2π)
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(std::f64::consts::TAU);
    if a >= std::f64::consts::TAU {
        0.0
    } else {
        a
    }
}

/// 二维轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BoundingBox2 {
    pub fn new(min: Point2, max: Point2) -> Self {
        Self {
            min: Point2::new(min.x.min(max.x), min.y.min(max.y)),
            max: Point2::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    /// 以中心点和半边长构建正方形包围盒
    pub fn around(center: Point2, half_size: f64) -> Self {
        Self::new(
            Point2::new(center.x - half_size, center.y - half_size),
            Point2::new(center.x + half_size, center.y + half_size),
        )
    }

    /// 空包围盒（min > max，任何点都不在其中）
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::MAX, f64::MAX),
            max: Point2::new(f64::MIN, f64::MIN),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Point2>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand_to_include(&p);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn expand_to_include(&mut self, point: &Point2) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }

    pub fn merge(&mut self, other: &BoundingBox2) {
        if other.is_empty() {
            return;
        }
        self.expand_to_include(&other.min);
        self.expand_to_include(&other.max);
    }

    /// 向四周扩展 `margin`
    pub fn inflated(&self, margin: f64) -> Self {
        Self {
            min: Point2::new(self.min.x - margin, self.min.y - margin),
            max: Point2::new(self.max.x + margin, self.max.y + margin),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// 四个角点，逆时针顺序，从 min 开始
    pub fn corners(&self) -> [Point2; 4] {
        [
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }

    pub fn contains(&self, point: &Point2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &BoundingBox2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// 点到包围盒的距离（在内部为0）
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        let dx = (self.min.x - point.x).max(0.0).max(point.x - self.max.x);
        let dy = (self.min.y - point.y).max(0.0).max(point.y - self.max.y);
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_points() {
        let bbox = BoundingBox2::from_points([Point2::new(3.0, -1.0), Point2::new(-2.0, 4.0)]);
        assert_eq!(bbox.min, Point2::new(-2.0, -1.0));
        assert_eq!(bbox.max, Point2::new(3.0, 4.0));
        assert!((bbox.center().x - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_bbox_distance() {
        let bbox = BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0));
        assert!(bbox.distance_to_point(&Point2::new(5.0, 5.0)).abs() < EPSILON);
        assert!((bbox.distance_to_point(&Point2::new(13.0, 14.0)) - 5.0).abs() < EPSILON);
        assert!(BoundingBox2::empty().is_empty());
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-std::f64::consts::FRAC_PI_2) - 1.5 * std::f64::consts::PI).abs() < EPSILON);
        assert!(normalize_angle(std::f64::consts::TAU).abs() < EPSILON);
    }
}
