//! 辅助构造几何与捕捉线
//!
//! 光标靠近图元时生成延长线、支撑圆等辅助几何，只用于产生额外的
//! 交点锚点和叠加显示，不属于板上数据。

use crate::geometry::{Arc, Circle, HalfLine, Line, Primitive};
use crate::item::{BoardItem, ItemId, ItemKind};
use crate::math::{Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 辅助几何图元
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstructionPrimitive {
    Line(Line),
    HalfLine(HalfLine),
    Circle(Circle),
    Arc(Arc),
    Point(Point2),
}

impl ConstructionPrimitive {
    /// 可求交的理想图元（点没有）
    pub fn to_primitive(&self) -> Option<Primitive> {
        match self {
            ConstructionPrimitive::Line(l) => Some(Primitive::Line(*l)),
            ConstructionPrimitive::HalfLine(h) => Some(Primitive::HalfLine(*h)),
            ConstructionPrimitive::Circle(c) => Some(Primitive::Circle(*c)),
            ConstructionPrimitive::Arc(a) => Some(Primitive::Arc(*a)),
            ConstructionPrimitive::Point(_) => None,
        }
    }
}

/// 由某个板上图元派生的辅助几何
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstructionItem {
    pub source: ItemId,
    pub primitive: ConstructionPrimitive,
}

/// 同一来源图元的一组辅助几何
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionBatch {
    pub source: ItemId,
    pub items: Vec<ConstructionItem>,
}

impl ConstructionBatch {
    /// 为图元生成辅助几何；不支持的类型返回 `None`
    ///
    /// - 线段：两个端点向外的射线
    /// - 圆弧：完整支撑圆和圆心
    /// - 矩形：离 `cursor` 最近的角点及其两条边的延长射线
    pub fn for_item(item: &BoardItem, cursor: &Point2) -> Option<Self> {
        let source = item.id;
        let primitives = match &item.kind {
            ItemKind::Segment(s) => {
                if s.segment.is_degenerate() {
                    return None;
                }
                let seg = s.segment;
                vec![
                    ConstructionPrimitive::HalfLine(HalfLine::new(seg.end, seg.end - seg.start)),
                    ConstructionPrimitive::HalfLine(HalfLine::new(seg.start, seg.start - seg.end)),
                ]
            }
            ItemKind::Arc(a) => vec![
                ConstructionPrimitive::Circle(a.arc.supporting_circle()),
                ConstructionPrimitive::Point(a.arc.center),
            ],
            ItemKind::Rect(r) => {
                let corners = r.rect.corners();
                let (idx, corner) = corners
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        (*a - cursor)
                            .norm()
                            .partial_cmp(&(*b - cursor).norm())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(i, c)| (i, *c))?;
                let prev = corners[(idx + 3) % 4];
                let next = corners[(idx + 1) % 4];
                let mut prims = vec![ConstructionPrimitive::Point(corner)];
                for neighbour in [prev, next] {
                    let dir: Vector2 = corner - neighbour;
                    if dir.norm() > EPSILON {
                        prims.push(ConstructionPrimitive::HalfLine(HalfLine::new(corner, dir)));
                    }
                }
                prims
            }
            _ => return None,
        };

        Some(Self {
            source,
            items: primitives
                .into_iter()
                .map(|primitive| ConstructionItem { source, primitive })
                .collect(),
        })
    }
}

/// 管理持久与临时的辅助几何
///
/// 临时批次每次重新计算时整体替换；持久批次保留到取消，
/// 数量超过上限时丢弃最早的。
#[derive(Debug, Clone)]
pub struct ConstructionManager {
    persistent: VecDeque<ConstructionBatch>,
    transient: Option<ConstructionBatch>,
    max_persistent: usize,
}

impl ConstructionManager {
    pub fn new(max_persistent: usize) -> Self {
        Self {
            persistent: VecDeque::with_capacity(max_persistent),
            transient: None,
            max_persistent,
        }
    }

    pub fn set_max_persistent(&mut self, max: usize) {
        self.max_persistent = max;
        while self.persistent.len() > max {
            self.persistent.pop_front();
        }
    }

    /// 提议一组持久辅助几何；同一来源已存在时只移到最新位置
    pub fn propose_persistent(&mut self, batch: ConstructionBatch) {
        if self.max_persistent == 0 {
            return;
        }
        if let Some(pos) = self.persistent.iter().position(|b| b.source == batch.source) {
            self.persistent.remove(pos);
        }
        tracing::debug!(source = batch.source.0, "persistent construction proposed");
        self.persistent.push_back(batch);
        while self.persistent.len() > self.max_persistent {
            self.persistent.pop_front();
        }
    }

    /// 替换临时辅助几何（`None` 表示清除）
    pub fn set_transient(&mut self, batch: Option<ConstructionBatch>) {
        self.transient = batch;
    }

    /// 图元是否已有持久辅助几何
    pub fn is_activated(&self, item: ItemId) -> bool {
        self.persistent.iter().any(|b| b.source == item)
    }

    /// 全部辅助几何（持久在前）
    pub fn items(&self) -> Vec<ConstructionItem> {
        self.persistent
            .iter()
            .chain(self.transient.iter())
            .flat_map(|b| b.items.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.persistent.is_empty() && self.transient.is_none()
    }

    pub fn clear(&mut self) {
        self.persistent.clear();
        self.transient = None;
    }
}

/// 捕捉线方向：水平、垂直和两条 45° 对角线
const SNAP_LINE_DIRECTIONS: [(f64, f64); 4] = [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, -1.0)];

/// 捕捉线状态：起点为最近一次确认的捕捉点
#[derive(Debug, Clone, Default)]
pub struct SnapLineManager {
    origin: Option<Point2>,
    end: Option<Point2>,
}

impl SnapLineManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(&self) -> Option<Point2> {
        self.origin
    }

    pub fn end(&self) -> Option<Point2> {
        self.end
    }

    /// 设置新起点，同时清除终点
    pub fn set_origin(&mut self, origin: Point2) {
        if self.origin != Some(origin) {
            tracing::trace!(x = origin.x, y = origin.y, "snap line origin");
        }
        self.origin = Some(origin);
        self.end = None;
    }

    pub fn set_end(&mut self, end: Option<Point2>) {
        self.end = end;
    }

    pub fn clear(&mut self) {
        self.origin = None;
        self.end = None;
    }

    /// 在捕捉线上求离光标最近的网格对齐点
    ///
    /// `nearest_grid` 为光标对齐后的网格点。光标到某条捕捉线的距离在
    /// `snap_range` 内时，取该线上与网格点同一 x（竖线取同一 y）的点；
    /// 该点本身也必须在 `snap_range` 内。
    /// 已有锚点在 `snap_range` 内时不使用捕捉线。
    pub fn nearest_snap_line_point(
        &self,
        cursor: &Point2,
        nearest_grid: &Point2,
        dist_to_nearest_anchor: Option<f64>,
        snap_range: f64,
    ) -> Option<Point2> {
        let origin = self.origin?;
        if dist_to_nearest_anchor.is_some_and(|d| d <= snap_range) {
            return None;
        }

        let mut best: Option<(f64, Point2)> = None;
        for (dx, dy) in SNAP_LINE_DIRECTIONS {
            let dir = Vector2::new(dx, dy);
            let line = Line::new(origin, dir);
            let dist = (line.nearest_point(cursor) - cursor).norm();
            if dist > snap_range {
                continue;
            }

            let candidate = if dx.abs() < EPSILON {
                Point2::new(origin.x, nearest_grid.y)
            } else {
                origin + dir * ((nearest_grid.x - origin.x) / dx)
            };
            let cand_dist = (candidate - cursor).norm();
            if cand_dist > snap_range {
                continue;
            }
            if best.map_or(true, |(d, _)| cand_dist < d) {
                best = Some((cand_dist, candidate));
            }
        }
        best.map(|(_, p)| p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerId;

    #[test]
    fn test_segment_extension_rays() {
        let item = BoardItem::segment(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), LayerId::F_SILKS);
        let batch = ConstructionBatch::for_item(&item, &Point2::origin()).unwrap();
        assert_eq!(batch.items.len(), 2);
        match batch.items[0].primitive {
            ConstructionPrimitive::HalfLine(h) => {
                assert_eq!(h.start, Point2::new(10.0, 0.0));
                assert!(h.direction.x > 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rect_nearest_corner() {
        let item = BoardItem::rect(Point2::new(0.0, 0.0), Point2::new(10.0, 5.0), LayerId::F_SILKS);
        let batch = ConstructionBatch::for_item(&item, &Point2::new(9.0, 6.0)).unwrap();
        assert_eq!(
            batch.items[0].primitive,
            ConstructionPrimitive::Point(Point2::new(10.0, 5.0))
        );
        assert_eq!(batch.items.len(), 3);
    }

    #[test]
    fn test_unsupported_kind() {
        let item = BoardItem::circle(Point2::origin(), 1.0, LayerId::F_SILKS);
        assert!(ConstructionBatch::for_item(&item, &Point2::origin()).is_none());
    }

    #[test]
    fn test_persistent_cap() {
        let mut manager = ConstructionManager::new(2);
        let items: Vec<BoardItem> = (0..3)
            .map(|i| {
                let y = i as f64;
                BoardItem::segment(Point2::new(0.0, y), Point2::new(5.0, y), LayerId::F_SILKS)
            })
            .collect();
        for item in &items {
            let batch = ConstructionBatch::for_item(item, &Point2::origin()).unwrap();
            manager.propose_persistent(batch);
        }
        assert!(!manager.is_activated(items[0].id));
        assert!(manager.is_activated(items[1].id));
        assert!(manager.is_activated(items[2].id));
        assert_eq!(manager.items().len(), 4);

        manager.set_transient(ConstructionBatch::for_item(&items[0], &Point2::origin()));
        assert!(!manager.is_activated(items[0].id));
        assert_eq!(manager.items().len(), 6);
        assert!(manager.items()[4..].iter().all(|c| c.source == items[0].id));

        manager.clear();
        assert!(manager.is_empty());
    }

    #[test]
    fn test_snap_line_point() {
        let mut lines = SnapLineManager::new();
        lines.set_origin(Point2::new(0.0, 0.0));

        // 靠近水平线
        let p = lines
            .nearest_snap_line_point(&Point2::new(7.2, 0.3), &Point2::new(7.0, 0.0), None, 1.0)
            .unwrap();
        assert_eq!(p, Point2::new(7.0, 0.0));

        // 靠近 45° 对角线
        let p = lines
            .nearest_snap_line_point(&Point2::new(5.1, 4.8), &Point2::new(5.0, 5.0), None, 1.0)
            .unwrap();
        assert_eq!(p, Point2::new(5.0, 5.0));

        // 远离所有捕捉线
        assert!(lines
            .nearest_snap_line_point(&Point2::new(7.0, 3.0), &Point2::new(7.0, 3.0), None, 1.0)
            .is_none());

        // 锚点更近时让位
        assert!(lines
            .nearest_snap_line_point(&Point2::new(7.2, 0.3), &Point2::new(7.0, 0.0), Some(0.5), 1.0)
            .is_none());
    }

    #[test]
    fn test_snap_line_point_must_be_in_range() {
        let mut lines = SnapLineManager::new();
        lines.set_origin(Point2::new(0.5, 0.5));

        // 光标离水平线和 45° 线都很近，但线上的网格对齐点都超出范围
        let cursor = Point2::new(0.7, 0.7);
        let grid = Point2::new(1.0, 1.0);
        assert!(lines.nearest_snap_line_point(&cursor, &grid, None, 0.25).is_none());

        // 范围足够时取最近的候选点
        let p = lines.nearest_snap_line_point(&cursor, &grid, None, 0.4).unwrap();
        assert!((p - Point2::new(1.0, 0.5)).norm() < 1e-9 || (p - Point2::new(0.5, 1.0)).norm() < 1e-9);
    }
}
