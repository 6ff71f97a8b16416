//! 网格与对象捕捉引擎
//!
//! 每次光标移动调用一次 [`SnapEngine::best_snap_anchor`]，按以下顺序决定结果，
//! 前一步成功即返回：
//!
//! 1. 捕捉线：光标靠近上一个捕捉点引出的水平、垂直或 45° 线
//!    （在吸入半径内已有锚点，或起点锚点仍处于滞回保持时让位于锚点）
//! 2. 滞回：上一次捕捉的锚点仍在吸出半径内时继续使用
//! 3. 吸入半径内最近的可捕捉锚点
//! 4. 关闭网格时，附近图元上的最近点
//! 5. 网格点（关闭网格时为光标本身）
//!
//! 捕捉半径以屏幕像素配置，按当前缩放换算为板坐标，并且不超过网格尺寸，
//! 保证任何缩放下每个网格点都可达。

use crate::anchor::{compute_anchors, Anchor, AnchorFlags, AnchorQuery, PointKind, SelectionFilter};
use crate::construction::{ConstructionBatch, ConstructionItem, ConstructionManager, SnapLineManager};
use crate::geometry::{Arc, Line, Primitive, Segment};
use crate::item::{BoardItem, ItemId, ItemKind};
use crate::layer::LayerSet;
use crate::math::{points_coincide, BoundingBox2, Point2, Vector2, EPSILON};
use crate::spatial::VisibilityQuery;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 拖动源点选取时，原点/角点在此像素距离内就不考虑轮廓点
const DRAG_OUTLINE_MIN_CORNER_DISTANCE_PX: f64 = 50.0;

/// 网格种类，不同种类的图元可以使用不同的网格间距
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridKind {
    Default,
    /// 焊盘和封装
    Connectable,
    /// 铜层走线
    Wires,
    Vias,
    Text,
    Graphics,
}

impl GridKind {
    /// 图元对应的网格种类
    pub fn for_item(item: &BoardItem) -> Self {
        match &item.kind {
            ItemKind::Pad(_) | ItemKind::Footprint(_) => GridKind::Connectable,
            ItemKind::Segment(_) | ItemKind::Arc(_) if item.layers.iter().any(|l| l.is_copper()) => {
                GridKind::Wires
            }
            ItemKind::Text(_) | ItemKind::TextBox(_) => GridKind::Text,
            ItemKind::Group(_) => GridKind::Default,
            _ => GridKind::Graphics,
        }
    }
}

/// 网格配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// 默认网格间距（x/y）
    pub size: Vector2,
    /// 网格原点
    pub origin: Point2,
    /// 按种类覆盖的网格间距
    #[serde(default)]
    pub overrides: HashMap<GridKind, Vector2>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: Vector2::new(1.27, 1.27), // 50 mil
            origin: Point2::origin(),
            overrides: HashMap::new(),
        }
    }
}

impl GridConfig {
    pub fn size_for(&self, kind: GridKind) -> Vector2 {
        self.overrides.get(&kind).copied().unwrap_or(self.size)
    }
}

/// 捕捉配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapConfig {
    /// 吸入半径（屏幕像素）
    pub snap_size_px: f64,
    /// 滞回带宽度（屏幕像素）
    pub hysteresis_px: f64,
    /// 对象捕捉总开关
    pub enable_snap: bool,
    pub enable_grid: bool,
    pub enable_snap_line: bool,
    /// 悬停和捕捉时生成辅助几何
    pub snap_to_construction: bool,
    /// 最多保留的持久辅助几何批次
    pub max_persistent_batches: usize,
    pub grid: GridConfig,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            snap_size_px: 25.0,
            hysteresis_px: 5.0,
            enable_snap: true,
            enable_grid: true,
            enable_snap_line: true,
            snap_to_construction: true,
            max_persistent_batches: 2,
            grid: GridConfig::default(),
        }
    }
}

/// 捕捉结果的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapSource {
    SnapLine,
    Anchor,
    /// 图元上的最近点（仅关闭网格时）
    PointOnElement,
    Grid,
    /// 无任何捕捉，原样返回光标
    Cursor,
}

/// 捕捉点
#[derive(Debug, Clone, PartialEq)]
pub struct SnapPoint {
    /// 捕捉到的板坐标
    pub point: Point2,
    pub kind: PointKind,
    /// 关联的图元（网格点和捕捉线为空）
    pub items: Vec<ItemId>,
    pub source: SnapSource,
}

impl SnapPoint {
    fn new(point: Point2, kind: PointKind, items: Vec<ItemId>, source: SnapSource) -> Self {
        Self {
            point,
            kind,
            items,
            source,
        }
    }
}

/// 捕捉状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapState {
    Idle,
    /// 有捕捉锚点或捕捉线
    Tracking,
}

/// 叠加显示接口（标记、辅助几何、捕捉线），由视图层实现
pub trait SnapOverlay {
    fn set_marker(&mut self, point: Option<Point2>, kind: PointKind);
    fn set_construction(&mut self, items: &[ConstructionItem]);
    fn set_snap_line(&mut self, origin: Option<Point2>, end: Option<Point2>);
}

/// 不显示任何内容
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOverlay;

impl SnapOverlay for NullOverlay {
    fn set_marker(&mut self, _point: Option<Point2>, _kind: PointKind) {}
    fn set_construction(&mut self, _items: &[ConstructionItem]) {}
    fn set_snap_line(&mut self, _origin: Option<Point2>, _end: Option<Point2>) {}
}

/// 捕捉引擎
///
/// 持有一次交互手势内的会话状态：当前捕捉锚点、捕捉线和辅助几何。
/// 不可重入，每次光标移动调用一次。
pub struct SnapEngine {
    config: SnapConfig,
    /// 每屏幕像素对应的板坐标长度
    world_per_pixel: f64,
    aux_origin: Option<Point2>,
    /// 捕捉线不能落到的点（通常是被拖动图元的起点）
    skip_point: Option<Point2>,
    reference_points: Vec<Point2>,
    construction: ConstructionManager,
    snap_line: SnapLineManager,
    snap_item: Option<Anchor>,
    anchors: Vec<Anchor>,
    overlay: Box<dyn SnapOverlay>,
}

impl SnapEngine {
    pub fn new(config: SnapConfig) -> Self {
        Self::with_overlay(config, Box::new(NullOverlay))
    }

    pub fn with_overlay(config: SnapConfig, overlay: Box<dyn SnapOverlay>) -> Self {
        let construction = ConstructionManager::new(config.max_persistent_batches);
        Self {
            config,
            world_per_pixel: 1.0,
            aux_origin: None,
            skip_point: None,
            reference_points: Vec::new(),
            construction,
            snap_line: SnapLineManager::new(),
            snap_item: None,
            anchors: Vec::new(),
            overlay,
        }
    }

    pub fn config(&self) -> &SnapConfig {
        &self.config
    }

    /// 修改配置后 `max_persistent_batches` 在下一次捕捉时生效
    pub fn config_mut(&mut self) -> &mut SnapConfig {
        &mut self.config
    }

    pub fn set_config(&mut self, config: SnapConfig) {
        self.construction.set_max_persistent(config.max_persistent_batches);
        self.config = config;
    }

    pub fn world_per_pixel(&self) -> f64 {
        self.world_per_pixel
    }

    /// 设置视图缩放；非正值被忽略
    pub fn set_world_per_pixel(&mut self, world_per_pixel: f64) {
        if world_per_pixel > 0.0 && world_per_pixel.is_finite() {
            self.world_per_pixel = world_per_pixel;
        }
    }

    pub fn set_aux_origin(&mut self, origin: Option<Point2>) {
        self.aux_origin = origin;
    }

    pub fn set_skip_point(&mut self, point: Option<Point2>) {
        self.skip_point = point;
    }

    /// 添加仅供参考的点：不可捕捉，但光标靠近时成为捕捉线起点
    pub fn add_reference_point(&mut self, point: Point2) {
        self.reference_points.push(point);
    }

    pub fn clear_reference_points(&mut self) {
        self.reference_points.clear();
    }

    /// 手动设置捕捉线起点（例如确认一次点击后）
    pub fn set_snap_line_origin(&mut self, origin: Point2) {
        self.snap_line.set_origin(origin);
    }

    pub fn snap_line_origin(&self) -> Option<Point2> {
        self.snap_line.origin()
    }

    pub fn snap_line_end(&self) -> Option<Point2> {
        self.snap_line.end()
    }

    pub fn construction(&self) -> &ConstructionManager {
        &self.construction
    }

    /// 最近一次捕捉计算出的锚点
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn state(&self) -> SnapState {
        if self.snap_item.is_some() || self.snap_line.origin().is_some() {
            SnapState::Tracking
        } else {
            SnapState::Idle
        }
    }

    /// 当前捕捉锚点所属的图元
    pub fn snapped_items(&self) -> &[ItemId] {
        match &self.snap_item {
            Some(anchor) => &anchor.items,
            None => &[],
        }
    }

    pub fn snapped_anchor(&self) -> Option<&Anchor> {
        self.snap_item.as_ref()
    }

    /// 吸入半径（板坐标）
    pub fn snap_in_radius(&self, kind: GridKind) -> f64 {
        let radius = self.config.snap_size_px * self.world_per_pixel;
        if self.config.enable_grid {
            let grid = self.config.grid.size_for(kind);
            let pitch = grid.x.abs().min(grid.y.abs());
            if pitch > EPSILON {
                return radius.min(pitch);
            }
        }
        radius
    }

    /// 吸出半径 = 吸入半径 + 滞回带
    pub fn snap_out_radius(&self, kind: GridKind) -> f64 {
        self.snap_in_radius(kind) + self.config.hysteresis_px * self.world_per_pixel
    }

    /// 对齐到网格；网格关闭时原样返回
    pub fn align(&self, point: Point2, kind: GridKind) -> Point2 {
        if self.config.enable_grid {
            self.align_grid(point, kind)
        } else {
            point
        }
    }

    /// 无论网格开关都对齐到网格
    pub fn align_grid(&self, point: Point2, kind: GridKind) -> Point2 {
        let size = self.config.grid.size_for(kind);
        let origin = self.config.grid.origin;
        let snap = |v: f64, o: f64, s: f64| {
            if s.abs() < EPSILON {
                v
            } else {
                o + ((v - o) / s).round() * s
            }
        };
        Point2::new(snap(point.x, origin.x, size.x), snap(point.y, origin.y, size.y))
    }

    /// 拖动约束在线段上的点
    pub fn align_to_segment(&self, point: Point2, segment: &Segment, kind: GridKind) -> Point2 {
        self.align_to_primitive(point, [segment.start, segment.end], &Primitive::Segment(*segment), kind)
    }

    /// 拖动约束在圆弧上的点
    pub fn align_to_arc(&self, point: Point2, arc: &Arc, kind: GridKind) -> Point2 {
        self.align_to_primitive(point, [arc.start_point(), arc.end_point()], &Primitive::Arc(*arc), kind)
    }

    /// 过网格对齐点作水平、垂直和两条对角线，与约束图元求交；
    /// 端点按到原始点的距离比较，交点按到对齐点的距离比较
    fn align_to_primitive(
        &self,
        point: Point2,
        endpoints: [Point2; 2],
        constraint: &Primitive,
        kind: GridKind,
    ) -> Point2 {
        let aligned = self.align(point, kind);
        if !self.config.enable_snap {
            return aligned;
        }

        let mut nearest = aligned;
        let mut min_dist = f64::MAX;

        for end in endpoints {
            let d = (end - point).norm();
            if d < min_dist {
                min_dist = d;
                nearest = end;
            }
        }

        for (dx, dy) in [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, -1.0)] {
            let ray = Primitive::Line(Line::new(aligned, Vector2::new(dx, dy)));
            for p in constraint.intersect(&ray) {
                let d = (p - aligned).norm();
                if d < min_dist {
                    min_dist = d;
                    nearest = p;
                }
            }
        }

        nearest
    }

    /// 选取拖动的源点
    ///
    /// 原点和角点优先；只有当它们都离光标超过 50 像素时，
    /// 才使用更近的轮廓点。没有合适的锚点时返回光标本身。
    pub fn best_drag_origin(
        &self,
        cursor: Point2,
        items: &[&BoardItem],
        filter: Option<SelectionFilter>,
    ) -> Point2 {
        let grid = self.config.grid.size_for(GridKind::Default);
        let query = AnchorQuery {
            for_source_selection: true,
            filter,
            for_drag: true,
            grid_size: grid.x.min(grid.y),
            ..AnchorQuery::new(cursor)
        };
        let anchors = compute_anchors(items, &[], &query);

        let nearest_with = |flags: u8| {
            anchors
                .iter()
                .filter(|a| a.flags.contains(flags))
                .map(|a| (a.distance(&cursor), a.position))
                .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        };

        let mut best: Option<(f64, Point2)> = nearest_with(AnchorFlags::ORIGIN);
        if let Some(corner) = nearest_with(AnchorFlags::CORNER) {
            if best.map_or(true, |(d, _)| corner.0 < d) {
                best = Some(corner);
            }
        }
        if let Some(outline) = nearest_with(AnchorFlags::OUTLINE) {
            let min_dist = best.map_or(f64::MAX, |(d, _)| d);
            let threshold = DRAG_OUTLINE_MIN_CORNER_DISTANCE_PX * self.world_per_pixel;
            if min_dist > threshold && outline.0 < min_dist {
                best = Some(outline);
            }
        }

        best.map_or(cursor, |(_, p)| p)
    }

    /// 计算光标位置的最佳捕捉点
    ///
    /// `skip` 中的图元（通常是正在移动的图元）不参与捕捉。
    pub fn best_snap_anchor<V: VisibilityQuery + ?Sized>(
        &mut self,
        view: &V,
        origin: Point2,
        layers: LayerSet,
        grid_kind: GridKind,
        skip: &[ItemId],
    ) -> SnapPoint {
        self.construction.set_max_persistent(self.config.max_persistent_batches);

        let snap_in = self.snap_in_radius(grid_kind);
        let snap_out = self.snap_out_radius(grid_kind);
        let grid = self.config.grid.size_for(grid_kind);
        let aligned = self.align(origin, grid_kind);

        let area = BoundingBox2::around(origin, snap_out);
        let items = view.query_visible(&area, layers, skip);

        self.update_transient_construction(&items, origin, snap_in);

        let construction = self.construction.items();
        let query = AnchorQuery {
            layers,
            grid_size: grid.x.min(grid.y),
            aux_origin: self.aux_origin,
            ..AnchorQuery::new(origin)
        };
        let mut anchors = compute_anchors(&items, &construction, &query);

        for point in &self.reference_points {
            anchors.push(Anchor::new(*point, AnchorFlags::NONE.bits(), Vec::new(), PointKind::None));
            if (point - origin).norm() <= snap_in {
                self.snap_line.set_origin(*point);
            }
        }

        let nearest = self.nearest_anchor(&anchors, &origin, &items);
        self.anchors = anchors;

        let result = self.resolve(origin, aligned, nearest, &items, skip, snap_in, snap_out);
        tracing::trace!(
            x = result.point.x,
            y = result.point.y,
            source = ?result.source,
            kind = result.kind.name(),
            "snap resolved"
        );
        self.publish(&result);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &mut self,
        origin: Point2,
        aligned: Point2,
        nearest: Option<(usize, f64)>,
        items: &[&BoardItem],
        skip: &[ItemId],
        snap_in: f64,
        snap_out: f64,
    ) -> SnapPoint {
        if self.config.enable_snap {
            // 仍在吸出半径内的上一个锚点
            let held = self
                .snap_item
                .as_ref()
                .filter(|prev| !prev.items.iter().any(|id| skip.contains(id)))
                .filter(|prev| prev.distance(&origin) <= snap_out)
                .cloned();
            // 从所保持锚点引出的捕捉线不能抢走该锚点
            let line_from_held = held.as_ref().is_some_and(|prev| {
                self.snap_line
                    .origin()
                    .is_some_and(|o| points_coincide(&o, &prev.position))
            });

            // 1. 捕捉线
            if self.config.enable_snap_line && !line_from_held {
                let anchor_dist = nearest.map(|(_, d)| d);
                if let Some(p) = self
                    .snap_line
                    .nearest_snap_line_point(&origin, &aligned, anchor_dist, snap_in)
                {
                    let is_skip_point = self.skip_point.is_some_and(|s| points_coincide(&s, &p));
                    if !is_skip_point {
                        self.snap_line.set_end(Some(p));
                        self.snap_item = None;
                        return SnapPoint::new(p, PointKind::None, Vec::new(), SnapSource::SnapLine);
                    }
                }
            }
            self.snap_line.set_end(None);

            // 2. 滞回
            if let Some(prev) = held {
                tracing::trace!("keeping previous snap anchor");
                return SnapPoint::new(prev.position, prev.kind, prev.items, SnapSource::Anchor);
            }

            // 3. 最近锚点
            if let Some((index, dist)) = nearest {
                if dist <= snap_in {
                    let anchor = self.anchors[index].clone();
                    self.snap_line.set_origin(anchor.position);
                    if self.config.snap_to_construction {
                        for owner in &anchor.items {
                            if let Some(batch) =
                                find_item(items, *owner).and_then(|item| ConstructionBatch::for_item(item, &origin))
                            {
                                self.construction.propose_persistent(batch);
                            }
                        }
                    }
                    tracing::debug!(
                        x = anchor.position.x,
                        y = anchor.position.y,
                        kind = anchor.kind.name(),
                        "snapped to anchor"
                    );
                    let result = SnapPoint::new(anchor.position, anchor.kind, anchor.items.clone(), SnapSource::Anchor);
                    self.snap_item = Some(anchor);
                    return result;
                }
            }

            self.snap_item = None;

            // 4. 图元上的最近点
            if !self.config.enable_grid {
                if let Some((item, p)) = nearest_point_on_element(items, &origin, snap_in) {
                    return SnapPoint::new(p, PointKind::None, vec![item], SnapSource::PointOnElement);
                }
            }
        } else {
            self.snap_item = None;
        }

        // 5. 网格点
        if self.config.enable_grid {
            SnapPoint::new(aligned, PointKind::None, Vec::new(), SnapSource::Grid)
        } else {
            SnapPoint::new(origin, PointKind::None, Vec::new(), SnapSource::Cursor)
        }
    }

    /// 光标悬停在图元上时生成临时辅助几何
    fn update_transient_construction(&mut self, items: &[&BoardItem], origin: Point2, snap_in: f64) {
        if !self.config.enable_snap || !self.config.snap_to_construction {
            self.construction.set_transient(None);
            return;
        }

        let hovered = items
            .iter()
            .filter(|item| item.hit_test(&origin, snap_in))
            .map(|item| (item.distance_to_point(&origin), *item))
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .and_then(|(_, item)| hovered_batch(item, &origin, snap_in));

        self.construction.set_transient(hovered);
    }

    /// 最近的可捕捉锚点
    ///
    /// 距离相等时，先选所属图元已有持久辅助几何的，
    /// 再选所属图元离光标最近的。
    fn nearest_anchor(&self, anchors: &[Anchor], origin: &Point2, items: &[&BoardItem]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (i, anchor) in anchors.iter().enumerate() {
            if !anchor.is_snappable() {
                continue;
            }
            let d = anchor.distance(origin);
            best = match best {
                None => Some((i, d)),
                Some((_, bd)) if d < bd - EPSILON => Some((i, d)),
                Some((bi, bd)) if (d - bd).abs() <= EPSILON && self.prefer(anchor, &anchors[bi], origin, items) => {
                    Some((i, d))
                }
                keep => keep,
            };
        }

        best
    }

    fn prefer(&self, candidate: &Anchor, current: &Anchor, origin: &Point2, items: &[&BoardItem]) -> bool {
        let activated = |a: &Anchor| a.items.iter().any(|id| self.construction.is_activated(*id));
        let (cand_active, cur_active) = (activated(candidate), activated(current));
        if cand_active != cur_active {
            return cand_active;
        }
        owner_distance(candidate, origin, items) < owner_distance(current, origin, items) - EPSILON
    }

    fn publish(&mut self, result: &SnapPoint) {
        let marker = match result.source {
            SnapSource::Anchor | SnapSource::PointOnElement | SnapSource::SnapLine => Some(result.point),
            SnapSource::Grid | SnapSource::Cursor => None,
        };
        self.overlay.set_marker(marker, result.kind);
        self.overlay.set_construction(&self.construction.items());
        self.overlay.set_snap_line(self.snap_line.origin(), self.snap_line.end());
    }

    /// 取消当前手势：回到空闲状态，清除捕捉线和全部辅助几何
    pub fn cancel(&mut self) {
        tracing::debug!("snap session cancelled");
        self.snap_item = None;
        self.snap_line.clear();
        self.construction.clear();
        self.anchors.clear();
        self.skip_point = None;
        self.reference_points.clear();
        self.overlay.set_marker(None, PointKind::None);
        self.overlay.set_construction(&[]);
        self.overlay.set_snap_line(None, None);
    }
}

/// 在图元树中查找（锚点可能属于封装内的焊盘）
/// 悬停图元的辅助几何
///
/// 封装和组取 `range` 内离光标最近且能生成辅助几何的子图元。
fn hovered_batch(item: &BoardItem, origin: &Point2, range: f64) -> Option<ConstructionBatch> {
    if item.children().is_empty() {
        return ConstructionBatch::for_item(item, origin);
    }

    let mut children: Vec<(f64, &BoardItem)> = item
        .children()
        .iter()
        .map(|child| (child.distance_to_point(origin), child))
        .filter(|(d, _)| *d <= range)
        .collect();
    children.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    children.into_iter().find_map(|(_, child)| hovered_batch(child, origin, range))
}

fn find_item<'a>(items: &[&'a BoardItem], id: ItemId) -> Option<&'a BoardItem> {
    fn search(item: &BoardItem, id: ItemId) -> Option<&BoardItem> {
        if item.id == id {
            return Some(item);
        }
        item.children().iter().find_map(|child| search(child, id))
    }
    items.iter().find_map(|item| search(item, id))
}

fn owner_distance(anchor: &Anchor, origin: &Point2, items: &[&BoardItem]) -> f64 {
    anchor
        .items
        .iter()
        .filter_map(|id| find_item(items, *id))
        .map(|item| item.distance_to_point(origin))
        .fold(f64::INFINITY, f64::min)
}

fn nearest_point_on_element(items: &[&BoardItem], origin: &Point2, range: f64) -> Option<(ItemId, Point2)> {
    let mut best: Option<(f64, ItemId, Point2)> = None;
    for item in items {
        for prim in item.intersectables() {
            let p = prim.nearest_point(origin);
            let d = (p - origin).norm();
            if d <= range && best.map_or(true, |(bd, _, _)| d < bd) {
                best = Some((d, item.id, p));
            }
        }
    }
    best.map(|(_, id, p)| (id, p))
}
