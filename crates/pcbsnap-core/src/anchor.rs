//! 锚点模型
//!
//! 锚点是从板上图元计算出的带类型关键点，每次光标移动都整体重算，
//! 不归任何图元所有。计算分两步：
//!
//! 1. 按图元类型生成固定的关键点集合（端点、中点、圆心、角点、象限点）
//! 2. 对所有理想化图元两两求交，交点作为 `CONSTRUCTED | SNAPPABLE` 锚点，
//!    同时归属于两个来源图元
//!
//! 第二步是平方复杂度，输入只限于光标附近可见窗口内的图元。

use crate::construction::{ConstructionItem, ConstructionPrimitive};
use crate::geometry::{Circle, Primitive, Segment};
use crate::item::{BoardItem, ItemId, ItemKind, Pad, PadLayerShape, PadShape};
use crate::layer::LayerSet;
use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};

/// 锚点标志（位域）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AnchorFlags {
    bits: u8,
}

impl AnchorFlags {
    pub const ORIGIN: u8 = 1 << 0;
    pub const CORNER: u8 = 1 << 1;
    pub const OUTLINE: u8 = 1 << 2;
    pub const SNAPPABLE: u8 = 1 << 3;
    pub const CONSTRUCTED: u8 = 1 << 4;

    pub const NONE: AnchorFlags = AnchorFlags { bits: 0 };

    pub fn new(bits: u8) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    /// 是否包含 `bits` 中的全部标志
    pub fn contains(&self, bits: u8) -> bool {
        self.bits & bits == bits
    }

    /// 是否包含 `bits` 中的任一标志
    pub fn intersects(&self, bits: u8) -> bool {
        self.bits & bits != 0
    }

    pub fn insert(&mut self, bits: u8) {
        self.bits |= bits;
    }

    pub fn remove(&mut self, bits: u8) {
        self.bits &= !bits;
    }
}

/// 锚点的点类型（用于显示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointKind {
    Center,
    Corner,
    Midpoint,
    End,
    Quadrant,
    Intersection,
    None,
}

impl PointKind {
    /// 获取点类型的名称
    pub fn name(&self) -> &'static str {
        match self {
            PointKind::Center => "中心",
            PointKind::Corner => "角点",
            PointKind::Midpoint => "中点",
            PointKind::End => "端点",
            PointKind::Quadrant => "象限点",
            PointKind::Intersection => "交点",
            PointKind::None => "",
        }
    }
}

/// 锚点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub position: Point2,
    pub flags: AnchorFlags,
    /// 所属图元（交点有两个，辅助原点可以没有）
    pub items: Vec<ItemId>,
    pub kind: PointKind,
}

impl Anchor {
    pub fn new(position: Point2, flags: u8, items: Vec<ItemId>, kind: PointKind) -> Self {
        Self {
            position,
            flags: AnchorFlags::new(flags),
            items,
            kind,
        }
    }

    pub fn distance(&self, point: &Point2) -> f64 {
        (self.position - point).norm()
    }

    pub fn is_snappable(&self) -> bool {
        self.flags.contains(AnchorFlags::SNAPPABLE)
    }

    pub fn is_constructed(&self) -> bool {
        self.flags.contains(AnchorFlags::CONSTRUCTED)
    }
}

/// 选择过滤器（仅在选取拖动源点时使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionFilter {
    pub footprints: bool,
    pub pads: bool,
    pub text: bool,
    pub graphics: bool,
    pub dimensions: bool,
    pub other_items: bool,
}

impl Default for SelectionFilter {
    fn default() -> Self {
        Self {
            footprints: true,
            pads: true,
            text: true,
            graphics: true,
            dimensions: true,
            other_items: true,
        }
    }
}

impl SelectionFilter {
    pub fn allows(&self, item: &BoardItem) -> bool {
        match &item.kind {
            ItemKind::Footprint(_) => self.footprints,
            ItemKind::Pad(_) => self.pads,
            ItemKind::Text(_) | ItemKind::TextBox(_) => self.text,
            ItemKind::Dimension(_) => self.dimensions,
            ItemKind::Segment(_)
            | ItemKind::Arc(_)
            | ItemKind::Circle(_)
            | ItemKind::Rect(_)
            | ItemKind::Polygon(_)
            | ItemKind::Bezier(_) => self.graphics,
            ItemKind::Group(_) => true,
            ItemKind::Table(_) | ItemKind::Barcode(_) | ItemKind::Image(_) => self.other_items,
        }
    }
}

/// 锚点计算参数
#[derive(Debug, Clone)]
pub struct AnchorQuery {
    /// 参考位置（通常为光标）
    pub ref_pos: Point2,
    /// 为拖动选取源点：封装只取光标下的焊盘，并启用过滤器
    pub for_source_selection: bool,
    pub filter: Option<SelectionFilter>,
    pub layers: LayerSet,
    /// 拖动时不做交点计算
    pub for_drag: bool,
    /// 当前网格尺寸，封装质心离原点不足一格时不单独生成
    pub grid_size: f64,
    /// 辅助原点
    pub aux_origin: Option<Point2>,
}

impl AnchorQuery {
    pub fn new(ref_pos: Point2) -> Self {
        Self {
            ref_pos,
            for_source_selection: false,
            filter: None,
            layers: LayerSet::ALL,
            for_drag: false,
            grid_size: 0.0,
            aux_origin: None,
        }
    }
}

/// 计算锚点集合
///
/// `construction` 中的辅助几何参与求交，辅助点直接成为锚点。
pub fn compute_anchors(
    items: &[&BoardItem],
    construction: &[ConstructionItem],
    query: &AnchorQuery,
) -> Vec<Anchor> {
    let mut collector = AnchorCollector::new(query);

    for item in items {
        collector.visit(item);
    }

    if let Some(origin) = query.aux_origin {
        collector.anchors.push(Anchor::new(
            origin,
            AnchorFlags::ORIGIN | AnchorFlags::SNAPPABLE,
            Vec::new(),
            PointKind::Center,
        ));
    }

    if !query.for_drag {
        for c in construction {
            match c.primitive {
                ConstructionPrimitive::Point(p) => collector.add(
                    p,
                    AnchorFlags::CONSTRUCTED | AnchorFlags::SNAPPABLE,
                    c.source,
                    PointKind::None,
                ),
                other => {
                    if let Some(prim) = other.to_primitive() {
                        collector.intersectables.push((c.source, prim));
                    }
                }
            }
        }
        collector.add_intersections();
    }

    collector.anchors
}

struct AnchorCollector<'a> {
    query: &'a AnchorQuery,
    anchors: Vec<Anchor>,
    intersectables: Vec<(ItemId, Primitive)>,
}

impl<'a> AnchorCollector<'a> {
    fn new(query: &'a AnchorQuery) -> Self {
        Self {
            query,
            anchors: Vec::with_capacity(64),
            intersectables: Vec::new(),
        }
    }

    fn add(&mut self, position: Point2, flags: u8, owner: ItemId, kind: PointKind) {
        self.anchors.push(Anchor::new(position, flags, vec![owner], kind));
    }

    fn filtered_out(&self, item: &BoardItem) -> bool {
        self.query.for_source_selection && self.query.filter.is_some_and(|f| !f.allows(item))
    }

    fn visit(&mut self, item: &BoardItem) {
        if let ItemKind::Group(members) = &item.kind {
            for member in members {
                self.visit(member);
            }
            return;
        }
        if let ItemKind::Footprint(_) = &item.kind {
            self.visit_footprint(item);
            return;
        }

        if !item.layers.intersects(&self.query.layers) || self.filtered_out(item) {
            return;
        }

        let id = item.id;
        const END: u8 = AnchorFlags::CORNER | AnchorFlags::SNAPPABLE;
        const MID: u8 = AnchorFlags::SNAPPABLE;
        const CENTER: u8 = AnchorFlags::ORIGIN | AnchorFlags::SNAPPABLE;
        const QUADRANT: u8 = AnchorFlags::OUTLINE | AnchorFlags::SNAPPABLE;

        match &item.kind {
            ItemKind::Segment(s) => {
                self.add(s.segment.start, END, id, PointKind::End);
                self.add(s.segment.end, END, id, PointKind::End);
                self.add(s.segment.midpoint(), MID, id, PointKind::Midpoint);
            }
            ItemKind::Arc(a) => {
                self.add(a.arc.start_point(), END, id, PointKind::End);
                self.add(a.arc.end_point(), END, id, PointKind::End);
                self.add(a.arc.mid_point(), MID, id, PointKind::Midpoint);
                self.add(a.arc.center, CENTER, id, PointKind::Center);
            }
            ItemKind::Circle(c) => {
                self.add(c.circle.center, CENTER, id, PointKind::Center);
                for p in c.circle.quadrant_points() {
                    self.add(p, QUADRANT, id, PointKind::Quadrant);
                }
            }
            ItemKind::Rect(r) => self.add_box(&r.rect, id),
            ItemKind::Polygon(p) => {
                for v in &p.polygon.vertices {
                    self.add(*v, END, id, PointKind::Corner);
                }
                let mids: Vec<Point2> = p.polygon.edges().map(|e| e.midpoint()).collect();
                for m in mids {
                    self.add(m, MID, id, PointKind::Midpoint);
                }
            }
            ItemKind::Bezier(b) => {
                self.add(b.start, END, id, PointKind::End);
                self.add(b.end, END, id, PointKind::End);
            }
            ItemKind::Pad(pad) => self.add_pad(item, pad),
            ItemKind::Text(t) => self.add(t.position, CENTER, id, PointKind::None),
            ItemKind::TextBox(t) => self.add_box(&t.rect, id),
            ItemKind::Barcode(b) => self.add_box(&b.rect, id),
            ItemKind::Image(img) => self.add_box(&img.bounding_box(), id),
            ItemKind::Table(t) => {
                for p in t.grid_points() {
                    self.add(p, END, id, PointKind::Corner);
                }
            }
            ItemKind::Dimension(d) => {
                let bar = d.crossbar();
                for p in [d.start, d.end, bar.start, bar.end] {
                    self.add(p, END, id, PointKind::End);
                }
            }
            ItemKind::Footprint(_) | ItemKind::Group(_) => {}
        }

        if !self.query.for_drag {
            for prim in item.intersectables() {
                self.intersectables.push((id, prim));
            }
        }
    }

    /// 封装：焊盘、其余子图元、原点和质心
    fn visit_footprint(&mut self, item: &BoardItem) {
        let ItemKind::Footprint(fp) = &item.kind else {
            return;
        };
        let query = self.query;

        for child in &fp.children {
            if let ItemKind::Pad(_) = child.kind {
                if query.for_source_selection && !child.bounding_box().contains(&query.ref_pos) {
                    continue;
                }
                self.visit(child);
            } else if !query.for_source_selection {
                self.visit(child);
            }
        }

        if !item.layers.intersects(&query.layers) || self.filtered_out(item) {
            return;
        }

        let flags = AnchorFlags::ORIGIN | AnchorFlags::SNAPPABLE;
        self.add(fp.position, flags, item.id, PointKind::Center);
        if let Some(centroid) = fp.centroid() {
            if (centroid - fp.position).norm() > query.grid_size.max(EPSILON) {
                self.add(centroid, flags, item.id, PointKind::Center);
            }
        }
    }

    /// 包围盒：四角、四边中点、中心
    fn add_box(&mut self, bbox: &BoundingBox2, id: ItemId) {
        let corners = bbox.corners();
        for c in corners {
            self.add(c, AnchorFlags::CORNER | AnchorFlags::SNAPPABLE, id, PointKind::Corner);
        }
        for i in 0..4 {
            let mid = Segment::new(corners[i], corners[(i + 1) % 4]).midpoint();
            self.add(mid, AnchorFlags::SNAPPABLE, id, PointKind::Midpoint);
        }
        self.add(
            bbox.center(),
            AnchorFlags::ORIGIN | AnchorFlags::SNAPPABLE,
            id,
            PointKind::Center,
        );
    }

    fn add_pad(&mut self, item: &BoardItem, pad: &Pad) {
        let id = item.id;
        self.add(
            pad.position,
            AnchorFlags::ORIGIN | AnchorFlags::SNAPPABLE,
            id,
            PointKind::Center,
        );

        let mut shapes: Vec<&PadLayerShape> = Vec::new();
        if pad.padstack.has_layer_overrides() {
            let layers = item.layers.intersection(&self.query.layers);
            for layer in layers.iter() {
                let shape = pad.padstack.shape_on(layer);
                if !shapes.contains(&shape) {
                    shapes.push(shape);
                }
            }
        } else {
            shapes.push(&pad.padstack.default);
        }

        for shape in shapes {
            self.add_pad_shape(pad, shape, id);
        }

        if let Some(drill) = pad.drill {
            if (drill.x - drill.y).abs() < EPSILON {
                let hole = Circle::new(pad.position, drill.x / 2.0);
                for p in hole.quadrant_points() {
                    self.add(p, AnchorFlags::OUTLINE | AnchorFlags::SNAPPABLE, id, PointKind::Quadrant);
                }
            } else {
                for (local, kind) in oval_key_points(drill) {
                    self.add(
                        pad.to_board(local),
                        AnchorFlags::OUTLINE | AnchorFlags::SNAPPABLE,
                        id,
                        kind,
                    );
                }
            }
        }
    }

    /// 焊盘形状关键点；圆角/倒角矩形只取直边角点和中点，不取圆角本身
    fn add_pad_shape(&mut self, pad: &Pad, shape: &PadLayerShape, id: ItemId) {
        let half = shape.size / 2.0;
        let corner_flags = AnchorFlags::OUTLINE | AnchorFlags::CORNER | AnchorFlags::SNAPPABLE;
        let outline_flags = AnchorFlags::OUTLINE | AnchorFlags::SNAPPABLE;

        let polygon: Vec<Vector2> = match &shape.shape {
            PadShape::Circle => {
                let center = pad.shape_position(shape);
                for p in Circle::new(center, half.x).quadrant_points() {
                    self.add(p, outline_flags, id, PointKind::Quadrant);
                }
                return;
            }
            PadShape::Oval => {
                for (local, kind) in oval_key_points(shape.size) {
                    self.add(pad.to_board(shape.offset + local), outline_flags, id, kind);
                }
                return;
            }
            PadShape::Rect | PadShape::RoundRect { .. } | PadShape::ChamferedRect { .. } => vec![
                Vector2::new(-half.x, -half.y),
                Vector2::new(half.x, -half.y),
                Vector2::new(half.x, half.y),
                Vector2::new(-half.x, half.y),
            ],
            PadShape::Trapezoid { delta } => vec![
                Vector2::new(-half.x - delta.y / 2.0, half.y + delta.x / 2.0),
                Vector2::new(half.x + delta.y / 2.0, half.y - delta.x / 2.0),
                Vector2::new(half.x - delta.y / 2.0, -half.y + delta.x / 2.0),
                Vector2::new(-half.x + delta.y / 2.0, -half.y - delta.x / 2.0),
            ],
            PadShape::Custom { outline } => {
                for v in outline {
                    self.add(pad.to_board(shape.offset + v.coords), corner_flags, id, PointKind::Corner);
                }
                return;
            }
        };

        let n = polygon.len();
        for (i, v) in polygon.iter().enumerate() {
            self.add(pad.to_board(shape.offset + v), corner_flags, id, PointKind::Corner);
            let mid = (v + polygon[(i + 1) % n]) / 2.0;
            self.add(pad.to_board(shape.offset + mid), outline_flags, id, PointKind::Midpoint);
        }
    }

    /// 两两求交；按所属图元排序，保证结果与输入顺序无关
    fn add_intersections(&mut self) {
        self.intersectables.sort_by_key(|(owner, _)| *owner);
        let prims = &self.intersectables;
        let mut found = Vec::new();

        for i in 0..prims.len() {
            for j in i + 1..prims.len() {
                let (a_id, a) = &prims[i];
                let (b_id, b) = &prims[j];
                if a_id == b_id {
                    continue;
                }
                for p in a.intersect(b) {
                    found.push(Anchor::new(
                        p,
                        AnchorFlags::CONSTRUCTED | AnchorFlags::SNAPPABLE,
                        vec![*a_id, *b_id],
                        PointKind::Intersection,
                    ));
                }
            }
        }

        tracing::trace!(count = found.len(), "intersection anchors");
        self.anchors.extend(found);
    }
}

/// 长圆形关键点（局部坐标）：两端顶点、直边中点、直边端点
pub fn oval_key_points(size: Vector2) -> Vec<(Vector2, PointKind)> {
    let horizontal = size.x >= size.y;
    let (major, minor) = if horizontal { (size.x, size.y) } else { (size.y, size.x) };
    let r = minor / 2.0;
    let half_len = (major - minor) / 2.0;
    let axis = |a: f64, b: f64| {
        if horizontal {
            Vector2::new(a, b)
        } else {
            Vector2::new(b, a)
        }
    };

    let mut points = vec![
        (axis(half_len + r, 0.0), PointKind::Quadrant),
        (axis(-half_len - r, 0.0), PointKind::Quadrant),
        (axis(0.0, r), PointKind::Midpoint),
        (axis(0.0, -r), PointKind::Midpoint),
    ];
    if half_len > EPSILON {
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                points.push((axis(sx * half_len, sy * r), PointKind::End));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{
        BarcodeItem, DimensionItem, Footprint, ImageItem, Padstack, TableItem, TextBoxItem,
    };
    use crate::layer::LayerId;

    fn square() -> BoardItem {
        BoardItem::polygon(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
            LayerId::EDGE_CUTS,
        )
    }

    fn constructed(anchors: &[Anchor]) -> Vec<&Anchor> {
        anchors.iter().filter(|a| a.is_constructed()).collect()
    }

    #[test]
    fn test_square_polygon_anchors() {
        let item = square();
        let anchors = compute_anchors(&[&item], &[], &AnchorQuery::new(Point2::origin()));

        let corners: Vec<_> = anchors
            .iter()
            .filter(|a| a.flags.contains(AnchorFlags::CORNER))
            .collect();
        assert_eq!(corners.len(), 4);
        assert!(corners.iter().all(|a| a.kind == PointKind::Corner));
        for v in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            assert!(corners.iter().any(|a| a.position == Point2::new(v.0, v.1)));
        }

        let mids: Vec<_> = anchors.iter().filter(|a| a.kind == PointKind::Midpoint).collect();
        assert_eq!(mids.len(), 4);
        for m in [(5.0, 0.0), (10.0, 5.0), (5.0, 10.0), (0.0, 5.0)] {
            assert!(mids.iter().any(|a| a.position == Point2::new(m.0, m.1)));
        }
        assert_eq!(anchors.len(), 8);
    }

    #[test]
    fn test_crossing_segments_intersection() {
        let a = BoardItem::segment(Point2::new(0.0, 5.0), Point2::new(10.0, 5.0), LayerId::F_SILKS);
        let b = BoardItem::segment(Point2::new(3.0, 0.0), Point2::new(3.0, 20.0), LayerId::F_SILKS);
        let anchors = compute_anchors(&[&a, &b], &[], &AnchorQuery::new(Point2::origin()));

        let hits = constructed(&anchors);
        assert_eq!(hits.len(), 1);
        let hit = hits[0];
        assert!(hit.flags.contains(AnchorFlags::CONSTRUCTED | AnchorFlags::SNAPPABLE));
        assert_eq!(hit.kind, PointKind::Intersection);
        assert!((hit.position - Point2::new(3.0, 5.0)).norm() < EPSILON);
        assert!(hit.items.contains(&a.id) && hit.items.contains(&b.id));
    }

    #[test]
    fn test_intersection_order_independent() {
        let a = BoardItem::segment(Point2::new(0.0, 0.0), Point2::new(10.0, 7.0), LayerId::F_CU);
        let b = BoardItem::segment(Point2::new(0.0, 9.0), Point2::new(8.0, -3.0), LayerId::F_CU);
        let query = AnchorQuery::new(Point2::origin());

        let ab = compute_anchors(&[&a, &b], &[], &query);
        let ba = compute_anchors(&[&b, &a], &[], &query);
        assert_eq!(constructed(&ab), constructed(&ba));
        assert_eq!(constructed(&ab).len(), 1);
    }

    #[test]
    fn test_for_drag_skips_intersections() {
        let a = BoardItem::segment(Point2::new(0.0, 5.0), Point2::new(10.0, 5.0), LayerId::F_SILKS);
        let b = BoardItem::segment(Point2::new(3.0, 0.0), Point2::new(3.0, 20.0), LayerId::F_SILKS);
        let mut query = AnchorQuery::new(Point2::origin());
        query.for_drag = true;
        let anchors = compute_anchors(&[&a, &b], &[], &query);
        assert!(constructed(&anchors).is_empty());
        assert_eq!(anchors.len(), 6);
    }

    #[test]
    fn test_layer_mask() {
        let item = BoardItem::circle(Point2::origin(), 2.0, LayerId::B_SILKS);
        let mut query = AnchorQuery::new(Point2::origin());
        query.layers = LayerSet::single(LayerId::F_SILKS);
        assert!(compute_anchors(&[&item], &[], &query).is_empty());

        query.layers = LayerSet::single(LayerId::B_SILKS);
        let anchors = compute_anchors(&[&item], &[], &query);
        assert_eq!(anchors.len(), 5);
        assert_eq!(anchors.iter().filter(|a| a.kind == PointKind::Quadrant).count(), 4);
    }

    #[test]
    fn test_construction_ray_intersection() {
        let a = BoardItem::segment(Point2::new(0.0, 0.0), Point2::new(5.0, 0.0), LayerId::F_SILKS);
        let b = BoardItem::segment(Point2::new(10.0, -5.0), Point2::new(10.0, 5.0), LayerId::F_SILKS);
        let batch = crate::construction::ConstructionBatch::for_item(&a, &Point2::origin()).unwrap();
        let anchors = compute_anchors(&[&a, &b], &batch.items, &AnchorQuery::new(Point2::origin()));

        let hits = constructed(&anchors);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].position - Point2::new(10.0, 0.0)).norm() < EPSILON);
    }

    fn rect_pad(position: Point2, drill: Option<Vector2>) -> BoardItem {
        BoardItem::new(
            ItemKind::Pad(Pad {
                position,
                orientation: 0.0,
                padstack: Padstack::uniform(PadLayerShape::new(
                    PadShape::RoundRect { radius_ratio: 0.25 },
                    Vector2::new(2.0, 1.0),
                )),
                drill,
            }),
            LayerSet::all_copper(),
        )
    }

    #[test]
    fn test_pad_anchors() {
        let pad = rect_pad(Point2::new(5.0, 5.0), Some(Vector2::new(0.6, 0.6)));
        let anchors = compute_anchors(&[&pad], &[], &AnchorQuery::new(Point2::origin()));
        // 中心 + 4 角 + 4 边中点 + 孔的 4 个象限点
        assert_eq!(anchors.len(), 13);
        assert!(anchors
            .iter()
            .any(|a| a.kind == PointKind::Corner && a.position == Point2::new(6.0, 5.5)));
        assert!(anchors
            .iter()
            .any(|a| a.kind == PointKind::Quadrant && (a.position - Point2::new(5.3, 5.0)).norm() < EPSILON));
    }

    #[test]
    fn test_oval_key_points() {
        let points = oval_key_points(Vector2::new(4.0, 2.0));
        assert_eq!(points.len(), 8);
        assert!(points.contains(&(Vector2::new(2.0, 0.0), PointKind::Quadrant)));
        assert!(points.contains(&(Vector2::new(0.0, 1.0), PointKind::Midpoint)));
        assert!(points.contains(&(Vector2::new(1.0, -1.0), PointKind::End)));

        assert_eq!(oval_key_points(Vector2::new(2.0, 2.0)).len(), 4);
    }

    #[test]
    fn test_footprint_source_selection() {
        let pad_a = rect_pad(Point2::new(0.0, 0.0), None);
        let pad_b = rect_pad(Point2::new(10.0, 0.0), None);
        let silk = BoardItem::segment(Point2::new(-2.0, 3.0), Point2::new(12.0, 3.0), LayerId::F_SILKS);
        let fp = BoardItem::new(
            ItemKind::Footprint(Footprint {
                position: Point2::new(0.0, 0.0),
                orientation: 0.0,
                reference: "R1".into(),
                children: vec![pad_a.clone(), pad_b.clone(), silk],
            }),
            LayerSet::single(LayerId::F_CU),
        );

        let mut query = AnchorQuery::new(Point2::new(10.2, 0.1));
        query.grid_size = 1.0;
        let all = compute_anchors(&[&fp], &[], &query);
        // 两个焊盘各 9 个、丝印 3 个、原点和质心
        assert_eq!(all.iter().filter(|a| a.items == vec![fp.id]).count(), 2);
        assert!(all.iter().any(|a| a.items == vec![pad_a.id]));

        query.for_source_selection = true;
        query.filter = Some(SelectionFilter::default());
        let source = compute_anchors(&[&fp], &[], &query);
        assert!(source.iter().all(|a| a.items != vec![pad_a.id]));
        assert_eq!(source.iter().filter(|a| a.items == vec![pad_b.id]).count(), 9);

        query.filter = Some(SelectionFilter {
            footprints: false,
            ..SelectionFilter::default()
        });
        let pads_only = compute_anchors(&[&fp], &[], &query);
        assert!(pads_only.iter().all(|a| a.items != vec![fp.id]));
    }

    fn pad_item(shape: PadShape, size: Vector2, drill: Option<Vector2>) -> BoardItem {
        BoardItem::new(
            ItemKind::Pad(Pad {
                position: Point2::origin(),
                orientation: 0.0,
                padstack: Padstack::uniform(PadLayerShape::new(shape, size)),
                drill,
            }),
            LayerSet::single(LayerId::F_CU),
        )
    }

    fn anchors_of(item: &BoardItem) -> Vec<Anchor> {
        compute_anchors(&[item], &[], &AnchorQuery::new(Point2::origin()))
    }

    fn has_anchor(anchors: &[Anchor], kind: PointKind, x: f64, y: f64) -> bool {
        anchors
            .iter()
            .any(|a| a.kind == kind && (a.position - Point2::new(x, y)).norm() < EPSILON)
    }

    #[test]
    fn test_group_is_visited_recursively() {
        let seg = BoardItem::segment(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), LayerId::F_SILKS);
        let circle = BoardItem::circle(Point2::new(10.0, 10.0), 1.0, LayerId::F_SILKS);
        let inner = BoardItem::on_layer(ItemKind::Group(vec![circle.clone()]), LayerId::F_SILKS);
        let outer = BoardItem::on_layer(ItemKind::Group(vec![seg.clone(), inner.clone()]), LayerId::F_SILKS);

        let anchors = anchors_of(&outer);
        // 线段 3 个 + 圆 5 个，组本身不产生锚点
        assert_eq!(anchors.len(), 8);
        assert_eq!(anchors.iter().filter(|a| a.items == vec![seg.id]).count(), 3);
        assert_eq!(anchors.iter().filter(|a| a.items == vec![circle.id]).count(), 5);
        assert!(anchors.iter().all(|a| !a.items.contains(&outer.id) && !a.items.contains(&inner.id)));
        assert!(has_anchor(&anchors, PointKind::Center, 10.0, 10.0));
    }

    #[test]
    fn test_pad_shape_key_points() {
        let trapezoid = anchors_of(&pad_item(
            PadShape::Trapezoid { delta: Vector2::new(0.4, 0.0) },
            Vector2::new(2.0, 1.0),
            None,
        ));
        assert_eq!(trapezoid.len(), 9);
        assert!(has_anchor(&trapezoid, PointKind::Corner, -1.0, 0.7));
        assert!(has_anchor(&trapezoid, PointKind::Corner, 1.0, 0.3));
        assert!(has_anchor(&trapezoid, PointKind::Corner, 1.0, -0.3));
        assert!(has_anchor(&trapezoid, PointKind::Corner, -1.0, -0.7));

        // 倒角只取直边角点和中点
        let chamfered = anchors_of(&pad_item(
            PadShape::ChamferedRect { chamfer_ratio: 0.2 },
            Vector2::new(2.0, 1.0),
            None,
        ));
        assert_eq!(chamfered.len(), 9);
        assert!(has_anchor(&chamfered, PointKind::Corner, 1.0, 0.5));
        assert!(has_anchor(&chamfered, PointKind::Midpoint, 0.0, -0.5));

        let custom = anchors_of(&pad_item(
            PadShape::Custom {
                outline: vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)],
            },
            Vector2::new(1.0, 1.0),
            None,
        ));
        assert_eq!(custom.len(), 4);
        assert_eq!(custom.iter().filter(|a| a.kind == PointKind::Corner).count(), 3);
        assert!(has_anchor(&custom, PointKind::Corner, 1.0, 0.0));

        let oval = anchors_of(&pad_item(PadShape::Oval, Vector2::new(4.0, 2.0), None));
        assert_eq!(oval.len(), 9);
        assert!(has_anchor(&oval, PointKind::Quadrant, -2.0, 0.0));
        assert!(has_anchor(&oval, PointKind::Midpoint, 0.0, 1.0));
        assert!(has_anchor(&oval, PointKind::End, 1.0, -1.0));
    }

    #[test]
    fn test_oval_drill_key_points() {
        let pad = pad_item(PadShape::Circle, Vector2::new(3.0, 3.0), Some(Vector2::new(1.0, 0.6)));
        let anchors = anchors_of(&pad);
        // 中心 + 焊盘 4 个象限点 + 长圆孔 8 个关键点
        assert_eq!(anchors.len(), 13);
        assert!(has_anchor(&anchors, PointKind::Quadrant, 1.5, 0.0));
        assert!(has_anchor(&anchors, PointKind::Quadrant, 0.5, 0.0));
        assert!(has_anchor(&anchors, PointKind::Midpoint, 0.0, 0.3));
        assert!(has_anchor(&anchors, PointKind::End, 0.2, -0.3));
    }

    #[test]
    fn test_padstack_layer_override_anchors() {
        let mut padstack = Padstack::uniform(PadLayerShape::new(PadShape::Rect, Vector2::new(2.0, 1.0)));
        padstack
            .overrides
            .push((LayerId::B_CU, PadLayerShape::new(PadShape::Circle, Vector2::new(3.0, 3.0))));
        let pad = BoardItem::new(
            ItemKind::Pad(Pad {
                position: Point2::origin(),
                orientation: 0.0,
                padstack,
                drill: None,
            }),
            LayerSet::from_layers([LayerId::F_CU, LayerId::B_CU]),
        );

        let mut query = AnchorQuery::new(Point2::origin());
        query.layers = LayerSet::single(LayerId::F_CU);
        let front = compute_anchors(&[&pad], &[], &query);
        assert_eq!(front.len(), 9);
        assert!(front.iter().all(|a| a.kind != PointKind::Quadrant));

        query.layers = LayerSet::single(LayerId::B_CU);
        let back = compute_anchors(&[&pad], &[], &query);
        assert_eq!(back.len(), 5);
        assert!(has_anchor(&back, PointKind::Quadrant, 1.5, 0.0));
        assert!(back.iter().all(|a| a.kind != PointKind::Corner));

        query.layers = LayerSet::from_layers([LayerId::F_CU, LayerId::B_CU]);
        let both = compute_anchors(&[&pad], &[], &query);
        assert_eq!(both.len(), 13);
        assert!(has_anchor(&both, PointKind::Quadrant, 0.0, -1.5));
        assert!(has_anchor(&both, PointKind::Corner, -1.0, 0.5));
    }

    #[test]
    fn test_box_like_items() {
        let rect = BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(4.0, 2.0));
        let text_box = BoardItem::on_layer(
            ItemKind::TextBox(TextBoxItem {
                rect,
                content: "NOTE".into(),
            }),
            LayerId::F_SILKS,
        );
        let barcode = BoardItem::on_layer(
            ItemKind::Barcode(BarcodeItem {
                rect,
                payload: "SN-0001".into(),
            }),
            LayerId::F_SILKS,
        );
        let image = BoardItem::on_layer(
            ItemKind::Image(ImageItem {
                center: Point2::new(2.0, 1.0),
                size: Vector2::new(4.0, 2.0),
            }),
            LayerId::USER_DRAWINGS,
        );

        for item in [&text_box, &barcode, &image] {
            let anchors = anchors_of(item);
            assert_eq!(anchors.len(), 9, "{}", item.type_name());
            assert!(has_anchor(&anchors, PointKind::Corner, 4.0, 2.0));
            assert!(has_anchor(&anchors, PointKind::Midpoint, 2.0, 0.0));
            assert!(has_anchor(&anchors, PointKind::Center, 2.0, 1.0));
        }
    }

    #[test]
    fn test_table_cell_corners() {
        let table = BoardItem::on_layer(
            ItemKind::Table(TableItem {
                origin: Point2::new(1.0, 1.0),
                column_widths: vec![10.0, 20.0],
                row_heights: vec![5.0, 5.0],
            }),
            LayerId::USER_DRAWINGS,
        );
        let anchors = anchors_of(&table);
        assert_eq!(anchors.len(), 9);
        assert!(anchors.iter().all(|a| a.kind == PointKind::Corner));
        assert!(has_anchor(&anchors, PointKind::Corner, 11.0, 6.0));
        assert!(has_anchor(&anchors, PointKind::Corner, 31.0, 11.0));
    }

    #[test]
    fn test_dimension_crossbar_anchors() {
        let dim = BoardItem::on_layer(
            ItemKind::Dimension(DimensionItem {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(10.0, 0.0),
                height: 2.0,
            }),
            LayerId::USER_DRAWINGS,
        );
        let anchors = anchors_of(&dim);
        assert_eq!(anchors.len(), 4);
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (0.0, 2.0), (10.0, 2.0)] {
            assert!(has_anchor(&anchors, PointKind::End, x, y));
        }

        // 横杆参与求交
        let cross = BoardItem::segment(Point2::new(5.0, -1.0), Point2::new(5.0, 5.0), LayerId::F_SILKS);
        let all = compute_anchors(&[&dim, &cross], &[], &AnchorQuery::new(Point2::origin()));
        let hits = constructed(&all);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].position - Point2::new(5.0, 2.0)).norm() < EPSILON);
    }

    #[test]
    fn test_aux_origin() {
        let mut query = AnchorQuery::new(Point2::origin());
        query.aux_origin = Some(Point2::new(1.0, 2.0));
        let anchors = compute_anchors(&[], &[], &query);
        assert_eq!(anchors.len(), 1);
        assert!(anchors[0].flags.contains(AnchorFlags::ORIGIN | AnchorFlags::SNAPPABLE));
        assert!(anchors[0].items.is_empty());
    }
}
