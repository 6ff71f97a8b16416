//! 板级图元
//!
//! 捕捉引擎看到的板上对象。每种对象是 [`ItemKind`] 的一个变体，
//! 锚点计算和求交都通过对该枚举的一次分派完成，新增对象类型只需
//! 扩展枚举与分派表。
//!
//! 坐标均为板坐标（封装的子图元也已放置到板上）。

use crate::geometry::{Arc, Circle, Polygon, Primitive, Segment};
use crate::layer::{LayerId, LayerSet};
use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// 图元ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    /// 分配一个进程内唯一的新ID
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// 带线宽的图形线段（也用于走线）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentItem {
    pub segment: Segment,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcItem {
    pub arc: Arc,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleItem {
    pub circle: Circle,
    pub width: f64,
    pub filled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectItem {
    pub rect: BoundingBox2,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonItem {
    pub polygon: Polygon,
    pub width: f64,
}

/// 三次贝塞尔图形（导入的样条最终落到这里）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierItem {
    pub start: Point2,
    pub ctrl1: Point2,
    pub ctrl2: Point2,
    pub end: Point2,
    pub width: f64,
}

impl BezierItem {
    pub fn point_at(&self, t: f64) -> Point2 {
        let mt = 1.0 - t;
        let c = self.start.coords * (mt * mt * mt)
            + self.ctrl1.coords * (3.0 * mt * mt * t)
            + self.ctrl2.coords * (3.0 * mt * t * t)
            + self.end.coords * (t * t * t);
        Point2::from(c)
    }

    /// 折线近似上的最近距离
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        const STEPS: usize = 32;
        (0..STEPS)
            .map(|i| {
                let a = self.point_at(i as f64 / STEPS as f64);
                let b = self.point_at((i + 1) as f64 / STEPS as f64);
                Segment::new(a, b).distance_to_point(point)
            })
            .fold(f64::MAX, f64::min)
    }
}

/// 焊盘形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PadShape {
    Circle,
    Oval,
    Rect,
    /// `delta` 为梯形两对边的尺寸差
    Trapezoid { delta: Vector2 },
    RoundRect { radius_ratio: f64 },
    ChamferedRect { chamfer_ratio: f64 },
    /// 自定义外形（焊盘局部坐标，未旋转）
    Custom { outline: Vec<Point2> },
}

/// 焊盘在某一层上的形状
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadLayerShape {
    pub shape: PadShape,
    pub size: Vector2,
    /// 形状相对焊盘中心的偏移（局部坐标）
    pub offset: Vector2,
}

impl PadLayerShape {
    pub fn new(shape: PadShape, size: Vector2) -> Self {
        Self {
            shape,
            size,
            offset: Vector2::zeros(),
        }
    }
}

/// 焊盘叠层：默认形状加按层覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Padstack {
    pub default: PadLayerShape,
    pub overrides: Vec<(LayerId, PadLayerShape)>,
}

impl Padstack {
    pub fn uniform(shape: PadLayerShape) -> Self {
        Self {
            default: shape,
            overrides: Vec::new(),
        }
    }

    pub fn shape_on(&self, layer: LayerId) -> &PadLayerShape {
        self.overrides
            .iter()
            .find(|(l, _)| *l == layer)
            .map(|(_, s)| s)
            .unwrap_or(&self.default)
    }

    pub fn has_layer_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }
}

/// 焊盘
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    pub position: Point2,
    /// 旋转角度（弧度）
    pub orientation: f64,
    pub padstack: Padstack,
    /// 钻孔尺寸（圆孔 x == y，长圆孔 x != y）
    pub drill: Option<Vector2>,
}

impl Pad {
    /// 局部坐标到板坐标
    pub fn to_board(&self, local: Vector2) -> Point2 {
        let (s, c) = self.orientation.sin_cos();
        self.position + Vector2::new(local.x * c - local.y * s, local.x * s + local.y * c)
    }

    /// 某层形状的中心（考虑偏移）
    pub fn shape_position(&self, shape: &PadLayerShape) -> Point2 {
        self.to_board(shape.offset)
    }

    /// 形状的外接尺寸（粗略估计，用于包围盒）
    fn shape_radius(shape: &PadLayerShape) -> f64 {
        match &shape.shape {
            PadShape::Custom { outline } => outline
                .iter()
                .map(|p| p.coords.norm())
                .fold(0.0, f64::max),
            PadShape::Trapezoid { delta } => {
                (shape.size + delta.abs()).norm() / 2.0
            }
            _ => shape.size.norm() / 2.0,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        let mut bbox = BoundingBox2::empty();
        let shapes =
            std::iter::once(&self.padstack.default).chain(self.padstack.overrides.iter().map(|(_, s)| s));
        for shape in shapes {
            let center = self.shape_position(shape);
            bbox.merge(&BoundingBox2::around(center, Self::shape_radius(shape)));
        }
        if let Some(drill) = self.drill {
            bbox.merge(&BoundingBox2::around(self.position, drill.x.max(drill.y) / 2.0));
        }
        bbox
    }
}

/// 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    /// 插入点
    pub position: Point2,
    pub content: String,
    pub height: f64,
    /// 旋转角度（弧度）
    pub rotation: f64,
}

impl TextItem {
    pub fn new(position: Point2, content: impl Into<String>, height: f64) -> Self {
        Self {
            position,
            content: content.into(),
            height,
            rotation: 0.0,
        }
    }

    /// 估算文本宽度（CJK 字符约等于字高，其余约为字高的0.6倍）
    pub fn estimated_width(&self) -> f64 {
        let char_count = self.content.chars().count();
        let cjk_count = self.content.chars().filter(|c| Self::is_cjk(*c)).count();
        let ascii_count = char_count - cjk_count;

        (cjk_count as f64 * self.height) + (ascii_count as f64 * self.height * 0.6)
    }

    fn is_cjk(c: char) -> bool {
        matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        let width = self.estimated_width();
        let height = self.height;

        if self.rotation.abs() < EPSILON {
            return BoundingBox2::new(
                self.position,
                Point2::new(self.position.x + width, self.position.y + height),
            );
        }

        let (sin_r, cos_r) = self.rotation.sin_cos();
        let corners = [(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)];
        BoundingBox2::from_points(corners.iter().map(|&(x, y)| {
            Point2::new(
                x * cos_r - y * sin_r + self.position.x,
                x * sin_r + y * cos_r + self.position.y,
            )
        }))
    }
}

/// 文本框
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBoxItem {
    pub rect: BoundingBox2,
    pub content: String,
}

/// 表格：从 `origin` 开始向 +x/+y 排布的单元格网格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableItem {
    pub origin: Point2,
    pub column_widths: Vec<f64>,
    pub row_heights: Vec<f64>,
}

impl TableItem {
    /// 所有单元格网格交点
    pub fn grid_points(&self) -> Vec<Point2> {
        let xs: Vec<f64> = std::iter::once(0.0)
            .chain(self.column_widths.iter().scan(0.0, |acc, w| {
                *acc += w;
                Some(*acc)
            }))
            .collect();
        let ys: Vec<f64> = std::iter::once(0.0)
            .chain(self.row_heights.iter().scan(0.0, |acc, h| {
                *acc += h;
                Some(*acc)
            }))
            .collect();

        let mut points = Vec::with_capacity(xs.len() * ys.len());
        for y in &ys {
            for x in &xs {
                points.push(Point2::new(self.origin.x + x, self.origin.y + y));
            }
        }
        points
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        let w: f64 = self.column_widths.iter().sum();
        let h: f64 = self.row_heights.iter().sum();
        BoundingBox2::new(self.origin, Point2::new(self.origin.x + w, self.origin.y + h))
    }
}

/// 条形码/二维码
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeItem {
    pub rect: BoundingBox2,
    pub payload: String,
}

/// 对齐尺寸标注：测量 `start`-`end`，标注线沿法向偏移 `height`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionItem {
    pub start: Point2,
    pub end: Point2,
    pub height: f64,
}

impl DimensionItem {
    /// 标注线（横杆）两端
    pub fn crossbar(&self) -> Segment {
        let dir = Segment::new(self.start, self.end).direction();
        let normal = Vector2::new(-dir.y, dir.x) * self.height;
        Segment::new(self.start + normal, self.end + normal)
    }

    pub fn measurement(&self) -> f64 {
        (self.end - self.start).norm()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        let bar = self.crossbar();
        BoundingBox2::from_points([self.start, self.end, bar.start, bar.end])
    }
}

/// 封装
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub position: Point2,
    pub orientation: f64,
    pub reference: String,
    pub children: Vec<BoardItem>,
}

impl Footprint {
    /// 子图元包围盒的中心
    pub fn centroid(&self) -> Option<Point2> {
        let mut bbox = BoundingBox2::empty();
        for child in &self.children {
            bbox.merge(&child.bounding_box());
        }
        (!bbox.is_empty()).then(|| bbox.center())
    }
}

/// 参考图片（以中心定位）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    pub center: Point2,
    pub size: Vector2,
}

impl ImageItem {
    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::new(
            Point2::new(self.center.x - self.size.x / 2.0, self.center.y - self.size.y / 2.0),
            Point2::new(self.center.x + self.size.x / 2.0, self.center.y + self.size.y / 2.0),
        )
    }
}

/// 图元类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    Segment(SegmentItem),
    Arc(ArcItem),
    Circle(CircleItem),
    Rect(RectItem),
    Polygon(PolygonItem),
    Bezier(BezierItem),
    Pad(Pad),
    Text(TextItem),
    TextBox(TextBoxItem),
    Table(TableItem),
    Barcode(BarcodeItem),
    Dimension(DimensionItem),
    Footprint(Footprint),
    Group(Vec<BoardItem>),
    Image(ImageItem),
}

/// 板上的一个图元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub id: ItemId,
    pub layers: LayerSet,
    pub kind: ItemKind,
}

impl BoardItem {
    pub fn new(kind: ItemKind, layers: LayerSet) -> Self {
        Self {
            id: ItemId::new(),
            layers,
            kind,
        }
    }

    pub fn on_layer(kind: ItemKind, layer: LayerId) -> Self {
        Self::new(kind, LayerSet::single(layer))
    }

    pub fn segment(start: Point2, end: Point2, layer: LayerId) -> Self {
        Self::on_layer(
            ItemKind::Segment(SegmentItem {
                segment: Segment::new(start, end),
                width: 0.0,
            }),
            layer,
        )
    }

    pub fn arc(arc: Arc, layer: LayerId) -> Self {
        Self::on_layer(ItemKind::Arc(ArcItem { arc, width: 0.0 }), layer)
    }

    pub fn circle(center: Point2, radius: f64, layer: LayerId) -> Self {
        Self::on_layer(
            ItemKind::Circle(CircleItem {
                circle: Circle::new(center, radius),
                width: 0.0,
                filled: false,
            }),
            layer,
        )
    }

    pub fn rect(a: Point2, b: Point2, layer: LayerId) -> Self {
        Self::on_layer(
            ItemKind::Rect(RectItem {
                rect: BoundingBox2::new(a, b),
                width: 0.0,
            }),
            layer,
        )
    }

    pub fn polygon(vertices: Vec<Point2>, layer: LayerId) -> Self {
        Self::on_layer(
            ItemKind::Polygon(PolygonItem {
                polygon: Polygon::new(vertices),
                width: 0.0,
            }),
            layer,
        )
    }

    /// 获取图元的类型名称
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ItemKind::Segment(_) => "Segment",
            ItemKind::Arc(_) => "Arc",
            ItemKind::Circle(_) => "Circle",
            ItemKind::Rect(_) => "Rect",
            ItemKind::Polygon(_) => "Polygon",
            ItemKind::Bezier(_) => "Bezier",
            ItemKind::Pad(_) => "Pad",
            ItemKind::Text(_) => "Text",
            ItemKind::TextBox(_) => "TextBox",
            ItemKind::Table(_) => "Table",
            ItemKind::Barcode(_) => "Barcode",
            ItemKind::Dimension(_) => "Dimension",
            ItemKind::Footprint(_) => "Footprint",
            ItemKind::Group(_) => "Group",
            ItemKind::Image(_) => "Image",
        }
    }

    /// 子图元（封装和组）
    pub fn children(&self) -> &[BoardItem] {
        match &self.kind {
            ItemKind::Footprint(fp) => &fp.children,
            ItemKind::Group(members) => members,
            _ => &[],
        }
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        match &self.kind {
            ItemKind::Segment(s) => s.segment.bounding_box().inflated(s.width / 2.0),
            ItemKind::Arc(a) => a.arc.bounding_box().inflated(a.width / 2.0),
            ItemKind::Circle(c) => c.circle.bounding_box().inflated(c.width / 2.0),
            ItemKind::Rect(r) => r.rect.inflated(r.width / 2.0),
            ItemKind::Polygon(p) => p.polygon.bounding_box().inflated(p.width / 2.0),
            ItemKind::Bezier(b) => {
                BoundingBox2::from_points([b.start, b.ctrl1, b.ctrl2, b.end]).inflated(b.width / 2.0)
            }
            ItemKind::Pad(pad) => pad.bounding_box(),
            ItemKind::Text(t) => t.bounding_box(),
            ItemKind::TextBox(t) => t.rect,
            ItemKind::Table(t) => t.bounding_box(),
            ItemKind::Barcode(b) => b.rect,
            ItemKind::Dimension(d) => d.bounding_box(),
            ItemKind::Footprint(fp) => {
                let mut bbox = BoundingBox2::from_points([fp.position]);
                for child in &fp.children {
                    bbox.merge(&child.bounding_box());
                }
                bbox
            }
            ItemKind::Group(members) => {
                let mut bbox = BoundingBox2::empty();
                for m in members {
                    bbox.merge(&m.bounding_box());
                }
                bbox
            }
            ItemKind::Image(img) => img.bounding_box(),
        }
    }

    /// 理想化的可求交图元（零线宽）
    pub fn intersectables(&self) -> Vec<Primitive> {
        match &self.kind {
            ItemKind::Segment(s) if !s.segment.is_degenerate() => vec![Primitive::Segment(s.segment)],
            ItemKind::Arc(a) => vec![Primitive::Arc(a.arc)],
            ItemKind::Circle(c) => vec![Primitive::Circle(c.circle)],
            ItemKind::Rect(r) => vec![Primitive::Rect(r.rect)],
            ItemKind::Polygon(p) => p
                .polygon
                .edges()
                .filter(|e| !e.is_degenerate())
                .map(Primitive::Segment)
                .collect(),
            ItemKind::Dimension(d) => vec![Primitive::Segment(d.crossbar())],
            _ => Vec::new(),
        }
    }

    /// 点到图元实际形状的距离（用于等距锚点的裁决）
    pub fn distance_to_point(&self, point: &Point2) -> f64 {
        match &self.kind {
            ItemKind::Segment(s) => (s.segment.distance_to_point(point) - s.width / 2.0).max(0.0),
            ItemKind::Arc(a) => (a.arc.distance_to_point(point) - a.width / 2.0).max(0.0),
            ItemKind::Circle(c) => {
                if c.filled && (point - c.circle.center).norm() <= c.circle.radius {
                    0.0
                } else {
                    (c.circle.distance_to_point(point) - c.width / 2.0).max(0.0)
                }
            }
            ItemKind::Rect(r) => (Primitive::Rect(r.rect).distance_to_point(point) - r.width / 2.0).max(0.0),
            ItemKind::Polygon(p) => {
                if p.polygon.contains(point) {
                    0.0
                } else {
                    (p.polygon.distance_to_point(point) - p.width / 2.0).max(0.0)
                }
            }
            ItemKind::Bezier(b) => (b.distance_to_point(point) - b.width / 2.0).max(0.0),
            ItemKind::Footprint(_) | ItemKind::Group(_) => self
                .children()
                .iter()
                .map(|c| c.distance_to_point(point))
                .fold(self.bounding_box().distance_to_point(point), f64::min),
            _ => self.bounding_box().distance_to_point(point),
        }
    }

    /// 点击测试
    pub fn hit_test(&self, point: &Point2, tolerance: f64) -> bool {
        self.distance_to_point(point) <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_grid_points() {
        let table = TableItem {
            origin: Point2::new(0.0, 0.0),
            column_widths: vec![10.0, 20.0],
            row_heights: vec![5.0],
        };
        let pts = table.grid_points();
        assert_eq!(pts.len(), 6);
        assert!(pts.contains(&Point2::new(30.0, 5.0)));
        assert_eq!(table.bounding_box().max, Point2::new(30.0, 5.0));
    }

    #[test]
    fn test_dimension_crossbar() {
        let dim = DimensionItem {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(10.0, 0.0),
            height: 5.0,
        };
        let bar = dim.crossbar();
        assert!((bar.start - Point2::new(0.0, 5.0)).norm() < EPSILON);
        assert!((bar.end - Point2::new(10.0, 5.0)).norm() < EPSILON);
        assert!((dim.measurement() - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_hit_test_polygon() {
        let item = BoardItem::polygon(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
            LayerId::F_CU,
        );
        assert!(item.hit_test(&Point2::new(5.0, 5.0), 0.0));
        assert!(item.hit_test(&Point2::new(11.0, 5.0), 1.5));
        assert!(!item.hit_test(&Point2::new(20.0, 5.0), 1.0));
        assert_eq!(item.intersectables().len(), 4);
    }

    #[test]
    fn test_padstack_layer_override() {
        let stack = Padstack {
            default: PadLayerShape::new(PadShape::Circle, Vector2::new(1.0, 1.0)),
            overrides: vec![(
                LayerId::B_CU,
                PadLayerShape::new(PadShape::Rect, Vector2::new(2.0, 1.0)),
            )],
        };
        assert_eq!(stack.shape_on(LayerId::F_CU).shape, PadShape::Circle);
        assert_eq!(stack.shape_on(LayerId::B_CU).shape, PadShape::Rect);
    }

    #[test]
    fn test_item_ids_are_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }
}
