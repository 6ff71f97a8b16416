//! PCBSnap 演示程序
//! 构建一块演示板，回放一段光标轨迹并输出每一步的捕捉结果

use anyhow::Result;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use pcbsnap_core::construction::ConstructionItem;
use pcbsnap_core::item::{BoardItem, Footprint, ItemKind, Pad, PadLayerShape, PadShape, Padstack};
use pcbsnap_core::layer::{LayerId, LayerSet};
use pcbsnap_core::math::{Point2, Vector2};
use pcbsnap_core::anchor::PointKind;
use pcbsnap_core::snap::{GridKind, SnapConfig, SnapEngine, SnapOverlay};
use pcbsnap_core::spatial::{BoardView, VisibilityQuery};
use pcbsnap_core::spline::{BSpline, KnotKind};
use pcbsnap_import::{import_drawing, ImportOptions};

/// 空间索引的网格单元大小（mm）
const INDEX_CELL_SIZE: f64 = 5.0;

/// 把叠加显示请求写到日志
struct LogOverlay;

impl SnapOverlay for LogOverlay {
    fn set_marker(&mut self, point: Option<Point2>, kind: PointKind) {
        if let Some(p) = point {
            debug!(x = p.x, y = p.y, kind = kind.name(), "marker");
        }
    }

    fn set_construction(&mut self, items: &[ConstructionItem]) {
        debug!(count = items.len(), "construction overlay");
    }

    fn set_snap_line(&mut self, origin: Option<Point2>, end: Option<Point2>) {
        if let (Some(o), Some(e)) = (origin, end) {
            debug!(ox = o.x, oy = o.y, ex = e.x, ey = e.y, "snap line");
        }
    }
}

fn demo_footprint() -> BoardItem {
    let pad = |x: f64| {
        BoardItem::new(
            ItemKind::Pad(Pad {
                position: Point2::new(x, 20.0),
                orientation: 0.0,
                padstack: Padstack::uniform(PadLayerShape::new(
                    PadShape::RoundRect { radius_ratio: 0.25 },
                    Vector2::new(1.2, 1.4),
                )),
                drill: None,
            }),
            LayerSet::single(LayerId::F_CU),
        )
    };
    let courtyard = BoardItem::rect(Point2::new(18.5, 18.8), Point2::new(23.5, 21.2), LayerId::F_SILKS);

    BoardItem::on_layer(
        ItemKind::Footprint(Footprint {
            position: Point2::new(21.0, 20.0),
            orientation: 0.0,
            reference: "R1".to_string(),
            children: vec![pad(20.0), pad(22.0), courtyard],
        }),
        LayerId::F_CU,
    )
}

/// 在内存中构建一张带样条的 DXF 图纸
fn demo_drawing() -> dxf::Drawing {
    let mut drawing = dxf::Drawing::new();

    let mut spline = dxf::entities::Spline::default();
    spline.degree_of_curve = 3;
    spline.control_points = [(5.0, 5.0), (10.0, 15.0), (20.0, 0.0), (30.0, 10.0), (35.0, 5.0)]
        .iter()
        .map(|&(x, y)| dxf::Point::new(x, y, 0.0))
        .collect();
    drawing.add_entity(dxf::entities::Entity::new(dxf::entities::EntityType::Spline(spline)));

    drawing.add_entity(dxf::entities::Entity::new(dxf::entities::EntityType::Line(
        dxf::entities::Line::new(dxf::Point::new(0.0, 30.0, 0.0), dxf::Point::new(40.0, 30.0, 0.0)),
    )));

    drawing
}

fn build_board() -> BoardView {
    let mut view = BoardView::new(INDEX_CELL_SIZE);

    view.add(BoardItem::polygon(
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(40.0, 0.0),
            Point2::new(40.0, 30.0),
            Point2::new(0.0, 30.0),
        ],
        LayerId::EDGE_CUTS,
    ));
    view.add(BoardItem::segment(Point2::new(5.0, 25.0), Point2::new(15.0, 25.0), LayerId::F_CU));
    view.add(BoardItem::circle(Point2::new(32.0, 22.0), 3.0, LayerId::F_SILKS));
    view.add(demo_footprint());

    let outcome = import_drawing(&demo_drawing(), &ImportOptions::default());
    for message in outcome.report.messages() {
        info!(message = message.as_str(), "import report");
    }
    for item in outcome.items {
        view.add(item);
    }

    view
}

fn main() -> Result<()> {
    // 初始化日志
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(Level::INFO).finish()
    )?;

    info!("Starting PCBSnap demo...");

    let view = build_board();
    info!(items = view.len(), "board ready");

    let config = SnapConfig::default();
    info!(config = %serde_json::to_string(&config)?, "snap config");

    let mut engine = SnapEngine::with_overlay(config, Box::new(LogOverlay));
    engine.set_world_per_pixel(0.02);

    // 光标轨迹：靠近板角，沿捕捉线移动，经过封装焊盘和圆
    let trajectory = [
        (0.2, 0.3),
        (0.5, 0.2),
        (7.9, 0.2),
        (15.1, 24.8),
        (20.1, 19.9),
        (20.4, 20.1),
        (29.1, 22.2),
        (33.0, 12.0),
    ];

    for (x, y) in trajectory {
        let cursor = Point2::new(x, y);
        let snap = engine.best_snap_anchor(&view, cursor, LayerSet::ALL, GridKind::Default, &[]);
        info!(
            cursor_x = x,
            cursor_y = y,
            x = snap.point.x,
            y = snap.point.y,
            source = ?snap.source,
            kind = snap.kind.name(),
            state = ?engine.state(),
            "snap"
        );
    }

    let around = pcbsnap_core::math::BoundingBox2::around(Point2::new(21.0, 20.0), 3.0);
    let selection = view.query_visible(&around, LayerSet::ALL, &[]);
    let origin = engine.best_drag_origin(Point2::new(20.3, 20.3), &selection, None);
    info!(x = origin.x, y = origin.y, "drag origin");

    engine.cancel();

    // 样条内核：在曲线上均匀取样
    let curve = BSpline::new(4, 2, 3, KnotKind::Clamped)?
        .with_control_points(&[0.0, 0.0, 1.0, 2.0, 3.0, 2.0, 4.0, 0.0])?;
    let samples = curve.sample(5)?;
    info!(samples = ?samples, "bezier samples");

    Ok(())
}
