//! DXF图元导入
//!
//! 把内存中的 `dxf::Drawing` 转换为板上图元。支持 LINE、CIRCLE、ARC、
//! LWPOLYLINE（含凸度）和 SPLINE，其他实体跳过。

use crate::spline_import::{import_spline, ImportReport, SplineDefinition};
use pcbsnap_core::geometry::Arc;
use pcbsnap_core::item::BoardItem;
use pcbsnap_core::layer::LayerId;
use pcbsnap_core::math::{Point2, Vector2, EPSILON};

/// 导入选项
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// 退化贝塞尔段的判定容差
    pub tolerance: f64,
    /// 导入图元所在的图层
    pub default_layer: LayerId,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            default_layer: LayerId::USER_DRAWINGS,
        }
    }
}

/// 导入结果
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub items: Vec<BoardItem>,
    pub report: ImportReport,
}

/// 导入整个图纸；单个实体失败不会中断导入
pub fn import_drawing(drawing: &dxf::Drawing, options: &ImportOptions) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    let layer = options.default_layer;

    for entity in drawing.entities() {
        let items = convert_dxf_entity(entity, options, &mut outcome.report);
        if items.is_empty() {
            continue;
        }
        if !matches!(entity.specific, dxf::entities::EntityType::Spline(_)) {
            outcome.report.record_imported(items.len());
        }
        outcome.items.extend(items);
    }

    tracing::info!(
        items = outcome.items.len(),
        skipped = outcome.report.skipped(),
        messages = outcome.report.messages().len(),
        layer = layer.0,
        "DXF import finished"
    );
    outcome
}

fn dxf_point(p: &dxf::Point) -> Point2 {
    Point2::new(p.x, p.y)
}

/// 将DXF实体转换为板上图元
fn convert_dxf_entity(
    entity: &dxf::entities::Entity,
    options: &ImportOptions,
    report: &mut ImportReport,
) -> Vec<BoardItem> {
    let layer = options.default_layer;

    match &entity.specific {
        dxf::entities::EntityType::Line(line) => {
            vec![BoardItem::segment(dxf_point(&line.p1), dxf_point(&line.p2), layer)]
        }

        dxf::entities::EntityType::Circle(circle) => {
            vec![BoardItem::circle(dxf_point(&circle.center), circle.radius, layer)]
        }

        dxf::entities::EntityType::Arc(arc) => {
            let arc = Arc::new(
                dxf_point(&arc.center),
                arc.radius,
                arc.start_angle.to_radians(),
                arc.end_angle.to_radians(),
            );
            vec![BoardItem::arc(arc, layer)]
        }

        dxf::entities::EntityType::LwPolyline(lwpoly) => {
            let vertices: Vec<(Point2, f64)> = lwpoly
                .vertices
                .iter()
                .map(|v| (Point2::new(v.x, v.y), v.bulge))
                .collect();
            let items = convert_polyline(&vertices, lwpoly.is_closed(), layer);
            if items.is_empty() {
                report.record_skipped();
            }
            items
        }

        dxf::entities::EntityType::Spline(sp) => {
            let def = SplineDefinition {
                degree: sp.degree_of_curve.max(0) as usize,
                control_points: sp.control_points.iter().map(dxf_point).collect(),
                knots: sp.knot_values.clone(),
                weights: sp.weight_values.clone(),
                fit_points: sp.fit_points.iter().map(dxf_point).collect(),
            };
            if def.has_unequal_weights() {
                tracing::warn!("rational spline weights ignored");
                report.add_message("Rational spline weights ignored");
            }
            import_spline(&def, layer, options.tolerance, report)
        }

        _ => {
            tracing::trace!(layer = %entity.common.layer, "unsupported DXF entity skipped");
            report.record_skipped();
            Vec::new()
        }
    }
}

/// 多段线转换：无凸度的闭合多段线成为多边形，其余逐段转为线段或圆弧
fn convert_polyline(vertices: &[(Point2, f64)], closed: bool, layer: LayerId) -> Vec<BoardItem> {
    if vertices.len() < 2 {
        return Vec::new();
    }

    let has_bulge = vertices.iter().any(|(_, b)| b.abs() > EPSILON);
    if closed && !has_bulge && vertices.len() >= 3 {
        return vec![BoardItem::polygon(vertices.iter().map(|(p, _)| *p).collect(), layer)];
    }

    let n = vertices.len();
    let edge_count = if closed { n } else { n - 1 };
    (0..edge_count)
        .filter_map(|i| {
            let (start, bulge) = vertices[i];
            let (end, _) = vertices[(i + 1) % n];
            if (end - start).norm() < EPSILON {
                return None;
            }
            if bulge.abs() > EPSILON {
                if let Some(arc) = bulge_arc(start, end, bulge) {
                    return Some(BoardItem::arc(arc, layer));
                }
            }
            Some(BoardItem::segment(start, end, layer))
        })
        .collect()
}

/// 凸度 = tan(圆心角/4)，正值为逆时针
fn bulge_arc(start: Point2, end: Point2, bulge: f64) -> Option<Arc> {
    let chord: Vector2 = end - start;
    let len = chord.norm();
    // 弓高
    let sagitta = bulge * len / 2.0;
    let right = Vector2::new(chord.y, -chord.x) / len;
    let mid = start + chord / 2.0 + right * sagitta;
    Arc::from_three_points(start, mid, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf::entities::{Entity, EntityType};
    use pcbsnap_core::item::ItemKind;

    fn drawing_with(entities: Vec<EntityType>) -> dxf::Drawing {
        let mut drawing = dxf::Drawing::new();
        for specific in entities {
            drawing.add_entity(Entity::new(specific));
        }
        drawing
    }

    fn lwpolyline(points: &[(f64, f64, f64)], closed: bool) -> EntityType {
        let mut poly = dxf::entities::LwPolyline::default();
        poly.set_is_closed(closed);
        poly.vertices = points
            .iter()
            .map(|&(x, y, bulge)| {
                let mut v = dxf::LwPolylineVertex::default();
                v.x = x;
                v.y = y;
                v.bulge = bulge;
                v
            })
            .collect();
        EntityType::LwPolyline(poly)
    }

    fn spline(degree: i32, points: &[(f64, f64)], knots: &[f64]) -> EntityType {
        let mut sp = dxf::entities::Spline::default();
        sp.degree_of_curve = degree;
        sp.control_points = points.iter().map(|&(x, y)| dxf::Point::new(x, y, 0.0)).collect();
        sp.knot_values = knots.to_vec();
        EntityType::Spline(sp)
    }

    #[test]
    fn test_import_basic_entities() {
        let mut circle = dxf::entities::Circle::default();
        circle.center = dxf::Point::new(5.0, 5.0, 0.0);
        circle.radius = 2.0;

        let mut arc = dxf::entities::Arc::default();
        arc.center = dxf::Point::new(0.0, 0.0, 0.0);
        arc.radius = 3.0;
        arc.start_angle = 0.0;
        arc.end_angle = 90.0;

        let drawing = drawing_with(vec![
            EntityType::Line(dxf::entities::Line::new(
                dxf::Point::new(0.0, 0.0, 0.0),
                dxf::Point::new(10.0, 0.0, 0.0),
            )),
            EntityType::Circle(circle),
            EntityType::Arc(arc),
            lwpolyline(&[(0.0, 0.0, 0.0), (4.0, 0.0, 0.0), (4.0, 4.0, 0.0), (0.0, 4.0, 0.0)], true),
        ]);

        let outcome = import_drawing(&drawing, &ImportOptions::default());
        assert!(outcome.report.is_clean());
        let names: Vec<&str> = outcome.items.iter().map(|i| i.type_name()).collect();
        assert_eq!(names, vec!["Segment", "Circle", "Arc", "Polygon"]);
        assert_eq!(outcome.report.imported(), 4);

        match &outcome.items[2].kind {
            ItemKind::Arc(a) => {
                assert!((a.arc.end_point() - Point2::new(0.0, 3.0)).norm() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bulge_becomes_arc() {
        // 凸度 1：半圆
        let drawing = drawing_with(vec![lwpolyline(&[(0.0, 0.0, 1.0), (2.0, 0.0, 0.0), (2.0, 3.0, 0.0)], false)]);
        let outcome = import_drawing(&drawing, &ImportOptions::default());
        assert_eq!(outcome.items.len(), 2);
        match &outcome.items[0].kind {
            ItemKind::Arc(a) => {
                assert!((a.arc.center - Point2::new(1.0, 0.0)).norm() < 1e-9);
                assert!((a.arc.radius - 1.0).abs() < 1e-9);
                // 逆时针从 (0,0) 到 (2,0) 经过下方
                assert!((a.arc.mid_point() - Point2::new(1.0, -1.0)).norm() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_splines_are_reported_not_fatal() {
        let drawing = drawing_with(vec![
            spline(3, &[(0.0, 0.0), (1.0, 2.0), (3.0, 2.0), (4.0, 0.0)], &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]),
            spline(3, &[(0.0, 0.0), (1.0, 2.0)], &[]),
            spline(1, &[(0.0, 0.0), (1.0, 0.0)], &[0.0, 1.0]),
            EntityType::Line(dxf::entities::Line::new(
                dxf::Point::new(0.0, 0.0, 0.0),
                dxf::Point::new(1.0, 1.0, 0.0),
            )),
        ]);

        let outcome = import_drawing(&drawing, &ImportOptions::default());
        let names: Vec<&str> = outcome.items.iter().map(|i| i.type_name()).collect();
        assert_eq!(names, vec!["Bezier", "Segment"]);
        assert_eq!(
            outcome.report.messages(),
            &[
                "Invalid spline definition encountered".to_string(),
                "Invalid spline definition encountered".to_string(),
            ]
        );
        assert_eq!(outcome.report.skipped(), 2);
    }

    #[test]
    fn test_rational_weights_diagnostic() {
        let mut sp = dxf::entities::Spline::default();
        sp.degree_of_curve = 2;
        sp.control_points = vec![
            dxf::Point::new(0.0, 0.0, 0.0),
            dxf::Point::new(1.0, 1.0, 0.0),
            dxf::Point::new(2.0, 0.0, 0.0),
        ];
        sp.knot_values = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        sp.weight_values = vec![1.0, 0.7071, 1.0];

        let outcome = import_drawing(&drawing_with(vec![EntityType::Spline(sp)]), &ImportOptions::default());
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.report.messages(), &["Rational spline weights ignored".to_string()]);
    }
}
