//! 空间索引与可见性查询
//!
//! 捕捉引擎只通过 [`VisibilityQuery`] 获取光标附近的可见图元，
//! 不持有任何视图或渲染器。[`BoardView`] 是基于网格分桶索引的实现。

use crate::item::{BoardItem, ItemId};
use crate::layer::{LayerId, LayerSet};
use crate::math::BoundingBox2;
use std::collections::{HashMap, HashSet};

/// 可见图元查询
pub trait VisibilityQuery {
    /// 返回包围盒与 `area` 相交、位于 `layers` 上且不在 `skip` 中的可见图元
    fn query_visible(&self, area: &BoundingBox2, layers: LayerSet, skip: &[ItemId]) -> Vec<&BoardItem>;
}

/// 线性扫描（图元较少时直接使用）
impl VisibilityQuery for [BoardItem] {
    fn query_visible(&self, area: &BoundingBox2, layers: LayerSet, skip: &[ItemId]) -> Vec<&BoardItem> {
        self.iter()
            .filter(|item| !skip.contains(&item.id))
            .filter(|item| item.layers.intersects(&layers))
            .filter(|item| item.bounding_box().intersects(area))
            .collect()
    }
}

/// 简单的空间索引（基于网格）
#[derive(Debug)]
pub struct SpatialIndex {
    /// 网格单元大小
    cell_size: f64,

    /// 网格映射：网格坐标 -> 图元列表
    grid: HashMap<(i64, i64), Vec<ItemId>>,

    /// 图元的包围盒缓存
    bboxes: HashMap<ItemId, BoundingBox2>,
}

impl SpatialIndex {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            grid: HashMap::new(),
            bboxes: HashMap::new(),
        }
    }

    /// 将板坐标转换为网格坐标
    fn to_grid_coord(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    fn cells_for_bbox(&self, bbox: &BoundingBox2) -> Vec<(i64, i64)> {
        let (min_gx, min_gy) = self.to_grid_coord(bbox.min.x, bbox.min.y);
        let (max_gx, max_gy) = self.to_grid_coord(bbox.max.x, bbox.max.y);

        let mut cells = Vec::new();
        for gx in min_gx..=max_gx {
            for gy in min_gy..=max_gy {
                cells.push((gx, gy));
            }
        }
        cells
    }

    pub fn insert(&mut self, id: ItemId, bbox: BoundingBox2) {
        self.remove(&id);
        if bbox.is_empty() {
            return;
        }

        for cell in self.cells_for_bbox(&bbox) {
            self.grid.entry(cell).or_default().push(id);
        }
        self.bboxes.insert(id, bbox);
    }

    pub fn remove(&mut self, id: &ItemId) -> bool {
        if let Some(bbox) = self.bboxes.remove(id) {
            for cell in self.cells_for_bbox(&bbox) {
                if let Some(items) = self.grid.get_mut(&cell) {
                    items.retain(|e| e != id);
                    if items.is_empty() {
                        self.grid.remove(&cell);
                    }
                }
            }
            true
        } else {
            false
        }
    }

    /// 范围查询：包围盒与 `rect` 相交的图元（按ID排序）
    pub fn query_rect(&self, rect: &BoundingBox2) -> Vec<ItemId> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();

        for cell in self.cells_for_bbox(rect) {
            if let Some(items) = self.grid.get(&cell) {
                for id in items {
                    if seen.insert(*id) && self.bboxes.get(id).is_some_and(|b| b.intersects(rect)) {
                        result.push(*id);
                    }
                }
            }
        }

        result.sort();
        result
    }

    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}

/// 板视图：图元存储、空间索引和图层可见性
#[derive(Debug)]
pub struct BoardView {
    items: HashMap<ItemId, BoardItem>,
    index: SpatialIndex,
    visible_layers: LayerSet,
    /// 高对比度模式下只有活动图层上的图元可见
    high_contrast: bool,
    active_layer: LayerId,
}

impl BoardView {
    pub fn new(cell_size: f64) -> Self {
        Self {
            items: HashMap::new(),
            index: SpatialIndex::new(cell_size),
            visible_layers: LayerSet::ALL,
            high_contrast: false,
            active_layer: LayerId::F_CU,
        }
    }

    pub fn add(&mut self, item: BoardItem) -> ItemId {
        let id = item.id;
        self.index.insert(id, item.bounding_box());
        self.items.insert(id, item);
        id
    }

    pub fn remove(&mut self, id: ItemId) -> Option<BoardItem> {
        self.index.remove(&id);
        self.items.remove(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&BoardItem> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &BoardItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn set_layer_visible(&mut self, layer: LayerId, visible: bool) {
        if visible {
            self.visible_layers.insert(layer);
        } else {
            self.visible_layers.remove(layer);
        }
    }

    pub fn is_layer_visible(&self, layer: LayerId) -> bool {
        self.visible_layers.contains(layer)
    }

    pub fn set_high_contrast(&mut self, enabled: bool, active_layer: LayerId) {
        self.high_contrast = enabled;
        self.active_layer = active_layer;
    }

    fn is_visible(&self, item: &BoardItem) -> bool {
        if self.high_contrast {
            item.layers.contains(self.active_layer)
        } else {
            item.layers.intersects(&self.visible_layers)
        }
    }
}

impl VisibilityQuery for BoardView {
    fn query_visible(&self, area: &BoundingBox2, layers: LayerSet, skip: &[ItemId]) -> Vec<&BoardItem> {
        self.index
            .query_rect(area)
            .into_iter()
            .filter(|id| !skip.contains(id))
            .filter_map(|id| self.items.get(&id))
            .filter(|item| item.layers.intersects(&layers) && self.is_visible(item))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Point2;

    #[test]
    fn test_spatial_index() {
        let mut index = SpatialIndex::new(10.0);

        let id1 = ItemId::new();
        let id2 = ItemId::new();
        let id3 = ItemId::new();

        index.insert(id1, BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(5.0, 5.0)));
        index.insert(id2, BoundingBox2::new(Point2::new(10.0, 10.0), Point2::new(15.0, 15.0)));
        index.insert(id3, BoundingBox2::new(Point2::new(100.0, 100.0), Point2::new(105.0, 105.0)));

        let result = index.query_rect(&BoundingBox2::new(Point2::new(0.0, 0.0), Point2::new(20.0, 20.0)));
        assert_eq!(result, vec![id1, id2]);

        let far = BoundingBox2::around(Point2::new(102.0, 101.0), 1.0);
        assert_eq!(index.query_rect(&far), vec![id3]);
        assert!(index.remove(&id3));
        assert!(index.query_rect(&far).is_empty());
        assert!(!index.remove(&id3));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_board_view_visibility() {
        let mut view = BoardView::new(10.0);
        let top = view.add(BoardItem::segment(Point2::new(0.0, 0.0), Point2::new(5.0, 0.0), LayerId::F_CU));
        let bottom = view.add(BoardItem::segment(Point2::new(0.0, 1.0), Point2::new(5.0, 1.0), LayerId::B_CU));
        let area = BoundingBox2::around(Point2::new(2.0, 0.5), 3.0);

        let ids = |v: Vec<&BoardItem>| v.into_iter().map(|i| i.id).collect::<Vec<_>>();

        assert_eq!(ids(view.query_visible(&area, LayerSet::ALL, &[])), vec![top, bottom]);
        assert_eq!(ids(view.query_visible(&area, LayerSet::ALL, &[top])), vec![bottom]);
        assert_eq!(
            ids(view.query_visible(&area, LayerSet::single(LayerId::B_CU), &[])),
            vec![bottom]
        );

        view.set_layer_visible(LayerId::B_CU, false);
        assert_eq!(ids(view.query_visible(&area, LayerSet::ALL, &[])), vec![top]);

        view.set_layer_visible(LayerId::B_CU, true);
        view.set_high_contrast(true, LayerId::B_CU);
        assert_eq!(ids(view.query_visible(&area, LayerSet::ALL, &[])), vec![bottom]);

        assert!(view.remove(bottom).is_some());
        assert_eq!(view.len(), 1);
    }
}
