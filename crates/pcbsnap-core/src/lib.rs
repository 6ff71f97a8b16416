//! PCBSnap 核心
//!
//! 提供 PCB 编辑器的网格/对象捕捉引擎和 B 样条几何内核。
//!
//! # 架构设计
//!
//! - `spline`: B 样条内核，值语义，与捕捉引擎无依赖
//! - `anchor` / `construction`: 从可见图元计算带类型的锚点和辅助几何
//! - `snap`: 根据锚点、网格和捕捉线选出唯一的捕捉点
//! - `spatial`: 可见图元查询（引擎只依赖 `VisibilityQuery` 接口）
//!
//! # 示例
//!
//! ```rust
//! use pcbsnap_core::prelude::*;
//!
//! let items = vec![BoardItem::segment(
//!     Point2::new(0.0, 0.0),
//!     Point2::new(10.0, 0.0),
//!     LayerId::F_SILKS,
//! )];
//!
//! let mut engine = SnapEngine::new(SnapConfig::default());
//! engine.set_world_per_pixel(0.01);
//!
//! let snap = engine.best_snap_anchor(
//!     items.as_slice(),
//!     Point2::new(10.1, 0.1),
//!     LayerSet::ALL,
//!     GridKind::Default,
//!     &[],
//! );
//! assert_eq!(snap.point, Point2::new(10.0, 0.0));
//! ```

pub mod anchor;
pub mod construction;
pub mod geometry;
pub mod item;
pub mod layer;
pub mod math;
pub mod snap;
pub mod spatial;
pub mod spline;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::anchor::{compute_anchors, Anchor, AnchorFlags, AnchorQuery, PointKind, SelectionFilter};
    pub use crate::construction::{ConstructionBatch, ConstructionItem, ConstructionManager, ConstructionPrimitive};
    pub use crate::geometry::{Arc, Circle, HalfLine, Line, Polygon, Primitive, Segment};
    pub use crate::item::{BoardItem, ItemId, ItemKind, Pad, PadLayerShape, PadShape, Padstack};
    pub use crate::layer::{LayerId, LayerSet};
    pub use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
    pub use crate::snap::{GridConfig, GridKind, SnapConfig, SnapEngine, SnapPoint, SnapSource, SnapState};
    pub use crate::spatial::{BoardView, SpatialIndex, VisibilityQuery};
    pub use crate::spline::{BSpline, DeBoorNet, KnotKind, SplineError};
}
