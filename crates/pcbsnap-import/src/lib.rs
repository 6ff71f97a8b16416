//! PCBSnap 导入管线
//!
//! 把 DXF 图元转换为板上图元。样条经 B 样条内核分解为三次贝塞尔段；
//! 单条曲线失败只记录到导入报告并跳过，不中断整个导入。

pub mod dxf_io;
pub mod error;
pub mod spline_import;

pub use dxf_io::{import_drawing, ImportOptions, ImportOutcome};
pub use error::ImportError;
pub use spline_import::{import_spline, spline_to_cubic_beziers, CubicBezier, ImportReport, SplineDefinition};
