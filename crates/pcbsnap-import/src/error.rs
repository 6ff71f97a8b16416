//! 导入错误定义

use pcbsnap_core::spline::SplineError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Spline kernel error: {0}")]
    Spline(#[from] SplineError),

    #[error("Invalid spline definition: {0}")]
    InvalidSpline(String),

    #[error("Malformed Bezier decomposition: {points} control points")]
    MalformedBezier { points: usize },
}

impl ImportError {
    /// 写入导入报告的用户可读消息
    pub fn report_message(&self) -> &'static str {
        match self {
            ImportError::MalformedBezier { .. } => "Invalid Bezier curve created",
            ImportError::Spline(_) | ImportError::InvalidSpline(_) => "Invalid spline definition encountered",
        }
    }
}
