//! B样条内核错误定义

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("Out of memory")]
    OutOfMemory,

    #[error("Dimension must be at least 1")]
    DimensionZero,

    #[error("Degree {degree} must be less than the number of control points {n_ctrlp}")]
    DegreeTooLarge { degree: usize, n_ctrlp: usize },

    #[error("Invalid knot count {n_knots} for order {order}")]
    InvalidKnotCount { n_knots: usize, order: usize },

    #[error("Parameter {u} is outside the domain [{min}, {max}]")]
    ParameterOutOfDomain { u: f64, min: f64, max: f64 },

    #[error("Knot multiplicity {multiplicity} exceeds order {order}")]
    MultiplicityExceedsOrder { multiplicity: usize, order: usize },

    #[error("Degenerate knot span")]
    DegenerateKnotSpan,

    #[error("Decreasing knot domain: min {min} >= max {max}")]
    DecreasingDomain { min: f64, max: f64 },

    #[error("Knot vector is decreasing")]
    KnotsDecreasing,

    #[error("Knot vector contains a non-finite value")]
    NonFiniteKnot,

    #[error("Curve is not derivable")]
    NotDerivable,

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Not enough points")]
    TooFewPoints,
}
