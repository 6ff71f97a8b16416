//! B样条几何内核
//!
//! 非有理 B 样条曲线的构造、求值（De Boor 算法）和变换
//! （求导、插入节点、分割、转贝塞尔、调整大小、弯曲）。
//!
//! 所有变换都以 `&self` 为输入并返回新的曲线，失败时输入保持不变。
//! 控制点以扁平数组存储，每个点 `dim` 个分量。
//!
//! ```rust
//! use pcbsnap_core::spline::{BSpline, KnotKind};
//!
//! let curve = BSpline::new(4, 2, 3, KnotKind::Clamped)
//!     .unwrap()
//!     .with_control_points(&[0.0, 0.0, 1.0, 2.0, 3.0, 2.0, 4.0, 0.0])
//!     .unwrap();
//! let net = curve.evaluate(0.5).unwrap();
//! assert_eq!(net.num_result(), 1);
//! assert_eq!(net.result().len(), 2);
//! ```

mod error;
mod eval;
mod interpolate;
mod transform;

pub use error::SplineError;
pub use eval::DeBoorNet;

use serde::{Deserialize, Serialize};

/// 近似比较的绝对容差
pub const APPROX_ABS_EPSILON: f64 = 1e-5;
/// 近似比较的相对容差
pub const APPROX_REL_EPSILON: f64 = 1e-8;

/// 绝对/相对组合容差比较
pub fn approx_equal(x: f64, y: f64) -> bool {
    approx_equal_with(x, y, APPROX_ABS_EPSILON, APPROX_REL_EPSILON)
}

pub fn approx_equal_with(x: f64, y: f64, max_abs: f64, max_rel: f64) -> bool {
    let diff = (x - y).abs();
    if diff <= max_abs {
        return true;
    }
    let largest = x.abs().max(y.abs());
    diff <= largest * max_rel
}

/// 两个 `dim` 维点之间的欧氏距离
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// 节点向量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnotKind {
    /// 全零（由调用者自行设置）
    None,
    /// 均匀开放
    Opened,
    /// 均匀钳制（两端重数等于阶数）
    Clamped,
    /// 分段贝塞尔（每 `order` 个节点取相同值）
    Beziers,
}

/// 分配零初始化的缓冲区，失败返回 `OutOfMemory`
pub(crate) fn alloc_zeroed(len: usize) -> Result<Vec<f64>, SplineError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| SplineError::OutOfMemory)?;
    buf.resize(len, 0.0);
    Ok(buf)
}

pub(crate) fn alloc_copy(src: &[f64]) -> Result<Vec<f64>, SplineError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(src.len()).map_err(|_| SplineError::OutOfMemory)?;
    buf.extend_from_slice(src);
    Ok(buf)
}

/// 非有理 B 样条曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSpline {
    degree: usize,
    dim: usize,
    ctrlp: Vec<f64>,
    knots: Vec<f64>,
}

impl BSpline {
    /// 创建控制点全为零的曲线，节点向量按 `kind` 填充到 [0, 1]
    pub fn new(n_ctrlp: usize, dim: usize, degree: usize, kind: KnotKind) -> Result<Self, SplineError> {
        if dim == 0 {
            return Err(SplineError::DimensionZero);
        }
        if degree >= n_ctrlp {
            return Err(SplineError::DegreeTooLarge { degree, n_ctrlp });
        }
        let len_ctrlp = n_ctrlp.checked_mul(dim).ok_or(SplineError::OutOfMemory)?;
        let n_knots = n_ctrlp + degree + 1;

        let mut spline = Self {
            degree,
            dim,
            ctrlp: alloc_zeroed(len_ctrlp)?,
            knots: alloc_zeroed(n_knots)?,
        };
        transform::fill_knots_in_place(&mut spline, kind, 0.0, 1.0)?;
        Ok(spline)
    }

    /// 由控制点和节点直接构造，校验长度与单调性
    pub fn from_parts(
        degree: usize,
        dim: usize,
        ctrlp: &[f64],
        knots: &[f64],
    ) -> Result<Self, SplineError> {
        if dim == 0 {
            return Err(SplineError::DimensionZero);
        }
        if ctrlp.len() % dim != 0 {
            return Err(SplineError::SizeMismatch {
                expected: (ctrlp.len() / dim + 1) * dim,
                actual: ctrlp.len(),
            });
        }
        let n_ctrlp = ctrlp.len() / dim;
        if degree >= n_ctrlp {
            return Err(SplineError::DegreeTooLarge { degree, n_ctrlp });
        }
        let spline = Self {
            degree,
            dim,
            ctrlp: alloc_copy(ctrlp)?,
            knots: alloc_zeroed(n_ctrlp + degree + 1)?,
        };
        spline.with_knots(knots)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn order(&self) -> usize {
        self.degree + 1
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn num_control_points(&self) -> usize {
        self.ctrlp.len() / self.dim
    }

    pub fn num_knots(&self) -> usize {
        self.knots.len()
    }

    /// 扁平控制点数组（`n_ctrlp * dim`）
    pub fn control_points(&self) -> &[f64] {
        &self.ctrlp
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// 第 `index` 个控制点
    pub fn control_point(&self, index: usize) -> Result<&[f64], SplineError> {
        let len = self.num_control_points();
        if index >= len {
            return Err(SplineError::IndexOutOfRange { index, len });
        }
        Ok(&self.ctrlp[index * self.dim..(index + 1) * self.dim])
    }

    /// 定义域 `[u_degree, u_n]`
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.num_control_points()])
    }

    /// 首尾求值点在 `epsilon` 内重合
    pub fn is_closed(&self, epsilon: f64) -> Result<bool, SplineError> {
        let (min, max) = self.domain();
        let first = self.evaluate(min)?;
        let last = self.evaluate(max)?;
        let a = first.result_point(0).ok_or(SplineError::TooFewPoints)?;
        let b = last
            .result_point(last.num_result() - 1)
            .ok_or(SplineError::TooFewPoints)?;
        Ok(euclidean_distance(a, b) <= epsilon)
    }

    /// 替换全部控制点
    pub fn with_control_points(&self, ctrlp: &[f64]) -> Result<Self, SplineError> {
        if ctrlp.len() != self.ctrlp.len() {
            return Err(SplineError::SizeMismatch {
                expected: self.ctrlp.len(),
                actual: ctrlp.len(),
            });
        }
        Ok(Self {
            degree: self.degree,
            dim: self.dim,
            ctrlp: alloc_copy(ctrlp)?,
            knots: alloc_copy(&self.knots)?,
        })
    }

    /// 替换单个控制点
    pub fn with_control_point(&self, index: usize, point: &[f64]) -> Result<Self, SplineError> {
        self.control_point(index)?;
        if point.len() != self.dim {
            return Err(SplineError::SizeMismatch {
                expected: self.dim,
                actual: point.len(),
            });
        }
        let mut ctrlp = alloc_copy(&self.ctrlp)?;
        ctrlp[index * self.dim..(index + 1) * self.dim].copy_from_slice(point);
        Ok(Self {
            degree: self.degree,
            dim: self.dim,
            ctrlp,
            knots: alloc_copy(&self.knots)?,
        })
    }

    /// 替换节点向量；要求全部有限、非递减且重数不超过阶数
    pub fn with_knots(&self, knots: &[f64]) -> Result<Self, SplineError> {
        if knots.len() != self.knots.len() {
            return Err(SplineError::SizeMismatch {
                expected: self.knots.len(),
                actual: knots.len(),
            });
        }
        if knots.iter().any(|k| !k.is_finite()) {
            return Err(SplineError::NonFiniteKnot);
        }
        let order = self.order();
        let mut multiplicity = 1;
        for pair in knots.windows(2) {
            let (last, cur) = (pair[0], pair[1]);
            if cur < last && !approx_equal(last, cur) {
                return Err(SplineError::KnotsDecreasing);
            }
            if approx_equal(last, cur) {
                multiplicity += 1;
            } else {
                multiplicity = 1;
            }
            if multiplicity > order {
                return Err(SplineError::MultiplicityExceedsOrder { multiplicity, order });
            }
        }
        Ok(Self {
            degree: self.degree,
            dim: self.dim,
            ctrlp: alloc_copy(&self.ctrlp)?,
            knots: alloc_copy(knots)?,
        })
    }
}
