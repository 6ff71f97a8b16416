//! De Boor 求值

use super::{alloc_copy, alloc_zeroed, approx_equal, BSpline, SplineError};

/// 一次求值的结果网
///
/// `levels()[0]` 是受影响的原始控制点，之后每层少一个点，最后一层即曲线点。
/// 当 `u` 处重数等于阶数且位于定义域内部时，结果为两个点（曲线在此可能断开）。
#[derive(Debug, Clone, PartialEq)]
pub struct DeBoorNet {
    u: f64,
    k: usize,
    s: usize,
    h: usize,
    dim: usize,
    levels: Vec<Vec<f64>>,
    result: Vec<f64>,
}

impl DeBoorNet {
    /// 求值参数（可能已被吸附到定义域端点或节点值）
    pub fn u(&self) -> f64 {
        self.u
    }

    /// 节点区间索引 `k`，满足 `u_k <= u < u_{k+1}`
    pub fn knot_index(&self) -> usize {
        self.k
    }

    /// `u` 在节点向量中的重数
    pub fn multiplicity(&self) -> usize {
        self.s
    }

    /// 插入次数
    pub fn insertions(&self) -> usize {
        self.h
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn levels(&self) -> &[Vec<f64>] {
        &self.levels
    }

    /// 扁平结果点（一个或两个）
    pub fn result(&self) -> &[f64] {
        &self.result
    }

    pub fn num_result(&self) -> usize {
        self.result.len() / self.dim
    }

    pub fn result_point(&self, index: usize) -> Option<&[f64]> {
        self.result.get(index * self.dim..(index + 1) * self.dim)
    }
}

impl BSpline {
    /// 用 De Boor 算法在 `u` 处求值
    pub fn evaluate(&self, u: f64) -> Result<DeBoorNet, SplineError> {
        let dim = self.dim;
        let deg = self.degree;
        let order = self.order();
        let (min, max) = self.domain();

        let mut u = if approx_equal(u, min) {
            min
        } else if approx_equal(u, max) {
            max
        } else {
            u
        };
        if !u.is_finite() || u < min || u > max {
            return Err(SplineError::ParameterOutOfDomain { u, min, max });
        }

        // k: 最后一个不大于 u 的节点
        let mut k = 0;
        let mut s = 0;
        for (i, &knot) in self.knots.iter().enumerate() {
            if approx_equal(knot, u) {
                s += 1;
                k = i;
            } else if knot < u {
                k = i;
            } else {
                break;
            }
        }
        if s > order {
            return Err(SplineError::MultiplicityExceedsOrder { multiplicity: s, order });
        }
        if s > 0 {
            u = self.knots[k];
        }

        if s == order {
            let first = if u == min {
                vec![k + 1 - s]
            } else if u == max {
                vec![k - s]
            } else {
                vec![k - s, k - s + 1]
            };
            let mut result = Vec::new();
            result
                .try_reserve_exact(first.len() * dim)
                .map_err(|_| SplineError::OutOfMemory)?;
            for idx in first {
                result.extend_from_slice(&self.ctrlp[idx * dim..(idx + 1) * dim]);
            }
            return Ok(DeBoorNet {
                u,
                k,
                s,
                h: 0,
                dim,
                levels: vec![alloc_copy(&result)?],
                result,
            });
        }

        let h = deg - s;
        let first = k - deg;
        let last = k - s;
        let mut levels = Vec::new();
        levels.try_reserve_exact(h + 1).map_err(|_| SplineError::OutOfMemory)?;
        levels.push(alloc_copy(&self.ctrlp[first * dim..(last + 1) * dim])?);

        for r in 1..=h {
            let prev = &levels[r - 1];
            let count = prev.len() / dim - 1;
            let mut level = alloc_zeroed(count * dim)?;
            for m in 0..count {
                let i = first + r + m;
                let lo = self.knots[i];
                let hi = self.knots[i + deg - r + 1];
                let denom = hi - lo;
                if denom == 0.0 {
                    return Err(SplineError::DegenerateKnotSpan);
                }
                let a = (u - lo) / denom;
                for d in 0..dim {
                    level[m * dim + d] = (1.0 - a) * prev[m * dim + d] + a * prev[(m + 1) * dim + d];
                }
            }
            levels.push(level);
        }

        let result = alloc_copy(&levels[h])?;
        Ok(DeBoorNet {
            u,
            k,
            s,
            h,
            dim,
            levels,
            result,
        })
    }

    /// 在定义域内均匀采样 `num` 个点（0 表示按控制点数取默认值）
    pub fn sample(&self, num: usize) -> Result<Vec<f64>, SplineError> {
        let num = if num == 0 {
            (self.num_control_points() - self.degree) * 30
        } else {
            num
        };
        let (min, max) = self.domain();
        let mut points = Vec::new();
        points
            .try_reserve_exact(num * self.dim)
            .map_err(|_| SplineError::OutOfMemory)?;

        for i in 0..num {
            let u = if num == 1 {
                min
            } else {
                min + (max - min) * i as f64 / (num - 1) as f64
            };
            let net = self.evaluate(u)?;
            let point = if i + 1 == num {
                net.result_point(net.num_result() - 1)
            } else {
                net.result_point(0)
            };
            points.extend_from_slice(point.ok_or(SplineError::TooFewPoints)?);
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::super::KnotKind;
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn cubic_bezier() -> BSpline {
        BSpline::new(4, 2, 3, KnotKind::Clamped)
            .unwrap()
            .with_control_points(&[0.0, 0.0, 1.0, 2.0, 3.0, 2.0, 4.0, 0.0])
            .unwrap()
    }

    #[test]
    fn test_clamped_cubic_endpoints() {
        let curve = cubic_bezier();
        assert_eq!(curve.knots(), &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);

        let start = curve.evaluate(0.0).unwrap();
        assert_eq!(start.num_result(), 1);
        assert_eq!(start.result(), &[0.0, 0.0]);

        let end = curve.evaluate(1.0).unwrap();
        assert_eq!(end.num_result(), 1);
        assert_eq!(end.result(), &[4.0, 0.0]);
    }

    #[test]
    fn test_bezier_midpoint() {
        let curve = cubic_bezier();
        let net = curve.evaluate(0.5).unwrap();
        // (P0 + 3P1 + 3P2 + P3) / 8
        let p = net.result_point(0).unwrap();
        assert!((p[0] - 2.0).abs() < EPSILON);
        assert!((p[1] - 1.5).abs() < EPSILON);
        assert_eq!(net.levels().len(), 4);
        assert_eq!(net.levels()[0].len(), 8);
        assert_eq!(net.insertions(), 3);
    }

    #[test]
    fn test_linear_open_midpoint() {
        let curve = BSpline::from_parts(
            1,
            2,
            &[0.0, 0.0, 10.0, 4.0, 20.0, 0.0],
            &[0.0, 1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert_eq!(curve.domain(), (1.0, 3.0));

        let net = curve.evaluate(1.5).unwrap();
        assert_eq!(net.num_result(), 1);
        let p = net.result_point(0).unwrap();
        assert!((p[0] - 5.0).abs() < EPSILON);
        assert!((p[1] - 2.0).abs() < EPSILON);

        // 在节点上插值控制点
        let at_knot = curve.evaluate(2.0).unwrap();
        assert_eq!(at_knot.multiplicity(), 1);
        assert_eq!(at_knot.result(), &[10.0, 4.0]);
    }

    #[test]
    fn test_out_of_domain() {
        let curve = cubic_bezier();
        assert!(matches!(
            curve.evaluate(1.5),
            Err(SplineError::ParameterOutOfDomain { .. })
        ));
        assert!(matches!(
            curve.evaluate(-0.1),
            Err(SplineError::ParameterOutOfDomain { .. })
        ));
        // 近似端点被吸附
        assert!(curve.evaluate(1.0 + 1e-7).is_ok());
    }

    #[test]
    fn test_non_finite_parameter() {
        let curve = cubic_bezier();
        for u in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                curve.evaluate(u),
                Err(SplineError::ParameterOutOfDomain { .. })
            ));
            assert!(matches!(
                curve.split(u),
                Err(SplineError::ParameterOutOfDomain { .. })
            ));
            assert!(matches!(
                curve.insert_knot(u, 1),
                Err(SplineError::ParameterOutOfDomain { .. })
            ));
        }
    }

    #[test]
    fn test_discontinuity_yields_two_points() {
        let curve = BSpline::new(8, 2, 3, KnotKind::Beziers)
            .unwrap()
            .with_control_points(&[
                0.0, 0.0, 1.0, 1.0, 2.0, 1.0, 3.0, 0.0, //
                5.0, 0.0, 6.0, 1.0, 7.0, 1.0, 8.0, 0.0,
            ])
            .unwrap();
        let net = curve.evaluate(0.5).unwrap();
        assert_eq!(net.multiplicity(), 4);
        assert_eq!(net.num_result(), 2);
        assert_eq!(net.result(), &[3.0, 0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_sample_and_closed() {
        let curve = cubic_bezier();
        let points = curve.sample(5).unwrap();
        assert_eq!(points.len(), 10);
        assert_eq!(&points[..2], &[0.0, 0.0]);
        assert_eq!(&points[8..], &[4.0, 0.0]);
        assert!(!curve.is_closed(EPSILON).unwrap());

        let loop_curve = curve.with_control_point(3, &[0.0, 0.0]).unwrap();
        assert!(loop_curve.is_closed(EPSILON).unwrap());
    }
}
