//! 自然三次样条插值

use super::{alloc_zeroed, BSpline, KnotKind, SplineError};

impl BSpline {
    /// 通过 `points`（扁平，每点 `dim` 个分量）的自然三次样条，
    /// 以首尾相接的三次贝塞尔段表示。
    ///
    /// 一个点得到四个控制点重合的退化贝塞尔；两个点得到直线。
    pub fn interpolate_cubic_natural(points: &[f64], dim: usize) -> Result<BSpline, SplineError> {
        if dim == 0 {
            return Err(SplineError::DimensionZero);
        }
        if points.len() % dim != 0 {
            return Err(SplineError::SizeMismatch {
                expected: (points.len() / dim + 1) * dim,
                actual: points.len(),
            });
        }
        let n = points.len() / dim;
        if n == 0 {
            return Err(SplineError::TooFewPoints);
        }
        if n == 1 {
            let mut ctrlp = alloc_zeroed(4 * dim)?;
            for chunk in ctrlp.chunks_mut(dim) {
                chunk.copy_from_slice(points);
            }
            let curve = BSpline::new(4, dim, 3, KnotKind::Beziers)?;
            return curve.with_control_points(&ctrlp);
        }

        // 三次 B 样条的 de Boor 点：首尾取插值点，内部解三对角方程
        // b[i-1] + 4 b[i] + b[i+1] = 6 S[i]
        let mut deboor = alloc_zeroed(n * dim)?;
        deboor[..dim].copy_from_slice(&points[..dim]);
        deboor[(n - 1) * dim..].copy_from_slice(&points[(n - 1) * dim..]);

        let m = n.saturating_sub(2);
        if m > 0 {
            let mut c_prime = alloc_zeroed(m)?;
            let mut d_prime = alloc_zeroed(m * dim)?;
            for d in 0..dim {
                let rhs = |i: usize| {
                    let mut v = 6.0 * points[(i + 1) * dim + d];
                    if i == 0 {
                        v -= points[d];
                    }
                    if i == m - 1 {
                        v -= points[(n - 1) * dim + d];
                    }
                    v
                };

                c_prime[0] = 1.0 / 4.0;
                d_prime[d] = rhs(0) / 4.0;
                for i in 1..m {
                    let denom = 4.0 - c_prime[i - 1];
                    c_prime[i] = 1.0 / denom;
                    d_prime[i * dim + d] = (rhs(i) - d_prime[(i - 1) * dim + d]) / denom;
                }

                deboor[m * dim + d] = d_prime[(m - 1) * dim + d];
                for i in (0..m - 1).rev() {
                    let next = deboor[(i + 2) * dim + d];
                    deboor[(i + 1) * dim + d] = d_prime[i * dim + d] - c_prime[i] * next;
                }
            }
        }

        relaxed_uniform_cubic(&deboor, n, dim)
    }
}

/// 均匀三次 B 样条（de Boor 点 `b`，首尾插值）转为贝塞尔段
fn relaxed_uniform_cubic(b: &[f64], n: usize, dim: usize) -> Result<BSpline, SplineError> {
    const ONE_SIXTH: f64 = 1.0 / 6.0;
    const ONE_THIRD: f64 = 1.0 / 3.0;
    const TWO_THIRDS: f64 = 2.0 / 3.0;

    let n_ctrlp = (n - 1) * 4;
    let mut s = alloc_zeroed(n_ctrlp * dim)?;
    let point = |i: usize, d: usize| b[i * dim + d];

    for seg in 0..n - 1 {
        for d in 0..dim {
            let start = if seg == 0 {
                point(0, d)
            } else {
                ONE_SIXTH * point(seg - 1, d) + TWO_THIRDS * point(seg, d) + ONE_SIXTH * point(seg + 1, d)
            };
            let end = if seg + 2 == n {
                point(n - 1, d)
            } else {
                ONE_SIXTH * point(seg, d) + TWO_THIRDS * point(seg + 1, d) + ONE_SIXTH * point(seg + 2, d)
            };
            let base = seg * 4 * dim + d;
            s[base] = start;
            s[base + dim] = TWO_THIRDS * point(seg, d) + ONE_THIRD * point(seg + 1, d);
            s[base + 2 * dim] = ONE_THIRD * point(seg, d) + TWO_THIRDS * point(seg + 1, d);
            s[base + 3 * dim] = end;
        }
    }

    BSpline::new(n_ctrlp, dim, 3, KnotKind::Beziers)?.with_control_points(&s)
}

#[cfg(test)]
mod tests {
    use super::super::euclidean_distance;
    use super::*;

    #[test]
    fn test_passes_through_points() {
        let points = [0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 4.0, 0.0, 6.0, 1.0];
        let curve = BSpline::interpolate_cubic_natural(&points, 2).unwrap();
        assert_eq!(curve.degree(), 3);
        assert_eq!(curve.num_control_points(), 16);
        assert_eq!(curve.num_knots() % 4, 0);

        for (i, expected) in points.chunks(2).enumerate() {
            let u = i as f64 / 4.0;
            let net = curve.evaluate(u).unwrap();
            for j in 0..net.num_result() {
                let p = net.result_point(j).unwrap();
                assert!(euclidean_distance(p, expected) < 1e-9, "{i}: {p:?}");
            }
        }
    }

    #[test]
    fn test_natural_end_condition() {
        // 自然边界：端点二阶导为零
        let points = [0.0, 0.0, 1.0, 1.0, 2.0, 0.0];
        let curve = BSpline::interpolate_cubic_natural(&points, 2).unwrap();
        let second = curve.derive().unwrap().derive().unwrap();
        let start = second.evaluate(0.0).unwrap();
        assert!(euclidean_distance(start.result_point(0).unwrap(), &[0.0, 0.0]) < 1e-9);
    }

    #[test]
    fn test_degenerate_inputs() {
        let single = BSpline::interpolate_cubic_natural(&[2.0, 3.0], 2).unwrap();
        assert_eq!(single.num_control_points(), 4);
        assert!(single.control_points().chunks(2).all(|p| p == [2.0, 3.0]));

        let line = BSpline::interpolate_cubic_natural(&[0.0, 0.0, 3.0, 0.0], 2).unwrap();
        assert_eq!(line.num_control_points(), 4);
        let mid = line.evaluate(0.5).unwrap();
        assert!(euclidean_distance(mid.result(), &[1.5, 0.0]) < 1e-9);

        assert_eq!(
            BSpline::interpolate_cubic_natural(&[], 2),
            Err(SplineError::TooFewPoints)
        );
        assert_eq!(
            BSpline::interpolate_cubic_natural(&[1.0], 0),
            Err(SplineError::DimensionZero)
        );
    }
}
