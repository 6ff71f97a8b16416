//! 曲线变换
//!
//! 每个变换都在新分配的缓冲区上完成，只有全部成功才返回新曲线。

use super::{alloc_copy, alloc_zeroed, approx_equal, euclidean_distance, BSpline, KnotKind, SplineError};
use super::APPROX_ABS_EPSILON;

/// 按 `kind` 重新生成节点向量（先校验，校验通过后才写入）
pub(crate) fn fill_knots_in_place(
    spline: &mut BSpline,
    kind: KnotKind,
    min: f64,
    max: f64,
) -> Result<(), SplineError> {
    if kind == KnotKind::None {
        return Ok(());
    }

    let n_knots = spline.knots.len();
    let n_ctrlp = spline.num_control_points();
    let deg = spline.degree;
    let order = spline.order();

    if kind == KnotKind::Beziers && n_knots % order != 0 {
        return Err(SplineError::InvalidKnotCount { n_knots, order });
    }
    if n_knots < 2 * order {
        return Err(SplineError::DegreeTooLarge {
            degree: deg,
            n_ctrlp,
        });
    }
    if !min.is_finite() || !max.is_finite() || approx_equal(min, max) || min > max {
        return Err(SplineError::DecreasingDomain { min, max });
    }

    let span = max - min;
    let knots = &mut spline.knots;
    match kind {
        KnotKind::Opened => {
            let denom = (n_knots - 1) as f64;
            for (i, knot) in knots.iter_mut().enumerate() {
                *knot = min + i as f64 * span / denom;
            }
        }
        KnotKind::Clamped => {
            let denom = (n_ctrlp - deg) as f64;
            for (i, knot) in knots.iter_mut().enumerate() {
                *knot = if i <= deg {
                    min
                } else if i < n_ctrlp {
                    min + (i - deg) as f64 * span / denom
                } else {
                    max
                };
            }
        }
        KnotKind::Beziers => {
            let denom = (n_knots / order - 1) as f64;
            for (i, knot) in knots.iter_mut().enumerate() {
                *knot = min + (i / order) as f64 * span / denom;
            }
        }
        KnotKind::None => {}
    }
    Ok(())
}

impl BSpline {
    /// 在 [min, max] 上重新生成节点向量，控制点不变
    pub fn fill_knots(&self, kind: KnotKind, min: f64, max: f64) -> Result<BSpline, SplineError> {
        let mut out = BSpline {
            degree: self.degree,
            dim: self.dim,
            ctrlp: alloc_copy(&self.ctrlp)?,
            knots: alloc_copy(&self.knots)?,
        };
        fill_knots_in_place(&mut out, kind, min, max)?;
        Ok(out)
    }

    /// 一阶导数曲线
    ///
    /// 重数等于阶数的节点处，两侧控制点重合时曲线连续，对应的零区间项被去掉
    /// （同时去掉一个重复节点）；控制点不重合则不可导。
    pub fn derive(&self) -> Result<BSpline, SplineError> {
        let deg = self.degree;
        let dim = self.dim;
        let n = self.num_control_points();
        if deg < 1 || n < 2 {
            return Err(SplineError::NotDerivable);
        }

        let mut ctrlp = Vec::new();
        ctrlp
            .try_reserve_exact((n - 1) * dim)
            .map_err(|_| SplineError::OutOfMemory)?;
        let mut knots = Vec::new();
        knots
            .try_reserve_exact(self.knots.len() - 2)
            .map_err(|_| SplineError::OutOfMemory)?;
        knots.push(self.knots[1]);

        for i in 0..n - 1 {
            let p0 = &self.ctrlp[i * dim..(i + 1) * dim];
            let p1 = &self.ctrlp[(i + 1) * dim..(i + 2) * dim];
            let lo = self.knots[i + 1];
            let hi = self.knots[i + deg + 1];
            if approx_equal(lo, hi) {
                if euclidean_distance(p0, p1) > APPROX_ABS_EPSILON {
                    return Err(SplineError::NotDerivable);
                }
                continue;
            }
            let factor = deg as f64 / (hi - lo);
            ctrlp.extend(p0.iter().zip(p1).map(|(a, b)| factor * (b - a)));
            knots.push(self.knots[i + 2]);
        }
        // 尾部 deg 个节点（去掉最后一个）
        let tail_start = self.knots.len() - deg;
        knots.extend_from_slice(&self.knots[tail_start..self.knots.len() - 1]);

        let n_derived = ctrlp.len() / dim;
        if n_derived <= deg - 1 {
            return Err(SplineError::NotDerivable);
        }
        Ok(BSpline {
            degree: deg - 1,
            dim,
            ctrlp,
            knots,
        })
    }

    /// 插入节点 `u` 共 `times` 次，返回新曲线和 `u` 的最后一个索引
    pub fn insert_knot(&self, u: f64, times: usize) -> Result<(BSpline, usize), SplineError> {
        let net = self.evaluate(u)?;
        let order = self.order();
        let s = net.multiplicity();
        let k = net.knot_index();
        if s + times > order {
            return Err(SplineError::MultiplicityExceedsOrder {
                multiplicity: s + times,
                order,
            });
        }
        if times == 0 {
            return Ok((self.deep_copy()?, k));
        }

        let dim = self.dim;
        let deg = self.degree;
        let levels = net.levels();
        let h = net.insertions();

        let mut ctrlp = Vec::new();
        ctrlp
            .try_reserve_exact(self.ctrlp.len() + times * dim)
            .map_err(|_| SplineError::OutOfMemory)?;
        ctrlp.extend_from_slice(&self.ctrlp[..(k - deg) * dim]);
        for level in &levels[..times] {
            ctrlp.extend_from_slice(&level[..dim]);
        }
        if times <= h {
            ctrlp.extend_from_slice(&levels[times]);
        }
        for level in levels[..times].iter().rev() {
            ctrlp.extend_from_slice(&level[level.len() - dim..]);
        }
        ctrlp.extend_from_slice(&self.ctrlp[(k - s + 1) * dim..]);

        let mut knots = Vec::new();
        knots
            .try_reserve_exact(self.knots.len() + times)
            .map_err(|_| SplineError::OutOfMemory)?;
        knots.extend_from_slice(&self.knots[..=k]);
        knots.extend(std::iter::repeat(net.u()).take(times));
        knots.extend_from_slice(&self.knots[k + 1..]);

        Ok((
            BSpline {
                degree: deg,
                dim,
                ctrlp,
                knots,
            },
            k + times,
        ))
    }

    /// 在 `u` 处分割：插入节点直到重数等于阶数
    pub fn split(&self, u: f64) -> Result<(BSpline, usize), SplineError> {
        let net = self.evaluate(u)?;
        let order = self.order();
        if net.multiplicity() == order {
            return Ok((self.deep_copy()?, net.knot_index()));
        }
        self.insert_knot(net.u(), order - net.multiplicity())
    }

    /// 在首部或尾部增减 `delta` 个控制点
    ///
    /// 新增控制点为零，新增节点沿原节点向量的平均步长延伸。
    pub fn resize(&self, delta: isize, at_back: bool) -> Result<BSpline, SplineError> {
        let deg = self.degree;
        let dim = self.dim;
        let n = self.num_control_points();
        let new_n = n as isize + delta;
        if new_n <= deg as isize {
            return Err(SplineError::DegreeTooLarge {
                degree: deg,
                n_ctrlp: new_n.max(0) as usize,
            });
        }
        let new_n = new_n as usize;
        if new_n == n {
            return self.deep_copy();
        }

        let old_knots = &self.knots;
        let n_knots = old_knots.len();
        let new_n_knots = new_n + deg + 1;
        let mut ctrlp = alloc_zeroed(new_n * dim)?;
        let mut knots = alloc_zeroed(new_n_knots)?;

        let span = old_knots[n_knots - 1] - old_knots[0];
        let step = if span > 0.0 {
            span / (n_knots - 1) as f64
        } else {
            1.0
        };

        if at_back {
            let keep = n.min(new_n) * dim;
            ctrlp[..keep].copy_from_slice(&self.ctrlp[..keep]);
            let keep_knots = n_knots.min(new_n_knots);
            knots[..keep_knots].copy_from_slice(&old_knots[..keep_knots]);
            for i in keep_knots..new_n_knots {
                knots[i] = knots[i - 1] + step;
            }
        } else if new_n > n {
            let grow = new_n - n;
            ctrlp[grow * dim..].copy_from_slice(&self.ctrlp);
            knots[grow..].copy_from_slice(old_knots);
            for i in (0..grow).rev() {
                knots[i] = knots[i + 1] - step;
            }
        } else {
            let shrink = n - new_n;
            ctrlp.copy_from_slice(&self.ctrlp[shrink * dim..]);
            knots.copy_from_slice(&old_knots[shrink..]);
        }

        Ok(BSpline {
            degree: deg,
            dim,
            ctrlp,
            knots,
        })
    }

    /// 把控制点向首尾连线混合：`b * P_i + (1 - b) * lerp(P_0, P_n-1, i / (n-1))`
    ///
    /// 不限制 `b` 的范围，[0, 1] 之外会放大或反转形状。
    pub fn buckle(&self, b: f64) -> Result<BSpline, SplineError> {
        let dim = self.dim;
        let n = self.num_control_points();
        let mut ctrlp = alloc_copy(&self.ctrlp)?;

        if n >= 2 {
            let first = &self.ctrlp[..dim];
            let last = &self.ctrlp[(n - 1) * dim..];
            let denom = (n - 1) as f64;
            for i in 0..n {
                let t = i as f64 / denom;
                for d in 0..dim {
                    let straight = first[d] + t * (last[d] - first[d]);
                    ctrlp[i * dim + d] = b * self.ctrlp[i * dim + d] + (1.0 - b) * straight;
                }
            }
        }

        Ok(BSpline {
            degree: self.degree,
            dim,
            ctrlp,
            knots: alloc_copy(&self.knots)?,
        })
    }

    /// 分解为首尾相接的贝塞尔段（节点数为阶数的整数倍）
    pub fn to_beziers(&self) -> Result<BSpline, SplineError> {
        let deg = self.degree;
        let dim = self.dim;
        let order = self.order();
        let mut tmp = self.deep_copy()?;
        let (min, max) = tmp.domain();

        if !approx_equal(tmp.knots[0], min) {
            let (split, k) = tmp.split(min)?;
            let drop = k - deg;
            tmp = BSpline {
                degree: deg,
                dim,
                ctrlp: alloc_copy(&split.ctrlp[drop * dim..])?,
                knots: alloc_copy(&split.knots[drop..])?,
            };
        }

        if !approx_equal(tmp.knots[tmp.knots.len() - 1], max) {
            let (split, k) = tmp.split(max)?;
            let drop = split.knots.len() - 1 - k;
            tmp = BSpline {
                degree: deg,
                dim,
                ctrlp: alloc_copy(&split.ctrlp[..split.ctrlp.len() - drop * dim])?,
                knots: alloc_copy(&split.knots[..split.knots.len() - drop])?,
            };
        }

        let mut k = order;
        while k < tmp.knots.len() - order {
            let (split, last) = tmp.split(tmp.knots[k])?;
            tmp = split;
            k = last + 1;
        }
        Ok(tmp)
    }

    fn deep_copy(&self) -> Result<BSpline, SplineError> {
        Ok(BSpline {
            degree: self.degree,
            dim: self.dim,
            ctrlp: alloc_copy(&self.ctrlp)?,
            knots: alloc_copy(&self.knots)?,
        })
    }
}
