//! 加权最小二乘变换拟合
//!
//! 求 `M`，使 `Σ w_i ‖M · rest_i − target_i‖²` 最小：
//! - Rigid: 加权 Procrustes（SVD，行列式为负时翻转最小奇异值对应的列）
//! - RigidScale: 同上，再求闭式最优均匀缩放
//! - Affine: 加权线性最小二乘（协方差奇异时向刚体解正则化）

use glam::{DMat3, DMat4, DVec3};
use nalgebra::{Matrix3, SVD};

use crate::config::TransformType;

/// 总权重低于此值时视为无解
const MIN_TOTAL_WEIGHT: f64 = 1e-300;
/// SVD 最大迭代次数
const SVD_MAX_ITERATIONS: usize = 200;

/// 单个对应点
#[derive(Clone, Copy, Debug)]
pub struct PointPair {
    pub rest: DVec3,
    pub target: DVec3,
    pub weight: f64,
}

/// 拟合变换；总权重为 0 或刚体类 SVD 失败时返回 `None`
pub fn fit_transform(kind: TransformType, pairs: &[PointPair]) -> Option<DMat4> {
    let moments = Moments::accumulate(pairs)?;
    match kind {
        TransformType::Rigid => {
            let (rotation, _) = moments.rotation()?;
            Some(moments.compose(rotation))
        }
        TransformType::RigidScale => {
            let (rotation, trace) = moments.rotation()?;
            let scale = if moments.rest_variance > f64::EPSILON {
                (trace / moments.rest_variance).max(0.0)
            } else {
                1.0
            };
            Some(moments.compose(rotation * scale))
        }
        TransformType::Affine => {
            // SVD 失败时以单位矩阵作为正则化目标
            let target = moments.rotation().map_or(DMat3::IDENTITY, |(rotation, _)| rotation);
            Some(moments.compose(moments.affine(target)))
        }
    }
}

/// 加权一阶、二阶矩（已去中心化）
struct Moments {
    rest_centroid: DVec3,
    target_centroid: DVec3,
    /// Σ w (target − ct)(rest − cr)ᵀ
    cross: DMat3,
    /// Σ w (rest − cr)(rest − cr)ᵀ
    rest_cov: DMat3,
    /// Σ w ‖rest − cr‖²
    rest_variance: f64,
}

impl Moments {
    fn accumulate(pairs: &[PointPair]) -> Option<Self> {
        let total: f64 = pairs.iter().map(|p| p.weight).sum();
        if !(total > MIN_TOTAL_WEIGHT) || !total.is_finite() {
            return None;
        }

        let mut rest_centroid = DVec3::ZERO;
        let mut target_centroid = DVec3::ZERO;
        for p in pairs {
            rest_centroid += p.rest * p.weight;
            target_centroid += p.target * p.weight;
        }
        rest_centroid /= total;
        target_centroid /= total;

        let mut cross = DMat3::ZERO;
        let mut rest_cov = DMat3::ZERO;
        let mut rest_variance = 0.0;
        for p in pairs {
            if p.weight == 0.0 {
                continue;
            }
            let a = p.rest - rest_centroid;
            let b = p.target - target_centroid;
            cross = cross + outer(b, a * p.weight);
            rest_cov = rest_cov + outer(a, a * p.weight);
            rest_variance += a.length_squared() * p.weight;
        }

        Some(Self {
            rest_centroid,
            target_centroid,
            cross,
            rest_cov,
            rest_variance,
        })
    }

    /// 最优旋转（行列式 +1）以及 `tr(S·D)`（缩放求解用）
    fn rotation(&self) -> Option<(DMat3, f64)> {
        let svd = SVD::try_new(to_na(&self.cross), true, true, f64::EPSILON, SVD_MAX_ITERATIONS)?;
        let mut u = svd.u?;
        let v_t = svd.v_t?;
        let sigma = svd.singular_values;

        // 最小奇异值的位置（不依赖 SVD 的排序约定）
        let mut smallest = 0;
        for i in 1..3 {
            if sigma[i] < sigma[smallest] {
                smallest = i;
            }
        }

        let mut trace = sigma.sum();
        if (u * v_t).determinant() < 0.0 {
            // 反射修正
            let mut column = u.column_mut(smallest);
            column.neg_mut();
            trace -= 2.0 * sigma[smallest];
        }

        let rotation = from_na(&(u * v_t));
        if !rotation.is_finite() {
            return None;
        }
        Some((rotation, trace))
    }

    /// `A = (C + λR)(Σ + λI)⁻¹`，λ 很小，只在协方差退化的方向上起作用
    fn affine(&self, rotation: DMat3) -> DMat3 {
        let lambda = 1e-9 * self.rest_variance + 1e-12;
        let lhs = self.cross + rotation * lambda;
        let rhs = self.rest_cov + DMat3::IDENTITY * lambda;
        if rhs.determinant().abs() <= f64::MIN_POSITIVE {
            return rotation;
        }
        let linear = lhs * rhs.inverse();
        if linear.is_finite() {
            linear
        } else {
            rotation
        }
    }

    /// 由线性部分组装 4x4 矩阵：平移 = ct − A·cr
    fn compose(&self, linear: DMat3) -> DMat4 {
        let translation = self.target_centroid - linear * self.rest_centroid;
        DMat4::from_cols(
            linear.x_axis.extend(0.0),
            linear.y_axis.extend(0.0),
            linear.z_axis.extend(0.0),
            translation.extend(1.0),
        )
    }
}

/// `a bᵀ`
fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

fn to_na(m: &DMat3) -> Matrix3<f64> {
    Matrix3::from_column_slice(&m.to_cols_array())
}

fn from_na(m: &Matrix3<f64>) -> DMat3 {
    DMat3::from_cols_slice(m.as_slice())
}
