//! 蒙皮权重求解
//!
//! 变换固定，逐顶点求解：
//!
//! ```text
//! min_w  Σ_t ‖Σ_b w_b M_b(t) r − p(t)‖² / (T σ²)  +  λ ‖w − w̄‖²
//! s.t.   w ≥ 0, Σ w = 1
//! ```
//!
//! 候选骨骼为顶点自身及其邻居当前行中的骨骼，`w̄` 是邻居当前行的平均。
//! 求解后只保留最大的 K 个权重，不做重新归一化。

use glam::{DMat4, DVec3};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::collections::BTreeSet;

use super::qp::SimplexQp;
use crate::sample::ShapeSample;
use crate::skeleton::BoneTransforms;
use crate::skinning::{write_row, SkinWeights};

/// 权重求解器
pub struct WeightSolver {
    /// 邻域平滑系数 λ
    pub smoothness: f64,
    /// QP 最大迭代次数
    pub max_iterations: usize,
    /// QP 收敛阈值
    pub tolerance: f64,
}

impl WeightSolver {
    /// 返回新的权重（输入权重只读，保证逐顶点并行无竞争）
    pub fn update(
        &self,
        sample: &ShapeSample,
        transforms: &BoneTransforms,
        weights: &SkinWeights,
    ) -> SkinWeights {
        let k = weights.max_influences();
        let frame_matrices: Vec<Vec<DMat4>> = (0..sample.frame_count())
            .map(|t| transforms.frame_matrices(t))
            .collect();
        let normalizer = 1.0 / (sample.frame_count() as f64 * sample.scale_sq());

        let mut updated = SkinWeights::new(weights.vertex_count(), k);
        let (indices, values) = updated.slots_mut();
        indices
            .par_chunks_mut(k)
            .zip(values.par_chunks_mut(k))
            .enumerate()
            .for_each(|(v, (row_indices, row_weights))| {
                let entries = self.solve_vertex(sample, &frame_matrices, weights, normalizer, v);
                write_row(row_indices, row_weights, &entries);
            });

        updated
    }

    /// 单个顶点：返回按权重降序的 (骨骼, 权重)，最多 K 个
    fn solve_vertex(
        &self,
        sample: &ShapeSample,
        frame_matrices: &[Vec<DMat4>],
        weights: &SkinWeights,
        normalizer: f64,
        v: usize,
    ) -> Vec<(usize, f64)> {
        let bone_count = frame_matrices.first().map_or(0, Vec::len);
        let neighbors = sample.neighbors(v);

        let mut candidate_set = BTreeSet::new();
        for u in std::iter::once(v).chain(neighbors.iter().copied()) {
            for (bone, w) in weights.influences(u) {
                if bone < bone_count && w > 0.0 {
                    candidate_set.insert(bone);
                }
            }
        }
        let candidates: Vec<usize> = candidate_set.into_iter().collect();
        let n = candidates.len();
        if n == 0 {
            return weights.influences(v).collect();
        }

        // 数据项：A_ij = Σ_t q_i·q_j，rhs_i = Σ_t q_i·p
        let rest = sample.rest_position(v);
        let mut a = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);
        let mut q: Vec<DVec3> = vec![DVec3::ZERO; n];
        for (t, matrices) in frame_matrices.iter().enumerate() {
            let observed = sample.position(t, v);
            for (i, &bone) in candidates.iter().enumerate() {
                q[i] = matrices[bone].transform_point3(rest);
            }
            for i in 0..n {
                rhs[i] += q[i].dot(observed);
                for j in i..n {
                    a[(i, j)] += q[i].dot(q[j]);
                }
            }
        }
        for i in 0..n {
            for j in 0..i {
                a[(i, j)] = a[(j, i)];
            }
        }

        // 平滑项：邻居当前行的平均
        let lambda = if neighbors.is_empty() { 0.0 } else { self.smoothness };
        let mut mean = DVector::<f64>::zeros(n);
        if lambda > 0.0 {
            for &u in neighbors {
                for (bone, w) in weights.influences(u) {
                    if let Ok(i) = candidates.binary_search(&bone) {
                        mean[i] += w;
                    }
                }
            }
            mean /= neighbors.len() as f64;
        }

        let q_matrix = a * normalizer + DMatrix::<f64>::identity(n, n) * lambda;
        let c = rhs * normalizer + mean * lambda;

        let mut start = DVector::<f64>::zeros(n);
        for (bone, w) in weights.influences(v) {
            if let Ok(i) = candidates.binary_search(&bone) {
                start[i] += w;
            }
        }

        let qp = SimplexQp {
            q: &q_matrix,
            c: &c,
        };
        let solution = qp.solve(&start, self.max_iterations, self.tolerance);

        retain_largest(&candidates, &solution, weights.max_influences())
    }
}

/// 保留最大的 `k` 个正权重（权重相同取较小骨骼索引）
fn retain_largest(candidates: &[usize], solution: &DVector<f64>, k: usize) -> Vec<(usize, f64)> {
    let mut entries: Vec<(usize, f64)> = candidates
        .iter()
        .zip(solution.iter())
        .filter(|(_, w)| **w > 0.0)
        .map(|(b, w)| (*b, *w))
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    entries.truncate(k);
    entries
}
