//! 顶点蒙皮计算

use glam::{DMat4, DVec3};
use rayon::prelude::*;

use super::{SkinWeights, SkinningInput};
use crate::sample::ShapeSample;
use crate::skeleton::BoneTransforms;

/// 计算蒙皮（rayon 并行）
pub fn compute_skinning(input: &SkinningInput) -> Vec<DVec3> {
    input
        .positions
        .par_iter()
        .enumerate()
        .map(|(v, rest)| {
            let (indices, weights) = input.weights.row(v);
            blend_position(*rest, indices, weights, input.bone_matrices)
        })
        .collect()
}

/// 计算单个顶点的线性混合位置
///
/// 不做归一化：中间状态的行可能不满足和为 1。
pub fn blend_position(rest: DVec3, indices: &[i32], weights: &[f64], matrices: &[DMat4]) -> DVec3 {
    let mut pos = DVec3::ZERO;
    for (&bone, &w) in indices.iter().zip(weights) {
        if w == 0.0 {
            continue;
        }
        if let Some(m) = get_matrix(matrices, bone) {
            pos += m.transform_point3(rest) * w;
        }
    }
    pos
}

/// 平均每顶点每帧的重建误差平方
pub fn reconstruction_error(
    sample: &ShapeSample,
    weights: &SkinWeights,
    transforms: &BoneTransforms,
) -> f64 {
    let vertex_count = sample.vertex_count();
    let frame_count = sample.frame_count();

    let total: f64 = (0..frame_count)
        .map(|t| {
            let matrices = transforms.frame_matrices(t);
            let observed = sample.frame(t);
            (0..vertex_count)
                .into_par_iter()
                .map(|v| {
                    let (indices, w) = weights.row(v);
                    blend_position(sample.rest_position(v), indices, w, &matrices)
                        .distance_squared(observed[v])
                })
                .sum::<f64>()
        })
        .sum();

    total / (vertex_count * frame_count) as f64
}

fn get_matrix(matrices: &[DMat4], index: i32) -> Option<&DMat4> {
    if index < 0 {
        return None;
    }
    matrices.get(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::fixtures::rotating_cube;

    #[test]
    fn test_blend_two_bones() {
        let m0 = DMat4::IDENTITY;
        let m1 = DMat4::from_translation(DVec3::new(2.0, 0.0, 0.0));
        let p = blend_position(DVec3::ONE, &[0, 1], &[0.5, 0.5], &[m0, m1]);
        assert!(p.distance(DVec3::new(2.0, 1.0, 1.0)) < 1e-12);
    }

    #[test]
    fn test_blend_skips_empty_slot() {
        let m = DMat4::from_translation(DVec3::X);
        let p = blend_position(DVec3::ZERO, &[0, -1], &[1.0, 0.7], &[m]);
        assert_eq!(p, DVec3::X);
    }

    #[test]
    fn test_compute_skinning() {
        let mut weights = SkinWeights::new(2, 1);
        weights.set_row(0, &[(0, 1.0)]);
        weights.set_row(1, &[(1, 1.0)]);
        let matrices = [DMat4::IDENTITY, DMat4::from_translation(DVec3::Y)];
        let out = compute_skinning(&SkinningInput {
            positions: &[DVec3::ZERO, DVec3::X],
            weights: &weights,
            bone_matrices: &matrices,
        });
        assert_eq!(out, vec![DVec3::ZERO, DVec3::new(1.0, 1.0, 0.0)]);
    }

    #[test]
    fn test_reconstruction_error_exact_and_identity() {
        let (sample, rotation) = rotating_cube();
        let weights = SkinWeights::from_labels(&vec![0; 8], 1);

        let mut transforms = BoneTransforms::identity(1, 2);
        transforms.set(0, 1, rotation);
        assert!(reconstruction_error(&sample, &weights, &transforms) < 1e-20);

        // 单位变换：第 1 帧每个顶点偏离 |p - Rp|² = 4（半边长 1 的立方体绕 Z 旋转 90°）
        let identity = BoneTransforms::identity(1, 2);
        let err = reconstruction_error(&sample, &weights, &identity);
        assert!((err - 2.0).abs() < 1e-12);
    }
}
