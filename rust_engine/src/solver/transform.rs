//! 骨骼变换求解
//!
//! 权重固定，逐 (骨骼, 帧) 独立求解 `Σ_v w(v,b)² ‖M · rest_v − p_v(t)‖²` 的最小值。

use glam::DMat4;
use rayon::prelude::*;

use super::fit::{fit_transform, PointPair};
use crate::config::TransformType;
use crate::sample::ShapeSample;
use crate::skeleton::BoneTransforms;
use crate::skinning::SkinWeights;

/// 某根骨骼在某帧失去支撑（非致命，沿用上一帧变换）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DegenerateBone {
    pub bone: usize,
    pub frame: usize,
}

/// 变换求解器
pub struct TransformSolver {
    pub transform_type: TransformType,
    /// 权重平方和低于此值视为失去支撑
    pub min_bone_weight: f64,
}

impl TransformSolver {
    /// 更新全部骨骼的逐帧变换，返回失去支撑的 (骨骼, 帧)
    ///
    /// 所有 (骨骼, 帧) 并行拟合；之后逐骨骼按帧顺序把无解的槽位替换为上一帧的新值，
    /// 第 0 帧无解时保留原值。
    pub fn update(
        &self,
        sample: &ShapeSample,
        weights: &SkinWeights,
        transforms: &mut BoneTransforms,
    ) -> Vec<DegenerateBone> {
        let bone_count = transforms.bone_count();
        let frame_count = transforms.frame_count();
        let members = bone_members(weights, bone_count);

        let fitted: Vec<Option<DMat4>> = (0..bone_count * frame_count)
            .into_par_iter()
            .map(|slot| {
                let bone = slot / frame_count;
                let frame = slot % frame_count;
                self.fit_bone_frame(sample, &members[bone], frame)
            })
            .collect();

        let mut degenerate = Vec::new();
        for bone in 0..bone_count {
            for frame in 0..frame_count {
                match fitted[bone * frame_count + frame] {
                    Some(m) => transforms.set(bone, frame, m),
                    None => {
                        if frame > 0 {
                            let previous = transforms.get(bone, frame - 1);
                            transforms.set(bone, frame, previous);
                        }
                        degenerate.push(DegenerateBone { bone, frame });
                    }
                }
            }
        }

        if !degenerate.is_empty() {
            log::warn!(
                "{} 个 (骨骼, 帧) 失去支撑，沿用上一帧变换（首个: 骨骼 {}, 帧 {}）",
                degenerate.len(),
                degenerate[0].bone,
                degenerate[0].frame
            );
        }
        degenerate
    }

    fn fit_bone_frame(
        &self,
        sample: &ShapeSample,
        members: &[(usize, f64)],
        frame: usize,
    ) -> Option<DMat4> {
        let total: f64 = members.iter().map(|(_, w2)| w2).sum();
        if !(total >= self.min_bone_weight) {
            return None;
        }
        let observed = sample.frame(frame);
        let pairs: Vec<PointPair> = members
            .iter()
            .map(|&(v, w2)| PointPair {
                rest: sample.rest_position(v),
                target: observed[v],
                weight: w2,
            })
            .collect();
        fit_transform(self.transform_type, &pairs)
    }
}

/// 每根骨骼的 (顶点, 权重²) 列表（只含正权重）
fn bone_members(weights: &SkinWeights, bone_count: usize) -> Vec<Vec<(usize, f64)>> {
    let mut members = vec![Vec::new(); bone_count];
    for v in 0..weights.vertex_count() {
        for (bone, w) in weights.influences(v) {
            if bone < bone_count && w > 0.0 {
                members[bone].push((v, w * w));
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::fixtures::{jointed_bar, max_abs_diff, rotating_cube};

    #[test]
    fn test_recovers_cube_rotation() {
        let (sample, rotation) = rotating_cube();
        let weights = SkinWeights::from_labels(&vec![0; 8], 1);
        let mut transforms = BoneTransforms::identity(1, 2);
        let solver = TransformSolver {
            transform_type: TransformType::Rigid,
            min_bone_weight: 1e-8,
        };
        let degenerate = solver.update(&sample, &weights, &mut transforms);
        assert!(degenerate.is_empty());
        assert!(max_abs_diff(&transforms.get(0, 0), &DMat4::IDENTITY) < 1e-9);
        assert!(max_abs_diff(&transforms.get(0, 1), &rotation) < 1e-9);
    }

    #[test]
    fn test_recovers_both_bar_halves() {
        let bar = jointed_bar();
        let labels: Vec<usize> = bar.right_side.iter().map(|r| *r as usize).collect();
        let weights = SkinWeights::from_labels(&labels, 1);
        let frames = bar.sample.frame_count();
        let mut transforms = BoneTransforms::identity(2, frames);
        let solver = TransformSolver {
            transform_type: TransformType::Rigid,
            min_bone_weight: 1e-8,
        };
        solver.update(&bar.sample, &weights, &mut transforms);
        for t in 0..frames {
            assert!(max_abs_diff(&transforms.get(0, t), &bar.left_motion[t]) < 1e-9);
            assert!(max_abs_diff(&transforms.get(1, t), &bar.right_motion[t]) < 1e-9);
        }
    }

    #[test]
    fn test_unsupported_bone_holds_previous_frame() {
        let (sample, _) = rotating_cube();
        // 骨骼 1 没有任何顶点
        let weights = SkinWeights::from_labels(&vec![0; 8], 2);
        let mut transforms = BoneTransforms::identity(2, 2);
        let held = DMat4::from_translation(glam::DVec3::new(3.0, 0.0, 0.0));
        transforms.set(1, 0, held);
        transforms.set(1, 1, DMat4::from_rotation_x(1.0));

        let solver = TransformSolver {
            transform_type: TransformType::Rigid,
            min_bone_weight: 1e-8,
        };
        let degenerate = solver.update(&sample, &weights, &mut transforms);

        assert_eq!(
            degenerate,
            vec![
                DegenerateBone { bone: 1, frame: 0 },
                DegenerateBone { bone: 1, frame: 1 },
            ]
        );
        assert_eq!(transforms.get(1, 0), held);
        assert_eq!(transforms.get(1, 1), held);
        assert!(transforms.get(0, 1).is_finite());
    }
}
