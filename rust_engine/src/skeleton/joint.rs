//! 输出关节

use glam::{DMat4, DVec3};

use super::{BoneTransform, BoneTransforms};
use crate::skinning::SkinWeights;

/// 分解结果对应的蒙皮关节
///
/// 绑定姿态是平移到簇中心的纯平移矩阵；簇中心取该骨骼权重最大的顶点的静止位置。
#[derive(Clone, Debug)]
pub struct SkinJoint {
    pub name: String,
    pub bone: usize,
    pub center: DVec3,
    pub bind_pose: DMat4,
}

impl SkinJoint {
    pub fn new(bone: usize, center: DVec3) -> Self {
        Self {
            name: format!("ssdsJoint{:02}", bone + 1),
            bone,
            center,
            bind_pose: DMat4::from_translation(center),
        }
    }

    /// 为每根骨骼创建关节
    ///
    /// 权重最大的顶点相同时取较小的顶点索引；完全没有权重的骨骼放在静止姿态质心。
    pub fn from_weights(weights: &SkinWeights, rest_positions: &[DVec3], bone_count: usize) -> Vec<Self> {
        let mut best: Vec<Option<(usize, f64)>> = vec![None; bone_count];
        for v in 0..weights.vertex_count() {
            for (bone, w) in weights.influences(v) {
                if bone >= bone_count || w <= 0.0 {
                    continue;
                }
                match best[bone] {
                    Some((_, current)) if current >= w => {}
                    _ => best[bone] = Some((v, w)),
                }
            }
        }

        let centroid = if rest_positions.is_empty() {
            DVec3::ZERO
        } else {
            rest_positions.iter().fold(DVec3::ZERO, |acc, p| acc + *p) / rest_positions.len() as f64
        };

        best.iter()
            .enumerate()
            .map(|(bone, slot)| {
                let center = slot.map_or(centroid, |(v, _)| rest_positions[v]);
                Self::new(bone, center)
            })
            .collect()
    }

    /// 第 `frame` 帧的关节世界矩阵；第 0 帧即绑定姿态
    pub fn world_matrix(&self, transforms: &BoneTransforms, frame: usize) -> DMat4 {
        if frame == 0 {
            self.bind_pose
        } else {
            transforms.get(self.bone, frame) * self.bind_pose
        }
    }

    /// 逐帧 TRS 关键帧
    pub fn keyframes(&self, transforms: &BoneTransforms) -> Vec<BoneTransform> {
        (0..transforms.frame_count())
            .map(|t| BoneTransform::from_matrix(&self.world_matrix(transforms, t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_uses_max_weight_lowest_index() {
        let rest = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
        ];
        let mut weights = SkinWeights::new(3, 2);
        weights.set_row(0, &[(0, 0.5), (1, 0.5)]);
        weights.set_row(1, &[(0, 0.9), (1, 0.1)]);
        weights.set_row(2, &[(0, 0.9), (1, 0.1)]);

        let joints = SkinJoint::from_weights(&weights, &rest, 3);
        assert_eq!(joints.len(), 3);
        assert_eq!(joints[0].center, rest[1]);
        assert_eq!(joints[1].center, rest[0]);
        // 骨骼 2 没有任何权重 → 质心
        assert_eq!(joints[2].center, DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(joints[0].name, "ssdsJoint01");
    }

    #[test]
    fn test_world_matrix_frame_zero_is_bind_pose() {
        let joint = SkinJoint::new(0, DVec3::new(1.0, 2.0, 3.0));
        let mut transforms = BoneTransforms::identity(1, 2);
        transforms.set(0, 0, DMat4::from_translation(DVec3::X));
        transforms.set(0, 1, DMat4::from_translation(DVec3::Y));

        assert_eq!(joint.world_matrix(&transforms, 0), joint.bind_pose);
        let p = joint.world_matrix(&transforms, 1).transform_point3(DVec3::ZERO);
        assert!(p.distance(DVec3::new(1.0, 3.0, 3.0)) < 1e-12);
        assert_eq!(joint.keyframes(&transforms).len(), 2);
    }
}
