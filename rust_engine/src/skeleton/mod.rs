//! 骨骼：逐帧变换与输出关节

mod joint;
mod transforms;

pub use joint::SkinJoint;
pub use transforms::BoneTransforms;

use glam::{DMat4, DQuat, DVec3};

/// 骨骼变换数据（TRS 形式，供按通道打关键帧的宿主使用）
#[derive(Clone, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }
}

impl BoneTransform {
    /// 从矩阵分解（仿射骨骼的剪切分量会丢失）
    pub fn from_matrix(matrix: &DMat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}
