//! 线性混合蒙皮与蒙皮权重

mod skinning;
mod weights;

pub use skinning::{blend_position, compute_skinning, reconstruction_error};
pub use weights::SkinWeights;

pub(crate) use weights::write_row;

use glam::{DMat4, DVec3};

/// 蒙皮输入数据
pub struct SkinningInput<'a> {
    /// 静止姿态顶点位置
    pub positions: &'a [DVec3],
    /// 顶点权重
    pub weights: &'a SkinWeights,
    /// 当前帧每根骨骼的变换矩阵
    pub bone_matrices: &'a [DMat4],
}
