//! SSDS Engine - 蒙皮分解（Smooth Skinning Decomposition with Rigid Bones）
//!
//! 从逐帧采样的网格动画中恢复：
//! - 少量骨骼的逐帧变换（刚体 / 仿射 / 刚体+均匀缩放）
//! - 每个顶点的稀疏、非负、归一化蒙皮权重
//!
//! 场景读取、时间轴采样、骨骼节点创建、蒙皮绑定等宿主端功能
//! 只以 [`host`] 中的数据交换接口出现。

pub mod config;
pub mod decompose;
pub mod host;
pub mod sample;
pub mod skeleton;
pub mod skinning;
pub mod solver;

pub use config::{DecomposeConfig, TransformType};
pub use decompose::{DegenerateBone, Decomposer, Decomposition};
pub use sample::{MeshSample, ShapeSample, ShapeSampleBuilder};
pub use skeleton::{BoneTransform, BoneTransforms, SkinJoint};
pub use skinning::SkinWeights;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SsdsError {
    #[error("empty input: {vertices} vertices, {frames} frames")]
    EmptyInput { vertices: usize, frames: usize },

    #[error(
        "degenerate geometry: vertex {vertex} is not reachable by any seed \
         ({components} connected components, {bones} bones requested)"
    )]
    DegenerateGeometry {
        vertex: usize,
        components: usize,
        bones: usize,
    },

    #[error("normalization error: every influence of vertex {vertex} vanished")]
    Normalization { vertex: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SsdsError>;
