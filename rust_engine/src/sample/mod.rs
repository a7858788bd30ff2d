//! 形状采样数据（静止姿态 + 逐帧顶点轨迹 + 三角形邻接）

mod builder;
mod store;
pub mod topology;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::{MeshSample, ShapeSampleBuilder};
pub use store::ShapeSample;
pub use topology::{connected_components, neighbors_from_triangles};
