//! 数值求解：初始聚类、权重求解、变换求解

mod cluster;
pub mod fit;
pub mod qp;
mod transform;
mod weight;

pub use cluster::{ClusterInit, ClusterInitializer};
pub use fit::{fit_transform, PointPair};
pub use transform::{DegenerateBone, TransformSolver};
pub use weight::WeightSolver;
