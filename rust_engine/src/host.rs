//! 宿主接口 - 与场景 / 时间轴 / 蒙皮变形器交互
//!
//! 引擎本身不读取场景，只通过这两个 trait 交换数据：
//! - [`AnimationSource`]：按帧提供每个网格的顶点位置和三角形
//! - [`SkinBinder`]：接收关节、逐帧关节矩阵和每个网格的权重

use glam::{DMat4, DVec3};
use std::ops::Range;

use crate::decompose::Decomposition;
use crate::sample::{MeshSample, ShapeSample, ShapeSampleBuilder};
use crate::skeleton::SkinJoint;
use crate::skinning::SkinWeights;
use crate::Result;

/// 动画数据来源
pub trait AnimationSource {
    /// 网格数量
    fn mesh_count(&self) -> usize;

    /// 采样帧数（第 0 帧作为静止姿态）
    fn frame_count(&self) -> usize;

    /// 第 `frame` 帧时网格 `mesh` 的世界空间顶点位置
    fn positions(&self, mesh: usize, frame: usize) -> Result<Vec<DVec3>>;

    /// 网格 `mesh` 的三角形（网格内局部索引）
    fn triangles(&self, mesh: usize) -> Result<Vec<[u32; 3]>>;
}

/// 蒙皮绑定目标
pub trait SkinBinder {
    /// 创建关节，`joints[i]` 对应骨骼 i
    fn create_joints(&mut self, joints: &[SkinJoint]) -> Result<()>;

    /// 设置第 `frame` 帧所有关节的世界矩阵
    fn set_joint_matrices(&mut self, frame: usize, matrices: &[DMat4]) -> Result<()>;

    /// 绑定网格 `mesh` 的权重（行数等于该网格顶点数）
    fn bind_mesh(&mut self, mesh: usize, weights: &SkinWeights) -> Result<()>;
}

/// 采样结果及每个网格的顶点区间
#[derive(Clone, Debug)]
pub struct SampledShapes {
    pub sample: ShapeSample,
    pub mesh_ranges: Vec<Range<usize>>,
}

/// 从动画来源采样全部网格并拼接
pub fn sample_shapes<S: AnimationSource + ?Sized>(source: &S) -> Result<SampledShapes> {
    let frame_count = source.frame_count();
    let mut builder = ShapeSampleBuilder::new();
    for mesh in 0..source.mesh_count() {
        let frames = (0..frame_count)
            .map(|t| source.positions(mesh, t))
            .collect::<Result<Vec<_>>>()?;
        builder = builder.add_mesh(MeshSample {
            frames,
            triangles: source.triangles(mesh)?,
        });
    }

    let mesh_ranges = builder.vertex_ranges();
    let sample = builder.build()?;
    log::info!(
        "采样完成: {} 个网格, {} 个顶点, {} 帧",
        mesh_ranges.len(),
        sample.vertex_count(),
        sample.frame_count()
    );
    Ok(SampledShapes {
        sample,
        mesh_ranges,
    })
}

/// 把分解结果写回宿主
///
/// 依次创建关节、写入逐帧关节矩阵（第 0 帧为绑定姿态）、按网格拆分权重绑定。
pub fn bind_decomposition<B: SkinBinder + ?Sized>(
    binder: &mut B,
    decomposition: &Decomposition,
    shapes: &SampledShapes,
) -> Result<()> {
    let joints = decomposition.joints(&shapes.sample);
    binder.create_joints(&joints)?;

    let transforms = &decomposition.bone_transforms;
    for frame in 0..transforms.frame_count() {
        let matrices: Vec<DMat4> = joints
            .iter()
            .map(|joint| joint.world_matrix(transforms, frame))
            .collect();
        binder.set_joint_matrices(frame, &matrices)?;
    }

    for (mesh, range) in shapes.mesh_ranges.iter().enumerate() {
        binder.bind_mesh(mesh, &decomposition.skin_weights.slice_rows(range.clone()))?;
    }

    log::info!(
        "绑定完成: {} 个关节, {} 帧, {} 个网格",
        joints.len(),
        transforms.frame_count(),
        shapes.mesh_ranges.len()
    );
    Ok(())
}
