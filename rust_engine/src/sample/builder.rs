//! 多网格拼接

use glam::DVec3;
use std::ops::Range;

use super::store::ShapeSample;
use super::topology::neighbors_from_triangles;
use crate::{Result, SsdsError};

/// 单个网格的采样结果
#[derive(Clone, Debug, Default)]
pub struct MeshSample {
    /// 逐帧顶点位置（世界空间）
    pub frames: Vec<Vec<DVec3>>,
    /// 三角形索引（网格内局部索引）
    pub triangles: Vec<[u32; 3]>,
}

/// 把多个网格拼接成一个 [`ShapeSample`]
///
/// 顶点按添加顺序依次偏移，静止姿态取第 0 帧。
#[derive(Default)]
pub struct ShapeSampleBuilder {
    meshes: Vec<MeshSample>,
}

impl ShapeSampleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(mut self, mesh: MeshSample) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// 每个网格在拼接后的顶点区间
    pub fn vertex_ranges(&self) -> Vec<Range<usize>> {
        let mut offset = 0;
        self.meshes
            .iter()
            .map(|m| {
                let count = m.frames.first().map_or(0, Vec::len);
                let range = offset..offset + count;
                offset += count;
                range
            })
            .collect()
    }

    pub fn build(self) -> Result<ShapeSample> {
        let frame_count = self.meshes.first().map_or(0, |m| m.frames.len());
        if let Some(i) = self
            .meshes
            .iter()
            .position(|m| m.frames.len() != frame_count)
        {
            return Err(SsdsError::InvalidInput(format!(
                "mesh {} has {} frames, expected {}",
                i,
                self.meshes[i].frames.len(),
                frame_count
            )));
        }

        let mut frames: Vec<Vec<DVec3>> = vec![Vec::new(); frame_count];
        let mut neighbors: Vec<Vec<usize>> = Vec::new();

        for (i, mesh) in self.meshes.iter().enumerate() {
            let offset = neighbors.len();
            let count = mesh.frames.first().map_or(0, Vec::len);
            if let Some(t) = mesh.frames.iter().position(|f| f.len() != count) {
                return Err(SsdsError::InvalidInput(format!(
                    "mesh {} frame {} has {} positions, expected {}",
                    i,
                    t,
                    mesh.frames[t].len(),
                    count
                )));
            }

            for (dst, src) in frames.iter_mut().zip(&mesh.frames) {
                dst.extend_from_slice(src);
            }
            neighbors.extend(
                neighbors_from_triangles(count, &mesh.triangles)
                    .into_iter()
                    .map(|list| list.into_iter().map(|n| n + offset).collect::<Vec<_>>()),
            );
        }

        log::debug!(
            "拼接 {} 个网格: {} 个顶点, {} 帧",
            self.meshes.len(),
            neighbors.len(),
            frame_count
        );

        ShapeSample::from_frames(frames, neighbors)
    }
}
