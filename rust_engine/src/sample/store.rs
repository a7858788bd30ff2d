//! 形状采样存储

use glam::DVec3;

use super::topology::symmetrize;
use crate::{Result, SsdsError};

/// 一次分解所用的只读几何数据
///
/// - `rest_positions`: V 个静止姿态位置
/// - `frames`: T 帧，每帧 V 个观测位置
/// - `neighbors`: 每个顶点的三角形邻接顶点（对称，升序）
#[derive(Clone, Debug)]
pub struct ShapeSample {
    rest_positions: Vec<DVec3>,
    frames: Vec<Vec<DVec3>>,
    neighbors: Vec<Vec<usize>>,
}

impl ShapeSample {
    /// 创建采样存储
    ///
    /// 顶点数或帧数为 0 时返回 `EmptyInput`；轨迹长度或邻接索引不一致时返回 `InvalidInput`。
    pub fn new(
        rest_positions: Vec<DVec3>,
        frames: Vec<Vec<DVec3>>,
        neighbors: Vec<Vec<usize>>,
    ) -> Result<Self> {
        let vertex_count = rest_positions.len();
        if vertex_count == 0 || frames.is_empty() {
            return Err(SsdsError::EmptyInput {
                vertices: vertex_count,
                frames: frames.len(),
            });
        }

        if let Some((t, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() != vertex_count)
        {
            return Err(SsdsError::InvalidInput(format!(
                "frame {} has {} positions, expected {}",
                t,
                frame.len(),
                vertex_count
            )));
        }

        if neighbors.len() != vertex_count {
            return Err(SsdsError::InvalidInput(format!(
                "neighbor table has {} rows, expected {}",
                neighbors.len(),
                vertex_count
            )));
        }
        if let Some(v) = neighbors
            .iter()
            .position(|list| list.iter().any(|&n| n >= vertex_count))
        {
            return Err(SsdsError::InvalidInput(format!(
                "vertex {} references a neighbor outside 0..{}",
                v, vertex_count
            )));
        }

        Ok(Self {
            rest_positions,
            frames,
            neighbors: symmetrize(&neighbors),
        })
    }

    /// 以第 0 帧作为静止姿态创建
    pub fn from_frames(frames: Vec<Vec<DVec3>>, neighbors: Vec<Vec<usize>>) -> Result<Self> {
        let rest = frames.first().cloned().unwrap_or_default();
        Self::new(rest, frames, neighbors)
    }

    /// 顶点数量
    pub fn vertex_count(&self) -> usize {
        self.rest_positions.len()
    }

    /// 帧数量
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn rest_positions(&self) -> &[DVec3] {
        &self.rest_positions
    }

    pub fn rest_position(&self, vertex: usize) -> DVec3 {
        self.rest_positions[vertex]
    }

    /// 第 `frame` 帧全部顶点的观测位置
    pub fn frame(&self, frame: usize) -> &[DVec3] {
        &self.frames[frame]
    }

    pub fn position(&self, frame: usize, vertex: usize) -> DVec3 {
        self.frames[frame][vertex]
    }

    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.neighbors[vertex]
    }

    pub fn neighbor_table(&self) -> &[Vec<usize>] {
        &self.neighbors
    }

    /// 静止姿态质心
    pub fn center_of_mass(&self) -> DVec3 {
        let sum = self
            .rest_positions
            .iter()
            .fold(DVec3::ZERO, |acc, p| acc + *p);
        sum / self.vertex_count() as f64
    }

    /// 静止姿态到质心的均方距离（用于把误差归一化为无量纲量）
    ///
    /// 退化情况（所有顶点重合）返回 1.0。
    pub fn scale_sq(&self) -> f64 {
        let com = self.center_of_mass();
        let mean = self
            .rest_positions
            .iter()
            .map(|p| p.distance_squared(com))
            .sum::<f64>()
            / self.vertex_count() as f64;
        if mean > f64::EPSILON {
            mean
        } else {
            1.0
        }
    }

    /// 整体平移后的副本（静止姿态与所有帧同时平移）
    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            rest_positions: self.rest_positions.iter().map(|p| *p + offset).collect(),
            frames: self
                .frames
                .iter()
                .map(|f| f.iter().map(|p| *p + offset).collect())
                .collect(),
            neighbors: self.neighbors.clone(),
        }
    }
}
