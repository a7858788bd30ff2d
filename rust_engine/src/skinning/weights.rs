//! 稀疏蒙皮权重（每个顶点 K 个槽位）

use std::ops::Range;

use crate::{Result, SsdsError};

/// 每个顶点最多 K 个 (骨骼索引, 权重) 槽位，索引 -1 表示空槽
///
/// 按 `vertex * K + slot` 线性存储，便于按行并行写入。
#[derive(Clone, Debug, PartialEq)]
pub struct SkinWeights {
    max_influences: usize,
    indices: Vec<i32>,
    weights: Vec<f64>,
}

impl SkinWeights {
    /// 全部为空槽
    pub fn new(vertex_count: usize, max_influences: usize) -> Self {
        Self {
            max_influences,
            indices: vec![-1; vertex_count * max_influences],
            weights: vec![0.0; vertex_count * max_influences],
        }
    }

    /// 每个顶点只受一根骨骼影响（权重 1.0）
    pub fn from_labels(labels: &[usize], max_influences: usize) -> Self {
        let mut skin = Self::new(labels.len(), max_influences);
        for (v, &bone) in labels.iter().enumerate() {
            skin.set_row(v, &[(bone, 1.0)]);
        }
        skin
    }

    pub fn vertex_count(&self) -> usize {
        if self.max_influences == 0 {
            0
        } else {
            self.indices.len() / self.max_influences
        }
    }

    pub fn max_influences(&self) -> usize {
        self.max_influences
    }

    /// 第 `vertex` 行的原始槽位
    pub fn row(&self, vertex: usize) -> (&[i32], &[f64]) {
        let range = self.row_range(vertex);
        (&self.indices[range.clone()], &self.weights[range])
    }

    /// 有效槽位（索引 >= 0）
    pub fn influences(&self, vertex: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (indices, weights) = self.row(vertex);
        indices
            .iter()
            .zip(weights)
            .filter(|(i, _)| **i >= 0)
            .map(|(i, w)| (*i as usize, *w))
    }

    /// 顶点对某根骨骼的权重（未引用时为 0）
    pub fn weight(&self, vertex: usize, bone: usize) -> f64 {
        self.influences(vertex)
            .filter(|(b, _)| *b == bone)
            .map(|(_, w)| w)
            .sum()
    }

    /// 非零权重个数
    pub fn nonzero_count(&self, vertex: usize) -> usize {
        self.influences(vertex).filter(|(_, w)| *w != 0.0).count()
    }

    pub fn row_sum(&self, vertex: usize) -> f64 {
        self.influences(vertex).map(|(_, w)| w).sum()
    }

    /// 覆盖一行；超过 K 的部分被丢弃
    pub fn set_row(&mut self, vertex: usize, entries: &[(usize, f64)]) {
        let range = self.row_range(vertex);
        write_row(
            &mut self.indices[range.clone()],
            &mut self.weights[range],
            entries,
        );
    }

    /// 最终清理：负权重截断为 0，每行归一化为和 1
    ///
    /// 某行截断后全为 0 时返回 `Normalization` 错误。
    pub fn normalize(&mut self) -> Result<()> {
        let k = self.max_influences;
        for (v, (indices, weights)) in self
            .indices
            .chunks_mut(k)
            .zip(self.weights.chunks_mut(k))
            .enumerate()
        {
            let mut sum = 0.0;
            for (i, w) in indices.iter_mut().zip(weights.iter_mut()) {
                *w = w.max(0.0);
                if *i < 0 {
                    *w = 0.0;
                }
                if *w == 0.0 {
                    *i = -1;
                }
                sum += *w;
            }
            if !(sum > 0.0 && sum.is_finite()) {
                return Err(SsdsError::Normalization { vertex: v });
            }
            for w in weights.iter_mut() {
                *w /= sum;
            }
        }
        Ok(())
    }

    /// 展开为 V × B 的稠密矩阵（行优先）
    pub fn to_dense(&self, bone_count: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.vertex_count() * bone_count];
        for v in 0..self.vertex_count() {
            for (bone, w) in self.influences(v) {
                if bone < bone_count {
                    dense[v * bone_count + bone] += w;
                }
            }
        }
        dense
    }

    /// 截取一段顶点（多网格绑定时按网格拆分）
    pub fn slice_rows(&self, vertices: Range<usize>) -> Self {
        let k = self.max_influences;
        let range = vertices.start * k..vertices.end * k;
        Self {
            max_influences: k,
            indices: self.indices[range.clone()].to_vec(),
            weights: self.weights[range].to_vec(),
        }
    }

    /// 供并行求解按行写入
    pub(crate) fn slots_mut(&mut self) -> (&mut [i32], &mut [f64]) {
        (&mut self.indices, &mut self.weights)
    }

    fn row_range(&self, vertex: usize) -> Range<usize> {
        let start = vertex * self.max_influences;
        start..start + self.max_influences
    }
}

/// 把 (骨骼, 权重) 写入一行槽位，剩余槽位清空
pub(crate) fn write_row(indices: &mut [i32], weights: &mut [f64], entries: &[(usize, f64)]) {
    for slot in 0..indices.len() {
        match entries.get(slot) {
            Some(&(bone, w)) => {
                indices[slot] = bone as i32;
                weights[slot] = w;
            }
            None => {
                indices[slot] = -1;
                weights[slot] = 0.0;
            }
        }
    }
}
