//! 贪心刚体聚类初始化
//!
//! 1. 每个连通分量先取偏离平均位移最大的顶点作为种子
//! 2. 继续选种：取在所有已有种子的局部刚体假设下残差最大的顶点，
//!    残差足够小时提前停止（骨骼数少于请求值）
//! 3. 从种子出发按邻接多源广度优先生长，每个新顶点归入最能解释其轨迹的相邻簇
//! 4. 按刚体假设重新分配若干轮，最后用请求的变换类型拟合每个簇

use glam::DMat4;
use rayon::prelude::*;
use std::collections::BTreeSet;

use super::fit::{fit_transform, PointPair};
use crate::config::TransformType;
use crate::sample::topology::{connected_components, ring_neighborhood};
use crate::sample::ShapeSample;
use crate::skeleton::BoneTransforms;
use crate::skinning::SkinWeights;
use crate::{Result, SsdsError};

/// 初始聚类结果
#[derive(Clone, Debug)]
pub struct ClusterInit {
    pub requested_bone_count: usize,
    /// 每个簇的种子顶点
    pub seeds: Vec<usize>,
    /// 每个顶点所属的簇
    pub labels: Vec<usize>,
    /// 每个簇的逐帧变换
    pub transforms: BoneTransforms,
}

impl ClusterInit {
    /// 实际得到的骨骼数量
    pub fn bone_count(&self) -> usize {
        self.seeds.len()
    }

    /// 每个顶点一个权重 1.0 的初始蒙皮
    pub fn skin_weights(&self, max_influences: usize) -> SkinWeights {
        SkinWeights::from_labels(&self.labels, max_influences)
    }
}

/// 聚类初始化器
pub struct ClusterInitializer {
    pub transform_type: TransformType,
    /// 种子局部假设的邻域顶点数
    pub seed_ring_size: usize,
    /// 相对残差阈值（乘以尺度²）
    pub seed_error_tolerance: f64,
    /// 重新分配轮数
    pub refinements: usize,
}

/// 簇的逐帧刚体假设
type Hypothesis = Vec<DMat4>;

impl ClusterInitializer {
    pub fn run(&self, sample: &ShapeSample, requested: usize) -> Result<ClusterInit> {
        if requested == 0 {
            return Err(SsdsError::Config("bone_count must be >= 1".to_string()));
        }

        let components = connected_components(sample.neighbor_table());
        if components.len() > requested {
            return Err(SsdsError::DegenerateGeometry {
                vertex: components[requested][0],
                components: components.len(),
                bones: requested,
            });
        }

        // 每个连通分量一个种子
        let deviation = motion_deviation(sample);
        let mut seeds: Vec<usize> = components
            .iter()
            .filter_map(|component| argmax(component.iter().copied(), |v| deviation[v]))
            .collect();
        let mut hypotheses: Vec<Hypothesis> =
            seeds.iter().map(|&s| self.local_hypothesis(sample, s)).collect();

        let mut best_residual: Vec<f64> = (0..sample.vertex_count())
            .into_par_iter()
            .map(|v| {
                hypotheses
                    .iter()
                    .map(|h| residual(sample, h, v))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        // 继续选种，直到达到请求数量或运动已被完全解释
        let threshold = self.seed_error_tolerance * sample.scale_sq();
        while seeds.len() < requested {
            let Some(candidate) = argmax(
                (0..sample.vertex_count()).filter(|v| !seeds.contains(v)),
                |v| best_residual[v],
            ) else {
                log::warn!(
                    "每个顶点都已是种子，骨骼数从 {} 减少到 {}",
                    requested,
                    seeds.len()
                );
                break;
            };
            if best_residual[candidate] <= threshold {
                log::warn!(
                    "运动已被 {} 个簇完全解释，骨骼数从 {} 减少到 {}",
                    seeds.len(),
                    requested,
                    seeds.len()
                );
                break;
            }

            log::debug!(
                "新种子: 顶点 {} (残差 {:.3e})",
                candidate,
                best_residual[candidate]
            );
            let hypothesis = self.local_hypothesis(sample, candidate);
            best_residual
                .par_iter_mut()
                .enumerate()
                .for_each(|(v, best)| *best = best.min(residual(sample, &hypothesis, v)));
            seeds.push(candidate);
            hypotheses.push(hypothesis);
        }

        let mut labels = self.grow(sample, &seeds, hypotheses, components.len(), requested)?;
        self.refine(sample, &seeds, &mut labels);

        let transforms = fit_clusters(sample, &labels, seeds.len(), self.transform_type);

        log::debug!("初始聚类完成: {} 个簇, 种子 {:?}", seeds.len(), seeds);
        Ok(ClusterInit {
            requested_bone_count: requested,
            seeds,
            labels,
            transforms,
        })
    }

    /// 种子及其邻域的刚体假设
    fn local_hypothesis(&self, sample: &ShapeSample, seed: usize) -> Hypothesis {
        let ring = ring_neighborhood(sample.neighbor_table(), seed, self.seed_ring_size);
        fit_members(sample, &ring, TransformType::Rigid)
    }

    /// 多源广度优先生长
    fn grow(
        &self,
        sample: &ShapeSample,
        seeds: &[usize],
        mut hypotheses: Vec<Hypothesis>,
        component_count: usize,
        requested: usize,
    ) -> Result<Vec<usize>> {
        let vertex_count = sample.vertex_count();
        let mut labels: Vec<Option<usize>> = vec![None; vertex_count];
        let mut members: Vec<Vec<usize>> = seeds.iter().map(|&s| vec![s]).collect();
        for (c, &s) in seeds.iter().enumerate() {
            labels[s] = Some(c);
        }

        let mut newly: Vec<usize> = seeds.to_vec();
        let mut dirty = vec![false; seeds.len()];
        let mut round = 0;

        loop {
            // 成员足够多的簇用成员重新拟合假设
            let refits: Vec<(usize, Hypothesis)> = (0..seeds.len())
                .into_par_iter()
                .filter(|&c| dirty[c] && members[c].len() >= self.seed_ring_size)
                .map(|c| (c, fit_members(sample, &members[c], TransformType::Rigid)))
                .collect();
            for (c, h) in refits {
                hypotheses[c] = h;
            }

            let frontier: Vec<usize> = newly
                .iter()
                .flat_map(|&v| sample.neighbors(v).iter().copied())
                .filter(|&n| labels[n].is_none())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if frontier.is_empty() {
                break;
            }

            let decisions: Vec<usize> = frontier
                .par_iter()
                .map(|&v| {
                    let candidates: BTreeSet<usize> = sample
                        .neighbors(v)
                        .iter()
                        .filter_map(|&n| labels[n])
                        .collect();
                    argmin(candidates.into_iter(), |c| {
                        residual(sample, &hypotheses[c], v)
                    })
                })
                .collect();

            dirty.iter_mut().for_each(|d| *d = false);
            for (&v, &c) in frontier.iter().zip(&decisions) {
                labels[v] = Some(c);
                members[c].push(v);
                dirty[c] = true;
            }
            newly = frontier;
            round += 1;
        }

        log::debug!("簇生长完成: {} 轮", round);

        labels
            .iter()
            .enumerate()
            .map(|(v, label)| {
                label.ok_or(SsdsError::DegenerateGeometry {
                    vertex: v,
                    components: component_count,
                    bones: requested,
                })
            })
            .collect()
    }

    /// 按各簇刚体假设重新分配非种子顶点
    fn refine(&self, sample: &ShapeSample, seeds: &[usize], labels: &mut [usize]) {
        if seeds.len() < 2 {
            return;
        }
        // 残差需严格小于当前簇（带余量）才换簇
        let margin = 1e-14 * sample.scale_sq();
        for round in 0..self.refinements {
            let fitted = fit_clusters(sample, labels, seeds.len(), TransformType::Rigid);
            let hypotheses: Vec<Hypothesis> =
                (0..seeds.len()).map(|c| fitted.bone(c).to_vec()).collect();

            let current: &[usize] = labels;
            let reassigned: Vec<usize> = (0..sample.vertex_count())
                .into_par_iter()
                .map(|v| {
                    if let Some(c) = seeds.iter().position(|&s| s == v) {
                        return c;
                    }
                    let own = current[v];
                    let best = argmin(0..seeds.len(), |c| residual(sample, &hypotheses[c], v));
                    let own_residual = residual(sample, &hypotheses[own], v);
                    let best_residual = residual(sample, &hypotheses[best], v);
                    if best_residual < own_residual * (1.0 - 1e-9) - margin {
                        best
                    } else {
                        own
                    }
                })
                .collect();

            let changed = reassigned
                .iter()
                .zip(labels.iter())
                .filter(|(a, b)| a != b)
                .count();
            labels.copy_from_slice(&reassigned);
            log::debug!("重新分配第 {} 轮: {} 个顶点改变", round + 1, changed);
            if changed == 0 {
                break;
            }
        }
    }
}

/// 每个顶点偏离平均位移的程度：Σ_t ‖(p_v(t) − r_v) − m(t)‖²
fn motion_deviation(sample: &ShapeSample) -> Vec<f64> {
    let vertex_count = sample.vertex_count();
    let mean_displacement: Vec<glam::DVec3> = (0..sample.frame_count())
        .map(|t| {
            sample
                .frame(t)
                .iter()
                .zip(sample.rest_positions())
                .fold(glam::DVec3::ZERO, |acc, (p, r)| acc + (*p - *r))
                / vertex_count as f64
        })
        .collect();

    (0..vertex_count)
        .into_par_iter()
        .map(|v| {
            let rest = sample.rest_position(v);
            mean_displacement
                .iter()
                .enumerate()
                .map(|(t, m)| ((sample.position(t, v) - rest) - *m).length_squared())
                .sum()
        })
        .collect()
}

/// 顶点在某个假设下的逐帧平均残差
fn residual(sample: &ShapeSample, hypothesis: &[DMat4], v: usize) -> f64 {
    let rest = sample.rest_position(v);
    let total: f64 = hypothesis
        .iter()
        .enumerate()
        .map(|(t, m)| m.transform_point3(rest).distance_squared(sample.position(t, v)))
        .sum();
    total / hypothesis.len().max(1) as f64
}

/// 用硬权重（全 1）拟合一组顶点的逐帧变换
fn fit_members(sample: &ShapeSample, members: &[usize], kind: TransformType) -> Hypothesis {
    (0..sample.frame_count())
        .map(|t| fit_frame(sample, members, kind, t).unwrap_or(DMat4::IDENTITY))
        .collect()
}

fn fit_frame(sample: &ShapeSample, members: &[usize], kind: TransformType, frame: usize) -> Option<DMat4> {
    let observed = sample.frame(frame);
    let pairs: Vec<PointPair> = members
        .iter()
        .map(|&v| PointPair {
            rest: sample.rest_position(v),
            target: observed[v],
            weight: 1.0,
        })
        .collect();
    fit_transform(kind, &pairs)
}

/// 按标签拟合每个簇每一帧的变换（并行）
fn fit_clusters(
    sample: &ShapeSample,
    labels: &[usize],
    cluster_count: usize,
    kind: TransformType,
) -> BoneTransforms {
    let mut members = vec![Vec::new(); cluster_count];
    for (v, &c) in labels.iter().enumerate() {
        members[c].push(v);
    }

    let frame_count = sample.frame_count();
    let matrices: Vec<DMat4> = (0..cluster_count * frame_count)
        .into_par_iter()
        .map(|slot| {
            let c = slot / frame_count;
            let t = slot % frame_count;
            fit_frame(sample, &members[c], kind, t).unwrap_or(DMat4::IDENTITY)
        })
        .collect();

    BoneTransforms::from_matrices(cluster_count, frame_count, matrices)
}

/// 最大值对应的元素，相同时取先出现的；没有元素时返回 `None`
fn argmax(items: impl Iterator<Item = usize>, key: impl Fn(usize) -> f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for item in items {
        let value = key(item);
        match best {
            Some((_, current)) if !(value > current) => {}
            _ => best = Some((item, value)),
        }
    }
    best.map(|(item, _)| item)
}

/// 最小值对应的元素，相同时取先出现的
fn argmin(items: impl Iterator<Item = usize>, key: impl Fn(usize) -> f64) -> usize {
    let mut best: Option<(usize, f64)> = None;
    for item in items {
        let value = key(item);
        match best {
            Some((_, current)) if !(value < current) => {}
            _ => best = Some((item, value)),
        }
    }
    best.map_or(0, |(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::fixtures::{
        cube_vertices, jointed_bar, max_abs_diff, rotating_cube, translating_cube,
    };
    use crate::sample::neighbors_from_triangles;
    use glam::DVec3;

    fn initializer() -> ClusterInitializer {
        ClusterInitializer {
            transform_type: TransformType::Rigid,
            seed_ring_size: 8,
            seed_error_tolerance: 1e-8,
            refinements: 3,
        }
    }

    #[test]
    fn test_argmax_ties_take_first() {
        assert_eq!(argmax([3, 1, 2].into_iter(), |_| 1.0), Some(3));
        assert_eq!(argmax(std::iter::empty(), |_| 1.0), None);
        assert_eq!(argmin([2, 0, 1].into_iter(), |i| (i % 2) as f64), 2);
    }

    #[test]
    fn test_single_rigid_cube() {
        let (sample, rotation) = rotating_cube();
        let init = initializer().run(&sample, 1).unwrap();
        assert_eq!(init.bone_count(), 1);
        assert!(init.labels.iter().all(|&l| l == 0));
        assert!(max_abs_diff(&init.transforms.get(0, 1), &rotation) < 1e-9);
    }

    #[test]
    fn test_identical_motion_reduces_bone_count() {
        let sample = translating_cube(4);
        let init = initializer().run(&sample, 3).unwrap();
        assert!(init.bone_count() < 3);
        assert_eq!(init.bone_count(), 1);
        assert_eq!(init.requested_bone_count, 3);
    }

    /// 三个顶点的三角形做非刚体拉伸
    fn stretching_triangle() -> ShapeSample {
        let rest = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
        let frames = (0..3)
            .map(|t| {
                let stretch = DVec3::new(1.0 + 0.5 * t as f64, 1.0 - 0.3 * t as f64, 1.0);
                rest.iter().map(|p| *p * stretch).collect()
            })
            .collect();
        let neighbors = neighbors_from_triangles(3, &[[0, 1, 2]]);
        ShapeSample::new(rest, frames, neighbors).unwrap()
    }

    #[test]
    fn test_more_bones_than_vertices() {
        let sample = stretching_triangle();
        let init = initializer().run(&sample, 5).unwrap();
        assert_eq!(init.bone_count(), 3);

        let mut seeds = init.seeds.clone();
        seeds.sort_unstable();
        assert_eq!(seeds, vec![0, 1, 2]);
        for (c, &s) in init.seeds.iter().enumerate() {
            assert_eq!(init.labels[s], c);
        }
        assert_eq!(init.transforms.bone_count(), 3);
    }

    #[test]
    fn test_never_more_than_requested() {
        let bar = jointed_bar();
        for requested in 1..=4 {
            let init = initializer().run(&bar.sample, requested).unwrap();
            assert!(init.bone_count() <= requested);
            assert!(init.labels.iter().all(|&l| l < init.bone_count()));
        }
    }

    #[test]
    fn test_bar_splits_at_bridge() {
        let bar = jointed_bar();
        let init = initializer().run(&bar.sample, 2).unwrap();
        assert_eq!(init.bone_count(), 2);

        let right_label = init.labels[bar.right_side.iter().rposition(|r| *r).unwrap()];
        let misclassified = init
            .labels
            .iter()
            .zip(&bar.right_side)
            .filter(|(label, right)| (**label == right_label) != **right)
            .count();
        assert!(misclassified <= 2, "{} misclassified", misclassified);
    }

    #[test]
    fn test_disconnected_components_each_seeded() {
        let (rest, triangles) = cube_vertices();
        let mut all_rest = rest.clone();
        all_rest.extend(rest.iter().map(|p| *p + DVec3::new(5.0, 0.0, 0.0)));
        let mut all_triangles = triangles.clone();
        all_triangles.extend(triangles.iter().map(|t| t.map(|i| i + 8)));
        let neighbors = neighbors_from_triangles(16, &all_triangles);
        let moved: Vec<DVec3> = all_rest.iter().map(|p| *p + DVec3::Y).collect();
        let sample = ShapeSample::from_frames(vec![all_rest, moved], neighbors).unwrap();

        // 两个分量、同样的运动：每个分量一个骨骼
        let init = initializer().run(&sample, 4).unwrap();
        assert_eq!(init.bone_count(), 2);
        assert!(init.labels[..8].iter().all(|&l| l == init.labels[0]));
        assert!(init.labels[8..].iter().all(|&l| l == init.labels[8]));
        assert_ne!(init.labels[0], init.labels[8]);

        // 骨骼数不足以覆盖所有分量
        let err = initializer().run(&sample, 1).unwrap_err();
        assert!(matches!(
            err,
            SsdsError::DegenerateGeometry {
                vertex: 8,
                components: 2,
                bones: 1
            }
        ));
    }
}
