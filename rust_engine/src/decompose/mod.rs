//! 分解驱动：初始聚类 → 固定次数的（权重 → 变换）交替优化 → 权重清理

use glam::DVec3;

pub use crate::solver::DegenerateBone;

use crate::config::{get_config, DecomposeConfig, TransformType};
use crate::sample::ShapeSample;
use crate::skeleton::{BoneTransforms, SkinJoint};
use crate::skinning::{compute_skinning, reconstruction_error, SkinWeights, SkinningInput};
use crate::solver::{ClusterInitializer, TransformSolver, WeightSolver};
use crate::{Result, SsdsError};

/// 分解结果
#[derive(Clone, Debug)]
pub struct Decomposition {
    pub requested_bone_count: usize,
    /// 实际骨骼数量（≤ 请求值）
    pub bone_count: usize,
    pub transform_type: TransformType,
    /// 清理后的权重：非负、每行和为 1、最多 K 个非零
    pub skin_weights: SkinWeights,
    /// 每根骨骼每帧的变换（调用方坐标系）
    pub bone_transforms: BoneTransforms,
    /// 实际执行的外层迭代次数
    pub iterations: usize,
    /// 初始化后以及每次迭代后的重建误差（共 N + 1 个）
    pub iteration_errors: Vec<f64>,
    /// 最终清理后的重建误差
    pub final_error: f64,
    /// 迭代过程中失去支撑的 (骨骼, 帧)
    pub degenerate_bones: Vec<DegenerateBone>,
    /// 分解时使用的坐标原点（静止姿态质心或零）
    pub origin: DVec3,
}

impl Decomposition {
    /// 骨骼数是否少于请求值
    pub fn is_reduced(&self) -> bool {
        self.bone_count < self.requested_bone_count
    }

    /// 为每根骨骼创建输出关节
    pub fn joints(&self, sample: &ShapeSample) -> Vec<SkinJoint> {
        SkinJoint::from_weights(&self.skin_weights, sample.rest_positions(), self.bone_count)
    }

    /// 用分解结果重建第 `frame` 帧
    pub fn reconstruct_frame(&self, sample: &ShapeSample, frame: usize) -> Vec<DVec3> {
        let matrices = self.bone_transforms.frame_matrices(frame);
        compute_skinning(&SkinningInput {
            positions: sample.rest_positions(),
            weights: &self.skin_weights,
            bone_matrices: &matrices,
        })
    }

    /// V × B 稠密权重
    pub fn dense_weights(&self) -> Vec<f64> {
        self.skin_weights.to_dense(self.bone_count)
    }
}

/// 分解器
pub struct Decomposer {
    config: DecomposeConfig,
}

impl Decomposer {
    pub fn new(config: DecomposeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 使用全局配置
    pub fn from_global_config() -> Result<Self> {
        Self::new(get_config())
    }

    pub fn config(&self) -> &DecomposeConfig {
        &self.config
    }

    /// 执行分解
    pub fn decompose(&self, sample: &ShapeSample) -> Result<Decomposition> {
        if self.config.thread_count == 0 {
            return self.run(sample);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.thread_count)
            .build()
            .map_err(|e| SsdsError::Config(format!("thread pool: {e}")))?;
        pool.install(|| self.run(sample))
    }

    fn run(&self, sample: &ShapeSample) -> Result<Decomposition> {
        let config = &self.config;
        log::info!(
            "SSDS: {} 个顶点, {} 帧, 请求 {} 个骨骼, 变换类型 {:?}, 最大影响数 {}",
            sample.vertex_count(),
            sample.frame_count(),
            config.bone_count,
            config.transform_type,
            config.max_influences
        );

        // 质心移到原点
        let origin = if config.center_at_origin {
            sample.center_of_mass()
        } else {
            DVec3::ZERO
        };
        let centered;
        let work = if config.center_at_origin {
            centered = sample.translated(-origin);
            &centered
        } else {
            sample
        };

        let init = ClusterInitializer {
            transform_type: config.transform_type,
            seed_ring_size: config.seed_ring_size,
            seed_error_tolerance: config.seed_error_tolerance,
            refinements: config.cluster_refinements,
        }
        .run(work, config.bone_count)?;

        let bone_count = init.bone_count();
        if bone_count < config.bone_count {
            log::warn!(
                "骨骼数少于请求值: {} < {}",
                bone_count,
                config.bone_count
            );
        }

        let influences = config.effective_influences(bone_count);
        let mut weights = init.skin_weights(influences);
        let mut transforms = init.transforms;

        let (iteration_errors, degenerate_bones) =
            self.alternate(work, &mut weights, &mut transforms);

        weights.normalize()?;
        let final_error = reconstruction_error(work, &weights, &transforms);

        if config.center_at_origin {
            transforms.conjugate_translation(origin);
        }

        log::info!(
            "SSDS 完成: {} 个骨骼, 最终重建误差 {:.6e}",
            bone_count,
            final_error
        );

        Ok(Decomposition {
            requested_bone_count: config.bone_count,
            bone_count,
            transform_type: config.transform_type,
            skin_weights: weights,
            bone_transforms: transforms,
            iterations: config.iterations,
            iteration_errors,
            final_error,
            degenerate_bones,
            origin,
        })
    }

    /// 固定次数的（权重 → 变换）交替优化
    ///
    /// 返回初始以及每次迭代后的重建误差，和失去支撑的 (骨骼, 帧)。
    fn alternate(
        &self,
        sample: &ShapeSample,
        weights: &mut SkinWeights,
        transforms: &mut BoneTransforms,
    ) -> (Vec<f64>, Vec<DegenerateBone>) {
        let config = &self.config;
        let weight_solver = WeightSolver {
            smoothness: config.smoothness,
            max_iterations: config.weight_solver_iterations,
            tolerance: config.weight_solver_tolerance,
        };
        let transform_solver = TransformSolver {
            transform_type: config.transform_type,
            min_bone_weight: config.min_bone_weight,
        };

        let mut iteration_errors = Vec::with_capacity(config.iterations + 1);
        iteration_errors.push(reconstruction_error(sample, weights, transforms));
        let mut degenerate_bones = Vec::new();

        for iteration in 0..config.iterations {
            *weights = weight_solver.update(sample, transforms, weights);
            degenerate_bones.extend(transform_solver.update(sample, weights, transforms));

            let error = reconstruction_error(sample, weights, transforms);
            log::info!("Iteration #{}: 重建误差 {:.6e}", iteration + 1, error);
            iteration_errors.push(error);
        }

        (iteration_errors, degenerate_bones)
    }
}
