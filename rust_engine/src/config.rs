//! 分解配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::{Result, SsdsError};

/// 骨骼变换类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TransformType {
    /// 旋转 + 平移
    #[default]
    Rigid,
    /// 任意 3x3 线性部分 + 平移
    Affine,
    /// 旋转 + 均匀缩放 + 平移
    RigidScale,
}

/// 分解配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct DecomposeConfig {
    // ========== 输出规模 ==========
    /// 请求的骨骼数量，默认 4（实际数量可能更少）
    pub bone_count: usize,
    /// 骨骼变换类型，默认 Rigid
    pub transform_type: TransformType,
    /// 每个顶点最多受几根骨骼影响，默认 4
    pub max_influences: usize,
    /// 外层迭代次数（权重 → 变换），默认 5
    pub iterations: usize,

    // ========== 权重求解 ==========
    /// 邻域平滑项系数，默认 1e-3
    /// 越大 → 权重越平滑，重建误差越大
    /// 非 0 时边界顶点的权重会被拉向邻居的平均值，即使初始解已经精确，
    /// 迭代后的重建误差也可能高于初始值；设为 0 时精确的初始解保持不变
    /// 且每次迭代的重建误差不会上升
    pub smoothness: f64,
    /// 单个顶点 QP 的最大迭代次数，默认 100
    pub weight_solver_iterations: usize,
    /// QP 收敛阈值（目标函数下降量），默认 1e-10
    pub weight_solver_tolerance: f64,

    // ========== 变换求解 ==========
    /// 骨骼在某帧的权重平方和低于此值时视为失去支撑，沿用上一帧变换，默认 1e-8
    pub min_bone_weight: f64,

    // ========== 初始聚类 ==========
    /// 种子局部刚体假设所用的邻域顶点数，默认 8
    pub seed_ring_size: usize,
    /// 最大残差低于 `此值 * 尺度²` 时停止选种（骨骼数减少），默认 1e-8
    pub seed_error_tolerance: f64,
    /// 生长结束后按刚体假设重新分配顶点的轮数，默认 3
    pub cluster_refinements: usize,

    // ========== 其他 ==========
    /// 分解前把静止姿态质心移到原点（结果会变换回原坐标），默认 true
    pub center_at_origin: bool,
    /// 并行线程数，0 表示使用 rayon 全局线程池，默认 0
    pub thread_count: usize,
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            bone_count: 4,
            transform_type: TransformType::Rigid,
            max_influences: 4,
            iterations: 5,

            // 平滑项相对于按尺度归一化后的数据项
            smoothness: 1e-3,
            weight_solver_iterations: 100,
            weight_solver_tolerance: 1e-10,

            min_bone_weight: 1e-8,

            seed_ring_size: 8,
            seed_error_tolerance: 1e-8,
            cluster_refinements: 3,

            center_at_origin: true,
            thread_count: 0,
        }
    }
}

impl DecomposeConfig {
    /// 校验参数
    pub fn validate(&self) -> Result<()> {
        if self.bone_count == 0 {
            return Err(SsdsError::Config("bone_count must be >= 1".to_string()));
        }
        if self.max_influences == 0 {
            return Err(SsdsError::Config("max_influences must be >= 1".to_string()));
        }
        if !(self.smoothness >= 0.0 && self.smoothness.is_finite()) {
            return Err(SsdsError::Config(format!(
                "smoothness must be a finite value >= 0, got {}",
                self.smoothness
            )));
        }
        if self.weight_solver_iterations == 0 {
            return Err(SsdsError::Config(
                "weight_solver_iterations must be >= 1".to_string(),
            ));
        }
        if !(self.weight_solver_tolerance >= 0.0) {
            return Err(SsdsError::Config(format!(
                "weight_solver_tolerance must be >= 0, got {}",
                self.weight_solver_tolerance
            )));
        }
        if !(self.min_bone_weight > 0.0) {
            return Err(SsdsError::Config(format!(
                "min_bone_weight must be > 0, got {}",
                self.min_bone_weight
            )));
        }
        if self.seed_ring_size == 0 {
            return Err(SsdsError::Config("seed_ring_size must be >= 1".to_string()));
        }
        if !(self.seed_error_tolerance >= 0.0) {
            return Err(SsdsError::Config(format!(
                "seed_error_tolerance must be >= 0, got {}",
                self.seed_error_tolerance
            )));
        }
        Ok(())
    }

    /// 每个顶点实际使用的权重槽数量 = min(K, B)
    pub fn effective_influences(&self, bone_count: usize) -> usize {
        self.max_influences.min(bone_count).max(1)
    }
}

/// 全局默认配置
static DECOMPOSE_CONFIG: Lazy<RwLock<DecomposeConfig>> =
    Lazy::new(|| RwLock::new(DecomposeConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> DecomposeConfig {
    match DECOMPOSE_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// 手动设置配置
pub fn set_config(config: DecomposeConfig) {
    match DECOMPOSE_CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(DecomposeConfig::default());
}
