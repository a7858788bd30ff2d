//! 骨骼逐帧变换存储（B × T 稠密数组）

use glam::DMat4;

/// 每根骨骼每一帧的 4x4 变换
///
/// 变换把静止姿态位置映射到该帧位置：`p(t) = M(b, t) * rest`。
/// 按 `bone * frame_count + frame` 线性存储。
#[derive(Clone, Debug)]
pub struct BoneTransforms {
    bone_count: usize,
    frame_count: usize,
    matrices: Vec<DMat4>,
}

impl BoneTransforms {
    /// 全部初始化为单位矩阵
    pub fn identity(bone_count: usize, frame_count: usize) -> Self {
        Self {
            bone_count,
            frame_count,
            matrices: vec![DMat4::IDENTITY; bone_count * frame_count],
        }
    }

    /// 从按骨骼优先排列的矩阵创建
    pub(crate) fn from_matrices(bone_count: usize, frame_count: usize, matrices: Vec<DMat4>) -> Self {
        debug_assert_eq!(matrices.len(), bone_count * frame_count);
        Self {
            bone_count,
            frame_count,
            matrices,
        }
    }

    pub fn bone_count(&self) -> usize {
        self.bone_count
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn get(&self, bone: usize, frame: usize) -> DMat4 {
        self.matrices[bone * self.frame_count + frame]
    }

    pub fn set(&mut self, bone: usize, frame: usize, matrix: DMat4) {
        self.matrices[bone * self.frame_count + frame] = matrix;
    }

    /// 某根骨骼的全部帧
    pub fn bone(&self, bone: usize) -> &[DMat4] {
        let start = bone * self.frame_count;
        &self.matrices[start..start + self.frame_count]
    }

    /// 某一帧全部骨骼的矩阵（蒙皮输入）
    pub fn frame_matrices(&self, frame: usize) -> Vec<DMat4> {
        (0..self.bone_count).map(|b| self.get(b, frame)).collect()
    }

    /// 坐标系平移 `offset` 后的等价变换：`Tr(offset) * M * Tr(-offset)`
    pub fn conjugate_translation(&mut self, offset: glam::DVec3) {
        let to = DMat4::from_translation(offset);
        let from = DMat4::from_translation(-offset);
        for m in &mut self.matrices {
            *m = to * *m * from;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_layout() {
        let mut t = BoneTransforms::identity(2, 3);
        let m = DMat4::from_translation(DVec3::X);
        t.set(1, 2, m);
        assert_eq!(t.get(1, 2), m);
        assert_eq!(t.bone(1)[2], m);
        assert_eq!(t.frame_matrices(2), vec![DMat4::IDENTITY, m]);
    }

    #[test]
    fn test_conjugate_translation() {
        let mut t = BoneTransforms::identity(1, 1);
        t.set(0, 0, DMat4::from_rotation_z(std::f64::consts::FRAC_PI_2));
        let c = DVec3::new(1.0, 0.0, 0.0);
        t.conjugate_translation(c);
        // 绕 (1,0,0) 旋转 90°：(2,0,0) → (1,1,0)
        let p = t.get(0, 0).transform_point3(DVec3::new(2.0, 0.0, 0.0));
        assert!(p.distance(DVec3::new(1.0, 1.0, 0.0)) < 1e-12);
    }
}
