//! 测试用合成几何

use glam::{DMat4, DQuat, DVec3};
use std::collections::HashMap;

use super::{neighbors_from_triangles, ShapeSample};

/// 以原点为中心、边长 2 的立方体（8 顶点，12 三角形）
pub fn cube_vertices() -> (Vec<DVec3>, Vec<[u32; 3]>) {
    let vertices = (0..8u32)
        .map(|i| {
            DVec3::new(
                (i & 1) as f64 * 2.0 - 1.0,
                ((i >> 1) & 1) as f64 * 2.0 - 1.0,
                ((i >> 2) & 1) as f64 * 2.0 - 1.0,
            )
        })
        .collect();
    let quads: [[u32; 4]; 6] = [
        [0, 1, 3, 2],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 3, 7, 6],
        [0, 2, 6, 4],
        [1, 3, 7, 5],
    ];
    let triangles = quads
        .iter()
        .flat_map(|[a, b, c, d]| [[*a, *b, *c], [*a, *c, *d]])
        .collect();
    (vertices, triangles)
}

/// 立方体在两帧内绕 Z 轴旋转 90°
pub fn rotating_cube() -> (ShapeSample, DMat4) {
    let (rest, triangles) = cube_vertices();
    let rotation = DMat4::from_rotation_z(std::f64::consts::FRAC_PI_2);
    let moved = rest.iter().map(|p| rotation.transform_point3(*p)).collect();
    let neighbors = neighbors_from_triangles(rest.len(), &triangles);
    let sample = ShapeSample::from_frames(vec![rest, moved], neighbors).unwrap();
    (sample, rotation)
}

/// 所有顶点做完全相同的平移
pub fn translating_cube(frames: usize) -> ShapeSample {
    let (rest, triangles) = cube_vertices();
    let neighbors = neighbors_from_triangles(rest.len(), &triangles);
    let frames = (0..frames)
        .map(|t| {
            let offset = DVec3::new(t as f64 * 0.5, 0.2 * t as f64, -0.1 * t as f64);
            rest.iter().map(|p| *p + offset).collect()
        })
        .collect();
    ShapeSample::from_frames(frames, neighbors).unwrap()
}

/// 由细桥连接的两段刚体
pub struct JointedBar {
    pub sample: ShapeSample,
    /// 每个顶点是否属于右半段
    pub right_side: Vec<bool>,
    /// 左半段逐帧真实变换
    pub left_motion: Vec<DMat4>,
    /// 右半段逐帧真实变换
    pub right_motion: Vec<DMat4>,
}

/// 沿 X 轴的格点棒：x ∈ [0, 12)，截面 3x3；x = 5, 6 两列只保留中心线作为细桥
///
/// 左半段（x ≤ 5）绕自身长轴（X）旋转，右半段（x ≥ 6）绕过 (5.5, 1, 1) 的 Y 轴旋转。
pub fn jointed_bar() -> JointedBar {
    let mut points = Vec::new();
    let mut index = HashMap::new();
    for x in 0..12i32 {
        for y in 0..3i32 {
            for z in 0..3i32 {
                let bridge = x == 5 || x == 6;
                if bridge && (y != 1 || z != 1) {
                    continue;
                }
                index.insert((x, y, z), points.len());
                points.push((x, y, z));
            }
        }
    }

    let mut neighbors = vec![Vec::new(); points.len()];
    for (i, &(x, y, z)) in points.iter().enumerate() {
        for (dx, dy, dz) in [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ] {
            if let Some(&j) = index.get(&(x + dx, y + dy, z + dz)) {
                neighbors[i].push(j);
            }
        }
    }

    let rest: Vec<DVec3> = points
        .iter()
        .map(|&(x, y, z)| DVec3::new(x as f64, y as f64, z as f64))
        .collect();
    let right_side: Vec<bool> = points.iter().map(|&(x, _, _)| x >= 6).collect();

    let left_axis = DVec3::new(0.0, 1.0, 1.0);
    let right_pivot = DVec3::new(5.5, 1.0, 1.0);
    let about = |pivot: DVec3, rotation: DQuat| {
        DMat4::from_translation(pivot)
            * DMat4::from_quat(rotation)
            * DMat4::from_translation(-pivot)
    };

    let frame_count = 4;
    let left_motion: Vec<DMat4> = (0..frame_count)
        .map(|t| about(left_axis, DQuat::from_rotation_x(0.35 * t as f64)))
        .collect();
    let right_motion: Vec<DMat4> = (0..frame_count)
        .map(|t| about(right_pivot, DQuat::from_rotation_y(0.5 * t as f64)))
        .collect();

    let frames = (0..frame_count)
        .map(|t| {
            rest.iter()
                .zip(&right_side)
                .map(|(p, &right)| {
                    let m = if right {
                        right_motion[t]
                    } else {
                        left_motion[t]
                    };
                    m.transform_point3(*p)
                })
                .collect()
        })
        .collect();

    JointedBar {
        sample: ShapeSample::new(rest, frames, neighbors).unwrap(),
        right_side,
        left_motion,
        right_motion,
    }
}

/// 两个矩阵逐元素最大差
pub fn max_abs_diff(a: &DMat4, b: &DMat4) -> f64 {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
