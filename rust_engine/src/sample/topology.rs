//! 网格拓扑：邻接表与连通分量

use std::collections::{BTreeSet, VecDeque};

/// 由三角形列表构建顶点邻接表
///
/// 每个三角形的三个顶点两两互为邻居，结果按索引升序且保证对称。
/// 越界索引会被忽略。
pub fn neighbors_from_triangles(vertex_count: usize, triangles: &[[u32; 3]]) -> Vec<Vec<usize>> {
    let mut sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); vertex_count];

    for tri in triangles {
        let [i0, i1, i2] = tri.map(|i| i as usize);
        if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
            continue;
        }
        for (a, b) in [(i0, i1), (i0, i2), (i1, i2)] {
            if a != b {
                sets[a].insert(b);
                sets[b].insert(a);
            }
        }
    }

    sets.into_iter().map(|s| s.into_iter().collect()).collect()
}

/// 补全邻接关系的对称性，去重并排序
pub fn symmetrize(neighbors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); neighbors.len()];
    for (v, list) in neighbors.iter().enumerate() {
        for &n in list {
            if n != v && n < neighbors.len() {
                sets[v].insert(n);
                sets[n].insert(v);
            }
        }
    }
    sets.into_iter().map(|s| s.into_iter().collect()).collect()
}

/// 计算连通分量
///
/// 分量按其最小顶点索引排序，分量内顶点升序。
pub fn connected_components(neighbors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let vertex_count = neighbors.len();
    let mut visited = vec![false; vertex_count];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..vertex_count {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let mut component = Vec::new();
        while let Some(v) = queue.pop_front() {
            component.push(v);
            for &n in &neighbors[v] {
                if !visited[n] {
                    visited[n] = true;
                    queue.push_back(n);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }

    components
}

/// 从 `seed` 出发按广度优先收集最多 `limit` 个顶点（包含种子本身）
pub fn ring_neighborhood(neighbors: &[Vec<usize>], seed: usize, limit: usize) -> Vec<usize> {
    let mut visited = BTreeSet::new();
    let mut ring = Vec::with_capacity(limit);
    let mut queue = VecDeque::new();

    visited.insert(seed);
    queue.push_back(seed);

    while let Some(v) = queue.pop_front() {
        if ring.len() >= limit {
            break;
        }
        ring.push(v);
        for &n in &neighbors[v] {
            if visited.insert(n) {
                queue.push_back(n);
            }
        }
    }

    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_symmetric() {
        let tris = [[0, 1, 2], [2, 1, 3]];
        let n = neighbors_from_triangles(4, &tris);
        assert_eq!(n[0], vec![1, 2]);
        assert_eq!(n[1], vec![0, 2, 3]);
        assert_eq!(n[3], vec![1, 2]);
        for (v, list) in n.iter().enumerate() {
            for &u in list {
                assert!(n[u].contains(&v));
            }
        }
    }

    #[test]
    fn test_out_of_range_triangle_ignored() {
        let n = neighbors_from_triangles(3, &[[0, 1, 7]]);
        assert!(n.iter().all(|l| l.is_empty()));
    }

    #[test]
    fn test_symmetrize() {
        let n = symmetrize(&[vec![1, 1], vec![], vec![0]]);
        assert_eq!(n, vec![vec![1, 2], vec![0], vec![0]]);
    }

    #[test]
    fn test_components() {
        let n = neighbors_from_triangles(6, &[[0, 1, 2], [3, 4, 5]]);
        let c = connected_components(&n);
        assert_eq!(c, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_isolated_vertex_is_own_component() {
        let n = neighbors_from_triangles(4, &[[0, 1, 2]]);
        let c = connected_components(&n);
        assert_eq!(c.len(), 2);
        assert_eq!(c[1], vec![3]);
    }

    #[test]
    fn test_ring_neighborhood_limit() {
        // 0-1-2-3-4 链
        let n = vec![vec![1], vec![0, 2], vec![1, 3], vec![2, 4], vec![3]];
        assert_eq!(ring_neighborhood(&n, 2, 3), vec![2, 1, 3]);
        assert_eq!(ring_neighborhood(&n, 0, 10), vec![0, 1, 2, 3, 4]);
    }
}
