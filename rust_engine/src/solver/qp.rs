//! 单纯形约束二次规划
//!
//! min ½ wᵀQw − cᵀw，s.t. w ≥ 0，Σw = 1

use nalgebra::{DMatrix, DVector};

/// 修正解中可视为 0 的负值下限
const POLISH_NEGATIVE_TOLERANCE: f64 = 1e-9;

/// 二次规划问题（Q 对称半正定）
pub struct SimplexQp<'a> {
    pub q: &'a DMatrix<f64>,
    pub c: &'a DVector<f64>,
}

impl SimplexQp<'_> {
    pub fn objective(&self, w: &DVector<f64>) -> f64 {
        0.5 * w.dot(&(self.q * w)) - self.c.dot(w)
    }

    /// 投影梯度法求解，随后在支撑集上做一次精确的等式约束修正
    ///
    /// `start` 会先投影到单纯形上。始终返回迭代中目标值最小的可行点，
    /// 因此结果不会比起点更差。
    pub fn solve(&self, start: &DVector<f64>, max_iterations: usize, tolerance: f64) -> DVector<f64> {
        let n = self.c.len();
        if n == 1 {
            return DVector::from_element(1, 1.0);
        }

        // 步长 1/L，L 取 Gershgorin 上界
        let lipschitz = (0..n)
            .map(|i| self.q.row(i).iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max);
        let step = if lipschitz > 0.0 { 1.0 / lipschitz } else { 1.0 };

        let mut w = project_to_simplex(start);
        let mut value = self.objective(&w);
        let mut best = w.clone();
        let mut best_value = value;

        for _ in 0..max_iterations {
            let gradient = self.q * &w - self.c;
            let next = project_to_simplex(&(&w - gradient * step));
            let next_value = self.objective(&next);

            let improvement = value - next_value;
            w = next;
            value = next_value;
            if value < best_value {
                best_value = value;
                best.copy_from(&w);
            }
            if improvement.abs() <= tolerance {
                break;
            }
        }

        if let Some(polished) = self.polish(&best) {
            if self.objective(&polished) < best_value {
                return polished;
            }
        }
        best
    }

    /// 在当前支撑集上解 KKT 方程：[Q_SS 1; 1ᵀ 0][w; μ] = [c_S; 1]
    ///
    /// 舍入误差范围内的负值截断为 0 后重新归一化；明显为负时返回 `None`。
    fn polish(&self, w: &DVector<f64>) -> Option<DVector<f64>> {
        let support: Vec<usize> = (0..w.len()).filter(|&i| w[i] > 0.0).collect();
        let m = support.len();
        if m == 0 {
            return None;
        }

        let mut kkt = DMatrix::zeros(m + 1, m + 1);
        let mut rhs = DVector::zeros(m + 1);
        for (a, &i) in support.iter().enumerate() {
            for (b, &j) in support.iter().enumerate() {
                kkt[(a, b)] = self.q[(i, j)];
            }
            kkt[(a, m)] = 1.0;
            kkt[(m, a)] = 1.0;
            rhs[a] = self.c[i];
        }
        rhs[m] = 1.0;

        let solution = kkt.lu().solve(&rhs)?;
        let mut result = DVector::zeros(w.len());
        for (a, &i) in support.iter().enumerate() {
            let value = solution[a];
            if !value.is_finite() || value < -POLISH_NEGATIVE_TOLERANCE {
                return None;
            }
            result[i] = value.max(0.0);
        }
        let sum = result.sum();
        if !(sum > 0.0) {
            return None;
        }
        Some(result / sum)
    }
}

/// 欧氏投影到概率单纯形 {w ≥ 0, Σw = 1}
pub fn project_to_simplex(v: &DVector<f64>) -> DVector<f64> {
    let n = v.len();
    if n == 0 {
        return v.clone();
    }
    let sanitized: Vec<f64> = v
        .iter()
        .map(|x| if x.is_finite() { *x } else { 0.0 })
        .collect();

    let mut sorted = sanitized.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (i + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    DVector::from_iterator(n, sanitized.iter().map(|x| (x - theta).max(0.0)))
}
