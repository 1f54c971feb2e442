// crates/cdo_sles/src/amg.rs

//! 聚合型代数多重网格
//!
//! 分层构建：
//! 1. 强连接: |a_ij| ≥ θ √(|a_ii a_jj|)
//! 2. 贪心聚合，分段常数插值 P
//! 3. Galerkin 粗网格算子 A_c = Pᵀ A P
//!
//! 每层使用 Jacobi（可选一阶多项式）或 Gauss-Seidel 光滑，最粗层用 PCG 求解。
//! [`AmgSolver`] 以 V 循环为迭代，[`AmgPreconditioner`] 每次作用一个 V 循环。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::csr::{CsrBuilder, CsrMatrix};
use crate::operator::LinearOperator;
use crate::preconditioner::{JacobiPreconditioner, Preconditioner};
use crate::solver::{
    ConvergencePlot, ConvergenceState, IterativeSolver, PcgSolver, SolveControl, SolverResult,
};
use crate::vector_ops::{norm2, residual};

// =============================================================================
// 配置
// =============================================================================

/// 光滑器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmootherKind {
    /// (阻尼) Jacobi
    Jacobi,
    /// Gauss-Seidel（下行前向扫描，上行后向扫描）
    GaussSeidel,
}

/// 最粗层求解器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarseSolverKind {
    /// Jacobi 预条件 CG
    Pcg,
}

/// AMG 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmgConfig {
    /// 下行光滑器
    #[serde(default = "default_smoother")]
    pub descent_smoother: SmootherKind,
    /// 上行光滑器
    #[serde(default = "default_smoother")]
    pub ascent_smoother: SmootherKind,
    /// 下行光滑次数
    #[serde(default = "default_sweeps")]
    pub n_descent_sweeps: usize,
    /// 上行光滑次数
    #[serde(default = "default_sweeps")]
    pub n_ascent_sweeps: usize,
    /// Jacobi 松弛因子
    #[serde(default = "default_relaxation")]
    pub jacobi_relaxation: f64,
    /// 光滑器多项式预条件阶数（0 即纯对角）
    #[serde(default)]
    pub poly_degree: u8,
    /// 最粗层求解器
    #[serde(default = "default_coarse_solver")]
    pub coarse_solver: CoarseSolverKind,
    /// 最粗层最大迭代次数
    #[serde(default = "default_coarse_max_iter")]
    pub coarse_max_iter: usize,
    /// 最粗层相对精度
    #[serde(default = "default_coarse_rtol")]
    pub coarse_rtol: f64,
    /// 最粗层精度乘子
    #[serde(default = "default_precision_mult")]
    pub coarse_precision_mult: f64,
    /// 强连接阈值 θ
    #[serde(default = "default_strong_threshold")]
    pub strong_threshold: f64,
    /// 最大层数
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,
    /// 行数不超过该值时停止粗化
    #[serde(default = "default_coarse_min_rows")]
    pub coarse_min_rows: usize,
}

fn default_smoother() -> SmootherKind {
    SmootherKind::Jacobi
}
fn default_sweeps() -> usize {
    5
}
fn default_relaxation() -> f64 {
    2.0 / 3.0
}
fn default_coarse_solver() -> CoarseSolverKind {
    CoarseSolverKind::Pcg
}
fn default_coarse_max_iter() -> usize {
    1000
}
fn default_coarse_rtol() -> f64 {
    1e-10
}
fn default_precision_mult() -> f64 {
    1.0
}
fn default_strong_threshold() -> f64 {
    0.25
}
fn default_max_levels() -> usize {
    15
}
fn default_coarse_min_rows() -> usize {
    40
}

impl Default for AmgConfig {
    fn default() -> Self {
        Self {
            descent_smoother: default_smoother(),
            ascent_smoother: default_smoother(),
            n_descent_sweeps: default_sweeps(),
            n_ascent_sweeps: default_sweeps(),
            jacobi_relaxation: default_relaxation(),
            poly_degree: 0,
            coarse_solver: default_coarse_solver(),
            coarse_max_iter: default_coarse_max_iter(),
            coarse_rtol: default_coarse_rtol(),
            coarse_precision_mult: default_precision_mult(),
            strong_threshold: default_strong_threshold(),
            max_levels: default_max_levels(),
            coarse_min_rows: default_coarse_min_rows(),
        }
    }
}

// =============================================================================
// 层次结构
// =============================================================================

#[derive(Debug, Clone)]
struct Level {
    a: CsrMatrix,
    inv_diag: Vec<f64>,
    /// 细网格行 -> 粗网格聚合编号（最粗层为空）
    aggregate: Vec<usize>,
    n_coarse: usize,
}

/// AMG 层次结构
#[derive(Debug, Clone)]
pub struct AmgHierarchy {
    config: AmgConfig,
    levels: Vec<Level>,
}

impl AmgHierarchy {
    /// 从矩阵构建
    pub fn build(matrix: &CsrMatrix, config: AmgConfig) -> Self {
        let mut levels = Vec::new();
        let mut a = matrix.clone();
        loop {
            let inv_diag = JacobiPreconditioner::from_matrix(&a).inv_diagonal().to_vec();
            let n = a.n_rows();
            let last = levels.len() + 1 >= config.max_levels.max(1) || n <= config.coarse_min_rows;
            if !last {
                let (aggregate, n_coarse) = aggregate(&a, config.strong_threshold);
                // 粗化太慢则停止
                if n_coarse > 0 && (n_coarse as f64) < 0.9 * n as f64 {
                    let coarse = galerkin(&a, &aggregate, n_coarse);
                    levels.push(Level {
                        a,
                        inv_diag,
                        aggregate,
                        n_coarse,
                    });
                    a = coarse;
                    continue;
                }
            }
            levels.push(Level {
                a,
                inv_diag,
                aggregate: Vec::new(),
                n_coarse: 0,
            });
            break;
        }
        log::debug!(
            "AMG 层次: {} 层, 行数 {:?}",
            levels.len(),
            levels.iter().map(|l| l.a.n_rows()).collect::<Vec<_>>()
        );
        Self { config, levels }
    }

    /// 层数
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// 各层行数
    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels.iter().map(|l| l.a.n_rows()).collect()
    }

    /// 配置
    pub fn config(&self) -> &AmgConfig {
        &self.config
    }

    fn smooth(&self, lv: &Level, kind: SmootherKind, sweeps: usize, forward: bool, b: &[f64], x: &mut [f64]) {
        let n = b.len();
        match kind {
            SmootherKind::Jacobi => {
                let omega = self.config.jacobi_relaxation;
                let mut r = vec![0.0; n];
                let mut z = vec![0.0; n];
                for _ in 0..sweeps {
                    residual(&lv.a, x, b, &mut r);
                    for i in 0..n {
                        z[i] = lv.inv_diag[i] * r[i];
                    }
                    if self.config.poly_degree >= 1 {
                        // z ← z + D⁻¹(r - A z)
                        let mut az = vec![0.0; n];
                        lv.a.mul_vec(&z, &mut az);
                        for i in 0..n {
                            z[i] += lv.inv_diag[i] * (r[i] - az[i]);
                        }
                    }
                    for i in 0..n {
                        x[i] += omega * z[i];
                    }
                }
            }
            SmootherKind::GaussSeidel => {
                for _ in 0..sweeps {
                    let mut sweep = |i: usize| {
                        let mut s = b[i];
                        for (j, v) in lv.a.row(i).iter() {
                            if j != i {
                                s -= v * x[j];
                            }
                        }
                        x[i] = s * lv.inv_diag[i];
                    };
                    if forward {
                        (0..n).for_each(&mut sweep);
                    } else {
                        (0..n).rev().for_each(&mut sweep);
                    }
                }
            }
        }
    }

    fn coarse_solve(&self, lv: &Level, b: &[f64], x: &mut [f64]) {
        let mut r = vec![0.0; b.len()];
        residual(&lv.a, x, b, &mut r);
        let ctl = SolveControl::new(
            self.config.coarse_rtol * self.config.coarse_precision_mult,
            norm2(&r).max(f64::MIN_POSITIVE),
            self.config.coarse_max_iter,
        );
        let p = JacobiPreconditioner::from_diagonal(&lv.a.extract_diagonal());
        let res = match self.config.coarse_solver {
            CoarseSolverKind::Pcg => PcgSolver::new().solve(&lv.a, b, x, &p, &ctl, None),
        };
        if !res.is_converged() {
            log::trace!("AMG 最粗层未收敛: {} 次迭代, 残差 {:.3e}", res.n_iters, res.residual);
        }
    }

    /// 一次 V 循环，`x` 为初值
    pub fn v_cycle(&self, b: &[f64], x: &mut [f64]) {
        self.cycle(0, b, x);
    }

    fn cycle(&self, depth: usize, b: &[f64], x: &mut [f64]) {
        let lv = &self.levels[depth];
        if depth + 1 == self.levels.len() {
            self.coarse_solve(lv, b, x);
            return;
        }
        let cfg = &self.config;
        self.smooth(lv, cfg.descent_smoother, cfg.n_descent_sweeps, true, b, x);

        // 限制: r_c = Pᵀ r
        let mut r = vec![0.0; b.len()];
        residual(&lv.a, x, b, &mut r);
        let mut rc = vec![0.0; lv.n_coarse];
        for (i, &agg) in lv.aggregate.iter().enumerate() {
            rc[agg] += r[i];
        }
        let mut ec = vec![0.0; lv.n_coarse];
        self.cycle(depth + 1, &rc, &mut ec);

        // 延拓: x += P e_c
        for (i, &agg) in lv.aggregate.iter().enumerate() {
            x[i] += ec[agg];
        }
        self.smooth(lv, cfg.ascent_smoother, cfg.n_ascent_sweeps, false, b, x);
    }
}

/// 贪心聚合，返回 (行 -> 聚合号, 聚合数)
fn aggregate(a: &CsrMatrix, theta: f64) -> (Vec<usize>, usize) {
    const NONE: usize = usize::MAX;
    let n = a.n_rows();
    let diag = a.extract_diagonal();
    let strong: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            a.row(i)
                .iter()
                .filter(|&(j, v)| j != i && v.abs() >= theta * (diag[i] * diag[j]).abs().sqrt())
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let mut agg = vec![NONE; n];
    let mut n_agg = 0;

    // 第一轮: 邻居全部未聚合的点作为种子
    for i in 0..n {
        if agg[i] == NONE && strong[i].iter().all(|&j| agg[j] == NONE) {
            agg[i] = n_agg;
            for &j in &strong[i] {
                agg[j] = n_agg;
            }
            n_agg += 1;
        }
    }
    // 第二轮: 并入强邻居所在聚合
    let snapshot = agg.clone();
    for i in 0..n {
        if agg[i] == NONE {
            if let Some(&j) = strong[i].iter().find(|&&j| snapshot[j] != NONE) {
                agg[i] = snapshot[j];
            }
        }
    }
    // 第三轮: 剩余点单独成组
    for a_i in agg.iter_mut() {
        if *a_i == NONE {
            *a_i = n_agg;
            n_agg += 1;
        }
    }
    (agg, n_agg)
}

/// Galerkin 粗算子 Pᵀ A P（分段常数 P）
fn galerkin(a: &CsrMatrix, agg: &[usize], n_coarse: usize) -> CsrMatrix {
    let mut builder = CsrBuilder::new_square(n_coarse);
    for i in 0..a.n_rows() {
        for (j, v) in a.row(i).iter() {
            builder.add(agg[i], agg[j], v);
        }
    }
    builder.build()
}

// =============================================================================
// 求解器与预条件子
// =============================================================================

/// AMG 求解器：以 V 循环作为不动点迭代
#[derive(Debug, Clone, Default)]
pub struct AmgSolver {
    config: AmgConfig,
    hierarchy: Option<Arc<AmgHierarchy>>,
}

impl AmgSolver {
    /// 创建
    pub fn new(config: AmgConfig) -> Self {
        Self {
            config,
            hierarchy: None,
        }
    }

    /// 最近一次求解使用的层次结构
    pub fn hierarchy(&self) -> Option<&AmgHierarchy> {
        self.hierarchy.as_deref()
    }
}

impl IterativeSolver for AmgSolver {
    fn solve(
        &mut self,
        a: &dyn LinearOperator,
        b: &[f64],
        x: &mut [f64],
        _precond: &dyn Preconditioner,
        ctl: &SolveControl,
        mut plot: Option<&mut ConvergencePlot>,
    ) -> SolverResult {
        let h = Arc::new(AmgHierarchy::build(&a.to_csr(), self.config.clone()));
        self.hierarchy = Some(Arc::clone(&h));

        let mut r = vec![0.0; b.len()];
        residual(a, x, b, &mut r);
        let res0 = norm2(&r);
        if let Some(p) = plot.as_deref_mut() {
            p.record(0, res0);
        }
        let mut state = ctl.check(0, res0, res0);
        let mut res = res0;
        let mut cycle = 0;
        while state == ConvergenceState::Iterating {
            cycle += 1;
            h.v_cycle(b, x);
            residual(a, x, b, &mut r);
            res = norm2(&r);
            log::trace!("AMG cycle {}: residual = {:.6e}", cycle, res);
            if let Some(p) = plot.as_deref_mut() {
                p.record(cycle, res);
            }
            state = ctl.check(cycle, res, res0);
        }
        SolverResult {
            state,
            n_iters: cycle,
            residual: res,
        }
    }

    fn name(&self) -> &'static str {
        "AMG"
    }
}

/// AMG 预条件子：z = V(r)，初值为零
#[derive(Debug, Clone)]
pub struct AmgPreconditioner {
    hierarchy: AmgHierarchy,
}

impl AmgPreconditioner {
    /// 构建
    pub fn new(matrix: &CsrMatrix, config: AmgConfig) -> Self {
        Self {
            hierarchy: AmgHierarchy::build(matrix, config),
        }
    }

    /// 层次结构
    pub fn hierarchy(&self) -> &AmgHierarchy {
        &self.hierarchy
    }
}

impl Preconditioner for AmgPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.fill(0.0);
        self.hierarchy.v_cycle(r, z);
    }

    fn name(&self) -> &'static str {
        "AMG"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.hierarchy = AmgHierarchy::build(matrix, self.hierarchy.config.clone());
    }
}
