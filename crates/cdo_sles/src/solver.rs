// crates/cdo_sles/src/solver.rs

//! Krylov 迭代求解器
//!
//! - [`PcgSolver`]: 预条件共轭梯度（对称正定）
//! - [`BiCgStabSolver`]: 预条件双共轭梯度稳定法（非对称）
//! - [`GmresSolver`]: 右预条件重启 GMRES
//!
//! 收敛判据 ‖r‖₂ ≤ eps · r_norm。未收敛不是错误，通过
//! [`SolverResult::state`] 返回给调用方。

use serde::{Deserialize, Serialize};

use crate::operator::LinearOperator;
use crate::preconditioner::Preconditioner;
use crate::vector_ops::{axpy, dot, norm2, residual};

/// 残差超过初始残差的该倍数视为发散
pub const DIVERGENCE_FACTOR: f64 = 1e4;

/// 视为数值崩溃的内积阈值
const BREAKDOWN_TOL: f64 = 1e-300;

// =============================================================================
// 收敛状态与控制参数
// =============================================================================

/// 收敛状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceState {
    /// 发散
    Diverged,
    /// 数值崩溃（内积为零）
    Breakdown,
    /// 达到最大迭代次数
    MaxIteration,
    /// 迭代中
    Iterating,
    /// 收敛
    Converged,
}

impl ConvergenceState {
    /// 整数代码（负数表示失败）
    pub fn code(self) -> i32 {
        match self {
            Self::Diverged => -3,
            Self::Breakdown => -2,
            Self::MaxIteration => -1,
            Self::Iterating => 0,
            Self::Converged => 1,
        }
    }

    /// 是否收敛
    #[inline]
    pub fn is_converged(self) -> bool {
        self == Self::Converged
    }
}

impl std::fmt::Display for ConvergenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Diverged => "diverged",
            Self::Breakdown => "breakdown",
            Self::MaxIteration => "max_iteration",
            Self::Iterating => "iterating",
            Self::Converged => "converged",
        };
        write!(f, "{}", s)
    }
}

/// 一次求解的控制参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveControl {
    /// 收敛精度
    pub eps: f64,
    /// 残差归一化系数
    pub r_norm: f64,
    /// 最大迭代次数
    pub max_iter: usize,
}

impl SolveControl {
    /// 创建
    pub fn new(eps: f64, r_norm: f64, max_iter: usize) -> Self {
        Self { eps, r_norm, max_iter }
    }

    /// 收敛阈值
    #[inline]
    pub fn threshold(&self) -> f64 {
        self.eps * self.r_norm
    }

    /// 根据当前残差判断状态
    pub fn check(&self, n_iters: usize, res: f64, initial: f64) -> ConvergenceState {
        if res <= self.threshold() {
            ConvergenceState::Converged
        } else if !res.is_finite() || res > DIVERGENCE_FACTOR * initial {
            ConvergenceState::Diverged
        } else if n_iters >= self.max_iter {
            ConvergenceState::MaxIteration
        } else {
            ConvergenceState::Iterating
        }
    }
}

/// 求解结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    /// 收敛状态
    pub state: ConvergenceState,
    /// 迭代次数
    pub n_iters: usize,
    /// 最终残差 ‖b - Ax‖₂
    pub residual: f64,
}

impl SolverResult {
    /// 是否收敛
    pub fn is_converged(&self) -> bool {
        self.state.is_converged()
    }
}

// =============================================================================
// 收敛曲线
// =============================================================================

/// 收敛曲线记录器
///
/// 以迭代次数（而非墙钟时间）为横坐标。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvergencePlot {
    /// 曲线名称
    pub name: String,
    /// (迭代次数, 残差)
    pub points: Vec<(usize, f64)>,
}

impl ConvergencePlot {
    /// 创建
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// 记录一个点
    #[inline]
    pub fn record(&mut self, iter: usize, res: f64) {
        self.points.push((iter, res));
    }

    /// 清空
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// 最后一个点
    pub fn last(&self) -> Option<(usize, f64)> {
        self.points.last().copied()
    }
}

// =============================================================================
// 求解器 trait
// =============================================================================

/// 迭代求解器
pub trait IterativeSolver: Send {
    /// 求解 Ax = b，`x` 为初值并返回解
    fn solve(
        &mut self,
        a: &dyn LinearOperator,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
        ctl: &SolveControl,
        plot: Option<&mut ConvergencePlot>,
    ) -> SolverResult;

    /// 名称
    fn name(&self) -> &'static str;
}

/// 开始迭代前的公共处理：计算初始残差并判断是否已满足条件
fn start(
    a: &dyn LinearOperator,
    b: &[f64],
    x: &[f64],
    r: &mut [f64],
    ctl: &SolveControl,
    plot: &mut Option<&mut ConvergencePlot>,
) -> Result<f64, SolverResult> {
    residual(a, x, b, r);
    let res0 = norm2(r);
    if let Some(p) = plot.as_deref_mut() {
        p.record(0, res0);
    }
    if res0 <= ctl.threshold() {
        return Err(SolverResult {
            state: ConvergenceState::Converged,
            n_iters: 0,
            residual: res0,
        });
    }
    if ctl.max_iter == 0 {
        return Err(SolverResult {
            state: ConvergenceState::MaxIteration,
            n_iters: 0,
            residual: res0,
        });
    }
    Ok(res0)
}

fn resize(v: &mut Vec<f64>, n: usize) {
    if v.len() != n {
        *v = vec![0.0; n];
    }
}

// =============================================================================
// PCG
// =============================================================================

/// 预条件共轭梯度
#[derive(Debug, Clone, Default)]
pub struct PcgSolver {
    r: Vec<f64>,
    z: Vec<f64>,
    p: Vec<f64>,
    ap: Vec<f64>,
}

impl PcgSolver {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_workspace(&mut self, n: usize) {
        resize(&mut self.r, n);
        resize(&mut self.z, n);
        resize(&mut self.p, n);
        resize(&mut self.ap, n);
    }
}

impl IterativeSolver for PcgSolver {
    fn solve(
        &mut self,
        a: &dyn LinearOperator,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
        ctl: &SolveControl,
        mut plot: Option<&mut ConvergencePlot>,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let res0 = match start(a, b, x, &mut self.r, ctl, &mut plot) {
            Ok(r0) => r0,
            Err(done) => return done,
        };

        precond.apply(&self.r, &mut self.z);
        self.p.copy_from_slice(&self.z);
        let mut rz = dot(&self.r, &self.z);
        let mut res = res0;

        for iter in 1..=ctl.max_iter {
            a.apply(&self.p, &mut self.ap);
            let pap = dot(&self.p, &self.ap);
            if pap.abs() < BREAKDOWN_TOL {
                return SolverResult {
                    state: ConvergenceState::Breakdown,
                    n_iters: iter - 1,
                    residual: res,
                };
            }
            let alpha = rz / pap;
            axpy(alpha, &self.p, x);
            axpy(-alpha, &self.ap, &mut self.r);

            res = norm2(&self.r);
            log::trace!("PCG iter {}: residual = {:.6e}", iter, res);
            if let Some(p) = plot.as_deref_mut() {
                p.record(iter, res);
            }

            let state = ctl.check(iter, res, res0);
            if state != ConvergenceState::Iterating {
                return SolverResult {
                    state,
                    n_iters: iter,
                    residual: res,
                };
            }

            precond.apply(&self.r, &mut self.z);
            let rz_new = dot(&self.r, &self.z);
            if rz.abs() < BREAKDOWN_TOL {
                return SolverResult {
                    state: ConvergenceState::Breakdown,
                    n_iters: iter,
                    residual: res,
                };
            }
            let beta = rz_new / rz;
            rz = rz_new;
            for i in 0..n {
                self.p[i] = self.z[i] + beta * self.p[i];
            }
        }

        SolverResult {
            state: ConvergenceState::MaxIteration,
            n_iters: ctl.max_iter,
            residual: res,
        }
    }

    fn name(&self) -> &'static str {
        "PCG"
    }
}

// =============================================================================
// BiCGStab
// =============================================================================

/// 预条件 BiCGStab
#[derive(Debug, Clone, Default)]
pub struct BiCgStabSolver {
    r: Vec<f64>,
    r0: Vec<f64>,
    p: Vec<f64>,
    v: Vec<f64>,
    s: Vec<f64>,
    t: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl BiCgStabSolver {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_workspace(&mut self, n: usize) {
        for v in [
            &mut self.r,
            &mut self.r0,
            &mut self.p,
            &mut self.v,
            &mut self.s,
            &mut self.t,
            &mut self.y,
            &mut self.z,
        ] {
            resize(v, n);
        }
    }
}

impl IterativeSolver for BiCgStabSolver {
    fn solve(
        &mut self,
        a: &dyn LinearOperator,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
        ctl: &SolveControl,
        mut plot: Option<&mut ConvergencePlot>,
    ) -> SolverResult {
        let n = b.len();
        self.ensure_workspace(n);
        let res0 = match start(a, b, x, &mut self.r, ctl, &mut plot) {
            Ok(r0) => r0,
            Err(done) => return done,
        };

        // 影子残差固定为初始残差
        self.r0.copy_from_slice(&self.r);
        self.p.fill(0.0);
        self.v.fill(0.0);
        let (mut rho_old, mut alpha, mut omega) = (1.0, 1.0, 1.0);
        let mut res = res0;

        for iter in 1..=ctl.max_iter {
            let rho = dot(&self.r0, &self.r);
            if rho.abs() < BREAKDOWN_TOL {
                return SolverResult {
                    state: ConvergenceState::Breakdown,
                    n_iters: iter - 1,
                    residual: res,
                };
            }
            let beta = if iter == 1 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            for i in 0..n {
                self.p[i] = self.r[i] + beta * (self.p[i] - omega * self.v[i]);
            }

            // y = M⁻¹p, v = A y
            precond.apply(&self.p, &mut self.y);
            a.apply(&self.y, &mut self.v);
            let r0v = dot(&self.r0, &self.v);
            if r0v.abs() < BREAKDOWN_TOL {
                return SolverResult {
                    state: ConvergenceState::Breakdown,
                    n_iters: iter - 1,
                    residual: res,
                };
            }
            alpha = rho / r0v;

            for i in 0..n {
                self.s[i] = self.r[i] - alpha * self.v[i];
            }
            axpy(alpha, &self.y, x);

            let s_norm = norm2(&self.s);
            if s_norm <= ctl.threshold() {
                self.r.copy_from_slice(&self.s);
                if let Some(p) = plot.as_deref_mut() {
                    p.record(iter, s_norm);
                }
                return SolverResult {
                    state: ConvergenceState::Converged,
                    n_iters: iter,
                    residual: s_norm,
                };
            }

            // z = M⁻¹s, t = A z
            precond.apply(&self.s, &mut self.z);
            a.apply(&self.z, &mut self.t);
            let tt = dot(&self.t, &self.t);
            if tt < BREAKDOWN_TOL {
                return SolverResult {
                    state: ConvergenceState::Breakdown,
                    n_iters: iter,
                    residual: s_norm,
                };
            }
            omega = dot(&self.t, &self.s) / tt;
            axpy(omega, &self.z, x);

            for i in 0..n {
                self.r[i] = self.s[i] - omega * self.t[i];
            }
            res = norm2(&self.r);
            log::trace!("BiCGStab iter {}: residual = {:.6e}", iter, res);
            if let Some(p) = plot.as_deref_mut() {
                p.record(iter, res);
            }

            let state = ctl.check(iter, res, res0);
            if state != ConvergenceState::Iterating {
                return SolverResult {
                    state,
                    n_iters: iter,
                    residual: res,
                };
            }
            if omega.abs() < BREAKDOWN_TOL {
                return SolverResult {
                    state: ConvergenceState::Breakdown,
                    n_iters: iter,
                    residual: res,
                };
            }
        }

        SolverResult {
            state: ConvergenceState::MaxIteration,
            n_iters: ctl.max_iter,
            residual: res,
        }
    }

    fn name(&self) -> &'static str {
        "BiCGStab"
    }
}

// =============================================================================
// GMRES
// =============================================================================

/// 右预条件重启 GMRES(m)
///
/// Arnoldi 过程使用修正 Gram-Schmidt，最小二乘问题用 Givens 旋转求解。
#[derive(Debug, Clone)]
pub struct GmresSolver {
    restart: usize,
    r: Vec<f64>,
    w: Vec<f64>,
    tmp: Vec<f64>,
}

impl GmresSolver {
    /// 创建，`restart` 为 Krylov 子空间维数
    pub fn new(restart: usize) -> Self {
        Self {
            restart: restart.max(1),
            r: Vec::new(),
            w: Vec::new(),
            tmp: Vec::new(),
        }
    }

    /// 重启长度
    pub fn restart(&self) -> usize {
        self.restart
    }
}

impl IterativeSolver for GmresSolver {
    fn solve(
        &mut self,
        a: &dyn LinearOperator,
        b: &[f64],
        x: &mut [f64],
        precond: &dyn Preconditioner,
        ctl: &SolveControl,
        mut plot: Option<&mut ConvergencePlot>,
    ) -> SolverResult {
        let n = b.len();
        resize(&mut self.r, n);
        resize(&mut self.w, n);
        resize(&mut self.tmp, n);
        let res0 = match start(a, b, x, &mut self.r, ctl, &mut plot) {
            Ok(r0) => r0,
            Err(done) => return done,
        };

        let m = self.restart;
        let mut iter = 0;
        let mut res = res0;

        while iter < ctl.max_iter {
            let beta = norm2(&self.r);
            if beta < BREAKDOWN_TOL {
                break;
            }
            let mut v: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
            v.push(self.r.iter().map(|ri| ri / beta).collect());
            let mut h = vec![vec![0.0; m]; m + 1];
            let mut cs = vec![0.0; m];
            let mut sn = vec![0.0; m];
            let mut g = vec![0.0; m + 1];
            g[0] = beta;

            let mut k = 0;
            let mut state = ConvergenceState::Iterating;
            while k < m && iter < ctl.max_iter {
                // w = A M⁻¹ v_k
                precond.apply(&v[k], &mut self.tmp);
                a.apply(&self.tmp, &mut self.w);
                for (j, vj) in v.iter().enumerate() {
                    h[j][k] = dot(&self.w, vj);
                    axpy(-h[j][k], vj, &mut self.w);
                }
                h[k + 1][k] = norm2(&self.w);

                for j in 0..k {
                    let t = cs[j] * h[j][k] + sn[j] * h[j + 1][k];
                    h[j + 1][k] = -sn[j] * h[j][k] + cs[j] * h[j + 1][k];
                    h[j][k] = t;
                }
                let denom = (h[k][k] * h[k][k] + h[k + 1][k] * h[k + 1][k]).sqrt();
                if denom < BREAKDOWN_TOL {
                    state = ConvergenceState::Breakdown;
                    break;
                }
                cs[k] = h[k][k] / denom;
                sn[k] = h[k + 1][k] / denom;
                h[k][k] = denom;
                h[k + 1][k] = 0.0;
                g[k + 1] = -sn[k] * g[k];
                g[k] *= cs[k];

                let hk1 = norm2(&self.w);
                let next: Vec<f64> = if hk1 > BREAKDOWN_TOL {
                    self.w.iter().map(|wi| wi / hk1).collect()
                } else {
                    vec![0.0; n]
                };
                v.push(next);

                k += 1;
                iter += 1;
                res = g[k].abs();
                log::trace!("GMRES iter {}: residual ≈ {:.6e}", iter, res);
                if let Some(p) = plot.as_deref_mut() {
                    p.record(iter, res);
                }
                state = ctl.check(iter, res, res0);
                if state != ConvergenceState::Iterating || hk1 <= BREAKDOWN_TOL {
                    break;
                }
            }

            // y = H⁻¹ g（上三角回代），x += M⁻¹ V y
            let mut y = vec![0.0; k];
            for i in (0..k).rev() {
                let mut s = g[i];
                for j in (i + 1)..k {
                    s -= h[i][j] * y[j];
                }
                y[i] = s / h[i][i];
            }
            self.w.fill(0.0);
            for (j, yj) in y.iter().enumerate() {
                axpy(*yj, &v[j], &mut self.w);
            }
            precond.apply(&self.w, &mut self.tmp);
            axpy(1.0, &self.tmp, x);

            // 真实残差
            residual(a, x, b, &mut self.r);
            res = norm2(&self.r);
            let true_state = ctl.check(iter, res, res0);
            match (state, true_state) {
                (ConvergenceState::Breakdown, ConvergenceState::Iterating)
                | (ConvergenceState::Breakdown, ConvergenceState::MaxIteration) => {
                    return SolverResult {
                        state: ConvergenceState::Breakdown,
                        n_iters: iter,
                        residual: res,
                    };
                }
                (_, ConvergenceState::Iterating) => continue,
                (_, s) => {
                    return SolverResult {
                        state: s,
                        n_iters: iter,
                        residual: res,
                    };
                }
            }
        }

        SolverResult {
            state: ctl.check(iter.max(ctl.max_iter), res, res0),
            n_iters: iter,
            residual: res,
        }
    }

    fn name(&self) -> &'static str {
        "GMRES"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::{CsrBuilder, CsrMatrix};
    use crate::preconditioner::{IdentityPreconditioner, JacobiPreconditioner};

    fn laplace_1d(n: usize) -> CsrMatrix {
        let mut b = CsrBuilder::new_square(n);
        for i in 0..n {
            b.set(i, i, 2.0);
            if i > 0 {
                b.set(i, i - 1, -1.0);
            }
            if i + 1 < n {
                b.set(i, i + 1, -1.0);
            }
        }
        b.build()
    }

    /// 对流-扩散型非对称三对角
    fn convdiff_1d(n: usize) -> CsrMatrix {
        let mut b = CsrBuilder::new_square(n);
        for i in 0..n {
            b.set(i, i, 3.0);
            if i > 0 {
                b.set(i, i - 1, -2.0);
            }
            if i + 1 < n {
                b.set(i, i + 1, -0.5);
            }
        }
        b.build()
    }

    fn check_solution(a: &CsrMatrix, x: &[f64], b: &[f64], tol: f64) {
        let mut r = vec![0.0; b.len()];
        residual(a, x, b, &mut r);
        assert!(norm2(&r) <= tol, "residual {}", norm2(&r));
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(ConvergenceState::Diverged.code(), -3);
        assert_eq!(ConvergenceState::Breakdown.code(), -2);
        assert_eq!(ConvergenceState::MaxIteration.code(), -1);
        assert_eq!(ConvergenceState::Iterating.code(), 0);
        assert_eq!(ConvergenceState::Converged.code(), 1);
        assert_eq!(ConvergenceState::MaxIteration.to_string(), "max_iteration");
    }

    #[test]
    fn test_pcg_laplace() {
        let a = laplace_1d(50);
        let b = vec![1.0; 50];
        let mut x = vec![0.0; 50];
        let ctl = SolveControl::new(1e-10, 1.0, 200);
        let p = JacobiPreconditioner::from_matrix(&a);
        let res = PcgSolver::new().solve(&a, &b, &mut x, &p, &ctl, None);
        assert!(res.is_converged(), "{:?}", res);
        assert!(res.n_iters <= 80);
        check_solution(&a, &x, &b, 1e-9);
    }

    #[test]
    fn test_zero_max_iter() {
        let a = laplace_1d(10);
        let b = vec![1.0; 10];
        let mut x = vec![0.0; 10];
        let ctl = SolveControl::new(1e-10, 1.0, 0);
        let p = IdentityPreconditioner::new();
        for solver in [
            Box::new(PcgSolver::new()) as Box<dyn IterativeSolver>,
            Box::new(BiCgStabSolver::new()),
            Box::new(GmresSolver::new(30)),
        ] {
            let mut solver = solver;
            let res = solver.solve(&a, &b, &mut x, &p, &ctl, None);
            assert_eq!(res.state, ConvergenceState::MaxIteration);
            assert_eq!(res.n_iters, 0);
            assert!(x.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_initial_guess_already_converged() {
        let a = CsrMatrix::identity(4);
        let b = vec![1.0, 2.0, 3.0, 4.0];
        let mut x = b.clone();
        let ctl = SolveControl::new(1e-12, 1.0, 0);
        let res = PcgSolver::new().solve(&a, &b, &mut x, &IdentityPreconditioner, &ctl, None);
        assert_eq!(res.state, ConvergenceState::Converged);
        assert_eq!(res.n_iters, 0);
    }

    #[test]
    fn test_bicgstab_nonsymmetric() {
        let a = convdiff_1d(40);
        let b: Vec<f64> = (0..40).map(|i| (i % 3) as f64).collect();
        let mut x = vec![0.0; 40];
        let ctl = SolveControl::new(1e-10, 1.0, 500);
        let p = JacobiPreconditioner::from_matrix(&a);
        let res = BiCgStabSolver::new().solve(&a, &b, &mut x, &p, &ctl, None);
        assert!(res.is_converged(), "{:?}", res);
        check_solution(&a, &x, &b, 1e-9);
    }

    #[test]
    fn test_gmres_restart_and_plot() {
        let a = convdiff_1d(60);
        let b = vec![1.0; 60];
        let mut x = vec![0.0; 60];
        let ctl = SolveControl::new(1e-10, 1.0, 1000);
        let p = JacobiPreconditioner::from_matrix(&a);
        let mut plot = ConvergencePlot::new("gmres");
        let mut solver = GmresSolver::new(5);
        let res = solver.solve(&a, &b, &mut x, &p, &ctl, Some(&mut plot));
        assert!(res.is_converged(), "{:?}", res);
        assert!(res.n_iters > 5);
        check_solution(&a, &x, &b, 1e-9);
        assert_eq!(plot.points[0].0, 0);
        assert_eq!(plot.last().map(|p| p.0), Some(res.n_iters));
    }

    #[test]
    fn test_max_iteration_reported() {
        let a = laplace_1d(100);
        let b = vec![1.0; 100];
        let mut x = vec![0.0; 100];
        let ctl = SolveControl::new(1e-14, 1.0, 3);
        let res = PcgSolver::new().solve(&a, &b, &mut x, &IdentityPreconditioner, &ctl, None);
        assert_eq!(res.state, ConvergenceState::MaxIteration);
        assert_eq!(res.n_iters, 3);
        assert!(res.residual > 0.0);
    }
}
