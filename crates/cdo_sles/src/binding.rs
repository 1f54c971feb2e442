// crates/cdo_sles/src/binding.rs

//! 线性求解器绑定
//!
//! 把抽象的 (家族, 求解器, 预条件子) 三元组映射为具体后端。
//! 每个合法组合在 [`BindingRegistry`] 中登记一个设置闭包，
//! 方程在最终设置阶段调用一次 [`BindingRegistry::bind`] 得到 [`Sles`]，
//! 之后每个时间步只调用 [`Sles::solve`]。
//!
//! 两个家族：
//!
//! - `Native`: 内置求解器，{CG, BiCGStab, GMRES, AMG} × {Jacobi, Poly1}
//! - `External`: 外部库风格的选项数据库，支持更多预条件子
//!   （SSOR, ILU(0), IC(0), AMG, 加性 Schwarz, 块 Jacobi）
//!
//! 不支持的组合在绑定时报 [`SlesError::Incompatible`]，不做静默回退。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::amg::{AmgConfig, AmgPreconditioner, AmgSolver, CoarseSolverKind, SmootherKind};
use crate::csr::{CsrMatrix, CsrPattern};
use crate::error::{SlesError, SlesResult};
use crate::matrix::SystemMatrix;
use crate::msr::MsrStructure;
use crate::operator::LinearOperator;
use crate::preconditioner::{
    Icc0Preconditioner, Ilu0Preconditioner, JacobiPreconditioner, Poly1Preconditioner,
    Preconditioner, SchwarzPreconditioner, SsorPreconditioner,
};
use crate::solver::{
    BiCgStabSolver, ConvergencePlot, GmresSolver, IterativeSolver, PcgSolver, SolveControl,
    SolverResult,
};

/// GMRES 重启长度
pub const GMRES_RESTART: usize = 30;

/// 打开矩阵打印的环境变量（取值 `DEFAULT`）
pub const MAT_VIEW_ENV: &str = "CDO_SLES_MAT_VIEW";

/// 收敛曲线在 verbosity 超过该值时启用
pub const PLOT_VERBOSITY: u32 = 2;

// =============================================================================
// 枚举
// =============================================================================

/// 求解器家族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverFamily {
    /// 内置求解器
    Native,
    /// 外部库
    External,
}

/// 迭代求解器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// 共轭梯度
    Cg,
    /// BiCGStab
    BiCg,
    /// GMRES
    Gmres,
    /// 代数多重网格
    Amg,
}

/// 预条件子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecondKind {
    /// 对角
    Jacobi,
    /// 一阶多项式
    Poly1,
    /// 对称逐次超松弛
    Ssor,
    /// ILU(0)
    Ilu0,
    /// IC(0)
    Icc0,
    /// 代数多重网格
    Amg,
    /// 加性 Schwarz
    As,
}

/// 后端矩阵格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixFormat {
    /// 内置 MSR
    Msr,
    /// 串行 AIJ（仅串行可用的预条件子）
    SeqAij,
    /// 分布式 AIJ
    MpiAij,
}

macro_rules! keyword_display {
    ($t:ty { $($v:ident => $s:literal),* $(,)? }) => {
        impl $t {
            /// 关键字
            pub fn keyword(self) -> &'static str {
                match self {
                    $(Self::$v => $s),*
                }
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.keyword())
            }
        }
    };
}

keyword_display!(SolverFamily { Native => "cs", External => "petsc" });
keyword_display!(SolverKind { Cg => "cg", BiCg => "bicg", Gmres => "gmres", Amg => "amg" });
keyword_display!(PrecondKind {
    Jacobi => "jacobi",
    Poly1 => "poly1",
    Ssor => "ssor",
    Ilu0 => "ilu0",
    Icc0 => "icc0",
    Amg => "amg",
    As => "as",
});
keyword_display!(MatrixFormat { Msr => "msr", SeqAij => "seqaij", MpiAij => "mpiaij" });

// =============================================================================
// 参数
// =============================================================================

/// 线性求解器参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSolverParam {
    /// 求解器家族
    #[serde(default = "default_family")]
    pub family: SolverFamily,
    /// 迭代求解器
    #[serde(default = "default_solver")]
    pub solver: SolverKind,
    /// 预条件子
    #[serde(default = "default_precond")]
    pub precond: PrecondKind,
    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub n_max_iter: usize,
    /// 收敛精度
    #[serde(default = "default_eps")]
    pub eps: f64,
    /// 是否按右端项归一化残差
    #[serde(default)]
    pub resnorm: bool,
    /// 输出级别
    #[serde(default)]
    pub verbosity: u32,
    /// 块 Jacobi / Schwarz 子域数
    #[serde(default = "default_subdomains")]
    pub n_subdomains: usize,
    /// 外部家族 AMG 预条件子的配置
    ///
    /// 内置 AMG 求解器不读取该字段，始终使用 [`native_amg_config`]。
    #[serde(default)]
    pub amg: AmgConfig,
}

fn default_family() -> SolverFamily {
    SolverFamily::Native
}
fn default_solver() -> SolverKind {
    SolverKind::Cg
}
fn default_precond() -> PrecondKind {
    PrecondKind::Jacobi
}
fn default_max_iter() -> usize {
    2500
}
fn default_eps() -> f64 {
    1e-12
}
fn default_subdomains() -> usize {
    1
}

impl Default for LinearSolverParam {
    fn default() -> Self {
        Self {
            family: default_family(),
            solver: default_solver(),
            precond: default_precond(),
            n_max_iter: default_max_iter(),
            eps: default_eps(),
            resnorm: false,
            verbosity: 0,
            n_subdomains: default_subdomains(),
            amg: AmgConfig::default(),
        }
    }
}

// =============================================================================
// 设置闭包与注册表
// =============================================================================

/// 预条件子工厂：每次求解前由当前矩阵构建
pub type PrecondFactory =
    Box<dyn Fn(&CsrMatrix) -> SlesResult<Box<dyn Preconditioner>> + Send + Sync>;

/// 后端设置结果
pub struct SolverSetup {
    /// 迭代求解器
    pub solver: Box<dyn IterativeSolver>,
    /// 预条件子工厂
    pub precond: PrecondFactory,
    /// 矩阵格式
    pub format: MatrixFormat,
    /// 后端选项数据库
    pub options: BTreeMap<String, String>,
}

/// 设置闭包
pub type SetupHook = Arc<dyn Fn(&LinearSolverParam) -> SolverSetup + Send + Sync>;

type BindingKey = (SolverFamily, SolverKind, PrecondKind);

/// (家族, 求解器, 预条件子) -> 设置闭包
#[derive(Clone, Default)]
pub struct BindingRegistry {
    hooks: HashMap<BindingKey, SetupHook>,
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .hooks
            .keys()
            .map(|(fa, s, p)| format!("{}/{}/{}", fa, s, p))
            .collect();
        keys.sort();
        f.debug_struct("BindingRegistry").field("hooks", &keys).finish()
    }
}

fn options<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn krylov(kind: SolverKind) -> Box<dyn IterativeSolver> {
    match kind {
        SolverKind::Cg => Box::new(PcgSolver::new()),
        SolverKind::BiCg => Box::new(BiCgStabSolver::new()),
        SolverKind::Gmres => Box::new(GmresSolver::new(GMRES_RESTART)),
        SolverKind::Amg => Box::new(AmgSolver::default()),
    }
}

fn jacobi_factory() -> PrecondFactory {
    Box::new(|a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
        Ok(Box::new(JacobiPreconditioner::from_matrix(a)))
    })
}

fn poly1_factory() -> PrecondFactory {
    Box::new(|a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
        Ok(Box::new(Poly1Preconditioner::from_matrix(a)))
    })
}

/// 内置 AMG 求解器的固定配置
///
/// 上下行各 5 次 Jacobi 光滑，层内不加多项式预条件，最粗层 PCG 至多 1000 次迭代。
pub fn native_amg_config() -> AmgConfig {
    AmgConfig {
        descent_smoother: SmootherKind::Jacobi,
        ascent_smoother: SmootherKind::Jacobi,
        n_descent_sweeps: 5,
        n_ascent_sweeps: 5,
        poly_degree: 0,
        coarse_solver: CoarseSolverKind::Pcg,
        coarse_max_iter: 1000,
        ..AmgConfig::default()
    }
}

fn ksp_type(kind: SolverKind) -> &'static str {
    match kind {
        SolverKind::Cg => "cg",
        SolverKind::BiCg => "bcgs",
        SolverKind::Gmres => "gmres",
        SolverKind::Amg => "richardson",
    }
}

impl BindingRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记全部内置组合
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register_native();
        reg.register_external();
        reg
    }

    /// 登记一个组合（覆盖已有的）
    pub fn register(
        &mut self,
        family: SolverFamily,
        solver: SolverKind,
        precond: PrecondKind,
        hook: SetupHook,
    ) {
        self.hooks.insert((family, solver, precond), hook);
    }

    /// 组合是否已登记
    pub fn supports(&self, family: SolverFamily, solver: SolverKind, precond: PrecondKind) -> bool {
        self.hooks.contains_key(&(family, solver, precond))
    }

    /// 已登记组合数
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn register_native(&mut self) {
        for solver in [SolverKind::Cg, SolverKind::BiCg, SolverKind::Gmres] {
            self.register(
                SolverFamily::Native,
                solver,
                PrecondKind::Jacobi,
                Arc::new(move |_: &LinearSolverParam| SolverSetup {
                    solver: krylov(solver),
                    precond: jacobi_factory(),
                    format: MatrixFormat::Msr,
                    options: BTreeMap::new(),
                }),
            );
            self.register(
                SolverFamily::Native,
                solver,
                PrecondKind::Poly1,
                Arc::new(move |_: &LinearSolverParam| SolverSetup {
                    solver: krylov(solver),
                    precond: poly1_factory(),
                    format: MatrixFormat::Msr,
                    options: BTreeMap::new(),
                }),
            );
        }

        // 多重网格：层内不使用多项式预条件，预条件子类型只影响合法性
        for precond in [PrecondKind::Jacobi, PrecondKind::Poly1] {
            self.register(
                SolverFamily::Native,
                SolverKind::Amg,
                precond,
                Arc::new(|_: &LinearSolverParam| SolverSetup {
                    solver: Box::new(AmgSolver::new(native_amg_config())),
                    precond: jacobi_factory(),
                    format: MatrixFormat::Msr,
                    options: BTreeMap::new(),
                }),
            );
        }
    }

    fn register_external(&mut self) {
        use PrecondKind as P;
        use SolverKind as S;

        let norm = ("-ksp_norm_type", "unpreconditioned");

        self.register(
            SolverFamily::External,
            S::Cg,
            P::Jacobi,
            Arc::new(move |_: &LinearSolverParam| SolverSetup {
                solver: krylov(S::Cg),
                precond: jacobi_factory(),
                format: MatrixFormat::MpiAij,
                options: options([("-ksp_type", "cg"), ("-pc_type", "jacobi"), norm]),
            }),
        );

        self.register(
            SolverFamily::External,
            S::Cg,
            P::Ssor,
            Arc::new(move |_: &LinearSolverParam| SolverSetup {
                solver: krylov(S::Cg),
                precond: Box::new(|a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
                    Ok(Box::new(SsorPreconditioner::from_matrix(a, 1.0)) as Box<dyn Preconditioner>)
                }),
                format: MatrixFormat::SeqAij,
                options: options([
                    ("-ksp_type", "cg"),
                    ("-pc_type", "sor"),
                    ("-pc_sor_symmetric", ""),
                    ("-pc_sor_omega", "1.0"),
                    norm,
                ]),
            }),
        );

        self.register(
            SolverFamily::External,
            S::Cg,
            P::Icc0,
            Arc::new(move |_: &LinearSolverParam| SolverSetup {
                solver: krylov(S::Cg),
                precond: Box::new(|a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
                    Ok(Box::new(Icc0Preconditioner::new(a)?) as Box<dyn Preconditioner>)
                }),
                format: MatrixFormat::SeqAij,
                options: options([
                    ("-ksp_type", "cg"),
                    ("-pc_type", "icc"),
                    ("-pc_factor_levels", "0"),
                    norm,
                ]),
            }),
        );

        self.register(
            SolverFamily::External,
            S::Cg,
            P::Amg,
            Arc::new(move |param: &LinearSolverParam| {
                let amg = param.amg.clone();
                SolverSetup {
                    solver: krylov(S::Cg),
                    precond: Box::new(move |a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
                        Ok(Box::new(AmgPreconditioner::new(a, amg.clone())) as Box<dyn Preconditioner>)
                    }),
                    format: MatrixFormat::MpiAij,
                    options: options([
                        ("-ksp_type", "cg"),
                        ("-pc_type", "hypre"),
                        ("-pc_hypre_type", "boomeramg"),
                        ("-pc_hypre_boomeramg_coarsen_type", "HMIS"),
                        ("-pc_hypre_boomeramg_interp_type", "ext+i-cc"),
                        ("-pc_hypre_boomeramg_agg_nl", "2"),
                        ("-pc_hypre_boomeramg_P_max", "4"),
                        ("-pc_hypre_boomeramg_strong_threshold", "0.5"),
                        ("-pc_hypre_boomeramg_no_CF", ""),
                        norm,
                    ]),
                }
            }),
        );

        self.register(
            SolverFamily::External,
            S::Cg,
            P::As,
            Arc::new(move |param: &LinearSolverParam| {
                let n_sub = param.n_subdomains;
                SolverSetup {
                    solver: krylov(S::Cg),
                    precond: Box::new(move |a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
                        Ok(Box::new(SchwarzPreconditioner::additive(a, n_sub, 1)) as Box<dyn Preconditioner>)
                    }),
                    format: MatrixFormat::MpiAij,
                    options: options([
                        ("-ksp_type", "cg"),
                        ("-pc_type", "asm"),
                        ("-pc_asm_overlap", "1"),
                        ("-sub_pc_type", "ilu"),
                        norm,
                    ]),
                }
            }),
        );

        // GMRES / BiCGStab：ILU(0) 串行，Jacobi 升级为块 Jacobi
        for solver in [S::Gmres, S::BiCg] {
            let restart = (solver == S::Gmres).then(|| GMRES_RESTART.to_string());
            let restart_ilu = restart.clone();
            self.register(
                SolverFamily::External,
                solver,
                P::Ilu0,
                Arc::new(move |_: &LinearSolverParam| {
                    let mut opts = options([
                        ("-ksp_type", ksp_type(solver)),
                        ("-pc_type", "ilu"),
                        ("-pc_factor_levels", "0"),
                        norm,
                    ]);
                    if let Some(r) = &restart_ilu {
                        opts.insert("-ksp_gmres_restart".into(), r.clone());
                    }
                    SolverSetup {
                        solver: krylov(solver),
                        precond: Box::new(|a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
                            Ok(Box::new(Ilu0Preconditioner::new(a)) as Box<dyn Preconditioner>)
                        }),
                        format: MatrixFormat::SeqAij,
                        options: opts,
                    }
                }),
            );
            self.register(
                SolverFamily::External,
                solver,
                P::Jacobi,
                Arc::new(move |param: &LinearSolverParam| {
                    let n_sub = param.n_subdomains;
                    let mut opts = options([
                        ("-ksp_type", ksp_type(solver)),
                        ("-pc_type", "bjacobi"),
                        ("-sub_pc_type", "ilu"),
                        norm,
                    ]);
                    if let Some(r) = &restart {
                        opts.insert("-ksp_gmres_restart".into(), r.clone());
                    }
                    SolverSetup {
                        solver: krylov(solver),
                        precond: Box::new(move |a: &CsrMatrix| -> SlesResult<Box<dyn Preconditioner>> {
                            Ok(Box::new(SchwarzPreconditioner::block_jacobi(a, n_sub))
                                as Box<dyn Preconditioner>)
                        }),
                        format: MatrixFormat::MpiAij,
                        options: opts,
                    }
                }),
            );
        }
    }

    /// 为名为 `name` 的系统绑定求解器
    pub fn bind(&self, name: &str, param: &LinearSolverParam) -> SlesResult<Sles> {
        let key = (param.family, param.solver, param.precond);
        let hook = self.hooks.get(&key).ok_or_else(|| SlesError::Incompatible {
            family: param.family.to_string(),
            solver: param.solver.to_string(),
            precond: param.precond.to_string(),
        })?;
        let setup = hook(param);
        log::debug!(
            "绑定线性求解器 {}: {}/{}/{} 格式 {}",
            name,
            param.family,
            param.solver,
            param.precond,
            setup.format
        );
        let plot = (param.verbosity > PLOT_VERBOSITY)
            .then(|| ConvergencePlot::new(format!("{}_sles_cvg", name)));
        Ok(Sles {
            name: name.to_string(),
            param: param.clone(),
            solver: setup.solver,
            precond: setup.precond,
            format: setup.format,
            options: setup.options,
            plot,
            csr_cache: None,
            n_calls: 0,
            n_iters_total: 0,
        })
    }
}

// =============================================================================
// 绑定后的线性系统
// =============================================================================

/// 已绑定的线性求解器
pub struct Sles {
    name: String,
    param: LinearSolverParam,
    solver: Box<dyn IterativeSolver>,
    precond: PrecondFactory,
    format: MatrixFormat,
    options: BTreeMap<String, String>,
    plot: Option<ConvergencePlot>,
    csr_cache: Option<(Arc<MsrStructure>, CsrMatrix)>,
    n_calls: usize,
    n_iters_total: usize,
}

impl fmt::Debug for Sles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sles")
            .field("name", &self.name)
            .field("solver", &self.solver.name())
            .field("format", &self.format)
            .field("options", &self.options)
            .field("n_calls", &self.n_calls)
            .finish()
    }
}

impl Sles {
    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 参数
    pub fn param(&self) -> &LinearSolverParam {
        &self.param
    }

    /// 求解器名称
    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// 矩阵格式
    pub fn format(&self) -> MatrixFormat {
        self.format
    }

    /// 后端选项
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// 收敛曲线（最近一次求解）
    pub fn plot(&self) -> Option<&ConvergencePlot> {
        self.plot.as_ref()
    }

    /// 调用次数
    pub fn n_calls(&self) -> usize {
        self.n_calls
    }

    /// 累计迭代次数
    pub fn n_iters_total(&self) -> usize {
        self.n_iters_total
    }

    /// 缓存的 CSR 模式（首次求解后存在）
    pub fn csr_pattern(&self) -> Option<Arc<CsrPattern>> {
        self.csr_cache.as_ref().map(|(_, csr)| csr.shared_pattern())
    }

    /// 求解 A x = rhs，`x` 为初值
    pub fn solve(
        &mut self,
        matrix: &SystemMatrix,
        ctl: SolveControl,
        rhs: &[f64],
        x: &mut [f64],
    ) -> SlesResult<SolverResult> {
        let msr = matrix.require(&self.name)?;
        let n = msr.n_rows();
        if rhs.len() != n {
            return Err(SlesError::dimension("rhs", n, rhs.len()));
        }
        if x.len() != n {
            return Err(SlesError::dimension("solution", n, x.len()));
        }

        // 结构不变时只替换数值，CSR 模式跟随 MSR 结构缓存
        let cached = match self.csr_cache.take() {
            Some((structure, csr)) if Arc::ptr_eq(&structure, msr.structure()) => {
                (structure, CsrMatrix::with_pattern(csr.shared_pattern(), msr.csr_values()))
            }
            _ => (Arc::clone(msr.structure()), msr.to_csr()),
        };
        let csr = &self.csr_cache.insert(cached).1;
        let precond = (self.precond)(csr)?;

        if self.param.verbosity > 0 {
            log::info!(
                "{}: 求解器 {}, 预条件子 {}, 格式 {}, eps {:.3e}, r_norm {:.3e}, 最大迭代 {}",
                self.name,
                self.solver.name(),
                precond.name(),
                self.format,
                ctl.eps,
                ctl.r_norm,
                ctl.max_iter
            );
        }
        if self.format != MatrixFormat::Msr && mat_view_requested() {
            log_matrix(&self.name, csr);
        }

        if let Some(p) = self.plot.as_mut() {
            p.clear();
        }
        // 内置家族直接在 MSR 上迭代，外部家族使用 AIJ（CSR）副本
        let op: &dyn LinearOperator = match self.format {
            MatrixFormat::Msr => msr,
            MatrixFormat::SeqAij | MatrixFormat::MpiAij => csr,
        };
        let result = self
            .solver
            .solve(op, rhs, x, precond.as_ref(), &ctl, self.plot.as_mut());

        self.n_calls += 1;
        self.n_iters_total += result.n_iters;
        Ok(result)
    }
}

fn mat_view_requested() -> bool {
    std::env::var(MAT_VIEW_ENV).map(|v| v == "DEFAULT").unwrap_or(false)
}

fn log_matrix(name: &str, a: &CsrMatrix) {
    log::info!("{}: 矩阵 {}x{}, nnz {}", name, a.n_rows(), a.n_cols(), a.nnz());
    for i in 0..a.n_rows() {
        let row: Vec<String> = a
            .row(i)
            .iter()
            .map(|(j, v)| format!("({}, {:.6e})", j, v))
            .collect();
        log::info!("row {}: {}", i, row.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msr::{MsrMatrix, MsrStructure};
    use crate::solver::ConvergenceState;

    fn laplace_system(n: usize) -> SystemMatrix {
        let rows: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                let mut r = Vec::new();
                if i > 0 {
                    r.push(i - 1);
                }
                if i + 1 < n {
                    r.push(i + 1);
                }
                r
            })
            .collect();
        let mut sys = SystemMatrix::new();
        sys.transfer_coefficients(laplace_values(&Arc::new(MsrStructure::from_rows(n, &rows)), 1.0))
            .unwrap();
        sys
    }

    fn laplace_values(structure: &Arc<MsrStructure>, scale: f64) -> MsrMatrix {
        let n = structure.n_rows();
        let mut m = MsrMatrix::new(Arc::clone(structure));
        for i in 0..n {
            m.add(i, i, 2.0 * scale);
            if i > 0 {
                m.add(i, i - 1, -scale);
            }
            if i + 1 < n {
                m.add(i, i + 1, -scale);
            }
        }
        m
    }

    fn param(family: SolverFamily, solver: SolverKind, precond: PrecondKind) -> LinearSolverParam {
        LinearSolverParam {
            family,
            solver,
            precond,
            ..LinearSolverParam::default()
        }
    }

    #[test]
    fn test_default_param() {
        let p = LinearSolverParam::default();
        assert_eq!(p.family, SolverFamily::Native);
        assert_eq!(p.solver, SolverKind::Cg);
        assert_eq!(p.precond, PrecondKind::Jacobi);
        assert_eq!(p.n_max_iter, 2500);
        assert_eq!(p.eps, 1e-12);
        assert!(!p.resnorm);
    }

    #[test]
    fn test_param_serde_defaults() {
        let p: LinearSolverParam = serde_json::from_str(r#"{"solver": "gmres"}"#).unwrap();
        assert_eq!(p.solver, SolverKind::Gmres);
        assert_eq!(p.precond, PrecondKind::Jacobi);
        assert_eq!(p.amg.n_descent_sweeps, 5);
    }

    #[test]
    fn test_registry_contents() {
        let reg = BindingRegistry::with_defaults();
        // 内置: 3 个 Krylov × 2 + AMG × 2；外部: CG × 5 + (GMRES, BiCG) × 2
        assert_eq!(reg.len(), 8 + 9);
        assert!(reg.supports(SolverFamily::Native, SolverKind::Amg, PrecondKind::Poly1));
        assert!(!reg.supports(SolverFamily::Native, SolverKind::Cg, PrecondKind::Ilu0));
        assert!(!reg.supports(SolverFamily::External, SolverKind::Gmres, PrecondKind::Icc0));
    }

    #[test]
    fn test_incompatible_pair() {
        let reg = BindingRegistry::with_defaults();
        let err = reg
            .bind("eq", &param(SolverFamily::Native, SolverKind::Cg, PrecondKind::Ssor))
            .unwrap_err();
        assert!(matches!(err, SlesError::Incompatible { .. }));
        assert!(err.to_string().contains("ssor"));
    }

    #[test]
    fn test_external_options() {
        let reg = BindingRegistry::with_defaults();
        let s = reg
            .bind("eq", &param(SolverFamily::External, SolverKind::Gmres, PrecondKind::Ilu0))
            .unwrap();
        assert_eq!(s.format(), MatrixFormat::SeqAij);
        assert_eq!(s.options().get("-ksp_gmres_restart").map(String::as_str), Some("30"));
        assert_eq!(s.options().get("-pc_factor_levels").map(String::as_str), Some("0"));
        assert_eq!(
            s.options().get("-ksp_norm_type").map(String::as_str),
            Some("unpreconditioned")
        );

        let s = reg
            .bind("eq", &param(SolverFamily::External, SolverKind::BiCg, PrecondKind::Jacobi))
            .unwrap();
        assert_eq!(s.options().get("-pc_type").map(String::as_str), Some("bjacobi"));
        assert_eq!(s.format(), MatrixFormat::MpiAij);

        let s = reg
            .bind("eq", &param(SolverFamily::External, SolverKind::Cg, PrecondKind::Amg))
            .unwrap();
        assert_eq!(
            s.options().get("-pc_hypre_boomeramg_coarsen_type").map(String::as_str),
            Some("HMIS")
        );
    }

    #[test]
    fn test_every_binding_solves() {
        let reg = BindingRegistry::with_defaults();
        let sys = laplace_system(30);
        let rhs = vec![1.0; 30];
        let mut count = 0;
        for family in [SolverFamily::Native, SolverFamily::External] {
            for solver in [SolverKind::Cg, SolverKind::BiCg, SolverKind::Gmres, SolverKind::Amg] {
                for precond in [
                    PrecondKind::Jacobi,
                    PrecondKind::Poly1,
                    PrecondKind::Ssor,
                    PrecondKind::Ilu0,
                    PrecondKind::Icc0,
                    PrecondKind::Amg,
                    PrecondKind::As,
                ] {
                    if !reg.supports(family, solver, precond) {
                        continue;
                    }
                    let mut sles = reg.bind("lap", &param(family, solver, precond)).unwrap();
                    let mut x = vec![0.0; 30];
                    let res = sles
                        .solve(&sys, SolveControl::new(1e-10, 1.0, 2500), &rhs, &mut x)
                        .unwrap();
                    assert!(res.is_converged(), "{}/{}/{}: {:?}", family, solver, precond, res);
                    // 解析解 x_i = (i+1)(n-i)/2
                    for (i, xi) in x.iter().enumerate() {
                        let exact = ((i + 1) * (30 - i)) as f64 / 2.0;
                        assert!((xi - exact).abs() < 1e-7);
                    }
                    count += 1;
                }
            }
        }
        assert_eq!(count, reg.len());
    }

    #[test]
    fn test_native_amg_ignores_user_config() {
        let cfg = native_amg_config();
        assert_eq!(cfg.descent_smoother, SmootherKind::Jacobi);
        assert_eq!(cfg.ascent_smoother, SmootherKind::Jacobi);
        assert_eq!((cfg.n_descent_sweeps, cfg.n_ascent_sweeps), (5, 5));
        assert_eq!(cfg.poly_degree, 0);
        assert_eq!(cfg.coarse_max_iter, 1000);

        // 用户配置只对外部家族生效：1 次迭代的粗层求解若被采用，单个 V 循环无法收敛
        let reg = BindingRegistry::with_defaults();
        let mut p = param(SolverFamily::Native, SolverKind::Amg, PrecondKind::Poly1);
        p.amg = AmgConfig {
            n_descent_sweeps: 0,
            n_ascent_sweeps: 0,
            poly_degree: 1,
            coarse_max_iter: 1,
            max_levels: 1,
            ..AmgConfig::default()
        };
        let mut sles = reg.bind("amg", &p).unwrap();
        assert_eq!(sles.param().amg.coarse_max_iter, 1);
        let sys = laplace_system(30);
        let mut x = vec![0.0; 30];
        let res = sles
            .solve(&sys, SolveControl::new(1e-10, 1.0, 2500), &vec![1.0; 30], &mut x)
            .unwrap();
        assert!(res.is_converged());
        assert!(res.n_iters <= 2, "{:?}", res);
    }

    #[test]
    fn test_csr_cached_across_solves() {
        let reg = BindingRegistry::with_defaults();
        let mut sles = reg
            .bind("eq", &param(SolverFamily::External, SolverKind::Cg, PrecondKind::Ssor))
            .unwrap();
        assert!(sles.csr_pattern().is_none());

        let mut sys = laplace_system(12);
        let rhs = vec![1.0; 12];
        let mut x1 = vec![0.0; 12];
        sles.solve(&sys, SolveControl::new(1e-12, 1.0, 500), &rhs, &mut x1).unwrap();
        let first = sles.csr_pattern().unwrap();

        // 同一结构、系数加倍：模式复用，解减半
        let structure = Arc::clone(sys.structure().unwrap());
        sys.copy_coefficients(&laplace_values(&structure, 2.0)).unwrap();
        let mut x2 = vec![0.0; 12];
        sles.solve(&sys, SolveControl::new(1e-12, 1.0, 500), &rhs, &mut x2).unwrap();
        assert!(Arc::ptr_eq(&first, &sles.csr_pattern().unwrap()));
        for (a, b) in x1.iter().zip(&x2) {
            assert!((a - 2.0 * b).abs() < 1e-8);
        }

        // 新结构重建
        let mut x3 = vec![0.0; 8];
        sles.solve(&laplace_system(8), SolveControl::new(1e-12, 1.0, 500), &[1.0; 8], &mut x3)
            .unwrap();
        let rebuilt = sles.csr_pattern().unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(rebuilt.n_rows(), 8);
    }

    #[test]
    fn test_zero_iterations_and_plot() {
        let reg = BindingRegistry::with_defaults();
        let sys = laplace_system(10);
        let mut p = LinearSolverParam::default();
        p.verbosity = 3;
        let mut sles = reg.bind("eq", &p).unwrap();
        let mut x = vec![0.0; 10];
        let res = sles
            .solve(&sys, SolveControl::new(1e-12, 1.0, 0), &vec![1.0; 10], &mut x)
            .unwrap();
        assert_eq!(res.state, ConvergenceState::MaxIteration);
        assert_eq!(res.n_iters, 0);
        assert_eq!(sles.plot().map(|p| p.points.len()), Some(1));
        assert_eq!(sles.n_calls(), 1);
    }

    #[test]
    fn test_solve_checks_dimensions() {
        let reg = BindingRegistry::with_defaults();
        let mut sles = reg.bind("eq", &LinearSolverParam::default()).unwrap();
        let mut x = vec![0.0; 3];
        let err = sles
            .solve(&laplace_system(4), SolveControl::new(1e-8, 1.0, 10), &[1.0; 4], &mut x)
            .unwrap_err();
        assert!(matches!(err, SlesError::DimensionMismatch { .. }));

        let err = sles
            .solve(&SystemMatrix::new(), SolveControl::new(1e-8, 1.0, 10), &[], &mut [])
            .unwrap_err();
        assert!(matches!(err, SlesError::EmptyMatrix(_)));
    }
}
