// crates/cdo_equation/src/equation.rs

//! Equation - 单个方程的生命周期
//!
//! 状态推进：
//!
//! ```text
//! Created → Configured → Locked → Built → Solved
//!                                   ↑        │
//!                                   └────────┘ (非定常)
//! ```
//!
//! - 设置阶段：`set_option`、`link`、`add_*` 等接口转发给 [`EquationParam`]，
//!   名称形式的网格位置在这里解析
//! - `last_setup`：检查格式组合、绑定线性求解器、锁定参数
//! - `create_field` / `init_system`：创建场、构建器与初始条件
//! - `build_system` / `solve` / `extra_op`：每个时间步的组装、求解与后处理

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use cdo_config::{ConfigError, ConfigResult, EquationSetup};
use cdo_foundation::{DataStats, TimerId, TimerStats, DBL_MIN};
use cdo_mesh::{LocationKind, MeshContext, MeshLocations};
use cdo_sles::vector_ops::norm2;
use cdo_sles::{BindingRegistry, Sles, SolveControl, SystemMatrix};

use crate::error::{EquationError, EquationResult, SolveReport};
use crate::field::{FieldId, FieldRegistry};
use crate::param::{
    AnalyticFn, BcType, Definition, EquationParam, EquationType, LocationRef, ProcessFlag,
    SpaceScheme, TermFlags, VarType,
};
use crate::property::PropertyRegistry;
use crate::scheme::{discretization, MatrixHandoff, SchemeBuilder, SpaceDiscretization, TimeStep};

// =============================================================================
// 状态
// =============================================================================

/// 方程生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquationState {
    /// 刚创建
    Created,
    /// 已有设置
    Configured,
    /// 参数已锁定，格式与求解器已绑定
    Locked,
    /// 线性系统已组装
    Built,
    /// 已求解
    Solved,
}

impl fmt::Display for EquationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Locked => "locked",
            Self::Built => "built",
            Self::Solved => "solved",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StageTimers {
    main: Option<TimerId>,
    pre: Option<TimerId>,
    solve: Option<TimerId>,
    extra_op: Option<TimerId>,
}

// =============================================================================
// Equation
// =============================================================================

/// 方程
pub struct Equation {
    name: String,
    varname: String,
    param: EquationParam,
    state: EquationState,
    field_id: Option<FieldId>,
    scheme: Option<&'static dyn SpaceDiscretization>,
    builder: Option<Box<dyn SchemeBuilder>>,
    sles: Option<Sles>,
    matrix: SystemMatrix,
    rhs: Vec<f64>,
    do_build: bool,
    timers: TimerStats,
    stages: StageTimers,
    last_report: Option<SolveReport>,
}

impl fmt::Debug for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equation")
            .field("name", &self.name)
            .field("varname", &self.varname)
            .field("state", &self.state)
            .field("scheme", &self.param.space_scheme)
            .field("field_id", &self.field_id)
            .field("do_build", &self.do_build)
            .field("sles", &self.sles)
            .finish()
    }
}

impl Equation {
    /// 创建方程，参数取默认值
    pub fn new(
        name: impl Into<String>,
        varname: impl Into<String>,
        eq_type: EquationType,
        var_type: VarType,
        default_bc: BcType,
    ) -> Self {
        let name = name.into();
        let param = EquationParam::new(name.clone(), eq_type, var_type, default_bc);
        Self {
            name,
            varname: varname.into(),
            param,
            state: EquationState::Created,
            field_id: None,
            scheme: None,
            builder: None,
            sles: None,
            matrix: SystemMatrix::new(),
            rhs: Vec::new(),
            do_build: true,
            timers: TimerStats::new(),
            stages: StageTimers::default(),
            last_report: None,
        }
    }

    /// 按设置脚本创建并回放全部设置
    ///
    /// 回放顺序：选项、关联、初始条件、边界条件、反应项、源项。
    /// 任一步失败即返回该步的错误。
    pub fn from_setup(setup: &EquationSetup, locations: &MeshLocations) -> EquationResult<Self> {
        setup.validate()?;
        let eq_type = EquationType::from_keyword(&setup.equation_type).ok_or_else(|| {
            ConfigError::invalid_value(
                "equation_type",
                &setup.equation_type,
                format!("可选 {}", EquationType::keywords().join(", ")),
            )
        })?;
        let var_type = VarType::from_keyword(&setup.var_type).ok_or_else(|| {
            ConfigError::invalid_value(
                "var_type",
                &setup.var_type,
                format!("可选 {}", VarType::keywords().join(", ")),
            )
        })?;
        let default_bc = match BcType::from_keyword(&setup.default_bc) {
            Some(bc @ (BcType::HomogeneousDirichlet | BcType::HomogeneousNeumann)) => bc,
            _ => {
                return Err(ConfigError::invalid_value(
                    "default_bc",
                    &setup.default_bc,
                    "可选 zero_value, zero_flux",
                )
                .into())
            }
        };

        let mut eq = Self::new(&setup.name, &setup.varname, eq_type, var_type, default_bc);
        for opt in &setup.options {
            eq.set_option(&opt.key, &opt.value)?;
        }
        for link in &setup.links {
            eq.link(&link.term, &link.name)?;
        }
        for ic in &setup.initial_conditions {
            eq.set_ic(locations, ic.location.as_deref(), Definition::value(ic.value))?;
        }
        for bc in &setup.boundary_conditions {
            eq.add_bc(locations, &bc.location, &bc.kind, Definition::Value(bc.value.clone()))?;
        }
        for r in &setup.reactions {
            let r_id = eq.add_reaction(r.name.as_deref(), &r.kind, &r.property)?;
            let r_name = eq.param.reaction_terms[r_id].name.clone();
            for opt in &r.options {
                eq.set_reaction_option(Some(&r_name), &opt.key, &opt.value)?;
            }
        }
        for st in &setup.source_terms {
            let st_id =
                eq.add_source_term_by_val(locations, st.name.as_deref(), &st.location, st.value.clone())?;
            let st_name = eq.param.source_terms[st_id].name.clone();
            for opt in &st.options {
                eq.set_source_term_option(Some(&st_name), &opt.key, &opt.value)?;
            }
        }
        log::debug!("方程 {}: 已回放设置脚本", eq.name);
        Ok(eq)
    }

    // =========================================================================
    // 内部工具
    // =========================================================================

    fn timed<T>(&mut self, id: Option<TimerId>, f: impl FnOnce(&mut Self) -> T) -> T {
        if let Some(id) = id {
            self.timers.start(id);
        }
        let out = f(self);
        if let Some(id) = id {
            self.timers.stop(id);
        }
        out
    }

    fn invalid_state(&self, action: &'static str) -> EquationError {
        let err = EquationError::InvalidState {
            name: self.name.clone(),
            state: self.state.to_string(),
            action,
        };
        log::error!("{}", err);
        err
    }

    fn configure<T>(
        &mut self,
        f: impl FnOnce(&mut EquationParam) -> ConfigResult<T>,
    ) -> EquationResult<T> {
        let out = self.timed(self.stages.main, |eq| f(&mut eq.param));
        match out {
            Ok(v) => {
                if self.state == EquationState::Created {
                    self.state = EquationState::Configured;
                }
                Ok(v)
            }
            Err(e) => {
                log::error!("方程 {}: {}", self.name, e);
                Err(e.into())
            }
        }
    }

    fn resolve(&self, locations: &MeshLocations, name: &str) -> EquationResult<LocationRef> {
        let found = locations
            .id_by_name(name)
            .and_then(|id| locations.get(id).map(|l| (id, l.kind)));
        match found {
            Some((id, kind)) => Ok(LocationRef::new(id, name, kind)),
            None => {
                let err = ConfigError::InvalidLocation(name.to_string());
                log::error!("方程 {}: {}", self.name, err);
                Err(err.into())
            }
        }
    }

    fn require_scheme(&self, action: &'static str) -> EquationResult<&'static dyn SpaceDiscretization> {
        self.scheme.ok_or_else(|| self.invalid_state(action))
    }

    fn require_field(&self) -> EquationResult<FieldId> {
        self.field_id.ok_or_else(|| {
            EquationError::resource(&self.name, format!("场 {} 尚未创建", self.varname))
        })
    }

    // =========================================================================
    // 设置接口
    // =========================================================================

    /// 按键设置选项
    pub fn set_option(&mut self, key: &str, val: &str) -> EquationResult<()> {
        self.configure(|p| p.set_option(key, val))
    }

    /// 关联物性或对流场（`diffusion`、`time`、`advection`）
    pub fn link(&mut self, term: &str, name: &str) -> EquationResult<()> {
        self.configure(|p| p.link(term, name))
    }

    /// 添加初始条件
    ///
    /// `location` 为 None 时在 `init_system` 中按格式取 `vertices` 或 `cells`。
    pub fn set_ic(
        &mut self,
        locations: &MeshLocations,
        location: Option<&str>,
        def: Definition,
    ) -> EquationResult<()> {
        let loc = location.map(|n| self.resolve(locations, n)).transpose()?;
        self.configure(|p| p.set_ic(loc, def))
    }

    /// 添加边界条件，返回定义序号
    pub fn add_bc(
        &mut self,
        locations: &MeshLocations,
        location: &str,
        bc_key: &str,
        def: Definition,
    ) -> EquationResult<usize> {
        let loc = self.resolve(locations, location)?;
        self.configure(|p| p.add_bc(loc, bc_key, def))
    }

    /// 添加线性反应项，返回反应项序号
    pub fn add_reaction(
        &mut self,
        name: Option<&str>,
        kind: &str,
        property: &str,
    ) -> EquationResult<usize> {
        self.configure(|p| p.add_reaction(name, kind, property))
    }

    /// 设置反应项选项，`name` 为 None 时作用于全部反应项
    pub fn set_reaction_option(
        &mut self,
        name: Option<&str>,
        key: &str,
        val: &str,
    ) -> EquationResult<()> {
        self.configure(|p| p.set_reaction_option(name, key, val))
    }

    /// 添加常数源项，返回源项序号
    pub fn add_source_term_by_val(
        &mut self,
        locations: &MeshLocations,
        name: Option<&str>,
        location: &str,
        value: Vec<f64>,
    ) -> EquationResult<usize> {
        let loc = self.resolve(locations, location)?;
        self.configure(|p| p.add_source_term_by_val(name, loc, value))
    }

    /// 添加解析函数源项，返回源项序号
    pub fn add_source_term_by_analytic(
        &mut self,
        locations: &MeshLocations,
        name: Option<&str>,
        location: &str,
        func: AnalyticFn,
    ) -> EquationResult<usize> {
        let loc = self.resolve(locations, location)?;
        self.configure(|p| p.add_source_term_by_analytic(name, loc, func))
    }

    /// 添加逐单元数组定义的重力源项
    pub fn add_gravity_source_term(
        &mut self,
        locations: &MeshLocations,
        location: &str,
        values: Vec<f64>,
    ) -> EquationResult<usize> {
        let loc = self.resolve(locations, location)?;
        self.configure(|p| p.add_gravity_source_term(loc, values))
    }

    /// 设置源项选项，`name` 为 None 时作用于全部源项
    pub fn set_source_term_option(
        &mut self,
        name: Option<&str>,
        key: &str,
        val: &str,
    ) -> EquationResult<()> {
        self.configure(|p| p.set_source_term_option(name, key, val))
    }

    // =========================================================================
    // 生命周期
    // =========================================================================

    /// 设置结束：检查格式组合、绑定线性求解器并锁定参数
    pub fn last_setup(&mut self, registry: &BindingRegistry) -> EquationResult<()> {
        if self.param.is_locked() {
            return Err(self.invalid_state("last_setup"));
        }

        if self.param.verbosity > 0 {
            let main = self.timers.create("stages", &self.name);
            self.timers.set_plot(main, true);
            self.stages.main = Some(main);
        }
        if self.param.verbosity > 1 {
            let mut stage = |suffix: &str| {
                let id = self.timers.create(&self.name, &format!("{}_{}", self.name, suffix));
                self.timers.set_plot(id, true);
                Some(id)
            };
            let pre = stage("pre");
            let solve = stage("solve");
            let extra_op = stage("extra_op");
            self.stages.pre = pre;
            self.stages.solve = solve;
            self.stages.extra_op = extra_op;
        }

        self.timed(self.stages.main, |eq| eq.bind(registry))
    }

    fn bind(&mut self, registry: &BindingRegistry) -> EquationResult<()> {
        let scheme = discretization(self.param.space_scheme);
        if let Err(e) = scheme.check_setup(&self.param) {
            log::error!("方程 {}: {}", self.name, e);
            return Err(e.into());
        }

        if scheme.scheme() == SpaceScheme::VertexBased && self.param.has_wbs_reaction() {
            self.param.flag |= TermFlags::HCONF_ST;
        }

        let sles = registry
            .bind(&self.name, &self.param.linear_solver_param())
            .map_err(|e| {
                log::error!("方程 {}: {}", self.name, e);
                e
            })?;

        self.param.lock();
        self.scheme = Some(scheme);
        self.sles = Some(sles);
        self.do_build = true;
        self.state = EquationState::Locked;
        log::debug!(
            "方程 {}: 已锁定 (格式 {}, 求解器 {})",
            self.name,
            scheme.scheme(),
            self.sles.as_ref().map_or("-", |s| s.solver_name())
        );
        Ok(())
    }

    /// 在注册表中创建未知场，返回场编号
    ///
    /// 场位置由格式决定（点基为顶点，面基为单元）；非定常方程保存前一时刻值。
    pub fn create_field(
        &mut self,
        fields: &mut FieldRegistry,
        mesh: &MeshContext,
    ) -> EquationResult<FieldId> {
        let scheme = self.require_scheme("create_field")?;
        self.timed(self.stages.main, |eq| {
            let dim = eq.param.var_type.dim();
            let location = scheme.field_location();
            let n_elts = mesh.mesh.n_elements(location);
            let id = fields.create_field(&eq.varname, dim, location, n_elts, eq.param.is_unsteady());
            match fields.get(id) {
                Some(f) if f.dim == dim && f.location == location && f.n_elts() == n_elts => {
                    eq.field_id = Some(id);
                    Ok(id)
                }
                _ => Err(EquationError::resource(
                    &eq.name,
                    format!("场 {} 已存在且与格式 {} 不兼容", eq.varname, scheme.scheme()),
                )),
            }
        })
    }

    /// 创建构建器、计算源项并施加初始条件
    ///
    /// 只有非定常且有初始条件定义时才写入场；否则场保持零值。
    pub fn init_system(
        &mut self,
        mesh: &Arc<MeshContext>,
        props: &PropertyRegistry,
        fields: &mut FieldRegistry,
        ts: TimeStep,
    ) -> EquationResult<()> {
        let scheme = self.require_scheme("init_system")?;
        let field_id = self.require_field()?;
        self.timed(self.stages.main, |eq| {
            let mut builder = scheme.init_builder(&eq.param, Arc::clone(mesh), props)?;
            builder.compute_source(ts.t_cur)?;

            if eq.param.is_unsteady() && !eq.param.ic_definitions.is_empty() {
                let field = fields.get_mut(field_id).ok_or_else(|| {
                    EquationError::resource(&eq.name, format!("场 {} 不存在", eq.varname))
                })?;
                apply_initial_conditions(
                    &eq.param,
                    scheme.field_location(),
                    mesh,
                    ts.t_cur,
                    &mut field.val,
                    builder.face_values_mut(),
                )?;
                log::debug!(
                    "方程 {}: 施加 {} 个初始条件",
                    eq.name,
                    eq.param.ic_definitions.len()
                );
            }

            eq.builder = Some(builder);
            eq.do_build = true;
            Ok(())
        })
    }

    /// 组装线性系统
    ///
    /// 返回是否真正重建；不需要重建时什么也不做并返回 `Ok(false)`。
    pub fn build_system(
        &mut self,
        fields: &FieldRegistry,
        ts: TimeStep,
        dt: f64,
    ) -> EquationResult<bool> {
        if self.builder.is_none() {
            return Err(self.invalid_state("build_system"));
        }
        if !self.do_build {
            log::debug!("方程 {}: 系统无需重建", self.name);
            return Ok(false);
        }
        let field_id = self.require_field()?;
        let field = fields
            .get(field_id)
            .ok_or_else(|| EquationError::resource(&self.name, format!("场 {} 不存在", self.varname)))?;

        self.timed(self.stages.pre, |eq| eq.assemble(&field.val, ts, dt))?;
        self.do_build = false;
        self.state = EquationState::Built;
        Ok(true)
    }

    fn assemble(&mut self, field_val: &[f64], ts: TimeStep, dt: f64) -> EquationResult<()> {
        let Some(builder) = self.builder.as_mut() else {
            return Err(EquationError::InvalidState {
                name: self.name.clone(),
                state: self.state.to_string(),
                action: "build_system",
            });
        };
        let sys = builder.build_system(field_val, ts, dt)?;

        if self.param.verbosity > 1 && ts.nt_cur == 0 {
            let info = sys.matrix.msr().info();
            log::info!("  <{}/matrix> 行数 {}", self.name, info.n_rows);
            log::info!("  <{}/matrix> 非零元 {}", self.name, info.nnz);
            log::info!("  <{}/matrix> 填充率 {:.2e}", self.name, info.fillin);
            log::info!(
                "  <{}/matrix> 模板 最小 {} 最大 {} 平均 {:.2}",
                self.name,
                info.stencil_min,
                info.stencil_max,
                info.stencil_mean
            );
        }

        match sys.matrix {
            MatrixHandoff::Copy(m) => self.matrix.copy_coefficients(m)?,
            MatrixHandoff::Transfer(m) => self.matrix.transfer_coefficients(m)?,
        }
        self.rhs = sys.rhs;
        Ok(())
    }

    /// 求解已组装的系统并更新场
    ///
    /// 未收敛不是错误，结果码见返回的 [`SolveReport`]。
    pub fn solve(&mut self, fields: &mut FieldRegistry, log_cvg: bool) -> EquationResult<SolveReport> {
        if self.state != EquationState::Built || !self.matrix.is_assembled() {
            return Err(self.invalid_state("solve"));
        }
        let field_id = self.require_field()?;
        let field = fields
            .get_mut(field_id)
            .ok_or_else(|| EquationError::resource(&self.name, format!("场 {} 不存在", self.varname)))?;

        let (report, x) = self.timed(self.stages.solve, |eq| eq.run_solver(&field.val, log_cvg))?;

        self.timed(self.stages.extra_op, |eq| {
            field.current_to_previous();
            if let Some(builder) = eq.builder.as_mut() {
                builder.update_field(&x, &mut field.val);
            }
        });

        if self.param.is_unsteady() {
            self.do_build = true;
        }
        self.state = EquationState::Solved;
        self.last_report = Some(report);
        Ok(report)
    }

    fn run_solver(&mut self, field_val: &[f64], log_cvg: bool) -> EquationResult<(SolveReport, Vec<f64>)> {
        let (Some(builder), Some(sles)) = (self.builder.as_ref(), self.sles.as_mut()) else {
            return Err(EquationError::InvalidState {
                name: self.name.clone(),
                state: self.state.to_string(),
                action: "solve",
            });
        };
        let itsol = &self.param.itsol;

        if self.param.sles_verbosity > 0 {
            log::info!("========================================");
            log::info!(" 求解方程 {} (变量 {})", self.name, self.varname);
            log::info!("========================================");
        }

        let n = self.rhs.len();
        let r_norm = if itsol.resnorm && n > 0 {
            let nrm = norm2(&self.rhs) / n as f64;
            if nrm > DBL_MIN {
                nrm
            } else {
                1.0
            }
        } else {
            1.0
        };

        let mut x = builder.initial_guess(field_val);
        let ctl = SolveControl::new(itsol.eps, r_norm, itsol.n_max_iter);
        let result = sles.solve(&self.matrix, ctl, &self.rhs, &mut x)?;
        let report = SolveReport::from(result);

        if log_cvg {
            log::info!(
                "  <{}/sles_cvg> code {:3} n_iters {:4} residual {:12.4e}",
                self.name,
                report.code.code(),
                report.n_iters,
                report.residual
            );
        }
        if !report.is_converged() {
            log::warn!(
                "方程 {}: 线性求解未收敛 ({}, {} 次迭代, 残差 {:.4e})",
                self.name,
                report.code,
                report.n_iters,
                report.residual
            );
        }
        Ok((report, x))
    }

    /// 求解后的附加处理，返回 (标签, 统计量) 列表
    ///
    /// 后处理标志含 `NONE` 时直接返回空列表。
    pub fn extra_op(&mut self, ts: TimeStep) -> EquationResult<Vec<(String, DataStats)>> {
        if self.param.process_flag.contains(ProcessFlag::NONE) {
            return Ok(Vec::new());
        }
        if self.builder.is_none() {
            return Err(self.invalid_state("extra_op"));
        }
        log::trace!("方程 {}: extra_op (nt = {})", self.name, ts.nt_cur);
        Ok(self.timed(self.stages.extra_op, |eq| {
            eq.builder
                .as_ref()
                .map(|b| b.extra_op(&eq.name, eq.param.process_flag))
                .unwrap_or_default()
        }))
    }

    // =========================================================================
    // 摘要
    // =========================================================================

    /// 以 info 级别输出全部设置
    pub fn summary(&self) {
        let p = &self.param;
        let n = &self.name;
        log::info!("");
        log::info!("方程 {} 设置摘要 (变量 {})", n, self.varname);
        log::info!("  <{}> 类型 {}, 变量 {}, 格式 {}", n, p.eq_type, p.var_type, p.space_scheme);
        log::info!(
            "  <{}> 项: 非定常 {}, 对流 {}, 扩散 {}, 反应 {}, 源项 {}",
            n,
            p.flag.contains(TermFlags::UNSTEADY),
            p.flag.contains(TermFlags::CONVECTION),
            p.flag.contains(TermFlags::DIFFUSION),
            p.flag.contains(TermFlags::REACTION),
            !p.source_terms.is_empty()
        );

        log::info!(
            "  <{}/bc> 默认 {}, 施加方式 {}, 定义数 {}",
            n,
            p.bc.default_bc,
            p.bc.enforcement,
            p.bc.defs.len()
        );
        for bc in &p.bc.defs {
            log::info!(
                "  <{}/bc> 位置 {} 类型 {} 定义 {}",
                n,
                bc.location.name,
                bc.bc_type,
                bc.def.kind()
            );
        }

        if p.is_unsteady() {
            log::info!(
                "  <{}/time> 格式 {}, theta {:.2}, 集中 {}, 物性 {}",
                n,
                p.time_scheme,
                p.theta,
                p.do_lumping,
                p.time_property.as_deref().unwrap_or("-")
            );
            log::info!(
                "  <{}/time> Hodge {} / {}, 初始条件 {}",
                n,
                p.time_hodge.hodge_type,
                p.time_hodge.algo,
                p.ic_definitions.len()
            );
        }

        if p.flag.contains(TermFlags::DIFFUSION) {
            log::info!(
                "  <{}/diffusion> 物性 {}, Hodge {} / {}, coef {:.3}",
                n,
                p.diffusion_property.as_deref().unwrap_or("-"),
                p.diffusion_hodge.hodge_type,
                p.diffusion_hodge.algo,
                p.diffusion_hodge.coef
            );
        }

        if p.flag.contains(TermFlags::CONVECTION) {
            log::info!(
                "  <{}/advection> 场 {}, 形式 {}, 权重 {}, 判据 {}, 积分 {}",
                n,
                p.advection_field.as_deref().unwrap_or("-"),
                p.advection.formulation,
                p.advection.weight_algo,
                p.advection.weight_criterion,
                p.advection.quad_type
            );
        }

        for r in &p.reaction_terms {
            log::info!(
                "  <{}/reaction> {} ({}) 物性 {}, Hodge {} / {}, 集中 {}",
                n,
                r.name,
                r.kind,
                r.property,
                r.hodge.hodge_type,
                r.hodge.algo,
                r.do_lumping
            );
        }

        for st in &p.source_terms {
            log::info!(
                "  <{}/source> {} ({}) 位置 {}, 定义 {}, 积分 {}, 输出 {}",
                n,
                st.name,
                st.kind,
                st.location.name,
                st.def.kind(),
                st.quadrature,
                st.post
            );
        }

        let it = &p.itsol;
        log::info!(
            "  <{}/sles> {} {} + {}, eps {:.2e}, 最大迭代 {}, 归一化 {}",
            n,
            it.family,
            it.solver,
            it.precond,
            it.eps,
            it.n_max_iter,
            it.resnorm
        );
    }

    // =========================================================================
    // 查询
    // =========================================================================

    /// 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 变量名
    pub fn varname(&self) -> &str {
        &self.varname
    }

    /// 当前状态
    pub fn state(&self) -> EquationState {
        self.state
    }

    /// 场编号
    pub fn field_id(&self) -> Option<FieldId> {
        self.field_id
    }

    /// 项标志
    pub fn flag(&self) -> TermFlags {
        self.param.flag
    }

    /// 参数
    pub fn param(&self) -> &EquationParam {
        &self.param
    }

    /// 扩散物性名称
    pub fn diffusion_property(&self) -> Option<&str> {
        self.param.diffusion_property.as_deref()
    }

    /// 时间项物性名称
    pub fn time_property(&self) -> Option<&str> {
        self.param.time_property.as_deref()
    }

    /// 第 `r_id` 个反应项的物性名称
    pub fn reaction_property(&self, r_id: usize) -> Option<&str> {
        self.param.reaction_terms.get(r_id).map(|r| r.property.as_str())
    }

    /// 空间格式
    pub fn space_scheme(&self) -> SpaceScheme {
        self.param.space_scheme
    }

    /// 变量类型
    pub fn var_type(&self) -> VarType {
        self.param.var_type
    }

    /// 方程类型
    pub fn equation_type(&self) -> EquationType {
        self.param.eq_type
    }

    /// 是否定常
    pub fn is_steady(&self) -> bool {
        !self.param.is_unsteady()
    }

    /// 下一次 `build_system` 是否会重建
    pub fn needs_build(&self) -> bool {
        self.do_build
    }

    /// 面值（仅面基格式，`init_system` 之后可用）
    pub fn face_values(&self) -> Option<&[f64]> {
        let scheme = self.scheme?;
        if !scheme.has_face_values() {
            return None;
        }
        self.builder.as_ref().and_then(|b| b.face_values())
    }

    /// 最近一次求解报告
    pub fn last_report(&self) -> Option<SolveReport> {
        self.last_report
    }

    /// 已绑定的线性求解器
    pub fn sles(&self) -> Option<&Sles> {
        self.sles.as_ref()
    }

    /// 求解侧矩阵
    pub fn matrix(&self) -> &SystemMatrix {
        &self.matrix
    }

    /// 右端项
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// 计时统计
    pub fn timers(&self) -> &TimerStats {
        &self.timers
    }
}

fn apply_initial_conditions(
    param: &EquationParam,
    field_location: LocationKind,
    mesh: &MeshContext,
    t: f64,
    val: &mut [f64],
    mut face_vals: Option<&mut [f64]>,
) -> EquationResult<()> {
    let q = &mesh.quant;
    let default_name = match field_location {
        LocationKind::Vertices => "vertices",
        _ => "cells",
    };
    for ic in &param.ic_definitions {
        let ml_id = match &ic.location {
            Some(loc) => loc.id,
            None => mesh.locations.require(default_name)?,
        };
        if field_location == LocationKind::Vertices {
            for v in mesh.location_vertices(ml_id)? {
                val[v] = ic.def.eval(t, q.vtx_coords[v], v);
            }
            continue;
        }
        let cells = mesh.location_cells(ml_id)?;
        for &c in &cells {
            val[c] = ic.def.eval(t, q.cell_centers[c], c);
        }
        if let Some(fv) = face_vals.as_deref_mut() {
            for &c in &cells {
                for &f in mesh.connect.c2f.row(c) {
                    fv[f] = ic.def.eval(t, q.face_centers[f], f);
                }
            }
        }
    }
    Ok(())
}
