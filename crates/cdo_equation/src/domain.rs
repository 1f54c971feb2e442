// crates/cdo_equation/src/domain.rs

//! CdoDomain - 方程集合的驱动
//!
//! 持有网格上下文、场注册表、物性注册表与全部方程，
//! 按登记顺序逐个推进：
//!
//! 1. `initialize`：`last_setup` → `create_field` → `init_system`
//! 2. `solve_steady`：定常方程组装并求解一次
//! 3. `time_step`：非定常方程按 `needs_build` 重建并求解，时间前进 `dt`

use std::sync::Arc;

use cdo_config::ConfigError;
use cdo_mesh::{MeshContext, MeshLocations};
use cdo_sles::BindingRegistry;

use crate::equation::Equation;
use crate::error::{EquationError, EquationResult, SolveReport};
use crate::field::FieldRegistry;
use crate::property::PropertyRegistry;
use crate::scheme::TimeStep;
use crate::walldistance;

const DOMAIN_NAME: &str = "domain";

/// 计算域
pub struct CdoDomain {
    mesh: Arc<MeshContext>,
    fields: FieldRegistry,
    props: PropertyRegistry,
    bindings: BindingRegistry,
    equations: Vec<Equation>,
    wall_distance: Option<usize>,
    time: TimeStep,
    initialized: bool,
}

impl CdoDomain {
    /// 以网格创建计算域，线性求解器使用内置绑定
    pub fn new(mesh: MeshContext) -> Self {
        Self {
            mesh: Arc::new(mesh),
            fields: FieldRegistry::new(),
            props: PropertyRegistry::new(),
            bindings: BindingRegistry::with_defaults(),
            equations: Vec::new(),
            wall_distance: None,
            time: TimeStep::default(),
            initialized: false,
        }
    }

    fn invalid_state(&self, action: &'static str) -> EquationError {
        EquationError::InvalidState {
            name: DOMAIN_NAME.to_string(),
            state: if self.initialized { "initialized" } else { "setup" }.to_string(),
            action,
        }
    }

    /// 登记方程，返回其序号；同名方程或初始化之后登记都会失败
    pub fn add_equation(&mut self, eq: Equation) -> EquationResult<usize> {
        if self.initialized {
            return Err(self.invalid_state("add_equation"));
        }
        if self.equations.iter().any(|e| e.name() == eq.name()) {
            return Err(ConfigError::incompatible(eq.name(), "方程名称重复").into());
        }
        log::debug!("登记方程 {} (#{})", eq.name(), self.equations.len());
        self.equations.push(eq);
        Ok(self.equations.len() - 1)
    }

    /// 登记壁面距离方程，`wall` 为壁面所在的网格位置
    pub fn add_wall_distance(&mut self, wall: &str) -> EquationResult<usize> {
        if let Some(id) = self.wall_distance {
            return Ok(id);
        }
        let eq = walldistance::create(&self.mesh.locations, wall)?;
        let id = self.add_equation(eq)?;
        self.wall_distance = Some(id);
        Ok(id)
    }

    /// 以网格位置为上下文设置第 `id` 个方程
    pub fn configure<T, F>(&mut self, id: usize, f: F) -> EquationResult<T>
    where
        F: FnOnce(&mut Equation, &MeshLocations) -> EquationResult<T>,
    {
        let eq = self
            .equations
            .get_mut(id)
            .ok_or_else(|| EquationError::resource(DOMAIN_NAME, format!("方程 #{} 不存在", id)))?;
        f(eq, &self.mesh.locations)
    }

    /// 锁定全部方程、创建场与构建器
    pub fn initialize(&mut self) -> EquationResult<()> {
        if self.initialized {
            return Err(self.invalid_state("initialize"));
        }
        for eq in &mut self.equations {
            eq.last_setup(&self.bindings)?;
            eq.create_field(&mut self.fields, &self.mesh)?;
            eq.init_system(&self.mesh, &self.props, &mut self.fields, self.time)?;
            if eq.param().verbosity > 0 {
                eq.summary();
            }
        }
        self.initialized = true;
        log::info!(
            "计算域初始化完成: {} 个方程, {} 个场",
            self.equations.len(),
            self.fields.len()
        );
        Ok(())
    }

    fn advance(
        eq: &mut Equation,
        fields: &mut FieldRegistry,
        ts: TimeStep,
        dt: f64,
    ) -> EquationResult<SolveReport> {
        eq.build_system(fields, ts, dt)?;
        let report = eq.solve(fields, true)?;
        for (tag, stats) in eq.extra_op(ts)? {
            stats.log(&tag);
        }
        Ok(report)
    }

    /// 求解尚未求解过的定常方程，返回 (方程名, 报告)
    pub fn solve_steady(&mut self) -> EquationResult<Vec<(String, SolveReport)>> {
        if !self.initialized {
            return Err(self.invalid_state("solve_steady"));
        }
        let mut reports = Vec::new();
        for (id, eq) in self.equations.iter_mut().enumerate() {
            if !eq.is_steady() || !eq.needs_build() {
                continue;
            }
            let report = Self::advance(eq, &mut self.fields, self.time, 0.0)?;
            if self.wall_distance == Some(id) {
                walldistance::compute(eq, &self.mesh, &mut self.fields)?;
            }
            reports.push((eq.name().to_string(), report));
        }
        Ok(reports)
    }

    /// 推进一个时间步
    ///
    /// 尚未求解的定常方程先求解一次，随后非定常方程逐个重建并求解。
    pub fn time_step(&mut self, dt: f64) -> EquationResult<Vec<(String, SolveReport)>> {
        if !self.initialized {
            return Err(self.invalid_state("time_step"));
        }
        if dt.is_nan() || dt <= 0.0 {
            return Err(ConfigError::invalid_value("dt", dt.to_string(), "时间步长必须为正").into());
        }
        let mut reports = self.solve_steady()?;
        for eq in self.equations.iter_mut().filter(|e| !e.is_steady()) {
            let report = Self::advance(eq, &mut self.fields, self.time, dt)?;
            reports.push((eq.name().to_string(), report));
        }
        self.time.nt_cur += 1;
        self.time.t_cur += dt;
        log::debug!("时间步 {} 完成, t = {:.6e}", self.time.nt_cur, self.time.t_cur);
        Ok(reports)
    }

    /// 输出全部方程的计时统计
    pub fn log_timers(&self) {
        for eq in &self.equations {
            if !eq.timers().is_empty() {
                eq.timers().log_summary();
            }
        }
    }

    /// 网格上下文
    pub fn mesh(&self) -> &Arc<MeshContext> {
        &self.mesh
    }

    /// 网格位置
    pub fn locations(&self) -> &MeshLocations {
        &self.mesh.locations
    }

    /// 场注册表
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// 物性注册表
    pub fn properties(&self) -> &PropertyRegistry {
        &self.props
    }

    /// 物性注册表（可变），初始化之前登记物性与对流场
    pub fn properties_mut(&mut self) -> &mut PropertyRegistry {
        &mut self.props
    }

    /// 线性求解器绑定注册表（可变）
    pub fn bindings_mut(&mut self) -> &mut BindingRegistry {
        &mut self.bindings
    }

    /// 第 `id` 个方程
    pub fn equation(&self, id: usize) -> Option<&Equation> {
        self.equations.get(id)
    }

    /// 按名称查找方程
    pub fn equation_by_name(&self, name: &str) -> Option<&Equation> {
        self.equations.iter().find(|e| e.name() == name)
    }

    /// 全部方程
    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// 当前时间步
    pub fn time(&self) -> TimeStep {
        self.time
    }

    /// 场当前值
    pub fn field_values(&self, var: &str) -> Option<&[f64]> {
        self.fields.by_name(var).map(|f| f.val.as_slice())
    }
}
