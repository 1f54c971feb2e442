// crates/cdo_equation/src/param/mod.rs

//! EquationParam - 单个方程的声明式配置
//!
//! 通过键值对 [`EquationParam::set_option`] 与若干 `add_*` 接口填写；
//! `last_setup` 之后置 LOCKED 位，任何修改都返回 [`ConfigError::Locked`]
//! 且不改动参数本身。
//!
//! 参数与网格无关：需要网格位置的接口接收已解析的 [`LocationRef`]，
//! 名称查找由方程层完成。

pub mod definition;
pub mod types;

pub use definition::{
    AnalyticFn, BcDef, BcParam, Definition, InitialCondition, LocationRef, ReactionKind,
    ReactionTerm, SourceTerm, SourceTermKind,
};
pub use types::{
    parse_hodge_coef, AdvCriterion, AdvFormulation, AdvParam, AdvWeight, BcEnforcement, BcType,
    EquationType, HodgeAlgo, HodgeParam, HodgeType, ProcessFlag, QuadratureType, SpaceScheme,
    TermFlags, TimeScheme, VarType, HODGE_COEF_DGA,
};

use cdo_config::{ConfigError, ConfigResult};
use cdo_foundation::is_zero_value;
use cdo_sles::{LinearSolverParam, PrecondKind, SolverFamily, SolverKind};

// =============================================================================
// 选项键
// =============================================================================

/// `set_option` 可用的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqKey {
    /// 空间格式
    SpaceScheme,
    /// 扩散 Hodge 算法
    HodgeDiffAlgo,
    /// 扩散 Hodge 系数
    HodgeDiffCoef,
    /// 时间 Hodge 算法
    HodgeTimeAlgo,
    /// 时间 Hodge 系数
    HodgeTimeCoef,
    /// 求解器家族
    SolverFamily,
    /// 迭代求解器
    Itsol,
    /// 最大迭代次数
    ItsolMaxIter,
    /// 收敛精度
    ItsolEps,
    /// 残差归一化
    ItsolResnorm,
    /// 线性求解器输出级别
    ItsolVerbosity,
    /// 块 Jacobi / Schwarz 子域数
    ItsolSubdomains,
    /// 预条件子
    Precond,
    /// 方程输出级别
    Verbosity,
    /// Dirichlet 施加方式
    BcEnforcement,
    /// 边界积分规则
    BcQuadrature,
    /// 额外操作
    ExtraOp,
    /// 对流形式
    AdvFormulation,
    /// 对流权重
    AdvWeight,
    /// 对流权重判据
    AdvWeightCriterion,
    /// 对流通量积分
    AdvFluxQuad,
    /// 时间格式
    TimeScheme,
    /// θ 值
    TimeTheta,
}

impl EqKey {
    /// 全部键，按关键字顺序
    pub const ALL: [EqKey; 23] = [
        Self::SpaceScheme,
        Self::HodgeDiffAlgo,
        Self::HodgeDiffCoef,
        Self::HodgeTimeAlgo,
        Self::HodgeTimeCoef,
        Self::SolverFamily,
        Self::Itsol,
        Self::ItsolMaxIter,
        Self::ItsolEps,
        Self::ItsolResnorm,
        Self::ItsolVerbosity,
        Self::ItsolSubdomains,
        Self::Precond,
        Self::Verbosity,
        Self::BcEnforcement,
        Self::BcQuadrature,
        Self::ExtraOp,
        Self::AdvFormulation,
        Self::AdvWeight,
        Self::AdvWeightCriterion,
        Self::AdvFluxQuad,
        Self::TimeScheme,
        Self::TimeTheta,
    ];

    /// 关键字
    pub fn keyword(self) -> &'static str {
        match self {
            Self::SpaceScheme => "space_scheme",
            Self::HodgeDiffAlgo => "hodge_diff_algo",
            Self::HodgeDiffCoef => "hodge_diff_coef",
            Self::HodgeTimeAlgo => "hodge_time_algo",
            Self::HodgeTimeCoef => "hodge_time_coef",
            Self::SolverFamily => "solver_family",
            Self::Itsol => "itsol",
            Self::ItsolMaxIter => "itsol_max_iter",
            Self::ItsolEps => "itsol_eps",
            Self::ItsolResnorm => "itsol_resnorm",
            Self::ItsolVerbosity => "itsol_verbosity",
            Self::ItsolSubdomains => "itsol_subdomains",
            Self::Precond => "precond",
            Self::Verbosity => "verbosity",
            Self::BcEnforcement => "bc_enforcement",
            Self::BcQuadrature => "bc_quadrature",
            Self::ExtraOp => "extra_op",
            Self::AdvFormulation => "adv_formulation",
            Self::AdvWeight => "adv_weight",
            Self::AdvWeightCriterion => "adv_weight_criterion",
            Self::AdvFluxQuad => "adv_flux_quad",
            Self::TimeScheme => "time_scheme",
            Self::TimeTheta => "time_theta",
        }
    }

    /// 从关键字解析
    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.keyword() == s)
    }
}

/// `set_reaction_option` 可用的键
pub const REACTION_KEYS: [&str; 4] = ["lumping", "hodge_algo", "hodge_coef", "inv_pty"];

/// `set_source_term_option` 可用的键
pub const SOURCE_TERM_KEYS: [&str; 2] = ["quadrature", "post"];

trait NamedTerm {
    fn term_name(&self) -> &str;
}

impl NamedTerm for ReactionTerm {
    fn term_name(&self) -> &str {
        &self.name
    }
}

impl NamedTerm for SourceTerm {
    fn term_name(&self) -> &str {
        &self.name
    }
}

fn parse_bool(key: &str, val: &str) -> ConfigResult<bool> {
    match val {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, val, "可选 true 或 false")),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, val: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::invalid_value(key, val, "无法解析为数值"))
}

fn parse_keyword<T>(
    key: &str,
    val: &str,
    parse: fn(&str) -> Option<T>,
    choices: &[&str],
) -> ConfigResult<T> {
    parse(val).ok_or_else(|| {
        ConfigError::invalid_value(key, val, format!("可选 {}", choices.join(", ")))
    })
}

// =============================================================================
// EquationParam
// =============================================================================

/// 方程参数
#[derive(Debug, Clone)]
pub struct EquationParam {
    owner: String,
    /// 方程类型
    pub eq_type: EquationType,
    /// 变量类型
    pub var_type: VarType,
    /// 方程输出级别
    pub verbosity: i32,
    /// 线性求解器输出级别
    pub sles_verbosity: i32,
    /// 后处理标志
    pub process_flag: ProcessFlag,
    /// 项标志
    pub flag: TermFlags,
    /// 空间格式
    pub space_scheme: SpaceScheme,

    /// 时间项 Hodge 算子
    pub time_hodge: HodgeParam,
    /// 时间格式
    pub time_scheme: TimeScheme,
    /// θ 值
    pub theta: f64,
    /// 时间项是否质量集中
    pub do_lumping: bool,
    /// 初始条件
    pub ic_definitions: Vec<InitialCondition>,
    /// 时间项物性
    pub time_property: Option<String>,

    /// 扩散 Hodge 算子
    pub diffusion_hodge: HodgeParam,
    /// 扩散物性
    pub diffusion_property: Option<String>,

    /// 对流选项
    pub advection: AdvParam,
    /// 对流场
    pub advection_field: Option<String>,

    /// 反应项
    pub reaction_terms: Vec<ReactionTerm>,
    /// 源项
    pub source_terms: Vec<SourceTerm>,
    /// 边界条件
    pub bc: BcParam,
    /// 线性代数
    pub itsol: LinearSolverParam,
}

impl EquationParam {
    /// 以默认值创建
    ///
    /// 点基格式、隐式时间格式、扩散 EpFd/COST、时间 VpCd/Voronoi、
    /// 内置 CG + Jacobi（2500 次迭代，eps = 1e-12）。
    pub fn new(
        owner: impl Into<String>,
        eq_type: EquationType,
        var_type: VarType,
        default_bc: BcType,
    ) -> Self {
        Self {
            owner: owner.into(),
            eq_type,
            var_type,
            verbosity: 0,
            sles_verbosity: 0,
            process_flag: ProcessFlag::empty(),
            flag: TermFlags::empty(),
            space_scheme: SpaceScheme::VertexBased,
            time_hodge: HodgeParam::new(HodgeType::Vpcd, HodgeAlgo::Voronoi),
            time_scheme: TimeScheme::Implicit,
            theta: 1.0,
            do_lumping: false,
            ic_definitions: Vec::new(),
            time_property: None,
            diffusion_hodge: HodgeParam::new(HodgeType::Epfd, HodgeAlgo::Cost),
            diffusion_property: None,
            advection: AdvParam::default(),
            advection_field: None,
            reaction_terms: Vec::new(),
            source_terms: Vec::new(),
            bc: BcParam::new(default_bc),
            itsol: LinearSolverParam::default(),
        }
    }

    /// 所属方程名称
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 是否已锁定
    pub fn is_locked(&self) -> bool {
        self.flag.contains(TermFlags::LOCKED)
    }

    /// 是否非定常
    pub fn is_unsteady(&self) -> bool {
        self.flag.contains(TermFlags::UNSTEADY)
    }

    pub(crate) fn lock(&mut self) {
        self.flag.insert(TermFlags::LOCKED);
    }

    fn check_unlocked(&self, action: impl Into<String>) -> ConfigResult<()> {
        if self.is_locked() {
            Err(ConfigError::Locked {
                owner: self.owner.clone(),
                action: action.into(),
            })
        } else {
            Ok(())
        }
    }

    /// 按键设置一个选项
    ///
    /// 键或值非法时参数保持不变。
    pub fn set_option(&mut self, key: &str, val: &str) -> ConfigResult<()> {
        let Some(k) = EqKey::from_keyword(key) else {
            let all: Vec<&str> = EqKey::ALL.iter().map(|k| k.keyword()).collect();
            log::error!("方程 {}: 当前键 {}, 可用键: {}", self.owner, key, all.join(" "));
            return Err(ConfigError::InvalidKey {
                owner: self.owner.clone(),
                key: key.to_string(),
            });
        };
        self.check_unlocked(format!("set_option({})", key))?;

        match k {
            EqKey::SpaceScheme => {
                let scheme =
                    parse_keyword(key, val, SpaceScheme::from_keyword, SpaceScheme::keywords())?;
                // 时间与扩散 Hodge 类型随格式一起切换
                let (time_type, diff_type) = match scheme {
                    SpaceScheme::VertexBased => (HodgeType::Vpcd, HodgeType::Epfd),
                    SpaceScheme::FaceBased => (HodgeType::Cpvd, HodgeType::Edfp),
                };
                self.space_scheme = scheme;
                self.time_hodge.hodge_type = time_type;
                self.diffusion_hodge.hodge_type = diff_type;
            }
            EqKey::HodgeDiffAlgo => {
                self.diffusion_hodge.algo =
                    parse_keyword(key, val, HodgeAlgo::from_keyword, HodgeAlgo::keywords())?;
            }
            EqKey::HodgeTimeAlgo => {
                self.time_hodge.algo =
                    parse_keyword(key, val, HodgeAlgo::from_keyword, HodgeAlgo::keywords())?;
            }
            EqKey::HodgeDiffCoef => {
                self.diffusion_hodge.coef = parse_hodge_coef(val).ok_or_else(|| {
                    ConfigError::invalid_value(key, val, "可选 dga, sushi, gcr 或数值")
                })?;
            }
            EqKey::HodgeTimeCoef => {
                self.time_hodge.coef = parse_hodge_coef(val).ok_or_else(|| {
                    ConfigError::invalid_value(key, val, "可选 dga, sushi, gcr 或数值")
                })?;
            }
            EqKey::SolverFamily => {
                self.itsol.family = match val {
                    "cs" => SolverFamily::Native,
                    "petsc" => SolverFamily::External,
                    _ => return Err(ConfigError::invalid_value(key, val, "可选 cs, petsc")),
                };
            }
            EqKey::Itsol => {
                self.itsol.solver = match val {
                    "cg" => SolverKind::Cg,
                    "bicg" => SolverKind::BiCg,
                    "gmres" => SolverKind::Gmres,
                    "amg" => SolverKind::Amg,
                    _ => {
                        return Err(ConfigError::invalid_value(key, val, "可选 cg, bicg, gmres, amg"))
                    }
                };
            }
            EqKey::Precond => {
                self.itsol.precond = match val {
                    "jacobi" => PrecondKind::Jacobi,
                    "poly1" => PrecondKind::Poly1,
                    "ssor" => PrecondKind::Ssor,
                    "ilu0" => PrecondKind::Ilu0,
                    "icc0" => PrecondKind::Icc0,
                    "amg" => PrecondKind::Amg,
                    "as" => PrecondKind::As,
                    _ => {
                        return Err(ConfigError::invalid_value(
                            key,
                            val,
                            "可选 jacobi, poly1, ssor, ilu0, icc0, amg, as",
                        ))
                    }
                };
            }
            EqKey::ItsolMaxIter => self.itsol.n_max_iter = parse_num(key, val)?,
            EqKey::ItsolEps => self.itsol.eps = parse_num(key, val)?,
            EqKey::ItsolResnorm => self.itsol.resnorm = parse_bool(key, val)?,
            EqKey::ItsolVerbosity => self.sles_verbosity = parse_num(key, val)?,
            EqKey::ItsolSubdomains => {
                let n: usize = parse_num(key, val)?;
                if n == 0 {
                    return Err(ConfigError::invalid_value(key, val, "子域数必须为正"));
                }
                self.itsol.n_subdomains = n;
            }
            EqKey::Verbosity => self.verbosity = parse_num(key, val)?,
            EqKey::BcEnforcement => {
                self.bc.enforcement =
                    parse_keyword(key, val, BcEnforcement::from_keyword, BcEnforcement::keywords())?;
            }
            EqKey::BcQuadrature => {
                match parse_keyword(key, val, QuadratureType::from_keyword, QuadratureType::keywords())? {
                    QuadratureType::Subdiv => self.bc.use_subdiv = true,
                    q => self.bc.quad_type = q,
                }
            }
            EqKey::ExtraOp => {
                self.process_flag |= ProcessFlag::from_keyword(val).ok_or_else(|| {
                    ConfigError::invalid_value(key, val, "可选 peclet, none, upwind_coef")
                })?;
            }
            EqKey::AdvFormulation => {
                self.advection.formulation = parse_keyword(
                    key,
                    val,
                    AdvFormulation::from_keyword,
                    AdvFormulation::keywords(),
                )?;
            }
            EqKey::AdvWeight => {
                self.advection.weight_algo =
                    parse_keyword(key, val, AdvWeight::from_keyword, AdvWeight::keywords())?;
            }
            EqKey::AdvWeightCriterion => {
                self.advection.weight_criterion =
                    parse_keyword(key, val, AdvCriterion::from_keyword, AdvCriterion::keywords())?;
            }
            EqKey::AdvFluxQuad => {
                self.advection.quad_type = match QuadratureType::from_keyword(val) {
                    Some(QuadratureType::Subdiv) | None => {
                        return Err(ConfigError::invalid_value(key, val, "可选 bary, higher, highest"))
                    }
                    Some(q) => q,
                };
            }
            EqKey::TimeScheme => {
                let scheme =
                    parse_keyword(key, val, TimeScheme::from_keyword, TimeScheme::keywords())?;
                match scheme {
                    TimeScheme::Implicit => self.theta = 1.0,
                    TimeScheme::Explicit => self.theta = 0.0,
                    TimeScheme::CrankNicolson => self.theta = 0.5,
                    TimeScheme::Theta => {}
                }
                self.time_scheme = scheme;
            }
            EqKey::TimeTheta => self.theta = parse_num(key, val)?,
        }
        Ok(())
    }

    /// 关联物性或对流场并置对应标志
    ///
    /// `term` 为 `diffusion`、`time` 或 `advection`。
    pub fn link(&mut self, term: &str, name: &str) -> ConfigResult<()> {
        self.check_unlocked(format!("link({})", term))?;
        match term {
            "diffusion" => {
                self.flag |= TermFlags::DIFFUSION;
                self.diffusion_property = Some(name.to_string());
            }
            "time" => {
                self.flag |= TermFlags::UNSTEADY;
                self.time_property = Some(name.to_string());
            }
            "advection" => {
                self.flag |= TermFlags::CONVECTION;
                self.advection_field = Some(name.to_string());
            }
            _ => {
                return Err(ConfigError::InvalidKeyword {
                    owner: self.owner.clone(),
                    keyword: term.to_string(),
                })
            }
        }
        Ok(())
    }

    /// 添加初始条件（常数或解析函数）
    pub fn set_ic(&mut self, location: Option<LocationRef>, def: Definition) -> ConfigResult<()> {
        self.check_unlocked("set_ic")?;
        match def {
            Definition::Value(_) | Definition::Analytic(_) => {}
            other => {
                return Err(ConfigError::invalid_value(
                    "initial_condition",
                    other.kind(),
                    "可选 value 或 analytic",
                ))
            }
        }
        self.ic_definitions.push(InitialCondition { location, def });
        Ok(())
    }

    /// 添加边界条件，返回定义序号
    ///
    /// 标量变量的零值常数定义降为齐次类型。
    pub fn add_bc(
        &mut self,
        location: LocationRef,
        bc_key: &str,
        def: Definition,
    ) -> ConfigResult<usize> {
        self.check_unlocked(format!("add_bc({})", location.name))?;
        let mut bc_type = match bc_key {
            "dirichlet" => BcType::Dirichlet,
            "neumann" => BcType::Neumann,
            "robin" => BcType::Robin,
            _ => {
                return Err(ConfigError::invalid_value(
                    "bc_type",
                    bc_key,
                    "可选 dirichlet, neumann, robin",
                ))
            }
        };
        if let Definition::Value(v) = &def {
            if v.is_empty() {
                return Err(ConfigError::invalid_value("bc_value", "[]", "至少需要一个分量"));
            }
            if self.var_type == VarType::Scalar && is_zero_value(v[0]) {
                bc_type = bc_type.homogeneous();
            }
        }
        self.bc.defs.push(BcDef {
            location,
            bc_type,
            def,
        });
        Ok(self.bc.defs.len() - 1)
    }

    /// 添加线性反应项，返回反应项序号
    pub fn add_reaction(
        &mut self,
        name: Option<&str>,
        kind: &str,
        property: &str,
    ) -> ConfigResult<usize> {
        self.check_unlocked("add_reaction")?;
        let r_id = self.reaction_terms.len();
        if kind != "linear" {
            return Err(ConfigError::invalid_value("reaction_type", kind, "只支持 linear"));
        }
        let hodge = match self.space_scheme {
            SpaceScheme::VertexBased => HodgeParam::new(HodgeType::Vpcd, HodgeAlgo::Wbs),
            SpaceScheme::FaceBased => {
                return Err(ConfigError::not_implemented(&self.owner, "面基格式的反应项"))
            }
        };
        let name = name.map_or_else(|| format!("reaction_{:02}", r_id), str::to_string);
        self.reaction_terms.push(ReactionTerm {
            name,
            kind: ReactionKind::Linear,
            hodge,
            do_lumping: false,
            property: property.to_string(),
        });
        self.flag |= TermFlags::REACTION;
        Ok(r_id)
    }

    fn select_terms<'a, T: NamedTerm>(
        owner: &str,
        items: &'a mut [T],
        name: Option<&str>,
        kind: &str,
    ) -> ConfigResult<Vec<&'a mut T>> {
        match name {
            None => Ok(items.iter_mut().collect()),
            Some(n) => match items.iter_mut().find(|t| t.term_name() == n) {
                Some(t) => Ok(vec![t]),
                None => Err(ConfigError::UnknownTerm {
                    owner: owner.to_string(),
                    kind: kind.to_string(),
                    name: n.to_string(),
                }),
            },
        }
    }

    /// 设置反应项选项，`name` 为 None 时作用于全部反应项
    pub fn set_reaction_option(
        &mut self,
        name: Option<&str>,
        key: &str,
        val: &str,
    ) -> ConfigResult<()> {
        self.check_unlocked(format!("set_reaction_option({})", key))?;
        if !REACTION_KEYS.contains(&key) {
            log::error!("反应项: 当前键 {}, 可用键: {}", key, REACTION_KEYS.join(" "));
            return Err(ConfigError::InvalidKey {
                owner: self.owner.clone(),
                key: key.to_string(),
            });
        }
        let owner = self.owner.clone();
        // 先解析值，失败时不改动任何反应项
        #[derive(Clone, Copy)]
        enum Update {
            Lumping(bool),
            Algo(HodgeAlgo),
            Coef(f64),
            InvPty(bool),
        }
        let update = match key {
            "lumping" => Update::Lumping(val == "true"),
            "hodge_algo" => Update::Algo(parse_keyword(
                key,
                val,
                HodgeAlgo::from_keyword,
                HodgeAlgo::keywords(),
            )?),
            "hodge_coef" => Update::Coef(parse_hodge_coef(val).ok_or_else(|| {
                ConfigError::invalid_value(key, val, "可选 dga, sushi, gcr 或数值")
            })?),
            _ => Update::InvPty(val == "true"),
        };
        let terms = Self::select_terms(&owner, &mut self.reaction_terms, name, "反应项")?;
        for r in terms {
            match update {
                Update::Lumping(b) => r.do_lumping = b,
                Update::Algo(a) => r.hodge.algo = a,
                Update::Coef(c) => r.hodge.coef = c,
                Update::InvPty(b) => r.hodge.inv_pty = b,
            }
        }
        Ok(())
    }

    fn push_source_term(
        &mut self,
        name: Option<&str>,
        location: LocationRef,
        kind: SourceTermKind,
        def: Definition,
    ) -> usize {
        let st_id = self.source_terms.len();
        let name = name.map_or_else(|| format!("sourceterm_{:2}", st_id), str::to_string);
        self.source_terms.push(SourceTerm {
            name,
            location,
            kind,
            def,
            quadrature: QuadratureType::Bary,
            post: false,
        });
        st_id
    }

    /// 添加常数源项
    pub fn add_source_term_by_val(
        &mut self,
        name: Option<&str>,
        location: LocationRef,
        value: Vec<f64>,
    ) -> ConfigResult<usize> {
        self.check_unlocked("add_source_term_by_val")?;
        if value.is_empty() {
            return Err(ConfigError::invalid_value("source_term", "[]", "至少需要一个分量"));
        }
        Ok(self.push_source_term(name, location, SourceTermKind::User, Definition::Value(value)))
    }

    /// 添加解析函数源项
    pub fn add_source_term_by_analytic(
        &mut self,
        name: Option<&str>,
        location: LocationRef,
        def: AnalyticFn,
    ) -> ConfigResult<usize> {
        self.check_unlocked("add_source_term_by_analytic")?;
        Ok(self.push_source_term(name, location, SourceTermKind::User, Definition::Analytic(def)))
    }

    /// 添加数组定义的重力源项
    pub fn add_gravity_source_term(
        &mut self,
        location: LocationRef,
        values: Vec<f64>,
    ) -> ConfigResult<usize> {
        self.check_unlocked("add_gravity_source_term")?;
        Ok(self.push_source_term(
            Some("gravity_source"),
            location,
            SourceTermKind::Gravity,
            Definition::array(values),
        ))
    }

    /// 设置源项选项，`name` 为 None 时作用于全部源项
    pub fn set_source_term_option(
        &mut self,
        name: Option<&str>,
        key: &str,
        val: &str,
    ) -> ConfigResult<()> {
        self.check_unlocked(format!("set_source_term_option({})", key))?;
        let owner = self.owner.clone();
        match key {
            "quadrature" => {
                let q = parse_keyword(
                    key,
                    val,
                    QuadratureType::from_keyword,
                    QuadratureType::keywords(),
                )?;
                for st in Self::select_terms(&owner, &mut self.source_terms, name, "源项")? {
                    st.quadrature = q;
                }
            }
            "post" => {
                let b = parse_bool(key, val)?;
                for st in Self::select_terms(&owner, &mut self.source_terms, name, "源项")? {
                    st.post = b;
                }
            }
            _ => {
                log::error!("源项: 当前键 {}, 可用键: {}", key, SOURCE_TERM_KEYS.join(" "));
                return Err(ConfigError::InvalidKey {
                    owner,
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// 按名称查找反应项
    pub fn reaction(&self, name: &str) -> Option<&ReactionTerm> {
        self.reaction_terms.iter().find(|r| r.name == name)
    }

    /// 是否存在 WBS 反应项
    pub fn has_wbs_reaction(&self) -> bool {
        self.reaction_terms
            .iter()
            .any(|r| r.hodge.algo == HodgeAlgo::Wbs)
    }

    /// 绑定线性求解器时使用的参数
    pub fn linear_solver_param(&self) -> LinearSolverParam {
        let mut p = self.itsol.clone();
        p.verbosity = self.sles_verbosity.max(0) as u32;
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdo_mesh::LocationKind;

    fn param() -> EquationParam {
        EquationParam::new("eq", EquationType::User, VarType::Scalar, BcType::HomogeneousDirichlet)
    }

    fn boundary() -> LocationRef {
        LocationRef::new(2, "boundary_faces", LocationKind::BoundaryFaces)
    }

    #[test]
    fn test_defaults() {
        let p = param();
        assert_eq!(p.space_scheme, SpaceScheme::VertexBased);
        assert_eq!(p.time_hodge.hodge_type, HodgeType::Vpcd);
        assert_eq!(p.time_hodge.algo, HodgeAlgo::Voronoi);
        assert_eq!(p.diffusion_hodge.hodge_type, HodgeType::Epfd);
        assert_eq!(p.diffusion_hodge.algo, HodgeAlgo::Cost);
        assert!((p.diffusion_hodge.coef - 1.0 / 3.0).abs() < 1e-15);
        assert_eq!(p.time_scheme, TimeScheme::Implicit);
        assert_eq!(p.theta, 1.0);
        assert_eq!(p.itsol.solver, SolverKind::Cg);
        assert_eq!(p.itsol.precond, PrecondKind::Jacobi);
        assert_eq!(p.itsol.n_max_iter, 2500);
        assert_eq!(p.itsol.eps, 1e-12);
        assert!(!p.itsol.resnorm);
        assert_eq!(p.flag, TermFlags::empty());
    }

    #[test]
    fn test_space_scheme_switches_both_hodges() {
        let mut p = param();
        p.set_option("space_scheme", "cdo_fb").unwrap();
        assert_eq!(p.time_hodge.hodge_type, HodgeType::Cpvd);
        assert_eq!(p.diffusion_hodge.hodge_type, HodgeType::Edfp);

        let before = p.clone();
        assert!(p.set_option("space_scheme", "cdo_xx").is_err());
        assert_eq!(p.time_hodge, before.time_hodge);
        assert_eq!(p.diffusion_hodge, before.diffusion_hodge);

        p.set_option("space_scheme", "cdo_vb").unwrap();
        assert_eq!(p.time_hodge.hodge_type, HodgeType::Vpcd);
        assert_eq!(p.diffusion_hodge.hodge_type, HodgeType::Epfd);
    }

    #[test]
    fn test_unknown_key() {
        let mut p = param();
        let err = p.set_option("itsol_tol", "1e-8").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKey { .. }));
    }

    #[test]
    fn test_time_scheme_sets_theta() {
        let mut p = param();
        p.set_option("time_scheme", "crank_nicolson").unwrap();
        assert_eq!(p.theta, 0.5);
        p.set_option("time_theta", "0.7").unwrap();
        p.set_option("time_scheme", "theta_scheme").unwrap();
        assert_eq!(p.theta, 0.7);
        p.set_option("time_scheme", "explicit").unwrap();
        assert_eq!(p.theta, 0.0);
    }

    #[test]
    fn test_solver_options() {
        let mut p = param();
        p.set_option("solver_family", "petsc").unwrap();
        p.set_option("itsol", "gmres").unwrap();
        p.set_option("precond", "ilu0").unwrap();
        p.set_option("itsol_max_iter", "50").unwrap();
        p.set_option("itsol_eps", "1e-8").unwrap();
        p.set_option("itsol_resnorm", "true").unwrap();
        p.set_option("itsol_verbosity", "3").unwrap();
        assert_eq!(p.itsol.family, SolverFamily::External);
        assert_eq!(p.itsol.solver, SolverKind::Gmres);
        assert_eq!(p.itsol.precond, PrecondKind::Ilu0);
        assert_eq!(p.itsol.n_max_iter, 50);
        assert!(p.itsol.resnorm);
        assert_eq!(p.linear_solver_param().verbosity, 3);
        assert!(p.set_option("itsol_max_iter", "many").is_err());
    }

    #[test]
    fn test_bc_quadrature_and_extra_op() {
        let mut p = param();
        p.set_option("bc_quadrature", "subdiv").unwrap();
        assert!(p.bc.use_subdiv);
        assert_eq!(p.bc.quad_type, QuadratureType::Bary);
        p.set_option("bc_quadrature", "highest").unwrap();
        assert_eq!(p.bc.quad_type, QuadratureType::Highest);
        p.set_option("extra_op", "peclet").unwrap();
        p.set_option("extra_op", "upwind_coef").unwrap();
        assert!(p.process_flag.contains(ProcessFlag::PECLET | ProcessFlag::UPWIND_COEF));
        assert!(p.set_option("adv_flux_quad", "subdiv").is_err());
    }

    #[test]
    fn test_link_sets_flags() {
        let mut p = param();
        p.link("diffusion", "unity").unwrap();
        p.link("time", "rho").unwrap();
        p.link("advection", "beta").unwrap();
        assert!(p.flag.contains(TermFlags::DIFFUSION | TermFlags::UNSTEADY | TermFlags::CONVECTION));
        assert_eq!(p.diffusion_property.as_deref(), Some("unity"));
        let err = p.link("reaction", "sigma").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidKeyword { .. }));
    }

    #[test]
    fn test_zero_bc_normalized() {
        let mut p = param();
        p.add_bc(boundary(), "dirichlet", Definition::value(0.0)).unwrap();
        p.add_bc(boundary(), "neumann", Definition::value(0.0)).unwrap();
        p.add_bc(boundary(), "dirichlet", Definition::value(1e-300)).unwrap();
        p.add_bc(boundary(), "robin", Definition::value(0.0)).unwrap();
        p.add_bc(boundary(), "dirichlet", Definition::analytic(|_, _| 0.0)).unwrap();
        let types: Vec<BcType> = p.bc.defs.iter().map(|d| d.bc_type).collect();
        assert_eq!(
            types,
            vec![
                BcType::HomogeneousDirichlet,
                BcType::HomogeneousNeumann,
                BcType::Dirichlet,
                BcType::Robin,
                BcType::Dirichlet,
            ]
        );
        assert!(p.add_bc(boundary(), "periodic", Definition::value(1.0)).is_err());
    }

    #[test]
    fn test_vector_zero_bc_not_normalized() {
        let mut p = EquationParam::new("v", EquationType::User, VarType::Vector, BcType::HomogeneousDirichlet);
        p.add_bc(boundary(), "dirichlet", Definition::Value(vec![0.0; 3])).unwrap();
        assert_eq!(p.bc.defs[0].bc_type, BcType::Dirichlet);
    }

    #[test]
    fn test_ic_rejects_array() {
        let mut p = param();
        p.set_ic(None, Definition::value(1.0)).unwrap();
        assert!(p.set_ic(None, Definition::array(vec![1.0])).is_err());
        assert_eq!(p.ic_definitions.len(), 1);
    }

    #[test]
    fn test_reactions() {
        let mut p = param();
        p.add_reaction(None, "linear", "sigma").unwrap();
        p.add_reaction(Some("decay"), "linear", "k").unwrap();
        assert_eq!(p.reaction_terms[0].name, "reaction_00");
        assert!(p.flag.contains(TermFlags::REACTION));
        assert!(p.has_wbs_reaction());

        p.set_reaction_option(Some("decay"), "hodge_algo", "voronoi").unwrap();
        assert_eq!(p.reaction("decay").unwrap().hodge.algo, HodgeAlgo::Voronoi);
        assert_eq!(p.reaction("reaction_00").unwrap().hodge.algo, HodgeAlgo::Wbs);

        p.set_reaction_option(None, "lumping", "true").unwrap();
        assert!(p.reaction_terms.iter().all(|r| r.do_lumping));

        let err = p.set_reaction_option(Some("nope"), "lumping", "true").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTerm { .. }));
        assert!(p.add_reaction(None, "quadratic", "k").is_err());

        let mut fb = param();
        fb.set_option("space_scheme", "cdo_fb").unwrap();
        assert!(matches!(
            fb.add_reaction(None, "linear", "k"),
            Err(ConfigError::NotImplemented { .. })
        ));
    }

    #[test]
    fn test_source_terms() {
        let mut p = param();
        let cells = LocationRef::new(0, "cells", LocationKind::Cells);
        p.add_source_term_by_val(None, cells.clone(), vec![1.0]).unwrap();
        p.add_gravity_source_term(cells.clone(), vec![9.81]).unwrap();
        assert_eq!(p.source_terms[0].name, "sourceterm_ 0");
        assert_eq!(p.source_terms[1].name, "gravity_source");
        assert_eq!(p.source_terms[1].kind, SourceTermKind::Gravity);

        p.set_source_term_option(None, "quadrature", "higher").unwrap();
        assert!(p.source_terms.iter().all(|s| s.quadrature == QuadratureType::Higher));
        p.set_source_term_option(Some("gravity_source"), "post", "true").unwrap();
        assert!(p.source_terms[1].post);
        assert!(!p.source_terms[0].post);
        assert!(p.set_source_term_option(None, "color", "red").is_err());
    }

    #[test]
    fn test_locked_rejects_everything() {
        let mut p = param();
        p.lock();
        let before = format!("{:?}", p);
        assert!(matches!(
            p.set_option("verbosity", "2"),
            Err(ConfigError::Locked { .. })
        ));
        assert!(p.link("diffusion", "unity").is_err());
        assert!(p.add_bc(boundary(), "dirichlet", Definition::value(1.0)).is_err());
        assert!(p.set_ic(None, Definition::value(1.0)).is_err());
        assert!(p.add_reaction(None, "linear", "k").is_err());
        assert_eq!(format!("{:?}", p), before);
    }
}
