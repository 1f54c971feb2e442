// crates/cdo_equation/src/param/definition.rs

//! 定义记录：边界条件、初始条件、反应项、源项
//!
//! 每条记录携带一个 [`Definition`]，其变体即定义方式，
//! 负载与变体一一对应。

use std::fmt;
use std::sync::Arc;

use cdo_mesh::LocationKind;
use glam::DVec3;

use super::types::{BcEnforcement, BcType, HodgeParam, QuadratureType};

/// 解析函数 `f(t, x)`
pub type AnalyticFn = Arc<dyn Fn(f64, DVec3) -> f64 + Send + Sync>;

/// 数值定义方式
#[derive(Clone)]
pub enum Definition {
    /// 常数（每个分量一个值）
    Value(Vec<f64>),
    /// 解析函数
    Analytic(AnalyticFn),
    /// 数组，按所在网格位置的元素顺序排列
    Array(Arc<[f64]>),
    /// 用户回调，签名与解析函数相同
    User(AnalyticFn),
}

impl Definition {
    /// 标量常数
    pub fn value(v: f64) -> Self {
        Self::Value(vec![v])
    }

    /// 解析函数
    pub fn analytic<F>(f: F) -> Self
    where
        F: Fn(f64, DVec3) -> f64 + Send + Sync + 'static,
    {
        Self::Analytic(Arc::new(f))
    }

    /// 数组
    pub fn array(values: Vec<f64>) -> Self {
        Self::Array(values.into())
    }

    /// 用户回调
    pub fn user<F>(f: F) -> Self
    where
        F: Fn(f64, DVec3) -> f64 + Send + Sync + 'static,
    {
        Self::User(Arc::new(f))
    }

    /// 定义方式关键字
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Value(_) => "value",
            Self::Analytic(_) => "analytic",
            Self::Array(_) => "array",
            Self::User(_) => "user",
        }
    }

    /// 常数定义的第一个分量
    pub fn constant(&self) -> Option<f64> {
        match self {
            Self::Value(v) => v.first().copied(),
            _ => None,
        }
    }

    /// 在时刻 `t`、点 `x` 处求第一个分量
    ///
    /// `elt` 为该点在定义所属位置中的序号，仅数组定义使用；越界取 0。
    pub fn eval(&self, t: f64, x: DVec3, elt: usize) -> f64 {
        match self {
            Self::Value(v) => v.first().copied().unwrap_or(0.0),
            Self::Analytic(f) | Self::User(f) => f(t, x),
            Self::Array(a) => a.get(elt).copied().unwrap_or(0.0),
        }
    }

    /// 是否依赖位置（数组定义逐元素取值，不能按点插值）
    pub fn is_pointwise(&self) -> bool {
        !matches!(self, Self::Array(_))
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Analytic(_) => f.write_str("Analytic(..)"),
            Self::Array(a) => write!(f, "Array(len = {})", a.len()),
            Self::User(_) => f.write_str("User(..)"),
        }
    }
}

/// 已解析的网格位置引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRef {
    /// 位置编号
    pub id: usize,
    /// 位置名称
    pub name: String,
    /// 位置类别
    pub kind: LocationKind,
}

impl LocationRef {
    /// 创建
    pub fn new(id: usize, name: impl Into<String>, kind: LocationKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}

// =============================================================================
// 初始条件与边界条件
// =============================================================================

/// 初始条件定义
#[derive(Debug, Clone)]
pub struct InitialCondition {
    /// 网格位置，None 时按离散格式取 `vertices` 或 `cells`
    pub location: Option<LocationRef>,
    /// 定义（常数或解析函数）
    pub def: Definition,
}

/// 单条边界条件定义
#[derive(Debug, Clone)]
pub struct BcDef {
    /// 网格位置
    pub location: LocationRef,
    /// 类型（零值常数已归一为齐次类型）
    pub bc_type: BcType,
    /// 定义
    pub def: Definition,
}

/// 边界条件集合
#[derive(Debug, Clone)]
pub struct BcParam {
    /// 未覆盖边界上的默认条件
    pub default_bc: BcType,
    /// Dirichlet 施加方式
    pub enforcement: BcEnforcement,
    /// 积分规则
    pub quad_type: QuadratureType,
    /// 是否细分积分
    pub use_subdiv: bool,
    /// 定义列表
    pub defs: Vec<BcDef>,
}

impl BcParam {
    /// 以默认条件创建
    pub fn new(default_bc: BcType) -> Self {
        Self {
            default_bc,
            enforcement: BcEnforcement::Strong,
            quad_type: QuadratureType::Bary,
            use_subdiv: false,
            defs: Vec::new(),
        }
    }
}

// =============================================================================
// 反应项与源项
// =============================================================================

/// 反应项类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    /// 线性反应 σ u
    Linear,
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("linear")
    }
}

/// 反应项
#[derive(Debug, Clone)]
pub struct ReactionTerm {
    /// 名称
    pub name: String,
    /// 类型
    pub kind: ReactionKind,
    /// Hodge 算子
    pub hodge: HodgeParam,
    /// 是否质量集中
    pub do_lumping: bool,
    /// 物性名称
    pub property: String,
}

/// 源项类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTermKind {
    /// 用户源项
    User,
    /// 重力源项
    Gravity,
}

impl fmt::Display for SourceTermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Gravity => f.write_str("gravity"),
        }
    }
}

/// 源项
#[derive(Debug, Clone)]
pub struct SourceTerm {
    /// 名称
    pub name: String,
    /// 网格位置（单元类）
    pub location: LocationRef,
    /// 类型
    pub kind: SourceTermKind,
    /// 定义
    pub def: Definition,
    /// 积分规则
    pub quadrature: QuadratureType,
    /// 是否输出
    pub post: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_variants() {
        let x = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(Definition::value(4.0).eval(0.0, x, 0), 4.0);
        assert_eq!(Definition::analytic(|t, p| t + p.y).eval(1.0, x, 0), 3.0);
        let arr = Definition::array(vec![1.0, 2.0]);
        assert_eq!(arr.eval(0.0, x, 1), 2.0);
        assert_eq!(arr.eval(0.0, x, 7), 0.0);
        assert!(!arr.is_pointwise());
    }

    #[test]
    fn test_kind_and_constant() {
        assert_eq!(Definition::value(0.0).kind(), "value");
        assert_eq!(Definition::user(|_, _| 1.0).kind(), "user");
        assert_eq!(Definition::value(2.5).constant(), Some(2.5));
        assert_eq!(Definition::array(vec![1.0]).constant(), None);
        assert_eq!(format!("{:?}", Definition::array(vec![1.0, 2.0])), "Array(len = 2)");
    }
}
