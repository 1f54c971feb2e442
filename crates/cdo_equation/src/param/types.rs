// crates/cdo_equation/src/param/types.rs

//! 参数枚举与小型描述结构
//!
//! 每个枚举都带一组关键字，`from_keyword` 解析，`Display` 输出同一关键字。

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

macro_rules! keywords {
    ($t:ty { $($v:ident => $s:literal),* $(,)? }) => {
        impl $t {
            /// 关键字
            pub fn keyword(self) -> &'static str {
                match self {
                    $(Self::$v => $s),*
                }
            }

            /// 从关键字解析
            pub fn from_keyword(s: &str) -> Option<Self> {
                match s {
                    $($s => Some(Self::$v),)*
                    _ => None,
                }
            }

            /// 全部可用关键字
            pub fn keywords() -> &'static [&'static str] {
                &[$($s),*]
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.keyword())
            }
        }
    };
}

// =============================================================================
// 方程与变量
// =============================================================================

/// 方程类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquationType {
    /// 用户定义
    User,
    /// 预定义（如壁面距离）
    Predefined,
    /// 地下水流
    Groundwater,
}

keywords!(EquationType { User => "user", Predefined => "predefined", Groundwater => "groundwater" });

/// 变量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarType {
    /// 标量
    Scalar,
    /// 向量
    Vector,
    /// 二阶张量
    Tensor,
}

keywords!(VarType { Scalar => "scalar", Vector => "vector", Tensor => "tensor" });

impl VarType {
    /// 分量个数
    pub fn dim(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector => 3,
            Self::Tensor => 9,
        }
    }
}

/// 空间离散格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpaceScheme {
    /// CDO 点基
    VertexBased,
    /// CDO 面基
    FaceBased,
}

keywords!(SpaceScheme { VertexBased => "cdo_vb", FaceBased => "cdo_fb" });

// =============================================================================
// 离散 Hodge 算子
// =============================================================================

/// Hodge 算子类型（源空间与目标空间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HodgeType {
    /// 原始顶点 → 对偶单元
    Vpcd,
    /// 原始边 → 对偶面
    Epfd,
    /// 对偶边 → 原始面
    Edfp,
    /// 原始单元 → 对偶顶点
    Cpvd,
}

keywords!(HodgeType { Vpcd => "VpCd", Epfd => "EpFd", Edfp => "EdFp", Cpvd => "CpVd" });

/// Hodge 算子构造算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HodgeAlgo {
    /// 正交网格上的对角算子
    Voronoi,
    /// 一致性加稳定化
    Cost,
    /// 全体重心细分
    Wbs,
}

keywords!(HodgeAlgo { Voronoi => "voronoi", Cost => "cost", Wbs => "wbs" });

/// DGA 稳定化系数
pub const HODGE_COEF_DGA: f64 = 1.0 / 3.0;

/// Hodge 算子描述
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HodgeParam {
    /// 是否对物性取倒数
    pub inv_pty: bool,
    /// 类型
    pub hodge_type: HodgeType,
    /// 算法
    pub algo: HodgeAlgo,
    /// 稳定化系数（仅 COST 使用）
    pub coef: f64,
}

impl HodgeParam {
    /// 创建，稳定化系数取 DGA 值
    pub fn new(hodge_type: HodgeType, algo: HodgeAlgo) -> Self {
        Self {
            inv_pty: false,
            hodge_type,
            algo,
            coef: HODGE_COEF_DGA,
        }
    }
}

/// 解析 Hodge 稳定化系数：`dga`、`sushi`、`gcr` 或浮点数
pub fn parse_hodge_coef(val: &str) -> Option<f64> {
    match val {
        "dga" => Some(HODGE_COEF_DGA),
        "sushi" => Some(1.0 / 3.0_f64.sqrt()),
        "gcr" => Some(1.0),
        _ => val.trim().parse().ok(),
    }
}

// =============================================================================
// 时间离散
// =============================================================================

/// 时间格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeScheme {
    /// 隐式（θ = 1）
    Implicit,
    /// 显式（θ = 0）
    Explicit,
    /// Crank-Nicolson（θ = 1/2）
    CrankNicolson,
    /// 一般 θ 格式
    Theta,
}

keywords!(TimeScheme {
    Implicit => "implicit",
    Explicit => "explicit",
    CrankNicolson => "crank_nicolson",
    Theta => "theta_scheme",
});

// =============================================================================
// 对流
// =============================================================================

/// 对流项形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvFormulation {
    /// 守恒形式 div(β u)
    Conservative,
    /// 非守恒形式 β·grad(u)
    NonConservative,
}

keywords!(AdvFormulation { Conservative => "conservative", NonConservative => "non_conservative" });

/// 对流迎风权重函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvWeight {
    /// 完全迎风
    Upwind,
    /// Samarskii
    Samarskii,
    /// Scharfetter-Gummel
    Sg,
    /// delta = 10, gamma = 5
    D10g5,
    /// 中心
    Centered,
}

keywords!(AdvWeight {
    Upwind => "upwind",
    Samarskii => "samarskii",
    Sg => "sg",
    D10g5 => "d10g5",
    Centered => "centered",
});

/// 迎风权重的判据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvCriterion {
    /// 以对偶面中心的速度与边切向判断
    Xexc,
    /// 以通过对偶面的通量判断
    Flux,
}

keywords!(AdvCriterion { Xexc => "xexc", Flux => "flux" });

/// 积分规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuadratureType {
    /// 重心单点
    Bary,
    /// 每方向两点 Gauss
    Higher,
    /// 每方向三点 Gauss
    Highest,
    /// 细分为 8 个子块后取重心
    Subdiv,
}

keywords!(QuadratureType {
    Bary => "bary",
    Higher => "higher",
    Highest => "highest",
    Subdiv => "subdiv",
});

/// 对流项描述
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvParam {
    /// 形式
    pub formulation: AdvFormulation,
    /// 权重函数
    pub weight_algo: AdvWeight,
    /// 权重判据
    pub weight_criterion: AdvCriterion,
    /// 通量积分规则
    pub quad_type: QuadratureType,
}

impl Default for AdvParam {
    fn default() -> Self {
        Self {
            formulation: AdvFormulation::Conservative,
            weight_algo: AdvWeight::Upwind,
            weight_criterion: AdvCriterion::Xexc,
            quad_type: QuadratureType::Bary,
        }
    }
}

// =============================================================================
// 边界条件
// =============================================================================

/// 边界条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BcType {
    /// 齐次 Dirichlet
    HomogeneousDirichlet,
    /// Dirichlet
    Dirichlet,
    /// 齐次 Neumann
    HomogeneousNeumann,
    /// Neumann
    Neumann,
    /// Robin
    Robin,
}

keywords!(BcType {
    HomogeneousDirichlet => "zero_value",
    Dirichlet => "dirichlet",
    HomogeneousNeumann => "zero_flux",
    Neumann => "neumann",
    Robin => "robin",
});

impl BcType {
    /// 是否为 Dirichlet 类
    pub fn is_dirichlet(self) -> bool {
        matches!(self, Self::Dirichlet | Self::HomogeneousDirichlet)
    }

    /// 零值定义对应的齐次类型
    pub fn homogeneous(self) -> Self {
        match self {
            Self::Dirichlet => Self::HomogeneousDirichlet,
            Self::Neumann => Self::HomogeneousNeumann,
            other => other,
        }
    }
}

/// Dirichlet 条件的施加方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BcEnforcement {
    /// 消元
    Strong,
    /// 罚函数
    Penalization,
    /// 对称弱施加
    WeakSym,
    /// Nitsche 弱施加
    Weak,
}

keywords!(BcEnforcement {
    Strong => "strong",
    Penalization => "penalization",
    WeakSym => "weak_sym",
    Weak => "weak",
});

// =============================================================================
// 标志位
// =============================================================================

/// 方程项标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TermFlags(u32);

impl TermFlags {
    /// 非定常项
    pub const UNSTEADY: Self = Self(1 << 0);
    /// 对流项
    pub const CONVECTION: Self = Self(1 << 1);
    /// 扩散项
    pub const DIFFUSION: Self = Self(1 << 2);
    /// 反应项
    pub const REACTION: Self = Self(1 << 3);
    /// 源项需要 Hodge 一致重构
    pub const HCONF_ST: Self = Self(1 << 4);
    /// 参数已锁定
    pub const LOCKED: Self = Self(1 << 5);

    /// 空标志
    pub const fn empty() -> Self {
        Self(0)
    }

    /// 原始位
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// 是否包含全部给定位
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// 置位
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for TermFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TermFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// 后处理（额外操作）标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProcessFlag(u32);

impl ProcessFlag {
    /// 输出 Peclet 数
    pub const PECLET: Self = Self(1 << 0);
    /// 关闭后处理
    pub const NONE: Self = Self(1 << 1);
    /// 输出迎风系数
    pub const UPWIND_COEF: Self = Self(1 << 2);

    /// 空标志
    pub const fn empty() -> Self {
        Self(0)
    }

    /// 是否包含全部给定位
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// 从关键字解析
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "peclet" => Some(Self::PECLET),
            "none" => Some(Self::NONE),
            "upwind_coef" => Some(Self::UPWIND_COEF),
            _ => None,
        }
    }
}

impl BitOr for ProcessFlag {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ProcessFlag {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_round_trip() {
        for kw in AdvWeight::keywords() {
            let w = AdvWeight::from_keyword(kw).unwrap();
            assert_eq!(w.to_string(), *kw);
        }
        assert!(SpaceScheme::from_keyword("cdo_hho").is_none());
    }

    #[test]
    fn test_hodge_coef_keywords() {
        assert!((parse_hodge_coef("dga").unwrap() - 1.0 / 3.0).abs() < 1e-15);
        assert!((parse_hodge_coef("sushi").unwrap() - 0.577_350_269_189_625_8).abs() < 1e-12);
        assert_eq!(parse_hodge_coef("gcr"), Some(1.0));
        assert_eq!(parse_hodge_coef("0.25"), Some(0.25));
        assert_eq!(parse_hodge_coef("abc"), None);
    }

    #[test]
    fn test_flags() {
        let mut f = TermFlags::empty();
        f |= TermFlags::DIFFUSION;
        f.insert(TermFlags::UNSTEADY);
        assert!(f.contains(TermFlags::DIFFUSION | TermFlags::UNSTEADY));
        assert!(!f.contains(TermFlags::LOCKED));

        let mut p = ProcessFlag::empty();
        p |= ProcessFlag::from_keyword("peclet").unwrap();
        assert!(p.contains(ProcessFlag::PECLET));
        assert!(!p.contains(ProcessFlag::NONE));

        let both = ProcessFlag::PECLET | ProcessFlag::UPWIND_COEF;
        assert!(both.contains(ProcessFlag::PECLET) && both.contains(ProcessFlag::UPWIND_COEF));
        assert!(!both.contains(ProcessFlag::NONE));
    }

    #[test]
    fn test_bc_homogeneous_variants() {
        assert_eq!(BcType::Dirichlet.homogeneous(), BcType::HomogeneousDirichlet);
        assert_eq!(BcType::Neumann.homogeneous(), BcType::HomogeneousNeumann);
        assert_eq!(BcType::Robin.homogeneous(), BcType::Robin);
    }
}
