// crates/cdo_equation/src/scheme/mod.rs

//! 空间离散格式
//!
//! [`SpaceDiscretization`] 在 `last_setup` 时按格式选定一次，
//! 之后方程只通过 [`SchemeBuilder`] 与离散格式交互：
//!
//! | 操作 | 点基 | 面基 |
//! |------|------|------|
//! | `init_builder` | ✓ | ✓ |
//! | `compute_source` | 对偶子块积分 | 单元积分 |
//! | `build_system` | 复制交接 | 移动交接 |
//! | `update_field` | 直接写入 | 单元值恢复 |
//! | `face_values` | 无 | ✓ |

pub mod face_based;
pub mod vertex_based;

pub use face_based::{FaceBasedScheme, FaceBuilder};
pub use vertex_based::{VertexBasedScheme, VertexBuilder};

use std::sync::Arc;

use cdo_config::{ConfigError, ConfigResult};
use cdo_foundation::DataStats;
use cdo_mesh::{LocationKind, MeshContext};
use cdo_sles::MsrMatrix;
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::EquationResult;
use crate::param::{
    BcDef, BcType, Definition, EquationParam, ProcessFlag, QuadratureType, SpaceScheme,
    TimeScheme,
};
use crate::property::{Property, PropertyRegistry};

/// 罚函数法的大系数
pub const PENALIZATION_COEF: f64 = 1e13;

// =============================================================================
// 时间步与组装结果
// =============================================================================

/// 当前时间步
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeStep {
    /// 已完成的时间步数
    pub nt_cur: usize,
    /// 当前时刻
    pub t_cur: f64,
}

impl TimeStep {
    /// 创建
    pub fn new(nt_cur: usize, t_cur: f64) -> Self {
        Self { nt_cur, t_cur }
    }
}

/// 组装矩阵的交接方式
#[derive(Debug)]
pub enum MatrixHandoff<'a> {
    /// 构建器保留矩阵，求解侧复制系数
    Copy(&'a MsrMatrix),
    /// 矩阵移交给求解侧
    Transfer(MsrMatrix),
}

impl MatrixHandoff<'_> {
    /// 所交接的矩阵
    pub fn msr(&self) -> &MsrMatrix {
        match self {
            Self::Copy(m) => m,
            Self::Transfer(m) => m,
        }
    }

    /// 是否为移动交接
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Transfer(_))
    }
}

/// 一次组装的结果
#[derive(Debug)]
pub struct AssembledSystem<'a> {
    /// 矩阵
    pub matrix: MatrixHandoff<'a>,
    /// 右端项
    pub rhs: Vec<f64>,
}

// =============================================================================
// 格式接口
// =============================================================================

/// 空间离散格式
pub trait SpaceDiscretization: Send + Sync {
    /// 格式标识
    fn scheme(&self) -> SpaceScheme;

    /// 未知场所在的网格位置
    fn field_location(&self) -> LocationKind;

    /// 是否提供面值
    fn has_face_values(&self) -> bool {
        false
    }

    /// 锁定前检查参数组合
    fn check_setup(&self, param: &EquationParam) -> ConfigResult<()>;

    /// 创建构建器
    fn init_builder(
        &self,
        param: &EquationParam,
        mesh: Arc<MeshContext>,
        props: &PropertyRegistry,
    ) -> EquationResult<Box<dyn SchemeBuilder>>;
}

/// 选择格式实现
pub fn discretization(scheme: SpaceScheme) -> &'static dyn SpaceDiscretization {
    match scheme {
        SpaceScheme::VertexBased => &VertexBasedScheme,
        SpaceScheme::FaceBased => &FaceBasedScheme,
    }
}

/// 离散系统构建器
///
/// 每个方程独占一个实例，在 `init_system` 中创建，随方程一起释放。
pub trait SchemeBuilder: Send {
    /// 线性系统的未知数个数
    fn n_dofs(&self) -> usize;

    /// 计算时刻 `t` 的源项贡献
    fn compute_source(&mut self, t: f64) -> EquationResult<()>;

    /// 迭代初值
    fn initial_guess(&self, field_val: &[f64]) -> Vec<f64>;

    /// 组装矩阵与右端项，`field_val` 为当前场值
    fn build_system(
        &mut self,
        field_val: &[f64],
        ts: TimeStep,
        dt: f64,
    ) -> EquationResult<AssembledSystem<'_>>;

    /// 把线性系统的解写入场
    fn update_field(&mut self, solu: &[f64], field_val: &mut [f64]);

    /// 后处理统计，返回 (名称, 统计量)
    fn extra_op(&self, eq_name: &str, flag: ProcessFlag) -> Vec<(String, DataStats)>;

    /// 面值（仅面基格式）
    fn face_values(&self) -> Option<&[f64]> {
        None
    }

    /// 可写面值（仅面基格式）
    fn face_values_mut(&mut self) -> Option<&mut [f64]> {
        None
    }
}

// =============================================================================
// 公用工具
// =============================================================================

/// 按名称取物性副本，None 取 `unity`
pub(crate) fn lookup_property(
    owner: &str,
    props: &PropertyRegistry,
    name: Option<&str>,
) -> ConfigResult<Property> {
    let name = name.unwrap_or("unity");
    props
        .property(name)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownTerm {
            owner: owner.to_string(),
            kind: "物性".to_string(),
            name: name.to_string(),
        })
}

/// 时间格式对应的 θ
pub(crate) fn theta_of(param: &EquationParam) -> f64 {
    match param.time_scheme {
        TimeScheme::Implicit => 1.0,
        TimeScheme::Explicit => 0.0,
        TimeScheme::CrankNicolson => 0.5,
        TimeScheme::Theta => param.theta,
    }
}

const GAUSS2: [(f64, f64); 2] = [(-0.577_350_269_189_625_8, 0.5), (0.577_350_269_189_625_8, 0.5)];
const GAUSS3: [(f64, f64); 3] = [
    (-0.774_596_669_241_483_4, 5.0 / 18.0),
    (0.0, 8.0 / 18.0),
    (0.774_596_669_241_483_4, 5.0 / 18.0),
];

fn tensor_mean(f: &dyn Fn(DVec3) -> f64, lo: DVec3, hi: DVec3, rule: &[(f64, f64)]) -> f64 {
    let c = 0.5 * (lo + hi);
    let r = 0.5 * (hi - lo);
    let mut sum = 0.0;
    for &(xi, wi) in rule {
        for &(eta, wj) in rule {
            for &(zeta, wk) in rule {
                let p = c + r * DVec3::new(xi, eta, zeta);
                sum += wi * wj * wk * f(p);
            }
        }
    }
    sum
}

/// 定义在轴对齐块 `[lo, hi]` 上的平均值
///
/// 允许某一方向退化（面积分）。数组定义取第 `elt` 个值。
pub(crate) fn box_mean(
    def: &Definition,
    t: f64,
    lo: DVec3,
    hi: DVec3,
    quad: QuadratureType,
    elt: usize,
) -> f64 {
    if !def.is_pointwise() {
        return def.eval(t, 0.5 * (lo + hi), elt);
    }
    quad_mean(&|x: DVec3| def.eval(t, x, elt), lo, hi, quad)
}

/// 函数在轴对齐块 `[lo, hi]` 上的平均值
pub(crate) fn quad_mean(
    f: &dyn Fn(DVec3) -> f64,
    lo: DVec3,
    hi: DVec3,
    quad: QuadratureType,
) -> f64 {
    match quad {
        QuadratureType::Bary => f(0.5 * (lo + hi)),
        QuadratureType::Higher => tensor_mean(f, lo, hi, &GAUSS2),
        QuadratureType::Highest => tensor_mean(f, lo, hi, &GAUSS3),
        QuadratureType::Subdiv => {
            let mid = 0.5 * (lo + hi);
            let mut sum = 0.0;
            for k in 0..8 {
                let pick = |bit: usize, a: f64, m: f64, b: f64| {
                    if k & bit == 0 {
                        0.5 * (a + m)
                    } else {
                        0.5 * (m + b)
                    }
                };
                let p = DVec3::new(
                    pick(1, lo.x, mid.x, hi.x),
                    pick(2, lo.y, mid.y, hi.y),
                    pick(4, lo.z, mid.z, hi.z),
                );
                sum += f(p);
            }
            sum / 8.0
        }
    }
}

/// 两点构成的轴对齐包围块
#[inline]
pub(crate) fn bounding_box(a: DVec3, b: DVec3) -> (DVec3, DVec3) {
    (a.min(b), a.max(b))
}

/// 一个边界面上生效的条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaceBc {
    /// 未被任何定义覆盖，使用默认条件
    Default,
    /// 第 `def` 条定义，面在该位置中的序号为 `pos`
    Defined {
        /// 定义序号
        def: usize,
        /// 元素序号
        pos: usize,
    },
}

/// 检查边界条件与初始条件的位置类别
///
/// 边界条件只能位于边界面上；`ic_on_cells` 为真时初始条件只接受单元位置。
pub(crate) fn check_locations(
    owner: &str,
    param: &EquationParam,
    ic_on_cells: bool,
) -> ConfigResult<()> {
    if let Some(d) = param
        .bc
        .defs
        .iter()
        .find(|d| d.location.kind != LocationKind::BoundaryFaces)
    {
        log::error!("方程 {}: 边界条件位于 {} 位置 {}", owner, d.location.kind, d.location.name);
        return Err(ConfigError::incompatible(
            owner,
            format!("边界条件必须定义在边界面位置上 ({})", d.location.name),
        ));
    }
    if !ic_on_cells {
        return Ok(());
    }
    let misplaced = param
        .ic_definitions
        .iter()
        .filter_map(|ic| ic.location.as_ref())
        .find(|loc| loc.kind != LocationKind::Cells);
    match misplaced {
        Some(loc) => Err(ConfigError::incompatible(
            owner,
            format!("面基格式的初始条件必须定义在单元位置上 ({}: {})", loc.name, loc.kind),
        )),
        None => Ok(()),
    }
}

/// 为每个边界面确定生效的边界条件定义（后定义覆盖先定义）
///
/// 返回值按边界面顺序排列，下标为 `f - n_i_faces`。
pub(crate) fn classify_boundary_faces(
    defs: &[BcDef],
    mesh: &MeshContext,
) -> EquationResult<Vec<FaceBc>> {
    let n_i = mesh.mesh.n_i_faces;
    let mut out = vec![FaceBc::Default; mesh.mesh.n_b_faces];
    for (d, bc) in defs.iter().enumerate() {
        for (pos, f) in mesh.location_faces(bc.location.id)?.into_iter().enumerate() {
            if f >= n_i {
                out[f - n_i] = FaceBc::Defined { def: d, pos };
            }
        }
    }
    Ok(out)
}

/// 边界面上的条件类型
pub(crate) fn face_bc_type(bc: FaceBc, defs: &[BcDef], default_bc: BcType) -> BcType {
    match bc {
        FaceBc::Default => default_bc,
        FaceBc::Defined { def, .. } => defs[def].bc_type,
    }
}

/// Robin 定义 `[alpha, u0]`：`-κ ∂u/∂n = alpha (u - u0)`
pub(crate) fn robin_coefficients(def: &Definition) -> Option<(f64, f64)> {
    match def {
        Definition::Value(v) if v.len() >= 2 => Some((v[0], v[1])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_mean_rules() {
        let lo = DVec3::ZERO;
        let hi = DVec3::new(2.0, 1.0, 1.0);
        // x^2 在 [0, 2] 上的平均值为 4/3
        let def = Definition::analytic(|_, x| x.x * x.x);
        assert!((box_mean(&def, 0.0, lo, hi, QuadratureType::Bary, 0) - 1.0).abs() < 1e-14);
        assert!((box_mean(&def, 0.0, lo, hi, QuadratureType::Higher, 0) - 4.0 / 3.0).abs() < 1e-12);
        assert!((box_mean(&def, 0.0, lo, hi, QuadratureType::Highest, 0) - 4.0 / 3.0).abs() < 1e-12);
        let sub = box_mean(&def, 0.0, lo, hi, QuadratureType::Subdiv, 0);
        assert!((sub - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_box_mean_array_and_degenerate() {
        let arr = Definition::array(vec![3.0, 7.0]);
        let v = box_mean(&arr, 0.0, DVec3::ZERO, DVec3::ONE, QuadratureType::Highest, 1);
        assert_eq!(v, 7.0);
        let lin = Definition::analytic(|_, x| x.y);
        let face = box_mean(
            &lin,
            0.0,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
            QuadratureType::Higher,
            0,
        );
        assert!((face - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_discretization_selection() {
        let vb = discretization(SpaceScheme::VertexBased);
        assert_eq!(vb.field_location(), LocationKind::Vertices);
        assert!(!vb.has_face_values());
        let fb = discretization(SpaceScheme::FaceBased);
        assert_eq!(fb.field_location(), LocationKind::Cells);
        assert!(fb.has_face_values());
    }
}
