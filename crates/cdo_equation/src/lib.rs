// crates/cdo_equation/src/lib.rs

//! CDO 方程引擎
//!
//! 描述一条标量输运方程（非定常、对流、扩散、反应、源项），
//! 选定空间离散格式后组装稀疏线性系统并交给线性求解器。
//!
//! # 模块
//!
//! - [`param`]: 方程参数、定义与选项键
//! - [`property`] / [`field`]: 物性、对流场与场注册表
//! - [`scheme`]: 离散格式接口，点基与面基两种实现
//! - [`equation`]: 方程生命周期
//! - [`walldistance`]: 壁面距离
//! - [`domain`]: 多方程驱动
//!
//! # 示例
//!
//! ```
//! use cdo_equation::prelude::*;
//! use cdo_mesh::BoxMeshGenerator;
//!
//! let mesh = BoxMeshGenerator::cube(4, 1.0).build()?;
//! let mut domain = CdoDomain::new(mesh);
//!
//! let eq = Equation::new("Poisson", "u", EquationType::User, VarType::Scalar, BcType::HomogeneousDirichlet);
//! let id = domain.add_equation(eq)?;
//! domain.configure(id, |eq, locations| {
//!     eq.link("diffusion", "unity")?;
//!     eq.add_source_term_by_val(locations, None, "cells", vec![1.0])?;
//!     Ok(())
//! })?;
//!
//! domain.initialize()?;
//! let reports = domain.solve_steady()?;
//! assert!(reports[0].1.is_converged());
//! assert!(domain.field_values("u").unwrap().iter().all(|&u| u >= 0.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod equation;
pub mod error;
pub mod field;
pub mod param;
pub mod property;
pub mod scheme;
pub mod walldistance;

pub use domain::CdoDomain;
pub use equation::{Equation, EquationState};
pub use error::{EquationError, EquationResult, SolveReport};
pub use field::{Field, FieldId, FieldRegistry};
pub use param::{Definition, EquationParam, LocationRef};
pub use property::{AdvectionField, Property, PropertyRegistry};
pub use scheme::{SchemeBuilder, SpaceDiscretization, TimeStep};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::domain::CdoDomain;
    pub use crate::equation::{Equation, EquationState};
    pub use crate::error::{EquationError, EquationResult, SolveReport};
    pub use crate::field::{FieldId, FieldRegistry};
    pub use crate::param::{BcType, Definition, EquationType, SpaceScheme, VarType};
    pub use crate::property::{AdvectionField, Property, PropertyRegistry};
    pub use crate::scheme::TimeStep;
}
