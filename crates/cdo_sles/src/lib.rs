// crates/cdo_sles/src/lib.rs

//! CDO 稀疏线性系统
//!
//! 离散格式组装出的 MSR 矩阵在这里交给迭代求解器。
//!
//! # 模块
//!
//! - [`csr`] / [`msr`]: 稀疏矩阵格式
//! - [`matrix`]: 结构复用的系统矩阵（复制或移动系数）
//! - [`preconditioner`]: Jacobi、多项式、SSOR、ILU(0)、IC(0)、Schwarz
//! - [`solver`]: PCG、BiCGStab、GMRES 与收敛状态
//! - [`amg`]: 聚合型代数多重网格
//! - [`binding`]: (家族, 求解器, 预条件子) 注册表
//!
//! # 示例
//!
//! ```
//! use std::sync::Arc;
//! use cdo_sles::{BindingRegistry, LinearSolverParam, MsrMatrix, MsrStructure, SolveControl, SystemMatrix};
//!
//! let s = Arc::new(MsrStructure::from_rows(2, &[vec![1], vec![0]]));
//! let mut a = MsrMatrix::new(s);
//! a.add(0, 0, 2.0);
//! a.add(1, 1, 2.0);
//! a.add(0, 1, -1.0);
//! a.add(1, 0, -1.0);
//! let mut sys = SystemMatrix::new();
//! sys.transfer_coefficients(a).unwrap();
//!
//! let mut sles = BindingRegistry::with_defaults()
//!     .bind("demo", &LinearSolverParam::default())
//!     .unwrap();
//! let mut x = vec![0.0; 2];
//! let res = sles.solve(&sys, SolveControl::new(1e-12, 1.0, 10), &[1.0, 1.0], &mut x).unwrap();
//! assert!(res.is_converged());
//! assert!((x[0] - 1.0).abs() < 1e-10);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod amg;
pub mod binding;
pub mod csr;
pub mod error;
pub mod matrix;
pub mod msr;
pub mod operator;
pub mod preconditioner;
pub mod solver;
pub mod vector_ops;

pub use amg::{AmgConfig, AmgHierarchy, AmgPreconditioner, AmgSolver, CoarseSolverKind, SmootherKind};
pub use binding::{
    native_amg_config, BindingRegistry, LinearSolverParam, MatrixFormat, PrecondKind, Sles,
    SolverFamily, SolverKind, SolverSetup,
};
pub use csr::{CsrBuilder, CsrMatrix, CsrPattern};
pub use error::{SlesError, SlesResult};
pub use matrix::SystemMatrix;
pub use msr::{MatrixInfo, MsrMatrix, MsrStructure};
pub use operator::LinearOperator;
pub use preconditioner::Preconditioner;
pub use solver::{ConvergencePlot, ConvergenceState, IterativeSolver, SolveControl, SolverResult};
