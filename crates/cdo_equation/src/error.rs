// crates/cdo_equation/src/error.rs

//! 方程层错误类型
//!
//! 配置、网格与线性系统的错误原样包装；生命周期误用单独归为
//! [`EquationError::InvalidState`]。未收敛不是错误，见 [`SolveReport`]。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cdo_config::ConfigError;
use cdo_mesh::MeshError;
use cdo_sles::{ConvergenceState, SlesError, SolverResult};

/// 方程层结果类型
pub type EquationResult<T> = Result<T, EquationError>;

/// 方程层错误
#[derive(Error, Debug)]
pub enum EquationError {
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 网格错误
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// 线性系统错误
    #[error(transparent)]
    Sles(#[from] SlesError),

    /// 在错误的生命周期阶段调用
    #[error("方程 {name}: 状态 {state} 下不能执行 {action}")]
    InvalidState {
        /// 方程名称
        name: String,
        /// 当前状态
        state: String,
        /// 被拒绝的操作
        action: &'static str,
    },

    /// 资源错误（场或物性缺失）
    #[error("方程 {name}: 资源错误 - {reason}")]
    Resource {
        /// 方程名称
        name: String,
        /// 原因
        reason: String,
    },
}

impl EquationError {
    /// 构造资源错误
    pub fn resource(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// 是否为配置类错误
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// 一次求解的结果报告
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    /// 收敛状态
    pub code: ConvergenceState,
    /// 迭代次数
    pub n_iters: usize,
    /// 最终残差
    pub residual: f64,
}

impl SolveReport {
    /// 是否收敛
    pub fn is_converged(&self) -> bool {
        self.code.is_converged()
    }
}

impl From<SolverResult> for SolveReport {
    fn from(r: SolverResult) -> Self {
        Self {
            code: r.state,
            n_iters: r.n_iters,
            residual: r.residual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_transparent() {
        let err: EquationError = ConfigError::invalid_value("itsol", "foo", "未知求解器").into();
        assert!(err.is_config());
        assert!(err.to_string().contains("itsol"));
    }

    #[test]
    fn test_report_from_solver_result() {
        let r = SolverResult {
            state: ConvergenceState::MaxIteration,
            n_iters: 0,
            residual: 2.0,
        };
        let report = SolveReport::from(r);
        assert!(!report.is_converged());
        assert_eq!(report.code.code(), -1);
    }
}
