// crates/cdo_sles/src/error.rs

//! 线性系统错误类型

use thiserror::Error;

/// 线性系统模块的 Result 类型别名
pub type SlesResult<T> = Result<T, SlesError>;

/// 线性系统错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlesError {
    /// 求解器家族不支持该 (求解器, 预条件子) 组合
    #[error("不兼容的求解器组合: 家族 {family}, 求解器 {solver}, 预条件子 {precond}")]
    Incompatible {
        /// 求解器家族
        family: String,
        /// 求解器
        solver: String,
        /// 预条件子
        precond: String,
    },

    /// 维度不匹配
    #[error("维度不匹配 ({context}): 期望 {expected}, 实际 {actual}")]
    DimensionMismatch {
        /// 出错位置
        context: &'static str,
        /// 期望长度
        expected: usize,
        /// 实际长度
        actual: usize,
    },

    /// 矩阵结构与首次组装时不一致
    #[error("矩阵结构不一致: {0}")]
    StructureMismatch(String),

    /// 矩阵尚未组装
    #[error("系统矩阵尚未组装: {0}")]
    EmptyMatrix(String),

    /// 预条件子分解失败
    #[error("分解失败 ({precond}): 第 {row} 行主元 {pivot:.3e}")]
    Breakdown {
        /// 预条件子名称
        precond: &'static str,
        /// 行号
        row: usize,
        /// 主元值
        pivot: f64,
    },

    /// 未注册的线性系统
    #[error("未注册的线性系统: {0}")]
    NotRegistered(String),
}

impl SlesError {
    /// 维度不匹配
    pub fn dimension(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = SlesError::Incompatible {
            family: "native".into(),
            solver: "cg".into(),
            precond: "ilu0".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("cg"));
        assert!(msg.contains("ilu0"));

        let e = SlesError::dimension("rhs", 4, 3);
        assert!(e.to_string().contains("rhs"));
    }
}
