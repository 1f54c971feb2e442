// crates/cdo_mesh/src/error.rs

//! 网格错误类型

use thiserror::Error;

/// 网格模块结果类型
pub type MeshResult<T> = Result<T, MeshError>;

/// 网格错误枚举
#[derive(Error, Debug)]
pub enum MeshError {
    /// 网格尺寸非法
    #[error("网格尺寸非法: {0}")]
    InvalidDimensions(String),

    /// 未知网格位置
    #[error("未知网格位置: '{0}'")]
    InvalidLocation(String),

    /// 位置重名
    #[error("网格位置已存在: '{0}'")]
    DuplicateLocation(String),

    /// 元素编号越界
    #[error("元素编号越界: {kind} {id} (总数 {count})")]
    ElementOutOfRange {
        /// 元素类别
        kind: &'static str,
        /// 编号
        id: usize,
        /// 总数
        count: usize,
    },
}
