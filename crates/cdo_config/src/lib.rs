// crates/cdo_config/src/lib.rs

//! CDO 配置层
//!
//! - [`error`]: 配置期错误分类 [`ConfigError`]
//! - [`setup`]: 以 JSON 描述的方程设置脚本 [`EquationSetup`]
//!
//! 方程参数本身不做序列化；设置脚本只记录调用顺序，
//! 由方程层按序回放到公开的设置接口上。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod setup;

pub use error::{ConfigError, ConfigResult};
pub use setup::{
    BoundaryConditionEntry, EquationSetup, InitialConditionEntry, LinkEntry, OptionEntry,
    ReactionEntry, SourceTermEntry,
};
