// crates/cdo_foundation/src/lib.rs

//! CDO Foundation Layer
//!
//! 方程引擎的基础层，不依赖网格和线性代数。
//!
//! # 模块概览
//!
//! - [`metrics`]: 计时器，按名称组织的计时统计
//! - [`float`]: 浮点阈值与零值判断
//! - [`stats`]: 数组统计量
//!
//! # 示例
//!
//! ```
//! use cdo_foundation::metrics::TimerStats;
//!
//! let mut stats = TimerStats::new();
//! let id = stats.create("stages", "poisson");
//! stats.start(id);
//! stats.stop(id);
//! assert_eq!(stats.timer(id).map(|t| t.count()), Some(1));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod float;
pub mod metrics;
pub mod stats;

pub use float::{is_zero_value, DBL_MIN};
pub use metrics::{Timer, TimerGuard, TimerId, TimerSnapshot, TimerStats};
pub use stats::DataStats;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::float::{is_zero_value, DBL_MIN};
    pub use crate::metrics::{Timer, TimerId, TimerStats};
}
