// crates/cdo_mesh/src/lib.rs

//! CDO 网格模块
//!
//! 方程引擎只读地消费三类网格数据：
//!
//! - [`CdoMesh`]: 维度与实体数量
//! - [`CdoConnect`]: 单元/面/边/顶点之间的邻接关系
//! - [`CdoQuantities`]: 几何量，包括对偶面与对偶体积
//!
//! 另外 [`MeshLocations`] 提供“名称 → 位置编号”的注册表。
//! [`BoxMeshGenerator`] 生成六面体笛卡尔网格，返回打包的 [`MeshContext`]。
//!
//! # 示例
//!
//! ```rust
//! use cdo_mesh::BoxMeshGenerator;
//!
//! let ctx = BoxMeshGenerator::cube(2, 1.0).build().unwrap();
//! assert_eq!(ctx.mesh.n_cells, 8);
//! assert_eq!(ctx.mesh.n_vertices, 27);
//! assert!(ctx.locations.id_by_name("boundary_faces").is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connect;
pub mod error;
pub mod generation;
pub mod location;
pub mod mesh;
pub mod quantities;

pub use connect::{Adjacency, CdoConnect};
pub use error::{MeshError, MeshResult};
pub use generation::BoxMeshGenerator;
pub use location::{LocationKind, MeshLocation, MeshLocations};
pub use mesh::{CdoMesh, MeshContext};
pub use quantities::{CdoQuantities, DualFace};
