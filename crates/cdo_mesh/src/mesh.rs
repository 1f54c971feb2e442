// crates/cdo_mesh/src/mesh.rs

//! 网格维度与打包上下文

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::connect::CdoConnect;
use crate::error::{MeshError, MeshResult};
use crate::location::{LocationKind, MeshLocations};
use crate::quantities::CdoQuantities;

/// 笛卡尔网格维度与实体数量
///
/// 面编号中内部面在前（`0..n_i_faces`），边界面在后。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdoMesh {
    /// 三个方向的单元数
    pub dims: [usize; 3],
    /// 原点
    pub origin: DVec3,
    /// 三个方向的域长度
    pub lengths: DVec3,
    /// 单元数
    pub n_cells: usize,
    /// 顶点数
    pub n_vertices: usize,
    /// 边数
    pub n_edges: usize,
    /// 面数
    pub n_faces: usize,
    /// 内部面数
    pub n_i_faces: usize,
    /// 边界面数
    pub n_b_faces: usize,
}

impl CdoMesh {
    /// 网格步长
    pub fn h(&self) -> DVec3 {
        DVec3::new(
            self.lengths.x / self.dims[0] as f64,
            self.lengths.y / self.dims[1] as f64,
            self.lengths.z / self.dims[2] as f64,
        )
    }

    /// 单元编号
    #[inline]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    /// 顶点编号
    #[inline]
    pub fn vertex_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + (self.dims[0] + 1) * (j + (self.dims[1] + 1) * k)
    }

    /// 单元的 (i, j, k)
    #[inline]
    pub fn cell_ijk(&self, c: usize) -> [usize; 3] {
        let nx = self.dims[0];
        let ny = self.dims[1];
        [c % nx, (c / nx) % ny, c / (nx * ny)]
    }

    /// 某类实体的总数
    pub fn n_elements(&self, kind: LocationKind) -> usize {
        match kind {
            LocationKind::Cells => self.n_cells,
            LocationKind::InteriorFaces => self.n_i_faces,
            LocationKind::BoundaryFaces => self.n_b_faces,
            LocationKind::Vertices => self.n_vertices,
        }
    }
}

/// 打包的网格上下文：维度、邻接、几何量与位置注册表
#[derive(Debug, Clone)]
pub struct MeshContext {
    /// 维度
    pub mesh: CdoMesh,
    /// 邻接关系
    pub connect: CdoConnect,
    /// 几何量
    pub quant: CdoQuantities,
    /// 网格位置
    pub locations: MeshLocations,
}

impl MeshContext {
    /// 位置类别
    pub fn location_kind(&self, ml_id: usize) -> MeshResult<LocationKind> {
        self.locations
            .get(ml_id)
            .map(|l| l.kind)
            .ok_or_else(|| MeshError::InvalidLocation(format!("#{}", ml_id)))
    }

    /// 位置包含的元素；面返回全局面编号
    pub fn location_elements(&self, ml_id: usize) -> MeshResult<Vec<usize>> {
        let loc = self
            .locations
            .get(ml_id)
            .ok_or_else(|| MeshError::InvalidLocation(format!("#{}", ml_id)))?;
        if let Some(elts) = &loc.elements {
            return Ok(elts.clone());
        }
        let m = &self.mesh;
        Ok(match loc.kind {
            LocationKind::Cells => (0..m.n_cells).collect(),
            LocationKind::InteriorFaces => (0..m.n_i_faces).collect(),
            LocationKind::BoundaryFaces => (m.n_i_faces..m.n_faces).collect(),
            LocationKind::Vertices => (0..m.n_vertices).collect(),
        })
    }

    /// 位置上的单元（仅单元类位置）
    pub fn location_cells(&self, ml_id: usize) -> MeshResult<Vec<usize>> {
        match self.location_kind(ml_id)? {
            LocationKind::Cells => self.location_elements(ml_id),
            _ => Ok(Vec::new()),
        }
    }

    /// 位置上的面（仅面类位置）
    pub fn location_faces(&self, ml_id: usize) -> MeshResult<Vec<usize>> {
        match self.location_kind(ml_id)? {
            LocationKind::InteriorFaces | LocationKind::BoundaryFaces => {
                self.location_elements(ml_id)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// 位置所接触的顶点（升序去重）
    pub fn location_vertices(&self, ml_id: usize) -> MeshResult<Vec<usize>> {
        let kind = self.location_kind(ml_id)?;
        let elts = self.location_elements(ml_id)?;
        let mut verts = match kind {
            LocationKind::Vertices => elts,
            LocationKind::Cells => elts
                .iter()
                .flat_map(|&c| self.connect.c2v.row(c).iter().copied())
                .collect(),
            LocationKind::InteriorFaces | LocationKind::BoundaryFaces => elts
                .iter()
                .flat_map(|&f| self.connect.f2v.row(f).iter().copied())
                .collect(),
        };
        verts.sort_unstable();
        verts.dedup();
        Ok(verts)
    }

    /// 按几何条件注册新位置
    ///
    /// 条件作用在元素中心（顶点为坐标）上。
    pub fn add_location_by_selector<F>(
        &mut self,
        name: &str,
        kind: LocationKind,
        selector: F,
    ) -> MeshResult<usize>
    where
        F: Fn(DVec3) -> bool,
    {
        let q = &self.quant;
        let m = &self.mesh;
        let selected: Vec<usize> = match kind {
            LocationKind::Cells => (0..m.n_cells)
                .filter(|&c| selector(q.cell_centers[c]))
                .collect(),
            LocationKind::InteriorFaces => (0..m.n_i_faces)
                .filter(|&f| selector(q.face_centers[f]))
                .collect(),
            LocationKind::BoundaryFaces => (m.n_i_faces..m.n_faces)
                .filter(|&f| selector(q.face_centers[f]))
                .collect(),
            LocationKind::Vertices => (0..m.n_vertices)
                .filter(|&v| selector(q.vtx_coords[v]))
                .collect(),
        };
        self.locations.add(name, kind, Some(selected))
    }
}
