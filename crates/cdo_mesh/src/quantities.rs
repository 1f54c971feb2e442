// crates/cdo_mesh/src/quantities.rs

//! 几何量
//!
//! 除原始网格的中心、面积、体积外，还保存 CDO 格式需要的对偶量：
//! 每个 (单元, 局部边) 的对偶面片，每个 (单元, 局部顶点) 的对偶体积。

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// 单元内的对偶面片
///
/// 法向与所对应的原始边同向，面积为面片在该单元内的部分。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DualFace {
    /// 面片面积
    pub area: f64,
    /// 单位法向
    pub normal: DVec3,
}

/// 几何量集合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdoQuantities {
    /// 单元中心
    pub cell_centers: Vec<DVec3>,
    /// 单元体积
    pub cell_vol: Vec<f64>,
    /// 单元三个方向的尺寸
    pub cell_h: Vec<DVec3>,
    /// 面中心
    pub face_centers: Vec<DVec3>,
    /// 面单位法向（owner 指向 neighbor，边界面指向域外）
    pub face_normals: Vec<DVec3>,
    /// 面面积
    pub face_areas: Vec<f64>,
    /// 边中点
    pub edge_centers: Vec<DVec3>,
    /// 边单位切向
    pub edge_tangents: Vec<DVec3>,
    /// 边长
    pub edge_lengths: Vec<f64>,
    /// 顶点坐标
    pub vtx_coords: Vec<DVec3>,
    /// 顶点对偶体积
    pub dual_vol: Vec<f64>,
    /// (单元, 局部顶点) 对偶体积，与 `c2v` 对齐
    pub dcell_vol: Vec<f64>,
    /// (单元, 局部边) 对偶面片，与 `c2e` 对齐
    pub dface: Vec<DualFace>,
    /// 域总体积
    pub vol_tot: f64,
}

impl CdoQuantities {
    /// 单元数
    pub fn n_cells(&self) -> usize {
        self.cell_vol.len()
    }

    /// 顶点数
    pub fn n_vertices(&self) -> usize {
        self.vtx_coords.len()
    }

    /// 面数
    pub fn n_faces(&self) -> usize {
        self.face_areas.len()
    }

    /// 单元中心到面中心的距离
    #[inline]
    pub fn dist_cell_face(&self, c: usize, f: usize) -> f64 {
        (self.face_centers[f] - self.cell_centers[c]).length()
    }

    /// 最小与最大单元尺寸
    pub fn cell_size_range(&self) -> (f64, f64) {
        self.cell_h.iter().fold((f64::MAX, 0.0_f64), |(lo, hi), h| {
            (lo.min(h.min_element()), hi.max(h.max_element()))
        })
    }
}
