// crates/cdo_mesh/src/generation.rs

//! 网格生成
//!
//! [`BoxMeshGenerator`] 在长方体域上生成均匀六面体网格，
//! 并一次性构建 CDO 格式需要的邻接关系、几何量与位置注册表。
//!
//! ```rust
//! use cdo_mesh::BoxMeshGenerator;
//!
//! let ctx = BoxMeshGenerator::new(3, 2, 1, 3.0, 2.0, 1.0).build().unwrap();
//! assert_eq!(ctx.mesh.n_cells, 6);
//! assert_eq!(ctx.mesh.n_b_faces, 2 * (2 * 1 + 3 * 1 + 3 * 2));
//! ```

use glam::DVec3;

use crate::connect::{Adjacency, CdoConnect};
use crate::error::{MeshError, MeshResult};
use crate::location::{LocationKind, MeshLocations};
use crate::mesh::{CdoMesh, MeshContext};
use crate::quantities::{CdoQuantities, DualFace};

/// 边界面组名称，顺序为 x-, x+, y-, y+, z-, z+
pub const BOUNDARY_GROUPS: [&str; 6] = ["xmin", "xmax", "ymin", "ymax", "zmin", "zmax"];

/// 长方体六面体网格生成器
#[derive(Debug, Clone)]
pub struct BoxMeshGenerator {
    dims: [usize; 3],
    lengths: DVec3,
    origin: DVec3,
}

struct RawFace {
    owner: usize,
    neighbor: Option<usize>,
    normal: DVec3,
    center: DVec3,
    area: f64,
    verts: [usize; 4],
    group: Option<usize>,
}

impl BoxMeshGenerator {
    /// 创建生成器
    ///
    /// # 参数
    ///
    /// - `nx`, `ny`, `nz`: 三个方向的单元数
    /// - `lx`, `ly`, `lz`: 三个方向的域长度
    pub fn new(nx: usize, ny: usize, nz: usize, lx: f64, ly: f64, lz: f64) -> Self {
        Self {
            dims: [nx, ny, nz],
            lengths: DVec3::new(lx, ly, lz),
            origin: DVec3::ZERO,
        }
    }

    /// 立方体网格
    pub fn cube(n: usize, length: f64) -> Self {
        Self::new(n, n, n, length, length, length)
    }

    /// 设置原点偏移
    pub fn with_origin(mut self, x0: f64, y0: f64, z0: f64) -> Self {
        self.origin = DVec3::new(x0, y0, z0);
        self
    }

    fn validate(&self) -> MeshResult<()> {
        if self.dims.iter().any(|&n| n == 0) {
            return Err(MeshError::InvalidDimensions(format!(
                "单元数必须为正: {:?}",
                self.dims
            )));
        }
        let l = self.lengths;
        if !(l.x > 0.0 && l.y > 0.0 && l.z > 0.0) || !l.is_finite() {
            return Err(MeshError::InvalidDimensions(format!(
                "域长度必须为正: {:?}",
                l
            )));
        }
        Ok(())
    }

    /// 构建网格上下文
    pub fn build(&self) -> MeshResult<MeshContext> {
        self.validate()?;

        let [nx, ny, nz] = self.dims;
        let h = DVec3::new(
            self.lengths.x / nx as f64,
            self.lengths.y / ny as f64,
            self.lengths.z / nz as f64,
        );
        let o = self.origin;

        let n_cells = nx * ny * nz;
        let n_vertices = (nx + 1) * (ny + 1) * (nz + 1);
        let nex = nx * (ny + 1) * (nz + 1);
        let ney = (nx + 1) * ny * (nz + 1);
        let nez = (nx + 1) * (ny + 1) * nz;
        let n_edges = nex + ney + nez;

        let vid = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cid = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
        let ex = |i: usize, j: usize, k: usize| i + nx * (j + (ny + 1) * k);
        let ey = |i: usize, j: usize, k: usize| nex + i + (nx + 1) * (j + ny * k);
        let ez = |i: usize, j: usize, k: usize| nex + ney + i + (nx + 1) * (j + (ny + 1) * k);

        // 顶点
        let mut vtx_coords = Vec::with_capacity(n_vertices);
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    vtx_coords.push(o + DVec3::new(i as f64, j as f64, k as f64) * h);
                }
            }
        }

        // 边：x 边、y 边、z 边依次编号
        let mut e2v_rows = Vec::with_capacity(n_edges);
        let mut edge_tangents = Vec::with_capacity(n_edges);
        let mut edge_lengths = Vec::with_capacity(n_edges);
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..nx {
                    e2v_rows.push(vec![(vid(i, j, k), -1), (vid(i + 1, j, k), 1)]);
                    edge_tangents.push(DVec3::X);
                    edge_lengths.push(h.x);
                }
            }
        }
        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..=nx {
                    e2v_rows.push(vec![(vid(i, j, k), -1), (vid(i, j + 1, k), 1)]);
                    edge_tangents.push(DVec3::Y);
                    edge_lengths.push(h.y);
                }
            }
        }
        for k in 0..nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    e2v_rows.push(vec![(vid(i, j, k), -1), (vid(i, j, k + 1), 1)]);
                    edge_tangents.push(DVec3::Z);
                    edge_lengths.push(h.z);
                }
            }
        }
        let edge_centers: Vec<DVec3> = e2v_rows
            .iter()
            .map(|r| 0.5 * (vtx_coords[r[0].0] + vtx_coords[r[1].0]))
            .collect();

        // 面
        let mut raw = Vec::new();
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..=nx {
                    let verts = [vid(i, j, k), vid(i, j + 1, k), vid(i, j + 1, k + 1), vid(i, j, k + 1)];
                    let center = o + DVec3::new(i as f64 * h.x, (j as f64 + 0.5) * h.y, (k as f64 + 0.5) * h.z);
                    let (owner, neighbor, normal, group) = if i == 0 {
                        (cid(0, j, k), None, -DVec3::X, Some(0))
                    } else if i == nx {
                        (cid(nx - 1, j, k), None, DVec3::X, Some(1))
                    } else {
                        (cid(i - 1, j, k), Some(cid(i, j, k)), DVec3::X, None)
                    };
                    raw.push(RawFace { owner, neighbor, normal, center, area: h.y * h.z, verts, group });
                }
            }
        }
        for k in 0..nz {
            for j in 0..=ny {
                for i in 0..nx {
                    let verts = [vid(i, j, k), vid(i + 1, j, k), vid(i + 1, j, k + 1), vid(i, j, k + 1)];
                    let center = o + DVec3::new((i as f64 + 0.5) * h.x, j as f64 * h.y, (k as f64 + 0.5) * h.z);
                    let (owner, neighbor, normal, group) = if j == 0 {
                        (cid(i, 0, k), None, -DVec3::Y, Some(2))
                    } else if j == ny {
                        (cid(i, ny - 1, k), None, DVec3::Y, Some(3))
                    } else {
                        (cid(i, j - 1, k), Some(cid(i, j, k)), DVec3::Y, None)
                    };
                    raw.push(RawFace { owner, neighbor, normal, center, area: h.x * h.z, verts, group });
                }
            }
        }
        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..nx {
                    let verts = [vid(i, j, k), vid(i + 1, j, k), vid(i + 1, j + 1, k), vid(i, j + 1, k)];
                    let center = o + DVec3::new((i as f64 + 0.5) * h.x, (j as f64 + 0.5) * h.y, k as f64 * h.z);
                    let (owner, neighbor, normal, group) = if k == 0 {
                        (cid(i, j, 0), None, -DVec3::Z, Some(4))
                    } else if k == nz {
                        (cid(i, j, nz - 1), None, DVec3::Z, Some(5))
                    } else {
                        (cid(i, j, k - 1), Some(cid(i, j, k)), DVec3::Z, None)
                    };
                    raw.push(RawFace { owner, neighbor, normal, center, area: h.x * h.y, verts, group });
                }
            }
        }

        // 内部面在前，边界面在后
        let (interior, boundary): (Vec<RawFace>, Vec<RawFace>) =
            raw.into_iter().partition(|f| f.neighbor.is_some());
        let n_i_faces = interior.len();
        let n_b_faces = boundary.len();
        let faces: Vec<RawFace> = interior.into_iter().chain(boundary).collect();
        let n_faces = faces.len();

        let mut c2f_rows: Vec<Vec<(usize, i8)>> = vec![Vec::with_capacity(6); n_cells];
        let mut f2v_rows = Vec::with_capacity(n_faces);
        let mut f2c = Vec::with_capacity(n_faces);
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); BOUNDARY_GROUPS.len()];
        let mut v_on_boundary = vec![false; n_vertices];
        for (f, face) in faces.iter().enumerate() {
            c2f_rows[face.owner].push((f, 1));
            if let Some(n) = face.neighbor {
                c2f_rows[n].push((f, -1));
            }
            f2v_rows.push(face.verts.to_vec());
            f2c.push((face.owner, face.neighbor));
            if let Some(g) = face.group {
                groups[g].push(f);
                for &v in &face.verts {
                    v_on_boundary[v] = true;
                }
            }
        }

        // 单元
        let vol = h.x * h.y * h.z;
        let mut c2v_rows = Vec::with_capacity(n_cells);
        let mut c2e_rows = Vec::with_capacity(n_cells);
        let mut cell_centers = Vec::with_capacity(n_cells);
        let mut dface = Vec::with_capacity(12 * n_cells);
        let pairs = [(0, 0), (1, 0), (0, 1), (1, 1)];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let mut cv = Vec::with_capacity(8);
                    for c in 0..2 {
                        for b in 0..2 {
                            for a in 0..2 {
                                cv.push(vid(i + a, j + b, k + c));
                            }
                        }
                    }
                    c2v_rows.push(cv);

                    let mut ce = Vec::with_capacity(12);
                    for &(b, c) in &pairs {
                        ce.push(ex(i, j + b, k + c));
                        dface.push(DualFace { area: 0.25 * h.y * h.z, normal: DVec3::X });
                    }
                    for &(a, c) in &pairs {
                        ce.push(ey(i + a, j, k + c));
                        dface.push(DualFace { area: 0.25 * h.x * h.z, normal: DVec3::Y });
                    }
                    for &(a, b) in &pairs {
                        ce.push(ez(i + a, j + b, k));
                        dface.push(DualFace { area: 0.25 * h.x * h.y, normal: DVec3::Z });
                    }
                    c2e_rows.push(ce);

                    cell_centers.push(
                        o + DVec3::new(i as f64 + 0.5, j as f64 + 0.5, k as f64 + 0.5) * h,
                    );
                }
            }
        }

        let c2v = Adjacency::from_rows(&c2v_rows);
        let e2v = Adjacency::from_signed_rows(&e2v_rows);

        let mut v2v_rows: Vec<Vec<usize>> = vec![Vec::new(); n_vertices];
        for e in 0..n_edges {
            let r = e2v.row(e);
            v2v_rows[r[0]].push(r[1]);
            v2v_rows[r[1]].push(r[0]);
        }
        for row in &mut v2v_rows {
            row.sort_unstable();
        }

        let dcell_vol = vec![0.125 * vol; 8 * n_cells];
        let mut dual_vol = vec![0.0; n_vertices];
        for c in 0..n_cells {
            for (lv, &v) in c2v.row(c).iter().enumerate() {
                dual_vol[v] += dcell_vol[8 * c + lv];
            }
        }

        let connect = CdoConnect {
            v2c: c2v.transpose(n_vertices),
            c2v,
            c2e: Adjacency::from_rows(&c2e_rows),
            c2f: Adjacency::from_signed_rows(&c2f_rows),
            f2v: Adjacency::from_rows(&f2v_rows),
            e2v,
            v2v: Adjacency::from_rows(&v2v_rows),
            f2c,
            v_on_boundary,
        };

        let quant = CdoQuantities {
            cell_centers,
            cell_vol: vec![vol; n_cells],
            cell_h: vec![h; n_cells],
            face_centers: faces.iter().map(|f| f.center).collect(),
            face_normals: faces.iter().map(|f| f.normal).collect(),
            face_areas: faces.iter().map(|f| f.area).collect(),
            edge_centers,
            edge_tangents,
            edge_lengths,
            vtx_coords,
            dual_vol,
            dcell_vol,
            dface,
            vol_tot: vol * n_cells as f64,
        };

        let mut locations = MeshLocations::with_predefined();
        for (name, elts) in BOUNDARY_GROUPS.iter().zip(groups) {
            locations.add(name, LocationKind::BoundaryFaces, Some(elts))?;
        }

        let mesh = CdoMesh {
            dims: self.dims,
            origin: o,
            lengths: self.lengths,
            n_cells,
            n_vertices,
            n_edges,
            n_faces,
            n_i_faces,
            n_b_faces,
        };

        log::debug!(
            "生成笛卡尔网格 {:?}: {} 单元, {} 面 ({} 边界), {} 边, {} 顶点",
            self.dims,
            n_cells,
            n_faces,
            n_b_faces,
            n_edges,
            n_vertices
        );

        Ok(MeshContext {
            mesh,
            connect,
            quant,
            locations,
        })
    }
}
