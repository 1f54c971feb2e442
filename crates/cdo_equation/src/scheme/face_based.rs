// crates/cdo_equation/src/scheme/face_based.rs

//! CDO 面基格式（标量，混合形式）
//!
//! 每个单元有一个单元未知量和若干面未知量。单元内
//!
//! ```text
//! a_c u_c - Σ w_f u_f = b_c,    w_f = κ_c |f| / d(c, f)
//! ```
//!
//! 其中 `a_c = Σ w_f (+ ρ|c|/dt)`。消去单元未知量后只剩面未知量
//! （静态凝聚），求解后在 `update_field` 中恢复单元值。
//! 每次组装生成新矩阵并移交给求解侧。

use std::sync::Arc;

use cdo_config::{ConfigError, ConfigResult};
use cdo_foundation::DataStats;
use cdo_mesh::{LocationKind, MeshContext};
use cdo_sles::{MsrMatrix, MsrStructure, SlesError};
use glam::DVec3;

use super::vertex_based::{check_robin, check_source_locations};
use super::{
    box_mean, check_locations, classify_boundary_faces, face_bc_type, lookup_property,
    robin_coefficients, AssembledSystem, FaceBc, MatrixHandoff, SchemeBuilder,
    SpaceDiscretization, TimeStep,
};
use crate::error::EquationResult;
use crate::param::{
    BcEnforcement, BcParam, BcType, Definition, EquationParam, HodgeAlgo, ProcessFlag,
    QuadratureType, SourceTerm, SpaceScheme, TermFlags, TimeScheme, VarType,
};
use crate::property::{Property, PropertyRegistry};

/// CDO 面基格式
#[derive(Debug, Clone, Copy, Default)]
pub struct FaceBasedScheme;

impl SpaceDiscretization for FaceBasedScheme {
    fn scheme(&self) -> SpaceScheme {
        SpaceScheme::FaceBased
    }

    fn field_location(&self) -> LocationKind {
        LocationKind::Cells
    }

    fn has_face_values(&self) -> bool {
        true
    }

    fn check_setup(&self, param: &EquationParam) -> ConfigResult<()> {
        let owner = param.owner();
        let unsupported = if param.var_type != VarType::Scalar {
            Some(format!("面基格式的 {} 变量", param.var_type))
        } else if param.flag.contains(TermFlags::CONVECTION) {
            Some("面基格式的对流项".to_string())
        } else if param.flag.contains(TermFlags::REACTION) {
            Some("面基格式的反应项".to_string())
        } else if param.diffusion_hodge.algo == HodgeAlgo::Wbs {
            Some("面基格式的 WBS 扩散 Hodge".to_string())
        } else if param.is_unsteady() && param.time_scheme != TimeScheme::Implicit {
            Some(format!("面基格式的 {} 时间格式", param.time_scheme))
        } else if param.bc.enforcement != BcEnforcement::Strong {
            Some(format!("面基格式的 Dirichlet 施加方式 {}", param.bc.enforcement))
        } else {
            None
        };
        if let Some(feature) = unsupported {
            return Err(ConfigError::not_implemented(owner, feature));
        }
        if !param.flag.contains(TermFlags::DIFFUSION) {
            return Err(ConfigError::incompatible(owner, "面基格式需要扩散项"));
        }
        check_locations(owner, param, true)?;
        check_robin(owner, &param.bc)
    }

    fn init_builder(
        &self,
        param: &EquationParam,
        mesh: Arc<MeshContext>,
        props: &PropertyRegistry,
    ) -> EquationResult<Box<dyn SchemeBuilder>> {
        Ok(Box::new(FaceBuilder::new(param, mesh, props)?))
    }
}

/// 面基格式构建器
pub struct FaceBuilder {
    owner: String,
    mesh: Arc<MeshContext>,
    structure: Arc<MsrStructure>,
    /// (单元, 局部面) 权重，与 `c2f` 对齐
    weights: Vec<f64>,
    time: Option<(Property, bool)>,
    sources: Vec<SourceTerm>,
    time_dependent_source: bool,
    bc: BcParam,
    face_bc: Vec<FaceBc>,
    source: Vec<f64>,
    cell_diag: Vec<f64>,
    cell_rhs: Vec<f64>,
    face_values: Vec<f64>,
}

fn cell_box(mesh: &MeshContext, c: usize) -> (DVec3, DVec3) {
    let xc = mesh.quant.cell_centers[c];
    let half = 0.5 * mesh.quant.cell_h[c];
    (xc - half, xc + half)
}

fn face_box(mesh: &MeshContext, f: usize) -> (DVec3, DVec3) {
    let verts = mesh.connect.f2v.row(f);
    let x = &mesh.quant.vtx_coords;
    verts.iter().skip(1).fold((x[verts[0]], x[verts[0]]), |(lo, hi), &v| {
        (lo.min(x[v]), hi.max(x[v]))
    })
}

impl FaceBuilder {
    /// 根据已锁定的参数创建
    pub fn new(
        param: &EquationParam,
        mesh: Arc<MeshContext>,
        props: &PropertyRegistry,
    ) -> EquationResult<Self> {
        let owner = param.owner();
        check_source_locations(owner, &param.source_terms, &mesh)?;

        let diffusion = lookup_property(owner, props, param.diffusion_property.as_deref())?;
        let inv = param.diffusion_hodge.inv_pty;
        let conn = &mesh.connect;
        let q = &mesh.quant;
        let n_cells = mesh.mesh.n_cells;
        let n_faces = mesh.mesh.n_faces;

        let mut weights = Vec::with_capacity(conn.c2f.nnz());
        for c in 0..n_cells {
            let kappa = diffusion.cell_value(c, q.cell_centers[c], inv);
            for &f in conn.c2f.row(c) {
                weights.push(kappa * q.face_areas[f] / q.dist_cell_face(c, f));
            }
        }

        let rows: Vec<Vec<usize>> = conn
            .f2c
            .iter()
            .map(|&(owner_c, nb)| {
                let mut row = conn.c2f.row(owner_c).to_vec();
                if let Some(n) = nb {
                    row.extend_from_slice(conn.c2f.row(n));
                }
                row
            })
            .collect();
        let structure = Arc::new(MsrStructure::from_rows(n_faces, &rows));

        let time = if param.is_unsteady() {
            Some((
                lookup_property(owner, props, param.time_property.as_deref())?,
                param.time_hodge.inv_pty,
            ))
        } else {
            None
        };

        log::debug!(
            "{}: 面基构建器, {} 个面, {} 个单元, 非对角元 {}",
            owner,
            n_faces,
            n_cells,
            structure.n_extra()
        );

        Ok(Self {
            owner: owner.to_string(),
            structure,
            weights,
            time,
            time_dependent_source: param
                .source_terms
                .iter()
                .any(|st| matches!(st.def, Definition::Analytic(_) | Definition::User(_))),
            sources: param.source_terms.clone(),
            bc: param.bc.clone(),
            face_bc: classify_boundary_faces(&param.bc.defs, &mesh)?,
            source: vec![0.0; n_cells],
            cell_diag: vec![0.0; n_cells],
            cell_rhs: vec![0.0; n_cells],
            face_values: vec![0.0; n_faces],
            mesh,
        })
    }

    /// 单元源项积分
    pub fn source(&self) -> &[f64] {
        &self.source
    }

    fn bc_quadrature(&self) -> QuadratureType {
        if self.bc.use_subdiv {
            QuadratureType::Subdiv
        } else {
            self.bc.quad_type
        }
    }
}

impl SchemeBuilder for FaceBuilder {
    fn n_dofs(&self) -> usize {
        self.mesh.mesh.n_faces
    }

    fn compute_source(&mut self, t: f64) -> EquationResult<()> {
        self.source.fill(0.0);
        for st in &self.sources {
            for (pos, c) in self.mesh.location_cells(st.location.id)?.into_iter().enumerate() {
                let (lo, hi) = cell_box(&self.mesh, c);
                self.source[c] +=
                    self.mesh.quant.cell_vol[c] * box_mean(&st.def, t, lo, hi, st.quadrature, pos);
            }
        }
        Ok(())
    }

    fn initial_guess(&self, _field_val: &[f64]) -> Vec<f64> {
        self.face_values.clone()
    }

    fn build_system(
        &mut self,
        field_val: &[f64],
        ts: TimeStep,
        dt: f64,
    ) -> EquationResult<AssembledSystem<'_>> {
        let mesh = Arc::clone(&self.mesh);
        let conn = &mesh.connect;
        let q = &mesh.quant;
        let n_cells = mesh.mesh.n_cells;
        if field_val.len() != n_cells {
            return Err(SlesError::dimension("cell field", n_cells, field_val.len()).into());
        }
        let unsteady = self.time.is_some();
        if unsteady && (dt.is_nan() || dt <= 0.0) {
            return Err(ConfigError::invalid_value("dt", dt.to_string(), "时间步长必须为正").into());
        }
        let t_eval = if unsteady { ts.t_cur + dt } else { ts.t_cur };
        if self.time_dependent_source {
            self.compute_source(t_eval)?;
        }

        let mut m = MsrMatrix::new(Arc::clone(&self.structure));
        let mut rhs = vec![0.0; mesh.mesh.n_faces];

        for c in 0..n_cells {
            let start = conn.c2f.start(c);
            let faces = conn.c2f.row(c);
            let ws = &self.weights[start..start + faces.len()];
            let mut a_c: f64 = ws.iter().sum();
            let mut b_c = self.source[c];
            if let Some((rho, inv)) = &self.time {
                let r = rho.cell_value(c, q.cell_centers[c], *inv) * q.cell_vol[c] / dt;
                a_c += r;
                b_c += r * field_val[c];
            }
            if !(a_c > 0.0) {
                log::error!("{}: 单元 {} 的扩散系数非正 (a_c = {:.3e})", self.owner, c, a_c);
                return Err(ConfigError::invalid_value(
                    "diffusion",
                    format!("{:.3e}", a_c),
                    "面基格式要求单元系数为正",
                )
                .into());
            }
            self.cell_diag[c] = a_c;
            self.cell_rhs[c] = b_c;

            for (i, &f) in faces.iter().enumerate() {
                for (j, &g) in faces.iter().enumerate() {
                    let mut v = -ws[i] * ws[j] / a_c;
                    if i == j {
                        v += ws[i];
                    }
                    let ok = m.add(f, g, v);
                    debug_assert!(ok, "({}, {}) 不在矩阵结构中", f, g);
                }
                rhs[f] += ws[i] * b_c / a_c;
            }
        }

        let n_i = mesh.mesh.n_i_faces;
        let quad = self.bc_quadrature();
        let mut dirichlet = Vec::new();
        for (bi, fb) in self.face_bc.iter().enumerate() {
            let f = n_i + bi;
            let area = q.face_areas[f];
            match (face_bc_type(*fb, &self.bc.defs, self.bc.default_bc), *fb) {
                (BcType::HomogeneousDirichlet, _) => dirichlet.push((f, 0.0)),
                (BcType::Dirichlet, FaceBc::Defined { def, pos }) => {
                    let val = self.bc.defs[def].def.eval(t_eval, q.face_centers[f], pos);
                    dirichlet.push((f, val));
                }
                (BcType::Neumann, FaceBc::Defined { def, pos }) => {
                    let (lo, hi) = face_box(&mesh, f);
                    rhs[f] += area * box_mean(&self.bc.defs[def].def, t_eval, lo, hi, quad, pos);
                }
                (BcType::Robin, FaceBc::Defined { def, .. }) => {
                    if let Some((alpha, u0)) = robin_coefficients(&self.bc.defs[def].def) {
                        m.add(f, f, alpha * area);
                        rhs[f] += alpha * u0 * area;
                    }
                }
                _ => {}
            }
        }
        for &(f, val) in &dirichlet {
            m.eliminate_dof(f, val, &mut rhs);
        }
        log::trace!("面基组装: t = {:.4e}, {} 个 Dirichlet 面", t_eval, dirichlet.len());

        Ok(AssembledSystem {
            matrix: MatrixHandoff::Transfer(m),
            rhs,
        })
    }

    fn update_field(&mut self, solu: &[f64], field_val: &mut [f64]) {
        self.face_values.copy_from_slice(solu);
        let conn = &self.mesh.connect;
        for (c, u) in field_val.iter_mut().enumerate() {
            let start = conn.c2f.start(c);
            let faces = conn.c2f.row(c);
            let flux: f64 = faces
                .iter()
                .zip(&self.weights[start..start + faces.len()])
                .map(|(&f, w)| w * solu[f])
                .sum();
            *u = (self.cell_rhs[c] + flux) / self.cell_diag[c];
        }
    }

    fn extra_op(&self, eq_name: &str, flag: ProcessFlag) -> Vec<(String, DataStats)> {
        if flag.contains(ProcessFlag::PECLET) || flag.contains(ProcessFlag::UPWIND_COEF) {
            log::warn!("{}: 面基格式没有对流项, 忽略 Peclet/迎风系数输出", eq_name);
        }
        let s = DataStats::from_values(&self.face_values);
        log::debug!(
            "{}.FaceValues: min {:.6e}, max {:.6e}, mean {:.6e}",
            eq_name,
            s.min,
            s.max,
            s.mean
        );
        vec![("face_values".to_string(), s)]
    }

    fn face_values(&self) -> Option<&[f64]> {
        Some(&self.face_values)
    }

    fn face_values_mut(&mut self) -> Option<&mut [f64]> {
        Some(&mut self.face_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{EquationType, LocationRef};
    use cdo_mesh::BoxMeshGenerator;

    fn fb_param(default_bc: BcType) -> EquationParam {
        let mut p = EquationParam::new("fb", EquationType::User, VarType::Scalar, default_bc);
        p.set_option("space_scheme", "cdo_fb").unwrap();
        p.link("diffusion", "unity").unwrap();
        p
    }

    #[test]
    fn test_check_setup() {
        let p = fb_param(BcType::HomogeneousDirichlet);
        assert!(FaceBasedScheme.check_setup(&p).is_ok());

        let mut adv = p.clone();
        adv.link("advection", "beta").unwrap();
        assert!(matches!(
            FaceBasedScheme.check_setup(&adv),
            Err(ConfigError::NotImplemented { .. })
        ));

        let mut cn = p.clone();
        cn.link("time", "unity").unwrap();
        cn.set_option("time_scheme", "crank_nicolson").unwrap();
        assert!(FaceBasedScheme.check_setup(&cn).is_err());

        let bare = EquationParam::new("b", EquationType::User, VarType::Scalar, BcType::HomogeneousDirichlet);
        assert!(matches!(
            FaceBasedScheme.check_setup(&bare),
            Err(ConfigError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_condensed_rows_and_recovery() {
        let mesh = Arc::new(BoxMeshGenerator::cube(2, 1.0).build().unwrap());
        let mut b = FaceBuilder::new(
            &fb_param(BcType::HomogeneousNeumann),
            Arc::clone(&mesh),
            &PropertyRegistry::new(),
        )
        .unwrap();
        b.compute_source(0.0).unwrap();
        let cells = vec![0.0; mesh.mesh.n_cells];
        let sys = b.build_system(&cells, TimeStep::default(), 0.0).unwrap();
        assert!(sys.matrix.is_transfer());
        let m = sys.matrix.msr();
        let n = mesh.mesh.n_faces;
        for f in 0..n {
            let row: f64 = (0..n).map(|g| m.get(f, g)).sum();
            assert!(row.abs() < 1e-12, "face {}", f);
        }

        let ones = vec![1.0; n];
        let mut u = vec![0.0; mesh.mesh.n_cells];
        b.update_field(&ones, &mut u);
        for v in &u {
            assert!((v - 1.0).abs() < 1e-12);
        }
        assert_eq!(b.face_values(), Some(&ones[..]));
    }

    #[test]
    fn test_source_and_dirichlet_faces() {
        let mesh = Arc::new(BoxMeshGenerator::new(2, 2, 1, 2.0, 2.0, 1.0).build().unwrap());
        let mut p = fb_param(BcType::HomogeneousDirichlet);
        p.add_source_term_by_val(None, LocationRef::new(0, "cells", LocationKind::Cells), vec![2.0]).unwrap();
        let mut b = FaceBuilder::new(&p, Arc::clone(&mesh), &PropertyRegistry::new()).unwrap();
        b.compute_source(0.0).unwrap();
        assert!((b.source().iter().sum::<f64>() - 8.0).abs() < 1e-12);

        let cells = vec![0.0; mesh.mesh.n_cells];
        let sys = b.build_system(&cells, TimeStep::default(), 0.0).unwrap();
        let m = sys.matrix.msr();
        for f in mesh.mesh.n_i_faces..mesh.mesh.n_faces {
            assert_eq!(m.get(f, f), 1.0);
            assert_eq!(sys.rhs[f], 0.0);
        }
        for f in 0..mesh.mesh.n_i_faces {
            assert!(sys.rhs[f] > 0.0);
        }
    }
}
