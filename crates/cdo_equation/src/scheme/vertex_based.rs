// crates/cdo_equation/src/scheme/vertex_based.rs

//! CDO 点基格式（标量）
//!
//! 未知量位于网格顶点。单元贡献逐单元计算后组装到 MSR 矩阵：
//!
//! - 扩散：Voronoi/COST 为逐边对角 Hodge `κ |对偶面| / |边|`，
//!   WBS 为 Q1 张量积刚度矩阵；
//! - 时间与反应：集中质量（对偶体积）或 Q1 一致质量；
//! - 对流：逐边通量，迎风权重由 Peclet 数决定；
//! - θ 格式：`(M/dt + θA) uⁿ⁺¹ = s + M/dt uⁿ - (1-θ) A uⁿ`。
//!
//! 构建器保留矩阵以便下一步复用，因此交接方式为复制。

use std::sync::Arc;

use cdo_config::{ConfigError, ConfigResult};
use cdo_foundation::{DataStats, DBL_MIN};
use cdo_mesh::{LocationKind, MeshContext};
use cdo_sles::{MsrMatrix, MsrStructure, SlesError};
use glam::DVec3;

use super::{
    bounding_box, box_mean, check_locations, classify_boundary_faces, face_bc_type,
    lookup_property, quad_mean, robin_coefficients, theta_of, AssembledSystem, FaceBc, MatrixHandoff, SchemeBuilder,
    SpaceDiscretization, TimeStep, PENALIZATION_COEF,
};
use crate::error::{EquationError, EquationResult};
use crate::param::{
    AdvFormulation, AdvParam, AdvWeight, AdvCriterion, BcEnforcement, BcParam, BcType, Definition,
    EquationParam, HodgeAlgo, HodgeParam, ProcessFlag, QuadratureType, SourceTerm, SpaceScheme,
    TermFlags, VarType,
};
use crate::property::{AdvectionField, Property, PropertyRegistry};

// =============================================================================
// Q1 单元矩阵
// =============================================================================

type Local8 = [[f64; 8]; 8];

fn mass_1d(h: f64) -> [[f64; 2]; 2] {
    [[h / 3.0, h / 6.0], [h / 6.0, h / 3.0]]
}

fn stiff_1d(h: f64) -> [[f64; 2]; 2] {
    [[1.0 / h, -1.0 / h], [-1.0 / h, 1.0 / h]]
}

#[inline]
fn split(l: usize) -> (usize, usize, usize) {
    (l & 1, (l >> 1) & 1, (l >> 2) & 1)
}

/// Q1 一致质量矩阵，局部顶点编号 a + 2b + 4c
fn q1_mass(h: DVec3) -> Local8 {
    let (mx, my, mz) = (mass_1d(h.x), mass_1d(h.y), mass_1d(h.z));
    let mut m = [[0.0; 8]; 8];
    for (l, row) in m.iter_mut().enumerate() {
        let (a, b, c) = split(l);
        for (k, v) in row.iter_mut().enumerate() {
            let (a2, b2, c2) = split(k);
            *v = mx[a][a2] * my[b][b2] * mz[c][c2];
        }
    }
    m
}

/// Q1 刚度矩阵
fn q1_stiffness(h: DVec3) -> Local8 {
    let (mx, my, mz) = (mass_1d(h.x), mass_1d(h.y), mass_1d(h.z));
    let (sx, sy, sz) = (stiff_1d(h.x), stiff_1d(h.y), stiff_1d(h.z));
    let mut s = [[0.0; 8]; 8];
    for (l, row) in s.iter_mut().enumerate() {
        let (a, b, c) = split(l);
        for (k, v) in row.iter_mut().enumerate() {
            let (a2, b2, c2) = split(k);
            *v = sx[a][a2] * my[b][b2] * mz[c][c2]
                + mx[a][a2] * sy[b][b2] * mz[c][c2]
                + mx[a][a2] * my[b][b2] * sz[c][c2];
        }
    }
    s
}

// =============================================================================
// 迎风权重
// =============================================================================

/// 无扩散时 Peclet 数的截断值
const PECLET_MAX: f64 = 1e12;

/// 边起点的权重 `w`，边上取值为 `w u(v0) + (1 - w) u(v1)`
///
/// `pe > 0` 表示流动方向与边方向一致。
pub fn upwind_weight(algo: AdvWeight, pe: f64) -> f64 {
    match algo {
        AdvWeight::Upwind => {
            if pe > 0.0 {
                1.0
            } else if pe < 0.0 {
                0.0
            } else {
                0.5
            }
        }
        AdvWeight::Samarskii => {
            let w = 1.0 / (2.0 + pe.abs());
            if pe >= 0.0 {
                1.0 - w
            } else {
                w
            }
        }
        AdvWeight::Sg => {
            if pe.abs() < 1e-3 {
                0.5 + pe / 12.0
            } else {
                1.0 - (1.0 / pe - 1.0 / pe.exp_m1())
            }
        }
        AdvWeight::D10g5 => 0.5 + pe / (12.0 + 2.0 * pe.abs()),
        AdvWeight::Centered => 0.5,
    }
}

// =============================================================================
// 格式
// =============================================================================

/// CDO 点基格式
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexBasedScheme;

impl SpaceDiscretization for VertexBasedScheme {
    fn scheme(&self) -> SpaceScheme {
        SpaceScheme::VertexBased
    }

    fn field_location(&self) -> LocationKind {
        LocationKind::Vertices
    }

    fn check_setup(&self, param: &EquationParam) -> ConfigResult<()> {
        let owner = param.owner();
        if param.var_type != VarType::Scalar {
            return Err(ConfigError::not_implemented(
                owner,
                format!("点基格式的 {} 变量", param.var_type),
            ));
        }
        if matches!(param.bc.enforcement, BcEnforcement::WeakSym | BcEnforcement::Weak) {
            return Err(ConfigError::not_implemented(
                owner,
                format!("Dirichlet 施加方式 {}", param.bc.enforcement),
            ));
        }
        check_locations(owner, param, false)?;
        check_robin(owner, &param.bc)
    }

    fn init_builder(
        &self,
        param: &EquationParam,
        mesh: Arc<MeshContext>,
        props: &PropertyRegistry,
    ) -> EquationResult<Box<dyn SchemeBuilder>> {
        Ok(Box::new(VertexBuilder::new(param, mesh, props)?))
    }
}

pub(crate) fn check_robin(owner: &str, bc: &BcParam) -> ConfigResult<()> {
    for d in bc.defs.iter().filter(|d| d.bc_type == BcType::Robin) {
        if robin_coefficients(&d.def).is_none() {
            log::error!("方程 {}: Robin 条件 ({}) 需要常数 [alpha, u0]", owner, d.location.name);
            return Err(ConfigError::invalid_value(
                "robin",
                d.def.kind(),
                "需要常数 [alpha, u0]",
            ));
        }
    }
    Ok(())
}

pub(crate) fn check_source_locations(
    owner: &str,
    sources: &[SourceTerm],
    mesh: &MeshContext,
) -> EquationResult<()> {
    for st in sources {
        if mesh.location_kind(st.location.id)? != LocationKind::Cells {
            return Err(ConfigError::incompatible(
                owner,
                format!("源项 {} 必须定义在单元位置上 ({})", st.name, st.location.name),
            )
            .into());
        }
    }
    Ok(())
}

// =============================================================================
// 构建器
// =============================================================================

struct Diffusion {
    pty: Property,
    hodge: HodgeParam,
}

struct Mass {
    pty: Property,
    inv_pty: bool,
    lumped: bool,
}

struct Advection {
    field: AdvectionField,
    param: AdvParam,
}

/// 锁定后不再变化的离散数据
struct VbSetup {
    unsteady: bool,
    theta: f64,
    hconf_source: bool,
    diffusion: Option<Diffusion>,
    time: Option<Mass>,
    advection: Option<Advection>,
    reactions: Vec<Mass>,
    sources: Vec<SourceTerm>,
    bc: BcParam,
    face_bc: Vec<FaceBc>,
}

type Sink<'a> = dyn FnMut(usize, usize, f64) + 'a;

impl VbSetup {
    fn needs_full_stencil(&self) -> bool {
        self.diffusion
            .as_ref()
            .is_some_and(|d| d.hodge.algo == HodgeAlgo::Wbs)
            || self.time.as_ref().is_some_and(|m| !m.lumped)
            || self.reactions.iter().any(|m| !m.lumped)
    }

    fn bc_quadrature(&self) -> QuadratureType {
        if self.bc.use_subdiv {
            QuadratureType::Subdiv
        } else {
            self.bc.quad_type
        }
    }

    /// 扩散、对流、反应与 Robin 项，返回每条 (单元, 边) 的 (Peclet, 权重)
    fn assemble_operator(&self, mesh: &MeshContext, sink: &mut Sink<'_>) -> Vec<(f64, f64)> {
        let conn = &mesh.connect;
        let q = &mesh.quant;
        let mut adv_stats = Vec::new();

        for c in 0..mesh.mesh.n_cells {
            let xc = q.cell_centers[c];
            let verts = conn.c2v.row(c);
            let e_start = conn.c2e.start(c);

            let kappa = self
                .diffusion
                .as_ref()
                .map_or(0.0, |d| d.pty.cell_value(c, xc, d.hodge.inv_pty));

            if let Some(diff) = &self.diffusion {
                if diff.hodge.algo == HodgeAlgo::Wbs {
                    let k = q1_stiffness(q.cell_h[c]);
                    for (l, &vi) in verts.iter().enumerate() {
                        for (m, &vj) in verts.iter().enumerate() {
                            sink(vi, vj, kappa * k[l][m]);
                        }
                    }
                } else {
                    for (le, &e) in conn.c2e.row(c).iter().enumerate() {
                        let w = kappa * q.dface[e_start + le].area / q.edge_lengths[e];
                        let (v0, v1) = conn.edge_vertices(e);
                        sink(v0, v0, w);
                        sink(v1, v1, w);
                        sink(v0, v1, -w);
                        sink(v1, v0, -w);
                    }
                }
            }

            if let Some(adv) = &self.advection {
                for (le, &e) in conn.c2e.row(c).iter().enumerate() {
                    let df = q.dface[e_start + le];
                    let (lo, hi) = bounding_box(q.edge_centers[e], xc);
                    let flux = df.area
                        * quad_mean(
                            &|x| adv.field.value_at(x).dot(df.normal),
                            lo,
                            hi,
                            adv.param.quad_type,
                        );
                    let len = q.edge_lengths[e];
                    let k = kappa.max(DBL_MIN);
                    let pe = match adv.param.weight_criterion {
                        AdvCriterion::Xexc => {
                            adv.field.value_at(q.edge_centers[e]).dot(q.edge_tangents[e]) * len / k
                        }
                        AdvCriterion::Flux => flux * len / (k * df.area),
                    };
                    let pe = pe.clamp(-PECLET_MAX, PECLET_MAX);
                    let w = upwind_weight(adv.param.weight_algo, pe);
                    adv_stats.push((pe, w));

                    let (v0, v1) = conn.edge_vertices(e);
                    match adv.param.formulation {
                        AdvFormulation::Conservative => {
                            sink(v0, v0, flux * w);
                            sink(v0, v1, flux * (1.0 - w));
                            sink(v1, v0, -flux * w);
                            sink(v1, v1, -flux * (1.0 - w));
                        }
                        AdvFormulation::NonConservative => {
                            sink(v0, v0, flux * (w - 1.0));
                            sink(v0, v1, flux * (1.0 - w));
                            sink(v1, v0, -flux * w);
                            sink(v1, v1, flux * w);
                        }
                    }
                }
            }

            for r in &self.reactions {
                add_mass(mesh, c, r, 1.0, sink);
            }
        }

        let n_i = mesh.mesh.n_i_faces;
        if let Some(adv) = &self.advection {
            if adv.param.formulation == AdvFormulation::Conservative {
                // 出流边界上的通量进入对角
                for f in n_i..mesh.mesh.n_faces {
                    let n = q.face_normals[f];
                    let quarter = 0.25 * q.face_areas[f];
                    for &v in conn.f2v.row(f) {
                        let (lo, hi) = bounding_box(q.vtx_coords[v], q.face_centers[f]);
                        let flux = quarter
                            * quad_mean(&|x| adv.field.value_at(x).dot(n), lo, hi, adv.param.quad_type);
                        if flux > 0.0 {
                            sink(v, v, flux);
                        }
                    }
                }
            }
        }

        for (bi, fb) in self.face_bc.iter().enumerate() {
            if face_bc_type(*fb, &self.bc.defs, self.bc.default_bc) != BcType::Robin {
                continue;
            }
            let FaceBc::Defined { def, .. } = *fb else {
                continue;
            };
            if let Some((alpha, _)) = robin_coefficients(&self.bc.defs[def].def) {
                let f = n_i + bi;
                let quarter = 0.25 * q.face_areas[f];
                for &v in conn.f2v.row(f) {
                    sink(v, v, alpha * quarter);
                }
            }
        }

        adv_stats
    }

    /// Neumann 与 Robin 的右端项
    fn boundary_rhs(&self, mesh: &MeshContext, t: f64, rhs: &mut [f64]) {
        let conn = &mesh.connect;
        let q = &mesh.quant;
        let n_i = mesh.mesh.n_i_faces;
        let quad = self.bc_quadrature();
        for (bi, fb) in self.face_bc.iter().enumerate() {
            let FaceBc::Defined { def, pos } = *fb else {
                continue;
            };
            let bc = &self.bc.defs[def];
            let f = n_i + bi;
            let quarter = 0.25 * q.face_areas[f];
            match bc.bc_type {
                BcType::Neumann => {
                    for &v in conn.f2v.row(f) {
                        let (lo, hi) = bounding_box(q.vtx_coords[v], q.face_centers[f]);
                        rhs[v] += quarter * box_mean(&bc.def, t, lo, hi, quad, pos);
                    }
                }
                BcType::Robin => {
                    if let Some((alpha, u0)) = robin_coefficients(&bc.def) {
                        for &v in conn.f2v.row(f) {
                            rhs[v] += alpha * u0 * quarter;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// 顶点上的 Dirichlet 值
    fn dirichlet_values(&self, mesh: &MeshContext, t: f64) -> EquationResult<Vec<Option<f64>>> {
        let conn = &mesh.connect;
        let q = &mesh.quant;
        let n_i = mesh.mesh.n_i_faces;
        let mut dir = vec![None; mesh.mesh.n_vertices];

        if self.bc.default_bc.is_dirichlet() {
            for (bi, fb) in self.face_bc.iter().enumerate() {
                if *fb == FaceBc::Default {
                    for &v in conn.f2v.row(n_i + bi) {
                        dir[v] = Some(0.0);
                    }
                }
            }
        }

        for (d, bc) in self.bc.defs.iter().enumerate() {
            if !bc.bc_type.is_dirichlet() {
                continue;
            }
            let homogeneous = bc.bc_type == BcType::HomogeneousDirichlet;
            let value = |v: usize, pos: usize| {
                if homogeneous {
                    0.0
                } else {
                    bc.def.eval(t, q.vtx_coords[v], pos)
                }
            };
            let id = bc.location.id;
            match mesh.location_kind(id)? {
                LocationKind::Vertices => {
                    for (pos, v) in mesh.location_elements(id)?.into_iter().enumerate() {
                        dir[v] = Some(value(v, pos));
                    }
                }
                LocationKind::Cells => {
                    for (pos, c) in mesh.location_elements(id)?.into_iter().enumerate() {
                        for &v in conn.c2v.row(c) {
                            dir[v] = Some(value(v, pos));
                        }
                    }
                }
                LocationKind::InteriorFaces | LocationKind::BoundaryFaces => {
                    for (pos, f) in mesh.location_faces(id)?.into_iter().enumerate() {
                        // 被后续定义覆盖的边界面不再施加
                        if f >= n_i && self.face_bc[f - n_i] != (FaceBc::Defined { def: d, pos }) {
                            continue;
                        }
                        for &v in conn.f2v.row(f) {
                            dir[v] = Some(value(v, pos));
                        }
                    }
                }
            }
        }
        Ok(dir)
    }
}

fn add_mass(mesh: &MeshContext, c: usize, m: &Mass, scale: f64, sink: &mut Sink<'_>) {
    let q = &mesh.quant;
    let verts = mesh.connect.c2v.row(c);
    let rho = scale * m.pty.cell_value(c, q.cell_centers[c], m.inv_pty);
    if m.lumped {
        let start = mesh.connect.c2v.start(c);
        for (lv, &v) in verts.iter().enumerate() {
            sink(v, v, rho * q.dcell_vol[start + lv]);
        }
    } else {
        let mm = q1_mass(q.cell_h[c]);
        for (l, &vi) in verts.iter().enumerate() {
            for (k, &vj) in verts.iter().enumerate() {
                sink(vi, vj, rho * mm[l][k]);
            }
        }
    }
}

/// 点基格式构建器
pub struct VertexBuilder {
    mesh: Arc<MeshContext>,
    setup: VbSetup,
    matrix: MsrMatrix,
    source: Vec<f64>,
    time_dependent_source: bool,
    peclet: Vec<f64>,
    upwind_coef: Vec<f64>,
}

impl VertexBuilder {
    /// 根据已锁定的参数创建
    pub fn new(
        param: &EquationParam,
        mesh: Arc<MeshContext>,
        props: &PropertyRegistry,
    ) -> EquationResult<Self> {
        let owner = param.owner();
        check_source_locations(owner, &param.source_terms, &mesh)?;

        let diffusion = if param.flag.contains(TermFlags::DIFFUSION) {
            Some(Diffusion {
                pty: lookup_property(owner, props, param.diffusion_property.as_deref())?,
                hodge: param.diffusion_hodge,
            })
        } else {
            None
        };
        let time = if param.is_unsteady() {
            Some(Mass {
                pty: lookup_property(owner, props, param.time_property.as_deref())?,
                inv_pty: param.time_hodge.inv_pty,
                lumped: param.do_lumping || param.time_hodge.algo != HodgeAlgo::Wbs,
            })
        } else {
            None
        };
        let advection = if param.flag.contains(TermFlags::CONVECTION) {
            let name = param.advection_field.as_deref().unwrap_or_default();
            let field = props.advection_field(name).cloned().ok_or_else(|| {
                ConfigError::UnknownTerm {
                    owner: owner.to_string(),
                    kind: "对流场".to_string(),
                    name: name.to_string(),
                }
            })?;
            Some(Advection {
                field,
                param: param.advection,
            })
        } else {
            None
        };
        let mut reactions = Vec::with_capacity(param.reaction_terms.len());
        for r in &param.reaction_terms {
            reactions.push(Mass {
                pty: lookup_property(owner, props, Some(&r.property))?,
                inv_pty: r.hodge.inv_pty,
                lumped: r.do_lumping || r.hodge.algo != HodgeAlgo::Wbs,
            });
        }

        let setup = VbSetup {
            unsteady: param.is_unsteady(),
            theta: theta_of(param),
            hconf_source: param.flag.contains(TermFlags::HCONF_ST),
            diffusion,
            time,
            advection,
            reactions,
            sources: param.source_terms.clone(),
            bc: param.bc.clone(),
            face_bc: classify_boundary_faces(&param.bc.defs, &mesh)?,
        };

        let structure = Arc::new(build_structure(&mesh, setup.needs_full_stencil()));
        let n_v = mesh.mesh.n_vertices;
        let time_dependent_source = setup
            .sources
            .iter()
            .any(|st| matches!(st.def, Definition::Analytic(_) | Definition::User(_)));

        log::debug!(
            "{}: 点基构建器, {} 个顶点, 非对角元 {}, 全单元模板 = {}",
            owner,
            n_v,
            structure.n_extra(),
            setup.needs_full_stencil()
        );

        Ok(Self {
            matrix: MsrMatrix::new(structure),
            source: vec![0.0; n_v],
            time_dependent_source,
            peclet: Vec::new(),
            upwind_coef: Vec::new(),
            setup,
            mesh,
        })
    }

    /// 当前源项向量
    pub fn source(&self) -> &[f64] {
        &self.source
    }
}

fn build_structure(mesh: &MeshContext, full: bool) -> MsrStructure {
    let conn = &mesh.connect;
    let n_v = mesh.mesh.n_vertices;
    let rows: Vec<Vec<usize>> = (0..n_v)
        .map(|v| {
            if full {
                conn.v2c
                    .row(v)
                    .iter()
                    .flat_map(|&c| conn.c2v.row(c).iter().copied())
                    .collect()
            } else {
                conn.v2v.row(v).to_vec()
            }
        })
        .collect();
    MsrStructure::from_rows(n_v, &rows)
}

impl SchemeBuilder for VertexBuilder {
    fn n_dofs(&self) -> usize {
        self.mesh.mesh.n_vertices
    }

    fn compute_source(&mut self, t: f64) -> EquationResult<()> {
        let mesh = &self.mesh;
        let q = &mesh.quant;
        let conn = &mesh.connect;
        self.source.fill(0.0);

        for st in &self.setup.sources {
            let cells = mesh.location_cells(st.location.id)?;
            for (pos, &c) in cells.iter().enumerate() {
                let xc = q.cell_centers[c];
                let verts = conn.c2v.row(c);
                let start = conn.c2v.start(c);
                if self.setup.hconf_source && st.def.is_pointwise() {
                    // 顶点值经 Q1 质量矩阵重构
                    let mm = q1_mass(q.cell_h[c]);
                    let vals: Vec<f64> =
                        verts.iter().map(|&v| st.def.eval(t, q.vtx_coords[v], pos)).collect();
                    for (l, &vi) in verts.iter().enumerate() {
                        self.source[vi] += mm[l].iter().zip(&vals).map(|(m, s)| m * s).sum::<f64>();
                    }
                } else {
                    for (lv, &v) in verts.iter().enumerate() {
                        let (lo, hi) = bounding_box(q.vtx_coords[v], xc);
                        self.source[v] += q.dcell_vol[start + lv]
                            * box_mean(&st.def, t, lo, hi, st.quadrature, pos);
                    }
                }
            }
        }
        Ok(())
    }

    fn initial_guess(&self, field_val: &[f64]) -> Vec<f64> {
        field_val.to_vec()
    }

    fn build_system(
        &mut self,
        field_val: &[f64],
        ts: TimeStep,
        dt: f64,
    ) -> EquationResult<AssembledSystem<'_>> {
        let n = self.n_dofs();
        if field_val.len() != n {
            return Err(SlesError::dimension("vertex field", n, field_val.len()).into());
        }
        let unsteady = self.setup.unsteady;
        if unsteady && (dt.is_nan() || dt <= 0.0) {
            return Err(ConfigError::invalid_value("dt", dt.to_string(), "时间步长必须为正").into());
        }
        let t_eval = if unsteady { ts.t_cur + dt } else { ts.t_cur };
        if self.time_dependent_source {
            self.compute_source(t_eval)?;
        }

        let theta = if unsteady { self.setup.theta } else { 1.0 };
        let need_explicit = unsteady && theta < 1.0;
        let mut rhs = self.source.clone();
        let mut explicit = vec![0.0; if need_explicit { n } else { 0 }];

        self.matrix.clear_values();
        let matrix = &mut self.matrix;
        let setup = &self.setup;
        let mesh = &self.mesh;

        let adv_stats = setup.assemble_operator(mesh, &mut |i, j, v| {
            let ok = matrix.add(i, j, theta * v);
            debug_assert!(ok, "({}, {}) 不在矩阵结构中", i, j);
            if need_explicit {
                explicit[i] += v * field_val[j];
            }
        });
        if let Some(m) = &setup.time {
            let inv_dt = 1.0 / dt;
            for c in 0..mesh.mesh.n_cells {
                add_mass(mesh, c, m, inv_dt, &mut |i, j, v| {
                    let ok = matrix.add(i, j, v);
                    debug_assert!(ok, "({}, {}) 不在矩阵结构中", i, j);
                    rhs[i] += v * field_val[j];
                });
            }
        }
        for (r, e) in rhs.iter_mut().zip(&explicit) {
            *r -= (1.0 - theta) * e;
        }
        setup.boundary_rhs(mesh, t_eval, &mut rhs);

        let dir = setup.dirichlet_values(mesh, t_eval)?;
        let mut n_dir = 0;
        for (v, val) in dir.iter().enumerate() {
            let Some(val) = *val else { continue };
            n_dir += 1;
            match setup.bc.enforcement {
                BcEnforcement::Strong => matrix.eliminate_dof(v, val, &mut rhs),
                BcEnforcement::Penalization => {
                    matrix.add(v, v, PENALIZATION_COEF);
                    rhs[v] += PENALIZATION_COEF * val;
                }
                BcEnforcement::WeakSym | BcEnforcement::Weak => {
                    return Err(EquationError::InvalidState {
                        name: "vertex_builder".to_string(),
                        state: setup.bc.enforcement.to_string(),
                        action: "build_system",
                    })
                }
            }
        }
        log::trace!("点基组装: t = {:.4e}, {} 个 Dirichlet 顶点", t_eval, n_dir);

        self.peclet = adv_stats.iter().map(|s| s.0).collect();
        self.upwind_coef = adv_stats.iter().map(|s| s.1).collect();

        Ok(AssembledSystem {
            matrix: MatrixHandoff::Copy(&self.matrix),
            rhs,
        })
    }

    fn update_field(&mut self, solu: &[f64], field_val: &mut [f64]) {
        field_val.copy_from_slice(solu);
    }

    fn extra_op(&self, eq_name: &str, flag: ProcessFlag) -> Vec<(String, DataStats)> {
        let mut out = Vec::new();
        if flag.contains(ProcessFlag::PECLET) && !self.peclet.is_empty() {
            let s = DataStats::from_values(&self.peclet);
            s.log(&format!("{}.Peclet", eq_name));
            out.push(("peclet".to_string(), s));
        }
        if flag.contains(ProcessFlag::UPWIND_COEF) && !self.upwind_coef.is_empty() {
            let s = DataStats::from_values(&self.upwind_coef);
            s.log(&format!("{}.UpwindCoef", eq_name));
            out.push(("upwind_coef".to_string(), s));
        }
        out
    }
}
