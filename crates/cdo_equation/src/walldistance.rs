// crates/cdo_equation/src/walldistance.rs

//! 壁面距离
//!
//! 先解 Poisson 问题 `-Δu = 1`（壁面上 u = 0，其余边界零通量），
//! 再由 `d = sqrt(|∇u|² + 2u) - |∇u|` 得到到壁面的距离，
//! 结果覆盖方程场的当前值。

use cdo_foundation::DataStats;
use cdo_mesh::{MeshContext, MeshLocations};
use glam::DVec3;

use crate::equation::{Equation, EquationState};
use crate::error::{EquationError, EquationResult};
use crate::field::FieldRegistry;
use crate::param::{BcType, Definition, EquationType, SpaceScheme, VarType};

/// 壁面距离方程的默认名称
pub const WALL_DISTANCE_EQ: &str = "WallDistance";

/// 壁面距离场的默认名称
pub const WALL_DISTANCE_VAR: &str = "wall_distance";

/// 单位源项的名称
pub const WALL_DISTANCE_SOURCE: &str = "WallDist.st";

/// 创建壁面距离方程并完成设置
pub fn create(locations: &MeshLocations, wall: &str) -> EquationResult<Equation> {
    let mut eq = Equation::new(
        WALL_DISTANCE_EQ,
        WALL_DISTANCE_VAR,
        EquationType::Predefined,
        VarType::Scalar,
        BcType::HomogeneousNeumann,
    );
    setup(&mut eq, locations, wall)?;
    Ok(eq)
}

/// 在已有方程上设置壁面距离问题
///
/// 扩散关联 `unity`，`wall` 上零值 Dirichlet，全部单元上单位源项。
pub fn setup(eq: &mut Equation, locations: &MeshLocations, wall: &str) -> EquationResult<()> {
    eq.link("diffusion", "unity")?;
    eq.add_bc(locations, wall, "dirichlet", Definition::value(0.0))?;
    eq.add_source_term_by_val(locations, Some(WALL_DISTANCE_SOURCE), "cells", vec![1.0])?;
    Ok(())
}

fn distance(grad: DVec3, u: f64) -> f64 {
    let g = grad.length();
    ((g * g + 2.0 * u).max(0.0)).sqrt() - g
}

/// 由已求解的场计算壁面距离并写回场
pub fn compute(
    eq: &Equation,
    mesh: &MeshContext,
    fields: &mut FieldRegistry,
) -> EquationResult<DataStats> {
    if eq.state() != EquationState::Solved {
        return Err(EquationError::InvalidState {
            name: eq.name().to_string(),
            state: eq.state().to_string(),
            action: "walldistance::compute",
        });
    }
    let field_id = eq
        .field_id()
        .ok_or_else(|| EquationError::resource(eq.name(), "壁面距离场尚未创建"))?;
    let field = fields
        .get_mut(field_id)
        .ok_or_else(|| EquationError::resource(eq.name(), "壁面距离场不存在"))?;

    let dist = match eq.space_scheme() {
        SpaceScheme::VertexBased => vertex_distance(mesh, &field.val),
        SpaceScheme::FaceBased => {
            let face_vals = eq
                .face_values()
                .ok_or_else(|| EquationError::resource(eq.name(), "面值不可用"))?;
            cell_distance(mesh, &field.val, face_vals)
        }
    };

    let stats = DataStats::from_values(&dist);
    stats.log("WallDistance");
    field.val.copy_from_slice(&dist);
    Ok(stats)
}

fn vertex_distance(mesh: &MeshContext, u: &[f64]) -> Vec<f64> {
    let conn = &mesh.connect;
    let q = &mesh.quant;

    let mut vtx_grad = vec![DVec3::ZERO; mesh.mesh.n_vertices];
    for c in 0..mesh.mesh.n_cells {
        let start = conn.c2e.start(c);
        let mut grad = DVec3::ZERO;
        for (le, &e) in conn.c2e.row(c).iter().enumerate() {
            let (v0, v1) = conn.edge_vertices(e);
            let df = q.dface[start + le];
            grad += df.normal * (df.area * (u[v1] - u[v0]));
        }
        grad /= q.cell_vol[c];

        let vstart = conn.c2v.start(c);
        for (lv, &v) in conn.c2v.row(c).iter().enumerate() {
            vtx_grad[v] += grad * q.dcell_vol[vstart + lv];
        }
    }

    (0..mesh.mesh.n_vertices)
        .map(|v| distance(vtx_grad[v] / q.dual_vol[v], u[v]))
        .collect()
}

fn cell_distance(mesh: &MeshContext, u: &[f64], face_vals: &[f64]) -> Vec<f64> {
    let conn = &mesh.connect;
    let q = &mesh.quant;
    (0..mesh.mesh.n_cells)
        .map(|c| {
            let mut grad = DVec3::ZERO;
            for (&f, &sgn) in conn.c2f.row(c).iter().zip(conn.c2f.row_signs(c)) {
                let du = face_vals[f] - u[c];
                grad += q.face_normals[f] * (q.face_areas[f] * f64::from(sgn) * du);
            }
            distance(grad / q.cell_vol[c], u[c])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdo_mesh::BoxMeshGenerator;

    #[test]
    fn test_distance_formula() {
        // 一维 -u'' = 1, u(0) = 0, u'(L) = 0 的精确解给出 d = x
        let l = 2.0;
        for x in [0.0, 0.5, 1.3, 2.0] {
            let u = x * (2.0 * l - x) / 2.0;
            let g = DVec3::new(l - x, 0.0, 0.0);
            assert!((distance(g, u) - x).abs() < 1e-12);
        }
    }

    #[test]
    fn test_setup_records_terms() {
        let mesh = BoxMeshGenerator::cube(2, 1.0).build().unwrap();
        let locations = &mesh.locations;
        let eq = create(locations, "xmin").unwrap();
        let p = eq.param();
        assert_eq!(eq.diffusion_property(), Some("unity"));
        assert_eq!(p.bc.defs.len(), 1);
        assert_eq!(p.bc.defs[0].bc_type, BcType::HomogeneousDirichlet);
        assert_eq!(p.source_terms[0].name, WALL_DISTANCE_SOURCE);
        assert!(create(locations, "no_such_wall").is_err());
    }
}
