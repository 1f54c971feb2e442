// crates/cdo_mesh/tests/mesh_tests.rs
//!
//! 网格集成测试
//!
//! 几何恒等式与位置查询。

use cdo_mesh::{BoxMeshGenerator, LocationKind, MeshContext};
use glam::DVec3;

fn slab() -> MeshContext {
    BoxMeshGenerator::new(4, 3, 2, 2.0, 1.5, 1.0)
        .with_origin(-1.0, 0.0, 0.5)
        .build()
        .unwrap()
}

#[test]
fn test_cell_faces_are_closed() {
    let ctx = slab();
    let q = &ctx.quant;
    for c in 0..ctx.mesh.n_cells {
        let mut sum = DVec3::ZERO;
        for (&f, &s) in ctx.connect.c2f.row(c).iter().zip(ctx.connect.c2f.row_signs(c)) {
            sum += q.face_normals[f] * (q.face_areas[f] * f64::from(s));
        }
        assert!(sum.length() < 1e-12, "单元 {} 不封闭: {:?}", c, sum);
    }
}

#[test]
fn test_dual_faces_reproduce_cell_volume() {
    // 线性函数 x 的离散梯度为 e_x，|c| = Σ (dface · e_x) (x_v1 - x_v0)
    let ctx = slab();
    let q = &ctx.quant;
    for c in 0..ctx.mesh.n_cells {
        let start = ctx.connect.c2e.start(c);
        let mut grad = DVec3::ZERO;
        for (le, &e) in ctx.connect.c2e.row(c).iter().enumerate() {
            let (v0, v1) = ctx.connect.edge_vertices(e);
            let df = q.dface[start + le];
            grad += df.normal * (df.area * (q.vtx_coords[v1].x - q.vtx_coords[v0].x));
        }
        assert!((grad / q.cell_vol[c] - DVec3::X).length() < 1e-12);
    }
}

#[test]
fn test_origin_shift_and_extent() {
    let ctx = slab();
    let (lo, hi) = ctx
        .quant
        .vtx_coords
        .iter()
        .fold((DVec3::splat(f64::MAX), DVec3::splat(f64::MIN)), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    assert!((lo - DVec3::new(-1.0, 0.0, 0.5)).length() < 1e-12);
    assert!((hi - DVec3::new(1.0, 1.5, 1.5)).length() < 1e-12);
    let (hmin, hmax) = ctx.quant.cell_size_range();
    assert!((hmin - 0.5).abs() < 1e-12);
    assert!((hmax - 0.5).abs() < 1e-12);
}

#[test]
fn test_boundary_group_vertices() {
    let ctx = slab();
    let xmin = ctx.locations.require("xmin").unwrap();
    let verts = ctx.location_vertices(xmin).unwrap();
    assert_eq!(verts.len(), 4 * 3);
    assert!(verts.iter().all(|&v| (ctx.quant.vtx_coords[v].x + 1.0).abs() < 1e-12));
    assert!(verts.iter().all(|&v| ctx.connect.v_on_boundary[v]));
    assert!(ctx.location_cells(xmin).unwrap().is_empty());

    let cells = ctx.locations.require("cells").unwrap();
    assert_eq!(ctx.location_vertices(cells).unwrap().len(), ctx.mesh.n_vertices);
}

#[test]
fn test_selector_location() {
    let mut ctx = slab();
    let id = ctx
        .add_location_by_selector("left_half", LocationKind::Cells, |x| x.x < 0.0)
        .unwrap();
    let cells = ctx.location_cells(id).unwrap();
    assert_eq!(cells.len(), ctx.mesh.n_cells / 2);
    assert!(ctx.location_faces(id).unwrap().is_empty());

    let top = ctx
        .add_location_by_selector("top", LocationKind::BoundaryFaces, |x| x.z > 1.5 - 1e-12)
        .unwrap();
    let zmax = ctx.locations.require("zmax").unwrap();
    assert_eq!(
        ctx.location_faces(top).unwrap(),
        ctx.location_faces(zmax).unwrap()
    );

    assert!(ctx
        .add_location_by_selector("top", LocationKind::Vertices, |_| true)
        .is_err());
    assert!(ctx.location_kind(ctx.locations.len()).is_err());
}

#[test]
fn test_index_maps() {
    let ctx = slab();
    let m = &ctx.mesh;
    for c in 0..m.n_cells {
        let [i, j, k] = m.cell_ijk(c);
        assert_eq!(m.cell_index(i, j, k), c);
        let v0 = m.vertex_index(i, j, k);
        assert_eq!(ctx.connect.local_vertex(c, v0), Some(0));
        assert_eq!(ctx.connect.local_vertex(c, m.vertex_index(i + 1, j + 1, k + 1)), Some(7));
    }
    assert_eq!(ctx.connect.local_vertex(0, m.n_vertices - 1), None);

    let names: Vec<&str> = ctx.locations.names().collect();
    assert_eq!(&names[..4], &["cells", "interior_faces", "boundary_faces", "vertices"]);
    assert_eq!(names.len(), 10);
}
