// crates/cdo_equation/tests/domain_tests.rs
//!
//! 计算域驱动集成测试
//!
//! 壁面距离、设置脚本回放与时间推进。

use std::io::Write;

use cdo_config::{
    BoundaryConditionEntry, EquationSetup, InitialConditionEntry, LinkEntry, OptionEntry,
    ReactionEntry, SourceTermEntry,
};
use cdo_equation::param::{HodgeAlgo, QuadratureType, TermFlags};
use cdo_equation::prelude::*;
use cdo_equation::walldistance;
use cdo_mesh::{BoxMeshGenerator, MeshContext};
use cdo_sles::{PrecondKind, SolverFamily, SolverKind};

fn slab(nx: usize) -> MeshContext {
    BoxMeshGenerator::new(nx, 2, 2, 1.0, 0.25, 0.25).build().unwrap()
}

#[test]
fn test_wall_distance_vertex_based() {
    let mut domain = CdoDomain::new(slab(8));
    let id = domain.add_wall_distance("xmin").unwrap();
    domain.initialize().unwrap();
    let reports = domain.solve_steady().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].1.is_converged());

    let eq = domain.equation(id).unwrap();
    assert_eq!(eq.name(), walldistance::WALL_DISTANCE_EQ);
    let mesh = domain.mesh();
    let dist = domain.field_values(walldistance::WALL_DISTANCE_VAR).unwrap();
    for (v, &d) in dist.iter().enumerate() {
        let x = mesh.quant.vtx_coords[v].x;
        if x < 1e-12 {
            assert!(d.abs() < 1e-10, "壁面顶点 {} 距离 {}", v, d);
        } else {
            assert!((d - x).abs() < 0.1, "x = {}, d = {}", x, d);
        }
    }
}

#[test]
fn test_wall_distance_face_based() {
    let mesh = slab(8);
    let mut domain = CdoDomain::new(mesh);
    let id = domain.add_wall_distance("xmin").unwrap();
    domain
        .configure(id, |eq, _| eq.set_option("space_scheme", "cdo_fb"))
        .unwrap();
    domain.initialize().unwrap();
    domain.solve_steady().unwrap();

    let eq = domain.equation(id).unwrap();
    assert!(eq.face_values().is_some());
    let mesh = domain.mesh();
    let dist = domain.field_values(walldistance::WALL_DISTANCE_VAR).unwrap();
    assert_eq!(dist.len(), mesh.mesh.n_cells);
    for (c, &d) in dist.iter().enumerate() {
        let x = mesh.quant.cell_centers[c].x;
        assert!((d - x).abs() < 0.1, "x = {}, d = {}", x, d);
    }
}

#[test]
fn test_wall_distance_requires_solution() {
    let mesh = slab(2);
    let mut fields = FieldRegistry::new();
    let eq = walldistance::create(&mesh.locations, "xmin").unwrap();
    assert!(matches!(
        walldistance::compute(&eq, &mesh, &mut fields),
        Err(EquationError::InvalidState { .. })
    ));
}

#[test]
fn test_heat_equation_time_loop() {
    let mut domain = CdoDomain::new(BoxMeshGenerator::cube(3, 1.0).build().unwrap());
    domain
        .properties_mut()
        .add_property(Property::uniform("conductivity", 0.5));
    let eq = Equation::new("heat", "T", EquationType::User, VarType::Scalar, BcType::HomogeneousDirichlet);
    let id = domain.add_equation(eq).unwrap();
    domain
        .configure(id, |eq, locations| {
            eq.link("diffusion", "conductivity")?;
            eq.link("time", "unity")?;
            eq.set_ic(locations, Some("cells"), Definition::value(1.0))?;
            eq.set_option("verbosity", "2")
        })
        .unwrap();
    domain.initialize().unwrap();

    let mut last_max = f64::INFINITY;
    for step in 0..3 {
        let reports = domain.time_step(0.01).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].1.is_converged());
        assert!(domain.equation(id).unwrap().needs_build());

        let t = domain.field_values("T").unwrap();
        let max = t.iter().copied().fold(f64::MIN, f64::max);
        assert!(max < last_max, "第 {} 步未衰减", step);
        assert!(t.iter().all(|&v| v >= -1e-12));
        last_max = max;
    }
    assert_eq!(domain.time().nt_cur, 3);
    assert!((domain.time().t_cur - 0.03).abs() < 1e-14);

    let timers = domain.equation(id).unwrap().timers();
    let solve = timers.id_by_name("heat_solve").unwrap();
    assert_eq!(timers.timer(solve).map(|t| t.count()), Some(3));
}

#[test]
fn test_steady_equation_solved_once_in_time_loop() {
    let mut domain = CdoDomain::new(BoxMeshGenerator::cube(2, 1.0).build().unwrap());
    let eq = Equation::new("p", "p", EquationType::User, VarType::Scalar, BcType::HomogeneousDirichlet);
    let id = domain.add_equation(eq).unwrap();
    domain
        .configure(id, |eq, locations| {
            eq.link("diffusion", "unity")?;
            eq.add_source_term_by_val(locations, None, "cells", vec![2.0])?;
            Ok(())
        })
        .unwrap();
    domain.initialize().unwrap();
    assert_eq!(domain.time_step(0.1).unwrap().len(), 1);
    assert!(domain.time_step(0.1).unwrap().is_empty());
    assert_eq!(domain.equation(id).unwrap().sles().unwrap().n_calls(), 1);

    let p = domain.equation_by_name("p").unwrap();
    let field = p.field_id().unwrap();
    assert_eq!(domain.fields().id_by_name("p").map(|f| f.index()), Some(field.index()));
    domain.log_timers();
}

#[test]
fn test_domain_binding_registry() {
    let mut domain = CdoDomain::new(BoxMeshGenerator::cube(1, 1.0).build().unwrap());
    let bindings = domain.bindings_mut();
    assert!(bindings.supports(SolverFamily::Native, SolverKind::Cg, PrecondKind::Jacobi));
    assert!(!bindings.supports(SolverFamily::Native, SolverKind::Cg, PrecondKind::Ilu0));
    assert!(domain.equation_by_name("missing").is_none());
}

fn setup_script() -> EquationSetup {
    let mut setup = EquationSetup::new("scalar_1", "c");
    setup.default_bc = "zero_flux".to_string();
    setup.options = vec![
        OptionEntry::new("itsol", "gmres"),
        OptionEntry::new("itsol_eps", "1e-10"),
        OptionEntry::new("verbosity", "0"),
    ];
    setup.links = vec![
        LinkEntry { term: "diffusion".to_string(), name: "unity".to_string() },
        LinkEntry { term: "time".to_string(), name: "unity".to_string() },
    ];
    setup.initial_conditions = vec![InitialConditionEntry { location: None, value: 0.5 }];
    setup.boundary_conditions = vec![
        BoundaryConditionEntry {
            location: "xmin".to_string(),
            kind: "dirichlet".to_string(),
            value: vec![1.0],
        },
        BoundaryConditionEntry {
            location: "xmax".to_string(),
            kind: "dirichlet".to_string(),
            value: vec![0.0],
        },
    ];
    setup.reactions = vec![ReactionEntry {
        name: None,
        kind: "linear".to_string(),
        property: "unity".to_string(),
        options: vec![OptionEntry::new("lumping", "true")],
    }];
    setup.source_terms = vec![SourceTermEntry {
        name: Some("heating".to_string()),
        location: "cells".to_string(),
        value: vec![3.0],
        options: vec![OptionEntry::new("quadrature", "subdiv")],
    }];
    setup
}

#[test]
fn test_from_setup_file_replays_everything() {
    let mesh = BoxMeshGenerator::cube(2, 1.0).build().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scalar_1.json");
    setup_script().save_to_file(&path).unwrap();

    let loaded = EquationSetup::from_file(&path).unwrap();
    let eq = Equation::from_setup(&loaded, &mesh.locations).unwrap();
    let p = eq.param();

    assert_eq!(eq.name(), "scalar_1");
    assert_eq!(p.bc.default_bc, BcType::HomogeneousNeumann);
    assert_eq!(p.bc.defs[0].bc_type, BcType::Dirichlet);
    assert_eq!(p.bc.defs[1].bc_type, BcType::HomogeneousDirichlet);
    assert_eq!(p.itsol.eps, 1e-10);
    assert!(eq.flag().contains(TermFlags::DIFFUSION | TermFlags::UNSTEADY | TermFlags::REACTION));
    assert_eq!(p.ic_definitions.len(), 1);
    assert!(p.ic_definitions[0].location.is_none());

    let r = &p.reaction_terms[0];
    assert_eq!(r.name, "reaction_00");
    assert!(r.do_lumping);
    assert_eq!(r.hodge.algo, HodgeAlgo::Wbs);
    assert_eq!(eq.reaction_property(0), Some("unity"));

    let st = &p.source_terms[0];
    assert_eq!(st.name, "heating");
    assert_eq!(st.quadrature, QuadratureType::Subdiv);
}

#[test]
fn test_from_setup_surfaces_setter_errors() {
    let mesh = BoxMeshGenerator::cube(2, 1.0).build().unwrap();

    let mut bad_key = setup_script();
    bad_key.options.push(OptionEntry::new("itsol_tolerance", "1e-6"));
    assert!(Equation::from_setup(&bad_key, &mesh.locations).unwrap_err().is_config());

    let mut bad_loc = setup_script();
    bad_loc.boundary_conditions[0].location = "inlet".to_string();
    assert!(Equation::from_setup(&bad_loc, &mesh.locations).unwrap_err().is_config());

    let mut bad_bc = setup_script();
    bad_bc.default_bc = "dirichlet".to_string();
    assert!(Equation::from_setup(&bad_bc, &mesh.locations).unwrap_err().is_config());
}

#[test]
fn test_setup_script_runs_in_domain() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let json = serde_json::to_string_pretty(&setup_script()).unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let mut domain = CdoDomain::new(BoxMeshGenerator::cube(3, 1.0).build().unwrap());
    let setup = EquationSetup::from_file(file.path()).unwrap();
    let eq = Equation::from_setup(&setup, domain.locations()).unwrap();
    let id = domain.add_equation(eq).unwrap();
    domain.initialize().unwrap();

    let eq = domain.equation(id).unwrap();
    assert!(eq.flag().contains(TermFlags::HCONF_ST));
    let c = domain.field_values("c").unwrap();
    assert!(c.iter().all(|&v| v == 0.5));

    let reports = domain.time_step(0.1).unwrap();
    assert!(reports[0].1.is_converged());
    let mesh = domain.mesh();
    let c = domain.field_values("c").unwrap();
    for (v, &val) in c.iter().enumerate() {
        let x = mesh.quant.vtx_coords[v].x;
        if x < 1e-12 {
            assert!((val - 1.0).abs() < 1e-8);
        } else if x > 1.0 - 1e-12 {
            assert!(val.abs() < 1e-8);
        }
    }
}
