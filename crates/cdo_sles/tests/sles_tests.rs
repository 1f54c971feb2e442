// crates/cdo_sles/tests/sles_tests.rs
//!
//! 线性系统绑定层集成测试
//!
//! 随机矩阵经 MSR → SystemMatrix → Sles 完整路径求解。

use std::sync::Arc;

use cdo_sles::{
    BindingRegistry, ConvergenceState, LinearOperator, LinearSolverParam, MsrMatrix, MsrStructure,
    PrecondKind, SolveControl, SolverFamily, SolverKind, SystemMatrix,
};

/// 线性同余伪随机数，取值 [-0.5, 0.5)
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 33) as f64) / (u32::MAX as f64) - 0.5
    }
}

/// 带宽为 2 的随机对称对角占优矩阵
fn random_spd(n: usize, seed: u64) -> MsrMatrix {
    let rows: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (i.saturating_sub(2)..(i + 3).min(n))
                .filter(|&j| j != i)
                .collect()
        })
        .collect();
    let mut a = MsrMatrix::new(Arc::new(MsrStructure::from_rows(n, &rows)));
    let mut rng = Lcg(seed);
    for i in 0..n {
        for j in (i + 1)..(i + 3).min(n) {
            let v = -0.4 - rng.next().abs() * 0.5;
            a.add(i, j, v);
            a.add(j, i, v);
            a.add(i, i, -v);
            a.add(j, j, -v);
        }
        a.add(i, i, 0.1 + rng.next().abs());
    }
    a
}

/// 随机非对称对角占优矩阵
fn random_nonsymmetric(n: usize, seed: u64) -> MsrMatrix {
    let rows: Vec<Vec<usize>> = (0..n)
        .map(|i| (i.saturating_sub(2)..(i + 2).min(n)).collect())
        .collect();
    let mut a = MsrMatrix::new(Arc::new(MsrStructure::from_rows(n, &rows)));
    let mut rng = Lcg(seed);
    for i in 0..n {
        a.add(i, i, 5.0 + rng.next().abs() * 2.0);
        if i > 0 {
            a.add(i, i - 1, -1.5 + rng.next() * 0.2);
        }
        if i + 1 < n {
            a.add(i, i + 1, -0.3 + rng.next() * 0.2);
        }
        if i > 1 {
            a.add(i, i - 2, rng.next() * 0.5);
        }
    }
    a
}

fn system(a: MsrMatrix) -> SystemMatrix {
    let mut sys = SystemMatrix::new();
    sys.transfer_coefficients(a).unwrap();
    sys
}

fn true_residual(sys: &SystemMatrix, x: &[f64], b: &[f64]) -> f64 {
    let msr = sys.msr().unwrap();
    let mut ax = vec![0.0; b.len()];
    msr.apply(x, &mut ax);
    ax.iter()
        .zip(b)
        .map(|(a, b)| (b - a) * (b - a))
        .sum::<f64>()
        .sqrt()
}

#[test]
fn test_spd_all_symmetric_bindings() {
    let n = 200;
    let sys = system(random_spd(n, 42));
    let mut rng = Lcg(7);
    let b: Vec<f64> = (0..n).map(|_| rng.next()).collect();
    let reg = BindingRegistry::with_defaults();

    let combos = [
        (SolverFamily::Native, SolverKind::Cg, PrecondKind::Jacobi),
        (SolverFamily::Native, SolverKind::Cg, PrecondKind::Poly1),
        (SolverFamily::Native, SolverKind::Amg, PrecondKind::Jacobi),
        (SolverFamily::External, SolverKind::Cg, PrecondKind::Ssor),
        (SolverFamily::External, SolverKind::Cg, PrecondKind::Icc0),
        (SolverFamily::External, SolverKind::Cg, PrecondKind::Amg),
        (SolverFamily::External, SolverKind::Cg, PrecondKind::As),
    ];
    for (family, solver, precond) in combos {
        let param = LinearSolverParam {
            family,
            solver,
            precond,
            n_subdomains: 4,
            ..LinearSolverParam::default()
        };
        let mut sles = reg.bind("spd", &param).unwrap();
        let mut x = vec![0.0; n];
        let res = sles
            .solve(&sys, SolveControl::new(1e-10, 1.0, 2500), &b, &mut x)
            .unwrap();
        assert_eq!(res.state, ConvergenceState::Converged, "{}/{}/{}", family, solver, precond);
        assert!(true_residual(&sys, &x, &b) < 1e-9);
    }
}

#[test]
fn test_nonsymmetric_bindings() {
    let n = 150;
    let sys = system(random_nonsymmetric(n, 1234));
    let b = vec![1.0; n];
    let reg = BindingRegistry::with_defaults();
    for (family, precond) in [
        (SolverFamily::Native, PrecondKind::Jacobi),
        (SolverFamily::External, PrecondKind::Ilu0),
        (SolverFamily::External, PrecondKind::Jacobi),
    ] {
        for solver in [SolverKind::BiCg, SolverKind::Gmres] {
            let param = LinearSolverParam {
                family,
                solver,
                precond,
                n_subdomains: 3,
                ..LinearSolverParam::default()
            };
            let mut sles = reg.bind("nonsym", &param).unwrap();
            let mut x = vec![0.0; n];
            let res = sles
                .solve(&sys, SolveControl::new(1e-10, 1.0, 1000), &b, &mut x)
                .unwrap();
            assert!(res.is_converged(), "{}/{}/{}: {:?}", family, solver, precond, res);
            assert!(true_residual(&sys, &x, &b) < 1e-9);
        }
    }
}

#[test]
fn test_residual_normalization() {
    // r_norm 放大阈值: 同一系统在大 r_norm 下迭代更少
    let n = 100;
    let sys = system(random_spd(n, 3));
    let b = vec![10.0; n];
    let reg = BindingRegistry::with_defaults();
    let param = LinearSolverParam::default();

    let mut x1 = vec![0.0; n];
    let tight = reg
        .bind("a", &param)
        .unwrap()
        .solve(&sys, SolveControl::new(1e-8, 1.0, 500), &b, &mut x1)
        .unwrap();
    let mut x2 = vec![0.0; n];
    let loose = reg
        .bind("b", &param)
        .unwrap()
        .solve(&sys, SolveControl::new(1e-8, 1e4, 500), &b, &mut x2)
        .unwrap();
    assert!(tight.is_converged() && loose.is_converged());
    assert!(loose.n_iters < tight.n_iters);
    assert!(loose.residual <= 1e-4);
}

#[test]
fn test_reuse_across_steps() {
    // 同一结构多次交接，Sles 复用
    let n = 80;
    let reg = BindingRegistry::with_defaults();
    let mut sles = reg.bind("steps", &LinearSolverParam::default()).unwrap();
    let mut sys = SystemMatrix::new();
    let b = vec![1.0; n];
    let mut x = vec![0.0; n];
    for step in 0..3u64 {
        let a = random_spd(n, 100 + step);
        sys.copy_coefficients(&a).unwrap();
        let res = sles
            .solve(&sys, SolveControl::new(1e-10, 1.0, 500), &b, &mut x)
            .unwrap();
        assert!(res.is_converged());
    }
    assert_eq!(sles.n_calls(), 3);
    assert_eq!(sys.n_copies(), 3);
}
