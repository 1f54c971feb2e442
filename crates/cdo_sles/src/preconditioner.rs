// crates/cdo_sles/src/preconditioner.rs

//! 预条件子
//!
//! 将 Ax = b 转为条件数更好的 M⁻¹Ax = M⁻¹b。
//!
//! # 预条件子类型
//!
//! - [`IdentityPreconditioner`]: 恒等（无预条件）
//! - [`JacobiPreconditioner`]: 对角预条件
//! - [`Poly1Preconditioner`]: 一阶 Neumann 多项式预条件
//! - [`SsorPreconditioner`]: 对称逐次超松弛
//! - [`Ilu0Preconditioner`]: 零填充不完全 LU
//! - [`Icc0Preconditioner`]: 零填充不完全 Cholesky
//! - [`SchwarzPreconditioner`]: 块 Jacobi / 加性 Schwarz（子域 ILU(0)）
//!
//! ```
//! use cdo_sles::csr::CsrMatrix;
//! use cdo_sles::preconditioner::{JacobiPreconditioner, Preconditioner};
//!
//! let a = CsrMatrix::diagonal(&[2.0, 4.0]);
//! let p = JacobiPreconditioner::from_matrix(&a);
//! let mut z = vec![0.0; 2];
//! p.apply(&[2.0, 2.0], &mut z);
//! assert_eq!(z, vec![1.0, 0.5]);
//! ```

use crate::csr::CsrMatrix;
use crate::error::{SlesError, SlesResult};

/// 对角元视为零的阈值
const ZERO_THRESHOLD: f64 = 1e-14;

/// 预条件子 trait
///
/// 核心操作 `apply`: z = M⁻¹ * r
pub trait Preconditioner: Send + Sync {
    /// 应用预条件子: z = M⁻¹ * r
    fn apply(&self, r: &[f64], z: &mut [f64]);

    /// 名称
    fn name(&self) -> &'static str;

    /// 矩阵数值变化但结构不变时更新
    fn update(&mut self, matrix: &CsrMatrix);
}

// =============================================================================
// Identity
// =============================================================================

/// 恒等预条件子，z = r
#[derive(Debug, Clone, Default)]
pub struct IdentityPreconditioner;

impl IdentityPreconditioner {
    /// 创建
    pub fn new() -> Self {
        Self
    }
}

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        z.copy_from_slice(r);
    }

    fn name(&self) -> &'static str {
        "Identity"
    }

    fn update(&mut self, _matrix: &CsrMatrix) {}
}

// =============================================================================
// Jacobi
// =============================================================================

fn invert_diagonal(diag: &[f64]) -> Vec<f64> {
    diag.iter()
        .map(|&d| if d.abs() > ZERO_THRESHOLD { 1.0 / d } else { 1.0 })
        .collect()
}

/// Jacobi 预条件子，z_i = r_i / A_ii
#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// 从 CSR 矩阵创建
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        Self::from_diagonal(&matrix.extract_diagonal())
    }

    /// 从对角向量创建
    pub fn from_diagonal(diag: &[f64]) -> Self {
        Self {
            inv_diag: invert_diagonal(diag),
        }
    }

    /// 对角元倒数
    pub fn inv_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        debug_assert_eq!(r.len(), self.inv_diag.len());
        for ((zi, &ri), &d) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = ri * d;
        }
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.inv_diag = invert_diagonal(&matrix.extract_diagonal());
    }
}

// =============================================================================
// 一阶多项式
// =============================================================================

/// 一阶多项式预条件子
///
/// z = D⁻¹r + D⁻¹(r - A D⁻¹r)，即 Neumann 级数截断到一阶。
#[derive(Debug, Clone)]
pub struct Poly1Preconditioner {
    matrix: CsrMatrix,
    inv_diag: Vec<f64>,
}

impl Poly1Preconditioner {
    /// 从 CSR 矩阵创建
    pub fn from_matrix(matrix: &CsrMatrix) -> Self {
        Self {
            inv_diag: invert_diagonal(&matrix.extract_diagonal()),
            matrix: matrix.clone(),
        }
    }
}

impl Preconditioner for Poly1Preconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n = r.len();
        let z0: Vec<f64> = r.iter().zip(&self.inv_diag).map(|(ri, d)| ri * d).collect();
        let mut az = vec![0.0; n];
        self.matrix.mul_vec(&z0, &mut az);
        for i in 0..n {
            z[i] = z0[i] + self.inv_diag[i] * (r[i] - az[i]);
        }
    }

    fn name(&self) -> &'static str {
        "Poly1"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        self.inv_diag = invert_diagonal(&matrix.extract_diagonal());
        self.matrix = matrix.clone();
    }
}

// =============================================================================
// SSOR
// =============================================================================

/// SSOR 预条件子
///
/// M = (D + ωL) [(2-ω) D]⁻¹ (D + ωU) / ω 的逆作用。
#[derive(Debug, Clone)]
pub struct SsorPreconditioner {
    matrix: CsrMatrix,
    diag: Vec<f64>,
    omega: f64,
}

impl SsorPreconditioner {
    /// 创建，`omega` 通常取 1.0-1.8
    pub fn from_matrix(matrix: &CsrMatrix, omega: f64) -> Self {
        let diag = (0..matrix.n_rows())
            .map(|i| match matrix.diagonal_value(i) {
                Some(d) if d.abs() > ZERO_THRESHOLD => d,
                _ => 1.0,
            })
            .collect();
        Self {
            matrix: matrix.clone(),
            diag,
            omega,
        }
    }

    /// 松弛因子
    pub fn omega(&self) -> f64 {
        self.omega
    }
}

impl Preconditioner for SsorPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let n = self.diag.len();
        let a = &self.matrix;

        // 前向扫描: (D + ωL) y = r
        for i in 0..n {
            let mut sum = r[i];
            for (j, v) in a.row(i).iter() {
                if j < i {
                    sum -= self.omega * v * z[j];
                }
            }
            z[i] = sum / self.diag[i];
        }

        // 对角缩放
        let scale = 2.0 - self.omega;
        for i in 0..n {
            z[i] *= self.diag[i] * scale;
        }

        // 后向扫描: (D + ωU) z = y
        for i in (0..n).rev() {
            let mut sum = z[i];
            for (j, v) in a.row(i).iter() {
                if j > i {
                    sum -= self.omega * v * z[j];
                }
            }
            z[i] = sum / self.diag[i];
        }
    }

    fn name(&self) -> &'static str {
        "SSOR"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        *self = Self::from_matrix(matrix, self.omega);
    }
}

// =============================================================================
// ILU(0)
// =============================================================================

/// ILU(0) 预条件子
///
/// L（单位下三角）与 U 共用原矩阵的稀疏模式存储。
#[derive(Debug, Clone)]
pub struct Ilu0Preconditioner {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    lu: Vec<f64>,
    diag_ptr: Vec<usize>,
}

impl Ilu0Preconditioner {
    /// 分解
    ///
    /// 缺失或过小的主元以 ±`PIVOT_TOL` 代替。
    pub fn new(matrix: &CsrMatrix) -> Self {
        let n = matrix.n_rows();
        let row_ptr = matrix.row_ptr().to_vec();
        let col_idx = matrix.col_idx().to_vec();
        let mut lu = matrix.values().to_vec();
        let diag_ptr: Vec<usize> = (0..n)
            .map(|i| matrix.pattern().find_index(i, i).unwrap_or(usize::MAX))
            .collect();

        Self::factorize(&row_ptr, &col_idx, &mut lu, &diag_ptr);

        Self {
            n,
            row_ptr,
            col_idx,
            lu,
            diag_ptr,
        }
    }

    const PIVOT_TOL: f64 = 1e-12;

    fn pivot(lu: &[f64], diag_ptr: &[usize], k: usize) -> f64 {
        let d = if diag_ptr[k] == usize::MAX { 0.0 } else { lu[diag_ptr[k]] };
        if d.abs() < Self::PIVOT_TOL {
            if d < 0.0 {
                -Self::PIVOT_TOL
            } else {
                Self::PIVOT_TOL
            }
        } else {
            d
        }
    }

    fn factorize(row_ptr: &[usize], col_idx: &[usize], lu: &mut [f64], diag_ptr: &[usize]) {
        let n = diag_ptr.len();
        for i in 1..n {
            for k_idx in row_ptr[i]..row_ptr[i + 1] {
                let k = col_idx[k_idx];
                if k >= i {
                    break;
                }
                let factor = lu[k_idx] / Self::pivot(lu, diag_ptr, k);
                lu[k_idx] = factor;

                // a_ij -= l_ik * u_kj，仅在 (i, j) 已存在时更新
                let mut m_idx = row_ptr[k];
                for j_idx in (k_idx + 1)..row_ptr[i + 1] {
                    let j = col_idx[j_idx];
                    while m_idx < row_ptr[k + 1] && col_idx[m_idx] < j {
                        m_idx += 1;
                    }
                    if m_idx < row_ptr[k + 1] && col_idx[m_idx] == j {
                        lu[j_idx] -= factor * lu[m_idx];
                    }
                }
            }
        }
    }

    /// 维度
    pub fn n(&self) -> usize {
        self.n
    }
}

impl Preconditioner for Ilu0Preconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        // L y = r
        z.copy_from_slice(r);
        for i in 0..self.n {
            let mut sum = z[i];
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[k];
                if j >= i {
                    break;
                }
                sum -= self.lu[k] * z[j];
            }
            z[i] = sum;
        }
        // U z = y
        for i in (0..self.n).rev() {
            let mut sum = z[i];
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[k];
                if j > i {
                    sum -= self.lu[k] * z[j];
                }
            }
            z[i] = sum / Self::pivot(&self.lu, &self.diag_ptr, i);
        }
    }

    fn name(&self) -> &'static str {
        "ILU(0)"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        *self = Self::new(matrix);
    }
}

// =============================================================================
// IC(0)
// =============================================================================

/// IC(0) 预条件子（对称正定矩阵）
///
/// 只使用下三角模式，A ≈ L Lᵀ。
#[derive(Debug, Clone)]
pub struct Icc0Preconditioner {
    n: usize,
    /// L 按行存储，行内列号升序，最后一个元素是对角
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl Icc0Preconditioner {
    /// 分解，非正主元返回 [`SlesError::Breakdown`]
    pub fn new(matrix: &CsrMatrix) -> SlesResult<Self> {
        let n = matrix.n_rows();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);

        for i in 0..n {
            let start = col_idx.len();
            let mut a_ii = 0.0;
            for (j, v) in matrix.row(i).iter() {
                if j < i {
                    col_idx.push(j);
                    values.push(v);
                } else if j == i {
                    a_ii = v;
                }
            }
            // 非对角: l_ij = (a_ij - Σ_k l_ik l_jk) / l_jj
            for p in start..col_idx.len() {
                let j = col_idx[p];
                let s = sparse_dot(
                    &col_idx[start..p],
                    &values[start..p],
                    &col_idx[row_ptr[j]..row_ptr[j + 1] - 1],
                    &values[row_ptr[j]..row_ptr[j + 1] - 1],
                );
                let l_jj = values[row_ptr[j + 1] - 1];
                values[p] = (values[p] - s) / l_jj;
            }
            let sq: f64 = values[start..].iter().map(|v| v * v).sum();
            let pivot = a_ii - sq;
            if pivot <= 0.0 {
                return Err(SlesError::Breakdown {
                    precond: "IC(0)",
                    row: i,
                    pivot,
                });
            }
            col_idx.push(i);
            values.push(pivot.sqrt());
            row_ptr.push(col_idx.len());
        }

        Ok(Self {
            n,
            row_ptr,
            col_idx,
            values,
        })
    }
}

/// 两个有序稀疏行的点积
fn sparse_dot(ci: &[usize], vi: &[f64], cj: &[usize], vj: &[f64]) -> f64 {
    let (mut a, mut b, mut s) = (0, 0, 0.0);
    while a < ci.len() && b < cj.len() {
        match ci[a].cmp(&cj[b]) {
            std::cmp::Ordering::Less => a += 1,
            std::cmp::Ordering::Greater => b += 1,
            std::cmp::Ordering::Equal => {
                s += vi[a] * vj[b];
                a += 1;
                b += 1;
            }
        }
    }
    s
}

impl Preconditioner for Icc0Preconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        // L y = r
        for i in 0..self.n {
            let end = self.row_ptr[i + 1] - 1;
            let mut sum = r[i];
            for p in self.row_ptr[i]..end {
                sum -= self.values[p] * z[self.col_idx[p]];
            }
            z[i] = sum / self.values[end];
        }
        // Lᵀ z = y（按行存储的 L 做列向回代）
        for i in (0..self.n).rev() {
            let end = self.row_ptr[i + 1] - 1;
            z[i] /= self.values[end];
            let zi = z[i];
            for p in self.row_ptr[i]..end {
                z[self.col_idx[p]] -= self.values[p] * zi;
            }
        }
    }

    fn name(&self) -> &'static str {
        "IC(0)"
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        match Self::new(matrix) {
            Ok(p) => *self = p,
            Err(e) => log::warn!("IC(0) 更新失败, 保留旧分解: {}", e),
        }
    }
}

// =============================================================================
// Schwarz（块 Jacobi / 加性 Schwarz）
// =============================================================================

#[derive(Debug, Clone)]
struct Subdomain {
    /// 扩展后的全局行号（升序）
    rows: Vec<usize>,
    /// rows 中属于本子域的标记
    owned: Vec<bool>,
    ilu: Ilu0Preconditioner,
}

/// Schwarz 型区域分解预条件子
///
/// 行按连续区间划分为子域，每个子域做 ILU(0)。`overlap = 0` 即块 Jacobi；
/// `overlap > 0` 时按矩阵图向外扩展，采用限制型加性 Schwarz（只写回本子域行）。
#[derive(Debug, Clone)]
pub struct SchwarzPreconditioner {
    n: usize,
    n_subdomains: usize,
    overlap: usize,
    subdomains: Vec<Subdomain>,
}

impl SchwarzPreconditioner {
    /// 块 Jacobi
    pub fn block_jacobi(matrix: &CsrMatrix, n_subdomains: usize) -> Self {
        Self::new(matrix, n_subdomains, 0)
    }

    /// 加性 Schwarz
    pub fn additive(matrix: &CsrMatrix, n_subdomains: usize, overlap: usize) -> Self {
        Self::new(matrix, n_subdomains, overlap)
    }

    fn new(matrix: &CsrMatrix, n_subdomains: usize, overlap: usize) -> Self {
        let n = matrix.n_rows();
        let n_sub = n_subdomains.clamp(1, n.max(1));
        let mut subdomains = Vec::with_capacity(n_sub);
        for s in 0..n_sub {
            let lo = s * n / n_sub;
            let hi = (s + 1) * n / n_sub;
            let mut in_set = vec![false; n];
            for flag in &mut in_set[lo..hi] {
                *flag = true;
            }
            let mut frontier: Vec<usize> = (lo..hi).collect();
            for _ in 0..overlap {
                let mut next = Vec::new();
                for &i in &frontier {
                    for &j in matrix.row(i).col_indices() {
                        if !in_set[j] {
                            in_set[j] = true;
                            next.push(j);
                        }
                    }
                }
                frontier = next;
            }
            let rows: Vec<usize> = (0..n).filter(|&i| in_set[i]).collect();
            let owned = rows.iter().map(|&i| (lo..hi).contains(&i)).collect();
            let ilu = Ilu0Preconditioner::new(&matrix.principal_submatrix(&rows));
            subdomains.push(Subdomain { rows, owned, ilu });
        }
        Self {
            n,
            n_subdomains: n_sub,
            overlap,
            subdomains,
        }
    }

    /// 子域数
    pub fn n_subdomains(&self) -> usize {
        self.n_subdomains
    }

    /// 重叠层数
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Preconditioner for SchwarzPreconditioner {
    fn apply(&self, r: &[f64], z: &mut [f64]) {
        debug_assert_eq!(r.len(), self.n);
        for sub in &self.subdomains {
            let local_r: Vec<f64> = sub.rows.iter().map(|&i| r[i]).collect();
            let mut local_z = vec![0.0; local_r.len()];
            sub.ilu.apply(&local_r, &mut local_z);
            for ((&i, &own), &v) in sub.rows.iter().zip(&sub.owned).zip(&local_z) {
                if own {
                    z[i] = v;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        if self.overlap == 0 {
            "BlockJacobi"
        } else {
            "AdditiveSchwarz"
        }
    }

    fn update(&mut self, matrix: &CsrMatrix) {
        *self = Self::new(matrix, self.n_subdomains, self.overlap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::CsrBuilder;

    fn laplace_1d(n: usize) -> CsrMatrix {
        let mut b = CsrBuilder::new_square(n);
        for i in 0..n {
            b.set(i, i, 2.0);
            if i > 0 {
                b.set(i, i - 1, -1.0);
            }
            if i + 1 < n {
                b.set(i, i + 1, -1.0);
            }
        }
        b.build()
    }

    fn check_exact(p: &dyn Preconditioner, a: &CsrMatrix) {
        let n = a.n_rows();
        let x: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
        let mut b = vec![0.0; n];
        a.mul_vec(&x, &mut b);
        let mut z = vec![0.0; n];
        p.apply(&b, &mut z);
        for i in 0..n {
            assert!((z[i] - x[i]).abs() < 1e-10, "{} 行 {}: {} vs {}", p.name(), i, z[i], x[i]);
        }
    }

    #[test]
    fn test_identity() {
        let p = IdentityPreconditioner::new();
        let mut z = vec![0.0; 3];
        p.apply(&[1.0, 2.0, 3.0], &mut z);
        assert_eq!(z, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_jacobi_zero_diagonal() {
        let p = JacobiPreconditioner::from_diagonal(&[4.0, 0.0]);
        assert_eq!(p.inv_diagonal(), &[0.25, 1.0]);
    }

    #[test]
    fn test_poly1_on_diagonal_is_exact() {
        let a = CsrMatrix::diagonal(&[2.0, 5.0]);
        let p = Poly1Preconditioner::from_matrix(&a);
        let mut z = vec![0.0; 2];
        p.apply(&[4.0, 10.0], &mut z);
        assert!((z[0] - 2.0).abs() < 1e-15);
        assert!((z[1] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_ilu0_exact_on_tridiagonal() {
        // 三对角矩阵 ILU(0) 无填充损失
        let a = laplace_1d(8);
        check_exact(&Ilu0Preconditioner::new(&a), &a);
    }

    #[test]
    fn test_icc0_exact_on_tridiagonal() {
        let a = laplace_1d(8);
        check_exact(&Icc0Preconditioner::new(&a).unwrap(), &a);
    }

    #[test]
    fn test_icc0_breakdown() {
        let a = CsrMatrix::diagonal(&[1.0, -1.0]);
        assert!(matches!(
            Icc0Preconditioner::new(&a),
            Err(SlesError::Breakdown { row: 1, .. })
        ));
    }

    #[test]
    fn test_ssor_symmetric_action() {
        // SSOR 对对称矩阵给出对称算子: <M⁻¹u, v> = <u, M⁻¹v>
        let a = laplace_1d(6);
        let p = SsorPreconditioner::from_matrix(&a, 1.2);
        let u: Vec<f64> = (0..6).map(|i| (i as f64).sin()).collect();
        let v: Vec<f64> = (0..6).map(|i| (i as f64 * 0.7).cos()).collect();
        let (mut mu, mut mv) = (vec![0.0; 6], vec![0.0; 6]);
        p.apply(&u, &mut mu);
        p.apply(&v, &mut mv);
        let lhs: f64 = mu.iter().zip(&v).map(|(a, b)| a * b).sum();
        let rhs: f64 = u.iter().zip(&mv).map(|(a, b)| a * b).sum();
        assert!((lhs - rhs).abs() < 1e-12);
    }

    #[test]
    fn test_single_block_equals_ilu0() {
        let a = laplace_1d(10);
        let bj = SchwarzPreconditioner::block_jacobi(&a, 1);
        check_exact(&bj, &a);
        assert_eq!(bj.name(), "BlockJacobi");
    }

    #[test]
    fn test_schwarz_blocks() {
        let a = laplace_1d(12);
        let bj = SchwarzPreconditioner::block_jacobi(&a, 3);
        let asm = SchwarzPreconditioner::additive(&a, 3, 1);
        assert_eq!(asm.n_subdomains(), 3);
        assert_eq!(asm.name(), "AdditiveSchwarz");
        let r = vec![1.0; 12];
        let (mut z1, mut z2) = (vec![0.0; 12], vec![0.0; 12]);
        bj.apply(&r, &mut z1);
        asm.apply(&r, &mut z2);
        // 块内求解: 第一块 [0,4) 上 tridiag(4) z = 1 的解为 (2, 3, 3, 2)
        assert!((z1[0] - 2.0).abs() < 1e-12);
        assert!((z1[1] - 3.0).abs() < 1e-12);
        // 重叠使块边界处的值更接近全局解
        assert!(z2[3] > z1[3]);
    }
}
