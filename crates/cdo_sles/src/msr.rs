// crates/cdo_sles/src/msr.rs

//! MSR 矩阵（显式对角 + 非对角 CSR）
//!
//! 离散格式组装的中间格式。对角元单独存放，非对角元按行压缩存储，
//! 结构 [`MsrStructure`] 以 `Arc` 共享，可在时间步之间复用。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::csr::CsrMatrix;
use crate::error::{SlesError, SlesResult};
use crate::operator::LinearOperator;

/// MSR 稀疏结构（仅非对角元）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsrStructure {
    n_rows: usize,
    n_cols: usize,
    row_index: Vec<usize>,
    col_id: Vec<usize>,
}

impl MsrStructure {
    /// 从每行的列集合构建
    ///
    /// 对角元与重复列号会被去除，行内列号升序。
    pub fn from_rows(n_cols: usize, rows: &[Vec<usize>]) -> Self {
        let mut row_index = Vec::with_capacity(rows.len() + 1);
        let mut col_id = Vec::new();
        row_index.push(0);
        for (i, row) in rows.iter().enumerate() {
            let mut cols: Vec<usize> = row.iter().copied().filter(|&j| j != i).collect();
            cols.sort_unstable();
            cols.dedup();
            col_id.extend(cols);
            row_index.push(col_id.len());
        }
        Self {
            n_rows: rows.len(),
            n_cols,
            row_index,
            col_id,
        }
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非对角元数量
    #[inline]
    pub fn n_extra(&self) -> usize {
        self.col_id.len()
    }

    /// 行索引
    #[inline]
    pub fn row_index(&self) -> &[usize] {
        &self.row_index
    }

    /// 非对角列号
    #[inline]
    pub fn col_id(&self) -> &[usize] {
        &self.col_id
    }

    /// 第 i 行的非对角列号
    #[inline]
    pub fn row_cols(&self, i: usize) -> &[usize] {
        &self.col_id[self.row_index[i]..self.row_index[i + 1]]
    }

    /// 查找 (row, col) 在非对角数组中的位置
    #[inline]
    pub fn find_extra(&self, row: usize, col: usize) -> Option<usize> {
        self.row_cols(row)
            .binary_search(&col)
            .ok()
            .map(|l| self.row_index[row] + l)
    }
}

/// 矩阵统计信息
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixInfo {
    /// 行数
    pub n_rows: usize,
    /// 非零元数量（含对角）
    pub nnz: usize,
    /// 填充率（百分比）
    pub fillin: f64,
    /// 最小行模板宽度
    pub stencil_min: usize,
    /// 最大行模板宽度
    pub stencil_max: usize,
    /// 平均行模板宽度
    pub stencil_mean: f64,
}

/// MSR 矩阵
#[derive(Debug, Clone)]
pub struct MsrMatrix {
    structure: Arc<MsrStructure>,
    diag: Vec<f64>,
    x_val: Vec<f64>,
}

impl MsrMatrix {
    /// 在给定结构上创建零矩阵
    pub fn new(structure: Arc<MsrStructure>) -> Self {
        let n = structure.n_rows();
        let nx = structure.n_extra();
        Self {
            structure,
            diag: vec![0.0; n],
            x_val: vec![0.0; nx],
        }
    }

    /// 结构句柄
    #[inline]
    pub fn structure(&self) -> &Arc<MsrStructure> {
        &self.structure
    }

    /// 对角值
    #[inline]
    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    /// 按 CSR 行内升序（对角元插入其列位置）排列的全部值
    ///
    /// 与 [`LinearOperator::to_csr`] 生成的模式一一对应，结构不变时可直接替换数值。
    pub fn csr_values(&self) -> Vec<f64> {
        let ri = self.structure.row_index();
        let cols = self.structure.col_id();
        let mut values = Vec::with_capacity(self.diag.len() + cols.len());
        for (i, &d) in self.diag.iter().enumerate() {
            let mut diag_done = false;
            for p in ri[i]..ri[i + 1] {
                if !diag_done && cols[p] > i {
                    values.push(d);
                    diag_done = true;
                }
                values.push(self.x_val[p]);
            }
            if !diag_done {
                values.push(d);
            }
        }
        values
    }

    /// 非对角值
    #[inline]
    pub fn x_val(&self) -> &[f64] {
        &self.x_val
    }

    /// 由 (结构, 对角, 非对角) 重建
    pub fn from_parts(
        structure: Arc<MsrStructure>,
        diag: Vec<f64>,
        x_val: Vec<f64>,
    ) -> SlesResult<Self> {
        if diag.len() != structure.n_rows() {
            return Err(SlesError::dimension("msr diag", structure.n_rows(), diag.len()));
        }
        if x_val.len() != structure.n_extra() {
            return Err(SlesError::dimension("msr x_val", structure.n_extra(), x_val.len()));
        }
        Ok(Self {
            structure,
            diag,
            x_val,
        })
    }

    /// 从同结构矩阵复制数值
    pub fn copy_values_from(&mut self, other: &MsrMatrix) {
        self.diag.copy_from_slice(&other.diag);
        self.x_val.copy_from_slice(&other.x_val);
    }

    /// 拆分为 (结构, 对角, 非对角)
    pub fn into_parts(self) -> (Arc<MsrStructure>, Vec<f64>, Vec<f64>) {
        (self.structure, self.diag, self.x_val)
    }

    /// 值清零
    pub fn clear_values(&mut self) {
        self.diag.fill(0.0);
        self.x_val.fill(0.0);
    }

    /// (row, col) 位置的值
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row == col {
            self.diag[row]
        } else {
            self.structure
                .find_extra(row, col)
                .map_or(0.0, |p| self.x_val[p])
        }
    }

    /// 累加到 (row, col)，位置不在结构中时返回 false
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> bool {
        if row == col {
            self.diag[row] += value;
            true
        } else if let Some(p) = self.structure.find_extra(row, col) {
            self.x_val[p] += value;
            true
        } else {
            false
        }
    }

    /// 强施加 Dirichlet 自由度
    ///
    /// 将第 `dof` 列移到右端项，第 `dof` 行置为单位行，保持矩阵对称性。
    pub fn eliminate_dof(&mut self, dof: usize, value: f64, rhs: &mut [f64]) {
        let s = Arc::clone(&self.structure);
        let start = s.row_index()[dof];
        for (l, &j) in s.row_cols(dof).iter().enumerate() {
            if let Some(p) = s.find_extra(j, dof) {
                rhs[j] -= self.x_val[p] * value;
                self.x_val[p] = 0.0;
            }
            self.x_val[start + l] = 0.0;
        }
        self.diag[dof] = 1.0;
        rhs[dof] = value;
    }

    /// 统计信息
    pub fn info(&self) -> MatrixInfo {
        let n = self.structure.n_rows();
        let ri = self.structure.row_index();
        let (mut smin, mut smax) = (usize::MAX, 0);
        for i in 0..n {
            let w = ri[i + 1] - ri[i] + 1;
            smin = smin.min(w);
            smax = smax.max(w);
        }
        let nnz = n + self.structure.n_extra();
        let denom = (n as f64) * (self.structure.n_cols() as f64);
        MatrixInfo {
            n_rows: n,
            nnz,
            fillin: if denom > 0.0 { 100.0 * nnz as f64 / denom } else { 0.0 },
            stencil_min: if n == 0 { 0 } else { smin },
            stencil_max: smax,
            stencil_mean: if n == 0 { 0.0 } else { nnz as f64 / n as f64 },
        }
    }
}

impl LinearOperator for MsrMatrix {
    fn n_rows(&self) -> usize {
        self.structure.n_rows()
    }

    fn n_cols(&self) -> usize {
        self.structure.n_cols()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.structure.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.structure.n_rows(), "y 长度必须等于矩阵行数");
        let ri = self.structure.row_index();
        let cols = self.structure.col_id();
        for (i, out) in y.iter_mut().enumerate() {
            let mut sum = self.diag[i] * x[i];
            for p in ri[i]..ri[i + 1] {
                sum += self.x_val[p] * x[cols[p]];
            }
            *out = sum;
        }
    }

    fn diagonal(&self) -> Vec<f64> {
        self.diag.clone()
    }

    fn to_csr(&self) -> CsrMatrix {
        let n = self.structure.n_rows();
        let ri = self.structure.row_index();
        let cols = self.structure.col_id();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(n + cols.len());
        row_ptr.push(0);
        for i in 0..n {
            let mut diag_done = false;
            for &j in &cols[ri[i]..ri[i + 1]] {
                if !diag_done && j > i {
                    col_idx.push(i);
                    diag_done = true;
                }
                col_idx.push(j);
            }
            if !diag_done {
                col_idx.push(i);
            }
            row_ptr.push(col_idx.len());
        }
        CsrMatrix::from_raw(n, self.structure.n_cols(), row_ptr, col_idx, self.csr_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laplace_1d(n: usize) -> MsrMatrix {
        let rows: Vec<Vec<usize>> = (0..n)
            .map(|i| {
                let mut r = vec![i];
                if i > 0 {
                    r.push(i - 1);
                }
                if i + 1 < n {
                    r.push(i + 1);
                }
                r
            })
            .collect();
        let mut m = MsrMatrix::new(Arc::new(MsrStructure::from_rows(n, &rows)));
        for i in 0..n {
            m.add(i, i, 2.0);
            if i > 0 {
                assert!(m.add(i, i - 1, -1.0));
            }
            if i + 1 < n {
                assert!(m.add(i, i + 1, -1.0));
            }
        }
        m
    }

    #[test]
    fn test_structure_drops_diagonal() {
        let s = MsrStructure::from_rows(3, &[vec![0, 2, 2, 1], vec![1], vec![0]]);
        assert_eq!(s.row_cols(0), &[1, 2]);
        assert!(s.row_cols(1).is_empty());
        assert_eq!(s.n_extra(), 3);
        assert_eq!(s.find_extra(2, 0), Some(2));
        assert_eq!(s.find_extra(1, 0), None);
    }

    #[test]
    fn test_add_outside_structure() {
        let mut m = laplace_1d(3);
        assert!(!m.add(0, 2, 1.0));
        assert_eq!(m.get(0, 2), 0.0);
        assert_eq!(m.get(1, 0), -1.0);
    }

    #[test]
    fn test_to_csr_matches_apply() {
        let m = laplace_1d(5);
        let csr = m.to_csr();
        assert_eq!(csr.nnz(), 13);
        let x: Vec<f64> = (0..5).map(|i| (i * i) as f64).collect();
        let mut y1 = vec![0.0; 5];
        let mut y2 = vec![0.0; 5];
        m.apply(&x, &mut y1);
        csr.mul_vec(&x, &mut y2);
        assert_eq!(y1, y2);
        assert!(csr.is_symmetric(1e-14));
    }

    #[test]
    fn test_csr_values_follow_pattern() {
        let m = laplace_1d(3);
        assert_eq!(m.csr_values(), vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0]);
        let csr = m.to_csr();
        for i in 0..3 {
            for (j, v) in csr.row(i).iter() {
                assert_eq!(v, m.get(i, j));
            }
        }
    }

    #[test]
    fn test_eliminate_keeps_symmetry() {
        let mut m = laplace_1d(4);
        let mut rhs = vec![1.0; 4];
        m.eliminate_dof(0, 3.0, &mut rhs);
        assert_eq!(rhs, vec![3.0, 4.0, 1.0, 1.0]);
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.get(1, 0), 0.0);
        assert!(m.to_csr().is_symmetric(0.0));
    }

    #[test]
    fn test_info() {
        let info = laplace_1d(4).info();
        assert_eq!(info.n_rows, 4);
        assert_eq!(info.nnz, 10);
        assert_eq!(info.stencil_min, 2);
        assert_eq!(info.stencil_max, 3);
        assert!((info.stencil_mean - 2.5).abs() < 1e-14);
        assert!((info.fillin - 62.5).abs() < 1e-12);
    }
}
