// crates/cdo_sles/src/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 求解器与预条件子的工作格式。稀疏模式以 `Arc` 共享，
//! 同一模式可以挂接多组数值（时间步之间复用结构）。
//!
//! # 特性开关
//!
//! - `parallel`: 启用基于 `rayon` 的并行矩阵-向量乘法
//!
//! # 使用示例
//!
//! ```
//! use cdo_sles::csr::CsrBuilder;
//!
//! let mut builder = CsrBuilder::new_square(3);
//! builder.set(0, 0, 4.0);
//! builder.set(0, 1, -1.0);
//! builder.set(1, 0, -1.0);
//! builder.set(1, 1, 4.0);
//! builder.set(1, 2, -1.0);
//! builder.set(2, 1, -1.0);
//! builder.set(2, 2, 4.0);
//! let matrix = builder.build();
//!
//! let x = vec![1.0, 2.0, 3.0];
//! let mut y = vec![0.0; 3];
//! matrix.mul_vec(&x, &mut y);
//! assert_eq!(y, vec![2.0, 4.0, 10.0]);
//! ```

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// 稀疏模式（与值分离，用于复用）
// =============================================================================

/// CSR 矩阵的稀疏模式
///
/// 行内列索引升序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 从原始数组创建（调用方保证行内有序）
    pub fn from_raw(n_rows: usize, n_cols: usize, row_ptr: Vec<usize>, col_idx: Vec<usize>) -> Self {
        debug_assert_eq!(row_ptr.len(), n_rows + 1, "row_ptr 长度必须为 n_rows + 1");
        debug_assert_eq!(row_ptr[n_rows], col_idx.len(), "row_ptr 末尾必须等于 nnz");
        Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
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

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 行指针切片
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 列索引切片
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 第 row 行的非零元列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// 查找 (row, col) 对应的值索引
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }
}

// =============================================================================
// CSR 矩阵主体
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    pattern: Arc<CsrPattern>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 从原始 CSR 数据创建矩阵
    pub fn from_raw(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(col_idx.len(), values.len(), "col_idx 和 values 长度必须相等");
        Self {
            pattern: Arc::new(CsrPattern::from_raw(n_rows, n_cols, row_ptr, col_idx)),
            values,
        }
    }

    /// 在共享模式上挂接一组数值
    pub fn with_pattern(pattern: Arc<CsrPattern>, values: Vec<f64>) -> Self {
        debug_assert_eq!(pattern.nnz(), values.len());
        Self { pattern, values }
    }

    /// 单位矩阵
    pub fn identity(n: usize) -> Self {
        Self::diagonal(&vec![1.0; n])
    }

    /// 对角矩阵
    pub fn diagonal(diag: &[f64]) -> Self {
        let n = diag.len();
        Self::from_raw(n, n, (0..=n).collect(), (0..n).collect(), diag.to_vec())
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows()
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols()
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 共享的稀疏模式句柄
    #[inline]
    pub fn shared_pattern(&self) -> Arc<CsrPattern> {
        Arc::clone(&self.pattern)
    }

    /// 值切片
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// 行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        self.pattern.row_ptr()
    }

    /// 列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        self.pattern.col_idx()
    }

    /// (row, col) 位置的值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 累加到 (row, col)，位置不存在时返回 false
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> bool {
        if let Some(idx) = self.pattern.find_index(row, col) {
            self.values[idx] += value;
            true
        } else {
            false
        }
    }

    /// 第 row 行的非零元视图
    #[inline]
    pub fn row(&self, row: usize) -> RowView<'_> {
        let start = self.pattern.row_ptr[row];
        let end = self.pattern.row_ptr[row + 1];
        RowView {
            col_idx: &self.pattern.col_idx[start..end],
            values: &self.values[start..end],
        }
    }

    /// 第 row 行的对角元
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<f64> {
        self.pattern.find_index(row, row).map(|idx| self.values[idx])
    }

    /// 提取对角线
    pub fn extract_diagonal(&self) -> Vec<f64> {
        (0..self.n_rows())
            .map(|i| self.diagonal_value(i).unwrap_or(0.0))
            .collect()
    }

    /// 矩阵-向量乘法 y = A * x
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            let start = self.pattern.row_ptr[row];
            let end = self.pattern.row_ptr[row + 1];
            let mut sum = 0.0;
            for idx in start..end {
                sum += self.values[idx] * x[self.pattern.col_idx[idx]];
            }
            *out = sum;
        }
    }

    /// y += alpha * A * x
    pub fn mul_vec_add(&self, alpha: f64, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (col, v) in self.row(row).iter() {
                sum += v * x[col];
            }
            *out += alpha * sum;
        }
    }

    /// 并行矩阵-向量乘法（需启用 `parallel` 特性）
    #[cfg(feature = "parallel")]
    pub fn mul_vec_parallel(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        y.par_iter_mut().enumerate().for_each(|(row, out)| {
            let start = self.pattern.row_ptr[row];
            let end = self.pattern.row_ptr[row + 1];
            let mut sum = 0.0;
            for idx in start..end {
                sum += self.values[idx] * x[self.pattern.col_idx[idx]];
            }
            *out = sum;
        });
    }

    /// 对角元素索引缓存，第 i 个元素是第 i 行对角元在 values 中的位置
    pub fn build_diagonal_cache(&self) -> Vec<Option<usize>> {
        (0..self.n_rows())
            .map(|row| self.pattern.find_index(row, row))
            .collect()
    }

    /// 是否对称（在容差范围内）
    pub fn is_symmetric(&self, tol: f64) -> bool {
        for i in 0..self.n_rows() {
            for (j, a_ij) in self.row(i).iter() {
                if j > i && (a_ij - self.get(j, i)).abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// 无穷范数（最大行和）
    pub fn infinity_norm(&self) -> f64 {
        (0..self.n_rows())
            .map(|row| self.row(row).values().iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }

    /// 将所有值清零（保持稀疏模式不变）
    pub fn clear_values(&mut self) {
        self.values.fill(0.0);
    }

    /// A *= factor
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }

    /// 转置
    pub fn transpose(&self) -> Self {
        let mut builder = CsrBuilder::new(self.n_cols(), self.n_rows());
        for i in 0..self.n_rows() {
            for (j, v) in self.row(i).iter() {
                builder.add(j, i, v);
            }
        }
        builder.build()
    }

    /// 提取行列同为 `rows` 的主子矩阵（`rows` 升序）
    pub fn principal_submatrix(&self, rows: &[usize]) -> Self {
        let mut local = vec![usize::MAX; self.n_cols()];
        for (l, &g) in rows.iter().enumerate() {
            local[g] = l;
        }
        let n = rows.len();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for &g in rows {
            for (j, v) in self.row(g).iter() {
                let lj = local[j];
                if lj != usize::MAX {
                    col_idx.push(lj);
                    values.push(v);
                }
            }
            row_ptr.push(col_idx.len());
        }
        // rows 升序时局部列号保持有序
        Self::from_raw(n, n, row_ptr, col_idx, values)
    }
}

// =============================================================================
// 行视图辅助类型
// =============================================================================

/// 行视图：对矩阵某一行非零元的只读访问
pub struct RowView<'a> {
    col_idx: &'a [usize],
    values: &'a [f64],
}

impl<'a> RowView<'a> {
    /// 列索引切片
    #[inline]
    pub fn col_indices(&self) -> &'a [usize] {
        self.col_idx
    }

    /// 值切片
    #[inline]
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 迭代 (列索引, 值) 对
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.col_idx.iter().copied().zip(self.values.iter().copied())
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器
///
/// 使用 BTreeMap 临时存储，构建时转换为紧凑 CSR 格式。
pub struct CsrBuilder {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    /// 方阵构建器
    #[inline]
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 创建构建器
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 设置 (row, col) 的值（覆盖）
    ///
    /// # Panics
    /// - `row >= n_rows` 或 `col >= n_cols`
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n_rows && col < self.n_cols, "索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    /// - `row >= n_rows` 或 `col >= n_cols`
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.n_rows && col < self.n_cols, "索引越界");
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// 当前值（不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row].get(&col).copied().unwrap_or(0.0)
    }

    /// 当前非零元总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// 构建 CSR 矩阵（消耗构建器）
    pub fn build(self) -> CsrMatrix {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_ptr.push(0);
        for row_map in self.rows {
            for (col, val) in row_map {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }
        CsrMatrix::from_raw(self.n_rows, self.n_cols, row_ptr, col_idx, values)
    }

}

impl From<CsrPattern> for CsrMatrix {
    /// 从稀疏模式创建矩阵（值初始化为 0）
    fn from(pattern: CsrPattern) -> Self {
        let nnz = pattern.nnz();
        Self {
            pattern: Arc::new(pattern),
            values: vec![0.0; nnz],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn tridiag(n: usize) -> CsrMatrix {
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

    #[test]
    fn test_identity_and_diagonal() {
        let id = CsrMatrix::identity(4);
        assert_eq!(id.nnz(), 4);
        assert!((id.get(2, 2) - 1.0).abs() < EPS);
        let d = CsrMatrix::diagonal(&[2.0, 3.0]);
        assert_eq!(d.extract_diagonal(), vec![2.0, 3.0]);
        assert_eq!(d.get(0, 1), 0.0);
    }

    #[test]
    fn test_builder_accumulates() {
        let mut b = CsrBuilder::new_square(2);
        b.set(0, 1, -1.0);
        b.add(0, 1, -0.5);
        b.add(1, 1, 3.0);
        assert_eq!(b.nnz(), 2);
        let m = b.build();
        assert!((m.get(0, 1) + 1.5).abs() < EPS);
        assert_eq!(m.row(0).nnz(), 1);
    }

    #[test]
    fn test_mul_vec_and_add() {
        let m = tridiag(4);
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let mut y = vec![0.0; 4];
        m.mul_vec(&x, &mut y);
        assert_eq!(y, vec![0.0, 0.0, 0.0, 5.0]);
        m.mul_vec_add(2.0, &x, &mut y);
        assert_eq!(y, vec![0.0, 0.0, 0.0, 15.0]);
    }

    #[test]
    fn test_symmetry_and_norms() {
        let m = tridiag(5);
        assert!(m.is_symmetric(EPS));
        assert!((m.infinity_norm() - 4.0).abs() < EPS);
        let mut b = CsrBuilder::new_square(2);
        b.set(0, 1, 1.0);
        b.set(1, 0, 2.0);
        assert!(!b.build().is_symmetric(EPS));
    }

    #[test]
    fn test_transpose() {
        let mut b = CsrBuilder::new(2, 3);
        b.set(0, 2, 5.0);
        b.set(1, 0, 7.0);
        let t = b.build().transpose();
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.n_cols(), 2);
        assert!((t.get(2, 0) - 5.0).abs() < EPS);
        assert!((t.get(0, 1) - 7.0).abs() < EPS);
    }

    #[test]
    fn test_principal_submatrix() {
        let m = tridiag(5);
        let sub = m.principal_submatrix(&[1, 2, 4]);
        assert_eq!(sub.n_rows(), 3);
        assert!((sub.get(0, 1) + 1.0).abs() < EPS);
        // 第 4 行与第 2 行不相邻
        assert_eq!(sub.get(1, 2), 0.0);
        assert!((sub.get(2, 2) - 2.0).abs() < EPS);
    }

    #[test]
    fn test_pattern_shared_between_values() {
        let m = tridiag(3);
        let other = CsrMatrix::with_pattern(m.shared_pattern(), vec![1.0; m.nnz()]);
        assert_eq!(other.pattern(), m.pattern());
        assert_eq!(other.get(0, 1), 1.0);
        assert_eq!(m.diagonal_value(1), Some(2.0));
        assert_eq!(m.build_diagonal_cache().len(), 3);
    }
}
