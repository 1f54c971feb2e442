// crates/cdo_sles/src/operator.rs

//! 线性算子抽象
//!
//! Krylov 求解器只需要矩阵-向量乘积；需要逐行访问的预条件子
//! 通过 [`LinearOperator::to_csr`] 取得 CSR 副本后再做分解。

use crate::csr::CsrMatrix;

/// 线性算子
pub trait LinearOperator {
    /// 行数
    fn n_rows(&self) -> usize;

    /// 列数
    fn n_cols(&self) -> usize;

    /// y = A * x
    fn apply(&self, x: &[f64], y: &mut [f64]);

    /// 对角线
    fn diagonal(&self) -> Vec<f64>;

    /// 转为 CSR（包含对角元，行内列号升序）
    fn to_csr(&self) -> CsrMatrix;
}

impl LinearOperator for CsrMatrix {
    fn n_rows(&self) -> usize {
        CsrMatrix::n_rows(self)
    }

    fn n_cols(&self) -> usize {
        CsrMatrix::n_cols(self)
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        #[cfg(feature = "parallel")]
        {
            self.mul_vec_parallel(x, y);
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.mul_vec(x, y);
        }
    }

    fn diagonal(&self) -> Vec<f64> {
        self.extract_diagonal()
    }

    fn to_csr(&self) -> CsrMatrix {
        self.clone()
    }
}
