// crates/cdo_sles/src/matrix.rs

//! 求解器侧的系统矩阵
//!
//! 稀疏结构在第一次组装时创建，之后每个时间步复用。
//! 系数有两种交接方式：
//!
//! - [`SystemMatrix::copy_coefficients`]：复制，组装方保留自己的数组（点基格式）
//! - [`SystemMatrix::transfer_coefficients`]：移动，组装方交出数组所有权（面基格式）

use std::sync::Arc;

use crate::csr::CsrMatrix;
use crate::error::{SlesError, SlesResult};
use crate::msr::{MatrixInfo, MsrMatrix, MsrStructure};
use crate::operator::LinearOperator;

/// 系统矩阵
#[derive(Debug, Clone, Default)]
pub struct SystemMatrix {
    inner: Option<MsrMatrix>,
    n_copies: usize,
    n_transfers: usize,
}

impl SystemMatrix {
    /// 创建空矩阵
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已组装
    #[inline]
    pub fn is_assembled(&self) -> bool {
        self.inner.is_some()
    }

    /// 当前矩阵
    #[inline]
    pub fn msr(&self) -> Option<&MsrMatrix> {
        self.inner.as_ref()
    }

    /// 结构句柄
    pub fn structure(&self) -> Option<&Arc<MsrStructure>> {
        self.inner.as_ref().map(MsrMatrix::structure)
    }

    /// 统计信息
    pub fn info(&self) -> Option<MatrixInfo> {
        self.inner.as_ref().map(MsrMatrix::info)
    }

    /// 复制交接次数
    #[inline]
    pub fn n_copies(&self) -> usize {
        self.n_copies
    }

    /// 移动交接次数
    #[inline]
    pub fn n_transfers(&self) -> usize {
        self.n_transfers
    }

    fn check_structure(current: &Arc<MsrStructure>, incoming: &Arc<MsrStructure>) -> SlesResult<()> {
        if Arc::ptr_eq(current, incoming) || **current == **incoming {
            Ok(())
        } else {
            Err(SlesError::StructureMismatch(format!(
                "已有 {} 行 {} 个非对角元, 新矩阵 {} 行 {} 个非对角元",
                current.n_rows(),
                current.n_extra(),
                incoming.n_rows(),
                incoming.n_extra()
            )))
        }
    }

    /// 复制系数
    pub fn copy_coefficients(&mut self, src: &MsrMatrix) -> SlesResult<()> {
        match self.inner.as_mut() {
            None => self.inner = Some(src.clone()),
            Some(m) => {
                Self::check_structure(m.structure(), src.structure())?;
                m.copy_values_from(src);
            }
        }
        self.n_copies += 1;
        Ok(())
    }

    /// 移动系数
    pub fn transfer_coefficients(&mut self, src: MsrMatrix) -> SlesResult<()> {
        let next = match self.inner.take() {
            None => src,
            Some(m) => {
                if let Err(e) = Self::check_structure(m.structure(), src.structure()) {
                    self.inner = Some(m);
                    return Err(e);
                }
                let (_, diag, x_val) = src.into_parts();
                let (structure, _, _) = m.into_parts();
                MsrMatrix::from_parts(structure, diag, x_val)?
            }
        };
        self.inner = Some(next);
        self.n_transfers += 1;
        Ok(())
    }

    /// 求解器使用的矩阵（未组装时报错）
    pub fn require(&self, name: &str) -> SlesResult<&MsrMatrix> {
        self.inner
            .as_ref()
            .ok_or_else(|| SlesError::EmptyMatrix(name.to_string()))
    }

    /// 转为 CSR
    pub fn to_csr(&self) -> Option<CsrMatrix> {
        self.inner.as_ref().map(LinearOperator::to_csr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two(a: f64) -> MsrMatrix {
        let s = Arc::new(MsrStructure::from_rows(2, &[vec![1], vec![0]]));
        let mut m = MsrMatrix::new(s);
        m.add(0, 0, a);
        m.add(1, 1, a);
        m.add(0, 1, -1.0);
        m.add(1, 0, -1.0);
        m
    }

    #[test]
    fn test_copy_keeps_source() {
        let src = two_by_two(2.0);
        let mut sys = SystemMatrix::new();
        sys.copy_coefficients(&src).unwrap();
        let first = Arc::clone(sys.structure().unwrap());

        let src2 = two_by_two(5.0);
        sys.copy_coefficients(&src2).unwrap();
        assert!(Arc::ptr_eq(&first, sys.structure().unwrap()));
        assert_eq!(sys.msr().unwrap().get(0, 0), 5.0);
        assert_eq!(src2.get(0, 0), 5.0);
        assert_eq!(sys.n_copies(), 2);
    }

    #[test]
    fn test_transfer_reuses_structure() {
        let mut sys = SystemMatrix::new();
        sys.transfer_coefficients(two_by_two(2.0)).unwrap();
        let first = Arc::clone(sys.structure().unwrap());
        sys.transfer_coefficients(two_by_two(3.0)).unwrap();
        assert!(Arc::ptr_eq(&first, sys.structure().unwrap()));
        assert_eq!(sys.msr().unwrap().get(1, 1), 3.0);
        assert_eq!(sys.n_transfers(), 2);
    }

    #[test]
    fn test_structure_mismatch() {
        let mut sys = SystemMatrix::new();
        sys.transfer_coefficients(two_by_two(2.0)).unwrap();
        let other = MsrMatrix::new(Arc::new(MsrStructure::from_rows(2, &[vec![], vec![]])));
        assert!(matches!(
            sys.transfer_coefficients(other),
            Err(SlesError::StructureMismatch(_))
        ));
        assert!(sys.is_assembled());
    }

    #[test]
    fn test_require_empty() {
        let sys = SystemMatrix::new();
        assert!(matches!(sys.require("eq"), Err(SlesError::EmptyMatrix(_))));
    }
}
