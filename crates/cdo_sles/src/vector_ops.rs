// crates/cdo_sles/src/vector_ops.rs

//! 向量运算（BLAS Level 1 风格）
//!
//! 迭代求解器的基础运算。
//!
//! ```
//! use cdo_sles::vector_ops::{axpy, dot, norm2};
//!
//! let x = vec![1.0, 2.0, 3.0];
//! let mut y = vec![4.0, 5.0, 6.0];
//! assert_eq!(dot(&x, &y), 32.0);
//! axpy(2.0, &x, &mut y);
//! assert_eq!(y, vec![6.0, 9.0, 12.0]);
//! assert!((norm2(&[3.0, 4.0]) - 5.0).abs() < 1e-15);
//! ```

use crate::operator::LinearOperator;

/// 点积 x·y
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y.iter()).map(|(&xi, &yi)| xi * yi).sum()
}

/// 二范数 ||x||₂
#[inline]
pub fn norm2(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

/// 无穷范数 ||x||∞
#[inline]
pub fn norm_inf(x: &[f64]) -> f64 {
    x.iter().map(|&v| v.abs()).fold(0.0, f64::max)
}

/// AXPY: y = α*x + y
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// XPAY: y = x + α*y
#[inline]
pub fn xpay(x: &[f64], alpha: f64, y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = xi + alpha * *yi;
    }
}

/// 缩放: x = α*x
#[inline]
pub fn scale(alpha: f64, x: &mut [f64]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// 填充: x[:] = α
#[inline]
pub fn fill(alpha: f64, x: &mut [f64]) {
    x.fill(alpha);
}

/// 残差 r = b - A*x
pub fn residual<A: LinearOperator + ?Sized>(a: &A, x: &[f64], b: &[f64], r: &mut [f64]) {
    a.apply(x, r);
    for (ri, &bi) in r.iter_mut().zip(b.iter()) {
        *ri = bi - *ri;
    }
}
