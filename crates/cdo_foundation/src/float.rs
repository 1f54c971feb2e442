// crates/cdo_foundation/src/float.rs

//! 浮点数阈值
//!
//! 边界条件的零值归一化依赖 `DBL_MIN` 比较，而不是相对容差。

/// 最小正规格化双精度数
pub const DBL_MIN: f64 = f64::MIN_POSITIVE;

/// 判断常数定义是否为零值（`|v| < DBL_MIN`）
#[inline]
pub fn is_zero_value(v: f64) -> bool {
    v.abs() < DBL_MIN
}

/// 判断一组分量是否全部为零值
#[inline]
pub fn all_zero_values(values: &[f64]) -> bool {
    values.iter().all(|v| is_zero_value(*v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_threshold() {
        assert!(is_zero_value(0.0));
        assert!(is_zero_value(-0.0));
        assert!(!is_zero_value(1e-300));
        assert!(!is_zero_value(-1.0));
    }

    #[test]
    fn test_all_zero_values() {
        assert!(all_zero_values(&[0.0, 0.0, 0.0]));
        assert!(!all_zero_values(&[0.0, 1e-12, 0.0]));
        assert!(all_zero_values(&[]));
    }
}
