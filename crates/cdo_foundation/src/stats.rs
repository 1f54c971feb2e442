// crates/cdo_foundation/src/stats.rs

//! 数组统计量（最小、最大、均值、标准差）

use serde::{Deserialize, Serialize};

/// 一组数据的统计量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataStats {
    /// 元素个数
    pub count: usize,
    /// 最小值
    pub min: f64,
    /// 最大值
    pub max: f64,
    /// 平均值
    pub mean: f64,
    /// 标准差
    pub sigma: f64,
}

impl DataStats {
    /// 从值列表计算，空列表返回全零
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                sigma: 0.0,
            };
        }

        let n = values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            count: values.len(),
            min,
            max,
            mean,
            sigma: variance.sqrt(),
        }
    }

    /// 以 info 级别输出，`tag` 作为行前缀
    pub fn log(&self, tag: &str) {
        log::info!("{}.Max   {:>14.6e}", tag, self.max);
        log::info!("{}.Mean  {:>14.6e}", tag, self.mean);
        log::info!("{}.Sigma {:>14.6e}", tag, self.sigma);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        let s = DataStats::from_values(&[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.max, 0.0);
    }

    #[test]
    fn test_basic_values() {
        let s = DataStats::from_values(&[1.0, 3.0]);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert!((s.mean - 2.0).abs() < 1e-15);
        assert!((s.sigma - 1.0).abs() < 1e-15);
    }
}
