//! 滑动窗口统计
//!
//! 提供滑动均值、中位数与标准差，用于非平稳背景下的逐样本阈值。
//!
//! ## 契约
//! - 输出长度 = `输入长度 - window + 1`，第 k 个输出对应窗口 `x[k..k+window]`
//! - 不做任何边缘填充（反射填充由调用方完成）
//! - 均值/标准差基于前缀和，O(n)；中位数维护有序窗口，O(n log w)
//!
//! 两种后端共享同一契约且输出逐位一致：
//! - [`SerialBackend`]：单线程
//! - [`ParallelBackend`]：rayon 分块并行，前缀和仍串行计算，保证与串行结果完全相同

use crate::error::{SpcalError, SpcalResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// 并行中位数的最小分块（每块独立初始化有序窗口）
const MEDIAN_CHUNK: usize = 4096;

/// 滑动统计后端
pub trait RollingBackend: Send + Sync {
    /// 后端名称（日志用）
    fn name(&self) -> &'static str;

    /// 滑动均值
    fn mean(&self, x: &[f64], window: usize) -> Vec<f64>;

    /// 滑动中位数（偶数窗口取中间两值平均）
    fn median(&self, x: &[f64], window: usize) -> Vec<f64>;

    /// 滑动总体标准差（ddof = 0）
    fn std(&self, x: &[f64], window: usize) -> Vec<f64>;
}

/// 后端选择（配置用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingBackendKind {
    #[default]
    Serial,
    Parallel,
}

impl RollingBackendKind {
    /// 获取对应的后端实例
    pub fn backend(self) -> &'static dyn RollingBackend {
        match self {
            Self::Serial => &SerialBackend,
            Self::Parallel => &ParallelBackend,
        }
    }
}

/// 校验窗口参数
pub fn validate_window(len: usize, window: usize) -> SpcalResult<()> {
    if window == 0 {
        return Err(SpcalError::InvalidParameters(
            "窗口大小必须大于0 / window must be positive".to_string(),
        ));
    }
    if window > len {
        return Err(SpcalError::InvalidParameters(format!(
            "窗口({window})大于信号长度({len}) / window exceeds signal length"
        )));
    }
    Ok(())
}

/// 带参数校验的滑动统计入口
#[derive(Clone, Copy)]
pub struct RollingStatistics {
    backend: &'static dyn RollingBackend,
}

impl RollingStatistics {
    pub fn new(kind: RollingBackendKind) -> Self {
        Self {
            backend: kind.backend(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn mean(&self, x: &[f64], window: usize) -> SpcalResult<Vec<f64>> {
        validate_window(x.len(), window)?;
        Ok(self.backend.mean(x, window))
    }

    pub fn median(&self, x: &[f64], window: usize) -> SpcalResult<Vec<f64>> {
        validate_window(x.len(), window)?;
        Ok(self.backend.median(x, window))
    }

    pub fn std(&self, x: &[f64], window: usize) -> SpcalResult<Vec<f64>> {
        validate_window(x.len(), window)?;
        Ok(self.backend.std(x, window))
    }
}

impl Default for RollingStatistics {
    fn default() -> Self {
        Self::new(RollingBackendKind::Serial)
    }
}

impl std::fmt::Debug for RollingStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingStatistics")
            .field("backend", &self.backend.name())
            .finish()
    }
}

// ==================== 共享计算核心 ====================

/// 除以窗口后的前缀和：`prefix[i] = Σ x[..=i] / window`
fn scaled_prefix(x: &[f64], window: usize, square: bool) -> Vec<f64> {
    let n = window as f64;
    let mut acc = 0.0;
    x.iter()
        .map(|&v| {
            acc += if square { v * v } else { v };
            acc / n
        })
        .collect()
}

/// 第 k 个窗口的和（基于已缩放前缀和）
#[inline]
fn window_value(prefix: &[f64], window: usize, k: usize) -> f64 {
    if k == 0 {
        prefix[window - 1]
    } else {
        prefix[k + window - 1] - prefix[k - 1]
    }
}

#[inline]
fn window_std(sums: &[f64], sqrs: &[f64], window: usize, k: usize) -> f64 {
    let mean = window_value(sums, window, k);
    let sqr = window_value(sqrs, window, k);
    // 前缀差分可能产生极小的负方差
    (sqr - mean * mean).max(0.0).sqrt()
}

/// 有序窗口：二分插入/删除
struct SortedWindow {
    values: Vec<f64>,
    lower: usize,
    upper: usize,
}

impl SortedWindow {
    fn new(initial: &[f64]) -> Self {
        let mut values = initial.to_vec();
        values.sort_unstable_by(f64::total_cmp);
        let n = initial.len();
        let upper = n / 2;
        // 奇数窗口 lower == upper，偶数窗口取中间两值
        let lower = upper + n % 2 - 1;
        Self {
            values,
            lower,
            upper,
        }
    }

    #[inline]
    fn median(&self) -> f64 {
        (self.values[self.upper] + self.values[self.lower]) / 2.0
    }

    fn replace(&mut self, old: f64, new: f64) {
        let pos = self.values.partition_point(|v| v.total_cmp(&old).is_lt());
        self.values.remove(pos);
        let pos = self.values.partition_point(|v| v.total_cmp(&new).is_lt());
        self.values.insert(pos, new);
    }
}

/// 计算输出区间 `[start, end)` 的滑动中位数
fn median_range(x: &[f64], window: usize, start: usize, end: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(end - start);
    let mut sorted = SortedWindow::new(&x[start..start + window]);
    out.push(sorted.median());
    for k in start + 1..end {
        sorted.replace(x[k - 1], x[k + window - 1]);
        out.push(sorted.median());
    }
    out
}

// ==================== 后端实现 ====================

/// 单线程后端
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialBackend;

impl RollingBackend for SerialBackend {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn mean(&self, x: &[f64], window: usize) -> Vec<f64> {
        let prefix = scaled_prefix(x, window, false);
        (0..x.len() - window + 1)
            .map(|k| window_value(&prefix, window, k))
            .collect()
    }

    fn median(&self, x: &[f64], window: usize) -> Vec<f64> {
        median_range(x, window, 0, x.len() - window + 1)
    }

    fn std(&self, x: &[f64], window: usize) -> Vec<f64> {
        let sums = scaled_prefix(x, window, false);
        let sqrs = scaled_prefix(x, window, true);
        (0..x.len() - window + 1)
            .map(|k| window_std(&sums, &sqrs, window, k))
            .collect()
    }
}

/// rayon 并行后端
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBackend;

impl RollingBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn mean(&self, x: &[f64], window: usize) -> Vec<f64> {
        let prefix = scaled_prefix(x, window, false);
        (0..x.len() - window + 1)
            .into_par_iter()
            .map(|k| window_value(&prefix, window, k))
            .collect()
    }

    fn median(&self, x: &[f64], window: usize) -> Vec<f64> {
        let count = x.len() - window + 1;
        let chunk = MEDIAN_CHUNK.max(window);
        let starts: Vec<usize> = (0..count).step_by(chunk).collect();
        starts
            .into_par_iter()
            .map(|start| median_range(x, window, start, (start + chunk).min(count)))
            .collect::<Vec<_>>()
            .concat()
    }

    fn std(&self, x: &[f64], window: usize) -> Vec<f64> {
        let sums = scaled_prefix(x, window, false);
        let sqrs = scaled_prefix(x, window, true);
        (0..x.len() - window + 1)
            .into_par_iter()
            .map(|k| window_std(&sums, &sqrs, window, k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> Vec<f64> {
        vec![2.0, 1.0, 2.0, 2.0, 1.0, 0.0, 0.0, 1.0, 0.0, 2.0]
    }

    #[test]
    fn test_output_length() {
        let x = signal();
        for window in 1..=x.len() {
            assert_eq!(SerialBackend.mean(&x, window).len(), x.len() - window + 1);
            assert_eq!(SerialBackend.median(&x, window).len(), x.len() - window + 1);
            assert_eq!(SerialBackend.std(&x, window).len(), x.len() - window + 1);
        }
    }

    #[test]
    fn test_mean_values() {
        let mean = SerialBackend.mean(&signal(), 3);
        let expected = [5.0 / 3.0, 5.0 / 3.0, 5.0 / 3.0, 1.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 1.0];
        for (a, b) in mean.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12, "{a} != {b}");
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        let x = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(SerialBackend.median(&x, 3), vec![3.0, 2.0, 3.0]);
        assert_eq!(SerialBackend.median(&x, 2), vec![3.0, 2.0, 2.5, 3.0]);
        assert_eq!(SerialBackend.median(&x, 1), x);
    }

    #[test]
    fn test_std_matches_direct() {
        let x = signal();
        let std = SerialBackend.std(&x, 4);
        for (k, value) in std.iter().enumerate() {
            let w = &x[k..k + 4];
            let m = w.iter().sum::<f64>() / 4.0;
            let direct = (w.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / 4.0).sqrt();
            assert!((value - direct).abs() < 1e-9, "window {k}: {value} vs {direct}");
        }
    }

    #[test]
    fn test_constant_signal_has_zero_std() {
        let x = vec![0.1; 50];
        assert!(SerialBackend.std(&x, 7).iter().all(|v| *v == 0.0 || v.abs() < 1e-9));
    }

    #[test]
    fn test_backends_identical() {
        let x: Vec<f64> = (0..20_000)
            .map(|i| ((i * 7919) % 113) as f64 * 0.37 + (i % 5) as f64)
            .collect();
        for window in [1, 2, 9, 64, 5001] {
            assert_eq!(SerialBackend.mean(&x, window), ParallelBackend.mean(&x, window));
            assert_eq!(SerialBackend.median(&x, window), ParallelBackend.median(&x, window));
            assert_eq!(SerialBackend.std(&x, window), ParallelBackend.std(&x, window));
        }
    }

    #[test]
    fn test_window_validation() {
        let stats = RollingStatistics::default();
        assert!(matches!(
            stats.mean(&signal(), 0),
            Err(SpcalError::InvalidParameters(_))
        ));
        assert!(matches!(
            stats.median(&signal(), 11),
            Err(SpcalError::InvalidParameters(_))
        ));
        assert_eq!(stats.std(&signal(), 10).unwrap().len(), 1);
    }
}
