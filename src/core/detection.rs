//! 双阈值颗粒事件检测
//!
//! 1. 标记所有 `signal > lc` 的样本，连续标记样本构成候选区域
//! 2. 区域内至少一个样本 `> ld` 才确认为事件，否则整段归为背景
//! 3. 确认事件的积分值为区域内全部样本之和（事件是可加的脉冲，不是峰值）
//!
//! 单遍扫描，O(n)，不分配与区域数无关的额外内存。

use super::limits::Threshold;
use crate::error::{SpcalError, SpcalResult};

/// 单个检测事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionEvent {
    /// 首样本索引
    pub start: usize,
    /// 末样本索引（含）
    pub end: usize,
    /// 区域内信号总和
    pub sum: f64,
}

impl DetectionEvent {
    /// 事件持续的样本数
    #[inline]
    pub fn width(&self) -> usize {
        self.end - self.start + 1
    }
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    /// 每个确认事件的积分信号（按起点从左到右）
    pub sums: Vec<f64>,
    /// 逐样本标签：0 = 背景，1..=k = 事件序号
    pub labels: Vec<usize>,
    /// 每个事件的 `[start, stop]`，`stop` 通常为不含的终点
    ///
    /// 延伸到信号末尾的事件记为 `[start, len - 1]`：末样本 `len - 1` 属于该事件，
    /// 却不在半开区间内，按 `regions` 重新分段求和会漏掉它。
    /// 需要闭区间时用 [`DetectionResult::events`]，`sums` 始终包含全部样本。
    pub regions: Vec<[usize; 2]>,
    /// 每个事件的闭区间 `[start, end]`
    spans: Vec<(usize, usize)>,
}

impl DetectionResult {
    /// 事件数
    #[inline]
    pub fn count(&self) -> usize {
        self.sums.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// 计数不确定度（Poisson，√N）
    #[inline]
    pub fn count_uncertainty(&self) -> f64 {
        (self.count() as f64).sqrt()
    }

    /// 按顺序迭代事件
    pub fn events(&self) -> impl Iterator<Item = DetectionEvent> + '_ {
        self.spans
            .iter()
            .zip(&self.sums)
            .map(|(&(start, end), &sum)| DetectionEvent { start, end, sum })
    }

    /// 每个事件内的最大值
    pub fn maxima(&self, signal: &[f64]) -> Vec<f64> {
        self.spans
            .iter()
            .map(|&(start, end)| {
                signal[start..=end]
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max)
            })
            .collect()
    }

    /// 背景样本（标签为0）的均值与总体标准差
    ///
    /// 所有样本都属于事件时返回 None
    pub fn background(&self, signal: &[f64]) -> Option<(f64, f64)> {
        let mut count = 0usize;
        let mut sum = 0.0;
        for (v, label) in signal.iter().zip(&self.labels) {
            if *label == 0 {
                count += 1;
                sum += v;
            }
        }
        if count == 0 {
            return None;
        }
        let mean = sum / count as f64;
        let var = signal
            .iter()
            .zip(&self.labels)
            .filter(|(_, label)| **label == 0)
            .map(|(v, _)| (v - mean) * (v - mean))
            .sum::<f64>()
            / count as f64;
        Some((mean, var.sqrt()))
    }
}

/// 检测并积分颗粒事件
///
/// # 参数
///
/// * `signal` - 逐驻留时间的信号（计数）
/// * `lc` - 临界值（标量或逐样本）
/// * `ld` - 检出限（标量或逐样本），逐元素必须满足 `lc ≤ ld`
///
/// # 错误
///
/// * `SpcalError::InvalidParameters` - 临界值大于检出限，或阈值序列长度与信号不一致
pub fn accumulate(signal: &[f64], lc: &Threshold, ld: &Threshold) -> SpcalResult<DetectionResult> {
    lc.check_len(signal.len(), "lc")?;
    ld.check_len(signal.len(), "ld")?;
    check_ordering(signal.len(), lc, ld)?;

    let len = signal.len();
    let mut labels = vec![0usize; len];
    let mut sums = Vec::new();
    let mut regions = Vec::new();
    let mut spans = Vec::new();

    let mut start: Option<usize> = None;
    let mut sum = 0.0;
    let mut confirmed = false;

    for (i, &value) in signal.iter().enumerate() {
        if value > lc.at(i) {
            if start.is_none() {
                start = Some(i);
                sum = 0.0;
                confirmed = false;
            }
            sum += value;
            confirmed |= value > ld.at(i);
        } else if let Some(s) = start.take()
            && confirmed
        {
            let label = sums.len() + 1;
            labels[s..i].fill(label);
            sums.push(sum);
            regions.push([s, i]);
            spans.push((s, i - 1));
        }
    }

    // 延伸到信号末尾的区域
    if let Some(s) = start
        && confirmed
    {
        let label = sums.len() + 1;
        labels[s..].fill(label);
        sums.push(sum);
        regions.push([s, len - 1]);
        spans.push((s, len - 1));
    }

    Ok(DetectionResult {
        sums,
        labels,
        regions,
        spans,
    })
}

fn check_ordering(len: usize, lc: &Threshold, ld: &Threshold) -> SpcalResult<()> {
    let violated = match (lc, ld) {
        (Threshold::Scalar(c), Threshold::Scalar(d)) => c > d,
        _ => (0..len).any(|i| lc.at(i) > ld.at(i)),
    };
    if violated {
        return Err(SpcalError::InvalidParameters(
            "临界值大于检出限 / critical value exceeds detection limit".to_string(),
        ));
    }
    Ok(())
}
