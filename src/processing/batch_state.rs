//! 批处理状态管理模块
//!
//! 串行与并行两种模式的批处理统计，最终都汇总为 [`BatchSummary`]。

use crate::error::ErrorCategory;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 批处理统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// 作业总数
    pub total: usize,
    /// 成功处理的文件数
    pub processed: usize,
    /// 失败的文件数
    pub failed: usize,
    /// 因取消而跳过的文件数
    pub cancelled: usize,
    /// 错误分类统计（错误类型 -> 失败文件列表）
    pub error_stats: BTreeMap<ErrorCategory, Vec<String>>,
}

impl BatchSummary {
    /// 已报告结果的作业数
    pub fn reported(&self) -> usize {
        self.processed + self.failed + self.cancelled
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

/// 串行批处理统计
#[derive(Debug, Default)]
pub struct SerialBatchStats {
    total: usize,
    processed: usize,
    failed: usize,
    cancelled: usize,
    error_stats: BTreeMap<ErrorCategory, Vec<String>>,
}

impl SerialBatchStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    #[inline]
    pub fn inc_processed(&mut self) -> usize {
        self.processed += 1;
        self.processed
    }

    /// 增加失败计数并记录错误分类
    #[inline]
    pub fn inc_failed(&mut self, category: ErrorCategory, filename: String) -> usize {
        self.failed += 1;
        self.error_stats.entry(category).or_default().push(filename);
        self.failed
    }

    #[inline]
    pub fn inc_cancelled(&mut self) -> usize {
        self.cancelled += 1;
        self.cancelled
    }

    pub fn snapshot(&self) -> BatchSummary {
        BatchSummary {
            total: self.total,
            processed: self.processed,
            failed: self.failed,
            cancelled: self.cancelled,
            error_stats: self.error_stats.clone(),
        }
    }
}

/// 并行批处理统计（多线程共享，克隆后共享同一状态）
#[derive(Debug, Clone)]
pub struct ParallelBatchStats {
    total: usize,
    processed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
    error_stats: Arc<Mutex<BTreeMap<ErrorCategory, Vec<String>>>>,
}

impl ParallelBatchStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
            error_stats: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    #[inline]
    pub fn inc_processed(&self) -> usize {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn inc_failed(&self, category: ErrorCategory, filename: String) -> usize {
        let count = self.failed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Ok(mut stats) = self.error_stats.lock() {
            stats.entry(category).or_default().push(filename);
        }

        count
    }

    #[inline]
    pub fn inc_cancelled(&self) -> usize {
        self.cancelled.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 统计快照，失败文件列表按名称排序
    pub fn snapshot(&self) -> BatchSummary {
        let mut error_stats = self
            .error_stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default();
        for files in error_stats.values_mut() {
            files.sort();
        }
        BatchSummary {
            total: self.total,
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            error_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpcalError;

    #[test]
    fn test_serial_stats_categories() {
        let mut stats = SerialBatchStats::new(4);
        let input = ErrorCategory::from_error(&SpcalError::InvalidInput("empty".into()));
        let params = ErrorCategory::from_error(&SpcalError::InvalidParameters("lc > ld".into()));

        assert_eq!(stats.inc_processed(), 1);
        assert_eq!(stats.inc_failed(input, "a.csv".into()), 1);
        assert_eq!(stats.inc_failed(params, "b.csv".into()), 2);
        assert_eq!(stats.inc_cancelled(), 1);

        let summary = stats.snapshot();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.reported(), 4);
        assert!(!summary.is_success());
        assert_eq!(summary.error_stats[&input], vec!["a.csv".to_string()]);
        assert_eq!(summary.error_stats[&params], vec!["b.csv".to_string()]);
    }

    #[test]
    fn test_parallel_stats_concurrent_updates() {
        use rayon::prelude::*;

        let stats = ParallelBatchStats::new(150);
        (0..100).into_par_iter().for_each(|_| {
            stats.inc_processed();
        });

        let category = ErrorCategory::from_error(&SpcalError::FormatError("bad row".into()));
        (0..50).into_par_iter().for_each(|i| {
            stats.inc_failed(category, format!("file{i:02}.csv"));
        });

        let summary = stats.snapshot();
        assert_eq!(summary.processed, 100);
        assert_eq!(summary.failed, 50);
        let files = &summary.error_stats[&category];
        assert_eq!(files.len(), 50);
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_parallel_stats_clone_shares_state() {
        let stats1 = ParallelBatchStats::new(2);
        stats1.inc_processed();
        let stats2 = stats1.clone();
        stats2.inc_cancelled();

        assert_eq!(stats1.snapshot().reported(), 2);
        assert_eq!(stats2.snapshot().processed, 1);
    }
}
