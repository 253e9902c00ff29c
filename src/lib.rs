//! SPCal - 单颗粒ICP-MS信号分析引擎
//!
//! 从逐驻留时间的离子计数信号中识别颗粒事件，并换算为物理量。
//!
//! ## 核心特性
//! - Gaussian / Poisson（Currie）检出阈值，支持滑动窗口阈值
//! - 双阈值事件检测：`> lc` 的连续区域内至少一个样本 `> ld` 才确认
//! - 传输效率模型与质量响应模型两种校准
//! - 多文件批处理：逐文件失败隔离、结果通道、协作式取消

pub mod core;
pub mod error;
pub mod input;
pub mod processing;
pub mod tools;

// 重新导出核心类型
pub use core::{
    CalibratedResults, CalibrationModel, CalibrationParameters, DetectionResult, ElementTable,
    LimitMethod, LimitOptions, LimitSet, Threshold, accumulate, calculate_limits, calibrate,
};
pub use error::{ErrorCategory, SpcalError, SpcalResult};
pub use input::{ImportOptions, InputCollector, InputRole, SignalData};
pub use processing::{
    AnalysisSettings, BatchJob, BatchOrchestrator, BatchOutcome, BatchSummary, ElementSettings,
    JobStatus, LimitStrategy,
};
