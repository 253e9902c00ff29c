//! 文件级处理模块
//!
//! 单文件流水线与多文件批处理编排。
//!
//! ## 作业状态机
//! `Pending → Read&Limit → Detect → Calibrate → Export → {Done | Failed(stage)}`

pub mod batch;
pub mod batch_state;
pub mod pipeline;

// 重新导出公共接口
pub use batch::{BatchHandle, BatchJob, BatchOrchestrator, BatchOutcome, CancelToken, JobStatus};
pub use batch_state::{BatchSummary, ParallelBatchStats, SerialBatchStats};
pub use pipeline::{
    AnalysisSettings, ElementReport, ElementSettings, JobStage, LimitStrategy, ReferenceSettings,
    StageError, analyse_element, analyse_table, calibrate_from_reference, detect, run_file,
};
