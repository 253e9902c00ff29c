//! 批处理编排器
//!
//! 把单文件流水线独立地应用到多个输入文件：
//! - 每个作业的失败只影响该作业，记录阶段与文件名后继续下一个
//! - 每个作业的结果经 `crossbeam-channel` 恰好报告一次
//! - 取消是协作式的，只在作业开始前检查；已开始的作业总会跑完
//!
//! 默认在单个后台线程串行执行；`parallel_files > 1` 时在有界 rayon 线程池中并行。

use super::batch_state::{BatchSummary, ParallelBatchStats, SerialBatchStats};
use super::pipeline::{AnalysisSettings, ElementSettings, JobStage, run_file};
use crate::error::{ErrorCategory, SpcalError, SpcalResult};
use crate::tools::constants::parallel_limits::{MAX_PARALLEL_DEGREE, MIN_PARALLEL_DEGREE};
use crate::tools::scanner::output_path_for;
use crossbeam_channel::{Receiver, Sender, unbounded};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// 单个批处理作业
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub id: usize,
    pub input: PathBuf,
    /// 导出路径（多元素时每个元素另加后缀）
    pub output: PathBuf,
    pub elements: Vec<ElementSettings>,
}

impl BatchJob {
    /// 为每个输入文件生成作业，输出名由 `%` 模式得到
    pub fn plan(
        inputs: &[PathBuf],
        elements: &[ElementSettings],
        output_name: &str,
        output_dir: Option<&Path>,
    ) -> SpcalResult<Vec<Self>> {
        inputs
            .iter()
            .enumerate()
            .map(|(id, input)| {
                Ok(Self {
                    id,
                    input: input.clone(),
                    output: output_path_for(input, output_name, output_dir)?,
                    elements: elements.to_vec(),
                })
            })
            .collect()
    }
}

/// 作业最终状态
#[derive(Debug)]
pub enum JobStatus {
    /// 所有元素均已导出
    Done {
        outputs: Vec<PathBuf>,
        /// 各元素检测到的颗粒数
        detections: Vec<usize>,
    },
    /// 某阶段失败
    Failed { stage: JobStage, error: SpcalError },
    /// 取消后未开始
    Cancelled,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// 作业结果消息 `(job_id, outcome)`
#[derive(Debug)]
pub struct BatchOutcome {
    pub job_id: usize,
    pub file: PathBuf,
    pub status: JobStatus,
}

impl BatchOutcome {
    pub fn filename(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }
}

/// 共享取消标志
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 批处理编排器
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    settings: Arc<AnalysisSettings>,
    parallel_files: usize,
    cancel: CancelToken,
}

impl BatchOrchestrator {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            parallel_files: MIN_PARALLEL_DEGREE,
            cancel: CancelToken::new(),
        }
    }

    /// 设置并发文件数（限制在 1..=16）
    pub fn with_parallel_files(mut self, degree: usize) -> Self {
        self.parallel_files = degree.clamp(MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE);
        self
    }

    pub fn parallel_files(&self) -> usize {
        self.parallel_files
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 在当前线程执行全部作业，结果逐个发送到 `sender`
    ///
    /// 接收端提前关闭不影响处理。仅线程池创建失败时返回错误。
    pub fn run(&self, jobs: Vec<BatchJob>, sender: &Sender<BatchOutcome>) -> SpcalResult<BatchSummary> {
        let degree = self.parallel_files.min(jobs.len().max(1));
        if degree <= 1 {
            Ok(self.run_serial(jobs, sender))
        } else {
            self.run_parallel(jobs, sender, degree)
        }
    }

    fn run_serial(&self, jobs: Vec<BatchJob>, sender: &Sender<BatchOutcome>) -> BatchSummary {
        let mut stats = SerialBatchStats::new(jobs.len());
        for job in jobs {
            let outcome = execute_job(job, &self.settings, &self.cancel);
            match &outcome.status {
                JobStatus::Done { .. } => {
                    stats.inc_processed();
                }
                JobStatus::Failed { error, .. } => {
                    stats.inc_failed(ErrorCategory::from_error(error), outcome.filename());
                }
                JobStatus::Cancelled => {
                    stats.inc_cancelled();
                }
            }
            let _ = sender.send(outcome);
        }
        stats.snapshot()
    }

    fn run_parallel(
        &self,
        jobs: Vec<BatchJob>,
        sender: &Sender<BatchOutcome>,
        degree: usize,
    ) -> SpcalResult<BatchSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(degree)
            .thread_name(|i| format!("spcal-worker-{i}"))
            .build()
            .map_err(|e| SpcalError::ResourceError(format!("线程池创建失败 / thread pool: {e}")))?;

        let stats = ParallelBatchStats::new(jobs.len());
        pool.install(|| {
            jobs.into_par_iter().for_each(|job| {
                let outcome = execute_job(job, &self.settings, &self.cancel);
                match &outcome.status {
                    JobStatus::Done { .. } => {
                        stats.inc_processed();
                    }
                    JobStatus::Failed { error, .. } => {
                        stats.inc_failed(ErrorCategory::from_error(error), outcome.filename());
                    }
                    JobStatus::Cancelled => {
                        stats.inc_cancelled();
                    }
                }
                let _ = sender.send(outcome);
            });
        });
        Ok(stats.snapshot())
    }

    /// 在后台线程执行，返回可轮询结果与取消的句柄
    pub fn spawn(self, jobs: Vec<BatchJob>) -> SpcalResult<BatchHandle> {
        let (sender, receiver) = unbounded();
        let cancel = self.cancel.clone();
        let worker = std::thread::Builder::new()
            .name("spcal-batch".to_string())
            .spawn(move || self.run(jobs, &sender))
            .map_err(|e| SpcalError::ResourceError(format!("后台线程创建失败 / worker thread: {e}")))?;
        Ok(BatchHandle {
            receiver,
            worker,
            cancel,
        })
    }
}

/// 后台批处理句柄
#[derive(Debug)]
pub struct BatchHandle {
    receiver: Receiver<BatchOutcome>,
    worker: JoinHandle<SpcalResult<BatchSummary>>,
    cancel: CancelToken,
}

impl BatchHandle {
    /// 结果通道，工作线程结束后迭代自然终止
    pub fn outcomes(&self) -> &Receiver<BatchOutcome> {
        &self.receiver
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 等待工作线程结束并取得汇总
    pub fn join(self) -> SpcalResult<BatchSummary> {
        self.worker
            .join()
            .map_err(|_| SpcalError::ResourceError("批处理线程异常退出 / batch worker panicked".to_string()))?
    }
}

fn execute_job(job: BatchJob, settings: &AnalysisSettings, cancel: &CancelToken) -> BatchOutcome {
    let BatchJob {
        id,
        input,
        output,
        elements,
    } = job;

    if cancel.is_cancelled() {
        log::warn!("已取消，跳过 / cancelled, skipping: {}", input.display());
        return BatchOutcome {
            job_id: id,
            file: input,
            status: JobStatus::Cancelled,
        };
    }

    let status = match run_file(&input, &output, &elements, settings) {
        Ok(written) => {
            let (outputs, detections): (Vec<_>, Vec<_>) = written.into_iter().unzip();
            log::info!(
                "完成 / done: {} ({} particles)",
                input.display(),
                detections.iter().sum::<usize>()
            );
            JobStatus::Done {
                outputs,
                detections,
            }
        }
        Err(failure) => {
            log::error!("失败 / failed: {}: {failure}", input.display());
            JobStatus::Failed {
                stage: failure.stage,
                error: failure.error,
            }
        }
    };

    BatchOutcome {
        job_id: id,
        file: input,
        status,
    }
}
