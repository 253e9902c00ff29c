//! 单文件分析流水线
//!
//! 每个文件依次经历 `读取与阈值 → 检测 → 校准 → 导出` 四个阶段，
//! 任一阶段失败都带上阶段信息返回；校准参数缺失不算失败，只省略校准字段。

use crate::core::calibration::{CalibratedResults, CalibrationModel, CalibrationParameters, calibrate};
use crate::core::detection::{DetectionResult, accumulate};
use crate::core::limits::{LimitMethod, LimitOptions, LimitSet, calculate_limits, manual_limits};
use crate::error::{SpcalError, SpcalResult};
use crate::input::collector::{
    InputCollector, InputRole, InstrumentParameters, ReferenceCalibration, ReferenceParameters,
    Trim, calibrate_reference,
};
use crate::input::reader::{ImportOptions, SignalTable, read_table_file, with_path};
use crate::tools::formatter;
use std::fmt;
use std::path::{Path, PathBuf};

/// 阈值策略
#[derive(Debug, Clone, PartialEq)]
pub enum LimitStrategy {
    /// 统计估计
    Estimate {
        method: LimitMethod,
        options: LimitOptions,
    },
    /// 手动阈值 `lc = ld = value`
    Manual(f64),
}

impl Default for LimitStrategy {
    fn default() -> Self {
        Self::Estimate {
            method: LimitMethod::Automatic,
            options: LimitOptions::default(),
        }
    }
}

impl LimitStrategy {
    pub fn apply(&self, signal: &[f64]) -> SpcalResult<LimitSet> {
        match self {
            Self::Estimate { method, options } => calculate_limits(signal, *method, options),
            Self::Manual(value) => manual_limits(signal, *value),
        }
    }
}

/// 全批次共享的分析设置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSettings {
    pub import: ImportOptions,
    pub limits: LimitStrategy,
    pub model: CalibrationModel,
}

/// 单个元素（响应列）的设置
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSettings {
    pub name: String,
    /// 响应列（None 为自动）
    pub column: Option<usize>,
    pub trim: Trim,
    pub calibration: CalibrationParameters,
}

impl ElementSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            trim: (0, 0),
            calibration: CalibrationParameters::default(),
        }
    }

    /// 用参考颗粒结果补全未设置的传输效率与质量响应
    pub fn apply_reference(&mut self, reference: &ReferenceCalibration) {
        if self.calibration.efficiency.is_none() {
            self.calibration.efficiency = reference.efficiency;
        }
        self.calibration
            .mass_response
            .get_or_insert(reference.mass_response);
    }
}

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    ReadAndLimit,
    Detect,
    Calibrate,
    Export,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadAndLimit => "Read&Limit",
            Self::Detect => "Detect",
            Self::Calibrate => "Calibrate",
            Self::Export => "Export",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 带阶段信息的失败
#[derive(Debug)]
pub struct StageError {
    pub stage: JobStage,
    pub error: SpcalError,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

trait AtStage<T> {
    fn at(self, stage: JobStage) -> Result<T, StageError>;
}

impl<T> AtStage<T> for SpcalResult<T> {
    fn at(self, stage: JobStage) -> Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// 单个元素的分析结果
#[derive(Debug, Clone)]
pub struct ElementReport {
    pub element: String,
    pub file: PathBuf,
    /// 裁切后的采集样本数
    pub events: usize,
    pub limits: LimitSet,
    pub detections: DetectionResult,
    /// 背景均值（counts）
    pub background: Option<f64>,
    pub calibration: Option<CalibratedResults>,
    /// 实际用于校准的参数
    pub calibration_inputs: CalibrationParameters,
}

impl ElementReport {
    pub fn count(&self) -> usize {
        self.detections.count()
    }
}

/// 对已是计数的信号估计阈值并检测
pub fn detect(signal: &[f64], limits: &LimitStrategy) -> SpcalResult<(LimitSet, DetectionResult)> {
    let limit_set = limits.apply(signal)?;
    let detections = accumulate(signal, &limit_set.lc, &limit_set.ld)?;
    Ok((limit_set, detections))
}

/// 分析一个文件中的一个元素（前三个阶段）
pub fn analyse_element(
    input: &Path,
    element: &ElementSettings,
    settings: &AnalysisSettings,
) -> Result<ElementReport, StageError> {
    let table = read_table_file(input, &settings.import).at(JobStage::ReadAndLimit)?;
    analyse_table(&table, input, element, settings)
}

/// 在已读取的表上分析一个元素
pub fn analyse_table(
    table: &SignalTable,
    input: &Path,
    element: &ElementSettings,
    settings: &AnalysisSettings,
) -> Result<ElementReport, StageError> {
    // 读取与阈值
    let column = element.column.or(settings.import.column);
    let signal = table
        .signal(column, settings.import.dwelltime)
        .map_err(|e| with_path(e, input))
        .at(JobStage::ReadAndLimit)?;
    let mut collector = InputCollector::from_signal(InputRole::Sample, signal);
    collector.set_trim(element.trim).at(JobStage::ReadAndLimit)?;
    let signal = collector.response_as_counts().at(JobStage::ReadAndLimit)?;
    let limits = settings.limits.apply(&signal).at(JobStage::ReadAndLimit)?;
    log::debug!(
        "{} [{}]: {} ({} samples)",
        input.display(),
        element.name,
        limits.describe(),
        signal.len()
    );

    // 检测
    let detections = accumulate(&signal, &limits.lc, &limits.ld).at(JobStage::Detect)?;
    let background = detections.background(&signal).map(|(mean, _)| mean);

    // 校准
    let mut params = element.calibration.clone();
    if params.dwelltime.is_none() {
        params.dwelltime = collector.signal().dwelltime;
    }
    if params.time.is_none() {
        params.time = collector.acquisition_time(params.dwelltime);
    }
    let calibration = calibrate_partial(
        &detections.sums,
        background,
        &limits,
        settings.model,
        &params,
        &element.name,
    )
    .at(JobStage::Calibrate)?;

    Ok(ElementReport {
        element: element.name.clone(),
        file: input.to_path_buf(),
        events: signal.len(),
        limits,
        detections,
        background,
        calibration,
        calibration_inputs: params,
    })
}

/// 校准，缺少参数时记录警告并返回 None
pub fn calibrate_partial(
    sums: &[f64],
    background: Option<f64>,
    limits: &LimitSet,
    model: CalibrationModel,
    params: &CalibrationParameters,
    element: &str,
) -> SpcalResult<Option<CalibratedResults>> {
    let missing = params.missing(model);
    if !missing.is_empty() {
        log::warn!(
            "{element}: 缺少校准参数 {}，省略校准结果 / missing calibration inputs, calibrated fields omitted",
            missing.join(", ")
        );
        return Ok(None);
    }
    match calibrate(sums, background, &limits.ld, model, params) {
        Ok(results) => Ok(Some(results)),
        Err(SpcalError::MissingCalibration(name)) => {
            log::warn!("{element}: 缺少校准参数 {name} / missing calibration input");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// 多元素时在文件名后追加元素名
pub fn element_output_path(output: &Path, element: &str, element_count: usize) -> PathBuf {
    if element_count <= 1 {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{stem}_{element}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{element}"),
    };
    output.with_file_name(name)
}

/// 完整处理一个文件的所有元素并导出，返回写出的文件
pub fn run_file(
    input: &Path,
    output: &Path,
    elements: &[ElementSettings],
    settings: &AnalysisSettings,
) -> Result<Vec<(PathBuf, usize)>, StageError> {
    if elements.is_empty() {
        return Err(StageError {
            stage: JobStage::ReadAndLimit,
            error: SpcalError::InvalidParameters("没有配置任何元素 / no elements configured".to_string()),
        });
    }

    // 文件只解析一次；全部元素分析成功后才写出
    let table = read_table_file(input, &settings.import).at(JobStage::ReadAndLimit)?;
    let reports = elements
        .iter()
        .map(|element| analyse_table(&table, input, element, settings))
        .collect::<Result<Vec<_>, _>>()?;

    let mut written: Vec<(PathBuf, usize)> = Vec::with_capacity(reports.len());
    for report in &reports {
        let path = element_output_path(output, &report.element, reports.len());
        if let Err(error) = formatter::write_report(&path, report) {
            for (path, _) in &written {
                if let Err(e) = std::fs::remove_file(path) {
                    log::warn!("无法删除部分导出 / cannot remove partial export {}: {e}", path.display());
                }
            }
            return Err(StageError {
                stage: JobStage::Export,
                error,
            });
        }
        written.push((path, report.count()));
    }
    Ok(written)
}

/// 参考颗粒设置
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSettings {
    pub file: PathBuf,
    pub column: Option<usize>,
    pub trim: Trim,
    pub particle: ReferenceParameters,
    pub instrument: InstrumentParameters,
}

/// 分析参考颗粒文件，得到质量响应与传输效率
pub fn calibrate_from_reference(
    reference: &ReferenceSettings,
    settings: &AnalysisSettings,
) -> SpcalResult<ReferenceCalibration> {
    let import = ImportOptions {
        column: reference.column.or(settings.import.column),
        ..settings.import.clone()
    };
    let mut collector = InputCollector::load(InputRole::Reference, &reference.file, &import)?;
    collector.set_trim(reference.trim)?;
    let signal = collector.response_as_counts()?;
    let (_, detections) = detect(&signal, &settings.limits)?;

    let mut instrument = reference.instrument;
    if instrument.dwelltime.is_none() {
        instrument.dwelltime = collector.signal().dwelltime;
    }
    if instrument.time.is_none() {
        instrument.time = collector.acquisition_time(instrument.dwelltime);
    }

    let result = calibrate_reference(&detections.sums, &reference.particle, &instrument)?;
    log::info!(
        "参考颗粒 / reference: {} detections, mass response = {:e} kg/count, efficiency = {:?}",
        detections.count(),
        result.mass_response,
        result.efficiency
    );
    Ok(result)
}
