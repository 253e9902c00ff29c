//! 批处理配置文件
//!
//! JSON 格式，所有字段可省略。物理量可写成SI数值或带单位的字符串：
//!
//! ```json
//! {
//!   "limit_method": "Poisson",
//!   "limit_error_rates": [0.001, 0.05],
//!   "calibration_model": "nebulisation-efficiency",
//!   "instrument": { "dwelltime": "0.1 ms", "flowrate": "0.35 ml/min",
//!                   "response": "20 counts/(μg/L)", "efficiency": 0.06 },
//!   "elements": [ { "symbol": "Au", "column": 1 } ]
//! }
//! ```

use super::constants::defaults::{OUTPUT_NAME_PATTERN, PARALLEL_FILES_DEGREE};
use super::constants::limits::{DEFAULT_ALPHA, DEFAULT_BETA, DEFAULT_SIGMA};
use super::scanner::validate_output_name;
use crate::core::calibration::{CalibrationModel, CalibrationParameters};
use crate::core::elements::ElementTable;
use crate::core::limits::{LimitMethod, LimitOptions};
use crate::core::poisson::CurrieLimits;
use crate::core::rolling::RollingBackendKind;
use crate::error::{SpcalError, SpcalResult};
use crate::input::collector::{InstrumentParameters, ReferenceParameters, Trim, TrimPolicy};
use crate::input::reader::ImportOptions;
use crate::input::units::{PhysicalValue, Quantity, resolve_optional};
use crate::processing::pipeline::{AnalysisSettings, ElementSettings, LimitStrategy, ReferenceSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 仪器参数（所有元素共享）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub dwelltime: Option<PhysicalValue>,
    pub flowrate: Option<PhysicalValue>,
    pub response: Option<PhysicalValue>,
    pub efficiency: Option<PhysicalValue>,
    pub mass_response: Option<PhysicalValue>,
    pub cell_diameter: Option<PhysicalValue>,
    /// 覆盖由样本数×驻留时间得到的采集时间
    pub time: Option<PhysicalValue>,
}

/// 单个元素（响应列）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementConfig {
    pub name: Option<String>,
    pub column: Option<usize>,
    /// 元素表中的符号，用于补全密度、摩尔质量、质量分数
    pub symbol: Option<String>,
    pub density: Option<PhysicalValue>,
    pub molar_mass: Option<PhysicalValue>,
    pub mass_fraction: Option<f64>,
    /// 配置的裁切，实际裁切由 `trim_policy` 决定
    pub trim: Trim,
    /// 覆盖仪器离子响应
    pub response: Option<PhysicalValue>,
}

/// 参考颗粒
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub file: PathBuf,
    #[serde(default)]
    pub column: Option<usize>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub density: Option<PhysicalValue>,
    pub diameter: PhysicalValue,
    #[serde(default)]
    pub concentration: Option<PhysicalValue>,
    #[serde(default)]
    pub mass_fraction: Option<f64>,
    #[serde(default)]
    pub trim: Trim,
}

/// 批处理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub limit_method: LimitMethod,
    pub limit_sigma: f64,
    /// `(α, β)`
    pub limit_error_rates: (f64, f64),
    /// 设置后使用手动阈值，忽略 `limit_method`
    pub limit_manual_value: Option<f64>,
    pub limit_window: Option<usize>,
    pub rolling_backend: RollingBackendKind,
    pub calibration_model: CalibrationModel,
    pub trim_policy: TrimPolicy,
    pub import: ImportOptions,
    pub instrument: InstrumentConfig,
    /// 为空时按单个自动列处理
    pub elements: Vec<ElementConfig>,
    pub reference: Option<ReferenceConfig>,
    pub output_name: String,
    pub output_dir: Option<PathBuf>,
    pub parallel_files: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            limit_method: LimitMethod::Automatic,
            limit_sigma: DEFAULT_SIGMA,
            limit_error_rates: (DEFAULT_ALPHA, DEFAULT_BETA),
            limit_manual_value: None,
            limit_window: None,
            rolling_backend: RollingBackendKind::Serial,
            calibration_model: CalibrationModel::default(),
            trim_policy: TrimPolicy::default(),
            import: ImportOptions::default(),
            instrument: InstrumentConfig::default(),
            elements: Vec::new(),
            reference: None,
            output_name: OUTPUT_NAME_PATTERN.to_string(),
            output_dir: None,
            parallel_files: PARALLEL_FILES_DEGREE,
        }
    }
}

/// 解析后可直接交给批处理的设置
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub settings: AnalysisSettings,
    pub elements: Vec<ElementSettings>,
    pub reference: Option<ReferenceSettings>,
    pub output_name: String,
    pub output_dir: Option<PathBuf>,
    pub parallel_files: usize,
}

impl BatchConfig {
    /// 读取JSON配置文件
    pub fn load(path: &Path) -> SpcalResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        log::debug!("加载配置 / loaded config: {}", path.display());
        Ok(config)
    }

    /// 阈值策略，参数非法时立即报错而不是在每个作业中失败
    pub fn limit_strategy(&self) -> SpcalResult<LimitStrategy> {
        if let Some(value) = self.limit_manual_value {
            if !value.is_finite() {
                return Err(SpcalError::InvalidParameters(format!(
                    "手动阈值必须为有限值 / manual limit must be finite, got {value}"
                )));
            }
            return Ok(LimitStrategy::Manual(value));
        }

        if !(self.limit_sigma.is_finite() && self.limit_sigma >= 0.0) {
            return Err(SpcalError::InvalidParameters(format!(
                "σ 必须为非负有限值 / sigma must be finite and non-negative, got {}",
                self.limit_sigma
            )));
        }
        let (alpha, beta) = self.limit_error_rates;
        CurrieLimits::new(alpha, beta)?;

        Ok(LimitStrategy::Estimate {
            method: self.limit_method,
            options: LimitOptions {
                sigma: self.limit_sigma,
                alpha,
                beta,
                window: self.limit_window,
                backend: self.rolling_backend,
            },
        })
    }

    /// 换算全部物理量并展开元素
    pub fn resolve(&self, table: &ElementTable) -> SpcalResult<ResolvedConfig> {
        validate_output_name(&self.output_name)?;

        let instrument = &self.instrument;
        let dwelltime = resolve_optional(instrument.dwelltime.as_ref(), Quantity::Time)?;
        let flowrate = resolve_optional(instrument.flowrate.as_ref(), Quantity::Flowrate)?;
        let response = resolve_optional(instrument.response.as_ref(), Quantity::Response)?;

        let base = CalibrationParameters {
            dwelltime,
            efficiency: resolve_optional(instrument.efficiency.as_ref(), Quantity::Dimensionless)?,
            flowrate,
            response,
            time: resolve_optional(instrument.time.as_ref(), Quantity::Time)?,
            mass_response: resolve_optional(instrument.mass_response.as_ref(), Quantity::MassResponse)?,
            cell_diameter: resolve_optional(instrument.cell_diameter.as_ref(), Quantity::Length)?,
            ..CalibrationParameters::default()
        };

        let configured = if self.elements.is_empty() {
            vec![ElementConfig::default()]
        } else {
            self.elements.clone()
        };
        let trims: Vec<Trim> = configured.iter().map(|e| e.trim).collect();
        let trims = self.trim_policy.resolve(&trims);

        let elements = configured
            .iter()
            .zip(trims)
            .map(|(element, trim)| resolve_element(element, trim, &base, table))
            .collect::<SpcalResult<Vec<_>>>()?;

        let mut import = self.import.clone();
        if import.dwelltime.is_none() {
            import.dwelltime = dwelltime;
        }
        import.delimiter_byte()?;

        let reference = self
            .reference
            .as_ref()
            .map(|r| {
                resolve_reference(
                    r,
                    InstrumentParameters {
                        dwelltime,
                        flowrate,
                        response,
                        time: None,
                    },
                    table,
                )
            })
            .transpose()?;

        Ok(ResolvedConfig {
            settings: AnalysisSettings {
                import,
                limits: self.limit_strategy()?,
                model: self.calibration_model,
            },
            elements,
            reference,
            output_name: self.output_name.clone(),
            output_dir: self.output_dir.clone(),
            parallel_files: self.parallel_files,
        })
    }
}

fn resolve_element(
    element: &ElementConfig,
    trim: Trim,
    base: &CalibrationParameters,
    table: &ElementTable,
) -> SpcalResult<ElementSettings> {
    let mut params = base.clone();
    if let Some(symbol) = &element.symbol {
        params = params.with_element(table.lookup(symbol)?);
    }
    if let Some(density) = resolve_optional(element.density.as_ref(), Quantity::Density)? {
        params.density = Some(density);
    }
    if let Some(molar_mass) = resolve_optional(element.molar_mass.as_ref(), Quantity::MolarMass)? {
        params.molar_mass = Some(molar_mass);
    }
    if let Some(response) = resolve_optional(element.response.as_ref(), Quantity::Response)? {
        params.response = Some(response);
    }
    if let Some(fraction) = element.mass_fraction {
        params.mass_fraction = fraction;
    }

    let name = element
        .name
        .clone()
        .or_else(|| element.symbol.clone())
        .unwrap_or_else(|| match element.column {
            Some(column) => format!("column{column}"),
            None => "signal".to_string(),
        });

    Ok(ElementSettings {
        name,
        column: element.column,
        trim,
        calibration: params,
    })
}

fn resolve_reference(
    reference: &ReferenceConfig,
    instrument: InstrumentParameters,
    table: &ElementTable,
) -> SpcalResult<ReferenceSettings> {
    let element = reference
        .symbol
        .as_deref()
        .map(|symbol| table.lookup(symbol))
        .transpose()?;

    let density = resolve_optional(reference.density.as_ref(), Quantity::Density)?
        .or(element.map(|e| e.density))
        .ok_or_else(|| SpcalError::MissingCalibration("reference density".to_string()))?;
    let mass_fraction = reference
        .mass_fraction
        .or(element.map(|e| e.mass_fraction))
        .unwrap_or(1.0);

    Ok(ReferenceSettings {
        file: reference.file.clone(),
        column: reference.column,
        trim: reference.trim,
        particle: ReferenceParameters {
            density,
            diameter: reference.diameter.resolve(Quantity::Length)?,
            mass_fraction,
            concentration: resolve_optional(reference.concentration.as_ref(), Quantity::Concentration)?,
        },
        instrument,
    })
}
