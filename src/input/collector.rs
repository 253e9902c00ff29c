//! 按角色参数化的输入收集器
//!
//! 样品与参考颗粒共用同一套能力：加载、裁切、以计数表示响应。
//! 角色差异（样品浓度 vs 参考颗粒直径/浓度）只体现在配置上。

use super::reader::{ImportOptions, SignalData, read_signal_file};
use crate::core::calibration::{
    nebulisation_efficiency_from_concentration, nebulisation_efficiency_from_mass,
    reference_particle_mass,
};
use crate::error::{SpcalError, SpcalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 输入角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputRole {
    Sample,
    Reference,
}

impl fmt::Display for InputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample => f.write_str("样品 / sample"),
            Self::Reference => f.write_str("参考 / reference"),
        }
    }
}

/// 从两端移除的样本数 `(left, right)`
pub type Trim = (usize, usize);

/// 批处理中各元素的裁切策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrimPolicy {
    /// 不裁切
    #[default]
    None,
    /// 各元素使用自己配置的裁切
    AsSample,
    /// 所有元素使用配置裁切的平均值（向下取整）
    Average,
    /// 所有元素使用配置裁切的逐端最大值
    Maximum,
}

impl TrimPolicy {
    /// 由各元素配置的裁切得到实际使用的裁切
    pub fn resolve(&self, configured: &[Trim]) -> Vec<Trim> {
        let n = configured.len();
        let uniform = |trim: Trim| vec![trim; n];
        match self {
            Self::None => uniform((0, 0)),
            Self::AsSample => configured.to_vec(),
            Self::Average if n == 0 => Vec::new(),
            Self::Average => {
                let left = average(configured.iter().map(|t| t.0), n);
                let right = average(configured.iter().map(|t| t.1), n);
                uniform((left, right))
            }
            Self::Maximum => {
                let left = configured.iter().map(|t| t.0).max().unwrap_or(0);
                let right = configured.iter().map(|t| t.1).max().unwrap_or(0);
                uniform((left, right))
            }
        }
    }
}

/// 向下取整的平均值，累加在 u128 中进行
fn average(values: impl Iterator<Item = usize>, n: usize) -> usize {
    let total: u128 = values.map(|v| v as u128).sum();
    (total / n as u128) as usize
}

/// 输入收集器
#[derive(Debug, Clone)]
pub struct InputCollector {
    role: InputRole,
    signal: SignalData,
    trim: Trim,
}

impl InputCollector {
    /// 从文件加载
    pub fn load(role: InputRole, path: &Path, options: &ImportOptions) -> SpcalResult<Self> {
        let signal = read_signal_file(path, options)?;
        log::debug!("加载{role}输入 / loaded {role} input: {} ({} samples)", path.display(), signal.len());
        Ok(Self::from_signal(role, signal))
    }

    /// 由已读取的信号构造
    pub fn from_signal(role: InputRole, signal: SignalData) -> Self {
        Self {
            role,
            signal,
            trim: (0, 0),
        }
    }

    pub fn role(&self) -> InputRole {
        self.role
    }

    pub fn signal(&self) -> &SignalData {
        &self.signal
    }

    pub fn trim(&self) -> Trim {
        self.trim
    }

    /// 设置裁切，裁掉全部样本时为 `InvalidInput`
    pub fn set_trim(&mut self, trim: Trim) -> SpcalResult<()> {
        let len = self.signal.len();
        if trim.0.checked_add(trim.1).is_none_or(|total| total >= len) {
            return Err(SpcalError::InvalidInput(format!(
                "裁切({}, {})移除了全部{len}个样本 / trim removes the whole signal",
                trim.0, trim.1
            )));
        }
        self.trim = trim;
        Ok(())
    }

    /// 裁切后的样本数
    pub fn trimmed_len(&self) -> usize {
        self.signal
            .len()
            .saturating_sub(self.trim.0)
            .saturating_sub(self.trim.1)
    }

    /// 裁切后以计数表示的响应
    pub fn response_as_counts(&self) -> SpcalResult<Vec<f64>> {
        let counts = self.signal.as_counts()?;
        Ok(counts[self.trim.0..counts.len() - self.trim.1].to_vec())
    }

    /// 裁切后的采集时间（s）
    pub fn acquisition_time(&self, dwelltime: Option<f64>) -> Option<f64> {
        dwelltime
            .or(self.signal.dwelltime)
            .map(|dwell| self.trimmed_len() as f64 * dwell)
    }
}

/// 参考颗粒的已知参数（SI）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReferenceParameters {
    /// 密度（kg/m³）
    pub density: f64,
    /// 直径（m）
    pub diameter: f64,
    /// 分析元素质量分数
    pub mass_fraction: f64,
    /// 颗粒质量浓度（kg/L）
    pub concentration: Option<f64>,
}

/// 参考颗粒所需的仪器参数（SI，可缺省）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InstrumentParameters {
    pub dwelltime: Option<f64>,
    pub flowrate: Option<f64>,
    pub response: Option<f64>,
    pub time: Option<f64>,
}

/// 参考颗粒校准结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceCalibration {
    /// 参考颗粒质量（kg）
    pub particle_mass: f64,
    /// 质量响应（kg/count）
    pub mass_response: f64,
    /// 传输效率，参数不足时为 None
    pub efficiency: Option<f64>,
}

/// 由参考颗粒检测结果推导质量响应与传输效率
///
/// 已知浓度、流速、采集时间时按浓度法计算效率，否则已知驻留时间、响应、流速时按质量法。
///
/// # 错误
///
/// * `SpcalError::InvalidInput` - 参考颗粒没有任何检测事件
pub fn calibrate_reference(
    detections: &[f64],
    reference: &ReferenceParameters,
    instrument: &InstrumentParameters,
) -> SpcalResult<ReferenceCalibration> {
    if detections.is_empty() {
        return Err(SpcalError::InvalidInput(
            "参考颗粒没有检测事件 / no reference detections".to_string(),
        ));
    }

    let particle_mass = reference_particle_mass(reference.density, reference.diameter);
    let mean = detections.iter().sum::<f64>() / detections.len() as f64;
    let mass_response = particle_mass * reference.mass_fraction / mean;

    let efficiency = match (
        reference.concentration,
        instrument.flowrate,
        instrument.time,
        instrument.dwelltime,
        instrument.response,
    ) {
        (Some(concentration), Some(flowrate), Some(time), _, _) => {
            Some(nebulisation_efficiency_from_concentration(
                detections.len(),
                concentration,
                particle_mass,
                flowrate,
                time,
            ))
        }
        (_, Some(flowrate), _, Some(dwell), Some(response)) => Some(nebulisation_efficiency_from_mass(
            detections,
            dwell,
            particle_mass,
            flowrate,
            response,
            reference.mass_fraction,
        )),
        _ => None,
    };

    Ok(ReferenceCalibration {
        particle_mass,
        mass_response,
        efficiency,
    })
}
