//! 颗粒物理量换算
//!
//! 全部为无状态纯函数，SI单位（kg、m、s、L）。两种校准模型共用检测积分值：
//! - **传输效率模型**：`m = I·t·V·η / (s·f)`
//! - **质量响应模型**：`m = I·k / f`，`k` 为参考颗粒得到的 kg/count
//!
//! 两种模型都输出质量、粒径、背景等效粒径与各形式的检出限。

use super::elements::ElementData;
use super::limits::Threshold;
use crate::error::{SpcalError, SpcalResult};
use crate::tools::constants::physics::{AVOGADRO, LITRES_PER_CUBIC_METRE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ==================== 基础公式 ====================

/// 球形参考颗粒质量 `4/3·π·(d/2)³·ρ`
#[inline]
pub fn reference_particle_mass(density: f64, diameter: f64) -> f64 {
    4.0 / 3.0 * PI * (diameter / 2.0).powi(3) * density
}

/// 球形颗粒粒径 `cbrt(6m / (πρ))`
#[inline]
pub fn particle_size(mass: f64, density: f64) -> f64 {
    (6.0 * mass / (PI * density)).cbrt()
}

/// 由积分信号计算颗粒质量 `I·t·V·η / (s·f)`
#[inline]
pub fn particle_mass(
    signal: f64,
    dwell: f64,
    efficiency: f64,
    flowrate: f64,
    response_factor: f64,
    mass_fraction: f64,
) -> f64 {
    signal * (dwell * flowrate * efficiency / (response_factor * mass_fraction))
}

/// 已知参考颗粒浓度时的传输效率 `m·N / (V·t·c)`
#[inline]
pub fn nebulisation_efficiency_from_concentration(
    count: usize,
    concentration: f64,
    mass: f64,
    flowrate: f64,
    time: f64,
) -> f64 {
    mass * count as f64 / (flowrate * time * concentration)
}

/// 已知参考颗粒质量时的传输效率，信号取平均
pub fn nebulisation_efficiency_from_mass(
    signals: &[f64],
    dwell: f64,
    mass: f64,
    flowrate: f64,
    response_factor: f64,
    mass_fraction: f64,
) -> f64 {
    let mean = signals.iter().sum::<f64>() / signals.len() as f64;
    mass * response_factor * mass_fraction / (mean * dwell * flowrate)
}

/// 颗粒数浓度（/L）
#[inline]
pub fn particle_number_concentration(count: usize, efficiency: f64, flowrate: f64, time: f64) -> f64 {
    count as f64 / (efficiency * flowrate * time)
}

/// 颗粒总质量浓度（kg/L）
pub fn particle_total_concentration(masses: &[f64], efficiency: f64, flowrate: f64, time: f64) -> f64 {
    masses.iter().sum::<f64>() / (efficiency * flowrate * time)
}

/// 每个颗粒的原子数
#[inline]
pub fn atoms_per_particle(mass: f64, molar_mass: f64) -> f64 {
    mass * AVOGADRO / molar_mass
}

/// 细胞内浓度（mol/L）
#[inline]
pub fn cell_concentration(mass: f64, diameter: f64, molar_mass: f64) -> f64 {
    mass / (4.0 / 3.0 * PI * (diameter / 2.0).powi(3) * LITRES_PER_CUBIC_METRE * molar_mass)
}

// ==================== 校准参数 ====================

/// 校准模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalibrationModel {
    #[default]
    NebulisationEfficiency,
    MassResponse,
}

impl CalibrationModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NebulisationEfficiency => "Nebulisation Efficiency",
            Self::MassResponse => "Mass Response",
        }
    }
}

/// 单次换算所需的物理参数，未设置的字段为 None
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParameters {
    /// 颗粒密度（kg/m³）
    pub density: Option<f64>,
    /// 驻留时间（s）
    pub dwelltime: Option<f64>,
    /// 传输效率
    pub efficiency: Option<f64>,
    /// 进样流速（L/s）
    pub flowrate: Option<f64>,
    /// 离子标准响应（counts/(kg/L)）
    pub response: Option<f64>,
    /// 分析元素在颗粒中的质量分数
    pub mass_fraction: f64,
    /// 总采集时间（s）
    pub time: Option<f64>,
    /// 质量响应（kg/count）
    pub mass_response: Option<f64>,
    /// 摩尔质量（kg/mol）
    pub molar_mass: Option<f64>,
    /// 细胞直径（m）
    pub cell_diameter: Option<f64>,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            density: None,
            dwelltime: None,
            efficiency: None,
            flowrate: None,
            response: None,
            mass_fraction: 1.0,
            time: None,
            mass_response: None,
            molar_mass: None,
            cell_diameter: None,
        }
    }
}

impl CalibrationParameters {
    /// 用元素表数据补全未设置的密度与摩尔质量
    ///
    /// 质量分数仅在仍为默认值 1.0 时被替换。
    pub fn with_element(mut self, element: &ElementData) -> Self {
        self.density.get_or_insert(element.density);
        self.molar_mass.get_or_insert(element.molar_mass);
        if self.mass_fraction == 1.0 {
            self.mass_fraction = element.mass_fraction;
        }
        self
    }

    /// 当前模型缺少的必需参数名
    pub fn missing(&self, model: CalibrationModel) -> Vec<&'static str> {
        let required: Vec<(&'static str, Option<f64>)> = match model {
            CalibrationModel::NebulisationEfficiency => vec![
                ("density", self.density),
                ("dwelltime", self.dwelltime),
                ("efficiency", self.efficiency),
                ("flowrate", self.flowrate),
                ("response", self.response),
                ("time", self.time),
            ],
            CalibrationModel::MassResponse => vec![
                ("density", self.density),
                ("mass_response", self.mass_response),
            ],
        };
        required
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name)
            .collect()
    }
}

fn positive(name: &str, value: f64) -> SpcalResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SpcalError::InvalidParameters(format!(
            "{name} 必须为正的有限值 / {name} must be positive and finite, got {value}"
        )))
    }
}

fn required(name: &str, value: Option<f64>) -> SpcalResult<f64> {
    match value {
        Some(v) => positive(name, v),
        None => Err(SpcalError::MissingCalibration(name.to_string())),
    }
}

// ==================== 结果组装 ====================

/// 校准后的结果
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedResults {
    pub model: CalibrationModel,
    /// 各颗粒质量（kg）
    pub masses: Vec<f64>,
    /// 各颗粒粒径（m）
    pub sizes: Vec<f64>,
    /// 背景等效粒径（m）
    pub background_size: Option<f64>,
    /// 检出限（counts），标量为 `[v]`，滑动阈值为 `[min, max, mean, median]`
    pub lod: Vec<f64>,
    pub lod_mass: Vec<f64>,
    pub lod_size: Vec<f64>,
    /// 颗粒数浓度（/L，取整），仅传输效率模型
    pub number_concentration: Option<f64>,
    /// 颗粒质量浓度（kg/L），仅传输效率模型
    pub concentration: Option<f64>,
    /// 离子背景浓度（kg/L），仅传输效率模型
    pub ionic_background: Option<f64>,
    /// 每颗粒原子数
    pub atoms: Option<Vec<f64>>,
    /// 细胞内浓度（mol/L）
    pub cell_concentrations: Option<Vec<f64>>,
    pub lod_cell_concentration: Option<Vec<f64>>,
}

impl CalibratedResults {
    pub fn mean_size(&self) -> Option<f64> {
        if self.sizes.is_empty() {
            None
        } else {
            Some(self.sizes.iter().sum::<f64>() / self.sizes.len() as f64)
        }
    }

    pub fn median_size(&self) -> Option<f64> {
        if self.sizes.is_empty() {
            None
        } else {
            Some(super::limits::median(&self.sizes))
        }
    }
}

/// 用选定模型把检测积分换算为物理量
///
/// # 参数
///
/// * `sums` - 每个事件的积分信号（counts）
/// * `background` - 背景均值（counts），无背景样本时为 None
/// * `ld` - 检出限
///
/// # 错误
///
/// * `SpcalError::MissingCalibration` - 模型所需参数未设置
/// * `SpcalError::InvalidParameters` - 参数非正或非有限
pub fn calibrate(
    sums: &[f64],
    background: Option<f64>,
    ld: &Threshold,
    model: CalibrationModel,
    params: &CalibrationParameters,
) -> SpcalResult<CalibratedResults> {
    let mass_fraction = positive("mass_fraction", params.mass_fraction)?;
    let density = required("density", params.density)?;
    let lod = ld.summarize();

    let mut results = match model {
        CalibrationModel::NebulisationEfficiency => {
            let dwell = required("dwelltime", params.dwelltime)?;
            let efficiency = required("efficiency", params.efficiency)?;
            let flowrate = required("flowrate", params.flowrate)?;
            let response = required("response", params.response)?;
            let time = required("time", params.time)?;

            let to_mass =
                |signal: f64| particle_mass(signal, dwell, efficiency, flowrate, response, mass_fraction);
            let masses: Vec<f64> = sums.iter().map(|&s| to_mass(s)).collect();
            let lod_mass: Vec<f64> = lod.iter().map(|&l| to_mass(l)).collect();

            CalibratedResults {
                model,
                sizes: masses.iter().map(|&m| particle_size(m, density)).collect(),
                number_concentration: Some(
                    particle_number_concentration(sums.len(), efficiency, flowrate, time).round(),
                ),
                concentration: Some(particle_total_concentration(
                    &masses, efficiency, flowrate, time,
                )),
                ionic_background: background.map(|b| b / response),
                background_size: background.map(|b| particle_size(to_mass(b), density)),
                lod_size: lod_mass.iter().map(|&m| particle_size(m, density)).collect(),
                masses,
                lod,
                lod_mass,
                atoms: None,
                cell_concentrations: None,
                lod_cell_concentration: None,
            }
        }
        CalibrationModel::MassResponse => {
            let mass_response = required("mass_response", params.mass_response)?;
            let to_mass = |signal: f64| signal * mass_response / mass_fraction;
            let masses: Vec<f64> = sums.iter().map(|&s| to_mass(s)).collect();
            let lod_mass: Vec<f64> = lod.iter().map(|&l| to_mass(l)).collect();

            CalibratedResults {
                model,
                sizes: masses.iter().map(|&m| particle_size(m, density)).collect(),
                number_concentration: None,
                concentration: None,
                ionic_background: None,
                background_size: background.map(|b| particle_size(to_mass(b), density)),
                lod_size: lod_mass.iter().map(|&m| particle_size(m, density)).collect(),
                masses,
                lod,
                lod_mass,
                atoms: None,
                cell_concentrations: None,
                lod_cell_concentration: None,
            }
        }
    };

    if let Some(molar_mass) = params.molar_mass {
        let molar_mass = positive("molar_mass", molar_mass)?;
        results.atoms = Some(
            results
                .masses
                .iter()
                .map(|&m| atoms_per_particle(m, molar_mass))
                .collect(),
        );
    }

    match (params.cell_diameter, params.molar_mass) {
        (Some(diameter), Some(molar_mass)) => {
            let diameter = positive("cell_diameter", diameter)?;
            let cell = |m: &f64| cell_concentration(*m, diameter, molar_mass);
            results.cell_concentrations = Some(results.masses.iter().map(cell).collect());
            results.lod_cell_concentration = Some(results.lod_mass.iter().map(cell).collect());
        }
        (Some(_), None) => {
            log::warn!("设置了细胞直径但缺少摩尔质量，跳过细胞浓度 / cell diameter set without molar mass");
        }
        _ => {}
    }

    if results.masses.iter().any(|m| !m.is_finite()) {
        return Err(SpcalError::CalculationError(
            "颗粒质量出现非有限值 / non-finite particle mass".to_string(),
        ));
    }

    Ok(results)
}
