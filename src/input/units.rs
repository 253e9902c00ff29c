//! 物理量单位换算
//!
//! 配置中的物理量可以写成SI数值，也可以写成带单位的字符串（`"50 nm"`、`"19.3 g/cm³"`）。
//! 所有换算因子把值转换到SI基准（kg、m、s、L）。

use crate::error::{SpcalError, SpcalResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 物理量类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// 质量浓度 → kg/L
    Concentration,
    /// 密度 → kg/m³
    Density,
    /// 长度 → m
    Length,
    /// 流速 → L/s
    Flowrate,
    /// 离子响应 → counts/(kg/L)
    Response,
    /// 时间 → s
    Time,
    /// 质量 → kg
    Mass,
    /// 质量响应 → kg/count
    MassResponse,
    /// 摩尔质量 → kg/mol
    MolarMass,
    /// 无量纲
    Dimensionless,
}

const CONCENTRATION: &[(&str, f64)] = &[
    ("fg/L", 1e-18),
    ("pg/L", 1e-15),
    ("ng/L", 1e-12),
    ("μg/L", 1e-9),
    ("ug/L", 1e-9),
    ("mg/L", 1e-6),
    ("g/L", 1e-3),
    ("kg/L", 1.0),
];

const DENSITY: &[(&str, f64)] = &[
    ("g/cm³", 1e-3 * 1e6),
    ("g/cm3", 1e-3 * 1e6),
    ("kg/m³", 1.0),
    ("kg/m3", 1.0),
];

const LENGTH: &[(&str, f64)] = &[("nm", 1e-9), ("μm", 1e-6), ("um", 1e-6), ("m", 1.0)];

const FLOWRATE: &[(&str, f64)] = &[
    ("ml/min", 1e-3 / 60.0),
    ("ml/s", 1e-3),
    ("L/min", 1.0 / 60.0),
    ("L/s", 1.0),
];

const RESPONSE: &[(&str, f64)] = &[
    ("counts/(pg/L)", 1e15),
    ("counts/(ng/L)", 1e12),
    ("counts/(μg/L)", 1e9),
    ("counts/(ug/L)", 1e9),
    ("counts/(mg/L)", 1e6),
];

const TIME: &[(&str, f64)] = &[("ms", 1e-3), ("s", 1.0), ("min", 60.0)];

const MASS: &[(&str, f64)] = &[
    ("ag", 1e-21),
    ("fg", 1e-18),
    ("pg", 1e-15),
    ("ng", 1e-12),
    ("μg", 1e-9),
    ("ug", 1e-9),
    ("mg", 1e-6),
    ("g", 1e-3),
    ("kg", 1.0),
];

const MASS_RESPONSE: &[(&str, f64)] = &[
    ("ag/count", 1e-21),
    ("fg/count", 1e-18),
    ("pg/count", 1e-15),
    ("ng/count", 1e-12),
    ("μg/count", 1e-9),
    ("ug/count", 1e-9),
    ("mg/count", 1e-6),
    ("g/count", 1e-3),
    ("kg/count", 1.0),
];

const MOLAR_MASS: &[(&str, f64)] = &[("g/mol", 1e-3), ("kg/mol", 1.0)];

impl Quantity {
    /// 该类别可用的单位及其SI换算因子
    pub fn units(&self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Concentration => CONCENTRATION,
            Self::Density => DENSITY,
            Self::Length => LENGTH,
            Self::Flowrate => FLOWRATE,
            Self::Response => RESPONSE,
            Self::Time => TIME,
            Self::Mass => MASS,
            Self::MassResponse => MASS_RESPONSE,
            Self::MolarMass => MOLAR_MASS,
            Self::Dimensionless => &[],
        }
    }

    /// 查找单位换算因子（`µ` 与 `μ` 视为同一字符）
    pub fn factor(&self, unit: &str) -> SpcalResult<f64> {
        let unit = unit.trim().replace('µ', "μ");
        self.units()
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, factor)| *factor)
            .ok_or_else(|| {
                let known: Vec<&str> = self.units().iter().map(|(name, _)| *name).collect();
                SpcalError::InvalidParameters(format!(
                    "未知单位 '{unit}'，可选: {} / unknown unit",
                    known.join(", ")
                ))
            })
    }
}

/// 把 `value unit` 换算到SI
pub fn to_base(value: f64, unit: &str, quantity: Quantity) -> SpcalResult<f64> {
    Ok(value * quantity.factor(unit)?)
}

/// 解析 `"50 nm"`、`"50nm"`、`"1e9 counts/(μg/L)"` 或纯数值（视为SI）
pub fn parse_quantity(text: &str, quantity: Quantity) -> SpcalResult<f64> {
    let text = text.trim();
    let (number, unit) = split_number(text).ok_or_else(|| {
        SpcalError::InvalidParameters(format!("无法解析物理量 '{text}' / cannot parse quantity"))
    })?;
    if unit.is_empty() {
        return Ok(number);
    }
    to_base(number, unit, quantity)
}

/// 取能解析为数值的最长前缀，其余为单位
fn split_number(text: &str) -> Option<(f64, &str)> {
    if let Some((number, unit)) = text.split_once(char::is_whitespace)
        && let Ok(value) = number.parse::<f64>()
    {
        return Some((value, unit.trim()));
    }
    text.char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .rev()
        .find_map(|end| {
            text[..end]
                .parse::<f64>()
                .ok()
                .map(|value| (value, text[end..].trim()))
        })
}

/// 配置中的物理量：SI数值或带单位字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhysicalValue {
    Number(f64),
    Text(String),
}

impl PhysicalValue {
    /// 换算为SI数值
    pub fn resolve(&self, quantity: Quantity) -> SpcalResult<f64> {
        match self {
            Self::Number(v) => Ok(*v),
            Self::Text(text) => parse_quantity(text, quantity),
        }
    }
}

impl From<f64> for PhysicalValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for PhysicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// 把可选物理量换算为SI
pub fn resolve_optional(
    value: Option<&PhysicalValue>,
    quantity: Quantity,
) -> SpcalResult<Option<f64>> {
    value.map(|v| v.resolve(quantity)).transpose()
}
