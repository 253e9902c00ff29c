//! 元素/化合物物理常数表
//!
//! 不可变查找表，由调用方显式传入换算入口，不存在全局单例。

use crate::error::{SpcalError, SpcalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单个物质的物理常数（SI）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementData {
    /// 密度（kg/m³）
    pub density: f64,
    /// 颗粒物质的摩尔质量（kg/mol）
    pub molar_mass: f64,
    /// 分析元素的质量分数（纯元素为 1.0）
    pub mass_fraction: f64,
}

impl ElementData {
    pub const fn new(density: f64, molar_mass: f64, mass_fraction: f64) -> Self {
        Self {
            density,
            molar_mass,
            mass_fraction,
        }
    }
}

/// 内置物质：(符号, 密度 kg/m³, 摩尔质量 kg/mol, 质量分数)
const BUILTIN: &[(&str, f64, f64, f64)] = &[
    ("Ag", 10_490.0, 0.107_868_2, 1.0),
    ("Al", 2_700.0, 0.026_981_5, 1.0),
    ("Au", 19_320.0, 0.196_966_57, 1.0),
    ("Ce", 6_770.0, 0.140_116, 1.0),
    ("Cu", 8_960.0, 0.063_546, 1.0),
    ("Fe", 7_874.0, 0.055_845, 1.0),
    ("Ni", 8_908.0, 0.058_693_4, 1.0),
    ("Pd", 12_023.0, 0.106_42, 1.0),
    ("Pt", 21_450.0, 0.195_084, 1.0),
    ("Ti", 4_506.0, 0.047_867, 1.0),
    ("Zn", 7_140.0, 0.065_38, 1.0),
    ("CeO2", 7_220.0, 0.172_115, 0.814_1),
    ("Fe2O3", 5_240.0, 0.159_687, 0.699_4),
    ("SiO2", 2_650.0, 0.060_084, 0.467_4),
    ("TiO2", 4_230.0, 0.079_866, 0.599_3),
    ("ZnO", 5_610.0, 0.081_38, 0.803_4),
];

/// 物质常数表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementTable {
    entries: BTreeMap<String, ElementData>,
}

impl ElementTable {
    /// 空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置常用元素与氧化物
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|&(symbol, density, molar_mass, fraction)| {
                    (
                        symbol.to_string(),
                        ElementData::new(density, molar_mass, fraction),
                    )
                })
                .collect(),
        }
    }

    /// 返回添加（或覆盖）一项后的新表
    pub fn with(mut self, symbol: impl Into<String>, data: ElementData) -> Self {
        self.entries.insert(symbol.into(), data);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&ElementData> {
        self.entries.get(symbol)
    }

    /// 查找物质，未知符号为参数错误
    pub fn lookup(&self, symbol: &str) -> SpcalResult<&ElementData> {
        self.get(symbol).ok_or_else(|| {
            SpcalError::InvalidParameters(format!("未知元素 '{symbol}' / unknown element"))
        })
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
