//! 检出阈值估计
//!
//! 从信号估计背景均值 `ub`、临界值 `lc` 与检出限 `ld`：
//! - Gaussian 族：`lc = ld = ub + σ·std`
//! - Poisson 族：`lc = ub + Sc`，`ld = ub + Sd`（见 [`crate::core::poisson`]）
//!
//! 指定窗口（≥2）时信号先做反射填充，再用滑动统计得到逐样本阈值。

use super::poisson::CurrieLimits;
use super::rolling::{RollingBackendKind, RollingStatistics};
use crate::error::{SpcalError, SpcalResult};
use crate::tools::constants::limits::{
    DEFAULT_ALPHA, DEFAULT_BETA, DEFAULT_SIGMA, GAUSSIAN_CUTOVER_MEAN,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 阈值方法（请求）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitMethod {
    /// 背景均值 < 50 用 Poisson，否则 Gaussian
    Automatic,
    /// 取 Gaussian 与 Poisson 中检出限较高者
    Highest,
    Gaussian,
    #[serde(rename = "Gaussian Median", alias = "Gaussian-Median")]
    GaussianMedian,
    Poisson,
}

impl LimitMethod {
    pub const ALL: [LimitMethod; 5] = [
        LimitMethod::Automatic,
        LimitMethod::Highest,
        LimitMethod::Gaussian,
        LimitMethod::GaussianMedian,
        LimitMethod::Poisson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "Automatic",
            Self::Highest => "Highest",
            Self::Gaussian => "Gaussian",
            Self::GaussianMedian => "Gaussian Median",
            Self::Poisson => "Poisson",
        }
    }

    /// 是否以中位数作为背景统计量
    #[inline]
    pub fn uses_median(&self) -> bool {
        matches!(self, Self::GaussianMedian)
    }
}

impl fmt::Display for LimitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitMethod {
    type Err = SpcalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Automatic" => Ok(Self::Automatic),
            "Highest" => Ok(Self::Highest),
            "Gaussian" => Ok(Self::Gaussian),
            "Gaussian Median" | "Gaussian-Median" => Ok(Self::GaussianMedian),
            "Poisson" => Ok(Self::Poisson),
            other => Err(SpcalError::InvalidParameters(format!(
                "未知的阈值方法 '{other}'，可选: Automatic, Highest, Gaussian, Gaussian Median, Poisson / unknown limit method"
            ))),
        }
    }
}

/// 实际采用的阈值方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResolvedMethod {
    Gaussian,
    GaussianMedian,
    Poisson,
    Manual,
}

impl ResolvedMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gaussian => "Gaussian",
            Self::GaussianMedian => "Gaussian Median",
            Self::Poisson => "Poisson",
            Self::Manual => "Manual Input",
        }
    }
}

impl fmt::Display for ResolvedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 阈值：全局标量或与信号逐一对齐的序列
#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    Scalar(f64),
    Profile(Vec<f64>),
}

impl Threshold {
    /// 第 i 个样本处的阈值
    #[inline]
    pub fn at(&self, i: usize) -> f64 {
        match self {
            Self::Scalar(v) => *v,
            Self::Profile(values) => values[i],
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Profile(_) => None,
        }
    }

    pub fn is_profile(&self) -> bool {
        matches!(self, Self::Profile(_))
    }

    /// 序列长度必须与信号一致
    pub fn check_len(&self, len: usize, name: &str) -> SpcalResult<()> {
        match self {
            Self::Profile(values) if values.len() != len => {
                Err(SpcalError::InvalidParameters(format!(
                    "{name} 长度({})与信号长度({len})不一致 / {name} length mismatch",
                    values.len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// 报告用摘要：标量为 `[v]`，序列为 `[min, max, mean, median]`
    pub fn summarize(&self) -> Vec<f64> {
        match self {
            Self::Scalar(v) => vec![*v],
            Self::Profile(values) if values.is_empty() => Vec::new(),
            Self::Profile(values) => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                vec![min, max, mean(values), median(values)]
            }
        }
    }
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for Threshold {
    fn from(values: Vec<f64>) -> Self {
        Self::Profile(values)
    }
}

/// 阈值估计结果
#[derive(Debug, Clone, PartialEq)]
pub struct LimitSet {
    pub method: ResolvedMethod,
    /// 方法参数（符号 → 值），如 `σ`、`α`、`β`
    pub parameters: BTreeMap<String, f64>,
    pub mean: Threshold,
    /// 临界值
    pub lc: Threshold,
    /// 检出限
    pub ld: Threshold,
}

impl LimitSet {
    /// `Poisson,α=0.05,β=0.05` 形式的描述
    pub fn describe(&self) -> String {
        let mut text = self.method.to_string();
        for (symbol, value) in &self.parameters {
            text.push_str(&format!(",{symbol}={value}"));
        }
        text
    }
}

/// 阈值估计参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitOptions {
    /// Gaussian 倍数
    pub sigma: f64,
    /// 假阳性率
    pub alpha: f64,
    /// 假阴性率
    pub beta: f64,
    /// 滑动窗口（None 或 <2 为全局阈值）
    pub window: Option<usize>,
    pub backend: RollingBackendKind,
}

impl Default for LimitOptions {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_SIGMA,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            window: None,
            backend: RollingBackendKind::Serial,
        }
    }
}

impl LimitOptions {
    /// 有效窗口（≥2 才启用滑动阈值）
    #[inline]
    pub fn effective_window(&self) -> Option<usize> {
        self.window.filter(|w| *w >= 2)
    }
}

/// 计算检出阈值
///
/// # 错误
///
/// * `SpcalError::InvalidInput` - 信号为空
/// * `SpcalError::InvalidParameters` - σ 非法或错误率超出范围
pub fn calculate_limits(
    signal: &[f64],
    method: LimitMethod,
    options: &LimitOptions,
) -> SpcalResult<LimitSet> {
    if signal.is_empty() {
        return Err(SpcalError::InvalidInput(
            "信号为空，无法估计阈值 / signal is empty".to_string(),
        ));
    }
    if !options.sigma.is_finite() || options.sigma < 0.0 {
        return Err(SpcalError::InvalidParameters(format!(
            "σ 必须为非负有限值 / sigma must be finite and non-negative, got {}",
            options.sigma
        )));
    }

    let global_ub = if method.uses_median() {
        median(signal)
    } else {
        mean(signal)
    };

    // 方法判定始终使用全局统计量，即使输出为滑动阈值
    let resolved = match method {
        LimitMethod::Automatic => {
            if global_ub < GAUSSIAN_CUTOVER_MEAN {
                ResolvedMethod::Poisson
            } else {
                ResolvedMethod::Gaussian
            }
        }
        LimitMethod::Highest => {
            let currie = CurrieLimits::new(options.alpha, options.beta)?;
            let l_poisson = global_ub + currie.limits(global_ub).1;
            let l_gaussian = global_ub + options.sigma * std(signal, global_ub);
            if l_gaussian > l_poisson {
                ResolvedMethod::Gaussian
            } else {
                ResolvedMethod::Poisson
            }
        }
        LimitMethod::Gaussian => ResolvedMethod::Gaussian,
        LimitMethod::GaussianMedian => ResolvedMethod::GaussianMedian,
        LimitMethod::Poisson => ResolvedMethod::Poisson,
    };

    log::debug!(
        "阈值方法 / limit method: {method} → {resolved} (ub = {global_ub:.4}, window = {:?})",
        options.effective_window()
    );

    match options.effective_window() {
        None => global_limits(signal, resolved, global_ub, options),
        Some(window) => windowed_limits(signal, resolved, window, options),
    }
}

/// 手动阈值：`lc = ld = value`，背景取信号均值
pub fn manual_limits(signal: &[f64], value: f64) -> SpcalResult<LimitSet> {
    if signal.is_empty() {
        return Err(SpcalError::InvalidInput(
            "信号为空，无法估计阈值 / signal is empty".to_string(),
        ));
    }
    if !value.is_finite() {
        return Err(SpcalError::InvalidParameters(format!(
            "手动阈值必须为有限值 / manual limit must be finite, got {value}"
        )));
    }
    Ok(LimitSet {
        method: ResolvedMethod::Manual,
        parameters: BTreeMap::new(),
        mean: Threshold::Scalar(mean(signal)),
        lc: Threshold::Scalar(value),
        ld: Threshold::Scalar(value),
    })
}

fn gaussian_parameters(sigma: f64) -> BTreeMap<String, f64> {
    BTreeMap::from([("σ".to_string(), sigma)])
}

fn poisson_parameters(currie: &CurrieLimits) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("α".to_string(), currie.alpha()),
        ("β".to_string(), currie.beta()),
    ])
}

fn global_limits(
    signal: &[f64],
    method: ResolvedMethod,
    ub: f64,
    options: &LimitOptions,
) -> SpcalResult<LimitSet> {
    match method {
        ResolvedMethod::Gaussian | ResolvedMethod::GaussianMedian => {
            let ld = ub + options.sigma * std(signal, mean(signal));
            Ok(LimitSet {
                method,
                parameters: gaussian_parameters(options.sigma),
                mean: Threshold::Scalar(ub),
                lc: Threshold::Scalar(ld),
                ld: Threshold::Scalar(ld),
            })
        }
        ResolvedMethod::Poisson => {
            let currie = CurrieLimits::new(options.alpha, options.beta)?;
            let (sc, sd) = currie.limits(ub);
            Ok(LimitSet {
                method,
                parameters: poisson_parameters(&currie),
                mean: Threshold::Scalar(ub),
                lc: Threshold::Scalar(ub + sc),
                ld: Threshold::Scalar(ub + sd),
            })
        }
        ResolvedMethod::Manual => Err(SpcalError::InvalidParameters(
            "Manual 阈值请使用 manual_limits / use manual_limits".to_string(),
        )),
    }
}

fn windowed_limits(
    signal: &[f64],
    method: ResolvedMethod,
    window: usize,
    options: &LimitOptions,
) -> SpcalResult<LimitSet> {
    let stats = RollingStatistics::new(options.backend);
    let padded = reflect_pad(signal, window / 2);
    let len = signal.len();

    let mut ub = if matches!(method, ResolvedMethod::GaussianMedian) {
        stats.median(&padded, window)?
    } else {
        stats.mean(&padded, window)?
    };
    ub.truncate(len);

    match method {
        ResolvedMethod::Gaussian | ResolvedMethod::GaussianMedian => {
            let mut std = stats.std(&padded, window)?;
            std.truncate(len);
            let ld: Vec<f64> = ub
                .iter()
                .zip(&std)
                .map(|(u, s)| u + options.sigma * s)
                .collect();
            Ok(LimitSet {
                method,
                parameters: gaussian_parameters(options.sigma),
                mean: Threshold::Profile(ub),
                lc: Threshold::Profile(ld.clone()),
                ld: Threshold::Profile(ld),
            })
        }
        ResolvedMethod::Poisson => {
            let currie = CurrieLimits::new(options.alpha, options.beta)?;
            let (lc, ld): (Vec<f64>, Vec<f64>) = ub
                .iter()
                .map(|&u| {
                    let (sc, sd) = currie.limits(u);
                    (u + sc, u + sd)
                })
                .unzip();
            Ok(LimitSet {
                method,
                parameters: poisson_parameters(&currie),
                mean: Threshold::Profile(ub),
                lc: Threshold::Profile(lc),
                ld: Threshold::Profile(ld),
            })
        }
        ResolvedMethod::Manual => Err(SpcalError::InvalidParameters(
            "Manual 阈值请使用 manual_limits / use manual_limits".to_string(),
        )),
    }
}

/// 反射填充（不重复边缘样本），两侧各 `pad` 个
///
/// `[a, b, c, d]` 填充2 → `[c, b, a, b, c, d, c, b]`
pub fn reflect_pad(x: &[f64], pad: usize) -> Vec<f64> {
    let len = x.len() as isize;
    (-(pad as isize)..len + pad as isize)
        .map(|i| x[reflect_index(i, x.len())])
        .collect()
}

#[inline]
fn reflect_index(i: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let j = i.rem_euclid(period);
    if j >= len as isize {
        (period - j) as usize
    } else {
        j as usize
    }
}

/// 算术均值（空切片为 NaN）
pub fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// 中位数（偶数长度取中间两值平均，空切片为 NaN）
pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// 总体标准差（ddof = 0），`center` 为已知均值
pub fn std(x: &[f64], center: f64) -> f64 {
    (x.iter().map(|v| (v - center) * (v - center)).sum::<f64>() / x.len() as f64).sqrt()
}
