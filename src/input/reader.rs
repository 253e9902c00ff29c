//! 分隔文本信号读取
//!
//! 支持单列（响应）或两列（时间, 响应）数据：
//! - 文件头前1024字节出现 "cps"（不区分大小写）即视为每秒计数
//! - 两列数据由时间列的平均间隔推断驻留时间，保留6位小数
//! - 列数不足的行以缺失值补齐，非数值与非有限值在分析前丢弃
//! - 分隔符不是逗号时接受小数逗号（`1,5` → `1.5`）

use crate::error::{SpcalError, SpcalResult};
use crate::tools::constants::input::{DWELLTIME_DECIMALS, EXPECTED_COLUMNS, HEADER_SCAN_BYTES};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// 导入选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// 分隔符（单个ASCII字符，`"\t"` 或 `"tab"` 表示制表符）
    pub delimiter: String,
    /// 响应列索引（None 时自动判断）
    pub column: Option<usize>,
    /// 强制指定是否为CPS数据（None 时由文件头判断）
    pub cps: Option<bool>,
    /// 强制指定驻留时间（s），优先于由时间列推断的值
    pub dwelltime: Option<f64>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            column: None,
            cps: None,
            dwelltime: None,
        }
    }
}

impl ImportOptions {
    /// 解析分隔符为单字节
    pub fn delimiter_byte(&self) -> SpcalResult<u8> {
        match self.delimiter.as_str() {
            "\\t" | "\t" | "tab" => Ok(b'\t'),
            d if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
            other => Err(SpcalError::InvalidParameters(format!(
                "分隔符必须是单个ASCII字符 / delimiter must be one ASCII character, got '{other}'"
            ))),
        }
    }
}

/// 读取得到的信号
#[derive(Debug, Clone, PartialEq)]
pub struct SignalData {
    /// 响应值（已去除 NaN），单位由 `cps` 决定
    pub response: Vec<f64>,
    /// 响应是否为每秒计数
    pub cps: bool,
    /// 驻留时间（s），来自选项或时间列
    pub dwelltime: Option<f64>,
}

impl SignalData {
    /// 以计数表示的响应
    ///
    /// CPS 数据需要驻留时间，缺失时为 `MissingCalibration`。
    pub fn as_counts(&self) -> SpcalResult<Vec<f64>> {
        if !self.cps {
            return Ok(self.response.clone());
        }
        let dwell = self.dwelltime.ok_or_else(|| {
            SpcalError::MissingCalibration(
                "CPS数据需要驻留时间 / dwelltime required for CPS data".to_string(),
            )
        })?;
        Ok(self.response.iter().map(|v| v * dwell).collect())
    }

    pub fn len(&self) -> usize {
        self.response.len()
    }

    pub fn is_empty(&self) -> bool {
        self.response.is_empty()
    }
}

/// 一次读取得到的全部列
///
/// 多元素分析时每个文件只解析一次，各元素从同一张表中取响应列。
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTable {
    /// 逐列数值，缺失或非数值为 NaN，各列等长
    pub columns: Vec<Vec<f64>>,
    /// 文件头是否标明每秒计数
    pub cps: bool,
}

impl SignalTable {
    /// 取出一列响应
    ///
    /// `column` 为 None 时：第二列全为缺失则用第一列，否则用第二列。
    /// 响应不是第一列时由第一列（时间）推断驻留时间，`dwelltime` 优先。
    /// 非有限值被丢弃，没有剩余样本时为 `InvalidInput`。
    pub fn signal(&self, column: Option<usize>, dwelltime: Option<f64>) -> SpcalResult<SignalData> {
        let missing = |i: usize| self.columns.get(i).is_none_or(|c| c.iter().all(|v| v.is_nan()));
        let response_index = match column {
            Some(c) => c,
            None if missing(1) => 0,
            None => 1,
        };

        let inferred = match self.columns.first() {
            Some(times) if response_index > 0 => infer_dwelltime(times),
            _ => None,
        };

        let raw = self.columns.get(response_index).map_or(&[][..], Vec::as_slice);
        let response: Vec<f64> = raw.iter().copied().filter(|v| v.is_finite()).collect();
        let dropped = raw.iter().filter(|v| v.is_infinite()).count();
        if dropped > 0 {
            log::warn!("列{response_index}丢弃{dropped}个非有限值 / dropped {dropped} non-finite values");
        }

        if response.is_empty() {
            return Err(SpcalError::InvalidInput(format!(
                "列{response_index}中没有数值数据 / no numeric data in column {response_index}"
            )));
        }

        let dwelltime = dwelltime.or(inferred);
        log::debug!(
            "读取 {} 个样本 / read {} samples (column = {response_index}, cps = {}, dwelltime = {dwelltime:?})",
            response.len(),
            response.len(),
            self.cps
        );

        Ok(SignalData {
            response,
            cps: self.cps,
            dwelltime,
        })
    }
}

/// 读取整张表
pub fn read_table<R: Read>(mut reader: R, options: &ImportOptions) -> SpcalResult<SignalTable> {
    let delimiter = options.delimiter_byte()?;
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let cps = options
        .cps
        .unwrap_or_else(|| header(&text).to_lowercase().contains("cps"));

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());

    let decimal_comma = delimiter != b',';
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); EXPECTED_COLUMNS];
    let mut rows = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        // 更宽的行出现时，新列之前的行补缺失值
        while columns.len() < record.len() {
            columns.push(vec![f64::NAN; rows]);
        }
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(record.get(i).map_or(f64::NAN, |field| parse_field(field, decimal_comma)));
        }
        rows += 1;
    }

    Ok(SignalTable { columns, cps })
}

/// 读取信号文件的全部列
pub fn read_table_file(path: &Path, options: &ImportOptions) -> SpcalResult<SignalTable> {
    let file = std::fs::File::open(path)?;
    read_table(file, options)
}

/// 读取信号文件
pub fn read_signal_file(path: &Path, options: &ImportOptions) -> SpcalResult<SignalData> {
    read_table_file(path, options)?
        .signal(options.column, options.dwelltime)
        .map_err(|e| with_path(e, path))
}

/// 从任意读取器读取信号
pub fn read_signal<R: Read>(reader: R, options: &ImportOptions) -> SpcalResult<SignalData> {
    read_table(reader, options)?.signal(options.column, options.dwelltime)
}

/// 在输入错误中加上文件路径
pub fn with_path(error: SpcalError, path: &Path) -> SpcalError {
    match error {
        SpcalError::InvalidInput(msg) => SpcalError::InvalidInput(format!("{}: {msg}", path.display())),
        other => other,
    }
}

/// 文件头（至多 `HEADER_SCAN_BYTES` 字节，截断在字符边界）
fn header(text: &str) -> &str {
    let mut end = text.len().min(HEADER_SCAN_BYTES);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn parse_field(field: &str, decimal_comma: bool) -> f64 {
    let field = field.trim();
    let parsed = if decimal_comma && field.contains(',') {
        field.replace(',', ".").parse::<f64>()
    } else {
        field.parse::<f64>()
    };
    parsed.unwrap_or(f64::NAN)
}

/// 时间列平均间隔，保留6位小数
fn infer_dwelltime(times: &[f64]) -> Option<f64> {
    let times: Vec<f64> = times.iter().copied().filter(|t| !t.is_nan()).collect();
    if times.len() < 2 {
        return None;
    }
    let mean_diff = (times[times.len() - 1] - times[0]) / (times.len() - 1) as f64;
    let scale = 10f64.powi(DWELLTIME_DECIMALS);
    Some((mean_diff * scale).round() / scale)
}
