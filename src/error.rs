//! 统一错误处理框架
//!
//! 检测、阈值与校准引擎共用的错误类型定义。

use std::fmt;
use std::io;

/// 信号分析相关的统一错误类型
#[derive(Debug)]
pub enum SpcalError {
    /// 输入无效：空信号、无数值数据、裁切后无剩余样本
    InvalidInput(String),

    /// 参数无效：未知的阈值方法、临界值大于检出限等前置条件违例
    InvalidParameters(String),

    /// 文件I/O错误
    IoError(io::Error),

    /// 文本格式错误（分隔符、列、配置文件语法）
    FormatError(String),

    /// 计算异常（非有限结果等）
    CalculationError(String),

    /// 缺少校准所需的物理参数
    MissingCalibration(String),

    /// 资源访问错误（线程池、通道）
    ResourceError(String),
}

impl fmt::Display for SpcalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpcalError::InvalidInput(msg) => write!(f, "输入无效 / Invalid input: {msg}"),
            SpcalError::InvalidParameters(msg) => {
                write!(f, "参数无效 / Invalid parameters: {msg}")
            }
            SpcalError::IoError(err) => write!(f, "文件I/O错误 / I/O error: {err}"),
            SpcalError::FormatError(msg) => write!(f, "格式错误 / Format error: {msg}"),
            SpcalError::CalculationError(msg) => {
                write!(f, "计算异常 / Calculation error: {msg}")
            }
            SpcalError::MissingCalibration(msg) => {
                write!(f, "缺少校准参数 / Missing calibration input: {msg}")
            }
            SpcalError::ResourceError(msg) => write!(f, "资源访问错误 / Resource error: {msg}"),
        }
    }
}

impl std::error::Error for SpcalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpcalError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SpcalError {
    fn from(err: io::Error) -> Self {
        SpcalError::IoError(err)
    }
}

impl From<csv::Error> for SpcalError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io_err) => SpcalError::IoError(io_err),
                other => SpcalError::FormatError(format!("{other:?}")),
            }
        } else {
            SpcalError::FormatError(format!("分隔文本解析失败 / delimited text: {err}"))
        }
    }
}

impl From<serde_json::Error> for SpcalError {
    fn from(err: serde_json::Error) -> Self {
        SpcalError::FormatError(format!("配置文件解析失败 / config: {err}"))
    }
}

/// 分析操作的标准Result类型
pub type SpcalResult<T> = Result<T, SpcalError>;

// ==================== 错误转换Helper函数 ====================

/// 创建格式错误的helper函数
#[inline]
pub fn format_error<E: fmt::Display>(context: &str, err: E) -> SpcalError {
    SpcalError::FormatError(format!("{context}: {err}"))
}

// ==================== 错误分类系统 ====================
// 用于批量处理中的错误统计和退出码映射

/// 错误类别枚举（用于批量处理统计）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// 输入数据问题（空信号、无数值）
    Input,
    /// 参数/前置条件违例
    Parameters,
    /// I/O相关错误（文件不存在、权限不足等）
    Io,
    /// 文本/配置格式错误
    Format,
    /// 计算相关错误
    Calculation,
    /// 其他未分类错误
    Other,
}

impl ErrorCategory {
    /// 从SpcalError提取错误类别
    pub fn from_error(e: &SpcalError) -> Self {
        match e {
            SpcalError::InvalidInput(_) => Self::Input,
            SpcalError::InvalidParameters(_) => Self::Parameters,
            SpcalError::IoError(_) => Self::Io,
            SpcalError::FormatError(_) => Self::Format,
            SpcalError::CalculationError(_) => Self::Calculation,
            SpcalError::MissingCalibration(_) | SpcalError::ResourceError(_) => Self::Other,
        }
    }

    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Input => "输入错误 / Input",
            Self::Parameters => "参数错误 / Parameters",
            Self::Io => "I/O错误 / I/O",
            Self::Format => "格式错误 / Format",
            Self::Calculation => "计算错误 / Calculation",
            Self::Other => "其他错误 / Other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        let cases = [
            (SpcalError::InvalidInput("empty".into()), ErrorCategory::Input),
            (
                SpcalError::InvalidParameters("lc > ld".into()),
                ErrorCategory::Parameters,
            ),
            (
                SpcalError::IoError(io::Error::new(io::ErrorKind::NotFound, "x")),
                ErrorCategory::Io,
            ),
            (SpcalError::FormatError("bad".into()), ErrorCategory::Format),
            (
                SpcalError::CalculationError("nan".into()),
                ErrorCategory::Calculation,
            ),
            (
                SpcalError::ResourceError("pool".into()),
                ErrorCategory::Other,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ErrorCategory::from_error(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_io_error_source() {
        let err: SpcalError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_format_helper_keeps_context() {
        let err = format_error("第3行", "not a number");
        assert!(matches!(err, SpcalError::FormatError(ref m) if m.contains("第3行")));
    }
}
