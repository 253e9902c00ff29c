//! 工具函数模块
//!
//! 文件路径处理与数值显示等通用工具函数。

/// 文件路径处理工具函数
pub mod path {
    use std::path::Path;

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 提取文件stem（不含扩展名），无法提取时为 "signal"
    #[inline]
    pub fn extract_file_stem_string(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "signal".to_string())
    }

    /// 获取父目录，如果不存在则返回当前目录
    #[inline]
    pub fn get_parent_dir(path: &Path) -> &Path {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// 小写扩展名
    #[inline]
    pub fn extension_lowercase(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
    }
}

/// 数值显示工具函数
pub mod number {
    /// 报告中的数值格式：常规量级直接输出，过大或过小时用科学计数法
    pub fn format_value(value: f64) -> String {
        let magnitude = value.abs();
        if value == 0.0 || (1e-3..1e7).contains(&magnitude) {
            format!("{value}")
        } else if value.is_finite() {
            format!("{value:e}")
        } else {
            "nan".to_string()
        }
    }

    /// 用 `;` 连接多个数值
    pub fn join_values(values: &[f64]) -> String {
        values
            .iter()
            .map(|v| format_value(*v))
            .collect::<Vec<_>>()
            .join(";")
    }
}

pub use number::{format_value, join_values};
pub use path::{extension_lowercase, extract_file_stem_string, extract_filename_lossy, get_parent_dir};
