//! 文件扫描模块
//!
//! 收集待处理的信号文件，并由输出名模式生成导出路径。

use super::constants::defaults::{FORBIDDEN_NAME_CHARS, INPUT_EXTENSIONS};
use super::utils;
use crate::error::{SpcalError, SpcalResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 展开输入路径：文件直接保留，目录扫描其中（不递归）扩展名匹配的文件
///
/// 结果排序并去重。
pub fn scan_input_files(inputs: &[PathBuf]) -> SpcalResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if !input.exists() {
            return Err(SpcalError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("路径不存在 / path not found: {}", input.display()),
            )));
        }

        if input.is_file() {
            files.push(input.clone());
            continue;
        }

        files.extend(
            WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|path| is_signal_file(path)),
        );
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_signal_file(path: &Path) -> bool {
    utils::extension_lowercase(path).is_some_and(|ext| INPUT_EXTENSIONS.contains(&ext.as_str()))
}

/// 校验输出名模式：必须包含 `%`，且不含非法字符
pub fn validate_output_name(pattern: &str) -> SpcalResult<()> {
    if !pattern.contains('%') {
        return Err(SpcalError::InvalidParameters(format!(
            "输出名模式必须包含 '%' / output name must contain '%': {pattern}"
        )));
    }
    if let Some(c) = pattern.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(*c)) {
        return Err(SpcalError::InvalidParameters(format!(
            "输出名模式包含非法字符 '{c}' / output name contains forbidden character"
        )));
    }
    Ok(())
}

/// 由输入文件与模式生成导出路径，`%` 替换为输入文件stem
///
/// 未指定输出目录时写在输入文件旁。
pub fn output_path_for(input: &Path, pattern: &str, output_dir: Option<&Path>) -> SpcalResult<PathBuf> {
    validate_output_name(pattern)?;
    let name = pattern.replace('%', &utils::extract_file_stem_string(input));
    let dir = output_dir.unwrap_or_else(|| utils::get_parent_dir(input));
    Ok(dir.join(name))
}
