//! 工具模块集合
//!
//! 包含CLI、配置文件、文件扫描、结果导出等工具模块，支持main.rs的流程控制。

pub mod cli;
pub mod config;
pub mod constants;
pub mod formatter;
pub mod scanner;
pub mod utils;

// 重新导出主要的公共接口
pub use cli::{AppConfig, parse_args, parse_args_from, show_startup_info};
pub use config::{BatchConfig, ElementConfig, InstrumentConfig, ReferenceConfig, ResolvedConfig};
pub use formatter::{format_report, render_summary_table, write_report};
pub use scanner::{output_path_for, scan_input_files, validate_output_name};
pub use utils::path;
