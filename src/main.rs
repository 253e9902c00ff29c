//! spcal-batch - 主程序入口
//!
//! 纯流程控制器：解析参数、加载配置、扫描文件，然后交给批处理编排器。

use anyhow::{Context, anyhow};
use spcal::{
    core::ElementTable,
    error::{ErrorCategory, SpcalError},
    processing::{BatchJob, BatchOrchestrator, JobStatus, calibrate_from_reference},
    tools::{self, AppConfig},
};
use std::process;

/// 错误退出码定义
mod exit_codes {
    /// 通用错误
    pub const GENERAL_ERROR: i32 = 1;
    /// 输入/格式错误
    pub const INPUT_ERROR: i32 = 2;
    /// 参数错误
    pub const PARAMETER_ERROR: i32 = 3;
    /// 计算错误
    pub const CALCULATION_ERROR: i32 = 4;
    /// 资源/并发错误
    pub const RESOURCE_ERROR: i32 = 5;
}

/// 获取错误建议文本
fn get_error_suggestion(error: &SpcalError) -> &'static str {
    match error {
        SpcalError::MissingCalibration(_) => {
            "在配置文件的 instrument/elements 中补全校准参数 / Add the missing calibration inputs to the instrument or elements section of the config"
        }
        SpcalError::ResourceError(_) => {
            "资源不可用，请降低并发度（--parallel-files 1）后重试 / Resource unavailable, retry with --parallel-files 1"
        }
        _ => match ErrorCategory::from_error(error) {
            ErrorCategory::Input => {
                "检查输入文件是否包含数值数据，使用 --help 查看完整用法 / Check that the input contains numeric data, use --help for usage"
            }
            ErrorCategory::Parameters => {
                "检查阈值方法、σ、α/β 与输出名模式 / Check limit method, sigma, alpha/beta and the output name pattern"
            }
            ErrorCategory::Io => {
                "检查文件路径是否正确，文件是否存在且可读 / Check if file path is correct, file exists and is readable"
            }
            ErrorCategory::Format => {
                "检查配置文件JSON语法与分隔符设置 / Check the config JSON syntax and delimiter setting"
            }
            ErrorCategory::Calculation => {
                "计算结果非有限，请检查校准参数的量级 / Non-finite result, check the magnitude of calibration inputs"
            }
            ErrorCategory::Other => {
                "请检查输入文件和参数设置 / Please check input file and parameter settings"
            }
        },
    }
}

/// 错误处理和建议
fn handle_error(error: anyhow::Error) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error:#}");

    let Some(error) = error.downcast_ref::<SpcalError>() else {
        process::exit(exit_codes::GENERAL_ERROR);
    };

    eprintln!("[INFO] 建议 / Suggestion: {}", get_error_suggestion(error));

    let exit_code = match error {
        SpcalError::ResourceError(_) => exit_codes::RESOURCE_ERROR,
        _ => match ErrorCategory::from_error(error) {
            ErrorCategory::Input | ErrorCategory::Format => exit_codes::INPUT_ERROR,
            ErrorCategory::Parameters => exit_codes::PARAMETER_ERROR,
            ErrorCategory::Calculation => exit_codes::CALCULATION_ERROR,
            ErrorCategory::Io | ErrorCategory::Other => exit_codes::GENERAL_ERROR,
        },
    };

    process::exit(exit_code);
}

fn init_logging(config: &AppConfig) {
    let level = if config.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run() -> anyhow::Result<()> {
    let cli = tools::parse_args();
    init_logging(&cli);
    tools::show_startup_info(&cli);

    let config = cli
        .batch_config()
        .context("加载配置失败 / loading configuration")?;
    let table = ElementTable::builtin();
    let mut resolved = config.resolve(&table)?;

    let files = tools::scan_input_files(&cli.inputs)?;
    if files.is_empty() {
        println!("[WARNING] 没有找到信号文件 / No signal files found (.csv, .txt, .text)");
        return Ok(());
    }
    println!("[INFO] 找到 {} 个信号文件 / Found {} signal files", files.len(), files.len());

    if let Some(reference) = &resolved.reference {
        match calibrate_from_reference(reference, &resolved.settings) {
            Ok(result) => {
                println!(
                    "[INFO] 参考颗粒 / Reference: mass response = {:e} kg/count",
                    result.mass_response
                );
                for element in &mut resolved.elements {
                    element.apply_reference(&result);
                }
            }
            Err(e) => eprintln!("[WARNING] 参考颗粒校准失败 / Reference calibration failed: {e}"),
        }
    }

    let jobs = BatchJob::plan(
        &files,
        &resolved.elements,
        &resolved.output_name,
        resolved.output_dir.as_deref(),
    )?;
    let total = jobs.len();

    let handle = BatchOrchestrator::new(resolved.settings)
        .with_parallel_files(resolved.parallel_files)
        .spawn(jobs)?;

    for (done, outcome) in handle.outcomes().iter().enumerate() {
        let name = outcome.filename();
        match &outcome.status {
            JobStatus::Done {
                outputs,
                detections,
            } => {
                println!(
                    "[OK] ({}/{total}) {name}: {} 颗粒 / particles",
                    done + 1,
                    detections.iter().sum::<usize>()
                );
                if cli.verbose {
                    for output in outputs {
                        println!("     → {}", output.display());
                    }
                }
            }
            JobStatus::Failed { stage, error } => {
                println!("[FAIL] ({}/{total}) {name} [{stage}]: {error}", done + 1);
            }
            JobStatus::Cancelled => {
                println!("[WARNING] ({}/{total}) {name}: 已取消 / cancelled", done + 1);
            }
        }
    }

    let summary = handle.join()?;
    println!();
    println!("{}", tools::render_summary_table(&summary));

    if summary.failed > 0 {
        return Err(anyhow!(
            "{} 个文件处理失败 / {} file(s) failed",
            summary.failed,
            summary.failed
        ));
    }
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        handle_error(error);
    }
}
