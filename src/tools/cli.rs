//! 命令行接口模块
//!
//! 负责命令行参数解析与程序信息展示。命令行参数覆盖配置文件中的同名设置。

use super::config::BatchConfig;
use crate::core::limits::LimitMethod;
use crate::error::{SpcalError, SpcalResult};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 命令行配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// 输入文件或目录
    pub inputs: Vec<PathBuf>,
    /// JSON配置文件
    pub config: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_name: Option<String>,
    pub method: Option<LimitMethod>,
    pub sigma: Option<f64>,
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub window: Option<usize>,
    pub manual: Option<f64>,
    pub parallel_files: Option<usize>,
    /// 是否显示详细信息
    pub verbose: bool,
}

impl AppConfig {
    /// 把命令行设置写入配置
    pub fn apply_overrides(&self, config: &mut BatchConfig) {
        if let Some(method) = self.method {
            config.limit_method = method;
        }
        if let Some(sigma) = self.sigma {
            config.limit_sigma = sigma;
        }
        if let Some(alpha) = self.alpha {
            config.limit_error_rates.0 = alpha;
        }
        if let Some(beta) = self.beta {
            config.limit_error_rates.1 = beta;
        }
        if self.window.is_some() {
            config.limit_window = self.window;
        }
        if self.manual.is_some() {
            config.limit_manual_value = self.manual;
        }
        if let Some(name) = &self.output_name {
            config.output_name = name.clone();
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir.clone();
        }
        if let Some(degree) = self.parallel_files {
            config.parallel_files = degree;
        }
    }

    /// 读取配置文件（未指定时为默认配置）并应用命令行覆盖
    pub fn batch_config(&self) -> SpcalResult<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::load(path)?,
            None => BatchConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }
}

fn build_command() -> Command {
    Command::new("spcal-batch")
        .version(VERSION)
        .about(DESCRIPTION)
        .author("SPCal Team")
        .arg(
            Arg::new("INPUT")
                .help("信号文件或目录（扫描 .csv/.txt/.text） / signal files or directories")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON批处理配置文件 / JSON batch configuration")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('o')
                .help("导出目录（默认与输入文件相同） / export directory")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output-name")
                .long("output-name")
                .help("导出文件名模式，'%' 替换为输入文件名 / output name pattern")
                .value_name("PATTERN"),
        )
        .arg(
            Arg::new("method")
                .long("method")
                .short('m')
                .help("阈值方法: Automatic, Highest, Gaussian, Gaussian Median, Poisson")
                .value_name("METHOD")
                .value_parser(LimitMethod::from_str),
        )
        .arg(
            Arg::new("sigma")
                .long("sigma")
                .help("Gaussian阈值倍数 / Gaussian sigma")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("alpha")
                .long("alpha")
                .help("假阳性率 α / false positive rate")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("beta")
                .long("beta")
                .help("假阴性率 β / false negative rate")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new("window")
                .long("window")
                .short('w')
                .help("滑动阈值窗口（样本数） / rolling limit window")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("manual")
                .long("manual")
                .help("手动阈值（counts），忽略阈值方法 / manual limit")
                .value_parser(value_parser!(f64))
                .allow_negative_numbers(true),
        )
        .arg(
            Arg::new("parallel-files")
                .long("parallel-files")
                .short('j')
                .help("并行处理的文件数（1-16，默认串行） / files processed in parallel")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息 / verbose output")
                .action(ArgAction::SetTrue),
        )
}

fn config_from_matches(matches: &ArgMatches) -> AppConfig {
    AppConfig {
        inputs: matches
            .get_many::<PathBuf>("INPUT")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        config: matches.get_one::<PathBuf>("config").cloned(),
        output_dir: matches.get_one::<PathBuf>("output-dir").cloned(),
        output_name: matches.get_one::<String>("output-name").cloned(),
        method: matches.get_one::<LimitMethod>("method").copied(),
        sigma: matches.get_one::<f64>("sigma").copied(),
        alpha: matches.get_one::<f64>("alpha").copied(),
        beta: matches.get_one::<f64>("beta").copied(),
        window: matches.get_one::<usize>("window").copied(),
        manual: matches.get_one::<f64>("manual").copied(),
        parallel_files: matches.get_one::<usize>("parallel-files").copied(),
        verbose: matches.get_flag("verbose"),
    }
}

/// 解析命令行参数（出错时由clap打印用法并退出）
pub fn parse_args() -> AppConfig {
    config_from_matches(&build_command().get_matches())
}

/// 从给定参数解析，出错时返回 `InvalidInput`
pub fn parse_args_from<I, T>(args: I) -> SpcalResult<AppConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command()
        .try_get_matches_from(args)
        .map_err(|e| SpcalError::InvalidInput(e.to_string()))?;
    Ok(config_from_matches(&matches))
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    println!("[INFO] spcal-batch v{VERSION}");
    if config.verbose {
        println!("[INFO] {DESCRIPTION}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let config = parse_args_from([
            "spcal-batch",
            "a.csv",
            "data",
            "--method",
            "Gaussian Median",
            "--sigma",
            "4",
            "--window",
            "101",
            "-j",
            "4",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from("a.csv"), PathBuf::from("data")]);
        assert_eq!(config.method, Some(LimitMethod::GaussianMedian));
        assert_eq!(config.sigma, Some(4.0));
        assert_eq!(config.window, Some(101));
        assert_eq!(config.parallel_files, Some(4));
        assert!(config.verbose);
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(matches!(
            parse_args_from(["spcal-batch", "a.csv", "--method", "Median"]),
            Err(SpcalError::InvalidInput(_))
        ));
        assert!(parse_args_from(["spcal-batch"]).is_err());
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let cli = parse_args_from([
            "spcal-batch",
            "a.csv",
            "--alpha",
            "0.001",
            "--manual",
            "12.5",
            "--output-name",
            "%_spcal.csv",
        ])
        .unwrap();
        let mut config = BatchConfig {
            limit_window: Some(51),
            ..BatchConfig::default()
        };
        cli.apply_overrides(&mut config);
        assert_eq!(config.limit_error_rates, (0.001, 0.05));
        assert_eq!(config.limit_manual_value, Some(12.5));
        assert_eq!(config.limit_window, Some(51));
        assert_eq!(config.output_name, "%_spcal.csv");
    }
}
