//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 阈值估计常量
pub mod limits {
    /// Gaussian阈值的默认倍数
    pub const DEFAULT_SIGMA: f64 = 3.0;

    /// 默认假阳性率 α
    pub const DEFAULT_ALPHA: f64 = 0.05;

    /// 默认假阴性率 β
    pub const DEFAULT_BETA: f64 = 0.05;

    /// Automatic 方法切换点
    ///
    /// 背景均值达到该值后，Poisson统计可用Gaussian近似
    pub const GAUSSIAN_CUTOVER_MEAN: f64 = 50.0;

    /// 低计数修正生效的背景均值上限
    pub const LOW_COUNT_THRESHOLD: f64 = 5.0;

    /// 低计数修正量（Currie 2008）
    pub const LOW_COUNT_EPSILON: f64 = 0.5;
}

/// 物理常量
pub mod physics {
    /// 阿伏伽德罗常数（/mol）
    pub const AVOGADRO: f64 = 6.022_140_76e23;

    /// 立方米到升
    pub const LITRES_PER_CUBIC_METRE: f64 = 1000.0;
}

/// 输入读取常量
pub mod input {
    /// 由时间列推断驻留时间时保留的小数位数
    pub const DWELLTIME_DECIMALS: i32 = 6;

    /// 识别CPS数据时读取的文件头长度（字节）
    pub const HEADER_SCAN_BYTES: usize = 1024;

    /// 期望的列数（时间 + 响应）
    pub const EXPECTED_COLUMNS: usize = 2;
}

/// 默认配置值
pub mod defaults {
    /// 默认输出文件名模式，'%' 替换为输入文件名
    pub const OUTPUT_NAME_PATTERN: &str = "%_result.csv";

    /// 输出文件名中不允许出现的字符
    pub const FORBIDDEN_NAME_CHARS: &str = "<>:/\\|?*";

    /// 默认输入文件扩展名
    pub const INPUT_EXTENSIONS: &[&str] = &["csv", "txt", "text"];

    /// 默认多文件并行并发度（1 = 串行）
    pub const PARALLEL_FILES_DEGREE: usize = 1;
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 单文件计算量有限，超过16并发只会增加调度开销
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}
