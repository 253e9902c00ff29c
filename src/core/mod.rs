//! 核心算法模块
//!
//! 阈值估计、事件检测与物理量换算。全部为纯函数，可跨文件/跨元素并发调用。

pub mod calibration;
pub mod detection;
pub mod elements;
pub mod limits;
pub mod poisson;
pub mod rolling;

// 重新导出公共接口
pub use calibration::{CalibratedResults, CalibrationModel, CalibrationParameters, calibrate};
pub use detection::{DetectionEvent, DetectionResult, accumulate};
pub use elements::{ElementData, ElementTable};
pub use limits::{
    LimitMethod, LimitOptions, LimitSet, ResolvedMethod, Threshold, calculate_limits,
    manual_limits,
};
pub use poisson::{CurrieLimits, poisson_limits};
pub use rolling::{RollingBackend, RollingBackendKind, RollingStatistics};
