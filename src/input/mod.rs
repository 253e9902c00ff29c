//! 信号输入模块
//!
//! 分隔文本读取、单位换算与按角色参数化的输入收集器。

pub mod collector;
pub mod reader;
pub mod units;

pub use collector::{
    InputCollector, InputRole, InstrumentParameters, ReferenceCalibration, ReferenceParameters,
    Trim, TrimPolicy, calibrate_reference,
};
pub use reader::{
    ImportOptions, SignalData, SignalTable, read_signal, read_signal_file, read_table, read_table_file,
};
pub use units::{PhysicalValue, Quantity, parse_quantity};
