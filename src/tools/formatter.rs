//! 结果格式化与导出
//!
//! 导出文件由 `#` 开头的元数据行与逐事件的 `(signal, mass, size)` 数据行组成；
//! 批处理汇总以终端表格显示。

use super::utils::{format_value, join_values};
use crate::core::calibration::CalibratedResults;
use crate::error::{SpcalResult, format_error};
use crate::processing::batch_state::BatchSummary;
use crate::processing::pipeline::ElementReport;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 数据行表头
pub const DATA_HEADER: [&str; 3] = ["Signal (counts)", "Mass (kg)", "Size (m)"];

/// 写出单个元素的导出文件（必要时创建输出目录）
pub fn write_report(path: &Path, report: &ElementReport) -> SpcalResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    format_report(&mut writer, report)?;
    writer.flush()?;
    log::debug!("导出 / exported: {}", path.display());
    Ok(())
}

/// 把导出内容写入任意输出
pub fn format_report<W: Write>(mut writer: W, report: &ElementReport) -> SpcalResult<()> {
    for line in metadata_lines(report) {
        writeln!(writer, "# {line}")?;
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(DATA_HEADER)?;

    let calibration = report.calibration.as_ref();
    for (i, signal) in report.detections.sums.iter().enumerate() {
        let mass = calibration.map(|c| format_value(c.masses[i])).unwrap_or_default();
        let size = calibration.map(|c| format_value(c.sizes[i])).unwrap_or_default();
        csv_writer.write_record([format_value(*signal), mass, size])?;
    }
    csv_writer
        .flush()
        .map_err(|e| format_error("写入导出数据失败 / writing export rows", e))?;
    Ok(())
}

/// 元数据行（不含 `# ` 前缀）
pub fn metadata_lines(report: &ElementReport) -> Vec<String> {
    let mut lines = vec![
        format!("spcal-batch v{VERSION} export"),
        format!("Date,{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")),
        format!("File,{}", report.file.display()),
        format!("Element,{}", report.element),
        format!("Acquisition events,{}", report.events),
        format!(
            "Detected particles,{},±,{}",
            report.count(),
            format_value(report.detections.count_uncertainty())
        ),
        format!("Limit method,{}", report.limits.describe()),
    ];

    if let Some(background) = report.background {
        lines.push(format!("Background,{},counts", format_value(background)));
    }

    match &report.calibration {
        Some(calibration) => calibrated_lines(calibration, &mut lines),
        None => {
            lines.push(format!(
                "Limit of detection,{},counts",
                join_values(&report.limits.ld.summarize())
            ));
            lines.push("Calibration,omitted".to_string());
        }
    }

    let params = &report.calibration_inputs;
    let inputs = [
        ("density", params.density, "kg/m³"),
        ("dwelltime", params.dwelltime, "s"),
        ("efficiency", params.efficiency, ""),
        ("flowrate", params.flowrate, "L/s"),
        ("response", params.response, "counts/(kg/L)"),
        ("mass_response", params.mass_response, "kg/count"),
        ("molar_mass", params.molar_mass, "kg/mol"),
        ("cell_diameter", params.cell_diameter, "m"),
        ("time", params.time, "s"),
        ("mass_fraction", Some(params.mass_fraction), ""),
    ];
    for (name, value, unit) in inputs {
        if let Some(value) = value {
            lines.push(format!("Input,{name},{},{unit}", format_value(value)));
        }
    }

    lines
}

fn calibrated_lines(calibration: &CalibratedResults, lines: &mut Vec<String>) {
    lines.push(format!("Calibration model,{}", calibration.model.as_str()));
    if let Some(size) = calibration.background_size {
        lines.push(format!("Background size,{},m", format_value(size)));
    }
    lines.push(format!("Limit of detection,{},counts", join_values(&calibration.lod)));
    lines.push(format!("Limit of detection,{},kg", join_values(&calibration.lod_mass)));
    lines.push(format!("Limit of detection,{},m", join_values(&calibration.lod_size)));

    if let Some(number) = calibration.number_concentration {
        lines.push(format!("Number concentration,{},#/L", format_value(number)));
    }
    if let Some(concentration) = calibration.concentration {
        lines.push(format!("Concentration,{},kg/L", format_value(concentration)));
    }
    if let Some(ionic) = calibration.ionic_background {
        lines.push(format!("Ionic background,{},kg/L", format_value(ionic)));
    }
    if let Some(mean) = calibration.mean_size() {
        lines.push(format!("Mean size,{},m", format_value(mean)));
    }
    if let Some(median) = calibration.median_size() {
        lines.push(format!("Median size,{},m", format_value(median)));
    }
    if let Some(atoms) = &calibration.atoms
        && !atoms.is_empty()
    {
        let mean = atoms.iter().sum::<f64>() / atoms.len() as f64;
        lines.push(format!("Mean atoms per particle,{}", format_value(mean)));
    }
    if let Some(lod) = &calibration.lod_cell_concentration {
        lines.push(format!("Cell concentration LOD,{},mol/L", join_values(lod)));
    }
}

/// 批处理汇总表
pub fn render_summary_table(summary: &BatchSummary) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Status / 状态", "Files / 文件数"]);

    let rows = [
        ("Total / 总数", summary.total),
        ("Processed / 成功", summary.processed),
        ("Failed / 失败", summary.failed),
        ("Cancelled / 取消", summary.cancelled),
    ];
    for (name, count) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }

    let mut output = table.to_string();
    for (category, files) in &summary.error_stats {
        output.push_str(&format!("\n{}: {}", category.display_name(), files.join(", ")));
    }
    output
}
