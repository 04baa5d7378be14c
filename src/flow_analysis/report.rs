use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{StringRecord, WriterBuilder};
use log::{debug, info};

use super::classifier::FlowLabels;
use super::statistics::AnalysisSummary;
use super::types::FlowTable;
use crate::error_handling::types::AnalyzerError;

pub const CLASSIFIED_FILE: &str = "flows_classified.csv";
pub const SUMMARY_FILE: &str = "summary.json";

pub const DERIVED_COLUMNS: [&str; 4] =
    ["flow_type", "timing_category", "traffic_pattern", "is_periodic"];

/// Files produced by one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub classified: PathBuf,
    pub summary: PathBuf,
}

fn derived_cells(labels: &FlowLabels) -> [&'static str; 4] {
    [
        labels.flow_type.label(),
        labels.timing_category.map(|t| t.label()).unwrap_or(""),
        labels.traffic_pattern.label(),
        if labels.is_periodic { "true" } else { "false" },
    ]
}

/// Writes every source row followed by its derived labels.
pub fn write_classified<W: Write>(
    sink: W,
    table: &FlowTable,
    labels: &[FlowLabels],
) -> Result<(), AnalyzerError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(sink);

    let mut header = table.headers.clone();
    for column in DERIVED_COLUMNS {
        header.push_field(column);
    }
    writer.write_record(&header)?;

    for (row, labels) in table.rows.iter().zip(labels.iter()) {
        let mut record: StringRecord = row.raw.clone();
        for cell in derived_cells(labels) {
            record.push_field(cell);
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `flows_classified.csv` and `summary.json` into `output_dir`,
/// creating the directory if needed.
pub fn write_reports(
    output_dir: &Path,
    table: &FlowTable,
    labels: &[FlowLabels],
    summary: &AnalysisSummary,
) -> Result<ReportPaths, AnalyzerError> {
    fs::create_dir_all(output_dir)?;

    let classified = output_dir.join(CLASSIFIED_FILE);
    write_classified(fs::File::create(&classified)?, table, labels)?;
    debug!("Wrote {} classified row(s) to {}", table.len(), classified.display());

    let summary_path = output_dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&summary_path, json)?;
    info!("Summary saved to {}", summary_path.display());

    Ok(ReportPaths {
        classified,
        summary: summary_path,
    })
}
