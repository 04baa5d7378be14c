use log::info;

use super::classifier::FlowLabels;
use super::loader::load_flow_data;
use super::report::{write_reports, ReportPaths};
use super::statistics::{summarize, AnalysisSummary, LabelCount, STRONG_CORRELATION};
use crate::configuration::AnalyzerConfig;
use crate::error_handling::types::AnalyzerError;

/// Outcome of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub summary: AnalysisSummary,
    pub reports: ReportPaths,
}

pub struct FlowAnalyzer {
    config: AnalyzerConfig,
}

impl FlowAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Loads, labels, summarises and writes the reports.
    pub fn run(&self) -> Result<AnalysisOutcome, AnalyzerError> {
        let table = load_flow_data(&self.config.input)?;
        let labels: Vec<FlowLabels> = table.records().map(FlowLabels::for_record).collect();
        let summary = summarize(&table, &labels);

        log_summary(&summary);

        let reports = write_reports(&self.config.output_dir, &table, &labels, &summary)?;
        info!(
            "=== Analysis complete. Classified flows saved to {} ===",
            reports.classified.display()
        );
        Ok(AnalysisOutcome { summary, reports })
    }
}

fn fmt_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "n/a".to_string(),
    }
}

fn log_counts(counts: &[LabelCount]) {
    for entry in counts {
        info!("  {:<16} {}", entry.label, entry.count);
    }
}

fn log_summary(summary: &AnalysisSummary) {
    let basic = &summary.basic;
    info!("=== Basic Flow Statistics ===");
    info!("Total flows: {}", basic.total_flows);
    info!("Unique source IPs: {}", basic.unique_src_ips);
    info!("Unique destination IPs: {}", basic.unique_dst_ips);
    info!("Protocol distribution:");
    log_counts(&basic.protocols);

    info!("=== Flow Duration Statistics ===");
    info!("Mean duration: {}s", fmt_value(basic.duration.map(|d| d.mean), 4));
    info!("Max duration: {}s", fmt_value(basic.duration.map(|d| d.max), 4));
    info!("Min duration: {}s", fmt_value(basic.duration.map(|d| d.min), 4));

    info!("=== Flow Classification ===");
    log_counts(&summary.flow_types);

    info!("=== Timing Pattern Analysis ===");
    info!("Timing distribution:");
    log_counts(&summary.timing_categories);
    info!("Traffic pattern:");
    log_counts(&summary.traffic_patterns);

    let sizes = &summary.packet_sizes;
    info!("=== Packet Size Analysis ===");
    info!("Average forward packet size: {}", fmt_value(sizes.mean_fwd, 2));
    info!("Average backward packet size: {}", fmt_value(sizes.mean_bwd, 2));
    info!("Overall average packet size: {}", fmt_value(sizes.mean_overall, 2));
    info!("Small packet flows (auth/control): {}", sizes.small);
    info!("Medium packet flows (API calls): {}", sizes.medium);
    info!("Large packet flows (data transfer): {}", sizes.large);

    let periodic = &summary.periodic;
    info!("=== Periodic Traffic Detection ===");
    info!("Periodic/polling flows detected: {}", periodic.count);
    if periodic.count > 0 {
        info!("  Mean interval: {}s", fmt_value(periodic.mean_interval, 4));
        info!("  Mean packet size: {}", fmt_value(periodic.mean_packet_size, 2));
    }

    info!("=== Feature Correlations ===");
    info!("Strong correlations (> {}):", STRONG_CORRELATION);
    for c in &summary.correlations {
        info!("  {} <-> {}: {:.3}", c.first, c.second, c.coefficient);
    }
}
