//! Aggregate statistics over a labelled flow table.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use statrs::statistics::{Data, Distribution, Max, Min};

use super::classifier::{FlowLabels, PacketSizeBand};
use super::types::{FlowRecord, FlowTable};

/// Pairs whose absolute coefficient exceeds this are reported.
pub const STRONG_CORRELATION: f64 = 0.7;

type Column = (&'static str, fn(&FlowRecord) -> f64);

const CORRELATION_COLUMNS: [Column; 6] = [
    ("flow_duration", |r: &FlowRecord| r.flow_duration),
    ("pkt_size_avg", |r: &FlowRecord| r.pkt_size_avg),
    ("flow_byts_s", |r: &FlowRecord| r.flow_byts_s),
    ("flow_iat_mean", |r: &FlowRecord| r.flow_iat_mean),
    ("tot_fwd_pkts", |r: &FlowRecord| r.tot_fwd_pkts),
    ("tot_bwd_pkts", |r: &FlowRecord| r.tot_bwd_pkts),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl ValueSummary {
    /// `None` when every value is `NaN`.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        if values.is_empty() {
            return None;
        }
        let data = Data::new(values);
        Some(Self {
            mean: data.mean().unwrap_or(f64::NAN),
            min: data.min(),
            max: data.max(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicStats {
    pub total_flows: usize,
    pub unique_src_ips: usize,
    pub unique_dst_ips: usize,
    pub protocols: Vec<LabelCount>,
    pub duration: Option<ValueSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketSizeStats {
    pub mean_fwd: Option<f64>,
    pub mean_bwd: Option<f64>,
    pub mean_overall: Option<f64>,
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodicSummary {
    pub count: usize,
    pub mean_interval: Option<f64>,
    pub mean_packet_size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub basic: BasicStats,
    pub flow_types: Vec<LabelCount>,
    pub timing_categories: Vec<LabelCount>,
    pub traffic_patterns: Vec<LabelCount>,
    pub packet_sizes: PacketSizeStats,
    pub periodic: PeriodicSummary,
    pub correlations: Vec<Correlation>,
}

/// Counts occurrences, most frequent first and ties by label.
pub fn distribution<I, S>(values: I) -> Vec<LabelCount>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.into()).or_default() += 1;
    }
    let mut result: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    result
}

/// Mean ignoring `NaN` cells.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    ValueSummary::of(values).map(|s| s.mean)
}

/// Pearson coefficient over the pairs where both values are finite.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();
    let n = xs.len();
    if n < 2 {
        return None;
    }

    let x_data = Data::new(xs.clone());
    let y_data = Data::new(ys.clone());
    let (mx, my) = (x_data.mean()?, y_data.mean()?);
    let (sx, sy) = (x_data.std_dev()?, y_data.std_dev()?);
    if sx == 0.0 || sy == 0.0 {
        return None;
    }

    let covariance: f64 = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / (n - 1) as f64;
    Some((covariance / (sx * sy)).clamp(-1.0, 1.0))
}

fn strong_correlations(records: &[&FlowRecord]) -> Vec<Correlation> {
    let columns: Vec<(&str, Vec<f64>)> = CORRELATION_COLUMNS
        .iter()
        .map(|(name, get)| (*name, records.iter().map(|r| get(r)).collect()))
        .collect();

    let mut found = Vec::new();
    for (i, (first, xs)) in columns.iter().enumerate() {
        for (second, ys) in columns.iter().skip(i + 1) {
            if let Some(r) = pearson(xs, ys) {
                if r.abs() > STRONG_CORRELATION {
                    found.push(Correlation {
                        first: first.to_string(),
                        second: second.to_string(),
                        coefficient: r,
                    });
                }
            }
        }
    }
    found
}

/// `labels` must be parallel to `table.rows`.
pub fn summarize(table: &FlowTable, labels: &[FlowLabels]) -> AnalysisSummary {
    let records: Vec<&FlowRecord> = table.records().collect();

    // Blank cells are missing values, not a distinct address or protocol.
    let present = |value: &&str| !value.is_empty();
    let unique_src: HashSet<&str> = records
        .iter()
        .map(|r| r.src_ip.as_str())
        .filter(present)
        .collect();
    let unique_dst: HashSet<&str> = records
        .iter()
        .map(|r| r.dst_ip.as_str())
        .filter(present)
        .collect();
    let basic = BasicStats {
        total_flows: records.len(),
        unique_src_ips: unique_src.len(),
        unique_dst_ips: unique_dst.len(),
        protocols: distribution(records.iter().map(|r| r.protocol.as_str()).filter(present)),
        duration: ValueSummary::of(records.iter().map(|r| r.flow_duration)),
    };

    let mut packet_sizes = PacketSizeStats {
        mean_fwd: mean(records.iter().map(|r| r.fwd_pkt_len_mean)),
        mean_bwd: mean(records.iter().map(|r| r.bwd_pkt_len_mean)),
        mean_overall: mean(records.iter().map(|r| r.pkt_size_avg)),
        small: 0,
        medium: 0,
        large: 0,
    };
    for record in &records {
        match PacketSizeBand::from_avg(record.pkt_size_avg) {
            Some(PacketSizeBand::Small) => packet_sizes.small += 1,
            Some(PacketSizeBand::Medium) => packet_sizes.medium += 1,
            Some(PacketSizeBand::Large) => packet_sizes.large += 1,
            None => {}
        }
    }

    let periodic: Vec<&FlowRecord> = records
        .iter()
        .zip(labels.iter())
        .filter(|(_, l)| l.is_periodic)
        .map(|(r, _)| *r)
        .collect();
    let periodic = PeriodicSummary {
        count: periodic.len(),
        mean_interval: mean(periodic.iter().map(|r| r.flow_iat_mean)),
        mean_packet_size: mean(periodic.iter().map(|r| r.pkt_size_avg)),
    };

    AnalysisSummary {
        basic,
        flow_types: distribution(labels.iter().map(|l| l.flow_type.label())),
        timing_categories: distribution(
            labels
                .iter()
                .filter_map(|l| l.timing_category.map(|t| t.label())),
        ),
        traffic_patterns: distribution(labels.iter().map(|l| l.traffic_pattern.label())),
        packet_sizes,
        periodic,
        correlations: strong_correlations(&records),
    }
}
