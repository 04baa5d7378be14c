//! Threshold rules labelling individual flows.
//!
//! The thresholds are heuristics tuned for the demo traffic, not a validated
//! model. Any comparison against `NaN` is false, so flows with missing cells
//! fall through to the default labels.

use std::fmt;

use serde::Serialize;

use super::types::FlowRecord;

pub const LARGE_DATA_MIN_BWD_BYTES: f64 = 2000.0;
pub const LARGE_DATA_MIN_DURATION: f64 = 0.04;
pub const QUICK_REQUEST_MAX_PKT_SIZE: f64 = 200.0;
pub const QUICK_REQUEST_MAX_DURATION: f64 = 0.05;
pub const INTERACTIVE_MIN_PKT_SIZE: f64 = 200.0;
pub const INTERACTIVE_MAX_PKT_SIZE: f64 = 400.0;
pub const INTERACTIVE_MIN_IAT_STD: f64 = 0.01;
pub const BULK_MIN_PACKETS: f64 = 15.0;

pub const PERIODIC_MAX_IAT_STD: f64 = 0.01;
pub const PERIODIC_MIN_IAT_MEAN: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FlowType {
    LargeData,
    QuickRequest,
    Interactive,
    BulkTransfer,
    Other,
}

impl FlowType {
    pub fn label(&self) -> &'static str {
        match self {
            FlowType::LargeData => "Large Data",
            FlowType::QuickRequest => "Quick Request",
            FlowType::Interactive => "Interactive",
            FlowType::BulkTransfer => "Bulk Transfer",
            FlowType::Other => "Other",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bucket of the mean inter-arrival time, bins closed on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TimingCategory {
    /// (0, 0.001]
    VeryFast,
    /// (0.001, 0.01]
    Fast,
    /// (0.01, 0.1]
    Medium,
    /// (0.1, inf)
    Slow,
}

impl TimingCategory {
    pub fn from_iat_mean(iat_mean: f64) -> Option<Self> {
        match iat_mean {
            m if m > 0.0 && m <= 0.001 => Some(Self::VeryFast),
            m if m > 0.001 && m <= 0.01 => Some(Self::Fast),
            m if m > 0.01 && m <= 0.1 => Some(Self::Medium),
            m if m > 0.1 => Some(Self::Slow),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimingCategory::VeryFast => "Very Fast",
            TimingCategory::Fast => "Fast",
            TimingCategory::Medium => "Medium",
            TimingCategory::Slow => "Slow",
        }
    }
}

impl fmt::Display for TimingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BurstPattern {
    Bursty,
    Steady,
}

impl BurstPattern {
    /// Bursty when the inter-arrival spread exceeds its mean.
    pub fn from_record(record: &FlowRecord) -> Self {
        if record.flow_iat_std > record.flow_iat_mean {
            Self::Bursty
        } else {
            Self::Steady
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BurstPattern::Bursty => "Bursty",
            BurstPattern::Steady => "Steady",
        }
    }
}

impl fmt::Display for BurstPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Average packet size band: auth/control, API calls, data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketSizeBand {
    Small,
    Medium,
    Large,
}

impl PacketSizeBand {
    pub fn from_avg(pkt_size_avg: f64) -> Option<Self> {
        match pkt_size_avg {
            s if s < INTERACTIVE_MIN_PKT_SIZE => Some(Self::Small),
            s if (INTERACTIVE_MIN_PKT_SIZE..=INTERACTIVE_MAX_PKT_SIZE).contains(&s) => {
                Some(Self::Medium)
            }
            s if s > INTERACTIVE_MAX_PKT_SIZE => Some(Self::Large),
            _ => None,
        }
    }
}

/// First matching rule wins.
pub fn classify(record: &FlowRecord) -> FlowType {
    if record.totlen_bwd_pkts > LARGE_DATA_MIN_BWD_BYTES
        && record.flow_duration > LARGE_DATA_MIN_DURATION
    {
        FlowType::LargeData
    } else if record.pkt_size_avg < QUICK_REQUEST_MAX_PKT_SIZE
        && record.flow_duration < QUICK_REQUEST_MAX_DURATION
    {
        FlowType::QuickRequest
    } else if (INTERACTIVE_MIN_PKT_SIZE..=INTERACTIVE_MAX_PKT_SIZE).contains(&record.pkt_size_avg)
        && record.flow_iat_std > INTERACTIVE_MIN_IAT_STD
    {
        FlowType::Interactive
    } else if record.tot_fwd_pkts + record.tot_bwd_pkts > BULK_MIN_PACKETS {
        FlowType::BulkTransfer
    } else {
        FlowType::Other
    }
}

/// Regular, non-trivial packet spacing suggests polling.
pub fn is_periodic(record: &FlowRecord) -> bool {
    record.flow_iat_std < PERIODIC_MAX_IAT_STD && record.flow_iat_mean > PERIODIC_MIN_IAT_MEAN
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowLabels {
    pub flow_type: FlowType,
    pub timing_category: Option<TimingCategory>,
    pub traffic_pattern: BurstPattern,
    pub is_periodic: bool,
}

impl FlowLabels {
    pub fn for_record(record: &FlowRecord) -> Self {
        Self {
            flow_type: classify(record),
            timing_category: TimingCategory::from_iat_mean(record.flow_iat_mean),
            traffic_pattern: BurstPattern::from_record(record),
            is_periodic: is_periodic(record),
        }
    }
}
