use csv::StringRecord;
use serde::Serialize;

/// Columns every input file must carry, in CICFlowMeter naming.
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "src_ip",
    "dst_ip",
    "protocol",
    "flow_duration",
    "flow_byts_s",
    "tot_fwd_pkts",
    "tot_bwd_pkts",
    "totlen_bwd_pkts",
    "fwd_pkt_len_mean",
    "bwd_pkt_len_mean",
    "flow_iat_mean",
    "flow_iat_std",
    "pkt_size_avg",
];

/// Numeric fields are `NaN` when the cell was empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    pub src_ip: String,
    pub dst_ip: String,
    pub protocol: String,
    pub flow_duration: f64,
    pub flow_byts_s: f64,
    pub tot_fwd_pkts: f64,
    pub tot_bwd_pkts: f64,
    pub totlen_bwd_pkts: f64,
    pub fwd_pkt_len_mean: f64,
    pub bwd_pkt_len_mean: f64,
    pub flow_iat_mean: f64,
    pub flow_iat_std: f64,
    pub pkt_size_avg: f64,
}

impl Default for FlowRecord {
    fn default() -> Self {
        Self {
            src_ip: String::new(),
            dst_ip: String::new(),
            protocol: String::new(),
            flow_duration: f64::NAN,
            flow_byts_s: f64::NAN,
            tot_fwd_pkts: f64::NAN,
            tot_bwd_pkts: f64::NAN,
            totlen_bwd_pkts: f64::NAN,
            fwd_pkt_len_mean: f64::NAN,
            bwd_pkt_len_mean: f64::NAN,
            flow_iat_mean: f64::NAN,
            flow_iat_std: f64::NAN,
            pkt_size_avg: f64::NAN,
        }
    }
}

/// One input row: the untouched source cells plus the parsed fields.
#[derive(Debug, Clone)]
pub struct FlowRow {
    pub raw: StringRecord,
    pub record: FlowRecord,
}

#[derive(Debug, Clone)]
pub struct FlowTable {
    pub headers: StringRecord,
    pub rows: Vec<FlowRow>,
}

impl FlowTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &FlowRecord> {
        self.rows.iter().map(|row| &row.record)
    }
}
