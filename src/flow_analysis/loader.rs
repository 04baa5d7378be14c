use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, error, info};

use super::types::{FlowRecord, FlowRow, FlowTable, REQUIRED_COLUMNS};
use crate::error_handling::types::AnalyzerError;

/// Positions of the required columns in the header row.
struct ColumnIndex([usize; REQUIRED_COLUMNS.len()]);

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Result<Self, AnalyzerError> {
        let mut positions = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, name) in positions.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
            *slot = headers
                .iter()
                .position(|h| h == *name)
                .ok_or_else(|| AnalyzerError::MissingColumn(name.to_string()))?;
        }
        Ok(Self(positions))
    }

    fn text(&self, record: &StringRecord, column: usize) -> String {
        record.get(self.0[column]).unwrap_or_default().trim().to_string()
    }

    fn number(&self, record: &StringRecord, column: usize, row: usize) -> Result<f64, AnalyzerError> {
        let cell = record.get(self.0[column]).unwrap_or_default();
        parse_number(cell).ok_or_else(|| AnalyzerError::InvalidValue {
            row,
            column: REQUIRED_COLUMNS[column].to_string(),
            value: cell.to_string(),
        })
    }

    fn parse(&self, record: &StringRecord, row: usize) -> Result<FlowRecord, AnalyzerError> {
        Ok(FlowRecord {
            src_ip: self.text(record, 0),
            dst_ip: self.text(record, 1),
            protocol: self.text(record, 2),
            flow_duration: self.number(record, 3, row)?,
            flow_byts_s: self.number(record, 4, row)?,
            tot_fwd_pkts: self.number(record, 5, row)?,
            tot_bwd_pkts: self.number(record, 6, row)?,
            totlen_bwd_pkts: self.number(record, 7, row)?,
            fwd_pkt_len_mean: self.number(record, 8, row)?,
            bwd_pkt_len_mean: self.number(record, 9, row)?,
            flow_iat_mean: self.number(record, 10, row)?,
            flow_iat_std: self.number(record, 11, row)?,
            pkt_size_avg: self.number(record, 12, row)?,
        })
    }
}

/// Blank cells become `NaN`; `inf` and `nan` literals are accepted.
fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// Reads a flow table from any CSV source with a header row.
pub fn read_flows<R: Read>(source: R) -> Result<FlowTable, AnalyzerError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::Headers)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let raw = result?;
        let record = columns.parse(&raw, i + 1)?;
        rows.push(FlowRow { raw, record });
    }
    debug!("Parsed {} row(s) with {} column(s)", rows.len(), headers.len());

    Ok(FlowTable { headers, rows })
}

/// Loads the flow CSV at `path`.
///
/// A missing file is reported as `AnalyzerError::InputNotFound`.
pub fn load_flow_data(path: &Path) -> Result<FlowTable, AnalyzerError> {
    if !path.exists() {
        return Err(AnalyzerError::InputNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|e| {
        error!("Failed to open {}: {}", path.display(), e);
        AnalyzerError::IoError(e)
    })?;
    let table = read_flows(file)?;
    info!("Loaded {} flows from {}", table.len(), path.display());
    Ok(table)
}
