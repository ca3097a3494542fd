//! Delimited result export

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::execution::{DeviceResult, ExecutionRecord};

/// Fixed export column order
pub const HEADER: [&str; 7] = [
    "Alias",
    "Device ID",
    "Status",
    "Exit Code",
    "Output",
    "Error",
    "Timestamp",
];

/// One exported row, all fields verbatim strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub alias: String,
    pub device_id: String,
    pub status: String,
    pub exit_code: String,
    pub output: String,
    pub error: String,
    pub timestamp: String,
}

impl ExportRow {
    fn from_result(result: &DeviceResult) -> Self {
        Self {
            alias: result.alias.clone(),
            device_id: result.device_id.clone(),
            status: result.status.as_str().to_string(),
            exit_code: result
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_default(),
            output: result.output.clone().unwrap_or_default(),
            error: result.error.clone().unwrap_or_default(),
            timestamp: result.updated_at.to_rfc3339(),
        }
    }
}

/// Serialize a completed execution's results
pub fn export(record: &ExecutionRecord) -> Result<String, EngineError> {
    export_results(&record.results)
}

/// Serialize per-device results to delimited text
///
/// Fields containing the delimiter, the quote character, or a line break are
/// quoted with internal quotes doubled; everything else stays bare, so
/// export → parse → render round-trips byte-identically.
pub fn export_results(results: &[DeviceResult]) -> Result<String, EngineError> {
    let rows: Vec<ExportRow> = results.iter().map(ExportRow::from_result).collect();
    render(&rows)
}

/// Render rows to delimited text with the fixed header
pub fn render(rows: &[ExportRow]) -> Result<String, EngineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record([
            row.alias.as_str(),
            row.device_id.as_str(),
            row.status.as_str(),
            row.exit_code.as_str(),
            row.output.as_str(),
            row.error.as_str(),
            row.timestamp.as_str(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| EngineError::Internal(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| EngineError::Internal(e.to_string()))
}

/// Parse previously exported text back into rows
pub fn parse(text: &str) -> Result<Vec<ExportRow>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != HEADER.len() {
            return Err(EngineError::ValidationError(format!(
                "expected {} columns, found {}",
                HEADER.len(),
                record.len()
            )));
        }
        rows.push(ExportRow {
            alias: record[0].to_string(),
            device_id: record[1].to_string(),
            status: record[2].to_string(),
            exit_code: record[3].to_string(),
            output: record[4].to_string(),
            error: record[5].to_string(),
            timestamp: record[6].to_string(),
        });
    }
    Ok(rows)
}
