use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::pipeline::ExportError;

/// Query window shared by every batch of a run. Resolved once, never
/// recomputed mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Second-precision ISO 8601 text, UTC, no offset suffix.
    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// One named value series, keyed by the timestamp text the API returned.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesColumn {
    pub name: String,
    pub values: BTreeMap<String, serde_json::Value>,
}

/// Row-oriented table parsed from one batch response. Column order follows
/// the response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesTable {
    pub columns: Vec<SeriesColumn>,
}

/// A batch's parsed payload, tagged with its position in the chunk
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub batch_index: usize,
    pub table: SeriesTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedColumn {
    pub name: String,
    /// One slot per merged row; `None` where this column had no entry for
    /// the row's timestamp.
    pub values: Vec<Option<serde_json::Value>>,
}

/// Final output table. Rows are keyed by a single normalized timestamp
/// index; columns keep batch order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    /// Named after the target timezone identifier.
    pub index_name: String,
    pub timestamps: Vec<String>,
    pub columns: Vec<MergedColumn>,
}

impl MergedTable {
    pub fn to_csv(&self) -> Result<String, ExportError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(self.index_name.as_str());
        header.extend(self.columns.iter().map(|c| c.name.as_str()));
        wtr.write_record(&header)
            .map_err(|e| ExportError::Serialize(e.to_string()))?;

        for (row, ts) in self.timestamps.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(ts.clone());
            for col in &self.columns {
                let cell = col
                    .values
                    .get(row)
                    .and_then(|v| v.as_ref())
                    .map(render_value)
                    .unwrap_or_default();
                record.push(cell);
            }
            wtr.write_record(&record)
                .map_err(|e| ExportError::Serialize(e.to_string()))?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| ExportError::Serialize(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ExportError::Serialize(e.to_string()))
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
