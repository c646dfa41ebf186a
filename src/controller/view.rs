use std::path::{Path, PathBuf};

use crate::api::RecordApi;
use crate::export::{self, ExportError};
use crate::record::{FieldValue, Record};
use crate::schema::{FieldKind, RecordType};

/// Read-only projection of a single record. No mutation surface; the only
/// action is delegating to the PDF export adapter.
pub struct RecordView {
    record_type: RecordType,
    record: Record,
}

impl RecordView {
    pub fn new(record_type: RecordType, record: Record) -> RecordView {
        RecordView {
            record_type,
            record,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Label/value lines in schema order; row fields flatten into one line
    /// per sub-record. This is the projection both the terminal view and the
    /// client-composed PDF print.
    pub fn lines(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for spec in self.record_type.fields {
            let value = self.record.field(spec.name);
            match (spec.kind, value) {
                (FieldKind::Rows(columns), Some(FieldValue::Rows(rows))) => {
                    let noun = if rows.len() == 1 { "entry" } else { "entries" };
                    out.push((spec.label.to_string(), format!("{} {noun}", rows.len())));
                    for row in rows {
                        let line = columns
                            .iter()
                            .map(|column| row.get(*column).map(String::as_str).unwrap_or(""))
                            .collect::<Vec<_>>()
                            .join(" / ");
                        out.push((String::new(), line));
                    }
                }
                (_, Some(FieldValue::Flag(flag))) => {
                    out.push((spec.label.to_string(), if *flag { "yes" } else { "no" }.to_string()));
                }
                (_, Some(value)) => out.push((spec.label.to_string(), value.as_text().to_string())),
                (_, None) => out.push((spec.label.to_string(), String::new())),
            }
        }
        if let Some(submitted_at) = self.record.submitted_at.as_deref() {
            out.push(("Submitted".to_string(), submitted_at.to_string()));
        }
        out
    }

    pub async fn export_pdf<A: RecordApi>(
        &self,
        api: &A,
        download_dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        export::export_record(api, &self.record_type, &self.record, download_dir).await
    }
}
