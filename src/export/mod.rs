pub mod compose;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::{ApiError, RecordApi};
use crate::record::Record;
use crate::schema::{PdfStrategy, RecordType};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("record has not been saved yet")]
    Unsaved,

    #[error("Server did not return a valid PDF file")]
    InvalidPdf,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Produces a downloadable PDF for one record, using the strategy declared by
/// its record type, and saves it under the download directory with a filename
/// derived from the record identifier.
pub async fn export_record<A: RecordApi>(
    api: &A,
    record_type: &RecordType,
    record: &Record,
    download_dir: &Path,
) -> Result<PathBuf, ExportError> {
    let id = record.id.as_deref().ok_or(ExportError::Unsaved)?;
    let bytes = match record_type.pdf {
        PdfStrategy::ServerRendered => {
            let payload = api.fetch_pdf(record_type, id).await?;
            // A 200 with an HTML error page must not be saved as a "PDF".
            if !is_pdf_content_type(&payload.content_type) || payload.bytes.is_empty() {
                return Err(ExportError::InvalidPdf);
            }
            payload.bytes
        }
        PdfStrategy::ClientComposed => compose::compose_pdf(record_type, record),
    };
    let path = download_dir.join(format!("{}-{id}.pdf", record_type.key));
    save_download(&path, &bytes)?;
    Ok(path)
}

fn is_pdf_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("application/pdf")
}

/// Writes through a `.part` file renamed into place; the transient file is
/// removed on any failure.
pub fn save_download(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let part = path.with_extension("pdf.part");
    if let Err(source) = std::fs::write(&part, bytes) {
        let _ = std::fs::remove_file(&part);
        return Err(ExportError::Write {
            path: part.display().to_string(),
            source,
        });
    }
    if let Err(source) = std::fs::rename(&part, path) {
        let _ = std::fs::remove_file(&part);
        return Err(ExportError::Write {
            path: path.display().to_string(),
            source,
        });
    }
    Ok(())
}
