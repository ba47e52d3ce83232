//! Turning a submitted form into a fully materialized record.

use rgpl_queue::{EncodedFile, PendingRecord};
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::CaptureError;
use crate::form::{FileField, FileSource, FormEntry, FormSubmission};

/// Read a file field's bytes and encode them as a data URL.
pub async fn encode_file(field: &str, file: FileField) -> Result<EncodedFile, CaptureError> {
    let bytes = match file.source {
        FileSource::Bytes(bytes) => bytes,
        FileSource::Path(path) => {
            tokio::fs::read(&path)
                .await
                .map_err(|source| CaptureError::FileRead {
                    field: field.to_string(),
                    path: path.display().to_string(),
                    source,
                })?
        }
    };
    debug!(field, file = %file.name, bytes = bytes.len(), "encoded file field");
    Ok(EncodedFile::encode(&file.name, &file.mime, &bytes))
}

/// Build the record for a form.
///
/// Scalar entries are copied as they are. Every chosen file is encoded on
/// its own task and the record is returned only once all of them have
/// finished. If any encoding fails the remaining tasks are aborted and no
/// record is produced.
pub async fn materialize(form: FormSubmission) -> Result<PendingRecord, CaptureError> {
    let mut record = PendingRecord::new();
    let mut encodings = JoinSet::new();

    for (key, entry) in form.into_entries() {
        match entry {
            FormEntry::Text(value) => record.insert(key, value),
            FormEntry::File(file) if !file.is_chosen() => record.insert(key, String::new()),
            FormEntry::File(file) => {
                encodings.spawn(async move {
                    let encoded = encode_file(&key, file).await;
                    (key, encoded)
                });
            }
        }
    }

    while let Some(joined) = encodings.join_next().await {
        let (key, encoded) = joined.map_err(|e| CaptureError::Encode(e.to_string()))?;
        record.insert(key, encoded?);
    }

    Ok(record)
}
