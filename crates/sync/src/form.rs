//! Submitted form model: the input of `SyncCoordinator::capture`.

use std::path::{Path, PathBuf};

/// Where a file field's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file input. An empty `name` means no file was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileField {
    pub name: String,
    pub mime: String,
    pub source: FileSource,
}

impl FileField {
    /// A file on disk; name and MIME type are taken from the path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime = guess_mime(&path).to_string();
        FileField {
            name,
            mime,
            source: FileSource::Path(path),
        }
    }

    pub fn from_bytes(name: &str, mime: &str, bytes: Vec<u8>) -> Self {
        FileField {
            name: name.to_string(),
            mime: mime.to_string(),
            source: FileSource::Bytes(bytes),
        }
    }

    /// A file input left empty.
    pub fn empty() -> Self {
        Self::from_bytes("", "", Vec::new())
    }

    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime = mime.to_string();
        self
    }

    pub fn is_chosen(&self) -> bool {
        !self.name.is_empty()
    }
}

/// One entry of a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEntry {
    Text(String),
    File(FileField),
}

/// All entries of a submitted form, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    entries: Vec<(String, FormEntry)>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, key: &str, value: &str) -> Self {
        self.push(key, FormEntry::Text(value.to_string()));
        self
    }

    pub fn file(mut self, key: &str, file: FileField) -> Self {
        self.push(key, FormEntry::File(file));
        self
    }

    pub fn push(&mut self, key: &str, entry: FormEntry) {
        self.entries.push((key.to_string(), entry));
    }

    pub fn entries(&self) -> &[(String, FormEntry)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(String, FormEntry)> {
        self.entries
    }

    /// Number of file entries that carry a chosen file.
    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, FormEntry::File(f) if f.is_chosen()))
            .count()
    }
}

/// Best-effort MIME type from the file extension. Unknown extensions get an
/// empty type, as a browser file input reports them.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => "text/csv",
        "txt" => "text/plain",
        "json" => "application/json",
        "geojson" => "application/geo+json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "",
    }
}
