//! File intake: the user's current batch of files.
//!
//! A [`FileSet`] is replaced wholesale on every selection and never merged
//! with a previous one. Each set is stamped with the [`Generation`] it was
//! created under so that upload and preview completions can be matched back
//! to the selection they were issued for.

use crate::error::WorkflowError;
use crate::format::format_size;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// MIME type of documents the preview renderer can rasterise.
pub const PREVIEWABLE_MIME: &str = "application/pdf";

const FALLBACK_MIME: &str = "application/octet-stream";

/// File-set version. Bumped on every new selection and on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// A single user-supplied file.
///
/// `content` is reference-counted, so cloning a handle (for the upload task
/// and the preview task) does not copy the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub content: Bytes,
}

impl FileHandle {
    /// Build a handle from in-memory parts. `size` is taken from `content`.
    pub fn new(name: impl Into<String>, mime: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            mime: mime.into(),
            content,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| WorkflowError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| FALLBACK_MIME.to_string());

        debug!("Read {} ({} bytes, {})", name, content.len(), mime);
        Ok(Self::new(name, mime, content))
    }

    pub fn is_previewable(&self) -> bool {
        self.mime.eq_ignore_ascii_case(PREVIEWABLE_MIME)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime", &self.mime)
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .finish()
    }
}

/// An ordered batch of files selected in one intake action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    generation: Generation,
    files: Vec<FileHandle>,
}

impl FileSet {
    pub(crate) fn new(generation: Generation, files: Vec<FileHandle>) -> Self {
        Self { generation, files }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn files(&self) -> &[FileHandle] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// The first file the preview renderer can handle, if any.
    pub fn first_previewable(&self) -> Option<&FileHandle> {
        self.files.iter().find(|f| f.is_previewable())
    }

    /// One-line description: `"a.pdf (1.5 KB)"` or `"3 files"`.
    pub fn summary(&self) -> String {
        match self.files.as_slice() {
            [] => "No file selected".to_string(),
            [only] => format!("{} ({})", only.name, format_size(only.size)),
            many => format!("{} files", many.len()),
        }
    }
}
