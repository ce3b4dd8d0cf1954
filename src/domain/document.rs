//! Supporting-document encoding for emergency withdrawals.
//!
//! Uploaded files are turned into self-describing `data:` URLs
//! (`data:<mime>;base64,<body>`) and embedded directly in the withdrawal
//! record. Files larger than [`MAX_DOCUMENT_BYTES`] are rejected before any
//! encoding work; they are never truncated.
//!
//! Image uploads may carry a transient preview handle from the
//! [`PreviewRegistry`]. Releasing those handles is the caller's job, done
//! when a file is removed from the pending set, when the dialog closes, and
//! after submission.

use std::collections::HashSet;
use std::sync::Mutex;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::SaviumError;

/// Largest accepted document, in bytes (1 MiB, inclusive).
pub const MAX_DOCUMENT_BYTES: usize = 1024 * 1024;

/// Default cap on the documents attached to one emergency request.
pub const DEFAULT_MAX_DOCUMENTS: usize = 5;

/// MIME type used when the upload did not declare one.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// An encoded document embedded in an emergency withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDocument {
    /// `data:` URL carrying the MIME type and base64 body.
    #[serde(rename = "dataUrl")]
    pub encoded_content: String,
    /// Original file name.
    pub name: String,
    /// MIME type of the original file.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Original size in bytes.
    #[serde(rename = "size")]
    pub size_bytes: usize,
}

/// Display metadata of a document, without its content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentMetadata {
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Size in bytes.
    pub size: usize,
}

impl From<&AttachedDocument> for DocumentMetadata {
    fn from(doc: &AttachedDocument) -> Self {
        Self {
            name: doc.name.clone(),
            mime_type: doc.mime_type.clone(),
            size: doc.size_bytes,
        }
    }
}

/// Handle to a transient UI preview of a pending image upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewId(uuid::Uuid);

/// A file queued for attachment but not yet encoded.
#[derive(Debug, Clone)]
pub struct PendingDocument {
    /// File name as uploaded.
    pub name: String,
    /// Declared MIME type (may be empty).
    pub mime_type: String,
    /// Raw file content.
    pub content: Vec<u8>,
    /// Preview handle, present for image uploads.
    pub preview: Option<PreviewId>,
}

impl PendingDocument {
    /// Creates a pending document without a preview.
    #[must_use]
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
            preview: None,
        }
    }

    /// Size of the file in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }

    /// Returns `true` for `image/*` uploads.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Checks the size gate for a single file.
///
/// # Errors
///
/// Returns [`SaviumError::FileTooLarge`] naming the file when it exceeds
/// [`MAX_DOCUMENT_BYTES`].
pub fn check_size(file: &PendingDocument) -> Result<(), SaviumError> {
    let size = file.size_bytes();
    if size > MAX_DOCUMENT_BYTES {
        return Err(SaviumError::FileTooLarge {
            name: file.name.clone(),
            size,
        });
    }
    Ok(())
}

/// Encodes one file into an [`AttachedDocument`].
///
/// # Errors
///
/// Returns [`SaviumError::FileTooLarge`] when the file exceeds
/// [`MAX_DOCUMENT_BYTES`]; no encoding is attempted in that case.
pub fn encode(file: &PendingDocument) -> Result<AttachedDocument, SaviumError> {
    check_size(file)?;

    let mime_type = if file.mime_type.is_empty() {
        FALLBACK_MIME_TYPE
    } else {
        file.mime_type.as_str()
    };
    let body = STANDARD.encode(&file.content);

    Ok(AttachedDocument {
        encoded_content: format!("data:{mime_type};base64,{body}"),
        name: file.name.clone(),
        mime_type: file.mime_type.clone(),
        size_bytes: file.size_bytes(),
    })
}

/// Encodes a batch of files in order, reporting progress after each one.
///
/// `on_progress` receives `i / N` after file `i` is encoded. The first failure
/// aborts the batch; documents encoded before it are discarded.
///
/// # Errors
///
/// Returns the first file's [`SaviumError::FileTooLarge`].
pub fn encode_batch(
    files: &[PendingDocument],
    mut on_progress: impl FnMut(f64),
) -> Result<Vec<AttachedDocument>, SaviumError> {
    let total = files.len();
    let mut encoded = Vec::with_capacity(total);
    for (i, file) in files.iter().enumerate() {
        let doc = encode(file).inspect_err(|e| {
            tracing::warn!(file = %file.name, error = %e, "document batch aborted");
        })?;
        encoded.push(doc);
        #[allow(clippy::cast_precision_loss)]
        on_progress((i + 1) as f64 / total as f64);
    }
    Ok(encoded)
}

/// Tracks live preview handles so they can be released deterministically.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: Mutex<HashSet<PreviewId>>,
}

impl PreviewRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a preview for image uploads; other files get none.
    pub fn create(&self, file: &PendingDocument) -> Option<PreviewId> {
        if !file.is_image() {
            return None;
        }
        let id = PreviewId(uuid::Uuid::new_v4());
        match self.live.lock() {
            Ok(mut live) => {
                live.insert(id);
                Some(id)
            }
            Err(_) => {
                tracing::warn!(file = %file.name, "preview registry poisoned; skipping preview");
                None
            }
        }
    }

    /// Releases a preview handle. Best-effort: failures are logged only.
    pub fn release(&self, id: PreviewId) {
        match self.live.lock() {
            Ok(mut live) => {
                if !live.remove(&id) {
                    tracing::debug!(?id, "preview already released");
                }
            }
            Err(_) => tracing::warn!(?id, "preview registry poisoned; release skipped"),
        }
    }

    /// Releases the previews of every given document.
    pub fn release_all<'a>(&self, docs: impl IntoIterator<Item = &'a PendingDocument>) {
        for id in docs.into_iter().filter_map(|d| d.preview) {
            self.release(id);
        }
    }

    /// Number of previews not yet released.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}
