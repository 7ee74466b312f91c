//! Study artifact attached to the conversation
//!
//! At most one attachment exists at a time. Selecting a file never rejects
//! it here: size and type acceptance is left to the chat gateway.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Error reading an attachment from disk
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification of an attachment, derived from its media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Document,
}

impl AttachmentKind {
    /// All kinds, in classification order
    pub const ALL: [AttachmentKind; 4] = [
        AttachmentKind::Image,
        AttachmentKind::Video,
        AttachmentKind::Audio,
        AttachmentKind::Document,
    ];

    /// Classify a MIME string by prefix. First match wins in the order
    /// image, video, audio; anything else is a document.
    pub fn classify(media_type: &str) -> Self {
        if media_type.starts_with("image/") {
            AttachmentKind::Image
        } else if media_type.starts_with("video/") {
            AttachmentKind::Video
        } else if media_type.starts_with("audio/") {
            AttachmentKind::Audio
        } else {
            AttachmentKind::Document
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttachmentKind::Image => "Image",
            AttachmentKind::Video => "Video",
            AttachmentKind::Audio => "Audio",
            AttachmentKind::Document => "Text / PDF",
        }
    }

    /// File picker filter for this kind's upload box.
    ///
    /// Only a hint for the picker widget; [`Attachment::from_path`] accepts
    /// anything regardless.
    pub fn accept_hint(self) -> &'static str {
        match self {
            AttachmentKind::Image => "image/*",
            AttachmentKind::Video => "video/*",
            AttachmentKind::Audio => "audio/*",
            AttachmentKind::Document => ".txt,.pdf,.md,.csv,.html,.js,.py",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the attachment's bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentData {
    /// Read lazily from disk when the attachment is sent
    File(PathBuf),
    /// Already in memory
    Bytes(Arc<[u8]>),
}

/// The study artifact currently bound to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub byte_size: u64,
    pub media_type: String,
    pub data: AttachmentData,
}

impl Attachment {
    /// Describe a file on disk. Only metadata is read here.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|source| AttachmentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            byte_size: metadata.len(),
            media_type,
            data: AttachmentData::File(path.to_path_buf()),
        })
    }

    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            byte_size: bytes.len() as u64,
            media_type: media_type.into(),
            data: AttachmentData::Bytes(bytes),
        }
    }

    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::classify(&self.media_type)
    }

    /// Size in megabytes with two decimals, e.g. `"1.50 MB"`
    pub fn display_size(&self) -> String {
        display_size(self.byte_size)
    }

    /// Load the raw bytes for transmission
    pub async fn read(&self) -> Result<Vec<u8>, AttachmentError> {
        match &self.data {
            AttachmentData::File(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| AttachmentError::Io {
                        path: path.clone(),
                        source,
                    })
            }
            AttachmentData::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn info(&self) -> AttachmentInfo {
        AttachmentInfo {
            name: self.name.clone(),
            byte_size: self.byte_size,
            media_type: self.media_type.clone(),
            kind: self.kind(),
        }
    }
}

/// Display-side view of an attachment, without the data handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    pub name: String,
    pub byte_size: u64,
    pub media_type: String,
    pub kind: AttachmentKind,
}

impl AttachmentInfo {
    pub fn display_size(&self) -> String {
        display_size(self.byte_size)
    }
}

#[allow(clippy::cast_precision_loss)] // display only
fn display_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}
