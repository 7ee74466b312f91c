//! Copy buttons and the transient "copied" marker
//!
//! Only the most recent copy is shown as active. The marker clears itself
//! after [`COPY_MARKER_WINDOW`] unless a newer copy supersedes it first.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How long a copy button shows its "copied" state
pub const COPY_MARKER_WINDOW: Duration = Duration::from_millis(2000);

/// Stable address of a copyable block, computed from position rather than
/// from any UI handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CopyKey {
    /// The whole message at this history index
    Message(usize),
    /// The n-th code block (document order) of a message
    Code { message: usize, block: usize },
}

impl fmt::Display for CopyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyKey::Message(index) => write!(f, "{index}"),
            CopyKey::Code { message, block } => write!(f, "{message}-code-{block}"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Clipboard unavailable: {0}")]
pub struct CopyError(pub String);

/// Destination for copied text
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), CopyError>;
}

/// The OS clipboard
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), CopyError> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| CopyError(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| CopyError(e.to_string()))
    }
}

impl<T: Clipboard + ?Sized> Clipboard for Arc<T> {
    fn write_text(&self, text: &str) -> Result<(), CopyError> {
        (**self).write_text(text)
    }
}

#[derive(Debug, Default)]
struct Marker {
    target: Option<CopyKey>,
    /// Bumped on every copy so a late timer cannot clear a newer marker
    generation: u64,
}

/// Tracks which block was most recently copied
pub struct CopyTracker<C> {
    clipboard: C,
    marker: Arc<Mutex<Marker>>,
    clear_token: Mutex<Option<CancellationToken>>,
    window: Duration,
}

impl<C: Clipboard> CopyTracker<C> {
    pub fn new(clipboard: C) -> Self {
        Self::with_window(clipboard, COPY_MARKER_WINDOW)
    }

    pub fn with_window(clipboard: C, window: Duration) -> Self {
        Self {
            clipboard,
            marker: Arc::new(Mutex::new(Marker::default())),
            clear_token: Mutex::new(None),
            window,
        }
    }

    /// Copy `text` and mark `key` as copied.
    ///
    /// The marker is set even when the clipboard write fails; the failure is
    /// only logged. Must be called from within a tokio runtime.
    pub fn copy(&self, text: &str, key: CopyKey) {
        if let Err(e) = self.clipboard.write_text(text) {
            tracing::warn!(key = %key, error = %e, "Clipboard write failed");
        }

        let generation = {
            let mut marker = self.marker.lock().unwrap_or_else(PoisonError::into_inner);
            marker.generation += 1;
            marker.target = Some(key);
            marker.generation
        };

        let token = CancellationToken::new();
        if let Some(previous) = self
            .clear_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone())
        {
            previous.cancel();
        }

        let marker = Arc::clone(&self.marker);
        let window = self.window;
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(window) => {
                    let mut marker = marker.lock().unwrap_or_else(PoisonError::into_inner);
                    if marker.generation == generation {
                        marker.target = None;
                    }
                }
            }
        });
    }

    /// The currently marked block, if any
    pub fn marker(&self) -> Option<CopyKey> {
        self.marker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .target
    }

    pub fn is_copied(&self, key: CopyKey) -> bool {
        self.marker() == Some(key)
    }
}

impl<C> Drop for CopyTracker<C> {
    fn drop(&mut self) {
        if let Some(token) = self
            .clear_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }
}
