//! Rich-text render pipeline
//!
//! Assistant replies are parsed as GitHub-flavored markdown into a typed
//! [`Document`]. User messages bypass the pipeline and stay plain text.

mod builder;
mod highlight;
mod node;
mod sanitize;

#[cfg(test)]
mod proptests;

pub use node::{
    Alignment, Block, CodeBlock, Document, HighlightedLine, Inline, Link, List, ListItem,
    MarkupNode, StyledSpan, Table, TokenStyle,
};
pub use sanitize::sanitize_href;

use crate::copy_state::CopyKey;
use crate::message::Message;
use serde::Serialize;

/// How one history entry is displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum MessageView {
    /// Shown verbatim, whitespace preserved
    Plain { text: String, copy_key: CopyKey },
    Rich(Document),
}

impl MessageView {
    pub fn copy_key(&self) -> CopyKey {
        match self {
            MessageView::Plain { copy_key, .. } => *copy_key,
            MessageView::Rich(document) => document.copy_key,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            MessageView::Plain { .. } => None,
            MessageView::Rich(document) => Some(document),
        }
    }
}

/// Render the message at history position `index`
pub fn render_message(index: usize, message: &Message) -> MessageView {
    if message.is_user() {
        MessageView::Plain {
            text: message.content.clone(),
            copy_key: CopyKey::Message(index),
        }
    } else {
        MessageView::Rich(render_markdown(index, &message.content))
    }
}

/// Parse markdown into a document whose copy keys belong to message `index`
pub fn render_markdown(index: usize, markdown: &str) -> Document {
    builder::build_document(index, markdown)
}
