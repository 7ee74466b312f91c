//! Events that can occur in a session

use crate::attachment::Attachment;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        text: String,
    },
    AttachmentSelected {
        attachment: Attachment,
    },
    AttachmentCleared,

    // Gateway events
    GatewayReply {
        response: String,
        model: String,
    },
    GatewayFailed {
        message: String,
    },
}
