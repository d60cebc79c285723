use super::types::{ConnectionState, Message};

/// Events the network worker sends up to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Full ordered message list from the latest subscription push.
    MessagesUpdated(Vec<Message>),
    ConnectionChanged(ConnectionState),
    PostDelivered,
    PostFailed { reason: String },
}
