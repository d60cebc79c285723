use chrono::{DateTime, Local};

use crate::common::{ConnectionState, Draft, Message, NetworkEvent};
use crate::network::MessageSink;

/// A post that did not make it to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PostError {
    pub reason: String,
    pub at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Posted,
    /// Guard failed: name or message was empty.
    Skipped,
    /// The post could not even be queued.
    Rejected,
}

/// Local UI state of the root container.
pub struct AppState {
    pub draft: Draft,
    /// `None` until the subscription delivers its first push.
    pub messages: Option<Vec<Message>>,
    pub connection: ConnectionState,
    pub post_error: Option<PostError>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            draft: Draft::default(),
            messages: None,
            connection: ConnectionState::Connecting,
            post_error: None,
        }
    }

    pub fn edit_user(&mut self, text: String) {
        self.draft.user = text;
    }

    pub fn edit_content(&mut self, text: String) {
        self.draft.content = text;
    }

    /// Post the draft if both fields are filled in.
    ///
    /// `content` is cleared whether or not the guard passed; `user` is kept so
    /// the next message goes out under the same name.
    pub fn send(&mut self, sink: &impl MessageSink) -> SendOutcome {
        let outcome = if self.draft.is_sendable() {
            match sink.post_message(&self.draft.user, &self.draft.content) {
                Ok(()) => SendOutcome::Posted,
                Err(err) => {
                    log::warn!("Failed to queue message: {err}");
                    self.record_post_error(err.to_string());
                    SendOutcome::Rejected
                }
            }
        } else {
            SendOutcome::Skipped
        };
        self.draft.content.clear();
        outcome
    }

    pub fn apply_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::MessagesUpdated(messages) => self.messages = Some(messages),
            NetworkEvent::ConnectionChanged(state) => self.connection = state,
            NetworkEvent::PostDelivered => {}
            NetworkEvent::PostFailed { reason } => self.record_post_error(reason),
        }
    }

    pub fn dismiss_error(&mut self) {
        self.post_error = None;
    }

    fn record_post_error(&mut self, reason: String) {
        self.post_error = Some(PostError {
            reason,
            at: Local::now(),
        });
    }
}
