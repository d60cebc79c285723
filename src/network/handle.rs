use tokio::sync::mpsc;

use crate::common::{NetworkCommand, NetworkEvent};

use super::error::ClientError;

/// Where the composer sends a finished draft.
pub trait MessageSink {
    /// Queue the post-message operation without waiting for the round-trip.
    fn post_message(&self, user: &str, content: &str) -> Result<(), ClientError>;
}

/// UI side of the data client: commands go down, events come back up.
pub struct ClientHandle {
    commands: mpsc::Sender<NetworkCommand>,
    events: mpsc::Receiver<NetworkEvent>,
}

impl ClientHandle {
    pub fn new(
        commands: mpsc::Sender<NetworkCommand>,
        events: mpsc::Receiver<NetworkEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Non-blocking; meant to be drained once per frame.
    pub fn try_next_event(&mut self) -> Option<NetworkEvent> {
        self.events.try_recv().ok()
    }
}

impl MessageSink for ClientHandle {
    fn post_message(&self, user: &str, content: &str) -> Result<(), ClientError> {
        self.commands.try_send(NetworkCommand::PostMessage {
            user: user.to_string(),
            content: content.to_string(),
        })?;
        Ok(())
    }
}
