use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::common::{ConnectionState, Message, NetworkCommand, NetworkEvent};

use super::data_client::DataClient;

/// State updates the UI had no room for. Only the newest of each kind is kept.
#[derive(Debug, Default)]
struct Backlog {
    connection: Option<ConnectionState>,
    messages: Option<Vec<Message>>,
}

impl Backlog {
    fn is_empty(&self) -> bool {
        self.connection.is_none() && self.messages.is_none()
    }

    fn push(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::ConnectionChanged(state) => self.connection = Some(state),
            NetworkEvent::MessagesUpdated(messages) => self.messages = Some(messages),
            other => log::warn!("Dropping event the UI had no room for: {other:?}"),
        }
    }

    fn pop(&mut self) -> Option<NetworkEvent> {
        if let Some(state) = self.connection.take() {
            return Some(NetworkEvent::ConnectionChanged(state));
        }
        self.messages.take().map(NetworkEvent::MessagesUpdated)
    }
}

/// Background task bridging the UI channels and the data client.
pub struct ChatNetwork {
    client: Arc<dyn DataClient>,
    event_sender: mpsc::Sender<NetworkEvent>,
    command_receiver: mpsc::Receiver<NetworkCommand>,
    backlog: Backlog,
}

impl ChatNetwork {
    pub fn new(
        client: Arc<dyn DataClient>,
        event_sender: mpsc::Sender<NetworkEvent>,
        command_receiver: mpsc::Receiver<NetworkCommand>,
    ) -> Self {
        Self {
            client,
            event_sender,
            command_receiver,
            backlog: Backlog::default(),
        }
    }

    /// Runs until the UI drops its command sender.
    pub async fn run(mut self) {
        let mut messages = self.client.subscribe_messages();
        let mut connection = self.client.connection_state();
        let mut subscription_open = true;
        let mut connection_open = true;
        let event_sender = self.event_sender.clone();

        let initial = connection.borrow_and_update().clone();
        self.emit(NetworkEvent::ConnectionChanged(initial));
        log::info!("Network event loop started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
                snapshot = messages.next(), if subscription_open => {
                    match snapshot {
                        Some(snapshot) => {
                            log::debug!("Subscription pushed {} messages", snapshot.len());
                            self.emit(NetworkEvent::MessagesUpdated(snapshot));
                        }
                        None => {
                            log::warn!("Messages subscription ended");
                            subscription_open = false;
                        }
                    }
                }
                permit = event_sender.reserve(), if !self.backlog.is_empty() => {
                    match permit {
                        Ok(permit) => {
                            if let Some(event) = self.backlog.pop() {
                                permit.send(event);
                            }
                        }
                        Err(_) => {
                            log::warn!("UI event channel closed; dropping pending updates");
                            self.backlog = Backlog::default();
                        }
                    }
                }
                changed = connection.changed(), if connection_open => {
                    if changed.is_ok() {
                        let state = connection.borrow_and_update().clone();
                        self.emit(NetworkEvent::ConnectionChanged(state));
                    } else {
                        connection_open = false;
                    }
                }
            }
        }

        log::info!("Network event loop stopped");
    }

    fn handle_command(&self, command: NetworkCommand) {
        match command {
            NetworkCommand::PostMessage { user, content } => {
                let client = Arc::clone(&self.client);
                let events = self.event_sender.clone();
                // The round-trip must not hold up the event loop.
                tokio::spawn(async move {
                    let event = match client.post_message(&user, &content).await {
                        Ok(()) => NetworkEvent::PostDelivered,
                        Err(err) => {
                            log::warn!("postMessage failed: {err}");
                            NetworkEvent::PostFailed {
                                reason: err.to_string(),
                            }
                        }
                    };
                    if let Err(err) = events.send(event).await {
                        log::warn!("Failed to notify UI about post result: {err}");
                    }
                });
            }
        }
    }

    /// Never waits on the UI: while it lags, state updates are coalesced.
    fn emit(&mut self, event: NetworkEvent) {
        if !self.backlog.is_empty() {
            self.backlog.push(event);
            return;
        }
        match self.event_sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("UI is behind; holding the latest update");
                self.backlog.push(event);
            }
            Err(TrySendError::Closed(_)) => log::warn!("Failed to send event to UI: channel closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use tokio::sync::watch;
    use tokio::time::timeout;

    use super::*;
    use crate::network::error::{ClientError, ProtocolError};

    struct FakeClient {
        snapshots: Mutex<Vec<Vec<Message>>>,
        state: watch::Sender<ConnectionState>,
        posts: Mutex<Vec<(String, String)>>,
        reject_posts: bool,
    }

    impl FakeClient {
        fn new(snapshots: Vec<Vec<Message>>, reject_posts: bool) -> Arc<Self> {
            let (state, _) = watch::channel(ConnectionState::Connecting);
            Arc::new(Self {
                snapshots: Mutex::new(snapshots),
                state,
                posts: Mutex::new(Vec::new()),
                reject_posts,
            })
        }
    }

    #[async_trait]
    impl DataClient for FakeClient {
        fn subscribe_messages(&self) -> BoxStream<'static, Vec<Message>> {
            let snapshots = std::mem::take(&mut *self.snapshots.lock().unwrap());
            stream::iter(snapshots).chain(stream::pending()).boxed()
        }

        fn connection_state(&self) -> watch::Receiver<ConnectionState> {
            self.state.subscribe()
        }

        async fn post_message(&self, user: &str, content: &str) -> Result<(), ClientError> {
            self.posts
                .lock()
                .unwrap()
                .push((user.to_string(), content.to_string()));
            if self.reject_posts {
                Err(ProtocolError::Graphql("nope".to_string()).into())
            } else {
                Ok(())
            }
        }
    }

    fn msg(id: i64, user: &str, content: &str) -> Message {
        Message {
            id,
            user: user.to_string(),
            content: content.to_string(),
        }
    }

    async fn next_event(
        events: &mut mpsc::Receiver<NetworkEvent>,
        wanted: impl Fn(&NetworkEvent) -> bool,
    ) -> NetworkEvent {
        timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.expect("worker alive");
                if wanted(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("event arrives in time")
    }

    fn spawn_worker(
        client: Arc<FakeClient>,
    ) -> (
        mpsc::Sender<NetworkCommand>,
        mpsc::Receiver<NetworkEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        spawn_worker_with_capacity(client, 8)
    }

    fn spawn_worker_with_capacity(
        client: Arc<FakeClient>,
        event_capacity: usize,
    ) -> (
        mpsc::Sender<NetworkCommand>,
        mpsc::Receiver<NetworkEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(event_capacity);
        let task = tokio::spawn(ChatNetwork::new(client, event_tx, cmd_rx).run());
        (cmd_tx, event_rx, task)
    }

    #[tokio::test]
    async fn forwards_snapshots_and_connection_changes() {
        let client = FakeClient::new(vec![vec![msg(1, "Ann", "hi")]], false);
        let (_cmd_tx, mut events, _task) = spawn_worker(Arc::clone(&client));

        let first = next_event(&mut events, |e| matches!(e, NetworkEvent::ConnectionChanged(_))).await;
        assert_eq!(first, NetworkEvent::ConnectionChanged(ConnectionState::Connecting));

        let update = next_event(&mut events, |e| matches!(e, NetworkEvent::MessagesUpdated(_))).await;
        assert_eq!(update, NetworkEvent::MessagesUpdated(vec![msg(1, "Ann", "hi")]));

        client.state.send_replace(ConnectionState::Connected);
        let changed = next_event(&mut events, |e| {
            *e == NetworkEvent::ConnectionChanged(ConnectionState::Connected)
        })
        .await;
        assert_eq!(changed, NetworkEvent::ConnectionChanged(ConnectionState::Connected));
    }

    #[tokio::test]
    async fn post_command_runs_the_mutation() {
        let client = FakeClient::new(Vec::new(), false);
        let (cmd_tx, mut events, _task) = spawn_worker(Arc::clone(&client));

        cmd_tx
            .send(NetworkCommand::PostMessage {
                user: "Ann".to_string(),
                content: "hello".to_string(),
            })
            .await
            .unwrap();

        let event = next_event(&mut events, |e| {
            matches!(e, NetworkEvent::PostDelivered | NetworkEvent::PostFailed { .. })
        })
        .await;
        assert_eq!(event, NetworkEvent::PostDelivered);
        assert_eq!(
            *client.posts.lock().unwrap(),
            vec![("Ann".to_string(), "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_post_is_surfaced() {
        let client = FakeClient::new(Vec::new(), true);
        let (cmd_tx, mut events, _task) = spawn_worker(client);

        cmd_tx
            .send(NetworkCommand::PostMessage {
                user: "Ann".to_string(),
                content: "hello".to_string(),
            })
            .await
            .unwrap();

        let event = next_event(&mut events, |e| {
            matches!(e, NetworkEvent::PostDelivered | NetworkEvent::PostFailed { .. })
        })
        .await;
        match event {
            NetworkEvent::PostFailed { reason } => assert!(reason.contains("nope"), "{reason}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lagging_ui_gets_only_the_latest_snapshot() {
        let snapshots = vec![
            vec![msg(1, "Ann", "one")],
            vec![msg(1, "Ann", "one"), msg(2, "Bo", "two")],
            vec![msg(1, "Ann", "one"), msg(2, "Bo", "two"), msg(3, "Cy", "three")],
        ];
        let client = FakeClient::new(snapshots.clone(), false);
        // The initial connection event alone fills the channel.
        let (cmd_tx, mut events, _task) = spawn_worker_with_capacity(Arc::clone(&client), 1);

        cmd_tx
            .send(NetworkCommand::PostMessage {
                user: "Ann".to_string(),
                content: "still moving".to_string(),
            })
            .await
            .unwrap();
        timeout(Duration::from_secs(5), async {
            while client.posts.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("commands are handled while the UI is not reading");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut received = Vec::new();
        while let Ok(Some(event)) = timeout(Duration::from_millis(200), events.recv()).await {
            received.push(event);
        }

        assert_eq!(
            received.first(),
            Some(&NetworkEvent::ConnectionChanged(ConnectionState::Connecting))
        );
        let updates: Vec<&NetworkEvent> = received
            .iter()
            .filter(|e| matches!(e, NetworkEvent::MessagesUpdated(_)))
            .collect();
        assert_eq!(updates, vec![&NetworkEvent::MessagesUpdated(snapshots[2].clone())]);
        assert!(received.contains(&NetworkEvent::PostDelivered));
    }

    #[test]
    fn backlog_keeps_the_newest_state_of_each_kind() {
        let mut backlog = Backlog::default();
        assert!(backlog.is_empty());

        backlog.push(NetworkEvent::MessagesUpdated(vec![msg(1, "Ann", "old")]));
        backlog.push(NetworkEvent::ConnectionChanged(ConnectionState::Connecting));
        backlog.push(NetworkEvent::MessagesUpdated(vec![msg(1, "Ann", "new")]));
        backlog.push(NetworkEvent::ConnectionChanged(ConnectionState::Connected));

        assert_eq!(
            backlog.pop(),
            Some(NetworkEvent::ConnectionChanged(ConnectionState::Connected))
        );
        assert_eq!(
            backlog.pop(),
            Some(NetworkEvent::MessagesUpdated(vec![msg(1, "Ann", "new")]))
        );
        assert_eq!(backlog.pop(), None);
        assert!(backlog.is_empty());
    }

    #[tokio::test]
    async fn stops_when_the_ui_goes_away() {
        let client = FakeClient::new(Vec::new(), false);
        let (cmd_tx, _events, task) = spawn_worker(client);

        drop(cmd_tx);
        timeout(Duration::from_secs(5), task)
            .await
            .expect("worker exits")
            .unwrap();
    }
}
