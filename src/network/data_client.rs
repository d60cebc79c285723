use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;

use crate::common::{ConnectionState, Message};
use crate::config::AppConfig;

use super::cache::MessageCache;
use super::error::ClientError;
use super::transport::{LinkEvent, MutationRequest, ReconnectPolicy, TransportLink};

const LINK_BUFFER: usize = 32;

/// The two operations the chat needs from its backend.
#[async_trait]
pub trait DataClient: Send + Sync {
    /// Open the messages subscription. Every item is the full ordered list.
    fn subscribe_messages(&self) -> BoxStream<'static, Vec<Message>>;

    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    async fn post_message(&self, user: &str, content: &str) -> Result<(), ClientError>;
}

/// GraphQL backend reached over a single graphql-ws connection.
///
/// Mutations queue up until `subscribe_messages` has started the link.
pub struct GraphqlClient {
    ws_endpoint: String,
    policy: ReconnectPolicy,
    ack_timeout: Duration,
    request_timeout: Duration,
    state: Arc<watch::Sender<ConnectionState>>,
    requests: mpsc::Sender<MutationRequest>,
    // Handed to the link on the first subscribe.
    link_requests: Mutex<Option<mpsc::Receiver<MutationRequest>>>,
}

impl GraphqlClient {
    pub fn new(config: &AppConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let (requests, link_requests) = mpsc::channel(LINK_BUFFER);
        Self {
            ws_endpoint: config.ws_endpoint.clone(),
            policy: ReconnectPolicy::from(&config.reconnect),
            ack_timeout: Duration::from_secs(config.ack_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            state: Arc::new(state),
            requests,
            link_requests: Mutex::new(Some(link_requests)),
        }
    }
}

#[async_trait]
impl DataClient for GraphqlClient {
    fn subscribe_messages(&self) -> BoxStream<'static, Vec<Message>> {
        let requests = match self.link_requests.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let requests = requests.unwrap_or_else(|| {
            log::warn!("Messages subscription opened twice; mutations stay on the first link");
            mpsc::channel(1).1
        });

        let (link_tx, link_rx) = mpsc::channel(LINK_BUFFER);
        let link = TransportLink::new(
            self.ws_endpoint.clone(),
            self.policy.clone(),
            self.ack_timeout,
            Arc::clone(&self.state),
        );
        log::info!("Opening messages subscription on {}", self.ws_endpoint);
        tokio::spawn(link.run(link_tx, requests));
        snapshots(link_rx)
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn post_message(&self, user: &str, content: &str) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        let request = MutationRequest {
            user: user.to_string(),
            content: content.to_string(),
            reply,
        };

        let exchange = async {
            self.requests
                .send(request)
                .await
                .map_err(|_| ClientError::LinkClosed)?;
            response.await.map_err(|_| ClientError::ConnectionLost)?
        };
        timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout)??;

        log::debug!("postMessage accepted for {user}");
        Ok(())
    }
}

/// Fold link events through the cache into ordered snapshots.
fn snapshots(events: mpsc::Receiver<LinkEvent>) -> BoxStream<'static, Vec<Message>> {
    stream::unfold(
        (events, MessageCache::default()),
        |(mut events, mut cache)| async move {
            loop {
                match events.recv().await? {
                    LinkEvent::Connected => cache.reset(),
                    LinkEvent::Messages(messages) => {
                        let snapshot = cache.apply(messages);
                        log::debug!("Message cache holds {} entries", cache.len());
                        return Some((snapshot, (events, cache)));
                    }
                }
            }
        },
    )
    .boxed()
}
