use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use uuid::Uuid;

use crate::common::{ConnectionState, Message};

use super::error::{ClientError, ProtocolError, TransportError};
use super::protocol::{
    self, ClientFrame, GraphqlError, GraphqlRequest, MESSAGES_SUBSCRIPTION, MessagesData,
    POST_MESSAGE_MUTATION, PostMessageVariables, SUBPROTOCOL, ServerFrame,
};

/// Exponential backoff between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` keeps retrying forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

/// What the link hands to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A (re)connect finished its handshake; previously received data is stale.
    Connected,
    Messages(Vec<Message>),
}

type Reply = oneshot::Sender<Result<(), ClientError>>;

/// A `postMessage` mutation waiting to be sent on the live connection.
///
/// Dropping `reply` unanswered means the connection went away first.
#[derive(Debug)]
pub struct MutationRequest {
    pub user: String,
    pub content: String,
    pub reply: Reply,
}

enum SessionEnd {
    ServerClosed,
    ConsumerGone,
}

/// Long-lived WebSocket connection carrying the messages subscription and
/// every mutation.
pub struct TransportLink {
    endpoint: String,
    policy: ReconnectPolicy,
    ack_timeout: Duration,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl TransportLink {
    pub fn new(
        endpoint: String,
        policy: ReconnectPolicy,
        ack_timeout: Duration,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> Self {
        Self {
            endpoint,
            policy,
            ack_timeout,
            state,
        }
    }

    /// Keep the subscription open until the consumer drops `events` or the
    /// reconnect policy is exhausted. Mutations queued on `requests` go out
    /// whenever a connection is up.
    pub async fn run(
        self,
        events: mpsc::Sender<LinkEvent>,
        mut requests: mpsc::Receiver<MutationRequest>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            if attempt == 0 {
                self.publish(ConnectionState::Connecting);
            }

            let mut established = false;
            match self.session(&events, &mut requests, &mut established).await {
                Ok(SessionEnd::ConsumerGone) => {
                    log::info!("Subscription consumer dropped; closing link to {}", self.endpoint);
                    return;
                }
                Ok(SessionEnd::ServerClosed) => {
                    log::warn!("Subscription connection to {} closed", self.endpoint);
                }
                Err(err) => {
                    log::warn!("Subscription connection to {} failed: {err}", self.endpoint);
                }
            }

            if events.is_closed() {
                return;
            }
            if established {
                attempt = 0;
            }
            attempt += 1;

            if !self.policy.allows(attempt) {
                let attempts = attempt - 1;
                log::error!(
                    "Giving up on {} after {attempts} reconnect attempts",
                    self.endpoint
                );
                self.publish(ConnectionState::Failed { attempts });
                return;
            }

            let retry_in = self.policy.delay_for(attempt);
            self.publish(ConnectionState::Reconnecting { attempt, retry_in });
            sleep(retry_in).await;
        }
    }

    async fn session(
        &self,
        events: &mpsc::Sender<LinkEvent>,
        requests: &mut mpsc::Receiver<MutationRequest>,
        established: &mut bool,
    ) -> Result<SessionEnd, TransportError> {
        let mut request = self.endpoint.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

        let (socket, _) = connect_async(request).await?;
        let (mut writer, mut reader) = socket.split();

        send_frame(&mut writer, &ClientFrame::ConnectionInit { payload: None }).await?;
        timeout(self.ack_timeout, wait_for_ack(&mut reader))
            .await
            .map_err(|_| TransportError::AckTimeout)??;

        *established = true;
        log::info!("Connected to {}", self.endpoint);
        self.publish(ConnectionState::Connected);
        if events.send(LinkEvent::Connected).await.is_err() {
            return Ok(SessionEnd::ConsumerGone);
        }

        let operation_id = Uuid::new_v4().to_string();
        send_frame(
            &mut writer,
            &ClientFrame::Start {
                id: operation_id.clone(),
                payload: GraphqlRequest::new(MESSAGES_SUBSCRIPTION),
            },
        )
        .await?;

        // In-flight mutations by operation id; dropped unanswered with the session.
        let mut pending: HashMap<String, Reply> = HashMap::new();
        let mut accepting = true;

        loop {
            let frame = tokio::select! {
                frame = reader.next() => frame,
                request = requests.recv(), if accepting => {
                    match request {
                        Some(request) if request.reply.is_closed() => {
                            log::debug!("Skipping postMessage whose caller gave up");
                        }
                        Some(request) => {
                            let id = Uuid::new_v4().to_string();
                            send_frame(&mut writer, &mutation_frame(&id, &request)?).await?;
                            log::debug!("postMessage sent as operation {id}");
                            pending.insert(id, request.reply);
                        }
                        None => accepting = false,
                    }
                    continue;
                }
                _ = events.closed() => {
                    shutdown(&mut writer, &operation_id).await;
                    return Ok(SessionEnd::ConsumerGone);
                }
            };
            let Some(frame) = frame else {
                return Ok(SessionEnd::ServerClosed);
            };

            let text = match frame? {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => return Ok(SessionEnd::ServerClosed),
                _ => continue,
            };
            log::debug!("<- {text}");

            let frame = match protocol::decode(&text) {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("Ignoring malformed frame: {err}");
                    continue;
                }
            };

            match frame {
                ServerFrame::Data { id, payload } if id == operation_id => {
                    match payload.into_data::<MessagesData>() {
                        Ok(data) => {
                            if events.send(LinkEvent::Messages(data.messages)).await.is_err() {
                                shutdown(&mut writer, &operation_id).await;
                                return Ok(SessionEnd::ConsumerGone);
                            }
                        }
                        Err(err) => log::warn!("Ignoring subscription payload: {err}"),
                    }
                }
                ServerFrame::Error { id, payload } if id == operation_id => {
                    return Err(TransportError::Rejected(format!(
                        "subscription error: {}",
                        error_message(payload)
                    )));
                }
                ServerFrame::Complete { id } if id == operation_id => {
                    return Ok(SessionEnd::ServerClosed);
                }
                ServerFrame::Data { id, payload } => {
                    let result = payload.into_result().map(|_| ()).map_err(ClientError::from);
                    resolve(&mut pending, &id, result);
                }
                ServerFrame::Error { id, payload } => {
                    let reason = error_message(payload);
                    resolve(&mut pending, &id, Err(ProtocolError::Graphql(reason).into()));
                }
                ServerFrame::Complete { id } => {
                    // Still pending here means no data frame came first.
                    resolve(&mut pending, &id, Err(ProtocolError::MissingData.into()));
                }
                ServerFrame::ConnectionError { payload } => {
                    return Err(TransportError::Rejected(error_message(payload)));
                }
                ServerFrame::Ka | ServerFrame::ConnectionAck => {}
            }
        }
    }

    fn publish(&self, state: ConnectionState) {
        log::debug!("Connection state: {state}");
        self.state.send_replace(state);
    }
}

fn mutation_frame(id: &str, request: &MutationRequest) -> Result<ClientFrame, TransportError> {
    let variables = serde_json::to_value(PostMessageVariables {
        user: &request.user,
        content: &request.content,
    })?;
    Ok(ClientFrame::Start {
        id: id.to_string(),
        payload: GraphqlRequest::with_variables(POST_MESSAGE_MUTATION, variables),
    })
}

fn resolve(pending: &mut HashMap<String, Reply>, id: &str, result: Result<(), ClientError>) {
    match pending.remove(id) {
        Some(reply) => {
            // The caller may have timed out and gone away.
            let _ = reply.send(result);
        }
        None => log::debug!("Ignoring frame for unknown operation {id}"),
    }
}

async fn wait_for_ack<S>(reader: &mut S) -> Result<(), TransportError>
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = reader.next().await {
        let text = match frame? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => return Err(TransportError::Closed),
            _ => continue,
        };
        match protocol::decode(&text) {
            Ok(ServerFrame::ConnectionAck) => return Ok(()),
            Ok(ServerFrame::Ka) => continue,
            Ok(ServerFrame::ConnectionError { payload }) => {
                return Err(TransportError::Rejected(error_message(payload)));
            }
            Ok(other) => return Err(TransportError::UnexpectedFrame(format!("{other:?}"))),
            Err(err) => log::warn!("Ignoring malformed frame: {err}"),
        }
    }
    Err(TransportError::Closed)
}

async fn send_frame<S>(writer: &mut S, frame: &ClientFrame) -> Result<(), TransportError>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    let text = protocol::encode(frame)?;
    log::debug!("-> {text}");
    writer.send(WsMessage::Text(text)).await?;
    Ok(())
}

// Best effort: the peer may already be gone.
async fn shutdown<S>(writer: &mut S, operation_id: &str)
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    let frames = [
        ClientFrame::Stop {
            id: operation_id.to_string(),
        },
        ClientFrame::ConnectionTerminate,
    ];
    for frame in &frames {
        if let Err(err) = send_frame(writer, frame).await {
            log::debug!("Failed to send shutdown frame: {err}");
            return;
        }
    }
    let _ = writer.close().await;
}

/// Servers send either a list of GraphQL errors or a single one.
fn error_message(payload: Option<Value>) -> String {
    let Some(payload) = payload else {
        return "no details".to_string();
    };
    if let Ok(errors) = serde_json::from_value::<Vec<GraphqlError>>(payload.clone()) {
        if !errors.is_empty() {
            return errors
                .into_iter()
                .map(|error| error.message)
                .collect::<Vec<_>>()
                .join("; ");
        }
    }
    match serde_json::from_value::<GraphqlError>(payload.clone()) {
        Ok(error) => error.message,
        Err(_) => payload.to_string(),
    }
}
