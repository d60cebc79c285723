//! Wire format of the `graphql-ws` WebSocket sub-protocol
//! (subscriptions-transport-ws) and the GraphQL request/response envelopes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::Message;

use super::error::ProtocolError;

pub const SUBPROTOCOL: &str = "graphql-ws";

pub const MESSAGES_SUBSCRIPTION: &str = "subscription { messages { id user content } }";

pub const POST_MESSAGE_MUTATION: &str =
    "mutation($user: String!, $content: String!) { postMessage(user: $user, content: $content) }";

#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<V> {
    pub query: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<V>,
}

impl GraphqlRequest<Value> {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            variables: None,
        }
    }
}

impl<V: Serialize> GraphqlRequest<V> {
    pub fn with_variables(query: &'static str, variables: V) -> Self {
        Self {
            query,
            variables: Some(variables),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostMessageVariables<'a> {
    pub user: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    /// Fails if the server reported any error, otherwise hands back the raw data.
    pub fn into_result(self) -> Result<Option<Value>, ProtocolError> {
        if self.errors.is_empty() {
            return Ok(self.data);
        }
        let joined = self
            .errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Err(ProtocolError::Graphql(joined))
    }

    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ProtocolError> {
        let data = self.into_result()?.ok_or(ProtocolError::MissingData)?;
        Ok(serde_json::from_value(data)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessagesData {
    pub messages: Vec<Message>,
}

/// Frames sent by the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Start {
        id: String,
        payload: GraphqlRequest<Value>,
    },
    Stop {
        id: String,
    },
    ConnectionTerminate,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    ConnectionAck,
    ConnectionError {
        #[serde(default)]
        payload: Option<Value>,
    },
    Ka,
    Data {
        id: String,
        payload: GraphqlResponse,
    },
    Error {
        id: String,
        #[serde(default)]
        payload: Option<Value>,
    },
    Complete {
        id: String,
    },
}

pub fn encode(frame: &ClientFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

pub fn decode(text: &str) -> Result<ServerFrame, serde_json::Error> {
    serde_json::from_str(text)
}
