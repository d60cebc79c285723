//! Loopback graphql-ws server for transport and client tests.

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};

use super::protocol::{MESSAGES_SUBSCRIPTION, SUBPROTOCOL};

pub type ServerSocket = WebSocketStream<TcpStream>;

pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/", listener.local_addr().unwrap());
    (listener, endpoint)
}

pub async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    accept_hdr_async(stream, |_req: &Request, mut response: Response| {
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
        Ok::<_, ErrorResponse>(response)
    })
    .await
    .unwrap()
}

pub async fn next_json(socket: &mut ServerSocket) -> Value {
    loop {
        match socket.next().await {
            Some(Ok(WsMessage::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("socket ended early: {other:?}"),
        }
    }
}

pub async fn send_json(socket: &mut ServerSocket, value: Value) {
    socket.send(WsMessage::Text(value.to_string())).await.unwrap();
}

/// Ack the handshake and return the subscription's operation id.
pub async fn handshake(socket: &mut ServerSocket) -> String {
    let init = next_json(socket).await;
    assert_eq!(init["type"], "connection_init");
    send_json(socket, json!({"type": "connection_ack"})).await;
    send_json(socket, json!({"type": "ka"})).await;

    let start = next_json(socket).await;
    assert_eq!(start["type"], "start");
    assert_eq!(start["payload"]["query"], MESSAGES_SUBSCRIPTION);
    start["id"].as_str().unwrap().to_string()
}

pub async fn push_messages(socket: &mut ServerSocket, id: &str, messages: Value) {
    send_json(
        socket,
        json!({"type": "data", "id": id, "payload": {"data": {"messages": messages}}}),
    )
    .await;
}

/// Keep the socket open until the client hangs up.
pub async fn drain(socket: &mut ServerSocket) {
    while let Some(Ok(_)) = socket.next().await {}
}
