use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::AppState;
use crate::delivery::http::v1::extract::ApiQuery;
use crate::domain::{topic::Topic, user::Identity};
use crate::usecase::error::UsecaseError;

const OUTBOUND_BUFFER: usize = 64;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ApiQuery(query): ApiQuery<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(token) = query.token else {
        tracing::warn!("WS connection rejected: missing token");
        return UsecaseError::Unauthorized("Unauthenticated.".to_string()).into_response();
    };

    let identity = match state.jwt_service.authenticate(&token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "WS connection rejected: invalid token");
            return UsecaseError::Unauthorized("Unauthenticated.".to_string()).into_response();
        }
    };

    tracing::info!(user_id = %identity.user_id, "WS connection accepted, upgrading");

    ws.on_upgrade(move |socket| handle_socket(socket, identity, state))
}

async fn handle_socket(socket: WebSocket, identity: Identity, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let mut subscriptions: HashMap<Topic, JoinHandle<()>> = HashMap::new();
    let user_id = identity.user_id;

    tracing::info!(user_id = %user_id, "WS client connected");

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => {
                let Some(payload) = outbound else { break };
                if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                    tracing::info!(user_id = %user_id, "WS send failed, client disconnected");
                    break;
                }
            }
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(
                            text.as_str(),
                            &identity,
                            &state,
                            &mut subscriptions,
                            &outbound_tx,
                        )
                        .await;
                        if ws_sender.send(Message::Text(reply.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(user_id = %user_id, "WS client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user_id, error = %e, "WS receive error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    for (topic, forwarder) in subscriptions {
        unsubscribe(&state, topic, forwarder).await;
    }
}

async fn handle_client_message(
    text: &str,
    identity: &Identity,
    state: &AppState,
    subscriptions: &mut HashMap<Topic, JoinHandle<()>>,
    outbound: &mpsc::Sender<String>,
) -> String {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(user_id = %identity.user_id, error = %e, "malformed WS message");
            return json!({ "event": "error", "message": "Malformed message" }).to_string();
        }
    };

    match message {
        ClientMessage::Subscribe { topic: requested } => {
            let Some(topic) = state.authorizer.authorize(identity, &requested).await else {
                return json!({
                    "event": "subscription_error",
                    "topic": requested,
                    "message": "Forbidden",
                })
                .to_string();
            };

            if !subscriptions.contains_key(&topic) {
                let receiver = state.hub.subscribe(topic).await;
                subscriptions.insert(topic, spawn_forwarder(topic, receiver, outbound.clone()));
                tracing::info!(user_id = %identity.user_id, %topic, "subscribed");
            }
            json!({ "event": "subscription_succeeded", "topic": topic }).to_string()
        }
        ClientMessage::Unsubscribe { topic: requested } => {
            if let Ok(topic) = requested.parse::<Topic>() {
                if let Some(forwarder) = subscriptions.remove(&topic) {
                    unsubscribe(state, topic, forwarder).await;
                    tracing::info!(user_id = %identity.user_id, %topic, "unsubscribed");
                }
            }
            json!({ "event": "unsubscribed", "topic": requested }).to_string()
        }
    }
}

fn spawn_forwarder(
    topic: Topic,
    mut receiver: broadcast::Receiver<String>,
    outbound: mpsc::Sender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(payload) => {
                    if outbound.send(payload).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(%topic, lagged = n, "WS client lagged, some messages were skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!(%topic, "broadcast channel closed");
                    break;
                }
            }
        }
    })
}

async fn unsubscribe(state: &AppState, topic: Topic, forwarder: JoinHandle<()>) {
    forwarder.abort();
    // The receiver is only dropped once the aborted task has finished.
    let _ = forwarder.await;
    state.hub.release(&topic).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parsing() {
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"action":"subscribe","topic":"admin-channel"}"#).unwrap(),
            ClientMessage::Subscribe {
                topic: "admin-channel".to_string()
            }
        );
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"action":"unsubscribe","topic":"user.1"}"#).unwrap(),
            ClientMessage::Unsubscribe {
                topic: "user.1".to_string()
            }
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"publish","topic":"x"}"#).is_err());
    }

    #[tokio::test]
    async fn test_forwarder_relays_hub_messages() {
        let hub = crate::usecase::broadcast::BroadcastHub::default();
        let topic = Topic::Admin;
        let (tx, mut rx) = mpsc::channel(4);
        let forwarder = spawn_forwarder(topic, hub.subscribe(topic).await, tx);

        hub.publish(&topic, "ping".to_string()).await;

        assert_eq!(rx.recv().await.unwrap(), "ping");
        forwarder.abort();
    }
}
