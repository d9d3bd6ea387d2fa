use crate::state::SimState;
use axum::{
    Router,
    extract::State,
    extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use leveler_shared::{Command, WS_PATH, WsInMsg};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

pub fn router(state: Arc<SimState>) -> Router {
    Router::new()
        .route(WS_PATH, get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<SimState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<SimState>) {
    info!("console connected");
    let mut out_rx = state.out_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    // Task: simulator -> console
    let send_task = async move {
        loop {
            match out_rx.recv().await {
                Ok(msg) => {
                    let text = match serde_json::to_string(&msg) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("failed to encode outbound message: {e}");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(Utf8Bytes::from(text))).await.is_err() {
                        break;
                    }
                }
                // Only the latest status matters; skip what we missed.
                Err(RecvError::Lagged(n)) => debug!("console lagged by {n} messages"),
                Err(RecvError::Closed) => break,
            }
        }
    };

    // Task: console -> simulator (commands)
    let recv_state = state.clone();
    let recv_task = async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_inbound(&recv_state, text.as_str()),
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    // Run until either direction ends
    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }
    info!("console disconnected");
}

/// Applies every command line in `text` and publishes the replies.
/// Lines that do not decode are logged and skipped.
pub fn handle_inbound(state: &SimState, text: &str) {
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let command = match serde_json::from_str::<Command>(line) {
            Ok(command) => command,
            Err(e) => {
                warn!("invalid command JSON {line:?}: {e}");
                continue;
            }
        };
        debug!("applying '{}'", command.name());
        let replies = state.platform().apply(&command);
        for msg in replies {
            state.publish(WsInMsg::Log { msg });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leveler_shared::MotorId;

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<WsInMsg>) -> Vec<WsInMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn commands_are_applied_and_answered() {
        let state = SimState::default();
        let mut rx = state.out_tx.subscribe();
        handle_inbound(
            &state,
            "{\"cmd\":\"motor\",\"id\":1,\"steps\":100}\n{\"cmd\":\"serial\",\"text\":\"mpos\"}",
        );
        assert_eq!(state.platform().position(MotorId::M1), 100);
        assert_eq!(
            drain(&mut rx),
            vec![
                WsInMsg::Log {
                    msg: "M1 -> 100".to_string()
                },
                WsInMsg::Log {
                    msg: "M1=100 M2=0".to_string()
                },
            ]
        );
    }

    #[test]
    fn malformed_commands_are_ignored() {
        let state = SimState::default();
        let mut rx = state.out_tx.subscribe();
        handle_inbound(&state, "{\"cmd\":\"warp\"}\nnot json\n{\"cmd\":\"motor\",\"id\":3,\"steps\":1}");
        assert!(drain(&mut rx).is_empty());
        assert_eq!(state.platform().position(MotorId::M1), 0);
    }
}
