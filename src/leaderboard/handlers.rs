use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::feed::LeaderboardEntry;
use crate::state::AppState;

pub fn leaderboard_routes() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/leaderboard/ws", get(leaderboard_ws))
}

pub async fn get_leaderboard(State(state): State<AppState>) -> Json<Vec<LeaderboardEntry>> {
    Json(state.leaderboard.snapshot())
}

/// Upgrades to a WebSocket that receives the ranking on connect and after
/// every change.
pub async fn leaderboard_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let board = state.leaderboard.watch();
    ws.on_upgrade(move |socket| handle_socket(socket, board))
}

async fn handle_socket(socket: WebSocket, mut board: watch::Receiver<Vec<LeaderboardEntry>>) {
    info!("leaderboard socket connected");
    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        loop {
            let ranking = board.borrow_and_update().clone();
            let text = match serde_json::to_string(&ranking) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "cannot encode leaderboard");
                    break;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                debug!("leaderboard sink closed");
                break;
            }
            if board.changed().await.is_err() {
                break;
            }
        }
    });

    // inbound messages are ignored; the loop only watches for the close
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "leaderboard socket receive error");
                break;
            }
        }
    }

    send_task.abort();
    info!("leaderboard socket disconnected");
}
