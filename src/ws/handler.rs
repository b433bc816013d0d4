//! WebSocket session handling: token verification, room placement and the
//! per-connection read/write pump.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{ClientMsg, ServerMsg};
use crate::app::AppState;
use crate::game::{RoomCmd, RoomHandle};
use crate::util::rate_limit::PlayerRateLimiter;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: String,
}

/// Upgrade endpoint. The id token is verified and the uid claimed before the
/// upgrade completes, so an unauthenticated socket never reaches a room.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    let user = match state.auth.verify_id_token(&params.token).await {
        Ok(user) => user,
        Err(err) => {
            warn!(error = %err, "rejected websocket: token verification failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    if !state.rooms.claim_uid(&user.uid) {
        warn!(uid = %user.uid, "rejected websocket: uid already connected");
        return StatusCode::CONFLICT.into_response();
    }

    let uid = user.uid;
    ws.on_upgrade(move |socket| handle_socket(socket, state, uid))
}

async fn handle_socket(socket: WebSocket, state: AppState, uid: String) {
    let session_id = Uuid::new_v4();
    info!(%session_id, %uid, "websocket session opened");

    let Some((room, mut out_rx, welcome)) = seat_in_room(&state, session_id, &uid).await else {
        warn!(%session_id, %uid, "could not seat player in a room");
        state.rooms.release_uid(&uid);
        return;
    };

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer half: serialize room messages out to the socket. The welcome
    // consumed during seating goes first so it stays the opening message.
    let writer = tokio::spawn(async move {
        let mut pending = Some(welcome);
        loop {
            let msg = match pending.take() {
                Some(msg) => msg,
                None => match out_rx.recv().await {
                    Some(msg) => msg,
                    None => break,
                },
            };
            let Ok(text) = serde_json::to_string(&msg) else {
                continue;
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    read_loop(&mut ws_rx, &room, session_id).await;

    room.send(RoomCmd::Leave { session_id });
    state.rooms.release_uid(&uid);
    writer.abort();
    info!(%session_id, %uid, "websocket session closed");
}

/// Seat the session, confirming the room actually processed the join. A join
/// can land on a room that is shutting down; when that happens the answer is
/// an error (or a dropped channel) instead of a welcome, and we try a fresh
/// room.
async fn seat_in_room(
    state: &AppState,
    session_id: Uuid,
    uid: &str,
) -> Option<(RoomHandle, mpsc::UnboundedReceiver<ServerMsg>, ServerMsg)> {
    const MAX_SEAT_ATTEMPTS: usize = 3;

    for attempt in 0..MAX_SEAT_ATTEMPTS {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMsg>();
        let room = crate::game::RoomRegistry::find_or_create(&state.rooms);
        room.send(RoomCmd::Join {
            session_id,
            uid: uid.to_string(),
            tx: out_tx,
        });

        match out_rx.recv().await {
            Some(msg @ ServerMsg::Welcome { .. }) => return Some((room, out_rx, msg)),
            answer => {
                debug!(%session_id, attempt, ?answer, "room refused the join, retrying");
            }
        }
    }
    None
}

/// Pump inbound frames into the room until the client goes away. Messages
/// over the per-player rate limit are dropped, not fatal.
async fn read_loop(
    ws_rx: &mut (impl Stream<Item = Result<Message, axum::Error>> + Unpin),
    room: &RoomHandle,
    session_id: Uuid,
) {
    let limiter = PlayerRateLimiter::new();

    while let Some(frame) = ws_rx.next().await {
        let msg = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        if !limiter.check_input() {
            debug!(%session_id, "dropping input over rate limit");
            continue;
        }

        match serde_json::from_str::<ClientMsg>(&msg) {
            Ok(ClientMsg::Input {
                step,
                timestamp,
                input,
            }) => {
                room.send(RoomCmd::Input {
                    session_id,
                    step,
                    timestamp,
                    keys: input,
                });
            }
            Err(err) => {
                warn!(%session_id, error = %err, "ignoring malformed client message");
            }
        }
    }
}
