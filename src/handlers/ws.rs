use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::db::UserId;
use crate::middleware::AuthenticatedUser;
use crate::router::DevsyncState;
use crate::service::{Connection, HubHandle};

/// GET /ws/updates -> live `stats_updated` pushes for the authenticated user.
pub async fn updates_handler(
    State(state): State<DevsyncState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    ws: WebSocketUpgrade,
) -> Response {
    let hub = state.hub.clone();
    let capacity = state.outbound_capacity;
    ws.on_upgrade(move |socket| serve_session(socket, hub, user_id, capacity))
}

async fn serve_session(socket: WebSocket, hub: HubHandle, user_id: UserId, capacity: usize) {
    let (conn, outbound) = Connection::new(user_id, capacity);
    let conn_id = conn.id();
    if let Err(e) = hub.register(conn) {
        warn!(user_id, "rejecting session, hub unavailable: {}", e);
        return;
    }
    debug!(user_id, conn_id, "live session opened");

    let (sink, stream) = socket.split();
    let mut write_loop = tokio::spawn(write_loop(sink, outbound));
    let mut read_loop = tokio::spawn(read_loop(stream));

    tokio::select! {
        // Client went away: unregistering closes the queue and ends the writer.
        _ = &mut read_loop => {}
        // Shed by the hub or the transport failed.
        _ = &mut write_loop => read_loop.abort(),
    }
    hub.unregister(user_id, conn_id);
    debug!(user_id, conn_id, "live session closed");
}

async fn write_loop(
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.into())).await {
            debug!("websocket write failed: {}", e);
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Inbound frames carry no application data; this only watches for the end of the session.
async fn read_loop(mut stream: futures::stream::SplitStream<WebSocket>) {
    while let Some(Ok(msg)) = stream.next().await {
        if let Message::Close(_) = msg {
            break;
        }
    }
}
