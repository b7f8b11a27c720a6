//! Per-connection plumbing between the transport and the room task.
//!
//! Each accepted socket gets two tasks: a reader that forwards raw text
//! frames into the room's command channel, and a writer that drains the
//! room's outbound queue for this connection. Neither decodes anything —
//! the room owns the protocol.

use bonkhost_room::{ConnId, Outbound, RoomHandle};
use bonkhost_transport::{HttpRequest, WsConnection, WsReader, WsWriter};
use serde_json::json;
use tokio::sync::mpsc;

use crate::ServerError;

/// Drives one WebSocket connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WsConnection,
    room: RoomHandle,
) -> Result<(), ServerError> {
    let conn_id = ConnId(conn.id().into_inner());
    let ip = conn.peer_ip();
    let (writer, reader) = conn.split();

    let (tx, rx) = mpsc::unbounded_channel();
    room.connected(conn_id, ip, tx).await?;

    // The writer task ends on its own once the room drops this
    // connection's sender.
    tokio::spawn(write_loop(writer, rx));

    let result = read_loop(reader, conn_id, &room).await;

    // Observed at the next packet boundary; releases the slot and
    // broadcasts the leave.
    let _ = room.disconnected(conn_id).await;
    result
}

async fn read_loop(
    mut reader: WsReader,
    conn: ConnId,
    room: &RoomHandle,
) -> Result<(), ServerError> {
    loop {
        match reader.next_text().await {
            Ok(Some(text)) => room.frame(conn, text).await?,
            Ok(None) => {
                tracing::debug!(%conn, "connection closed");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn, error = %e, "connection lost");
                return Ok(());
            }
        }
    }
}

async fn write_loop(mut writer: WsWriter, mut rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Frame(text) => {
                if writer.send_text(text).await.is_err() {
                    break;
                }
            }
            Outbound::Close => {
                let _ = writer.close().await;
                break;
            }
        }
    }
}

/// Answers the plain-HTTP metadata probe.
pub(crate) async fn handle_metadata(request: HttpRequest, room: RoomHandle) {
    let Ok(snapshot) = room.snapshot().await else {
        return;
    };
    let body = json!({
        "isBonkServer": true,
        "roomname": snapshot.room_name,
        "password": u8::from(snapshot.has_password),
        "players": snapshot.players,
        "maxplayers": snapshot.max_players,
        "mode_ga": snapshot.engine,
        "mode_mo": snapshot.mode,
    })
    .to_string();

    if let Err(e) = request.respond_json(&body).await {
        tracing::debug!(error = %e, "metadata response failed");
    }
}
