//! Live stream endpoint: one websocket per viewer.
//!
//! Each connection registers a [`ChannelViewer`] with the hub and runs two
//! halves side by side:
//!
//! - a writer task that drains the viewer's outbox and sends one text frame
//!   per record, giving up after `write_timeout` on any single frame
//! - the read side, which ignores client frames and only watches for the
//!   peer going away
//!
//! Whichever half ends first ends the connection, and the viewer is
//! unregistered. If the hub dropped the viewer first, that is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use loglens_core::{ChannelViewer, Viewer, ViewerOutbox};
use tokio::time::timeout;

use crate::AppState;

pub(crate) async fn stream_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_failed_upgrade(move |e| log::warn!("Websocket upgrade from {} failed: {}", peer, e))
        .on_upgrade(move |socket| handle_viewer_socket(socket, peer, state))
}

async fn handle_viewer_socket(socket: WebSocket, peer: SocketAddr, state: AppState) {
    let (viewer, outbox) = ChannelViewer::new(peer.to_string(), state.viewer_outbox);
    let viewer_id = viewer.id();

    if let Err(e) = state.hub.register(Box::new(viewer)).await {
        log::warn!("Not streaming to {}: {}", peer, e);
        return;
    }

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_records(sink, outbox, state.write_timeout));

    loop {
        tokio::select! {
            _ = &mut writer => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    log::debug!("Websocket read error from {}: {}", peer, e);
                    break;
                }
                // viewers only listen
                Some(Ok(_)) => {}
            },
        }
    }

    writer.abort();
    // the hub may already be gone during shutdown
    let _ = state.hub.unregister(viewer_id).await;
}

async fn write_records<S>(mut sink: S, mut outbox: ViewerOutbox, write_timeout: Duration)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(record) = outbox.recv().await {
        let frame = Message::Text(record.raw().to_owned());
        match timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::debug!("Viewer {} write failed: {}", outbox.id(), e);
                return;
            }
            Err(_) => {
                log::warn!(
                    "Viewer {} stalled for {:?}, disconnecting",
                    outbox.id(),
                    write_timeout
                );
                return;
            }
        }
    }

    // outbox closed by the hub
    let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
}
