//! Per-connection handler: WebSocket upgrade, then a request loop.
//!
//! Each accepted TCP stream gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade to WebSocket
//!   2. Loop: receive a frame → decode `Envelope<Request>` → dispatch →
//!      reply with `Envelope<Response>` carrying the same `id`
//!   3. Stop on close, transport error, or idle timeout
//!
//! No handshake: every request carries its own credentials (a password
//! or a ticket), so a connection holds no authenticated state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use gatehouse_protocol::{Codec, Envelope, ErrorKind, Request, Response};
use gatehouse_session::SessionStore;
use gatehouse_store::Persistence;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

use crate::log::EventLog;
use crate::password::PasswordHasher;
use crate::server::ServerState;
use crate::GatehouseError;

/// Counter for connection ids in log lines.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Correlation id used when a frame is too broken to read its own.
const UNKNOWN_REQUEST_ID: u64 = 0;

/// Whether the client spoke in text or binary frames. Replies use the
/// same kind, so a browser sending text gets text back.
#[derive(Clone, Copy)]
enum FrameKind {
    Text,
    Binary,
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection<P, S, H, L, C>(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState<P, S, H, L, C>>,
) -> Result<(), GatehouseError>
where
    P: Persistence,
    S: SessionStore,
    H: PasswordHasher,
    L: EventLog,
    C: Codec,
{
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(conn_id, %peer, "accepted WebSocket connection");

    loop {
        let msg = match tokio::time::timeout(state.idle_timeout, ws.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                tracing::debug!(conn_id, error = %e, "recv error");
                break;
            }
            Ok(None) => {
                tracing::debug!(conn_id, "connection closed");
                break;
            }
            Err(_) => {
                tracing::info!(conn_id, "connection idle, closing");
                // Best effort; the peer may already be gone.
                let _ = ws.close(None).await;
                break;
            }
        };

        let (data, kind) = match msg {
            Message::Text(text) => (text.as_bytes().to_vec(), FrameKind::Text),
            Message::Binary(data) => (data.to_vec(), FrameKind::Binary),
            Message::Close(_) => {
                tracing::debug!(conn_id, "client sent close");
                break;
            }
            // Pings are answered by tungstenite itself.
            _ => continue,
        };

        let reply = handle_frame(&state, conn_id, &data).await;
        let bytes = state.codec.encode(&reply)?;
        ws.send(into_message(bytes, kind)).await?;
    }

    Ok(())
}

/// Decodes one request frame and produces its reply envelope.
async fn handle_frame<P, S, H, L, C>(
    state: &ServerState<P, S, H, L, C>,
    conn_id: u64,
    data: &[u8],
) -> Envelope<Response>
where
    P: Persistence,
    S: SessionStore,
    H: PasswordHasher,
    L: EventLog,
    C: Codec,
{
    let envelope: Envelope<Request> = match state.codec.decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "failed to decode request");
            return Envelope::new(
                UNKNOWN_REQUEST_ID,
                Response::error(ErrorKind::Validation, format!("malformed request: {e}")),
            );
        }
    };

    let id = envelope.id;
    tracing::trace!(conn_id, id, op = envelope.body.op(), "request");
    Envelope::new(id, state.service.dispatch(envelope.body).await)
}

fn into_message(bytes: Vec<u8>, kind: FrameKind) -> Message {
    match kind {
        // Codec output is JSON, which is always UTF-8.
        FrameKind::Text => Message::text(String::from_utf8_lossy(&bytes).into_owned()),
        FrameKind::Binary => Message::binary(bytes),
    }
}
