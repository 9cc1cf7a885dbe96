//! Bridge session (C2): one attached WebSocket. No knowledge of correlation
//! ids, heartbeats, or tools lives here — decode happens in the recv loop
//! (C1 is stateless), dispatch happens one layer up in the manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::types::{self, InboundMessage, OutboundMessage};
use crate::error::BridgeError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Owns the send side of one attached link. A dedicated mutex serializes
/// writes so concurrent callers can never interleave frames on the wire.
pub struct BridgeSession {
    writer: Mutex<SplitSink<WsStream, Message>>,
    closed: AtomicBool,
}

impl BridgeSession {
    /// Splits a freshly-connected WebSocket into a session (send side) and
    /// the raw receive stream, which the caller hands to [`recv_loop`].
    pub fn split(stream: WsStream) -> (Arc<Self>, SplitStream<WsStream>) {
        let (sink, stream) = stream.split();
        let session = Arc::new(BridgeSession {
            writer: Mutex::new(sink),
            closed: AtomicBool::new(false),
        });
        (session, stream)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Serializes `message` and writes one text frame. Fails with
    /// `NotConnected` if the link has already been observed closed.
    pub async fn send(&self, message: &OutboundMessage) -> Result<(), BridgeError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BridgeError::NotConnected);
        }
        let text = types::encode_outbound(message);
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.send(Message::Text(text.into())).await {
            self.closed.store(true, Ordering::Release);
            tracing::warn!(error = %err, "failed to write bridge frame, marking session closed");
            return Err(BridgeError::NotConnected);
        }
        Ok(())
    }

    /// Initiates a graceful close; idempotent. `code`/`reason` are only
    /// meaningful the first time — later calls are no-ops.
    pub async fn close(&self, code: u16, reason: &str) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut writer = self.writer.lock().await;
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        let _ = writer.send(Message::Close(Some(frame))).await;
    }
}

/// Runs the receive side of one attached link to completion. Each decoded
/// message is handed to `tx`; a frame that fails to decode is logged and
/// dropped without ending the loop. The loop ends — and `tx` is dropped,
/// signalling disconnect to whoever holds the paired receiver — on a clean
/// close, a socket error, or a decode storm is not a thing we treat
/// specially (decode failures never close the link; only a transport-level
/// error or close frame does).
pub async fn recv_loop(mut stream: SplitStream<WsStream>, tx: mpsc::UnboundedSender<InboundMessage>) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match types::decode_inbound(&text) {
                Ok(message) => {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropping undecodable bridge frame");
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                tracing::warn!(error = %err, "bridge socket error, ending receive loop");
                break;
            }
        }
    }
}
