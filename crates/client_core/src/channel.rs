//! One duplex websocket connection, surfaced as an ordered stream of events.
//!
//! A channel never reconnects. Once it reports [`ChannelEvent::Close`] (or is
//! closed locally) every further send fails with [`ChannelError::Closed`].

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};
use tracing::{debug, info, warn};
use url::Url;

/// Close code reported when the peer vanished without a close handshake.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when the peer closed without giving a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect {channel} channel to {url}: {reason}")]
    Connect {
        channel: &'static str,
        url: String,
        reason: String,
    },
    #[error("{channel} channel is closed")]
    Closed { channel: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn into_text(self) -> String {
        match self {
            Frame::Text(text) => text,
            Frame::Binary(bytes) => shared::codec::decode_log_line(&bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(Frame),
    Close { code: u16, reason: String },
    Error(String),
}

pub struct Channel {
    label: &'static str,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    reader: JoinHandle<()>,
}

impl Channel {
    pub async fn open(label: &'static str, url: &Url) -> Result<Self, ChannelError> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ChannelError::Connect {
                channel: label,
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        info!(channel = label, %url, "channel open");

        let (mut sink, mut source) = stream.split();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let _ = events_tx.send(ChannelEvent::Open);

        let writer_events = events_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(err) = sink.send(message).await {
                    warn!(channel = label, %err, "channel send failed");
                    let _ = writer_events.send(ChannelEvent::Error(err.to_string()));
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            let mut close = (CLOSE_ABNORMAL, String::new());
            while let Some(item) = source.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        debug!(channel = label, frame = %text, "recv");
                        let _ = events_tx.send(ChannelEvent::Message(Frame::Text(text)));
                    }
                    Ok(Message::Binary(bytes)) => {
                        debug!(channel = label, len = bytes.len(), "recv binary");
                        let _ = events_tx.send(ChannelEvent::Message(Frame::Binary(bytes)));
                    }
                    Ok(Message::Close(frame)) => {
                        close = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                            None => (CLOSE_NO_STATUS, String::new()),
                        };
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let _ = events_tx.send(ChannelEvent::Error(err.to_string()));
                        break;
                    }
                }
            }
            let (code, reason) = close;
            let _ = events_tx.send(ChannelEvent::Close { code, reason });
        });

        Ok(Self {
            label,
            outbound: Some(outbound_tx),
            events,
            reader,
        })
    }

    pub fn is_open(&self) -> bool {
        self.outbound
            .as_ref()
            .is_some_and(|outbound| !outbound.is_closed())
    }

    pub fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        let Some(outbound) = self.outbound.as_ref() else {
            return Err(ChannelError::Closed {
                channel: self.label,
            });
        };
        debug!(channel = self.label, frame = %text, "send");
        outbound
            .send(Message::Text(text))
            .map_err(|_| ChannelError::Closed {
                channel: self.label,
            })
    }

    /// Next event in arrival order; `None` once the connection is fully torn down.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        let event = self.events.recv().await;
        match &event {
            Some(ChannelEvent::Close { code, reason }) => {
                info!(channel = self.label, code, %reason, "channel closed");
                self.outbound = None;
            }
            Some(ChannelEvent::Error(err)) => {
                warn!(channel = self.label, %err, "channel error");
            }
            _ => {}
        }
        event
    }

    /// Closes unconditionally; safe to call more than once.
    pub fn close(&mut self) {
        if let Some(outbound) = self.outbound.take() {
            info!(channel = self.label, "closing channel");
            let _ = outbound.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })));
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        // The writer task flushes the close frame and exits on its own.
        self.close();
        self.reader.abort();
    }
}
