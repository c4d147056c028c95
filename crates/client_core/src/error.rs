use shared::error::{DecodeError, EncodeError};
use thiserror::Error;

use crate::{channel::ChannelError, session::SessionError};

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("invalid console endpoint '{host}': {reason}")]
    Endpoint { host: String, reason: String },
}

impl ConsoleError {
    /// True when the command could not be delivered because the control channel is gone.
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, ConsoleError::Channel(ChannelError::Closed { .. }))
    }
}
