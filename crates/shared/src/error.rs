use thiserror::Error;

/// Why an inbound control frame could not be turned into a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed control frame: {0}")]
    Malformed(String),
    #[error("unknown operate: {}", .0.as_deref().unwrap_or("<absent>"))]
    UnknownOperate(Option<String>),
}

#[derive(Debug, Error)]
#[error("failed to encode control frame: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);
