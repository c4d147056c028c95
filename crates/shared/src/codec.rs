//! Wire codec for both channels: UTF-8 JSON on the control channel, raw text on the log channel.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    error::{DecodeError, EncodeError},
    protocol::{ClientRequest, OperateKind, ServerPush},
};

pub fn encode<M: Serialize>(message: &M) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(message)?)
}

/// Decodes a control frame, checking the `operate` tag before the body so that
/// unrecognised operates are reported as such rather than as schema errors.
/// Object key order survives the round through `Value` (`preserve_order`).
pub fn decode<M: DeserializeOwned>(frame: &str) -> Result<M, DecodeError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|err| DecodeError::Malformed(err.to_string()))?;
    let Value::Object(fields) = &value else {
        return Err(DecodeError::Malformed("expected a JSON object".to_string()));
    };
    match fields.get("operate") {
        Some(Value::String(tag)) => {
            tag.parse::<OperateKind>()
                .map_err(|_| DecodeError::UnknownOperate(Some(tag.clone())))?;
        }
        Some(other) => return Err(DecodeError::UnknownOperate(Some(other.to_string()))),
        None => return Err(DecodeError::UnknownOperate(None)),
    }
    serde_json::from_value(value).map_err(|err| DecodeError::Malformed(err.to_string()))
}

pub fn decode_push(frame: &str) -> Result<ServerPush, DecodeError> {
    decode(frame)
}

pub fn decode_request(frame: &str) -> Result<ClientRequest, DecodeError> {
    decode(frame)
}

/// Log frames carry no structure; invalid UTF-8 is replaced rather than rejected.
pub fn decode_log_line(frame: &[u8]) -> String {
    String::from_utf8_lossy(frame).into_owned()
}

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod tests;
