//! Wire-level types shared by the console and anything that speaks its protocol.

pub mod codec;
pub mod domain;
pub mod error;
pub mod protocol;
