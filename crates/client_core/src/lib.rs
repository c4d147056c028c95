//! Operator console core. [`ConsoleController`] ties the two websocket
//! channels to the session state machine and the log sink.

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod log_sink;
pub mod session;
pub mod view;

pub use channel::{Channel, ChannelError, ChannelEvent, Frame};
pub use config::{load_settings, ConsoleSettings};
pub use controller::{Activity, ChannelKind, ConsoleController, ConsoleEndpoints, OperatorCommand};
pub use error::ConsoleError;
pub use log_sink::{LogEntry, LogSink};
pub use session::{Effect, Msg, RunState, Session, SessionError, SessionMachine};
pub use view::{
    Affordances, Control, DefaultsForm, EndpointForm, FormReader, SessionSnapshot, ViewRenderer,
};
