//! Console Controller: owns the session machine, both channels and the view
//! collaborators, and runs them as one cooperative event loop.
//!
//! Operator commands and channel events are handled one at a time to
//! completion. Nothing is assumed about ordering between the two channels.

use shared::{
    codec,
    domain::Mode,
    error::DecodeError,
    protocol::{OperateKind, ServerPush},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    channel::{Channel, ChannelError, ChannelEvent},
    error::ConsoleError,
    log_sink::LogSink,
    session::{Effect, Msg, SessionMachine},
    view::{FormReader, SessionSnapshot, ViewRenderer},
};

const CONTROL: &str = "control";
const LOG: &str = "log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEndpoints {
    pub control: Url,
    pub log: Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Control,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    SelectMode(Mode),
    SubmitInit,
    SubmitRun,
    PauseRecover,
    Stop,
    Exit,
    Refresh,
    ToggleSpider { id: String, selected: bool },
    /// Re-render the current snapshot without changing anything.
    Render,
    Shutdown,
}

impl OperatorCommand {
    fn needs_control(&self) -> bool {
        matches!(
            self,
            OperatorCommand::SubmitInit
                | OperatorCommand::SubmitRun
                | OperatorCommand::PauseRecover
                | OperatorCommand::Stop
                | OperatorCommand::Exit
                | OperatorCommand::Refresh
        )
    }
}

/// What a single turn of [`ConsoleController::next_activity`] observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    Opened(ChannelKind),
    Push(OperateKind),
    /// An inbound control frame was dropped (undecodable or illegal here).
    Discarded,
    LogLine,
    Closed {
        kind: ChannelKind,
        code: u16,
        reason: String,
    },
    ChannelError(ChannelKind),
}

pub struct ConsoleController<R, F> {
    machine: SessionMachine,
    logs: LogSink,
    control: Option<Channel>,
    log: Option<Channel>,
    renderer: R,
    form: F,
    rendered: SessionSnapshot,
}

impl<R: ViewRenderer, F: FormReader> ConsoleController<R, F> {
    /// Opens both channels. The control channel is mandatory; the console
    /// keeps working without a log stream if that one cannot be opened.
    pub async fn connect(
        endpoints: &ConsoleEndpoints,
        renderer: R,
        form: F,
    ) -> Result<Self, ConsoleError> {
        let control = Channel::open(CONTROL, &endpoints.control).await?;
        let log = match Channel::open(LOG, &endpoints.log).await {
            Ok(channel) => Some(channel),
            Err(err) => {
                warn!(%err, "continuing without log stream");
                None
            }
        };
        Ok(Self::with_channels(Some(control), log, renderer, form))
    }

    fn with_channels(
        control: Option<Channel>,
        log: Option<Channel>,
        mut renderer: R,
        form: F,
    ) -> Self {
        let machine = SessionMachine::new();
        let rendered = machine.snapshot();
        renderer.render(&rendered);
        Self {
            machine,
            logs: LogSink::new(),
            control,
            log,
            renderer,
            form,
            rendered,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.machine.snapshot()
    }

    pub fn log_sink(&self) -> &LogSink {
        &self.logs
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn form_mut(&mut self) -> &mut F {
        &mut self.form
    }

    pub fn control_open(&self) -> bool {
        self.control.as_ref().is_some_and(Channel::is_open)
    }

    pub fn log_open(&self) -> bool {
        self.log.as_ref().is_some_and(Channel::is_open)
    }

    /// Applies one operator command. Rejected commands leave the session as it was.
    pub fn dispatch(&mut self, command: OperatorCommand) -> Result<(), ConsoleError> {
        if command.needs_control() && !self.control_open() {
            return Err(ChannelError::Closed { channel: CONTROL }.into());
        }
        let msg = match command {
            OperatorCommand::SelectMode(mode) => Msg::SelectMode(mode),
            OperatorCommand::SubmitInit => {
                Msg::SubmitInit(self.form.read_endpoint(self.machine.session().mode))
            }
            OperatorCommand::SubmitRun => {
                let snapshot = self.machine.snapshot();
                Msg::SubmitRun(self.form.read_run_form(&snapshot))
            }
            OperatorCommand::PauseRecover => Msg::PauseRecover,
            OperatorCommand::Stop => Msg::Stop,
            OperatorCommand::Exit => Msg::Exit,
            OperatorCommand::Refresh => Msg::Refresh,
            OperatorCommand::ToggleSpider { id, selected } => Msg::ToggleSpider { id, selected },
            OperatorCommand::Render => {
                self.rendered = self.machine.snapshot();
                self.renderer.render(&self.rendered);
                return Ok(());
            }
            OperatorCommand::Shutdown => {
                self.shutdown();
                return Ok(());
            }
        };
        let effects = self.machine.update(msg)?;
        self.apply(effects)
    }

    /// Waits for the next event on either channel and handles it.
    ///
    /// Returns `None` once both channels are gone. Cancel safe: nothing is
    /// lost if the future is dropped before completing.
    pub async fn next_activity(&mut self) -> Option<Activity> {
        if self.control.is_none() && self.log.is_none() {
            return None;
        }
        let (kind, event) = tokio::select! {
            event = next_event(&mut self.control) => (ChannelKind::Control, event),
            event = next_event(&mut self.log) => (ChannelKind::Log, event),
        };
        let Some(event) = event else {
            match kind {
                ChannelKind::Control => self.control = None,
                ChannelKind::Log => self.log = None,
            }
            return Some(Activity::Closed {
                kind,
                code: crate::channel::CLOSE_ABNORMAL,
                reason: String::new(),
            });
        };
        Some(self.handle_event(kind, event))
    }

    fn handle_event(&mut self, kind: ChannelKind, event: ChannelEvent) -> Activity {
        match (kind, event) {
            (_, ChannelEvent::Open) => Activity::Opened(kind),
            (ChannelKind::Control, ChannelEvent::Message(frame)) => {
                self.on_control_frame(&frame.into_text())
            }
            (ChannelKind::Log, ChannelEvent::Message(frame)) => {
                let entry = self.logs.append(frame.into_text());
                self.renderer.append_log(entry);
                Activity::LogLine
            }
            (_, ChannelEvent::Error(_)) => Activity::ChannelError(kind),
            (ChannelKind::Control, ChannelEvent::Close { code, reason }) => {
                self.control = None;
                let effects = self.machine.update(Msg::ControlClosed).unwrap_or_default();
                self.apply_logged(effects);
                Activity::Closed { kind, code, reason }
            }
            (ChannelKind::Log, ChannelEvent::Close { code, reason }) => {
                self.log = None;
                Activity::Closed { kind, code, reason }
            }
        }
    }

    fn on_control_frame(&mut self, text: &str) -> Activity {
        let push: ServerPush = match codec::decode_push(text) {
            Ok(push) => push,
            Err(DecodeError::UnknownOperate(operate)) => {
                warn!(?operate, frame = %text, "dropping push with unknown operate");
                return Activity::Discarded;
            }
            Err(err) => {
                warn!(%err, frame = %text, "dropping malformed push");
                return Activity::Discarded;
            }
        };
        let operate = push.operate();
        match self.machine.update(Msg::Push(push)) {
            Ok(effects) => {
                self.apply_logged(effects);
                Activity::Push(operate)
            }
            Err(err) => {
                warn!(%err, "push discarded");
                Activity::Discarded
            }
        }
    }

    fn apply_logged(&mut self, effects: Vec<Effect>) {
        if let Err(err) = self.apply(effects) {
            warn!(%err, "could not carry out session effects");
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<(), ConsoleError> {
        let mut outcome = Ok(());
        let mut panel_drawn = false;
        for effect in effects {
            match effect {
                Effect::Send(request) => {
                    let frame = codec::encode(&request)?;
                    let sent = match self.control.as_mut() {
                        Some(control) => control.send_text(frame),
                        None => Err(ChannelError::Closed { channel: CONTROL }),
                    };
                    if let Err(err) = sent {
                        warn!(%err, operate = %request.operate(), "request not sent");
                        outcome = Err(err.into());
                    }
                }
                Effect::OpenPanel => {
                    self.rendered = self.machine.snapshot();
                    self.renderer.open_panel(&self.rendered);
                    panel_drawn = true;
                }
                Effect::DismissPanel => self.renderer.dismiss_panel(),
            }
        }

        let snapshot = self.machine.snapshot();
        if snapshot != self.rendered {
            self.rendered = snapshot;
            if !panel_drawn {
                self.renderer.render(&self.rendered);
            }
        }
        outcome
    }

    /// Runs until both channels are gone, the operator asks to shut down, or
    /// the command queue closes. Errors are logged and the loop carries on.
    pub async fn run(mut self, mut commands: mpsc::Receiver<OperatorCommand>) -> Self {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("operator queue closed");
                        break;
                    };
                    let shutdown = command == OperatorCommand::Shutdown;
                    if let Err(err) = self.dispatch(command) {
                        warn!(%err, "operator command rejected");
                    }
                    if shutdown {
                        break;
                    }
                }
                activity = self.next_activity() => {
                    match activity {
                        Some(activity) => debug!(?activity, "channel activity"),
                        None => {
                            info!("both channels closed");
                            break;
                        }
                    }
                }
            }
        }
        self.shutdown();
        self
    }

    /// Closes both channels unconditionally. The server sees this as the
    /// operator leaving; no message is sent.
    pub fn shutdown(&mut self) {
        if let Some(control) = self.control.as_mut() {
            control.close();
        }
        if let Some(log) = self.log.as_mut() {
            log.close();
        }
    }
}

async fn next_event(channel: &mut Option<Channel>) -> Option<ChannelEvent> {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}
