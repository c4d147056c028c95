//! Session synchronization: reconciles operator intent with server pushes.
//!
//! The machine is synchronous and owns the [`Session`] outright. Every input is
//! a [`Msg`]; the result is a list of [`Effect`]s for the controller to carry
//! out (frames to send, panel changes). Rejected inputs leave the session
//! untouched and come back as a [`SessionError`].

use shared::{
    domain::{FormDefaults, JobStatus, Mode, SpiderDescriptor},
    protocol::{ClientRequest, InitPush, InitRequest, OperateKind, RunForm, ServerPush, StatusNotice},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::view::{EndpointForm, SessionSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    Unconfigured,
    Configuring,
    Idle,
    Running,
    Paused,
    Stopping,
}

impl RunState {
    /// States in which the run panel is on screen.
    pub fn has_panel(self) -> bool {
        matches!(
            self,
            RunState::Idle | RunState::Running | RunState::Paused | RunState::Stopping
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub mode: Mode,
    pub run_state: RunState,
    pub title: String,
    pub spider_catalog: Vec<SpiderDescriptor>,
    pub form_defaults: FormDefaults,
    pub initiative: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            mode: Mode::Unset,
            run_state: RunState::Unconfigured,
            title: String::new(),
            spider_catalog: Vec::new(),
            form_defaults: FormDefaults::default(),
            initiative: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    SelectMode(Mode),
    SubmitInit(EndpointForm),
    SubmitRun(RunForm),
    PauseRecover,
    Stop,
    Exit,
    /// Operator asks for the server's current session (resume after reload).
    Refresh,
    ToggleSpider { id: String, selected: bool },
    Push(ServerPush),
    /// The control channel went away; the session cannot outlive it.
    ControlClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(ClientRequest),
    OpenPanel,
    DismissPanel,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("{command} is not allowed in {mode} mode while {state:?}")]
    IllegalCommand {
        command: &'static str,
        mode: Mode,
        state: RunState,
    },
    #[error("discarding {operate} push while {state:?}: {reason}")]
    ProtocolViolation {
        operate: OperateKind,
        state: RunState,
        reason: String,
    },
    #[error("invalid form: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default)]
pub struct SessionMachine {
    session: Session,
    stop_requested: bool,
    pause_requested: bool,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn run_state(&self) -> RunState {
        self.session.run_state
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn pause_requested(&self) -> bool {
        self.pause_requested
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(&self.session, self.stop_requested, self.pause_requested)
    }

    pub fn update(&mut self, msg: Msg) -> Result<Vec<Effect>, SessionError> {
        match msg {
            Msg::SelectMode(mode) => self.select_mode(mode),
            Msg::SubmitInit(endpoint) => self.submit_init(&endpoint),
            Msg::SubmitRun(form) => self.submit_run(form),
            Msg::PauseRecover => self.pause_recover(),
            Msg::Stop => self.stop(),
            Msg::Exit => self.exit(),
            Msg::Refresh => self.refresh(),
            Msg::ToggleSpider { id, selected } => self.toggle_spider(&id, selected),
            Msg::Push(push) => self.apply_push(push),
            Msg::ControlClosed => Ok(self.teardown()),
        }
    }

    fn select_mode(&mut self, mode: Mode) -> Result<Vec<Effect>, SessionError> {
        self.require(
            "selectMode",
            self.session.run_state == RunState::Unconfigured,
        )?;
        self.session.mode = mode;
        Ok(Vec::new())
    }

    fn submit_init(&mut self, endpoint: &EndpointForm) -> Result<Vec<Effect>, SessionError> {
        self.require(
            "init",
            self.session.run_state == RunState::Unconfigured && self.session.mode != Mode::Unset,
        )?;
        let mode = self.session.mode;

        let port = if mode.requires_port() {
            let raw = endpoint.port.trim();
            match raw.parse::<u16>() {
                Ok(port) if port != 0 => Some(port),
                _ => {
                    return Err(SessionError::Validation(format!(
                        "{mode} mode needs a port between 1 and 65535, got '{raw}'"
                    )))
                }
            }
        } else {
            None
        };
        let ip = if mode.requires_ip() {
            let raw = endpoint.ip.trim();
            if raw.is_empty() {
                return Err(SessionError::Validation(
                    "client mode needs the master ip".to_string(),
                ));
            }
            Some(raw.to_string())
        } else {
            None
        };

        self.session.run_state = RunState::Configuring;
        info!(%mode, ?port, ?ip, "session: requesting init");
        Ok(vec![Effect::Send(ClientRequest::Init(InitRequest {
            mode,
            port,
            ip,
        }))])
    }

    fn refresh(&mut self) -> Result<Vec<Effect>, SessionError> {
        self.require(
            "refresh",
            self.session.run_state != RunState::Configuring,
        )?;
        Ok(self.resynchronize())
    }

    fn toggle_spider(&mut self, id: &str, selected: bool) -> Result<Vec<Effect>, SessionError> {
        self.require("toggleSpider", self.session.run_state.has_panel())?;
        let spider = self
            .session
            .spider_catalog
            .iter_mut()
            .find(|spider| spider.id == id)
            .ok_or_else(|| SessionError::Validation(format!("unknown spider '{id}'")))?;
        spider.selected = selected;
        Ok(Vec::new())
    }

    fn submit_run(&mut self, mut form: RunForm) -> Result<Vec<Effect>, SessionError> {
        self.require(
            "run",
            self.session.run_state == RunState::Idle
                && matches!(self.session.mode, Mode::Offline | Mode::Server),
        )?;
        if form.spiders.is_empty() {
            return Err(SessionError::Validation(
                "select at least one spider".to_string(),
            ));
        }
        if let Some(unknown) = form
            .spiders
            .iter()
            .find(|id| !self.session.spider_catalog.iter().any(|s| &s.id == *id))
        {
            return Err(SessionError::Validation(format!("unknown spider '{unknown}'")));
        }

        let bounds = self.session.form_defaults.thread_num;
        form.thread_num = bounds.clamp(form.thread_num.max(1));
        for spider in &mut self.session.spider_catalog {
            spider.selected = form.spiders.contains(&spider.id);
        }

        info!(spiders = form.spiders.len(), "session: requesting run");
        Ok(vec![Effect::Send(ClientRequest::Run(form))])
    }

    fn pause_recover(&mut self) -> Result<Vec<Effect>, SessionError> {
        self.require(
            "pauseRecover",
            self.session.mode.supports_local_control()
                && self.session.run_state.is_active()
                && !self.stop_requested
                && !self.pause_requested,
        )?;
        self.pause_requested = true;
        Ok(vec![Effect::Send(ClientRequest::PauseRecover)])
    }

    fn stop(&mut self) -> Result<Vec<Effect>, SessionError> {
        self.require(
            "stop",
            self.session.mode.supports_local_control()
                && self.session.run_state.is_active()
                && !self.stop_requested,
        )?;
        self.stop_requested = true;
        Ok(vec![Effect::Send(ClientRequest::Stop)])
    }

    fn exit(&mut self) -> Result<Vec<Effect>, SessionError> {
        self.require("exit", self.session.mode != Mode::Unset)?;
        Ok(vec![Effect::Send(ClientRequest::Exit)])
    }

    fn apply_push(&mut self, push: ServerPush) -> Result<Vec<Effect>, SessionError> {
        match push {
            ServerPush::Init(init) => self.on_init(init),
            ServerPush::Run(notice) => self.on_run(notice),
            ServerPush::Stop(notice) => self.on_stop(notice),
            ServerPush::PauseRecover(notice) => self.on_pause_recover(notice),
            ServerPush::Exit(_) => Ok(self.on_exit()),
            ServerPush::Refresh(_) => {
                info!("session: server requested a resync");
                Ok(self.resynchronize())
            }
        }
    }

    fn on_init(&mut self, init: InitPush) -> Result<Vec<Effect>, SessionError> {
        if !init.initiative {
            info!(mode = %init.mode, "session: unsolicited init, discarding local session");
            return Ok(self.resynchronize());
        }
        if self.session.run_state != RunState::Configuring {
            return Err(self.violation(OperateKind::Init, "no init request is outstanding"));
        }
        if self.session.mode != Mode::Unset && self.session.mode != init.mode {
            warn!(
                requested = %self.session.mode,
                granted = %init.mode,
                "session: server started a different mode"
            );
        }

        // Stop (0) is what the crawler reports for any idle node.
        let run_state = match init.status {
            Some(JobStatus::Run) => RunState::Running,
            Some(JobStatus::Pause) if init.mode.supports_local_control() => RunState::Paused,
            _ => RunState::Idle,
        };

        self.session = Session {
            mode: init.mode,
            run_state,
            title: init.title,
            spider_catalog: init.spider_menu,
            form_defaults: init.form,
            initiative: true,
        };
        self.stop_requested = false;
        self.pause_requested = false;
        info!(mode = %self.session.mode, state = ?run_state, "session: configured");
        Ok(vec![Effect::OpenPanel])
    }

    fn on_run(&mut self, notice: StatusNotice) -> Result<Vec<Effect>, SessionError> {
        self.note_mode(OperateKind::Run, notice.mode);
        let state = self.session.run_state;
        match notice.status {
            Some(JobStatus::Run) => match state {
                RunState::Idle => {
                    self.session.run_state = RunState::Running;
                    self.stop_requested = false;
                    self.pause_requested = false;
                    Ok(Vec::new())
                }
                RunState::Running => {
                    debug!("session: duplicate run acknowledgement");
                    Ok(Vec::new())
                }
                _ => Err(self.violation(OperateKind::Run, "no job can start from here")),
            },
            Some(JobStatus::Stop)
                if state.is_active() && self.session.mode.supports_local_control() =>
            {
                self.session.run_state = RunState::Stopping;
                self.pause_requested = false;
                Ok(Vec::new())
            }
            Some(JobStatus::Stop) if state == RunState::Stopping => Ok(Vec::new()),
            other => Err(self.violation(
                OperateKind::Run,
                &format!("run rejected with status {other:?}"),
            )),
        }
    }

    fn on_stop(&mut self, notice: StatusNotice) -> Result<Vec<Effect>, SessionError> {
        self.note_mode(OperateKind::Stop, notice.mode);
        if notice.status == Some(JobStatus::Unknown) {
            return Err(self.violation(OperateKind::Stop, "stop refused by server"));
        }
        match self.session.run_state {
            RunState::Running | RunState::Paused | RunState::Stopping => {
                self.session.run_state = RunState::Idle;
                self.stop_requested = false;
                self.pause_requested = false;
                Ok(Vec::new())
            }
            RunState::Idle => {
                debug!("session: duplicate stop acknowledgement");
                Ok(Vec::new())
            }
            _ => Err(self.violation(OperateKind::Stop, "no job is running")),
        }
    }

    fn on_pause_recover(&mut self, notice: StatusNotice) -> Result<Vec<Effect>, SessionError> {
        self.note_mode(OperateKind::PauseRecover, notice.mode);
        let state = self.session.run_state;
        if !state.is_active() || !self.session.mode.supports_local_control() {
            return Err(self.violation(OperateKind::PauseRecover, "no pausable job"));
        }

        let toggled = if state == RunState::Running {
            RunState::Paused
        } else {
            RunState::Running
        };
        let target = match notice.status {
            Some(JobStatus::Pause) => RunState::Paused,
            Some(JobStatus::Run) => RunState::Running,
            None if self.pause_requested => toggled,
            None => {
                debug!("session: unrequested pauseRecover acknowledgement");
                return Ok(Vec::new());
            }
            Some(other) => {
                self.pause_requested = false;
                return Err(self.violation(
                    OperateKind::PauseRecover,
                    &format!("pauseRecover answered with status {other:?}"),
                ));
            }
        };

        self.pause_requested = false;
        if target == state {
            debug!(state = ?state, "session: duplicate pauseRecover acknowledgement");
        }
        self.session.run_state = target;
        Ok(Vec::new())
    }

    fn on_exit(&mut self) -> Vec<Effect> {
        if self.session == Session::default() {
            debug!("session: duplicate exit acknowledgement");
            return Vec::new();
        }
        info!("session: exited");
        self.reset();
        vec![Effect::DismissPanel]
    }

    /// Drops everything known locally and asks the server for a fresh snapshot.
    fn resynchronize(&mut self) -> Vec<Effect> {
        let had_panel = self.session.run_state.has_panel();
        self.reset();
        self.session.run_state = RunState::Configuring;
        let mut effects = Vec::with_capacity(2);
        if had_panel {
            effects.push(Effect::DismissPanel);
        }
        effects.push(Effect::Send(ClientRequest::Refresh));
        effects
    }

    fn teardown(&mut self) -> Vec<Effect> {
        let had_panel = self.session.run_state.has_panel();
        self.reset();
        if had_panel {
            vec![Effect::DismissPanel]
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self) {
        self.session = Session::default();
        self.stop_requested = false;
        self.pause_requested = false;
    }

    fn require(&self, command: &'static str, allowed: bool) -> Result<(), SessionError> {
        if allowed {
            Ok(())
        } else {
            Err(SessionError::IllegalCommand {
                command,
                mode: self.session.mode,
                state: self.session.run_state,
            })
        }
    }

    fn violation(&self, operate: OperateKind, reason: &str) -> SessionError {
        SessionError::ProtocolViolation {
            operate,
            state: self.session.run_state,
            reason: reason.to_string(),
        }
    }

    fn note_mode(&self, operate: OperateKind, mode: Option<Mode>) {
        if let Some(mode) = mode {
            if mode != self.session.mode {
                warn!(%operate, pushed = %mode, local = %self.session.mode, "session: mode mismatch in push");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
