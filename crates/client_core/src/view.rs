//! Read-only session views and the collaborator seams around them.

use shared::{
    domain::{FormDefaults, Mode, SpiderDescriptor},
    protocol::RunForm,
};

use crate::{
    log_sink::LogEntry,
    session::{RunState, Session},
};

pub const LABEL_START: &str = "Start";
pub const LABEL_STARTING: &str = "Starting…";
pub const LABEL_RUN: &str = "Run";
pub const LABEL_STOP: &str = "Stop";
pub const LABEL_STOPPING: &str = "Stopping…";
pub const LABEL_RUNNING: &str = "Running";
pub const LABEL_PAUSE: &str = "Pause";
pub const LABEL_GO_ON: &str = "Go on…";
pub const LABEL_EXIT: &str = "Exit";

/// Enabled/label state of a single operator control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub visible: bool,
    pub enabled: bool,
    pub label: &'static str,
}

impl Control {
    const fn hidden(label: &'static str) -> Self {
        Self {
            visible: false,
            enabled: false,
            label,
        }
    }

    const fn shown(label: &'static str, enabled: bool) -> Self {
        Self {
            visible: true,
            enabled,
            label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub mode_picker: Control,
    pub init: Control,
    pub run: Control,
    pub pause: Control,
    pub exit: Control,
}

impl Affordances {
    pub fn derive(mode: Mode, state: RunState, stop_requested: bool, pause_requested: bool) -> Self {
        let unconfigured = state == RunState::Unconfigured;
        let init = match state {
            RunState::Unconfigured => Control::shown(LABEL_START, mode != Mode::Unset),
            RunState::Configuring => Control::shown(LABEL_STARTING, false),
            _ => Control::hidden(LABEL_START),
        };

        let local = mode.supports_local_control();
        let run = match (mode, state) {
            (Mode::Client | Mode::Unset, _) => Control::hidden(LABEL_RUN),
            (_, RunState::Idle) => Control::shown(LABEL_RUN, true),
            (_, RunState::Stopping) => Control::shown(LABEL_STOPPING, false),
            (_, RunState::Running | RunState::Paused) if local && stop_requested => {
                Control::shown(LABEL_STOPPING, false)
            }
            (_, RunState::Running | RunState::Paused) if local => Control::shown(LABEL_STOP, true),
            (_, RunState::Running | RunState::Paused) => Control::shown(LABEL_RUNNING, false),
            _ => Control::hidden(LABEL_RUN),
        };

        let pause = match state {
            RunState::Running if local => {
                Control::shown(LABEL_PAUSE, !stop_requested && !pause_requested)
            }
            RunState::Paused if local => {
                Control::shown(LABEL_GO_ON, !stop_requested && !pause_requested)
            }
            RunState::Stopping if local => Control::shown(LABEL_PAUSE, false),
            _ => Control::hidden(LABEL_PAUSE),
        };

        let exit = if mode == Mode::Unset {
            Control::hidden(LABEL_EXIT)
        } else {
            Control::shown(LABEL_EXIT, true)
        };

        Self {
            mode_picker: Control::shown("Mode", unconfigured),
            init,
            run,
            pause,
            exit,
        }
    }
}

/// Immutable copy of the session handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub run_state: RunState,
    pub title: String,
    pub spider_catalog: Vec<SpiderDescriptor>,
    pub form_defaults: FormDefaults,
    pub initiative: bool,
    pub panel_open: bool,
    pub affordances: Affordances,
}

impl SessionSnapshot {
    pub(crate) fn capture(session: &Session, stop_requested: bool, pause_requested: bool) -> Self {
        Self {
            mode: session.mode,
            run_state: session.run_state,
            title: session.title.clone(),
            spider_catalog: session.spider_catalog.clone(),
            form_defaults: session.form_defaults.clone(),
            initiative: session.initiative,
            panel_open: session.run_state.has_panel(),
            affordances: Affordances::derive(
                session.mode,
                session.run_state,
                stop_requested,
                pause_requested,
            ),
        }
    }

    pub fn selected_spiders(&self) -> Vec<String> {
        self.spider_catalog
            .iter()
            .filter(|spider| spider.selected)
            .map(|spider| spider.id.clone())
            .collect()
    }
}

/// Raw contents of the init form; validated by the session before sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointForm {
    pub port: String,
    pub ip: String,
}

/// Turns snapshots and log lines into something the operator can see.
pub trait ViewRenderer {
    fn render(&mut self, snapshot: &SessionSnapshot);

    /// Called once the server has configured a session and the run form can be shown.
    fn open_panel(&mut self, snapshot: &SessionSnapshot) {
        self.render(snapshot);
    }

    fn dismiss_panel(&mut self);

    fn append_log(&mut self, entry: &LogEntry);
}

/// Reads the operator's current form values.
pub trait FormReader {
    fn read_endpoint(&self, mode: Mode) -> EndpointForm;

    fn read_run_form(&self, snapshot: &SessionSnapshot) -> RunForm;
}

/// Form reader that submits the advertised defaults and the checked spiders.
#[derive(Debug, Clone, Default)]
pub struct DefaultsForm {
    pub endpoint: EndpointForm,
}

impl FormReader for DefaultsForm {
    fn read_endpoint(&self, _mode: Mode) -> EndpointForm {
        self.endpoint.clone()
    }

    fn read_run_form(&self, snapshot: &SessionSnapshot) -> RunForm {
        let mut form = RunForm::from_defaults(&snapshot.form_defaults);
        form.spiders = snapshot.selected_spiders();
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_only_offers_mode_selection() {
        let affordances = Affordances::derive(Mode::Unset, RunState::Unconfigured, false, false);
        assert!(affordances.mode_picker.enabled);
        assert!(affordances.init.visible && !affordances.init.enabled);
        assert!(!affordances.run.visible);
        assert!(!affordances.pause.visible);
        assert!(!affordances.exit.visible);
    }

    #[test]
    fn selecting_a_mode_enables_start() {
        let affordances = Affordances::derive(Mode::Server, RunState::Unconfigured, false, false);
        assert!(affordances.init.enabled);
        assert_eq!(affordances.init.label, LABEL_START);
    }

    #[test]
    fn offline_running_exposes_stop_and_pause() {
        let affordances = Affordances::derive(Mode::Offline, RunState::Running, false, false);
        assert_eq!(affordances.run, Control::shown(LABEL_STOP, true));
        assert_eq!(affordances.pause, Control::shown(LABEL_PAUSE, true));
    }

    #[test]
    fn server_running_hides_pause_and_disables_stop() {
        let affordances = Affordances::derive(Mode::Server, RunState::Running, false, false);
        assert!(!affordances.pause.visible);
        assert_eq!(affordances.run, Control::shown(LABEL_RUNNING, false));
    }

    #[test]
    fn requested_stop_shows_disabled_stopping() {
        let affordances = Affordances::derive(Mode::Offline, RunState::Running, true, false);
        assert_eq!(affordances.run, Control::shown(LABEL_STOPPING, false));
        assert!(!affordances.pause.enabled);
    }

    #[test]
    fn client_mode_never_shows_run_controls() {
        let affordances = Affordances::derive(Mode::Client, RunState::Idle, false, false);
        assert!(!affordances.run.visible);
        assert!(!affordances.pause.visible);
        assert!(affordances.exit.enabled);
    }
}
