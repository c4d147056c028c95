//! Editable form draft shared between the stdin reader and the controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Context, Result};
use client_core::{EndpointForm, FormReader, SessionSnapshot};
use shared::{domain::Mode, protocol::RunForm};

use crate::input::{DraftEdit, RunField};

/// Operator overrides on top of the defaults the crawler advertised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Overrides {
    keyins: Option<String>,
    thread_num: Option<u64>,
    limit: Option<i64>,
    docker_cap: Option<u64>,
    pausetime: Option<u64>,
    proxy_minute: Option<u64>,
    out_type: Option<String>,
    success_inherit: Option<bool>,
    failure_inherit: Option<bool>,
}

#[derive(Debug, Default)]
struct Draft {
    endpoint: EndpointForm,
    overrides: Overrides,
}

#[derive(Debug, Clone, Default)]
pub struct SharedDraft {
    inner: Arc<Mutex<Draft>>,
}

impl SharedDraft {
    pub fn new(port: Option<u16>, ip: Option<String>) -> Self {
        let draft = Draft {
            endpoint: EndpointForm {
                port: port.map(|p| p.to_string()).unwrap_or_default(),
                ip: ip.unwrap_or_default(),
            },
            overrides: Overrides::default(),
        };
        Self {
            inner: Arc::new(Mutex::new(draft)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Draft> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records an edit. Values are checked here so that typos surface at once
    /// rather than when the form is submitted.
    pub fn apply(&self, edit: DraftEdit) -> Result<()> {
        let mut draft = self.lock();
        match edit {
            DraftEdit::Port(port) => draft.endpoint.port = port,
            DraftEdit::Ip(ip) => draft.endpoint.ip = ip,
            DraftEdit::Field(field, value) => {
                let o = &mut draft.overrides;
                match field {
                    RunField::Keyins => o.keyins = Some(value),
                    RunField::ThreadNum => o.thread_num = Some(number(&value)?),
                    RunField::Limit => {
                        o.limit = Some(value.parse().with_context(|| format!("bad limit '{value}'"))?)
                    }
                    RunField::DockerCap => o.docker_cap = Some(number(&value)?),
                    RunField::Pausetime => o.pausetime = Some(number(&value)?),
                    RunField::ProxyMinute => o.proxy_minute = Some(number(&value)?),
                    RunField::OutType => o.out_type = Some(value),
                    RunField::SuccessInherit => o.success_inherit = Some(flag(&value)?),
                    RunField::FailureInherit => o.failure_inherit = Some(flag(&value)?),
                }
            }
        }
        Ok(())
    }
}

fn number(value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("'{value}' is not a non-negative number"))
}

fn flag(value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("'{other}' is not yes or no"),
    }
}

impl FormReader for SharedDraft {
    fn read_endpoint(&self, _mode: Mode) -> EndpointForm {
        self.lock().endpoint.clone()
    }

    fn read_run_form(&self, snapshot: &SessionSnapshot) -> RunForm {
        let o = self.lock().overrides.clone();
        let mut form = RunForm::from_defaults(&snapshot.form_defaults);
        form.spiders = snapshot.selected_spiders();
        if let Some(keyins) = o.keyins {
            form.keyins = keyins;
        }
        if let Some(out_type) = o.out_type {
            form.out_type = out_type;
        }
        form.thread_num = o.thread_num.unwrap_or(form.thread_num);
        form.limit = o.limit.unwrap_or(form.limit);
        form.docker_cap = o.docker_cap.unwrap_or(form.docker_cap);
        form.pausetime = o.pausetime.unwrap_or(form.pausetime);
        form.proxy_minute = o.proxy_minute.unwrap_or(form.proxy_minute);
        form.success_inherit = o.success_inherit.unwrap_or(form.success_inherit);
        form.failure_inherit = o.failure_inherit.unwrap_or(form.failure_inherit);
        form
    }
}
