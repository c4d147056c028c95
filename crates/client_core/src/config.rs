use std::{collections::HashMap, fs, path::Path};

use shared::domain::Mode;
use url::Url;

use crate::{controller::ConsoleEndpoints, error::ConsoleError};

pub const DEFAULT_SETTINGS_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub host: String,
    pub control_path: String,
    pub log_path: String,
    pub log_filter: String,
    pub mode: Option<Mode>,
    pub node_port: Option<u16>,
    pub master_ip: Option<String>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:9090".into(),
            control_path: "/ws".into(),
            log_path: "/ws/log".into(),
            log_filter: "info".into(),
            mode: None,
            node_port: None,
            master_ip: None,
        }
    }
}

impl ConsoleSettings {
    pub fn endpoints(&self) -> Result<ConsoleEndpoints, ConsoleError> {
        let base = websocket_base(&self.host)?;
        Ok(ConsoleEndpoints {
            control: with_path(&base, &self.control_path),
            log: with_path(&base, &self.log_path),
        })
    }
}

pub fn load_settings() -> ConsoleSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file if it parses, then the environment.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ConsoleSettings {
    let mut settings = ConsoleSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                for (key, value) in &file_cfg {
                    apply(&mut settings, key, &plain_text(value));
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "ignoring unreadable settings file");
            }
        }
    }

    for (var, key) in [
        ("CONSOLE_HOST", "host"),
        ("APP__HOST", "host"),
        ("APP__CONTROL_PATH", "control_path"),
        ("APP__LOG_PATH", "log_path"),
        ("APP__LOG_FILTER", "log_filter"),
        ("APP__MODE", "mode"),
        ("APP__NODE_PORT", "node_port"),
        ("APP__MASTER_IP", "master_ip"),
    ] {
        if let Some(v) = env(var) {
            apply(&mut settings, key, &v);
        }
    }

    settings
}

fn apply(settings: &mut ConsoleSettings, key: &str, value: &str) {
    match key {
        "host" => settings.host = value.to_string(),
        "control_path" => settings.control_path = value.to_string(),
        "log_path" => settings.log_path = value.to_string(),
        "log_filter" => settings.log_filter = value.to_string(),
        "mode" => match value.parse::<Mode>() {
            Ok(mode) => settings.mode = Some(mode),
            Err(err) => tracing::warn!(%err, "ignoring mode setting"),
        },
        "node_port" => match value.parse::<u16>() {
            Ok(port) => settings.node_port = Some(port),
            Err(err) => tracing::warn!(value, %err, "ignoring node_port setting"),
        },
        "master_ip" => settings.master_ip = Some(value.to_string()),
        other => tracing::debug!(key = other, "unknown settings key"),
    }
}

fn plain_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Maps `http(s)://` hosts onto `ws(s)://`; bare `host:port` gets `ws://`.
fn websocket_base(host: &str) -> Result<Url, ConsoleError> {
    let host = host.trim().trim_end_matches('/');
    let candidate = if let Some(rest) = host.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = host.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if host.starts_with("ws://") || host.starts_with("wss://") {
        host.to_string()
    } else if host.contains("://") {
        return Err(ConsoleError::Endpoint {
            host: host.to_string(),
            reason: "host must use http, https, ws or wss".to_string(),
        });
    } else {
        format!("ws://{host}")
    };

    Url::parse(&candidate).map_err(|err| ConsoleError::Endpoint {
        host: host.to_string(),
        reason: err.to_string(),
    })
}

fn with_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    if path.starts_with('/') {
        url.set_path(path);
    } else {
        url.set_path(&format!("/{path}"));
    }
    url
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn default_endpoints_follow_page_layout() {
        let endpoints = ConsoleSettings::default().endpoints().expect("endpoints");
        assert_eq!(endpoints.control.as_str(), "ws://127.0.0.1:9090/ws");
        assert_eq!(endpoints.log.as_str(), "ws://127.0.0.1:9090/ws/log");
    }

    #[test]
    fn https_host_maps_to_secure_websocket() {
        let settings = ConsoleSettings {
            host: "https://crawler.example:8443/".into(),
            ..ConsoleSettings::default()
        };
        let endpoints = settings.endpoints().expect("endpoints");
        assert_eq!(endpoints.control.as_str(), "wss://crawler.example:8443/ws");
    }

    #[test]
    fn rejects_foreign_schemes() {
        let settings = ConsoleSettings {
            host: "ftp://crawler".into(),
            ..ConsoleSettings::default()
        };
        assert!(matches!(
            settings.endpoints(),
            Err(ConsoleError::Endpoint { .. })
        ));
    }

    #[test]
    fn file_then_environment_overrides() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("crawl_console_settings_{suffix}.toml"));
        fs::write(
            &path,
            "host = \"10.0.0.5:9090\"\nmode = \"server\"\nnode_port = 2015\nlog_filter = \"debug\"\n",
        )
        .expect("write settings");

        let settings = load_settings_from(&path, |key| match key {
            "APP__LOG_FILTER" => Some("warn".to_string()),
            "APP__MASTER_IP" => Some("10.0.0.1".to_string()),
            _ => None,
        });
        fs::remove_file(&path).expect("cleanup");

        assert_eq!(settings.host, "10.0.0.5:9090");
        assert_eq!(settings.mode, Some(Mode::Server));
        assert_eq!(settings.node_port, Some(2015));
        assert_eq!(settings.log_filter, "warn");
        assert_eq!(settings.master_ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load_settings_from(Path::new("/nonexistent/console.toml"), no_env);
        assert_eq!(settings, ConsoleSettings::default());
    }
}
