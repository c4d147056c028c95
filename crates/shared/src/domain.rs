use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

macro_rules! wire_int_enum {
    ($name:ident { $($variant:ident = $value:expr),+ $(,)? }) => {
        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl TryFrom<i64> for $name {
            type Error = String;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("invalid {} value {other}", stringify!($name))),
                }
            }
        }
    };
}

/// Role the crawler node runs in. Chosen once per session before `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "WireInt", into = "i64")]
pub enum Mode {
    #[default]
    Unset,
    Offline,
    Server,
    Client,
}

wire_int_enum!(Mode {
    Unset = -1,
    Offline = 0,
    Server = 1,
    Client = 2,
});

impl Mode {
    pub fn requires_port(self) -> bool {
        matches!(self, Mode::Server | Mode::Client)
    }

    pub fn requires_ip(self) -> bool {
        self == Mode::Client
    }

    /// Only a standalone node can pause or stop a job from the console.
    pub fn supports_local_control(self) -> bool {
        self == Mode::Offline
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Unset => "unset",
            Mode::Offline => "offline",
            Mode::Server => "server",
            Mode::Client => "client",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" | "0" => Ok(Mode::Offline),
            "server" | "1" => Ok(Mode::Server),
            "client" | "2" => Ok(Mode::Client),
            "unset" | "-1" => Ok(Mode::Unset),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Job status as reported by the crawler in the `status` field of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireInt", into = "i64")]
pub enum JobStatus {
    Unknown,
    Stopped,
    Stop,
    Run,
    Pause,
}

wire_int_enum!(JobStatus {
    Unknown = -2,
    Stopped = -1,
    Stop = 0,
    Run = 1,
    Pause = 2,
});

/// Integers on the wire sometimes arrive as strings (form values echoed back).
#[derive(Debug, Clone, Copy)]
struct WireInt(i64);

impl<'de> Deserialize<'de> for WireInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient::i64_value(deserializer).map(WireInt)
    }
}

impl TryFrom<WireInt> for Mode {
    type Error = String;

    fn try_from(value: WireInt) -> Result<Self, Self::Error> {
        Mode::try_from(value.0)
    }
}

impl TryFrom<WireInt> for JobStatus {
    type Error = String;

    fn try_from(value: WireInt) -> Result<Self, Self::Error> {
        JobStatus::try_from(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiderDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub selected: bool,
}

/// Numeric form input advertised by the server with its legal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounded {
    #[serde(deserialize_with = "lenient::u64_value")]
    pub min: u64,
    #[serde(deserialize_with = "lenient::u64_value")]
    pub max: u64,
    #[serde(alias = "default", deserialize_with = "lenient::u64_value")]
    pub curr: u64,
}

impl Bounded {
    pub const fn new(min: u64, max: u64, curr: u64) -> Self {
        Self { min, max, curr }
    }

    pub fn clamp(&self, value: u64) -> u64 {
        value.clamp(self.min, self.max.max(self.min))
    }
}

/// Select-style form input: the offered options and the current pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice<T> {
    #[serde(default = "Vec::new", alias = "memu")]
    pub menu: Vec<T>,
    pub curr: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormDefaults {
    #[serde(alias = "keywords")]
    pub keyins: String,
    #[serde(alias = "maxPage", deserialize_with = "lenient::i64_value")]
    pub limit: i64,
    pub thread_num: Bounded,
    #[serde(alias = "sleepTime", deserialize_with = "sleep_time::choice")]
    pub pausetime: Choice<u64>,
    pub proxy_minute: Choice<u64>,
    pub docker_cap: Bounded,
    #[serde(alias = "outputs")]
    pub out_type: Choice<String>,
    pub success_inherit: bool,
    pub failure_inherit: bool,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            keyins: String::new(),
            limit: 0,
            thread_num: Bounded::new(1, 999_999, 20),
            pausetime: Choice {
                menu: vec![0, 100, 300, 500, 1000, 3000, 5000, 10000, 15000, 20000, 30000, 60000],
                curr: 300,
            },
            proxy_minute: Choice {
                menu: vec![0, 1, 3, 5, 10, 15, 20, 30, 45, 60, 120, 180],
                curr: 0,
            },
            docker_cap: Bounded::new(1, 5_000_000, 10_000),
            out_type: Choice {
                menu: vec!["csv".to_string()],
                curr: "csv".to_string(),
            },
            success_inherit: true,
            failure_inherit: true,
        }
    }
}

pub(crate) mod lenient {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    fn parse<E: de::Error>(raw: Raw) -> Result<i64, E> {
        match raw {
            Raw::Int(v) => Ok(v),
            Raw::Float(v) if v.fract() == 0.0 => Ok(v as i64),
            Raw::Float(v) => Err(E::custom(format!("expected an integer, got {v}"))),
            Raw::Text(s) if s.trim().is_empty() => Ok(0),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected an integer, got '{s}'"))),
        }
    }

    pub fn i64_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        parse(Raw::deserialize(deserializer)?)
    }

    pub fn u64_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = i64_value(deserializer)?;
        u64::try_from(value).map_err(|_| de::Error::custom(format!("expected >= 0, got {value}")))
    }
}

/// Pause time arrives either as a plain [`Choice`] or in the older
/// `{"base": [..], "random": [..], "default": [base, random]}` layout, where
/// only the base part maps onto the form.
mod sleep_time {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Choice(Choice<u64>),
        Split { base: Vec<u64>, default: Vec<u64> },
    }

    pub fn choice<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Choice<u64>, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Choice(choice) => choice,
            Raw::Split { base, default } => Choice {
                curr: default.first().copied().unwrap_or(0),
                menu: base,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_wire_integers() {
        assert_eq!(serde_json::to_string(&Mode::Offline).unwrap(), "0");
        assert_eq!(serde_json::from_str::<Mode>("2").unwrap(), Mode::Client);
        assert_eq!(serde_json::from_str::<Mode>("\"1\"").unwrap(), Mode::Server);
        assert!(serde_json::from_str::<Mode>("7").is_err());
    }

    #[test]
    fn port_and_ip_requirements_follow_mode() {
        assert!(!Mode::Offline.requires_port());
        assert!(Mode::Server.requires_port() && !Mode::Server.requires_ip());
        assert!(Mode::Client.requires_port() && Mode::Client.requires_ip());
    }

    #[test]
    fn bounded_clamps_into_range() {
        let bounds = Bounded::new(1, 10, 5);
        assert_eq!(bounds.clamp(0), 1);
        assert_eq!(bounds.clamp(99), 10);
        assert_eq!(bounds.clamp(4), 4);
    }

    #[test]
    fn form_defaults_accept_legacy_names_and_string_numbers() {
        let defaults: FormDefaults = serde_json::from_str(
            r#"{"keywords":"a|b","maxPage":"3","threadNum":{"min":1,"max":50,"default":"8"}}"#,
        )
        .unwrap();
        assert_eq!(defaults.keyins, "a|b");
        assert_eq!(defaults.limit, 3);
        assert_eq!(defaults.thread_num, Bounded::new(1, 50, 8));
        assert_eq!(defaults.docker_cap, FormDefaults::default().docker_cap);
    }

    #[test]
    fn form_defaults_accept_menu_and_sleep_time_layouts() {
        let defaults: FormDefaults = serde_json::from_str(
            r#"{"outputs":{"memu":["csv","excel"],"curr":"excel"},"sleepTime":{"base":[0,100,300],"random":[0,100],"default":[100,300]}}"#,
        )
        .unwrap();
        assert_eq!(defaults.out_type.menu, vec!["csv", "excel"]);
        assert_eq!(defaults.out_type.curr, "excel");
        assert_eq!(defaults.pausetime.menu, vec![0, 100, 300]);
        assert_eq!(defaults.pausetime.curr, 100);

        let plain: FormDefaults =
            serde_json::from_str(r#"{"pausetime":{"menu":[0,500],"curr":500}}"#).unwrap();
        assert_eq!(plain.pausetime, Choice { menu: vec![0, 500], curr: 500 });
    }
}
