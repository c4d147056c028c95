use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::{lenient, FormDefaults, JobStatus, Mode, SpiderDescriptor};

/// Tag carried in the `operate` field of every control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperateKind {
    Init,
    Run,
    Stop,
    PauseRecover,
    Exit,
    Refresh,
}

impl OperateKind {
    pub const ALL: [OperateKind; 6] = [
        OperateKind::Init,
        OperateKind::Run,
        OperateKind::Stop,
        OperateKind::PauseRecover,
        OperateKind::Exit,
        OperateKind::Refresh,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperateKind::Init => "init",
            OperateKind::Run => "run",
            OperateKind::Stop => "stop",
            OperateKind::PauseRecover => "pauseRecover",
            OperateKind::Exit => "exit",
            OperateKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for OperateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown operate '{s}'"))
    }
}

/// Frames the console sends on the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operate", rename_all = "camelCase")]
pub enum ClientRequest {
    Init(InitRequest),
    Run(RunForm),
    Stop,
    PauseRecover,
    Exit,
    Refresh,
}

impl ClientRequest {
    pub fn operate(&self) -> OperateKind {
        match self {
            ClientRequest::Init(_) => OperateKind::Init,
            ClientRequest::Run(_) => OperateKind::Run,
            ClientRequest::Stop => OperateKind::Stop,
            ClientRequest::PauseRecover => OperateKind::PauseRecover,
            ClientRequest::Exit => OperateKind::Exit,
            ClientRequest::Refresh => OperateKind::Refresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Values of the run form as read from the operator's form controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunForm {
    pub spiders: Vec<String>,
    #[serde(default, alias = "keywords")]
    pub keyins: String,
    #[serde(
        serialize_with = "decimal::serialize",
        deserialize_with = "lenient::u64_value"
    )]
    pub thread_num: u64,
    #[serde(
        default,
        alias = "maxPage",
        serialize_with = "decimal::serialize",
        deserialize_with = "lenient::i64_value"
    )]
    pub limit: i64,
    #[serde(
        serialize_with = "decimal::serialize",
        deserialize_with = "lenient::u64_value"
    )]
    pub docker_cap: u64,
    #[serde(
        default,
        serialize_with = "decimal::serialize",
        deserialize_with = "lenient::u64_value"
    )]
    pub pausetime: u64,
    #[serde(
        default,
        serialize_with = "decimal::serialize",
        deserialize_with = "lenient::u64_value"
    )]
    pub proxy_minute: u64,
    #[serde(alias = "output")]
    pub out_type: String,
    #[serde(default)]
    pub success_inherit: bool,
    #[serde(default)]
    pub failure_inherit: bool,
}

impl RunForm {
    /// A form pre-filled from the defaults the server advertised, with no spiders picked.
    pub fn from_defaults(defaults: &FormDefaults) -> Self {
        Self {
            spiders: Vec::new(),
            keyins: defaults.keyins.clone(),
            thread_num: defaults.thread_num.curr,
            limit: defaults.limit,
            docker_cap: defaults.docker_cap.curr,
            pausetime: defaults.pausetime.curr,
            proxy_minute: defaults.proxy_minute.curr,
            out_type: defaults.out_type.curr.clone(),
            success_inherit: defaults.success_inherit,
            failure_inherit: defaults.failure_inherit,
        }
    }
}

/// Frames the crawler pushes on the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operate", rename_all = "camelCase")]
pub enum ServerPush {
    Init(InitPush),
    Run(StatusNotice),
    Stop(StatusNotice),
    PauseRecover(StatusNotice),
    Exit(StatusNotice),
    Refresh(StatusNotice),
}

impl ServerPush {
    pub fn operate(&self) -> OperateKind {
        match self {
            ServerPush::Init(_) => OperateKind::Init,
            ServerPush::Run(_) => OperateKind::Run,
            ServerPush::Stop(_) => OperateKind::Stop,
            ServerPush::PauseRecover(_) => OperateKind::PauseRecover,
            ServerPush::Exit(_) => OperateKind::Exit,
            ServerPush::Refresh(_) => OperateKind::Refresh,
        }
    }
}

/// Session snapshot sent in answer to `init`/`refresh`, or pushed unsolicited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPush {
    #[serde(default = "default_initiative")]
    pub initiative: bool,
    pub mode: Mode,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, with = "spider_menu")]
    pub spider_menu: Vec<SpiderDescriptor>,
    #[serde(flatten)]
    pub form: FormDefaults,
}

fn default_initiative() -> bool {
    true
}

/// Acknowledgement or notification for the lifecycle operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusNotice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl StatusNotice {
    pub fn new(mode: Mode, status: JobStatus) -> Self {
        Self {
            mode: Some(mode),
            status: Some(status),
        }
    }
}

mod decimal {
    use std::fmt::Display;

    use serde::Serializer;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }
}

/// `spiderMenu` arrives either as an id-keyed object (key order kept) or as a
/// bare array whose entries are identified by name.
mod spider_menu {
    use std::fmt;

    use serde::{
        de::{MapAccess, SeqAccess, Visitor},
        ser::SerializeMap,
        Deserialize, Deserializer, Serialize, Serializer,
    };

    use crate::domain::SpiderDescriptor;

    #[derive(Serialize, Deserialize)]
    struct Entry {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        selected: bool,
    }

    impl Entry {
        fn into_descriptor(self, id: String) -> SpiderDescriptor {
            SpiderDescriptor {
                id,
                name: self.name,
                description: self.description,
                selected: self.selected,
            }
        }
    }

    pub fn serialize<S: Serializer>(
        menu: &[SpiderDescriptor],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(menu.len()))?;
        for spider in menu {
            map.serialize_entry(
                &spider.id,
                &Entry {
                    name: spider.name.clone(),
                    description: spider.description.clone(),
                    selected: spider.selected,
                },
            )?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<SpiderDescriptor>, D::Error> {
        deserializer.deserialize_any(MenuVisitor)
    }

    struct MenuVisitor;

    impl<'de> Visitor<'de> for MenuVisitor {
        type Value = Vec<SpiderDescriptor>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a spider menu object or array")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut menu = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((id, entry)) = access.next_entry::<String, Entry>()? {
                menu.push(entry.into_descriptor(id));
            }
            Ok(menu)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut menu = Vec::with_capacity(access.size_hint().unwrap_or(0));
            // The crawler matches run requests by spider name.
            while let Some(entry) = access.next_element::<Entry>()? {
                let id = entry.name.clone();
                menu.push(entry.into_descriptor(id));
            }
            Ok(menu)
        }
    }
}
