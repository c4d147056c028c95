//! Operator command lines read from stdin.

use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use client_core::OperatorCommand;
use shared::domain::Mode;

pub const HELP: &str = "\
commands:
  mode <offline|server|client>   pick the node role (before init)
  port <n> | ip <addr>           fill the init form
  init                           start the chosen mode
  pick <spider> | drop <spider>  check or uncheck a spider
  set <field> <value>            edit the run form (keyins, threads, limit,
                                 cap, pausetime, proxy, out, success, failure)
  run | pause | stop | exit      drive the job
  refresh                        reload the session from the crawler
  status                         show the current session
  quit                           close both channels and leave";

/// Run form fields the operator may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunField {
    Keyins,
    ThreadNum,
    Limit,
    DockerCap,
    Pausetime,
    ProxyMinute,
    OutType,
    SuccessInherit,
    FailureInherit,
}

impl FromStr for RunField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "keyins" | "keywords" => RunField::Keyins,
            "threads" | "threadNum" => RunField::ThreadNum,
            "limit" | "maxPage" => RunField::Limit,
            "cap" | "dockerCap" => RunField::DockerCap,
            "pausetime" => RunField::Pausetime,
            "proxy" | "proxyMinute" => RunField::ProxyMinute,
            "out" | "outType" => RunField::OutType,
            "success" | "successInherit" => RunField::SuccessInherit,
            "failure" | "failureInherit" => RunField::FailureInherit,
            other => bail!("unknown run form field '{other}'"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEdit {
    Port(String),
    Ip(String),
    Field(RunField, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(OperatorCommand),
    Edit(DraftEdit),
    Help,
    Empty,
}

pub fn parse(line: &str) -> Result<Input> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Empty);
    };
    let rest: Vec<&str> = words.collect();
    let arg = |what: &str| -> Result<String> {
        match rest.as_slice() {
            [] => Err(anyhow!("{verb} needs {what}")),
            words => Ok(words.join(" ")),
        }
    };
    let no_args = |input: Input| -> Result<Input> {
        if rest.is_empty() {
            Ok(input)
        } else {
            Err(anyhow!("{verb} takes no arguments"))
        }
    };

    match verb {
        "mode" => {
            let mode: Mode = arg("a mode")?.parse().map_err(|err: String| anyhow!(err))?;
            if mode == Mode::Unset {
                bail!("choose offline, server or client");
            }
            Ok(Input::Command(OperatorCommand::SelectMode(mode)))
        }
        "port" => Ok(Input::Edit(DraftEdit::Port(arg("a port")?))),
        "ip" => Ok(Input::Edit(DraftEdit::Ip(arg("an address")?))),
        "init" | "start" => no_args(Input::Command(OperatorCommand::SubmitInit)),
        "pick" | "drop" => Ok(Input::Command(OperatorCommand::ToggleSpider {
            id: arg("a spider id")?,
            selected: verb == "pick",
        })),
        "set" => match rest.as_slice() {
            [field, value @ ..] if !value.is_empty() => Ok(Input::Edit(DraftEdit::Field(
                field.parse()?,
                value.join(" "),
            ))),
            _ => bail!("usage: set <field> <value>"),
        },
        "run" => no_args(Input::Command(OperatorCommand::SubmitRun)),
        "pause" | "goon" => no_args(Input::Command(OperatorCommand::PauseRecover)),
        "stop" => no_args(Input::Command(OperatorCommand::Stop)),
        "exit" => no_args(Input::Command(OperatorCommand::Exit)),
        "refresh" => no_args(Input::Command(OperatorCommand::Refresh)),
        "status" => no_args(Input::Command(OperatorCommand::Render)),
        "quit" => no_args(Input::Command(OperatorCommand::Shutdown)),
        "help" | "?" => Ok(Input::Help),
        other => bail!("unknown command '{other}', try 'help'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lifecycle_commands() {
        assert_eq!(
            parse("mode offline").unwrap(),
            Input::Command(OperatorCommand::SelectMode(Mode::Offline))
        );
        assert_eq!(
            parse("  init ").unwrap(),
            Input::Command(OperatorCommand::SubmitInit)
        );
        assert_eq!(
            parse("goon").unwrap(),
            Input::Command(OperatorCommand::PauseRecover)
        );
        assert_eq!(parse("").unwrap(), Input::Empty);
    }

    #[test]
    fn parses_form_edits() {
        assert_eq!(
            parse("set keyins rust  tokio").unwrap(),
            Input::Edit(DraftEdit::Field(RunField::Keyins, "rust tokio".to_string()))
        );
        assert_eq!(
            parse("port 2015").unwrap(),
            Input::Edit(DraftEdit::Port("2015".to_string()))
        );
        assert_eq!(
            parse("drop s1").unwrap(),
            Input::Command(OperatorCommand::ToggleSpider {
                id: "s1".to_string(),
                selected: false,
            })
        );
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(parse("mode unset").is_err());
        assert!(parse("mode").is_err());
        assert!(parse("run now").is_err());
        assert!(parse("set threads").is_err());
        assert!(parse("set colour blue").is_err());
        assert!(parse("launch").is_err());
    }
}
