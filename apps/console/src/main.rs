mod form;
mod input;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{config, ConsoleController, OperatorCommand};
use shared::domain::Mode;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    form::SharedDraft,
    input::{Input, HELP},
};

#[derive(Parser, Debug)]
#[command(about = "Terminal operator console for a crawler node")]
struct Args {
    #[arg(long, default_value = config::DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Crawler address, e.g. 127.0.0.1:9090 or https://crawler.local
    #[arg(long)]
    host: Option<String>,
    /// Select this mode on start-up (offline, server, client)
    #[arg(long)]
    mode: Option<Mode>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    ip: Option<String>,
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = config::load_settings_from(&args.config, |key| std::env::var(key).ok());
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(filter) = args.log_filter {
        settings.log_filter = filter;
    }
    settings.mode = args.mode.or(settings.mode);
    settings.node_port = args.port.or(settings.node_port);
    settings.master_ip = args.ip.or(settings.master_ip);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let endpoints = settings.endpoints()?;
    info!(control = %endpoints.control, log = %endpoints.log, "connecting");
    let draft = SharedDraft::new(settings.node_port, settings.master_ip.clone());
    let mut console = ConsoleController::connect(&endpoints, render::stdout(), draft.clone())
        .await
        .with_context(|| format!("could not reach crawler at {}", endpoints.control))?;

    if let Some(mode) = settings.mode {
        if let Err(err) = console.dispatch(OperatorCommand::SelectMode(mode)) {
            warn!(%err, "ignoring configured mode");
        }
    }

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(read_commands(tx.clone(), draft));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(OperatorCommand::Shutdown).await;
        }
    });

    console.run(rx).await;
    info!("console closed");
    Ok(())
}

async fn read_commands(tx: mpsc::Sender<OperatorCommand>, draft: SharedDraft) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "stdin read failed");
                break;
            }
        };
        let command = match input::parse(&line) {
            Ok(Input::Command(command)) => command,
            Ok(Input::Edit(edit)) => {
                if let Err(err) = draft.apply(edit) {
                    println!("! {err:#}");
                }
                continue;
            }
            Ok(Input::Help) => {
                println!("{HELP}");
                continue;
            }
            Ok(Input::Empty) => continue,
            Err(err) => {
                println!("! {err:#}");
                continue;
            }
        };
        if tx.send(command).await.is_err() {
            return;
        }
    }
    let _ = tx.send(OperatorCommand::Shutdown).await;
}
