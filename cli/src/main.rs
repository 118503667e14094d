use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{catalog, Event, Role, SubmissionOutcome, ViewModel};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod previews;
mod render;
mod repl;
mod shell;
mod webhook;

use config::ShellConfig;
use shell::Shell;
use webhook::WebhookExecutor;

#[derive(Parser, Debug)]
#[command(name = "greenvision", version, about = "Ask GreenVision how to recycle an item")]
struct Cli {
    /// Webhook URL; overrides GREENVISION_WEBHOOK_URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Seconds to wait for a reply (clamped to 1..=300)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one photo and print the reply
    Submit {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        city: String,
        /// Two-letter code or full state name
        #[arg(long)]
        state: String,
    },
    /// List US states, optionally filtered
    States { query: Option<String> },
    /// Interactive session
    Chat,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::States { query } => {
            let mut out = io::stdout().lock();
            for state in catalog::filter_states(query.as_deref().unwrap_or_default()) {
                writeln!(out, "{}  {}", state.code, state.name)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Submit { image, city, state } => {
            let config = ShellConfig::from_env()?.with_overrides(cli.endpoint, cli.timeout_secs);
            let mut shell = Shell::new(&config, WebhookExecutor::new()?, io::stdout()).await?;
            let status = submit_once(&mut shell, image, city, state).await?;
            Ok(status.into())
        }
        Command::Chat => {
            let config = ShellConfig::from_env()?.with_overrides(cli.endpoint, cli.timeout_secs);
            info!(configured = config.endpoint.is_some(), "starting chat");
            let mut shell = Shell::new(&config, WebhookExecutor::new()?, io::stdout()).await?;
            repl::run(&mut shell).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// How a one-shot `submit` ended; doubles as the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitStatus {
    Answered = 0,
    Failed = 1,
    NotSent = 2,
}

impl SubmitStatus {
    fn from_view(view: &ViewModel) -> Self {
        let outcome = view
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| m.outcome);

        match outcome {
            Some(SubmissionOutcome::Completed) => Self::Answered,
            Some(_) => Self::Failed,
            None => Self::NotSent,
        }
    }
}

impl From<SubmitStatus> for ExitCode {
    fn from(status: SubmitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

async fn submit_once<W: Write>(
    shell: &mut Shell<W>,
    image: PathBuf,
    city: String,
    state: String,
) -> Result<SubmitStatus> {
    shell.pick_file(image).await?;
    shell.dispatch(Event::CityChanged(city)).await?;
    shell.dispatch(Event::StateTyped(state)).await?;
    shell.dispatch(Event::Submit).await?;
    shell.settle_all().await?;
    debug!(live = shell.previews().live_count(), "previews outstanding");

    Ok(SubmitStatus::from_view(&shell.view()))
}
