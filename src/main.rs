// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// - cli:          Command line arguments and run mode selection
// - config:       Optional JSON configuration
// - error:        Typed collection and naming errors
// - schema:       Payload, batch identity and the typed problem view
// - listener:     Single-request HTTP endpoint (PayloadSource)
// - collector:    Collection policies (count, batches, idle timeout)
// - naming:       Short problem names from payload fields
// - materializer: Problem directories, templates and samples
// - metrics:      Run counters
// - util:         Small shared helpers
//
mod cli;
mod collector;
mod config;
mod error;
mod listener;
mod materializer;
mod metrics;
mod naming;
mod schema;
mod util;

use std::io::{self, Write};

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};

use cli::{Cli, Mode};
use collector::Collector;
use config::load_config;
use error::CollectError;
use listener::Listener;
use materializer::Materializer;
use metrics::METRICS;
use schema::Payload;

/// Name logged in dry runs for problems that would need a prompt.
const UNNAMED: &str = "<unnamed>";

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// 1. Parse arguments and load configuration
// 2. Collect payloads under the selected policy
// 3. Name and write every payload, in arrival order
//
// Any collection error ends the process with a non-zero exit
// code; payloads gathered before it are not written.
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    init_logging(config.debug_log());

    let listener = Listener::new(config.listener.socket_addr()?)
        .with_max_wait(config.listener.max_wait()?);
    info!("Listening for Competitive Companion on {}", listener.addr());

    match cli.mode() {
        Mode::Echo => echo(listener).await,
        Mode::Collect { policy, names } => {
            let mut collector = Collector::new(listener);
            let payloads = collector.collect(policy).await?;
            info!("Collected {} problems", payloads.len());

            let root = std::env::current_dir().context("failed to resolve working directory")?;
            let materializer = Materializer::new(root, &config.workspace);
            make_problems(&materializer, &payloads, &names, cli.dryrun)?;

            info!("[METRICS] {}", METRICS.summary());
            Ok(())
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug {
        "info,companion_fetch=debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_target(false)
        .init();
}

/// Prints every payload until the process is interrupted.
async fn echo(listener: Listener) -> anyhow::Result<()> {
    loop {
        if let Some(payload) = echo_outcome(listener.receive_once(None).await)? {
            println!("{}", payload);
        }
    }
}

/// Echo mode only stops on listener failures; bad pushes and
/// expired waits are skipped.
fn echo_outcome(received: Result<Option<Payload>, CollectError>) -> anyhow::Result<Option<Payload>> {
    match received {
        Ok(payload) => Ok(payload),
        Err(CollectError::WaitLimitExceeded(_)) => Ok(None),
        Err(e @ CollectError::MalformedPayload(_)) => {
            warn!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// ------------------------------------------------------------
// Materialization stage
// ------------------------------------------------------------
//
// Runs only after collection completed. Positional names are
// used first; remaining payloads are named from their fields.
//
fn make_problems(
    materializer: &Materializer,
    payloads: &[Payload],
    names: &[String],
    dryrun: bool,
) -> anyhow::Result<()> {
    let mut names = names.iter();

    for payload in payloads {
        let name = match names.next() {
            Some(name) => name.clone(),
            None => resolve_name(payload, !dryrun)?,
        };

        if dryrun {
            info!("make_problem(name={:?}) skipped (dry run)", name);
            continue;
        }

        let dir = materializer.materialize(payload, &name)?;
        info!("Problem {} ready in {}", name, dir.display());
    }
    Ok(())
}

/// Derives a name, asking on stdin when the heuristics give up.
fn resolve_name(payload: &Payload, interactive: bool) -> anyhow::Result<String> {
    let problem = payload
        .problem()
        .context("payload does not describe a problem")?;

    match naming::name_for(&problem) {
        Ok(name) => Ok(name),
        Err(e) if interactive => {
            warn!("{}", e);
            println!("For data: {}", serde_json::to_string_pretty(payload.as_value())?);
            prompt_name()
        }
        Err(e) => {
            warn!("{}", e);
            Ok(UNNAMED.to_string())
        }
    }
}

fn prompt_name() -> anyhow::Result<String> {
    print!("What name to give? ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        bail!("stdin closed while asking for a problem name");
    }

    let name = line.trim();
    if name.is_empty() {
        bail!("empty problem name");
    }
    Ok(name.to_string())
}
