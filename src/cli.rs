use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, ArgGroup, Parser};

use crate::collector::Policy;
use crate::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "companion-fetch",
    version,
    about = "Download and set up problems pushed by Competitive Companion"
)]
#[command(group(ArgGroup::new("limit").args(["names", "number", "batches", "timeout"])))]
pub struct Cli {
    /// Problem names; collects exactly one problem per name, in order
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Just echo received payloads and never stop
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["limit", "dryrun"])]
    pub echo: bool,

    /// Number of problems
    #[arg(short = 'n', long = "number", value_name = "COUNT")]
    pub number: Option<usize>,

    /// Number of batches (default: 1 batch)
    #[arg(short = 'b', long = "batches", value_name = "COUNT")]
    pub batches: Option<usize>,

    /// Stop once no problem arrived for this many seconds
    #[arg(short = 't', long = "timeout", value_name = "SECONDS", value_parser = parse_seconds)]
    pub timeout: Option<Duration>,

    /// Collect as usual but don't create any problems
    #[arg(long, action = ArgAction::SetTrue)]
    pub dryrun: bool,

    /// Config file (default: ./companion.json if present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Listener host, overrides the config file
    #[arg(long, env = "COMPANION_HOST")]
    pub host: Option<String>,

    /// Listener port, overrides the config file
    #[arg(long, env = "COMPANION_PORT")]
    pub port: Option<u16>,

    /// Debug logging for this tool
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

/// What the process does once arguments are parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Print every payload, forever.
    Echo,

    /// Collect under `policy`, then name and write each problem.
    /// `names` are applied positionally when given.
    Collect { policy: Policy, names: Vec<String> },
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.echo {
            return Mode::Echo;
        }

        let policy = if !self.names.is_empty() {
            Policy::Count(self.names.len())
        } else if let Some(n) = self.number {
            Policy::Count(n)
        } else if let Some(k) = self.batches {
            Policy::Batches(k)
        } else if let Some(t) = self.timeout {
            Policy::UntilIdle(t)
        } else {
            Policy::default()
        };

        Mode::Collect {
            policy,
            names: self.names.clone(),
        }
    }

    /// Applies `--host` / `--port` on top of the loaded config.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(host) = &self.host {
            cfg.listener.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.listener.port = port;
        }
        if self.verbose {
            cfg.debug.get_or_insert_with(Default::default).log = true;
        }
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("`{raw}`: {e}"))
}
