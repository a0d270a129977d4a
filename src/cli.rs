//! Command line arguments and exit codes.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use pointwatch_types::ErrorKind;

use crate::jobs::JobKind;

#[derive(Parser, Debug)]
#[command(name = "pointwatch")]
#[command(about = "Periodically harvest antenna monitor points and publish them to the alarm system")]
pub struct Args {
    /// UDP port of the alarm system plugin server
    #[arg(value_name = "UDP_PORT", allow_negative_numbers = true)]
    pub udp_port: Option<String>,

    /// Seconds between cycle starts (not needed with --once)
    #[arg(value_name = "LOOP_SECONDS", allow_negative_numbers = true)]
    pub loop_seconds: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Job to run; repeat to run several. Defaults to all jobs
    #[arg(short, long = "job", value_enum)]
    pub jobs: Vec<JobKind>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Export the point configuration to a JSON file and exit
    #[arg(short, long, conflicts_with = "once")]
    pub export: Option<PathBuf>,
}

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Export(PathBuf),
    Once { port: u16 },
    Loop { port: u16, cadence: Duration },
}

impl Args {
    /// Validate the positional arguments against the flags.
    pub fn mode(&self) -> Result<Mode, CliError> {
        if let Some(path) = &self.export {
            return Ok(Mode::Export(path.clone()));
        }

        let port = self
            .udp_port
            .as_deref()
            .ok_or(CliError::MissingArguments("UDP port expected"))
            .and_then(parse_port)?;

        if self.once {
            return Ok(Mode::Once { port });
        }

        let cadence = self
            .loop_seconds
            .as_deref()
            .ok_or(CliError::MissingArguments("UDP port and loop time (seconds) expected"))
            .and_then(parse_interval)?;

        Ok(Mode::Loop { port, cadence })
    }

    /// Selected jobs, or all of them.
    pub fn job_kinds(&self) -> Vec<JobKind> {
        if self.jobs.is_empty() {
            JobKind::ALL.to_vec()
        } else {
            self.jobs.clone()
        }
    }
}

/// Errors that end the process, each with its own exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    MissingArguments(&'static str),

    #[error("invalid port number {0}")]
    InvalidPort(String),

    #[error("invalid loop time (seconds) {0}")]
    InvalidInterval(String),

    #[error("bad configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::MissingArguments(_) => 1,
            CliError::InvalidPort(_) => 2,
            CliError::InvalidInterval(_) => 3,
            CliError::Config(_) => 4,
            CliError::Runtime(_) => 5,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CliError::Runtime(_) => ErrorKind::PublishFailure,
            _ => ErrorKind::FatalConfig,
        }
    }
}

/// Parse a UDP port in `1..=65535`.
pub fn parse_port(s: &str) -> Result<u16, CliError> {
    match s.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(CliError::InvalidPort(s.to_string())),
    }
}

/// Parse a positive whole number of seconds.
pub fn parse_interval(s: &str) -> Result<Duration, CliError> {
    match s.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(CliError::InvalidInterval(s.to_string())),
    }
}
