use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::QueryParams;
use crate::gerrit::validate_query_term;

pub const DEFAULT_PROJECT: &str = "openstack/heat";
pub const DEFAULT_SSH_SERVER: &str = "review.openstack.org";
/// Gerrit's standard SSH port.
pub const DEFAULT_SSH_PORT: u16 = 29418;

#[derive(Parser, Debug)]
#[command(
    name = "metareview",
    version,
    about = "A tool for reviewing reviewers.",
    long_about = "A tool for reviewing reviewers.\n\n\
                  Prints all of the comments left by a given Gerrit reviewer."
)]
pub struct Cli {
    /// The project to look in.
    #[arg(
        short,
        long,
        value_name = "PROJECT",
        default_value = DEFAULT_PROJECT,
        value_parser = query_term
    )]
    pub project: String,

    /// The Gerrit username to connect with (defaults to the ssh client's choice).
    #[arg(short = 'u', long, value_name = "SSH_USER")]
    pub ssh_user: Option<String>,

    /// The Gerrit server to connect to.
    #[arg(
        short = 's',
        long,
        value_name = "SSH_SERVER",
        default_value = DEFAULT_SSH_SERVER,
        value_parser = server_name
    )]
    pub ssh_server: String,

    /// The Gerrit SSH port.
    #[arg(short = 'P', long, value_name = "PORT", default_value_t = DEFAULT_SSH_PORT)]
    pub ssh_port: u16,

    /// Remote-shell client used to reach the server.
    #[arg(long, value_name = "PROGRAM", default_value = "ssh")]
    pub ssh_program: String,

    /// Read saved `gerrit query --format=JSON` output instead of querying the server.
    #[arg(short, long, value_name = "FILE")]
    pub from_file: Option<PathBuf>,

    /// Output layout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Line)]
    pub format: OutputFormat,

    /// When to color comment headers.
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Log debug details to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Reviewer whose comments to fetch (username, or email address).
    #[arg(value_name = "REVIEWER", value_parser = query_term)]
    pub reviewer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per comment.
    Line,
    /// Header line followed by the full comment text.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color only when stdout is a terminal.
    Auto,
    Always,
    Never,
}

impl Cli {
    /// Query parameters described by these arguments.
    pub fn query_params(&self) -> QueryParams {
        QueryParams {
            project: self.project.clone(),
            reviewer: self.reviewer.clone(),
            ssh_user: self.ssh_user.clone(),
            ssh_server: self.ssh_server.clone(),
            ssh_port: self.ssh_port,
        }
    }
}

/// A reviewer or project that can be embedded in the remote query.
fn query_term(value: &str) -> Result<String, String> {
    validate_query_term(value).map_err(|err| err.to_string())?;
    Ok(value.to_string())
}

/// A host name for the ssh client; never empty and never option-like.
fn server_name(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err("empty server name".to_string());
    }
    if value.starts_with('-') {
        return Err(format!("server name must not start with '-': {}", value));
    }
    Ok(value.to_string())
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
