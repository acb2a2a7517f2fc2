use crate::QueryParams;
use crate::parser::ChangeStream;
use std::io::BufReader;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::debug;

/// Exit status OpenSSH uses when the connection itself fails.
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, Error)]
pub enum GerritError {
    #[error("could not connect to {server}: {detail}")]
    Connection { server: String, detail: String },
    #[error("gerrit query failed on {server} ({status})")]
    QueryFailed { server: String, status: ExitStatus },
    #[error("invalid query term: {0}")]
    InvalidTerm(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GerritError>;

impl GerritError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Connection { .. } => 3,
            Self::QueryFailed { .. } => 4,
            Self::InvalidTerm(_) | Self::Io(_) => 1,
        }
    }
}

/// Validate a term that will be embedded in the quoted remote query string.
///
/// Allows: alphanumeric, dash, underscore, dot, slash, @, plus, tilde
pub fn validate_query_term(term: &str) -> Result<()> {
    if term.is_empty() {
        return Err(GerritError::InvalidTerm("empty query term".to_string()));
    }

    for ch in term.chars() {
        if !ch.is_alphanumeric() && !matches!(ch, '-' | '_' | '.' | '/' | '@' | '+' | '~') {
            return Err(GerritError::InvalidTerm(format!(
                "invalid character in '{}': '{}'",
                term, ch
            )));
        }
    }

    Ok(())
}

/// Build the remote `gerrit query` command for a reviewer on a project.
pub fn query_command(params: &QueryParams) -> Result<String> {
    validate_query_term(&params.reviewer)?;
    validate_query_term(&params.project)?;

    Ok(format!(
        "gerrit query \"reviewer:{} project:{}\" --comments --format=JSON",
        params.reviewer, params.project
    ))
}

/// Arguments passed to the ssh client: connection options, host, remote command.
///
/// Option parsing ends before the host, so a host can never be read as an option.
pub fn ssh_args(params: &QueryParams, command: &str) -> Vec<String> {
    let mut args = vec!["-p".to_string(), params.ssh_port.to_string()];
    if let Some(user) = &params.ssh_user {
        args.push("-l".to_string());
        args.push(user.clone());
    }
    args.push("--".to_string());
    args.push(params.ssh_server.clone());
    args.push(command.to_string());
    args
}

/// A running remote query.
///
/// The ssh process is reaped by [`SshQuery::finish`]; if the query is dropped
/// before that, the process is killed.
pub struct SshQuery {
    child: Option<Child>,
    server: String,
}

impl SshQuery {
    /// Start the query and return it with a stream over its output.
    pub fn spawn(
        program: &str,
        params: &QueryParams,
    ) -> Result<(Self, ChangeStream<BufReader<ChildStdout>>)> {
        let command = query_command(params)?;
        let server = format!("{}:{}", params.ssh_server, params.ssh_port);
        debug!(%program, %server, %command, "running remote query");

        let mut child = Command::new(program)
            .args(ssh_args(params, &command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| GerritError::Connection {
                server: server.clone(),
                detail: format!("failed to run {}: {}", program, err),
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GerritError::Connection {
                server,
                detail: "ssh stdout was not captured".to_string(),
            });
        };

        let query = Self {
            child: Some(child),
            server,
        };
        Ok((query, ChangeStream::new(BufReader::new(stdout))))
    }

    /// Wait for the remote command and report how it ended.
    pub fn finish(mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        debug!(server = %self.server, %status, "remote query finished");
        check_status(&self.server, status)
    }
}

impl Drop for SshQuery {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn check_status(server: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    if status.code() == Some(SSH_CONNECTION_FAILURE) {
        return Err(GerritError::Connection {
            server: server.to_string(),
            detail: "ssh could not establish the connection".to_string(),
        });
    }

    Err(GerritError::QueryFailed {
        server: server.to_string(),
        status,
    })
}
