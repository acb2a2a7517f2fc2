use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use metareview::QuerySummary;
use metareview::cli::{self, Cli};
use metareview::gerrit::{GerritError, SshQuery};
use metareview::output::{Style, write_all_comments};
use metareview::parser::ChangeStream;

fn main() -> ExitCode {
    let args = cli::parse_args();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if is_broken_pipe(&err) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<GerritError>()
                .map_or(1, GerritError::exit_code);
            ExitCode::from(code as u8)
        }
    }
}

/// Log to stderr; `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "metareview=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn run(args: &Cli) -> Result<()> {
    let style = Style::new(args.format, args.color);
    let mut stdout = io::stdout().lock();

    let summary = match &args.from_file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let mut changes = ChangeStream::new(BufReader::new(file));
            write_all_comments(&mut changes, &args.reviewer, &mut stdout, style)
                .with_context(|| format!("Failed to process {}", path.display()))?
        }
        None => {
            let params = args.query_params();
            let (query, mut changes) = SshQuery::spawn(&args.ssh_program, &params)?;
            let summary = write_all_comments(&mut changes, &params.reviewer, &mut stdout, style)?;
            query.finish()?;
            summary
        }
    };

    report(&summary);
    Ok(())
}

fn report(summary: &QuerySummary) {
    debug!(
        changes = summary.changes,
        comments = summary.comments,
        "query complete"
    );
    if summary.skipped_lines > 0 {
        warn!(
            "skipped {} malformed record(s) in the query response",
            summary.skipped_lines
        );
    }
    if summary.more_changes {
        warn!("the server truncated the result; some comments are not shown");
    }
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}
