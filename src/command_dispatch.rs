//! Purpose: Hold top-level CLI command dispatch for `jsonpipe`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `dump` writes to stdout only after every needed row has decoded.
//! Invariants: `ingest` prints nothing on success; the row count goes to the log.
//! Invariants: Stdout write failures surface as `Io` errors, never panics.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Dump {
            db,
            table,
            column,
            path,
            cap,
            pretty,
        } => {
            let config = dump_config(db, table, column, path, cap);
            jsonpipe::api::dump_to_writer(&config, pretty, io::stdout().lock())?;
            Ok(RunOutcome::ok())
        }
        Command::Ingest {
            db,
            table,
            create,
            files,
        } => {
            let config = ingest_config(db, table, create);
            let outcome = jsonpipe::api::ingest(&config, input_lines(files))?;
            tracing::debug!(lines = outcome.lines, "ingest finished");
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            let mut script = Vec::new();
            clap_complete::aot::generate(shell, &mut cmd, "jsonpipe", &mut script);
            write_output(io::stdout().lock(), &script)?;
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output()?;
            Ok(RunOutcome::ok())
        }
    }
}
