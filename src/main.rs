//! Purpose: `jsonpipe` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Stdout carries only command output; logs and errors go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod ingest;

use ingest::{InputLines, InputSource};
use jsonpipe::api::{
    DEFAULT_CAP, DEFAULT_COLUMN, DEFAULT_JSON_PATH, DEFAULT_TABLE, DEFAULT_TARGET, DumpConfig,
    Error, ErrorKind, IngestConfig, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command)
        .map_err(add_database_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "jsonpipe",
    version,
    about = "Pipe lines into SQLite and dump embedded JSON arrays back out",
    after_help = r#"EXAMPLES
  $ cat results.jsonl | jsonpipe ingest --table search_results --create
  $ jsonpipe dump --cap 1000 > hits.json

ENVIRONMENT
  DB_URI    database file or file: URI (default: ./pre-sqlite-olt.db)
  TABLE     target table for `ingest`
  RUST_LOG  log filter for stderr diagnostics (default: warn)"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Print the JSON arrays stored in a table as one flattened array",
        long_about = r#"Read `json_extract(COLUMN, PATH)` from every row of TABLE whose COLUMN is valid JSON,
concatenate the arrays in row order, and print them as a single JSON array.

Rows are read until at least CAP items are collected. The row that reaches the cap
is kept whole, so the output may hold more than CAP items."#,
        after_help = r#"EXAMPLES
  $ jsonpipe dump
  $ jsonpipe dump --db hn.db --table pages --path '$.items' --cap 500 --pretty"#
    )]
    Dump {
        #[arg(long, env = "DB_URI", default_value = DEFAULT_TARGET, help = "Database file or file: URI")]
        db: String,
        #[arg(long, default_value = DEFAULT_TABLE, help = "Table holding the JSON documents")]
        table: String,
        #[arg(long, default_value = DEFAULT_COLUMN, help = "Column holding the JSON documents")]
        column: String,
        #[arg(long, default_value = DEFAULT_JSON_PATH, help = "JSON path of the array inside each document")]
        path: String,
        #[arg(long, default_value_t = DEFAULT_CAP, help = "Stop reading rows once this many items are collected")]
        cap: usize,
        #[arg(long, help = "Indent the output instead of printing one line")]
        pretty: bool,
    },
    #[command(
        about = "Insert each input line as a row of a one-column table",
        long_about = r#"Read lines from FILE operands (or stdin when none are given, or for `-`) and insert
each one verbatim, line terminator included, into TABLE. All lines commit together."#,
        after_help = r#"EXAMPLES
  $ jsonpipe ingest --table search_results --create results.jsonl
  $ TABLE=search_results jsonpipe ingest < results.jsonl"#
    )]
    Ingest {
        #[arg(long, env = "DB_URI", default_value = DEFAULT_TARGET, help = "Database file or file: URI")]
        db: String,
        #[arg(long, env = "TABLE", help = "Table receiving the lines")]
        table: String,
        #[arg(long, help = "Create the table (one TEXT column) if it does not exist")]
        create: bool,
        #[arg(value_name = "FILE", help = "Input files; `-` reads stdin")]
        files: Vec<PathBuf>,
    },
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version information")]
    Version,
}

fn dump_config(db: String, table: String, column: String, path: String, cap: usize) -> DumpConfig {
    DumpConfig::new(db)
        .with_table(table)
        .with_column(column)
        .with_json_path(path)
        .with_cap(cap)
}

fn ingest_config(db: String, table: String, create: bool) -> IngestConfig {
    IngestConfig::new(table)
        .with_connection_target(db)
        .with_create_table(create)
}

fn input_lines(files: Vec<PathBuf>) -> InputLines {
    InputLines::new(files.into_iter().map(InputSource::from_operand).collect())
}

fn emit_version_output() -> Result<(), Error> {
    let text = if io::stdout().is_terminal() {
        format!("jsonpipe {}", env!("CARGO_PKG_VERSION"))
    } else {
        json!({
            "name": "jsonpipe",
            "version": env!("CARGO_PKG_VERSION"),
        })
        .to_string()
    };
    write_output(io::stdout().lock(), format!("{text}\n").as_bytes())
}

/// Writes command output, mapping failures (EPIPE included) to `Io`.
fn write_output<W: Write>(mut out: W, bytes: &[u8]) -> Result<(), Error> {
    out.write_all(bytes)
        .and_then(|()| out.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output")
                .with_source(err)
        })
}

fn add_database_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Database || err.hint().is_some() {
        return err;
    }
    err.with_hint("Database error. Check --db / DB_URI and that the file is a SQLite database.")
}

fn add_io_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Io || err.hint().is_some() {
        return err;
    }
    err.with_hint("I/O error. Check the path, permissions, and disk space.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    let rendered = if is_tty {
        error_text(err, color_mode.use_color(is_tty))
    } else {
        error_json(err).to_string()
    };
    let _ = writeln!(io::stderr().lock(), "{rendered}");
}

fn error_message(err: &Error) -> &str {
    err.message().unwrap_or(match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::NotFound => "not found",
        ErrorKind::Database => "database error",
        ErrorKind::Decode => "decode error",
        ErrorKind::Type => "unexpected json type",
        ErrorKind::Io => "i/o error",
    })
}

/// Optional context carried by an error, in display order.
fn error_context(err: &Error) -> Vec<(&'static str, Value)> {
    let mut fields = Vec::new();
    if let Some(hint) = err.hint() {
        fields.push(("hint", json!(hint)));
    }
    if let Some(path) = err.path() {
        fields.push(("path", json!(path.display().to_string())));
    }
    if let Some(row) = err.row() {
        fields.push(("row", json!(row)));
    }
    if let Some(line) = err.line() {
        fields.push(("line", json!(line)));
    }
    fields
}

fn error_causes(err: &Error) -> Vec<String> {
    std::iter::successors(err.source(), |&source| source.source())
        .map(ToString::to_string)
        .collect()
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    inner.extend(
        error_context(err)
            .into_iter()
            .map(|(name, value)| (name.to_string(), value)),
    );
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    json!({ "error": inner })
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    )];
    let causes = error_causes(err);
    let context = error_context(err).into_iter().map(|(name, value)| {
        let text = value.as_str().map_or_else(|| value.to_string(), str::to_string);
        (name, text)
    });
    // Only the outermost cause; the JSON envelope carries the full chain.
    let cause = causes.into_iter().next().map(|cause| ("caused by", cause));
    for (name, text) in context.chain(cause) {
        let label = colorize_label(&format!("{name}:"), use_color, AnsiColor::Yellow);
        lines.push(format!("{label} {text}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("error:").unwrap_or(line).trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `jsonpipe --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "jsonpipe") else {
        return "Try `jsonpipe --help`.".to_string();
    };
    let Some(subcommand) = tokens
        .get(pos + 1)
        .filter(|token| !(token.starts_with('-') || token.starts_with('<') || token.starts_with('[')))
    else {
        return "Try `jsonpipe --help`.".to_string();
    };

    if *subcommand == "ingest" && rendered.contains("--table") {
        return "Pass --table or set TABLE, for example: `jsonpipe ingest --table search_results`."
            .to_string();
    }
    format!("Try `jsonpipe {subcommand} --help`.")
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, error_json, error_text, write_output};
    use clap::{CommandFactory, Parser};
    use jsonpipe::api::{Error, ErrorKind};
    use std::io::{self, Write};

    /// Stdout stand-in for a reader that went away (`... | head`).
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn dump_defaults_follow_api_defaults() {
        let cli = Cli::try_parse_from(["jsonpipe", "dump", "--db", "x.db"]).expect("parse");
        let Command::Dump {
            table,
            column,
            path,
            cap,
            pretty,
            ..
        } = cli.command
        else {
            panic!("expected dump");
        };
        assert_eq!(table, "search_results");
        assert_eq!(column, "data");
        assert_eq!(path, "$.hits");
        assert_eq!(cap, 100_000);
        assert!(!pretty);
    }

    #[test]
    fn ingest_collects_file_operands() {
        let cli = Cli::try_parse_from([
            "jsonpipe", "ingest", "--db", "x.db", "--table", "t", "a.txt", "-",
        ])
        .expect("parse");
        let Command::Ingest { table, files, .. } = cli.command else {
            panic!("expected ingest");
        };
        assert_eq!(table, "t");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn error_json_carries_context() {
        let err = Error::new(ErrorKind::Type)
            .with_message("row decoded to a number, expected an array")
            .with_row(7);
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Type");
        assert_eq!(value["error"]["row"], 7);
        assert!(value["error"].get("line").is_none());
    }

    #[test]
    fn error_text_without_color_has_no_escapes() {
        let err = Error::new(ErrorKind::Io)
            .with_message("failed to read")
            .with_hint("check the file");
        let text = error_text(&err, false);
        assert_eq!(text, "error: failed to read\nhint: check the file");
    }

    #[test]
    fn closed_stdout_is_io_error() {
        let err = write_output(ClosedPipe, b"jsonpipe 0.1.0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.message(), Some("failed to write output"));
    }

    #[test]
    fn output_is_written_whole() {
        let mut out = Vec::new();
        write_output(&mut out, b"complete -F _jsonpipe jsonpipe\n").expect("write");
        assert_eq!(out, b"complete -F _jsonpipe jsonpipe\n");
    }

    #[test]
    fn error_text_lists_context_then_first_cause() {
        let err = Error::new(ErrorKind::Decode)
            .with_message("row is not valid json")
            .with_path("hits.db")
            .with_row(3)
            .with_source(io::Error::other("outer"));
        let text = error_text(&err, false);
        assert_eq!(
            text,
            "error: row is not valid json\npath: hits.db\nrow: 3\ncaused by: outer"
        );
    }

    #[test]
    fn error_json_uses_kind_default_message_and_causes() {
        let err = Error::new(ErrorKind::Database).with_source(io::Error::other("locked"));
        let value = error_json(&err);
        assert_eq!(value["error"]["message"], "database error");
        assert_eq!(value["error"]["causes"][0], "locked");
        assert!(value["error"].get("hint").is_none());
    }
}
