//! Replays JSON-lines actions through a mediator loaded from a routing file.
//!
//! Every derived action is printed as `emit<TAB>json`, every forwarded
//! original as `next<TAB>json`, in the order the mediator produced them.

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use actionmap_engine::{Action, Mediator, RoutingTable};

mod printer;
use printer::PrintingStore;

#[derive(Parser)]
#[command(name = "replay")]
#[command(about = "Replay actions through a routing table")]
#[command(version)]
struct Cli {
    /// Routing table, TOML or JSON (picked by extension)
    #[arg(short, long, env = "ACTIONMAP_TABLE")]
    table: PathBuf,

    /// JSON-lines file of actions. Reads stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// JSON file with the state snapshot the store hands out
    #[arg(short, long, env = "ACTIONMAP_STATE")]
    state: Option<PathBuf>,

    /// Skip malformed lines instead of stopping
    #[arg(long)]
    keep_going: bool,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(log_filter(EnvFilter::from_default_env())?)
        .init();

    let cli = Cli::parse();

    let table = load_table(&cli.table)?;
    info!(
        table = %cli.table.display(),
        kinds = table.len(),
        "Loaded routing table"
    );
    let state = match &cli.state {
        Some(path) => load_state(path)?,
        None => Value::Null,
    };

    let input: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let summary = replay(table, state, input, io::stdout().lock(), cli.keep_going)?;
    info!(
        handled = summary.handled,
        suppressed = summary.suppressed,
        skipped = summary.skipped,
        "Replay complete"
    );
    Ok(())
}

/// Library events log under `actionmap_*`, this binary's under `replay`.
fn log_filter(filter: EnvFilter) -> Result<EnvFilter> {
    Ok(filter
        .add_directive("actionmap=info".parse()?)
        .add_directive("replay=info".parse()?))
}

#[derive(Debug, Default, PartialEq)]
struct Summary {
    handled: usize,
    suppressed: usize,
    skipped: usize,
}

/// Run every JSON line of `input` through a mediator over `table`, printing
/// emissions and forwards to `out`.
fn replay<R: BufRead, W: Write>(
    table: RoutingTable<Value>,
    state: Value,
    input: R,
    out: W,
    keep_going: bool,
) -> Result<Summary> {
    let store = PrintingStore::new(state, out);
    let mediator = Mediator::new(table);
    let handler = mediator
        .bind(&store)
        .then(|action: Action| store.print("next", &action));

    let mut summary = Summary::default();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("reading line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let action: Action = match serde_json::from_str(&line) {
            Ok(action) => action,
            Err(e) if keep_going => {
                warn!(line = line_no, error = %e, "Skipping malformed action");
                summary.skipped += 1;
                continue;
            }
            Err(e) => bail!("line {line_no}: malformed action: {e}"),
        };

        if handler
            .handle(action)
            .with_context(|| format!("line {line_no}"))?
            .is_none()
        {
            summary.suppressed += 1;
        }
        summary.handled += 1;
    }

    store.flush()?;
    Ok(summary)
}

fn load_table(path: &Path) -> Result<RoutingTable<Value>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading routing table {}", path.display()))?;
    parse_table(path, &raw)
}

/// JSON for `.json` files, TOML for anything else.
fn parse_table(path: &Path, raw: &str) -> Result<RoutingTable<Value>> {
    let table = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => RoutingTable::from_json_str(raw)?,
        _ => RoutingTable::from_toml_str(raw)?,
    };
    Ok(table)
}

fn load_state(path: &Path) -> Result<Value> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading state {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing state {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    const TOML_TABLE: &str = r#"
        ["A.in"]
        out_kind = "A.out"

        ["S.in"]
        out_kind = "S.out"
        suppress = true
    "#;

    fn run_lines(lines: &str, keep_going: bool) -> (Result<Summary>, String) {
        let table = parse_table(Path::new("routes.toml"), TOML_TABLE).unwrap();
        let mut out = Vec::<u8>::new();
        let result = replay(table, Value::Null, lines.as_bytes(), &mut out, keep_going);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn default_filter_enables_replay_and_engine_events() {
        let filter = log_filter(EnvFilter::new("")).unwrap();
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "replay", Level::WARN));
            assert!(tracing::enabled!(target: "replay", Level::INFO));
            assert!(tracing::enabled!(target: "actionmap_engine::table", Level::WARN));
            assert!(!tracing::enabled!(target: "replay", Level::DEBUG));
        });
    }

    #[test]
    fn picks_table_format_by_extension() {
        let json = r#"{ "A.in": { "out_kind": "A.out" } }"#;

        let table = parse_table(Path::new("routes.json"), json).unwrap();
        assert!(table.plan("A.in").is_some());

        let table = parse_table(Path::new("routes.toml"), TOML_TABLE).unwrap();
        assert_eq!(table.len(), 2);

        // No extension falls back to TOML.
        assert!(parse_table(Path::new("routes"), TOML_TABLE).is_ok());
        assert!(parse_table(Path::new("routes.toml"), json).is_err());
        assert!(parse_table(Path::new("routes.json"), TOML_TABLE).is_err());
    }

    #[test]
    fn replays_lines_in_order() {
        let (result, out) = run_lines(
            "{\"kind\":\"A.in\",\"src\":\"x\"}\n\n{\"kind\":\"S.in\"}\n",
            false,
        );

        assert_eq!(
            result.unwrap(),
            Summary {
                handled: 2,
                suppressed: 1,
                skipped: 0,
            }
        );
        assert_eq!(
            out,
            "emit\t{\"kind\":\"A.out\",\"src\":\"x\"}\n\
             next\t{\"kind\":\"A.in\",\"src\":\"x\"}\n\
             emit\t{\"kind\":\"S.out\"}\n"
        );
    }

    #[test]
    fn keep_going_skips_malformed_lines() {
        let lines = "not json\n{\"src\":\"no kind\"}\n{\"kind\":\"A.in\"}\n";
        let (result, out) = run_lines(lines, true);

        assert_eq!(
            result.unwrap(),
            Summary {
                handled: 1,
                suppressed: 0,
                skipped: 2,
            }
        );
        assert_eq!(
            out,
            "emit\t{\"kind\":\"A.out\"}\nnext\t{\"kind\":\"A.in\"}\n"
        );
    }

    #[test]
    fn malformed_line_stops_without_keep_going() {
        let (result, out) = run_lines("{\"kind\":\"A.in\"}\nnot json\n{\"kind\":\"A.in\"}\n", false);

        let err = result.unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(
            out,
            "emit\t{\"kind\":\"A.out\"}\nnext\t{\"kind\":\"A.in\"}\n"
        );
    }
}
