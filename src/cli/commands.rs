use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use time::{Date, UtcOffset};

use crate::app::App;
use crate::config::{AppConfig, SearchOptions, SourceOptions};
use crate::fetch::{build_source, fetch_blocking, CsvSource, Fetcher};
use crate::records::{format_date, parse_date};
use crate::schedule::compute_due;
use crate::search::{filter, EmptyReason, SearchOutcome, VisibleRow};
use crate::store;
use crate::ui::format_long_date;

#[derive(Args, Debug, Clone, Default)]
pub struct TuiArgs {
    /// Start on this date instead of today (DD-MM-YYYY)
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<Date>,
    /// Read the sheet from a local CSV file instead of the configured URL
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DueArgs {
    /// Reference date (DD-MM-YYYY), defaults to today
    #[arg(long, value_parser = parse_date_arg)]
    pub date: Option<Date>,
    /// Only keep rows whose name, date or revision count contains this text
    #[arg(long, default_value = "")]
    pub query: String,
    /// Read the sheet from a local CSV file, `-` for stdin
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Emit JSON instead of plain text
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct DueReport<'a> {
    date: String,
    query: &'a str,
    empty: Option<EmptyReason>,
    message: Option<&'static str>,
    rows: &'a [VisibleRow],
}

fn parse_date_arg(input: &str) -> Result<Date, String> {
    parse_date(input).ok_or_else(|| format!("invalid date '{input}', use DD-MM-YYYY"))
}

pub fn run_tui(config: Arc<AppConfig>, args: TuiArgs, offset: UtcOffset) -> Result<()> {
    if args.file.as_ref().is_some_and(|path| path.as_os_str() == "-") {
        bail!("the interactive list needs the terminal on stdin, pass a file path instead");
    }
    let source = build_source(&config.source, args.file).context("preparing sheet source")?;
    let fetcher = Fetcher::new(source);
    let mut app = App::new(config, fetcher, args.date, offset);
    app.run()
}

pub fn print_due(config: Arc<AppConfig>, args: DueArgs, offset: UtcOffset) -> Result<()> {
    let source = due_source(&config.source, args.file.clone())?;
    let reference = args.date.unwrap_or_else(|| store::today(offset));
    let output = run_due(source.as_ref(), &config.search, &args, reference)?;
    print!("{output}");
    Ok(())
}

/// The configured URL unless `--file` names a file, or `-` for piped stdin.
fn due_source(options: &SourceOptions, file: Option<PathBuf>) -> Result<Arc<dyn CsvSource>> {
    if file.as_ref().is_some_and(|path| path.as_os_str() == "-") && atty::is(atty::Stream::Stdin)
    {
        bail!("--file - expects the sheet piped on stdin");
    }
    build_source(options, file).context("preparing sheet source")
}

fn run_due(
    source: &dyn CsvSource,
    search: &SearchOptions,
    args: &DueArgs,
    reference: Date,
) -> Result<String> {
    let records = match fetch_blocking(source) {
        Ok(records) => records,
        Err(err) => {
            tracing::error!(error = %err, "could not load revision sheet");
            Vec::new()
        }
    };
    let due = compute_due(&records, reference);
    let outcome = filter(&due, &args.query);

    if args.json {
        let reason = outcome.empty_reason();
        let report = DueReport {
            date: format_date(reference),
            query: &outcome.query,
            empty: reason,
            message: reason.map(EmptyReason::message),
            rows: &outcome.rows,
        };
        let mut json = serde_json::to_string_pretty(&report).context("serialising due rows")?;
        json.push('\n');
        return Ok(json);
    }

    Ok(format_due_rows(reference, &outcome, search))
}

fn format_due_rows(reference: Date, outcome: &SearchOutcome, search: &SearchOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", format_long_date(reference));
    if let Some(reason) = outcome.empty_reason() {
        let _ = writeln!(&mut out, "{}", reason.message());
        return out;
    }

    let (open, close) = (
        search.highlight_open.as_str(),
        search.highlight_close.as_str(),
    );
    for row in &outcome.rows {
        let mut line = format!(
            "{}  {}  {} revisions  ({})",
            row.name.markup(open, close),
            row.date.markup(open, close),
            row.revisions.markup(open, close),
            row.due.interval
        );
        if let Some(link) = &row.due.record.link {
            line.push_str("  ");
            line.push_str(link);
        }
        let _ = writeln!(&mut out, "{line}");
    }
    out
}
