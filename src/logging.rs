//! Log file setup.
//!
//! Every event is appended to the log file as one line:
//! `2024-01-01 12:00:00,123 - INFO - message`.

use anyhow::{Context, Result};
use chrono::Local;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Event formatter producing `<timestamp> - <LEVEL> - <message>` lines.
pub struct EtlLogFormat;

impl<S, N> FormatEvent<S, N> for EtlLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Opens the log file in append mode, creating it if absent.
fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Builds a subscriber that appends formatted events to `path`.
///
/// The caller decides the lifetime: `main` installs it globally, tests install it
/// for a scope with `tracing::subscriber::set_default`.
pub fn file_subscriber(path: &Path, level: Level) -> Result<impl Subscriber + Send + Sync + 'static> {
    let file = open_log_file(path)?;

    Ok(tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .event_format(EtlLogFormat)
        .finish())
}

/// Installs the log file subscriber as the process-wide default.
pub fn init(path: &Path, level: Level) -> Result<()> {
    let subscriber = file_subscriber(path, level)?;
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the log subscriber")?;
    Ok(())
}
