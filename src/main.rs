//! streamblocks - Main Entry Point
//!
//! Spawns the units declared in a config file, then reads envelopes from
//! stdin, one JSON object per line:
//!
//! ```text
//! {"unit": "clf", "route": "rule", "msg": {"Weights": [2.0], "FeaturePaths": ["x"]}}
//! {"unit": "clf", "route": "in", "msg": {"x": 1.0}}
//! {"unit": "clf", "route": "query"}
//! ```
//!
//! Broadcast records, query replies and error reports are written to stdout
//! as JSON lines. Logs go to stderr. All units are shut down on EOF.

use anyhow::Context;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::thread::JoinHandle;
use streamblocks::{config::AppConfig, runtime::Envelope, Runtime};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => AppConfig::load_or_default(),
    };

    // Held until exit so buffered log lines are flushed
    let _log_guard = init_logging(&config)?;

    tracing::info!("Starting streamblocks with {} units", config.units.len());
    let runtime = Runtime::from_config(&config).context("starting runtime")?;

    let mut printers = Vec::new();
    for name in runtime.names().map(str::to_string).collect::<Vec<_>>() {
        let subscription = runtime.subscribe(&name)?;
        let label = name.clone();
        printers.push(spawn_printer(&label, move || {
            subscription.recv().map(|record| json!({ "unit": name, "out": record }))
        })?);
    }

    let reports = runtime.reports().clone();
    printers.push(spawn_printer("reports", move || {
        reports.recv().ok().map(|report| {
            json!({
                "unit": report.unit,
                "kind": report.unit_kind,
                "error": report.error.to_string(),
                "error_kind": format!("{:?}", report.error_kind()),
                "at": report.at.to_rfc3339(),
            })
        })
    })?);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope = match Envelope::from_json(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Ignoring malformed envelope: {}", e);
                continue;
            }
        };

        let unit = envelope.unit.clone();
        match runtime.dispatch(envelope) {
            Ok(Some(reply)) => print_line(&json!({ "unit": unit, "reply": reply })),
            Ok(None) => {}
            Err(e) => tracing::warn!("Dispatch to '{}' failed: {}", unit, e),
        }
    }

    tracing::info!("Input closed, shutting down...");
    let stats = runtime.shutdown()?;
    for (name, s) in &stats {
        tracing::info!(
            "Unit '{}': {} inputs, {} outputs, {} errors",
            name,
            s.inputs,
            s.outputs,
            s.errors
        );
    }

    for printer in printers {
        let _ = printer.join();
    }
    Ok(())
}

fn init_logging(
    config: &AppConfig,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "streamblocks.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Print lines produced by `next` until it returns `None`.
fn spawn_printer<F>(name: &str, mut next: F) -> anyhow::Result<JoinHandle<()>>
where
    F: FnMut() -> Option<Value> + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("print-{}", name))
        .spawn(move || {
            while let Some(line) = next() {
                print_line(&line);
            }
        })
        .context("spawning printer thread")
}

fn print_line(value: &Value) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", value);
    let _ = stdout.flush();
}
