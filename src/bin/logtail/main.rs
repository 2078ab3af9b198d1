// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use logtail::init::args::TailArgs;
use logtail::init::wait;
use logtail::receivers::file::{CheckpointStoreCell, LogRecordBatch, open_tailers};

const RECORDS_QUEUE_SIZE: usize = 1_000;

const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Tail files and print their records
    Tail(Box<TailArgs>),

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "logtail")]
#[command(bin_name = "logtail")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "LOGTAIL_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version())
        }
        Some(Commands::Tail(args)) => {
            let _guard = match setup_logging(&opt.log_format) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            if let Err(e) = run_tail(args) {
                error!(error = e, "Failed to tail files.");
                return ExitCode::from(1);
            }
        }
        None => {
            // unreachable while a subcommand is required
            error!("Must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn run_tail(args: Box<TailArgs>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = args.tailer_config();
    let checkpoints = CheckpointStoreCell::new();
    let store = checkpoints.get_or_open(&args.checkpoint_config());
    if !store.is_available() {
        warn!(
            path = ?store.path(),
            "Checkpoint store unavailable, positions will not be recorded"
        );
    }

    // Nothing below may return early once tailers are running
    let mut sig_term = sig(SignalKind::terminate())?;
    let mut sig_int = sig(SignalKind::interrupt())?;

    let (records_tx, records_rx) = flume::bounded::<LogRecordBatch>(RECORDS_QUEUE_SIZE);
    let opened = open_tailers(&args.path, &config, &store, &records_tx);
    drop(records_tx);

    if opened.is_empty() {
        if store.is_available() {
            store.close()?;
        }
        return Err("none of the given paths could be opened".into());
    }

    let cancel_token = CancellationToken::new();
    let mut tailers = JoinSet::new();
    for tailer in opened {
        let token = cancel_token.clone();
        tailers.spawn_blocking(move || tailer.run(&token));
    }

    // Finishes once every tailer has stopped and dropped its sender
    let mut printer = tokio::task::spawn_blocking(move || print_records(records_rx));
    let mut printer_done = false;

    select! {
        _ = sig_term.recv() => info!("Shutdown signal received."),
        _ = sig_int.recv() => info!("Shutdown signal received."),
        r = &mut printer => {
            info!("All tailers stopped.");
            printer_done = true;
            log_printer_result(r);
        },
    }
    cancel_token.cancel();

    let result =
        wait::wait_for_tasks_with_timeout(&mut tailers, Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
            .await;

    if !printer_done {
        log_printer_result(printer.await);
    }

    if store.is_available() {
        store.close()?;
    }
    result?;
    Ok(())
}

fn log_printer_result(r: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match r {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to print records"),
        Err(e) => warn!(error = ?e, "Failed to join record printer"),
    }
}

fn print_records(records_rx: flume::Receiver<LogRecordBatch>) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    for batch in records_rx.iter() {
        let mut out = stdout.lock();
        for record in &batch.log_records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
    }
    Ok(())
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init()?;

    // stdout carries the records
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("opentelemetry=warn".parse()?);

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = std::io::stderr().is_terminal();

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

fn sig(kind: SignalKind) -> std::io::Result<tokio::signal::unix::Signal> {
    signal(kind)
}
