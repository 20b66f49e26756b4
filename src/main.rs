use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mailroute::config::{JobConfig, SourceKind};
use mailroute::items::{DirectorySource, ItemSource, MailboxSource};
use mailroute::pipeline::{Engine, RunReport};
use mailroute::processors::ProcessorRegistry;
use mailroute::processors::builtin::register_builtins;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit.
    let _log_guard = init_tracing()?;

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MAILROUTE_CONFIG").ok())
        .unwrap_or_else(|| {
            eprintln!("Error: no job configuration given");
            eprintln!("  mailroute <job.json>   or   export MAILROUTE_CONFIG=job.json");
            std::process::exit(1);
        });

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted, finishing the current item...");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let report = run_job(&PathBuf::from(&config_path), shutdown)
        .await
        .with_context(|| format!("Job {config_path} failed"))?;

    eprintln!(
        "\n✅ Done: {} dispatched, {} failed, {} containers opened, {} leaves skipped{}",
        report.dispatches.len(),
        report.failed(),
        report.containers_opened,
        report.leaves_skipped,
        if report.cancelled { " (cancelled)" } else { "" },
    );
    for dispatch in report.dispatches.iter().filter(|d| d.outcome.label() == "failed") {
        eprintln!("   ❌ {} [{}]", dispatch.item, dispatch.processor_id);
    }

    if std::env::var("MAILROUTE_REPORT_JSON").is_ok() {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

/// Load the job, wire the source and processors, and run it.
async fn run_job(config_path: &Path, shutdown: Arc<AtomicBool>) -> mailroute::Result<RunReport> {
    let config = JobConfig::from_file(config_path)?;

    let source_dir =
        std::env::var("MAILROUTE_SOURCE_DIR").unwrap_or_else(|_| "./data/inbox".to_string());
    let source_kind: SourceKind = match std::env::var(SourceKind::ENV_KEY) {
        Ok(value) => value.parse()?,
        Err(_) => SourceKind::default(),
    };
    let source: Arc<dyn ItemSource> = match source_kind {
        SourceKind::Mail => Arc::new(MailboxSource::new(&source_dir)),
        SourceKind::Files => Arc::new(DirectorySource::new(&source_dir)),
    };

    // Duplicate ids are a programming error: fail before any item is touched.
    let registry = ProcessorRegistry::new();
    register_builtins(&registry)?;

    eprintln!("📬 mailroute v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Job: {} ({})", config.job_name, config.domain);
    eprintln!("   Source: {} [{}]", source_dir, source_kind);
    eprintln!("   Destination: {}", config.destination_path.display());
    eprintln!("   Processors: {}\n", registry.ids().join(", "));

    let engine = Engine::new(config, Arc::new(registry), source).with_shutdown(shutdown);
    Ok(engine.run().await?)
}

/// Console logging from `RUST_LOG` (default `info`), plus a daily log file
/// when `MAILROUTE_LOG_DIR` is set.
fn init_tracing() -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    let (file, guard) = match std::env::var("MAILROUTE_LOG_DIR") {
        Ok(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {dir}"))?;
            let appender = tracing_appender::rolling::daily(&dir, "mailroute.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    Ok(guard)
}
