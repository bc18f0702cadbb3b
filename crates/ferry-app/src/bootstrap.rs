use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use ferry_config::{AdapterDefinition, TransferConfig, load_transfer_config};
use ferry_events::{EventBus, EventEnvelope, is_file_scoped};
use ferry_telemetry::{
    GlobalContextGuard, LogFormat, LoggingConfig, Metrics, log_format_from_config,
};
use ferry_transfer::{RunReport, TransferPipeline};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Environment variable naming the adapter definition file.
pub const ENV_CONFIG_PATH: &str = "FERRY_CONFIG";
/// Environment variable overriding the log format (`json` or `pretty`).
pub const ENV_LOG_FORMAT: &str = "FERRY_LOG_FORMAT";

/// Dependencies required to bootstrap the Ferry application.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    definition: AdapterDefinition,
    config: TransferConfig,
    events: EventBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .map_err(|_| AppError::MissingEnv {
                name: ENV_CONFIG_PATH,
            })?;
        let (definition, config) = load_transfer_config(&path)
            .map_err(|err| AppError::config("definition.load", err))?;

        let settings = Value::Object(definition.settings.clone());
        let format = resolve_log_format(
            std::env::var(ENV_LOG_FORMAT).ok().as_deref(),
            log_format_from_config(Some(&settings)),
        );
        let logging = LoggingConfig {
            format,
            ..LoggingConfig::default()
        };

        let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            logging,
            definition,
            config,
            events: EventBus::new(),
            metrics,
        })
    }
}

/// Entry point for the Ferry application boot sequence.
///
/// # Errors
///
/// Returns an error if the definition cannot be loaded, logging cannot be
/// installed, or a one-shot run fails fatally.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    ferry_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("transfer");

    let BootstrapDependencies {
        logging: _,
        definition,
        config,
        events,
        metrics,
    } = dependencies;

    info!(
        adapter = %definition.name,
        adapter_id = %definition.id,
        source = %config.source_directory.display(),
        target = %config.target_directory.display(),
        "Ferry adapter starting"
    );

    let pipeline = TransferPipeline::new(config, events.clone(), metrics.clone())
        .map_err(|err| AppError::transfer("pipeline.new", err))?;
    let audit = spawn_audit_forwarder(&events);

    let (shutdown_tx, shutdown) = watch::channel(false);
    let signal = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received; finishing in-flight files");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => warn!(error = %err, "failed to listen for shutdown signal"),
        }
    });

    let result = run_schedule(&pipeline, shutdown).await;

    signal.abort();
    audit.abort();
    let snapshot = metrics.snapshot();
    info!(
        files_discovered = snapshot.files_discovered_total,
        files_quarantined = snapshot.files_quarantined_total,
        bytes_transferred = snapshot.bytes_transferred_total,
        "Ferry adapter stopped"
    );
    result.map(|_| ())
}

/// Run the pipeline once, or every `poll_interval` until `shutdown` flips.
///
/// In polling mode a fatal run error is logged and the next cycle still runs;
/// in one-shot mode it is returned. Returns the number of runs attempted.
pub(crate) async fn run_schedule(
    pipeline: &TransferPipeline,
    mut shutdown: watch::Receiver<bool>,
) -> AppResult<u64> {
    let poll_interval = pipeline.config().poll_interval;
    let mut runs = 0;
    loop {
        runs += 1;
        match pipeline.run_until(shutdown.clone()).await {
            Ok(report) => log_report(&report),
            Err(err) if poll_interval.is_some() => {
                error!(error = %err.detail(), "transfer run failed; retrying next cycle");
            }
            Err(err) => return Err(AppError::transfer("pipeline.run", err)),
        }

        let Some(interval) = poll_interval else {
            break;
        };
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => break,
                Ok(()) => {}
                Err(_) => tokio::time::sleep(interval).await,
            },
        }
    }
    Ok(runs)
}

fn log_report(report: &RunReport) {
    info!(
        run_id = %report.run_id,
        discovered = report.discovered,
        transferred = report.transferred,
        rejected = report.rejected,
        quarantined = report.quarantined,
        failed = report.failed,
        cancelled = report.cancelled,
        "run report"
    );
    for failure in &report.failures {
        warn!(
            run_id = %report.run_id,
            file = %failure.file_name,
            error = %failure.message,
            "file failed this run"
        );
    }
}

fn resolve_log_format(env_value: Option<&str>, configured: Option<LogFormat>) -> LogFormat {
    env_value
        .map(LogFormat::parse_or_infer)
        .or(configured)
        .unwrap_or_else(LogFormat::infer)
}

fn spawn_audit_forwarder(events: &EventBus) -> JoinHandle<()> {
    let mut stream = events.subscribe(None);
    tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            audit_event(&envelope);
        }
    })
}

fn audit_event(envelope: &EventEnvelope) {
    let payload = serde_json::to_string(&envelope.event).unwrap_or_default();
    if is_file_scoped(&envelope.event) {
        info!(
            target: "ferry::audit",
            event_id = envelope.id,
            kind = envelope.event.kind(),
            payload = %payload,
            "audit"
        );
    } else {
        debug!(
            target: "ferry::audit",
            event_id = envelope.id,
            kind = envelope.event.kind(),
            payload = %payload,
            "audit"
        );
    }
}
