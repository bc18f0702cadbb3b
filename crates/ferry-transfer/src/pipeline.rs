//! Transfer pipeline: collection followed by delivery.
//!
//! # Design
//!
//! - Collection scans the source, runs the validation chain, waits out the
//!   stability window, and reads surviving files into [`TransferUnit`]s.
//! - Delivery writes units through a bounded pool of blocking workers and
//!   post-processes each source once its write is confirmed.
//! - Only directory-level failures abort a run; per-file problems are folded
//!   into the [`RunReport`], the event bus, and the step recorders.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Instant, SystemTime};

use chrono::{Local, NaiveDateTime};
use ferry_config::{TransferConfig, compile_globs, validate_transfer_config};
use ferry_events::{DiscoveredFile, Event, EventBus};
use ferry_telemetry::Metrics;
use globset::GlobSet;
use tokio::sync::watch;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::delivery::{DeliveryJob, Destination};
use crate::error::{TransferError, TransferResult};
use crate::model::{
    DeliveryResult, DeliveryStatus, Decision, FileCandidate, RejectCategory, RunReport,
    TransferUnit, ValidationOutcome,
};
use crate::postprocess::{PostProcessOutcome, PostProcessStatus};
use crate::quarantine::quarantine_file;
use crate::recorder::{StepRecord, StepRecorder};
use crate::scanner::scan;
use crate::stability;
use crate::validation::ValidationChain;

const HEALTH_COMPONENT: &str = "transfer";

/// Source of local wall-clock time used for output, archive and quarantine names.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

type WorkerOutput = (DeliveryResult, Option<PostProcessOutcome>);

/// Unit handed to a delivery worker that has not been joined yet.
struct InFlight {
    file_name: String,
    destination: Destination,
}

/// Service that moves files from one directory to another for a single configuration.
#[derive(Clone)]
pub struct TransferPipeline {
    config: Arc<TransferConfig>,
    include: GlobSet,
    chain: Arc<ValidationChain>,
    events: EventBus,
    metrics: Metrics,
    recorders: Vec<Arc<dyn StepRecorder>>,
    health_degraded: Arc<Mutex<bool>>,
    clock: Clock,
}

impl TransferPipeline {
    /// Validate `config` and build a pipeline publishing to `events`.
    ///
    /// The metrics registry is registered as the first step recorder.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Config`] when the configuration is invalid.
    pub fn new(config: TransferConfig, events: EventBus, metrics: Metrics) -> TransferResult<Self> {
        validate_transfer_config(&config)?;
        let include = compile_globs("filePattern", &config.file_pattern)?;
        let chain = ValidationChain::new(&config)?;
        let recorders: Vec<Arc<dyn StepRecorder>> = vec![Arc::new(metrics.clone())];
        Ok(Self {
            config: Arc::new(config),
            include,
            chain: Arc::new(chain),
            events,
            metrics,
            recorders,
            health_degraded: Arc::new(Mutex::new(false)),
            clock: local_now,
        })
    }

    /// Register an additional step recorder.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn StepRecorder>) -> Self {
        self.recorders.push(recorder);
        self
    }

    /// Replace the wall clock used for generated names.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration the pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Execute one full run without an external shutdown signal.
    ///
    /// # Errors
    ///
    /// See [`TransferPipeline::run_until`].
    pub async fn run(&self) -> TransferResult<RunReport> {
        let (_shutdown_tx, shutdown) = watch::channel(false);
        self.run_until(shutdown).await
    }

    /// Execute one full run, stopping between files once `shutdown` flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error when the source directory is not accessible, the target
    /// directory cannot be created, or a worker task fails to join. Per-file
    /// failures never surface here; they are counted in the report.
    pub async fn run_until(&self, shutdown: watch::Receiver<bool>) -> TransferResult<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("transfer_run", run_id = %run_id);
        async move {
            let started = Instant::now();
            let mut report = RunReport::new(run_id);
            self.publish_event(Event::RunStarted {
                run_id,
                source_directory: self.config.source_directory.display().to_string(),
            });

            match self.execute(run_id, &mut report, &shutdown).await {
                Ok(()) => {
                    self.mark_recovered();
                    let outcome = if report.cancelled {
                        "cancelled"
                    } else {
                        "completed"
                    };
                    self.metrics.observe_run(outcome, started.elapsed());
                    self.publish_event(Event::RunCompleted {
                        run_id,
                        transferred: report.transferred,
                        rejected: report.rejected,
                        failed: report.failed,
                        cancelled: report.cancelled,
                    });
                    info!(
                        discovered = report.discovered,
                        accepted = report.accepted,
                        rejected = report.rejected,
                        quarantined = report.quarantined,
                        transferred = report.transferred,
                        failed = report.failed,
                        post_processed = report.post_processed,
                        warnings = report.warnings,
                        cancelled = report.cancelled,
                        "transfer run finished"
                    );
                    Ok(report)
                }
                Err(err) => {
                    let detail = err.detail();
                    self.mark_degraded(&detail);
                    self.metrics.observe_run("failed", started.elapsed());
                    self.publish_event(Event::RunFailed {
                        run_id,
                        message: detail,
                    });
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        report: &mut RunReport,
        shutdown: &watch::Receiver<bool>,
    ) -> TransferResult<()> {
        let mut context = self.collect(run_id, report, shutdown).await?;
        self.deliver(run_id, &mut context, report, shutdown).await
    }

    /// Collection stage: scan, validate, wait for stability, and read content.
    ///
    /// Units whose read failed stay in the context (marked unreadable) and are
    /// already counted as failed in `report`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::SourceNotAccessible`] or a scan error when the
    /// source directory cannot be listed.
    pub async fn collect(
        &self,
        run_id: Uuid,
        report: &mut RunReport,
        shutdown: &watch::Receiver<bool>,
    ) -> TransferResult<ExecutionContext> {
        let source = self.config.source_directory.clone();
        let include = self.include.clone();
        let candidates = task::spawn_blocking(move || scan(&source, &include))
            .await
            .map_err(|err| TransferError::worker("collect.scan", err))??;

        report.discovered = count(candidates.len());
        self.metrics.add_discovered(report.discovered);
        debug!(count = candidates.len(), "source directory scanned");
        self.publish_event(Event::FilesDiscovered {
            run_id,
            files: candidates
                .iter()
                .map(|candidate| DiscoveredFile {
                    name: candidate.name.clone(),
                    size_bytes: candidate.size_bytes,
                })
                .collect(),
        });

        let mut survivors = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if is_cancelled(shutdown) {
                report.cancelled = true;
                break;
            }
            match self.chain.check_required(&candidate) {
                Some(outcome) => self.reject(run_id, &candidate, &outcome, report).await,
                None => survivors.push(candidate),
            }
        }

        let baselines = survivors
            .iter()
            .map(|candidate| (candidate.path.clone(), candidate.last_modified_at))
            .collect();
        let stable_flags = stability::check_all(baselines, self.config.stability_wait).await;

        let mut context = ExecutionContext::new();
        for (candidate, stable) in survivors.into_iter().zip(stable_flags) {
            if report.cancelled || is_cancelled(shutdown) {
                report.cancelled = true;
                break;
            }
            if !stable {
                self.reject(run_id, &candidate, &ValidationChain::unstable(), report)
                    .await;
                continue;
            }
            if let Some(unit) = self.read_candidate(run_id, &candidate, report).await? {
                context.files_to_process.push(unit);
            }
        }
        Ok(context)
    }

    async fn read_candidate(
        &self,
        run_id: Uuid,
        candidate: &FileCandidate,
        report: &mut RunReport,
    ) -> TransferResult<Option<TransferUnit>> {
        let action = self.config.post_process_action;
        let archive_directory = self.config.archive_directory.clone();
        let path = candidate.path.clone();
        let read = task::spawn_blocking(move || fs::read(path))
            .await
            .map_err(|err| TransferError::worker("collect.read", err))?;

        let content = match read {
            Ok(content) => content,
            Err(err) => {
                let message = format!("failed to read source file: {err}");
                warn!(file = %candidate.name, error = %err, "failed to read source file");
                report.record_failure(&candidate.name, message.clone());
                self.publish_event(Event::FileTransferFailed {
                    run_id,
                    file_name: candidate.name.clone(),
                    message: message.clone(),
                });
                return Ok(Some(TransferUnit::read_failed(
                    candidate,
                    message,
                    action,
                    archive_directory,
                )));
            }
        };

        let outcome = if self.chain.has_rules() {
            self.chain
                .evaluate_rules(candidate, &content, SystemTime::now())
        } else {
            ValidationOutcome::accept(Vec::new())
        };
        if !outcome.is_accepted() {
            self.reject(run_id, candidate, &outcome, report).await;
            return Ok(None);
        }

        report.accepted += 1;
        report.warnings += count(outcome.warnings.len());
        for warning in &outcome.warnings {
            warn!(file = %candidate.name, warning = %warning, "validation warning");
        }
        self.publish_event(Event::FileValidated {
            run_id,
            file_name: candidate.name.clone(),
            warnings: outcome.warnings,
        });
        Ok(Some(TransferUnit::read(
            candidate,
            content,
            action,
            archive_directory,
        )))
    }

    async fn reject(
        &self,
        run_id: Uuid,
        candidate: &FileCandidate,
        outcome: &ValidationOutcome,
        report: &mut RunReport,
    ) {
        report.rejected += 1;
        let category = outcome.category.unwrap_or(RejectCategory::Unknown);
        let reason = outcome.reason.clone().unwrap_or_default();
        self.metrics.inc_rejected(category.as_str());
        info!(
            file = %candidate.name,
            category = category.as_str(),
            reason = %reason,
            "file rejected"
        );
        self.publish_event(Event::FileRejected {
            run_id,
            file_name: candidate.name.clone(),
            category: category.as_str().to_string(),
            reason,
        });

        if outcome.decision != Decision::RejectQuarantine {
            return;
        }
        let Some(error_directory) = self.config.quarantine_directory().cloned() else {
            return;
        };
        let source = candidate.path.clone();
        let now = (self.clock)();
        let moved =
            task::spawn_blocking(move || quarantine_file(&source, &error_directory, now)).await;
        match moved {
            Ok(Ok(quarantine_path)) => {
                report.quarantined += 1;
                self.metrics.inc_quarantined();
                info!(
                    file = %candidate.name,
                    path = %quarantine_path.display(),
                    "file quarantined"
                );
                self.publish_event(Event::FileQuarantined {
                    run_id,
                    file_name: candidate.name.clone(),
                    quarantine_path: quarantine_path.display().to_string(),
                });
            }
            Ok(Err(err)) => {
                warn!(
                    file = %candidate.name,
                    error = %err.detail(),
                    "quarantine failed; file left in place"
                );
            }
            Err(err) => {
                warn!(file = %candidate.name, error = %err, "quarantine worker failed");
            }
        }
    }

    /// Delivery stage: write every readable unit and post-process its source.
    ///
    /// At most `maximum_concurrency` writes are in flight, and two units that
    /// resolve to the same output path are never written at the same time: the
    /// later one waits until the earlier one is joined. Once `shutdown` flips,
    /// no new unit starts; units already started finish their write and
    /// post-processing.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the target directory cannot be created.
    pub async fn deliver(
        &self,
        run_id: Uuid,
        context: &mut ExecutionContext,
        report: &mut RunReport,
        shutdown: &watch::Receiver<bool>,
    ) -> TransferResult<()> {
        self.prepare_target().await?;
        let job = Arc::new(DeliveryJob::from_config(&self.config));
        let limit = self.config.maximum_concurrency.max(1);
        let mut workers: JoinSet<WorkerOutput> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, InFlight> = HashMap::new();
        let mut results = Vec::with_capacity(context.files_to_process.len());

        let units = context
            .files_to_process
            .iter()
            .filter(|unit| unit.is_readable())
            .cloned();
        for unit in units {
            let now = (self.clock)();
            let destination = job.destination_for(&unit, now);
            while workers.len() >= limit
                || in_flight
                    .values()
                    .any(|pending| pending.destination.path == destination.path)
            {
                let Some(joined) = workers.join_next_with_id().await else {
                    break;
                };
                self.finish_delivery(run_id, joined, &mut in_flight, report, &mut results);
            }
            if is_cancelled(shutdown) {
                report.cancelled = true;
                info!("shutdown requested; no further deliveries will start");
                break;
            }

            let pending = InFlight {
                file_name: unit.file_name.clone(),
                destination: destination.clone(),
            };
            let job = Arc::clone(&job);
            let recorders = self.recorders.clone();
            self.metrics.add_in_flight(1);
            let handle = workers.spawn_blocking(move || {
                for recorder in &recorders {
                    recorder.step_started(&unit.file_name);
                }
                job.run(&unit, destination, now)
            });
            in_flight.insert(handle.id(), pending);
        }
        while let Some(joined) = workers.join_next_with_id().await {
            self.finish_delivery(run_id, joined, &mut in_flight, report, &mut results);
        }

        context.record_deliveries(&results);
        Ok(())
    }

    fn finish_delivery(
        &self,
        run_id: Uuid,
        joined: Result<(task::Id, WorkerOutput), JoinError>,
        in_flight: &mut HashMap<task::Id, InFlight>,
        report: &mut RunReport,
        results: &mut Vec<DeliveryResult>,
    ) {
        self.metrics.add_in_flight(-1);
        let (result, post) = match joined {
            Ok((id, output)) => {
                in_flight.remove(&id);
                output
            }
            Err(err) => {
                error!(error = %err, "delivery worker failed");
                (worker_failure(in_flight.remove(&err.id()), &err), None)
            }
        };

        let step = StepRecord::from(&result);
        for recorder in &self.recorders {
            recorder.record_step(&step);
        }

        if result.succeeded() {
            report.transferred += 1;
            info!(
                file = %result.file_name,
                path = %result.output_path.display(),
                size_bytes = result.size_bytes,
                skipped_empty = result.skipped_empty,
                "file transferred"
            );
            self.publish_event(Event::FileTransferred {
                run_id,
                file_name: result.file_name.clone(),
                output_path: result.output_path.display().to_string(),
                size_bytes: result.size_bytes,
            });
        } else {
            let message = result.error_message.clone().unwrap_or_default();
            warn!(file = %result.file_name, error = %message, "file transfer failed");
            report.record_failure(&result.file_name, message.clone());
            self.publish_event(Event::FileTransferFailed {
                run_id,
                file_name: result.file_name.clone(),
                message,
            });
        }

        if let Some(post) = post {
            self.metrics
                .inc_post_process(post.action.as_str(), post.status.as_str());
            if post.status == PostProcessStatus::Applied {
                report.post_processed += 1;
            }
            self.publish_event(Event::FilePostProcessed {
                run_id,
                file_name: result.file_name.clone(),
                action: post.action.as_str().to_string(),
                outcome: post.status.as_str().to_string(),
            });
        }
        results.push(result);
    }

    async fn prepare_target(&self) -> TransferResult<()> {
        let target = self.config.target_directory.clone();
        let created = target.clone();
        task::spawn_blocking(move || fs::create_dir_all(created))
            .await
            .map_err(|err| TransferError::worker("deliver.create_target", err))?
            .map_err(|err| TransferError::io("deliver.create_target", target, err))
    }

    fn publish_event(&self, event: Event) {
        let kind = event.kind();
        let id = self.events.publish(event);
        self.metrics.inc_event(kind);
        debug!(event_id = id, event_kind = kind, "event published");
    }

    fn mark_degraded(&self, detail: &str) {
        let mut guard = self.lock_health_flag();
        if *guard {
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "transfer pipeline still degraded"
            );
        } else {
            *guard = true;
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "transfer pipeline degraded"
            );
            self.publish_event(Event::HealthChanged {
                degraded: vec![HEALTH_COMPONENT.to_string()],
            });
        }
    }

    fn mark_recovered(&self) {
        let mut guard = self.lock_health_flag();
        if std::mem::take(&mut *guard) {
            drop(guard);
            self.publish_event(Event::HealthChanged { degraded: vec![] });
            info!(component = HEALTH_COMPONENT, "transfer pipeline recovered");
        }
    }

    fn lock_health_flag(&self) -> MutexGuard<'_, bool> {
        match self.health_degraded.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("transfer health mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

fn worker_failure(pending: Option<InFlight>, err: &JoinError) -> DeliveryResult {
    let (file_name, destination) = match pending {
        Some(InFlight {
            file_name,
            destination,
        }) => (file_name, destination),
        None => (
            "<unknown>".to_string(),
            Destination {
                file_name: String::new(),
                path: PathBuf::new(),
            },
        ),
    };
    DeliveryResult {
        file_name,
        output_file_name: destination.file_name,
        output_path: destination.path,
        size_bytes: 0,
        status: DeliveryStatus::Failed,
        error_message: Some(format!("delivery worker failed: {err}")),
        skipped_empty: false,
    }
}

fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
