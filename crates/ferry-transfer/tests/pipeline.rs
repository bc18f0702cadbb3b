use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use ferry_config::{
    OutputNamingMode, PostProcessAction, RuleSpec, Severity, TransferConfig, ValidationRuleConfig,
    WriteMode,
};
use ferry_events::{Event, EventBus};
use ferry_telemetry::Metrics;
use ferry_transfer::{MemoryRecorder, StepRecord, StepRecorder, TransferPipeline};
use tempfile::TempDir;
use tokio::sync::watch;

struct Dirs {
    _temp: TempDir,
    source: PathBuf,
    target: PathBuf,
    root: PathBuf,
}

fn dirs() -> Result<Dirs> {
    let temp = TempDir::new()?;
    let root = temp.path().to_path_buf();
    let source = root.join("in");
    let target = root.join("out");
    fs::create_dir(&source)?;
    Ok(Dirs {
        _temp: temp,
        source,
        target,
        root,
    })
}

fn march_first() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|date| date.and_hms_opt(9, 30, 0))
        .unwrap_or_default()
}

fn build(config: TransferConfig) -> Result<TransferPipeline> {
    Ok(TransferPipeline::new(config, EventBus::new(), Metrics::new()?)?.with_clock(march_first))
}

fn names_in(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[tokio::test]
async fn excluded_files_are_skipped_without_quarantine() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("a.txt"), vec![b'a'; 100])?;
    fs::write(dirs.source.join("b.tmp"), b"partial")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.exclusion_mask = Some("*.tmp".into());
    config.archive_faulty_source_files = true;
    config.archive_error_directory = Some(dirs.root.join("err"));
    config.post_process_action = PostProcessAction::KeepAndReprocess;

    let report = build(config)?.run().await?;
    assert_eq!(report.discovered, 2);
    assert_eq!(report.transferred, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.quarantined, 0);
    assert_eq!(names_in(&dirs.target)?, vec!["a.txt".to_string()]);
    assert!(dirs.source.join("b.tmp").exists());
    assert!(names_in(&dirs.root.join("err"))?.is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_file_is_quarantined_and_never_delivered() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("big.dat"), vec![0_u8; 200])?;
    let error_dir = dirs.root.join("err");
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.maximum_file_size = 50;
    config.archive_faulty_source_files = true;
    config.archive_error_directory = Some(error_dir.clone());

    let events = EventBus::new();
    let mut stream = events.subscribe(None);
    let service = TransferPipeline::new(config, events, Metrics::new()?)?.with_clock(march_first);
    let report = service.run().await?;

    assert_eq!(report.rejected, 1);
    assert_eq!(report.quarantined, 1);
    assert_eq!(report.transferred, 0);
    assert_eq!(
        names_in(&error_dir)?,
        vec!["20240301_093000_big.dat".to_string()]
    );
    assert!(names_in(&dirs.target)?.is_empty());
    assert!(!dirs.source.join("big.dat").exists());

    let reason = stream.drain_ready().into_iter().find_map(|envelope| match envelope.event {
        Event::FileRejected { reason, .. } => Some(reason),
        _ => None,
    });
    assert_eq!(
        reason.as_deref(),
        Some("File size 200 bytes exceeds maximum 50 bytes")
    );
    Ok(())
}

#[tokio::test]
async fn temp_then_rename_leaves_no_temp_file() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("report.csv"), b"id,total\n1,10\n")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.write_mode = WriteMode::TempThenRename;
    config.post_process_action = PostProcessAction::Delete;

    let report = build(config)?.run().await?;
    assert_eq!(report.transferred, 1);
    assert_eq!(names_in(&dirs.target)?, vec!["report.csv".to_string()]);
    assert_eq!(fs::read(dirs.target.join("report.csv"))?, b"id,total\n1,10\n");
    assert!(!dirs.source.join("report.csv").exists());
    Ok(())
}

#[tokio::test]
async fn custom_pattern_names_output_from_clock() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("invoice.pdf"), b"%PDF")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.output_naming_mode = OutputNamingMode::CustomPattern;
    config.custom_filename_pattern = Some("{original_name}_{date}{extension}".into());
    config.post_process_action = PostProcessAction::KeepAndReprocess;

    build(config)?.run().await?;
    assert_eq!(
        names_in(&dirs.target)?,
        vec!["invoice_20240301.pdf".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn failed_delivery_keeps_source_for_delete_action() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("a.txt"), b"payload")?;
    // A directory squatting on the destination path makes the write fail.
    fs::create_dir_all(dirs.target.join("a.txt"))?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.post_process_action = PostProcessAction::Delete;

    let report = build(config)?.run().await?;
    assert_eq!(report.transferred, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.post_processed, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file_name, "a.txt");
    assert_eq!(fs::read(dirs.source.join("a.txt"))?, b"payload");
    Ok(())
}

#[tokio::test]
async fn keep_and_reprocess_rediscovers_source() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("a.txt"), b"same")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.post_process_action = PostProcessAction::KeepAndReprocess;
    let service = build(config)?;

    let first = service.run().await?;
    assert_eq!(first.transferred, 1);
    assert_eq!(fs::read(dirs.source.join("a.txt"))?, b"same");

    let second = service.run().await?;
    assert_eq!(second.discovered, 1);
    assert_eq!(second.transferred, 1);
    Ok(())
}

#[tokio::test]
async fn empty_file_is_rejected_before_stability_wait() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("empty.txt"), b"")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.stability_wait = Duration::from_secs(30);

    let report = tokio::time::timeout(Duration::from_secs(5), build(config)?.run()).await??;
    assert_eq!(report.rejected, 1);
    assert_eq!(report.transferred, 0);
    assert!(dirs.source.join("empty.txt").exists());
    Ok(())
}

#[tokio::test]
async fn keep_and_mark_post_processes_once() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("a.txt"), b"once")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.post_process_action = PostProcessAction::KeepAndMark;
    let service = build(config)?;

    let first = service.run().await?;
    assert_eq!(first.transferred, 1);
    assert_eq!(first.post_processed, 1);
    assert_eq!(names_in(&dirs.source)?, vec!["a.txt.processed".to_string()]);

    let second = service.run().await?;
    assert_eq!(second.discovered, 0);
    assert_eq!(second.post_processed, 0);
    assert_eq!(names_in(&dirs.target)?, vec!["a.txt".to_string()]);
    Ok(())
}

#[tokio::test]
async fn archive_moves_sources_after_delivery() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("a.txt"), b"archived")?;
    let archive = dirs.root.join("archive");
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.archive_directory = Some(archive.clone());
    config.add_timestamp = true;

    let report = build(config)?.run().await?;
    assert_eq!(report.post_processed, 1);
    assert_eq!(
        names_in(&archive)?,
        vec!["a_20240301093000.txt".to_string()]
    );
    assert!(names_in(&dirs.source)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn bounded_pool_delivers_every_file() -> Result<()> {
    let dirs = dirs()?;
    for index in 0..12 {
        fs::write(dirs.source.join(format!("f{index:02}.txt")), format!("file {index}"))?;
    }
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.maximum_concurrency = 4;
    config.post_process_action = PostProcessAction::Delete;
    let recorder = Arc::new(MemoryRecorder::new());
    let metrics = Metrics::new()?;
    let service = TransferPipeline::new(config, EventBus::new(), metrics.clone())?
        .with_recorder(recorder.clone());

    let report = service.run().await?;
    assert_eq!(report.transferred, 12);
    assert_eq!(report.post_processed, 12);
    assert_eq!(recorder.steps().len(), 12);
    assert_eq!(names_in(&dirs.target)?.len(), 12);
    assert!(names_in(&dirs.source)?.is_empty());
    assert_eq!(metrics.deliveries("success"), 12);
    assert_eq!(metrics.snapshot().in_flight_deliveries, 0);
    Ok(())
}

/// Tracks how many writes are running between start and join.
#[derive(Default)]
struct PeakRecorder {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl StepRecorder for PeakRecorder {
    fn step_started(&self, _file_name: &str) {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        // Hold the worker so overlapping starts are observable.
        thread::sleep(Duration::from_millis(20));
    }

    fn record_step(&self, _step: &StepRecord) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn running_writes_never_exceed_maximum_concurrency() -> Result<()> {
    let dirs = dirs()?;
    for index in 0..16 {
        fs::write(dirs.source.join(format!("f{index:02}.txt")), format!("file {index}"))?;
    }
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.maximum_concurrency = 4;
    config.post_process_action = PostProcessAction::Delete;
    let recorder = Arc::new(PeakRecorder::default());
    let service = build(config)?.with_recorder(recorder.clone());

    let report = service.run().await?;
    assert_eq!(report.transferred, 16);
    let peak = recorder.peak.load(Ordering::SeqCst);
    assert!((1..=4).contains(&peak), "peak of {peak} running writes");
    assert_eq!(recorder.running.load(Ordering::SeqCst), 0);
    Ok(())
}

/// Flips shutdown as soon as the first write starts.
struct StopOnFirstWrite {
    shutdown: watch::Sender<bool>,
}

impl StepRecorder for StopOnFirstWrite {
    fn step_started(&self, _file_name: &str) {
        let _ = self.shutdown.send(true);
    }

    fn record_step(&self, _step: &StepRecord) {}
}

#[tokio::test]
async fn shutdown_mid_run_finishes_started_file_only() -> Result<()> {
    let dirs = dirs()?;
    for index in 0..3 {
        fs::write(dirs.source.join(format!("f{index}.txt")), format!("file {index}"))?;
    }
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.maximum_concurrency = 1;
    config.post_process_action = PostProcessAction::Delete;
    let (shutdown_tx, shutdown) = watch::channel(false);
    let service = build(config)?.with_recorder(Arc::new(StopOnFirstWrite {
        shutdown: shutdown_tx,
    }));

    let report = service.run_until(shutdown).await?;
    assert!(report.cancelled);
    assert_eq!(report.transferred, 1);
    assert_eq!(report.post_processed, 1);
    assert_eq!(names_in(&dirs.target)?, vec!["f0.txt".to_string()]);
    assert_eq!(fs::read(dirs.target.join("f0.txt"))?, b"file 0");
    assert_eq!(
        names_in(&dirs.source)?,
        vec!["f1.txt".to_string(), "f2.txt".to_string()]
    );
    Ok(())
}

/// Panics on the delivery worker for one file name.
struct PanicOn(&'static str);

impl StepRecorder for PanicOn {
    fn step_started(&self, file_name: &str) {
        assert_ne!(file_name, self.0, "worker panic");
    }

    fn record_step(&self, _step: &StepRecord) {}
}

#[tokio::test]
async fn panicked_worker_is_reported_as_failed_file() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("boom.txt"), b"boom")?;
    fs::write(dirs.source.join("ok.txt"), b"ok")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.post_process_action = PostProcessAction::Delete;
    let recorder = Arc::new(MemoryRecorder::new());
    let metrics = Metrics::new()?;
    let service = TransferPipeline::new(config, EventBus::new(), metrics.clone())?
        .with_recorder(Arc::new(PanicOn("boom.txt")))
        .with_recorder(recorder.clone());

    let report = service.run().await?;
    assert_eq!(report.transferred, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].file_name, "boom.txt");
    assert!(report.failures[0].message.starts_with("delivery worker failed"));
    assert_eq!(recorder.steps().len(), 2);
    assert!(dirs.source.join("boom.txt").exists());
    assert_eq!(metrics.snapshot().in_flight_deliveries, 0);
    Ok(())
}

#[tokio::test]
async fn colliding_output_names_are_written_one_at_a_time() -> Result<()> {
    let dirs = dirs()?;
    let mut contents = Vec::new();
    for index in 0..16u8 {
        let content = vec![b'a' + index; 512 * 1024];
        fs::write(dirs.source.join(format!("f{index:02}.csv")), &content)?;
        contents.push(content);
    }
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.maximum_concurrency = 8;
    config.output_naming_mode = OutputNamingMode::CustomPattern;
    config.custom_filename_pattern = Some("daily{extension}".into());
    config.write_mode = WriteMode::TempThenRename;
    config.post_process_action = PostProcessAction::Delete;

    let report = build(config)?.run().await?;
    assert_eq!(report.failed, 0, "failures: {:?}", report.failures);
    assert_eq!(report.transferred, 16);
    assert_eq!(names_in(&dirs.target)?, vec!["daily.csv".to_string()]);
    // Same-path writes keep scan order, so the last source wins.
    assert_eq!(fs::read(dirs.target.join("daily.csv"))?, contents[15]);
    assert!(names_in(&dirs.source)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn shutdown_before_run_starts_no_delivery() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("a.txt"), b"stay")?;
    let config = TransferConfig::new(&dirs.source, &dirs.target);
    let (shutdown_tx, shutdown) = watch::channel(false);
    shutdown_tx.send(true)?;

    let report = build(config)?.run_until(shutdown).await?;
    assert!(report.cancelled);
    assert_eq!(report.transferred, 0);
    assert!(dirs.source.join("a.txt").exists());
    assert!(names_in(&dirs.target)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn warning_rules_accept_and_error_rules_quarantine() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("good.csv"), b"id,name\n1,a\n")?;
    fs::write(dirs.source.join("bad.csv"), b"garbage\n")?;
    let error_dir = dirs.root.join("err");
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.archive_faulty_source_files = true;
    config.archive_error_directory = Some(error_dir.clone());
    config.post_process_action = PostProcessAction::KeepAndReprocess;
    config.validation_rules = vec![
        ValidationRuleConfig {
            rule: RuleSpec::HeaderMatch {
                pattern: "^id,".into(),
            },
            severity: Severity::Error,
        },
        ValidationRuleConfig {
            rule: RuleSpec::ContentContains {
                value: "total".into(),
            },
            severity: Severity::Warning,
        },
    ];

    let report = build(config)?.run().await?;
    assert_eq!(report.accepted, 1);
    assert_eq!(report.warnings, 1);
    assert_eq!(report.quarantined, 1);
    assert_eq!(names_in(&dirs.target)?, vec!["good.csv".to_string()]);
    assert_eq!(
        names_in(&error_dir)?,
        vec!["20240301_093000_bad.csv".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn run_publishes_lifecycle_events_in_order() -> Result<()> {
    let dirs = dirs()?;
    fs::write(dirs.source.join("a.txt"), b"x")?;
    let mut config = TransferConfig::new(&dirs.source, &dirs.target);
    config.post_process_action = PostProcessAction::KeepAndReprocess;
    let events = EventBus::new();
    let mut stream = events.subscribe(None);
    TransferPipeline::new(config, events, Metrics::new()?)?
        .run()
        .await?;

    let kinds: Vec<_> = stream
        .drain_ready()
        .into_iter()
        .map(|envelope| envelope.event.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "run_started",
            "files_discovered",
            "file_validated",
            "file_transferred",
            "file_post_processed",
            "run_completed",
        ]
    );
    Ok(())
}
