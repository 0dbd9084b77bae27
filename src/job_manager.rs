use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use log::{error, info};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{MatcherError, ProviderError, Result};
use crate::models::OutputRecord;
use crate::pipeline::{self, PipelineOptions, ProgressEvent, ProgressReporter, RunSummary};
use crate::provider::EnrichmentProvider;

const MAX_LOG_LINES: usize = 50;

/// Builds a fresh provider for each run, on the run's own thread.
pub type ProviderFactory =
    Arc<dyn Fn() -> std::result::Result<Box<dyn EnrichmentProvider>, ProviderError> + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub is_processing: bool,
    pub progress: f64,
    pub total_records: usize,
    pub processed_records: usize,
    pub current_email: String,
    pub status: String, // "idle", "starting", "processing", "completed", "stopped", "failed", "error: ..."
    pub run_id: Option<Uuid>,
    pub stop_requested: bool,
    pub logs: Vec<String>,
    pub last_result: Option<OutputRecord>,
    pub last_summary: Option<RunSummary>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        StatusSnapshot {
            is_processing: false,
            progress: 0.0,
            total_records: 0,
            processed_records: 0,
            current_email: String::new(),
            status: "idle".to_string(),
            run_id: None,
            stop_requested: false,
            logs: Vec::new(),
            last_result: None,
            last_summary: None,
        }
    }
}

impl StatusSnapshot {
    fn push_log(&mut self, msg: String) {
        self.logs.push(msg);
        if self.logs.len() > MAX_LOG_LINES {
            self.logs.remove(0);
        }
    }
}

#[derive(Clone)]
struct SharedStatus(Arc<Mutex<StatusSnapshot>>);

impl SharedStatus {
    fn lock(&self) -> MutexGuard<'_, StatusSnapshot> {
        // A panicking run must not wedge the status endpoint.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressReporter for SharedStatus {
    fn report(&self, event: ProgressEvent) {
        let mut state = self.lock();
        match event {
            ProgressEvent::Loaded { total, already_processed, pending } => {
                state.total_records = pending;
                state.push_log(format!(
                    "Loaded {} identities, {} already processed, {} pending.",
                    total, already_processed, pending
                ));
            }
            ProgressEvent::SigningIn => state.push_log("Signing in to provider.".to_string()),
            ProgressEvent::Started { identity, position, total } => {
                state.status = "processing".to_string();
                state.push_log(format!("Processing {}/{}: {}", position, total, identity.email));
                state.current_email = identity.email;
            }
            ProgressEvent::Processed { record, processed, total } => {
                state.processed_records = processed;
                state.total_records = total;
                state.progress = processed as f64 / total as f64 * 100.0;
                state.push_log(format!("{}: {}", record.email, record.status));
                state.last_result = Some(record);
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.lock().stop_requested
    }
}

/// Clears `is_processing` when the run thread exits, however it exits.
struct RunGuard(SharedStatus);

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.is_processing = false;
        if state.status == "starting" || state.status == "processing" {
            state.status = "failed".to_string();
            state.push_log("Run ended unexpectedly.".to_string());
        }
    }
}

/// Owns the process-wide run status and launches at most one pipeline run at a time.
pub struct JobManager {
    status: SharedStatus,
    options: PipelineOptions,
    provider_factory: ProviderFactory,
}

impl JobManager {
    pub fn new(options: PipelineOptions, provider_factory: ProviderFactory) -> Self {
        JobManager {
            status: SharedStatus(Arc::new(Mutex::new(StatusSnapshot::default()))),
            options,
            provider_factory,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.lock().clone()
    }

    pub fn is_processing(&self) -> bool {
        self.status.lock().is_processing
    }

    /// Launches a run on its own thread and returns immediately. The check and
    /// the claim of `is_processing` happen under one lock acquisition.
    pub fn start(&self) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        {
            let mut state = self.status.lock();
            if state.is_processing {
                return Err(MatcherError::ConcurrentStartRejected);
            }
            *state = StatusSnapshot {
                is_processing: true,
                status: "starting".to_string(),
                run_id: Some(run_id),
                logs: vec![format!("Run {} started.", run_id)],
                ..StatusSnapshot::default()
            };
        }

        let status = self.status.clone();
        let options = self.options.clone();
        let factory = self.provider_factory.clone();

        thread::spawn(move || {
            let _guard = RunGuard(status.clone());
            Self::run(run_id, status, options, factory);
        });

        info!("Started run {}", run_id);
        Ok(run_id)
    }

    /// Asks the current run to stop before its next identity. Returns false
    /// when nothing is running.
    pub fn stop(&self) -> bool {
        let mut state = self.status.lock();
        if !state.is_processing {
            return false;
        }
        state.stop_requested = true;
        state.push_log("Stop requested.".to_string());
        true
    }

    /// Swaps `source` in as the input file. Holds the status lock throughout,
    /// so a run can neither be in flight nor start until the new file is in
    /// place, and the rename means no reader ever sees it half written.
    pub fn replace_input(&self, source: &Path) -> Result<()> {
        let mut state = self.status.lock();
        if state.is_processing {
            return Err(MatcherError::InputBusy);
        }

        let input_path = &self.options.input_path;
        let mut staged = input_path.as_os_str().to_owned();
        staged.push(".part");
        let staged = PathBuf::from(staged);
        fs::copy(source, &staged)
            .and_then(|_| fs::rename(&staged, input_path))
            .map_err(|e| {
                let _ = fs::remove_file(&staged);
                MatcherError::WriteFailed(format!("could not replace {:?}: {}", input_path, e))
            })?;

        state.push_log(format!("Input replaced from {:?}.", source));
        Ok(())
    }

    fn run(run_id: Uuid, status: SharedStatus, options: PipelineOptions, factory: ProviderFactory) {
        let mut provider = match factory() {
            Ok(provider) => provider,
            Err(e) => {
                error!("Run {}: could not create provider: {}", run_id, e);
                let mut state = status.lock();
                state.status = format!("error: {}", e);
                state.push_log(format!("Could not create provider: {}", e));
                return;
            }
        };

        let outcome = pipeline::run_pipeline(&options, provider.as_mut(), &status);

        let mut state = status.lock();
        match outcome {
            Ok(summary) => {
                let label = if summary.stopped { "stopped" } else { "completed" };
                state.status = label.to_string();
                if summary.pending == 0 {
                    state.progress = 100.0;
                }
                state.push_log(format!(
                    "Run {} {}: {} processed, {} failed lookups.",
                    run_id, label, summary.processed, summary.failed_lookups
                ));
                state.last_summary = Some(summary);
            }
            Err(e) => {
                error!("Run {} failed: {}", run_id, e);
                state.status = "failed".to_string();
                state.push_log(format!("Run failed: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EnrichmentResult, Identity};
    use crate::provider::{Credentials, PlaceholderProvider};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    /// Holds every lookup until `release` is set.
    struct GatedProvider {
        release: Arc<AtomicBool>,
    }

    impl EnrichmentProvider for GatedProvider {
        fn login(&mut self, _credentials: &Credentials) -> std::result::Result<bool, ProviderError> {
            Ok(true)
        }

        fn lookup(&mut self, _identity: &Identity) -> std::result::Result<EnrichmentResult, ProviderError> {
            while !self.release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(10));
            }
            Ok(EnrichmentResult::not_found())
        }
    }

    fn options(dir: &tempfile::TempDir, input: &str) -> PipelineOptions {
        let input_path = dir.path().join("input_emails.csv");
        fs::write(&input_path, input).unwrap();
        PipelineOptions {
            input_path,
            output_path: dir.path().join("linkedin_results.csv"),
            delay: Duration::ZERO,
            credentials: Credentials { email: "me@x.com".into(), password: "pw".into() },
        }
    }

    fn gated_manager(dir: &tempfile::TempDir, release: Arc<AtomicBool>) -> JobManager {
        let factory: ProviderFactory = Arc::new(move || {
            Ok(Box::new(GatedProvider { release: release.clone() }) as Box<dyn EnrichmentProvider>)
        });
        JobManager::new(options(dir, "Email\na@x.com\nb@x.com\n"), factory)
    }

    fn wait_until_idle(manager: &JobManager) -> StatusSnapshot {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let snapshot = manager.snapshot();
            if !snapshot.is_processing {
                return snapshot;
            }
            assert!(Instant::now() < deadline, "run did not finish");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn wait_for_email(manager: &JobManager, email: &str) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while manager.snapshot().current_email != email {
            assert!(Instant::now() < deadline, "run never reached {}", email);
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn second_start_is_rejected_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(AtomicBool::new(false));
        let manager = gated_manager(&dir, release.clone());

        manager.start().unwrap();
        let second = manager.start();
        assert!(matches!(second, Err(MatcherError::ConcurrentStartRejected)));

        release.store(true, Ordering::SeqCst);
        let done = wait_until_idle(&manager);
        assert_eq!(done.status, "completed");
        assert_eq!(done.processed_records, 2);
        assert_eq!(done.progress, 100.0);

        // Finished runs free the slot again.
        manager.start().unwrap();
        assert_eq!(wait_until_idle(&manager).status, "completed");
    }

    #[test]
    fn stop_takes_effect_before_next_identity() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(AtomicBool::new(false));
        let manager = gated_manager(&dir, release.clone());

        assert!(!manager.stop());
        manager.start().unwrap();
        wait_for_email(&manager, "a@x.com");
        assert!(manager.stop());
        assert!(manager.snapshot().is_processing);

        release.store(true, Ordering::SeqCst);
        let done = wait_until_idle(&manager);
        assert_eq!(done.status, "stopped");
        assert_eq!(done.processed_records, 1);
        assert_eq!(done.last_result.unwrap().email, "a@x.com");
    }

    #[test]
    fn provider_build_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let factory: ProviderFactory =
            Arc::new(|| Err(ProviderError::Other("no browser available".to_string())));
        let manager = JobManager::new(options(&dir, "Email\na@x.com\n"), factory);

        manager.start().unwrap();
        let done = wait_until_idle(&manager);
        assert_eq!(done.status, "error: no browser available");
    }

    #[test]
    fn missing_input_marks_run_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(&dir, "Email\na@x.com\n");
        opts.input_path = dir.path().join("absent.csv");
        let factory: ProviderFactory =
            Arc::new(|| Ok(Box::new(PlaceholderProvider) as Box<dyn EnrichmentProvider>));
        let manager = JobManager::new(opts, factory);

        manager.start().unwrap();
        let done = wait_until_idle(&manager);
        assert_eq!(done.status, "failed");
        assert!(done.logs.iter().any(|l| l.contains("Input file not found")));
    }

    #[test]
    fn input_cannot_be_replaced_during_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(AtomicBool::new(false));
        let manager = gated_manager(&dir, release.clone());
        let upload = dir.path().join("upload.csv");
        fs::write(&upload, "Email\nz@x.com\n").unwrap();

        manager.start().unwrap();
        let err = manager.replace_input(&upload).unwrap_err();
        assert!(matches!(err, MatcherError::InputBusy));
        let input = fs::read_to_string(&manager.options().input_path).unwrap();
        assert!(input.contains("a@x.com"));

        release.store(true, Ordering::SeqCst);
        wait_until_idle(&manager);
        manager.replace_input(&upload).unwrap();
        let input = fs::read_to_string(&manager.options().input_path).unwrap();
        assert_eq!(input, "Email\nz@x.com\n");
        assert!(!dir.path().join("input_emails.csv.part").exists());

        // The next run reads the replaced file.
        manager.start().unwrap();
        let done = wait_until_idle(&manager);
        assert_eq!(done.last_result.unwrap().email, "z@x.com");
    }
}
