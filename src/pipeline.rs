use std::path::PathBuf;
use std::time::Duration;
use log::{info, warn, error};
use serde::Serialize;

use crate::delay_manager;
use crate::error::{MatcherError, Result};
use crate::input_loader;
use crate::models::{EnrichmentResult, Identity, MatchStatus, OutputRecord};
use crate::output_store;
use crate::provider::{Credentials, EnrichmentProvider};
use crate::resume_manager;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Pause between two lookups.
    pub delay: Duration,
    pub credentials: Credentials,
}

/// Typed progress pushed by the pipeline, one `Processed` per identity.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Loaded { total: usize, already_processed: usize, pending: usize },
    SigningIn,
    Started { identity: Identity, position: usize, total: usize },
    Processed { record: OutputRecord, processed: usize, total: usize },
}

pub trait ProgressReporter: Sync {
    fn report(&self, event: ProgressEvent);

    /// Checked before each identity and during the pause between lookups.
    fn should_stop(&self) -> bool {
        false
    }
}

/// For runs where the log lines are the only progress output.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub loaded: usize,
    pub already_processed: usize,
    pub pending: usize,
    pub processed: usize,
    pub failed_lookups: usize,
    pub stopped: bool,
    pub last_email: Option<String>,
}

/// One pipeline run: load input, skip emails already in the output, look up
/// the rest in input order and append each result as soon as it is known.
///
/// The provider is only signed in when something is pending, and is always
/// signed out again once sign-in was attempted.
pub fn run_pipeline(
    options: &PipelineOptions,
    provider: &mut dyn EnrichmentProvider,
    reporter: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let identities = input_loader::load_identities(&options.input_path)?;
    output_store::ensure_initialized(&options.output_path)?;
    let done = resume_manager::load_processed_keys(&options.output_path);

    let pending: Vec<Identity> = identities
        .iter()
        .filter(|identity| !done.contains(&identity.email))
        .cloned()
        .collect();

    let mut summary = RunSummary {
        loaded: identities.len(),
        already_processed: identities.len() - pending.len(),
        pending: pending.len(),
        ..RunSummary::default()
    };
    reporter.report(ProgressEvent::Loaded {
        total: summary.loaded,
        already_processed: summary.already_processed,
        pending: summary.pending,
    });

    if pending.is_empty() {
        info!("All emails have already been processed. Nothing to do.");
        return Ok(summary);
    }
    info!(
        "Processing {} new records (skipping {} already processed)",
        summary.pending, summary.already_processed
    );

    reporter.report(ProgressEvent::SigningIn);
    let mut session = Session { provider };
    let outcome = match session.provider.login(&options.credentials) {
        Ok(true) => process_pending(options, &pending, &mut *session.provider, reporter, &mut summary),
        Ok(false) => Err(MatcherError::ProviderLoginFailed("credentials were not accepted".to_string())),
        Err(e) => Err(MatcherError::ProviderLoginFailed(e.to_string())),
    };
    drop(session);

    match outcome {
        Ok(()) => {
            if summary.stopped {
                info!("Stopped on request after {} of {} records.", summary.processed, summary.pending);
            } else {
                info!("Processing complete!");
            }
            Ok(summary)
        }
        Err(e) => {
            error!(
                "Run aborted after {} of {} records (last processed: {}): {}",
                summary.processed,
                summary.pending,
                summary.last_email.as_deref().unwrap_or("none"),
                e
            );
            Err(e)
        }
    }
}

/// Signs the provider out when dropped, so the session is released on
/// every exit from a run, unwinding included.
struct Session<'a> {
    provider: &'a mut dyn EnrichmentProvider,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.provider.logout();
    }
}

fn process_pending(
    options: &PipelineOptions,
    pending: &[Identity],
    provider: &mut dyn EnrichmentProvider,
    reporter: &dyn ProgressReporter,
    summary: &mut RunSummary,
) -> Result<()> {
    let total = pending.len();

    for (i, identity) in pending.iter().enumerate() {
        if reporter.should_stop() {
            summary.stopped = true;
            return Ok(());
        }

        let position = i + 1;
        info!("Processing {}/{}: {}", position, total, identity.email);
        reporter.report(ProgressEvent::Started {
            identity: identity.clone(),
            position,
            total,
        });

        let result = match provider.lookup(identity) {
            Ok(result) => result,
            Err(e) => {
                warn!("Lookup failed for {}: {}", identity.email, e);
                EnrichmentResult::with_status(MatchStatus::Error(e.to_string()))
            }
        };
        if matches!(result.status, MatchStatus::Error(_) | MatchStatus::SearchFailed) {
            summary.failed_lookups += 1;
        }

        let record = OutputRecord::new(identity, result);
        output_store::append(&options.output_path, &record)?;
        summary.processed = position;
        summary.last_email = Some(identity.email.clone());

        let progress = (position as f64 / total as f64) * 100.0;
        info!("Progress: {:.1}% ({}/{})", progress, position, total);
        reporter.report(ProgressEvent::Processed {
            record,
            processed: position,
            total,
        });

        if position < total && !delay_manager::courtesy_delay(options.delay, || reporter.should_stop()) {
            summary.stopped = true;
            return Ok(());
        }
    }
    Ok(())
}
