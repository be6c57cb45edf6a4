use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::ai::{Extractor, Transcriber};
use crate::db::{CallStore, Lease, TerminalUpdate};
use crate::error::ErrorKind;
use crate::model::{CallAnalysis, CallJob};
use crate::sanitize;
use crate::storage::ArtifactStore;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, StepFailure};
use super::outcome::{ProcessOutcome, RecoveryReport};

/// Drives one call job from audio to a terminal status.
pub struct CallPipeline {
    config: Arc<PipelineConfig>,
    calls: Arc<dyn CallStore>,
    artifacts: Arc<dyn ArtifactStore>,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn Extractor>,
}

impl CallPipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        calls: Arc<dyn CallStore>,
        artifacts: Arc<dyn ArtifactStore>,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            config,
            calls,
            artifacts,
            transcriber,
            extractor,
        }
    }

    /// Processes a call. Safe to invoke repeatedly and concurrently for the
    /// same ID: terminal jobs are returned untouched, and only the holder of
    /// the claim may write the terminal status.
    pub async fn run(&self, call_id: &str) -> Result<ProcessOutcome, PipelineError> {
        let span = info_span!("process_call",
            call_id = %call_id,
            transcriber = self.transcriber.model_name(),
            extractor = self.extractor.model_name(),
        );
        self.run_claimed(call_id).instrument(span).await
    }

    async fn run_claimed(&self, call_id: &str) -> Result<ProcessOutcome, PipelineError> {
        // Step 1: Load the job
        let call = self.load(call_id)?;

        // Step 2: Terminal jobs are never reprocessed
        if call.is_terminal() {
            debug!(status = %call.status, "Call already terminal, nothing to do");
            return Ok(ProcessOutcome::AlreadyTerminal { call });
        }

        // Step 3: Claim the job
        let now = Utc::now();
        let claim = Lease {
            token: uuid::Uuid::new_v4().to_string(),
            now,
            lease_cutoff: self.lease_cutoff(now),
        };
        if !self.calls.claim_call(call_id, &claim)? {
            let current = self.load(call_id)?;
            info!(status = %current.status, "Call is being processed by another run");
            return Ok(Self::unowned(current));
        }

        let mut ctx = PipelineContext::new(call, claim.token);
        let update = match self.process(&mut ctx).await {
            Ok(analysis) => TerminalUpdate::Completed {
                transcript: ctx.transcript.clone().unwrap_or_default(),
                analysis,
            },
            Err(failure) => {
                warn!(kind = %failure.kind, cause = %failure.cause, "Call processing failed");
                TerminalUpdate::Failed {
                    transcript: ctx.transcript.clone(),
                    kind: failure.kind,
                    cause: failure.cause,
                }
            }
        };

        // Step 4: Single fenced terminal write
        let committed = {
            let _step = info_span!("commit").entered();
            self.calls
                .commit_call(call_id, &ctx.claim_token, &update, Utc::now())?
        };
        let current = self.load(call_id)?;

        if !committed {
            warn!("Claim lost before commit, discarding this run's result");
            return Ok(Self::unowned(current));
        }

        Ok(match update {
            TerminalUpdate::Completed { .. } => {
                info!("Call processed successfully");
                ProcessOutcome::Completed { call: current }
            }
            TerminalUpdate::Failed { .. } => ProcessOutcome::Failed { call: current },
        })
    }

    /// Fetch, transcribe, extract. The transcript stays in the context even
    /// when extraction fails.
    async fn process(&self, ctx: &mut PipelineContext) -> Result<CallAnalysis, StepFailure> {
        self.step_fetch_audio(ctx)
            .instrument(info_span!("fetch_audio"))
            .await?;
        self.step_transcribe(ctx)
            .instrument(info_span!("transcribe"))
            .await?;
        self.step_extract(ctx)
            .instrument(info_span!("extract"))
            .await?;
        ctx.analysis
            .take()
            .ok_or_else(|| StepFailure::new(ErrorKind::ExtractionFailed, "No analysis produced"))
    }

    async fn step_fetch_audio(&self, ctx: &mut PipelineContext) -> Result<(), StepFailure> {
        let reference = ctx.call.audio_url.clone();
        debug!(audio = %sanitize::redact_url(&reference), "Fetching audio");

        let audio = with_timeout(
            self.config.artifact_fetch_timeout,
            ErrorKind::ArtifactUnavailable,
            "Audio fetch",
            self.artifacts.fetch(&reference),
        )
        .await?
        .map_err(|e| StepFailure::new(ErrorKind::ArtifactUnavailable, e.to_string()))?;

        debug!(bytes = audio.len(), content_type = %audio.content_type, "Audio fetched");
        ctx.audio = Some(audio);
        Ok(())
    }

    async fn step_transcribe(&self, ctx: &mut PipelineContext) -> Result<(), StepFailure> {
        let audio = ctx.audio.take().ok_or_else(|| {
            StepFailure::new(ErrorKind::ArtifactUnavailable, "Audio was not fetched")
        })?;

        let text = with_timeout(
            self.config.transcription_timeout,
            ErrorKind::TranscriptionFailed,
            "Transcription",
            self.transcriber.transcribe(&audio),
        )
        .await?
        .map_err(|e| StepFailure::new(ErrorKind::TranscriptionFailed, e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(StepFailure::new(
                ErrorKind::TranscriptionFailed,
                "Transcription returned no text",
            ));
        }

        debug!(chars = text.len(), "Transcription complete");
        ctx.transcript = Some(text.to_string());
        Ok(())
    }

    async fn step_extract(&self, ctx: &mut PipelineContext) -> Result<(), StepFailure> {
        let transcript = ctx.transcript.as_deref().ok_or_else(|| {
            StepFailure::new(ErrorKind::TranscriptionFailed, "No transcript available")
        })?;

        let analysis = with_timeout(
            self.config.extraction_timeout,
            ErrorKind::ExtractionFailed,
            "Extraction",
            self.extractor.extract(transcript),
        )
        .await?
        .map_err(|e| {
            let kind = if e.is_malformed() {
                ErrorKind::ExtractionMalformed
            } else {
                ErrorKind::ExtractionFailed
            };
            StepFailure::new(kind, e.to_string())
        })?;

        ctx.analysis = Some(analysis);
        Ok(())
    }

    /// Re-runs `processing` jobs whose claim expired or that were never
    /// claimed within one lease period.
    pub async fn recover_stalled(&self) -> Result<RecoveryReport, PipelineError> {
        let cutoff = self.lease_cutoff(Utc::now());
        let stalled = self.calls.stalled_calls(cutoff)?;
        let mut report = RecoveryReport::default();

        if stalled.is_empty() {
            debug!("No stalled calls");
            return Ok(report);
        }
        info!(count = stalled.len(), "Recovering stalled calls");

        for call_id in stalled {
            report.attempted += 1;
            match self.run(&call_id).await {
                Ok(ProcessOutcome::Completed { .. }) => report.completed += 1,
                Ok(ProcessOutcome::Failed { .. }) => report.failed += 1,
                Ok(_) => report.skipped += 1,
                Err(e) => {
                    warn!(call_id = %call_id, error = %e, "Stalled call recovery failed");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    fn load(&self, call_id: &str) -> Result<CallJob, PipelineError> {
        self.calls
            .find_call(call_id)?
            .ok_or_else(|| PipelineError::JobNotFound(call_id.to_string()))
    }

    fn lease_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let lease = chrono::Duration::from_std(self.config.claim_lease)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        now - lease
    }

    fn unowned(call: CallJob) -> ProcessOutcome {
        if call.is_terminal() {
            ProcessOutcome::AlreadyTerminal { call }
        } else {
            ProcessOutcome::InFlight { call }
        }
    }
}

/// Bounds an adapter call; elapsing is a failure of `kind`.
async fn with_timeout<F, T>(
    limit: Duration,
    kind: ErrorKind,
    what: &str,
    future: F,
) -> Result<T, StepFailure>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future).await.map_err(|_| {
        StepFailure::new(
            kind,
            format!("{} timed out after {}s", what, limit.as_secs_f64()),
        )
    })
}
