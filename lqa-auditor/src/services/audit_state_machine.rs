//! Audit lifecycle driver
//!
//! Runs one audit through initialization, glossary lookup, content
//! acquisition and model analysis. Every state change goes through
//! [`apply_transition`], is persisted, and only then reported to the
//! progress sink, so a reader polling the store never sees progress the
//! store does not have.
//!
//! Step progression within a run:
//! 1. Initializing audit
//! 2. Loading glossary / Acquiring content
//! 3. Running analysis
//! 4. Audit complete
//!
//! Collaborator failures end the run in FAILED and are not returned as
//! errors; the caller only sees [`AuditError`] for missing jobs, illegal
//! operator requests and persistence failures.

use std::sync::Arc;

use chrono::Utc;
use lqa_common::config::AuditSettings;
use uuid::Uuid;

use super::blocked_page_guard::BlockedPageGuard;
use super::prompt;
use crate::error::{AuditError, AuditResult};
use crate::models::{
    apply_transition, AnalysisMethod, AuditJob, AuditMode, AuditScore, ModelUsage, Transition,
    PROGRESS_TOTAL_STEPS,
};
use crate::recovery::{self, merge_scores, normalize, RecoveredBy};
use crate::types::{
    AcquiredContent, Acquisition, ContentAcquirer, GlossaryProvider, GlossaryTerm, ModelCaller,
    ModelRequest, PersistenceStore, ProgressSink,
};

pub const NO_CONTENT_MESSAGE: &str = "No content available for analysis";

/// Score and accounting of a successful analysis
struct Analysis {
    score: AuditScore,
    usage: ModelUsage,
    method: AnalysisMethod,
}

/// Drives audit jobs through their lifecycle
pub struct AuditStateMachine {
    store: Arc<dyn PersistenceStore>,
    acquirer: Arc<dyn ContentAcquirer>,
    model: Arc<dyn ModelCaller>,
    progress: Arc<dyn ProgressSink>,
    guard: Option<BlockedPageGuard>,
    glossary: Option<Arc<dyn GlossaryProvider>>,
    settings: AuditSettings,
}

impl AuditStateMachine {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        acquirer: Arc<dyn ContentAcquirer>,
        model: Arc<dyn ModelCaller>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            store,
            acquirer,
            model,
            progress,
            guard: None,
            glossary: None,
            settings: AuditSettings::default(),
        }
    }

    /// Classify acquired screenshots before analysis
    pub fn with_guard(mut self, guard: BlockedPageGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_glossary(mut self, provider: Arc<dyn GlossaryProvider>) -> Self {
        self.glossary = Some(provider);
        self
    }

    pub fn with_settings(mut self, settings: AuditSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run a PENDING audit to COMPLETED, FAILED or BLOCKED
    pub async fn run(&self, job_id: Uuid) -> AuditResult<AuditJob> {
        let job = self.load(job_id).await?;
        self.execute(job).await
    }

    /// Re-queue a BLOCKED audit and run it again from the start
    pub async fn retry(&self, job_id: Uuid) -> AuditResult<AuditJob> {
        let job = self.load(job_id).await?;
        let job = self.commit(&job, Transition::Retry).await?;
        tracing::info!(audit_id = %job_id, "Retrying blocked audit");
        self.execute(job).await
    }

    /// Analyze a BLOCKED audit using the screenshot captured when it blocked
    ///
    /// Content is not acquired again. The screenshot is analyzed regardless
    /// of the job's mode.
    pub async fn force_proceed(&self, job_id: Uuid) -> AuditResult<AuditJob> {
        let job = self.load(job_id).await?;
        let job = self.commit(&job, Transition::ForceProceed).await?;
        tracing::info!(
            audit_id = %job_id,
            has_screenshot = job.blocked_screenshot.is_some(),
            "Force-proceeding blocked audit"
        );

        let glossary = self.load_glossary(&job).await;
        let content = AcquiredContent {
            text: None,
            screenshot: job.blocked_screenshot.clone(),
        };
        self.analyze(job, content, AuditMode::Screenshot, &glossary).await
    }

    async fn load(&self, job_id: Uuid) -> AuditResult<AuditJob> {
        self.store
            .load(job_id)
            .await?
            .ok_or(AuditError::NotFound(job_id))
    }

    async fn execute(&self, job: AuditJob) -> AuditResult<AuditJob> {
        let job = self
            .commit(&job, Transition::Begin { total: PROGRESS_TOTAL_STEPS })
            .await?;
        tracing::info!(audit_id = %job.id, kind = job.kind.as_str(), mode = job.mode.as_str(), "Audit started");

        let (job, glossary) = match &self.glossary {
            Some(_) => {
                let job = self.progress_to(&job, "Loading glossary", 2).await?;
                let terms = self.load_glossary(&job).await;
                tracing::debug!(audit_id = %job.id, terms = terms.len(), "Glossary loaded");
                (job, terms)
            }
            None => (job, Vec::new()),
        };

        let job = self.commit(&job, Transition::AcquisitionStarted).await?;
        let job = self.progress_to(&job, "Acquiring content", 2).await?;

        let content = match self.acquirer.acquire(&job).await {
            Ok(Acquisition::Content(content)) => content,
            Ok(Acquisition::Blocked(signal)) => {
                return self.block(&job, signal.reason, signal.screenshot).await;
            }
            Err(e) => {
                return self.fail(&job, format!("Content acquisition failed: {e}")).await;
            }
        };

        if let (Some(guard), Some(screenshot)) = (&self.guard, content.screenshot.as_deref()) {
            let verdict = guard.classify(screenshot).await;
            if verdict.blocked {
                let reason = verdict.reason.unwrap_or_default();
                return self.block(&job, reason, content.screenshot).await;
            }
        }

        let mode = job.mode;
        self.analyze(job, content, mode, &glossary).await
    }

    async fn analyze(
        &self,
        job: AuditJob,
        content: AcquiredContent,
        mode: AuditMode,
        glossary: &[GlossaryTerm],
    ) -> AuditResult<AuditJob> {
        let job = self.commit(&job, Transition::AnalysisStarted).await?;
        let job = self.progress_to(&job, "Running analysis", 3).await?;

        match self.run_analysis(&job, &content, mode, glossary).await {
            Ok(analysis) => {
                let job = self
                    .commit(
                        &job,
                        Transition::Completed {
                            score: analysis.score,
                            usage: analysis.usage,
                            method: analysis.method,
                            at: Utc::now(),
                        },
                    )
                    .await?;
                tracing::info!(
                    audit_id = %job.id,
                    overall_score = ?job.result.as_ref().map(|r| r.overall_score),
                    method = analysis.method.as_str(),
                    input_tokens = analysis.usage.input_tokens,
                    output_tokens = analysis.usage.output_tokens,
                    cost_usd = analysis.usage.cost_usd,
                    "Audit complete"
                );
                Ok(job)
            }
            Err(message) => self.fail(&job, message).await,
        }
    }

    async fn run_analysis(
        &self,
        job: &AuditJob,
        content: &AcquiredContent,
        mode: AuditMode,
        glossary: &[GlossaryTerm],
    ) -> Result<Analysis, String> {
        let text = content.text.as_deref().filter(|t| !t.trim().is_empty());
        let screenshot = content.screenshot.as_deref().filter(|s| !s.is_empty());

        match (mode, text, screenshot) {
            (AuditMode::Combined, Some(text), Some(screenshot)) => {
                let by_text = self.analyze_text(job, text, glossary).await;
                let by_screenshot = self.analyze_screenshot(job, screenshot, glossary).await;
                self.merge(job, by_text, by_screenshot)
            }
            (AuditMode::Text, Some(text), _) => self.analyze_text(job, text, glossary).await,
            (AuditMode::Screenshot, _, Some(screenshot)) => {
                self.analyze_screenshot(job, screenshot, glossary).await
            }
            (AuditMode::Auto | AuditMode::Combined, Some(text), _) => {
                self.analyze_text(job, text, glossary).await
            }
            (AuditMode::Auto | AuditMode::Combined, None, Some(screenshot)) => {
                self.analyze_screenshot(job, screenshot, glossary).await
            }
            _ => Err(NO_CONTENT_MESSAGE.to_string()),
        }
    }

    async fn analyze_text(
        &self,
        job: &AuditJob,
        text: &str,
        glossary: &[GlossaryTerm],
    ) -> Result<Analysis, String> {
        let request = ModelRequest {
            system: prompt::system_prompt(job.kind),
            prompt: prompt::text_prompt(job, text, glossary, &self.settings),
            screenshot: None,
        };
        self.call_and_recover(job, request, AnalysisMethod::Text).await
    }

    async fn analyze_screenshot(
        &self,
        job: &AuditJob,
        screenshot: &[u8],
        glossary: &[GlossaryTerm],
    ) -> Result<Analysis, String> {
        let request = ModelRequest {
            system: prompt::system_prompt(job.kind),
            prompt: prompt::screenshot_prompt(job, glossary, &self.settings),
            screenshot: Some(screenshot.to_vec()),
        };
        self.call_and_recover(job, request, AnalysisMethod::Screenshot).await
    }

    async fn call_and_recover(
        &self,
        job: &AuditJob,
        request: ModelRequest,
        method: AnalysisMethod,
    ) -> Result<Analysis, String> {
        let response = self
            .model
            .complete(&request)
            .await
            .map_err(|e| format!("AI analysis failed: {e}"))?;

        // Callers that do not price their own calls report 0
        let cost_usd = if response.cost_usd > 0.0 {
            response.cost_usd
        } else {
            self.settings
                .pricing
                .cost_usd(response.input_tokens, response.output_tokens)
        };
        let usage = ModelUsage {
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost_usd,
            duration_ms: response.duration_ms,
        };

        let expected = recovery::expected_dimensions(job.kind);
        match recovery::extract_with_diagnostics(&response.text, expected) {
            Ok(extraction) => {
                match extraction.recovered_by {
                    RecoveredBy::Json { source, transform } => tracing::debug!(
                        audit_id = %job.id,
                        method = method.as_str(),
                        source = source.as_str(),
                        transform = transform.as_str(),
                        attempts = extraction.attempts.len(),
                        "Recovered scores from model output"
                    ),
                    RecoveredBy::Regex { matched } => tracing::warn!(
                        audit_id = %job.id,
                        method = method.as_str(),
                        matched,
                        expected = expected.len(),
                        "Scores recovered by pattern matching only"
                    ),
                }
                Ok(Analysis {
                    score: extraction.score,
                    usage,
                    method,
                })
            }
            Err(exhausted) => {
                tracing::warn!(
                    audit_id = %job.id,
                    method = method.as_str(),
                    attempts = exhausted.attempts.len(),
                    regex_matched = exhausted.regex_matched,
                    summary = %exhausted.summary(),
                    "Score recovery exhausted"
                );
                Err(exhausted.to_string())
            }
        }
    }

    /// Combine the two halves of a COMBINED analysis; one success suffices
    fn merge(
        &self,
        job: &AuditJob,
        by_text: Result<Analysis, String>,
        by_screenshot: Result<Analysis, String>,
    ) -> Result<Analysis, String> {
        match (by_text, by_screenshot) {
            (Ok(text), Ok(screenshot)) => {
                let expected = recovery::expected_dimensions(job.kind);
                let merged = merge_scores(Some(text.score), Some(screenshot.score))
                    .map(|score| normalize(score, expected))
                    .ok_or_else(|| NO_CONTENT_MESSAGE.to_string())?;
                Ok(Analysis {
                    score: merged,
                    usage: text.usage.combine(screenshot.usage),
                    method: AnalysisMethod::Combined,
                })
            }
            (Ok(only), Err(e)) | (Err(e), Ok(only)) => {
                tracing::warn!(
                    audit_id = %job.id,
                    used = only.method.as_str(),
                    error = %e,
                    "Combined analysis half failed, using the other"
                );
                Ok(only)
            }
            (Err(text_err), Err(_)) => Err(text_err),
        }
    }

    async fn load_glossary(&self, job: &AuditJob) -> Vec<GlossaryTerm> {
        let Some(provider) = &self.glossary else {
            return Vec::new();
        };
        match provider.terms(job).await {
            Ok(terms) => terms,
            Err(e) => {
                tracing::warn!(audit_id = %job.id, error = %e, "Glossary unavailable, continuing without terms");
                Vec::new()
            }
        }
    }

    async fn block(
        &self,
        job: &AuditJob,
        reason: String,
        screenshot: Option<Vec<u8>>,
    ) -> AuditResult<AuditJob> {
        tracing::warn!(audit_id = %job.id, reason = %reason, "Audit blocked");
        self.commit(job, Transition::Blocked { reason, screenshot }).await
    }

    async fn fail(&self, job: &AuditJob, message: String) -> AuditResult<AuditJob> {
        let message = truncate_message(&message, self.settings.error_message_limit);
        tracing::error!(audit_id = %job.id, error = %message, "Audit failed");
        self.commit(job, Transition::Failed { message }).await
    }

    async fn progress_to(&self, job: &AuditJob, message: &str, step: u32) -> AuditResult<AuditJob> {
        self.commit(
            job,
            Transition::Progress {
                message: message.to_string(),
                step,
            },
        )
        .await
    }

    /// Apply, persist, then report
    async fn commit(&self, job: &AuditJob, transition: Transition) -> AuditResult<AuditJob> {
        let name = transition.name();
        let next = apply_transition(job, transition)?;
        self.store.save(&next).await?;

        tracing::debug!(
            audit_id = %next.id,
            transition = name,
            status = next.status.as_str(),
            step = next.progress.step,
            "Audit transition committed"
        );

        if next.status != job.status {
            self.progress.status_changed(next.id, job.status, next.status);
        }
        if next.progress != job.progress {
            self.progress.report(
                next.id,
                &next.progress.message,
                next.progress.step,
                next.progress.total,
            );
        }

        Ok(next)
    }
}

/// Cut `message` to at most `limit` characters
pub fn truncate_message(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((cut, _)) => message[..cut].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message_counts_chars() {
        assert_eq!(truncate_message("short", 200), "short");
        assert_eq!(truncate_message("ééééé", 2), "éé");
        assert_eq!(truncate_message(&"x".repeat(500), 200).len(), 200);
    }
}
