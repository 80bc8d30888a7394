use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::ledger::model::{MacroTotals, MealRecord};
use crate::ledger::quota::UsageQuota;
use crate::ledger::store::LedgerStore;

use super::client::{AnalysisError, MealAnalyzer};

/// The capture → analyze → confirm workflow, one request at a time.
#[derive(Debug, Clone)]
pub enum PipelineState {
    Idle,
    Capturing,
    Analyzing,
    Succeeded { candidate: MealRecord },
    Failed { error: AnalysisError },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Analyzing => "analyzing",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("daily AI photo limit reached ({used}/{limit})")]
    QuotaExceeded { used: u32, limit: u32 },
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// User-edited totals for a confirm. Absent fields keep the candidate's
/// estimate. The item breakdown is never editable.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotalsEdit {
    pub calories: Option<i64>,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fats: Option<i64>,
}

struct Inner {
    state: PipelineState,
    /// The captured image, retained across a failure so a retry does not
    /// need a recapture.
    image: Option<Bytes>,
    /// Bumped on every start and cancel; an analyzer response whose
    /// generation no longer matches was cancelled mid-flight and its
    /// result is dropped without recording usage.
    generation: u64,
}

/// Owns the analysis state machine. The analyzer call is awaited with the
/// state lock released, so the ledger and every read endpoint stay
/// responsive while a request is in flight. Commits re-enter the ledger,
/// which runs its own day-boundary check — an analysis started before
/// midnight and confirmed after lands on the new day.
pub struct AnalysisPipeline {
    analyzer: Arc<dyn MealAnalyzer>,
    ledger: Arc<LedgerStore>,
    quota: UsageQuota,
    inner: Mutex<Inner>,
}

impl AnalysisPipeline {
    pub fn new(analyzer: Arc<dyn MealAnalyzer>, ledger: Arc<LedgerStore>, quota: UsageQuota) -> Self {
        Self {
            analyzer,
            ledger,
            quota,
            inner: Mutex::new(Inner {
                state: PipelineState::Idle,
                image: None,
                generation: 0,
            }),
        }
    }

    pub fn quota(&self) -> UsageQuota {
        self.quota
    }

    pub async fn snapshot(&self) -> PipelineState {
        self.inner.lock().await.state.clone()
    }

    /// Open the capture flow. Quota-gated up front so the user is told
    /// before pointing the camera at anything; a rejection is a policy
    /// notice, not a state transition.
    pub async fn begin_capture(&self, now: OffsetDateTime) -> Result<PipelineState, PipelineError> {
        self.check_quota("begin capture", now).await?;

        let mut inner = self.inner.lock().await;
        match inner.state {
            PipelineState::Idle => {
                inner.state = PipelineState::Capturing;
                Ok(inner.state.clone())
            }
            ref other => Err(PipelineError::InvalidState {
                action: "begin capture",
                state: other.name(),
            }),
        }
    }

    /// The capture produced an image: analyze it. The quota is re-checked
    /// before the network call — it gates the attempt, not the bookkeeping.
    pub async fn submit_photo(
        &self,
        image: Bytes,
        now: OffsetDateTime,
    ) -> Result<PipelineState, PipelineError> {
        self.check_quota("analyze", now).await?;

        let generation = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                PipelineState::Capturing => {}
                ref other => {
                    return Err(PipelineError::InvalidState {
                        action: "analyze",
                        state: other.name(),
                    })
                }
            }
            inner.state = PipelineState::Analyzing;
            inner.image = Some(image.clone());
            inner.generation += 1;
            inner.generation
        };

        self.run_analysis(image, generation, now).await
    }

    /// User-initiated retry with the retained image.
    pub async fn retry(&self, now: OffsetDateTime) -> Result<PipelineState, PipelineError> {
        self.check_quota("retry", now).await?;

        let (image, generation) = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                PipelineState::Failed { .. } => {}
                ref other => {
                    return Err(PipelineError::InvalidState {
                        action: "retry",
                        state: other.name(),
                    })
                }
            }
            let image = inner
                .image
                .clone()
                .ok_or_else(|| anyhow::anyhow!("failed state without a retained image"))?;
            inner.state = PipelineState::Analyzing;
            inner.generation += 1;
            (image, inner.generation)
        };

        self.run_analysis(image, generation, now).await
    }

    /// Commit the candidate, with optional user-edited totals.
    pub async fn confirm(
        &self,
        edit: TotalsEdit,
        now: OffsetDateTime,
    ) -> Result<(MealRecord, MacroTotals), PipelineError> {
        let mut inner = self.inner.lock().await;
        let candidate = match &inner.state {
            PipelineState::Succeeded { candidate } => candidate.clone(),
            other => {
                return Err(PipelineError::InvalidState {
                    action: "confirm",
                    state: other.name(),
                })
            }
        };

        let mut record = candidate;
        record.calories = edit.calories.unwrap_or(record.calories);
        record.protein = edit.protein.unwrap_or(record.protein);
        record.carbs = edit.carbs.unwrap_or(record.carbs);
        record.fats = edit.fats.unwrap_or(record.fats);

        let totals = self.ledger.add(record.clone(), now).await?;
        info!(meal = %record.title, calories = record.calories, "candidate committed");

        inner.state = PipelineState::Idle;
        inner.image = None;
        inner.generation += 1;
        Ok((record, totals))
    }

    /// Abandon whatever is in progress: a pending capture, an in-flight
    /// analysis, or an unconfirmed candidate. Never records usage, never
    /// touches the ledger. No-op when already idle.
    pub async fn cancel(&self) -> PipelineState {
        let mut inner = self.inner.lock().await;
        if !matches!(inner.state, PipelineState::Idle) {
            info!(state = inner.state.name(), "analysis flow cancelled");
            inner.state = PipelineState::Idle;
            inner.image = None;
            inner.generation += 1;
        }
        inner.state.clone()
    }

    async fn check_quota(&self, action: &'static str, now: OffsetDateTime) -> Result<(), PipelineError> {
        let used = self.ledger.usage_count(now).await?;
        if !self.quota.can_analyze(used) {
            warn!(used, limit = self.quota.limit(), action, "AI photo quota exhausted");
            return Err(PipelineError::QuotaExceeded {
                used,
                limit: self.quota.limit(),
            });
        }
        Ok(())
    }

    async fn run_analysis(
        &self,
        image: Bytes,
        generation: u64,
        now: OffsetDateTime,
    ) -> Result<PipelineState, PipelineError> {
        // Lock released while the collaborator works.
        let result = self.analyzer.analyze(image).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation || !matches!(inner.state, PipelineState::Analyzing) {
            // Cancelled while in flight: drop the result, charge nothing.
            info!("stale analysis result discarded");
            return Ok(inner.state.clone());
        }

        match result {
            Ok(candidate) => {
                // Usage is charged for a completed analysis only — never
                // for a capture or a failed attempt.
                self.ledger.record_usage(now).await?;
                info!(meal = %candidate.title, calories = candidate.calories, "analysis succeeded");
                inner.state = PipelineState::Succeeded { candidate };
            }
            Err(error) => {
                warn!(error = %error, kind = error.kind(), "analysis failed");
                inner.state = PipelineState::Failed { error };
            }
        }
        Ok(inner.state.clone())
    }
}
