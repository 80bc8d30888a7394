use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ledger::model::{DetectedItem, MacroTotals, MealRecord};

use super::client::AnalysisError;
use super::pipeline::PipelineState;

/// Pipeline snapshot for the presentation layer. Image bytes never ride
/// along; clients fetch them from the meal-image endpoint after commit.
#[derive(Debug, Serialize)]
pub struct AnalysisStateResponse {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AnalysisErrorDto>,
    pub ai_used: u32,
    pub ai_limit: u32,
    pub ai_remaining: u32,
}

impl AnalysisStateResponse {
    pub fn new(state: &PipelineState, ai_used: u32, ai_limit: u32) -> Self {
        let (candidate, error) = match state {
            PipelineState::Succeeded { candidate } => (Some(CandidateDto::from(candidate)), None),
            PipelineState::Failed { error } => (None, Some(AnalysisErrorDto::from(error))),
            _ => (None, None),
        };
        Self {
            state: state.name(),
            candidate,
            error,
            ai_used,
            ai_limit,
            ai_remaining: ai_limit.saturating_sub(ai_used),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CandidateDto {
    pub id: Uuid,
    pub title: String,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
    pub items: Vec<DetectedItem>,
    pub has_image: bool,
    pub timestamp: OffsetDateTime,
}

impl From<&MealRecord> for CandidateDto {
    fn from(record: &MealRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            calories: record.calories,
            protein: record.protein,
            carbs: record.carbs,
            fats: record.fats,
            items: record.items.clone(),
            has_image: record.image.is_some(),
            timestamp: record.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisErrorDto {
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&AnalysisError> for AnalysisErrorDto {
    fn from(error: &AnalysisError) -> Self {
        Self {
            kind: error.kind(),
            message: error.user_message(),
            retryable: error.retryable(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PhotoBase64Request {
    pub image_b64: String,
}

/// Optional edited totals for a confirm; absent fields keep the estimate.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    pub calories: Option<i64>,
    pub protein: Option<i64>,
    pub carbs: Option<i64>,
    pub fats: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub meal: CandidateDto,
    pub totals: MacroTotals,
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn failed_state_carries_the_error_and_no_candidate() {
        let state = PipelineState::Failed {
            error: AnalysisError::Http {
                status: 500,
                body: "boom".into(),
            },
        };
        let dto = AnalysisStateResponse::new(&state, 3, 10);
        assert_eq!(dto.state, "failed");
        assert!(dto.candidate.is_none());
        let error = dto.error.as_ref().expect("error dto");
        assert_eq!(error.kind, "transport");
        assert!(error.retryable);
        assert_eq!(dto.ai_remaining, 7);

        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("\"failed\""));
        assert!(!json.contains("candidate"));
    }

    #[test]
    fn idle_state_serializes_without_candidate_or_error() {
        let dto = AnalysisStateResponse::new(&PipelineState::Idle, 10, 10);
        assert_eq!(dto.ai_remaining, 0);
        let json = serde_json::to_string(&dto).unwrap();
        assert!(json.contains("\"idle\""));
        assert!(!json.contains("error"));
    }
}
