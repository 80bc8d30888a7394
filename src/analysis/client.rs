use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::config::OpenAiConfig;
use crate::ledger::model::{DetectedItem, MealRecord};

/// Everything the vision collaborator can fail with, reduced to the
/// categories the rest of the system acts on.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("missing OpenAI API key")]
    MissingKey,
    #[error("could not read the image")]
    BadImage,
    #[error("server error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("no content returned by the model")]
    EmptyContent,
    #[error("could not read model output: {0}")]
    Decode(String),
}

impl AnalysisError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingKey => "configuration",
            Self::BadImage => "input",
            Self::Http { .. } => "transport",
            Self::EmptyContent | Self::Decode(_) => "protocol",
        }
    }

    /// Whether pressing "retry" with the same photo can possibly help.
    /// Configuration errors need a fixed key; input errors need a recapture.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::EmptyContent | Self::Decode(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::MissingKey => {
                "Missing API key. Set OPENAI_API_KEY and restart the service.".to_string()
            }
            Self::BadImage => "Could not read that photo. Please take a new one.".to_string(),
            _ => "We couldn't analyze your photo. Please try again later.".to_string(),
        }
    }
}

#[async_trait]
pub trait MealAnalyzer: Send + Sync {
    /// Estimate macros for a meal photo. The returned candidate carries the
    /// submitted image bytes and a fresh timestamp; it is not committed to
    /// the ledger until the user confirms it.
    async fn analyze(&self, image: Bytes) -> Result<MealRecord, AnalysisError>;
}

const SYSTEM_PROMPT: &str = r#"You are a nutrition estimator. Return STRICT JSON ONLY:
{
  "title": string,
  "calories": int,
  "protein": int,
  "carbs": int,
  "fats": int,
  "items": [
    { "name": string, "grams": int, "calories": int, "protein": int, "carbs": int, "fats": int }
  ]
}
If uncertain, give best reasonable estimates. No extra text, no markdown."#;

const USER_PROMPT: &str = "Estimate macros for this meal photo. Return ONLY the JSON object.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    name: String,
    grams: i64,
    calories: i64,
    protein: i64,
    carbs: i64,
    fats: i64,
}

#[derive(Debug, Deserialize)]
struct WireMeal {
    title: String,
    calories: i64,
    protein: i64,
    carbs: i64,
    fats: i64,
    #[serde(default)]
    items: Vec<WireItem>,
}

/// Chat-completions client asking a vision model for structured macros.
pub struct OpenAiVision {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiVision {
    pub fn new(config: OpenAiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl MealAnalyzer for OpenAiVision {
    async fn analyze(&self, image: Bytes) -> Result<MealRecord, AnalysisError> {
        if self.config.api_key.is_empty() {
            return Err(AnalysisError::MissingKey);
        }
        if image.is_empty() {
            return Err(AnalysisError::BadImage);
        }

        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&image));
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_PROMPT },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]
                }
            ],
            "temperature": 0.2,
            "max_tokens": 600
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            // no response at all: transport failure with status 0
            .map_err(|e| AnalysisError::Http {
                status: e.status().map_or(0, |s| s.as_u16()),
                body: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::Decode(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(AnalysisError::EmptyContent)?;

        debug!(model = %self.config.model, bytes = image.len(), "vision response received");
        meal_from_content(&content, &image)
    }
}

/// Decode the model's JSON payload into a candidate record. Models
/// sometimes wrap the JSON in code fences; strip them before decoding.
fn meal_from_content(content: &str, image: &[u8]) -> Result<MealRecord, AnalysisError> {
    let text = strip_code_fences(content);
    let wire: WireMeal =
        serde_json::from_str(&text).map_err(|e| AnalysisError::Decode(e.to_string()))?;

    let items = wire
        .items
        .into_iter()
        .map(|i| DetectedItem {
            id: Uuid::new_v4(),
            name: i.name,
            grams: i.grams,
            calories: i.calories,
            protein: i.protein,
            carbs: i.carbs,
            fats: i.fats,
        })
        .collect();

    Ok(MealRecord {
        id: Uuid::new_v4(),
        title: wire.title,
        calories: wire.calories,
        protein: wire.protein,
        carbs: wire.carbs,
        fats: wire.fats,
        items,
        image: Some(serde_bytes::ByteBuf::from(image.to_vec())),
        timestamp: OffsetDateTime::now_utc(),
    })
}

fn strip_code_fences(content: &str) -> String {
    content.replace("```json", "").replace("```", "").trim().to_string()
}
