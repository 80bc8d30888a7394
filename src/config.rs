use serde::Deserialize;
use time::UtcOffset;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// Empty key surfaces as a configuration error on the first analysis
    /// attempt rather than refusing to boot.
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub openai: OpenAiConfig,
    /// Daily cap on completed AI photo analyses. Resets at local midnight.
    pub daily_ai_limit: u32,
    /// The user's local-calendar offset from UTC, for midnight rollover.
    pub utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let openai = OpenAiConfig {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };
        Ok(Self {
            database_url,
            openai,
            daily_ai_limit: std::env::var("DAILY_AI_LIMIT")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            utc_offset_minutes: std::env::var("APP_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i32>().ok())
                .unwrap_or(0),
        })
    }

    pub fn utc_offset(&self) -> UtcOffset {
        UtcOffset::from_whole_seconds(self.utc_offset_minutes * 60).unwrap_or(UtcOffset::UTC)
    }
}
