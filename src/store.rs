use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;

/// Persistence keys. Bump the suffix when a stored shape changes.
pub mod keys {
    pub const GOALS: &str = "goals.v1";
    pub const TODAY_MEALS: &str = "today.meals.v1";
    pub const TODAY_TOTALS: &str = "today.totals.v1";
    pub const LAST_DAY: &str = "today.last_day.v1";
    pub const USAGE_COUNT: &str = "today.usage.v1";
    pub const HISTORY: &str = "history.v1";
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get_bytes(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Postgres-backed store: one upserted row per key in `kv_store`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableStore for PgStore {
    async fn get_bytes(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let row = sqlx::query_scalar::<_, Vec<u8>>(
            r#"SELECT value FROM kv_store WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("get {}", key))?;
        Ok(row)
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("set {}", key))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM kv_store WHERE key = $1"#)
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("delete {}", key))?;
        Ok(())
    }
}

/// In-memory store used by `AppState::fake()` and unit tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get_bytes(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().unwrap().get(key).cloned())
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        self.inner.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Load a JSON value from the store. Undecodable bytes are treated the same
/// as an absent key: logged and `None`. Persisted state must never take the
/// process down.
pub async fn load_json<T: DeserializeOwned>(store: &dyn DurableStore, key: &str) -> Option<T> {
    let bytes = match store.get_bytes(key).await {
        Ok(b) => b?,
        Err(e) => {
            warn!(error = %e, key, "store read failed, treating as absent");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, key, "corrupt stored value, treating as absent");
            None
        }
    }
}

pub async fn save_json<T: Serialize>(
    store: &dyn DurableStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(value).with_context(|| format!("encode {}", key))?;
    store.set_bytes(key, bytes).await
}
