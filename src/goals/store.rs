use std::sync::Arc;

use tokio::sync::Mutex;

use crate::ledger::model::MacroGoals;
use crate::store::{keys, load_json, save_json, DurableStore};

/// Persisted daily targets. Load-default-or-stored, save-on-change.
pub struct GoalsStore {
    store: Arc<dyn DurableStore>,
    inner: Mutex<MacroGoals>,
}

impl GoalsStore {
    /// Restore stored goals, or fall back to the defaults and persist them
    /// so the first read and the first reload agree.
    pub async fn load(store: Arc<dyn DurableStore>) -> anyhow::Result<Self> {
        let goals = match load_json::<MacroGoals>(store.as_ref(), keys::GOALS).await {
            Some(g) => g,
            None => {
                let defaults = MacroGoals::default();
                save_json(store.as_ref(), keys::GOALS, &defaults).await?;
                defaults
            }
        };
        Ok(Self {
            store,
            inner: Mutex::new(goals),
        })
    }

    pub async fn get(&self) -> MacroGoals {
        self.inner.lock().await.clone()
    }

    pub async fn save(&self, goals: MacroGoals) -> anyhow::Result<MacroGoals> {
        let mut current = self.inner.lock().await;
        save_json(self.store.as_ref(), keys::GOALS, &goals).await?;
        *current = goals.clone();
        Ok(goals)
    }
}
