use std::sync::Arc;

use crate::ledger::model::DailySummary;
use crate::store::{keys, load_json, save_json, DurableStore};

/// Write-once ledger of closed days. Append-only: no update or delete is
/// exposed. The only writer is the rollover path, which is serialized by
/// the ledger's lock.
pub struct HistoryArchive {
    store: Arc<dyn DurableStore>,
}

impl HistoryArchive {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// Front-insert so the persisted order is already newest-first.
    pub async fn append(&self, summary: DailySummary) -> anyhow::Result<()> {
        let mut days: Vec<DailySummary> =
            load_json(self.store.as_ref(), keys::HISTORY).await.unwrap_or_default();
        days.insert(0, summary);
        save_json(self.store.as_ref(), keys::HISTORY, &days).await
    }

    /// All archived days, newest first. Absent or corrupt history is empty.
    pub async fn load(&self) -> Vec<DailySummary> {
        let mut days: Vec<DailySummary> =
            load_json(self.store.as_ref(), keys::HISTORY).await.unwrap_or_default();
        days.sort_by(|a, b| b.date.cmp(&a.date));
        days
    }
}

#[cfg(test)]
mod archive_tests {
    use super::*;
    use crate::ledger::model::MacroTotals;
    use crate::store::MemoryStore;
    use time::macros::date;

    fn summary(date: time::Date, calories: i64) -> DailySummary {
        DailySummary::close_day(
            date,
            MacroTotals {
                calories,
                protein: 0,
                carbs: 0,
                fats: 0,
            },
        )
    }

    #[tokio::test]
    async fn append_keeps_newest_first() {
        let archive = HistoryArchive::new(Arc::new(MemoryStore::new()));
        archive.append(summary(date!(2026 - 03 - 09), 1800)).await.unwrap();
        archive.append(summary(date!(2026 - 03 - 10), 2100)).await.unwrap();

        let days = archive.load().await;
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date!(2026 - 03 - 10));
        assert_eq!(days[1].date, date!(2026 - 03 - 09));
    }

    #[tokio::test]
    async fn load_sorts_out_of_order_entries() {
        let store = Arc::new(MemoryStore::new());
        let days = vec![
            summary(date!(2026 - 03 - 08), 1500),
            summary(date!(2026 - 03 - 10), 2100),
            summary(date!(2026 - 03 - 09), 1800),
        ];
        save_json(store.as_ref(), keys::HISTORY, &days).await.unwrap();

        let archive = HistoryArchive::new(store);
        let loaded = archive.load().await;
        assert_eq!(loaded[0].date, date!(2026 - 03 - 10));
        assert_eq!(loaded[2].date, date!(2026 - 03 - 08));
    }

    #[tokio::test]
    async fn corrupt_history_loads_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set_bytes(keys::HISTORY, b"\xff\xfe".to_vec()).await.unwrap();

        let archive = HistoryArchive::new(store);
        assert!(archive.load().await.is_empty());
    }

    #[tokio::test]
    async fn history_roundtrips_exactly() {
        let store = Arc::new(MemoryStore::new());
        let archive = HistoryArchive::new(store.clone());
        let day = summary(date!(2026 - 03 - 10), 2100);
        archive.append(day.clone()).await.unwrap();

        let reloaded = HistoryArchive::new(store).load().await;
        assert_eq!(reloaded, vec![day]);
    }
}
