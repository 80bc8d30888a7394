use std::sync::Arc;

use time::{Date, OffsetDateTime, UtcOffset};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::history::archive::HistoryArchive;
use crate::store::{keys, load_json, save_json, DurableStore};

use super::model::{MacroTotals, MealRecord};
use super::rollover::{self, RolloverDecision};

/// The aggregate the rest of the system reads and writes.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    /// Newest first. Records keep their image bytes while the day is open.
    pub today_meals: Vec<MealRecord>,
    pub totals: MacroTotals,
    pub ai_usage_count: u32,
    /// `None` until the first day-boundary check pins it.
    pub last_rollover_day: Option<Date>,
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone)]
pub struct TodaySnapshot {
    pub date: Date,
    pub meals: Vec<MealRecord>,
    pub totals: MacroTotals,
    pub ai_usage_count: u32,
}

/// Single owner of `LedgerState`. All access is serialized through the
/// lock, and every public entry point runs the day-boundary check before
/// touching today's data — including `add`, so a commit that finishes
/// after midnight lands on the new day, not the day it was captured.
///
/// Callers supply `now`; the store never reads the clock itself.
pub struct LedgerStore {
    store: Arc<dyn DurableStore>,
    history: Arc<HistoryArchive>,
    offset: UtcOffset,
    inner: Mutex<LedgerState>,
}

impl LedgerStore {
    /// Restore from the durable store, defaulting every absent or corrupt
    /// field to zero/empty, then immediately run the rollover check.
    pub async fn load(
        store: Arc<dyn DurableStore>,
        history: Arc<HistoryArchive>,
        offset: UtcOffset,
        now: OffsetDateTime,
    ) -> anyhow::Result<Self> {
        let state = LedgerState {
            today_meals: load_json(store.as_ref(), keys::TODAY_MEALS)
                .await
                .unwrap_or_default(),
            totals: load_json(store.as_ref(), keys::TODAY_TOTALS)
                .await
                .unwrap_or_default(),
            ai_usage_count: load_json(store.as_ref(), keys::USAGE_COUNT)
                .await
                .unwrap_or(0),
            last_rollover_day: load_json(store.as_ref(), keys::LAST_DAY).await,
        };

        let ledger = Self {
            store,
            history,
            offset,
            inner: Mutex::new(state),
        };
        ledger.check_rollover(now).await?;
        Ok(ledger)
    }

    pub async fn check_rollover(&self, now: OffsetDateTime) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        self.check_rollover_locked(&mut state, now).await
    }

    /// Commit a meal to today: front-insert, fold into totals, persist.
    pub async fn add(&self, record: MealRecord, now: OffsetDateTime) -> anyhow::Result<MacroTotals> {
        let mut state = self.inner.lock().await;
        self.check_rollover_locked(&mut state, now).await?;

        state.totals.accumulate(&record);
        state.today_meals.insert(0, record);
        save_json(self.store.as_ref(), keys::TODAY_MEALS, &state.today_meals).await?;
        save_json(self.store.as_ref(), keys::TODAY_TOTALS, &state.totals).await?;
        Ok(state.totals)
    }

    /// Charge one completed analysis against today's quota.
    pub async fn record_usage(&self, now: OffsetDateTime) -> anyhow::Result<u32> {
        let mut state = self.inner.lock().await;
        self.check_rollover_locked(&mut state, now).await?;

        state.ai_usage_count += 1;
        save_json(self.store.as_ref(), keys::USAGE_COUNT, &state.ai_usage_count).await?;
        Ok(state.ai_usage_count)
    }

    pub async fn usage_count(&self, now: OffsetDateTime) -> anyhow::Result<u32> {
        let mut state = self.inner.lock().await;
        self.check_rollover_locked(&mut state, now).await?;
        Ok(state.ai_usage_count)
    }

    pub async fn snapshot(&self, now: OffsetDateTime) -> anyhow::Result<TodaySnapshot> {
        let mut state = self.inner.lock().await;
        self.check_rollover_locked(&mut state, now).await?;
        Ok(TodaySnapshot {
            date: rollover::local_day(now, self.offset),
            meals: state.today_meals.clone(),
            totals: state.totals,
            ai_usage_count: state.ai_usage_count,
        })
    }

    /// Image bytes for one of today's meals, if it has any.
    pub async fn meal_image(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let mut state = self.inner.lock().await;
        self.check_rollover_locked(&mut state, now).await?;
        Ok(state
            .today_meals
            .iter()
            .find(|m| m.id == id)
            .and_then(|m| m.image.as_ref().map(|b| b.to_vec())))
    }

    async fn check_rollover_locked(
        &self,
        state: &mut LedgerState,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let today = rollover::local_day(now, self.offset);

        if state.last_rollover_day.is_none() {
            state.last_rollover_day = Some(today);
            save_json(self.store.as_ref(), keys::LAST_DAY, &today).await?;
            return Ok(());
        }

        if let RolloverDecision::Close { summary } =
            rollover::evaluate(state.last_rollover_day, today, state.totals)
        {
            let closed = summary.date;
            self.history.append(summary).await?;

            state.today_meals.clear();
            state.totals = MacroTotals::default();
            state.ai_usage_count = 0;
            state.last_rollover_day = Some(today);

            save_json(self.store.as_ref(), keys::TODAY_MEALS, &state.today_meals).await?;
            save_json(self.store.as_ref(), keys::TODAY_TOTALS, &state.totals).await?;
            save_json(self.store.as_ref(), keys::USAGE_COUNT, &state.ai_usage_count).await?;
            save_json(self.store.as_ref(), keys::LAST_DAY, &today).await?;

            info!(closed = %closed, today = %today, "day archived, ledger reset");
        }
        Ok(())
    }
}

#[cfg(test)]
mod ledger_tests {
    use super::*;
    use crate::store::MemoryStore;
    use time::macros::datetime;

    async fn fresh(
        now: OffsetDateTime,
    ) -> (Arc<MemoryStore>, Arc<HistoryArchive>, LedgerStore) {
        let store = Arc::new(MemoryStore::new());
        let history = Arc::new(HistoryArchive::new(store.clone()));
        let ledger = LedgerStore::load(store.clone(), history.clone(), UtcOffset::UTC, now)
            .await
            .unwrap();
        (store, history, ledger)
    }

    fn meal(calories: i64, protein: i64, carbs: i64, fats: i64, now: OffsetDateTime) -> MealRecord {
        MealRecord::manual("Test meal".into(), calories, protein, carbs, fats, now)
    }

    #[tokio::test]
    async fn fresh_install_loads_all_zero() {
        let now = datetime!(2026 - 03 - 10 09:00 UTC);
        let (_, history, ledger) = fresh(now).await;

        let snap = ledger.snapshot(now).await.unwrap();
        assert!(snap.meals.is_empty());
        assert_eq!(snap.totals, MacroTotals::default());
        assert_eq!(snap.ai_usage_count, 0);
        assert!(history.load().await.is_empty());
    }

    #[tokio::test]
    async fn totals_are_the_running_sum_of_adds() {
        let now = datetime!(2026 - 03 - 10 09:00 UTC);
        let (_, _, ledger) = fresh(now).await;

        ledger.add(meal(600, 40, 55, 20, now), now).await.unwrap();
        ledger.add(meal(350, 25, 30, 10, now), now).await.unwrap();
        let totals = ledger.add(meal(-50, 0, 0, 0, now), now).await.unwrap();

        assert_eq!(totals.calories, 900);
        assert_eq!(totals.protein, 65);
        assert_eq!(totals.carbs, 85);
        assert_eq!(totals.fats, 30);

        let snap = ledger.snapshot(now).await.unwrap();
        assert_eq!(snap.meals.len(), 3);
        // newest first
        assert_eq!(snap.meals[0].calories, -50);
        assert_eq!(snap.meals[2].calories, 600);
    }

    #[tokio::test]
    async fn state_roundtrips_through_the_store() {
        let now = datetime!(2026 - 03 - 10 09:00 UTC);
        let (store, history, ledger) = fresh(now).await;

        let mut record = meal(600, 40, 55, 20, now);
        record.image = Some(serde_bytes::ByteBuf::from(vec![0xffu8, 0xd8, 0xff]));
        ledger.add(record, now).await.unwrap();
        ledger.record_usage(now).await.unwrap();

        let first = ledger.snapshot(now).await.unwrap();
        let reloaded = LedgerStore::load(store, history, UtcOffset::UTC, now)
            .await
            .unwrap();
        let second = reloaded.snapshot(now).await.unwrap();

        assert_eq!(first.meals, second.meals);
        assert_eq!(first.totals, second.totals);
        assert_eq!(first.ai_usage_count, second.ai_usage_count);
    }

    #[tokio::test]
    async fn rollover_archives_once_and_resets() {
        let day0 = datetime!(2026 - 03 - 10 12:00 UTC);
        let day1 = datetime!(2026 - 03 - 11 00:05 UTC);
        let (_, history, ledger) = fresh(day0).await;

        ledger.add(meal(1800, 120, 150, 60, day0), day0).await.unwrap();
        ledger.record_usage(day0).await.unwrap();

        // same-day checks change nothing
        ledger.check_rollover(day0).await.unwrap();
        assert!(history.load().await.is_empty());

        // crossing midnight archives; a second check is a no-op
        ledger.check_rollover(day1).await.unwrap();
        ledger.check_rollover(day1).await.unwrap();

        let days = history.load().await;
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, day0.date());
        assert_eq!(days[0].calories, 1800);

        let snap = ledger.snapshot(day1).await.unwrap();
        assert!(snap.meals.is_empty());
        assert_eq!(snap.totals, MacroTotals::default());
        assert_eq!(snap.ai_usage_count, 0);
    }

    #[tokio::test]
    async fn skipped_days_archive_once_under_last_known_day() {
        let day0 = datetime!(2026 - 03 - 10 12:00 UTC);
        let day2 = datetime!(2026 - 03 - 12 08:00 UTC);
        let (_, history, ledger) = fresh(day0).await;

        ledger.add(meal(1000, 80, 90, 30, day0), day0).await.unwrap();
        ledger.check_rollover(day2).await.unwrap();

        let days = history.load().await;
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, day0.date());
        assert_eq!(days[0].calories, 1000);

        let snap = ledger.snapshot(day2).await.unwrap();
        assert_eq!(snap.totals, MacroTotals::default());
    }

    #[tokio::test]
    async fn usage_only_grows_until_rollover_resets_it() {
        let day0 = datetime!(2026 - 03 - 10 12:00 UTC);
        let day1 = datetime!(2026 - 03 - 11 07:00 UTC);
        let (_, _, ledger) = fresh(day0).await;

        assert_eq!(ledger.record_usage(day0).await.unwrap(), 1);
        assert_eq!(ledger.record_usage(day0).await.unwrap(), 2);
        assert_eq!(ledger.record_usage(day0).await.unwrap(), 3);

        assert_eq!(ledger.usage_count(day1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn commit_after_midnight_lands_on_the_new_day() {
        let day0 = datetime!(2026 - 03 - 10 23:50 UTC);
        let day1 = datetime!(2026 - 03 - 11 00:10 UTC);
        let (_, history, ledger) = fresh(day0).await;

        ledger.add(meal(1800, 120, 150, 60, day0), day0).await.unwrap();

        // analysis started before midnight, confirmed after: the add itself
        // closes the old day first
        let totals = ledger.add(meal(400, 30, 20, 15, day1), day1).await.unwrap();
        assert_eq!(totals.calories, 400);

        let days = history.load().await;
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].calories, 1800);

        let snap = ledger.snapshot(day1).await.unwrap();
        assert_eq!(snap.meals.len(), 1);
        assert_eq!(snap.meals[0].calories, 400);
    }

    #[tokio::test]
    async fn corrupt_persisted_state_loads_as_defaults() {
        let now = datetime!(2026 - 03 - 10 09:00 UTC);
        let store = Arc::new(MemoryStore::new());
        for key in [
            keys::TODAY_MEALS,
            keys::TODAY_TOTALS,
            keys::USAGE_COUNT,
            keys::LAST_DAY,
        ] {
            store.set_bytes(key, b"garbage!".to_vec()).await.unwrap();
        }
        let history = Arc::new(HistoryArchive::new(store.clone()));

        let ledger = LedgerStore::load(store, history.clone(), UtcOffset::UTC, now)
            .await
            .unwrap();
        let snap = ledger.snapshot(now).await.unwrap();
        assert!(snap.meals.is_empty());
        assert_eq!(snap.totals, MacroTotals::default());
        assert_eq!(snap.ai_usage_count, 0);
        // a corrupt last-day pins to today instead of fabricating an archive
        assert!(history.load().await.is_empty());
    }

    #[tokio::test]
    async fn meal_image_returns_stored_bytes() {
        let now = datetime!(2026 - 03 - 10 09:00 UTC);
        let (_, _, ledger) = fresh(now).await;

        let mut record = meal(500, 30, 40, 15, now);
        record.image = Some(serde_bytes::ByteBuf::from(vec![1u8, 2, 3]));
        let id = record.id;
        ledger.add(record, now).await.unwrap();

        assert_eq!(ledger.meal_image(id, now).await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(ledger.meal_image(Uuid::new_v4(), now).await.unwrap(), None);
    }
}
