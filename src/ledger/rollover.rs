use time::{Date, OffsetDateTime, UtcOffset};

use super::model::{DailySummary, MacroTotals};

/// What the day-boundary check decided.
#[derive(Debug, Clone, PartialEq)]
pub enum RolloverDecision {
    /// Still the same calendar day (or the day was never pinned yet).
    NoOp,
    /// The day changed: archive this summary and reset today's state.
    Close { summary: DailySummary },
}

/// Calendar day of `now` in the user's local calendar.
pub fn local_day(now: OffsetDateTime, offset: UtcOffset) -> Date {
    now.to_offset(offset).date()
}

/// Pure day-boundary decision.
///
/// `last_day == None` means the ledger has never observed a day; the caller
/// pins it to `today` without archiving. A `last_day` in the future of
/// `today` (clock moved backwards) is also a no-op: the pinned day never
/// decreases and nothing is archived under a future date.
///
/// Multi-day gaps close once, keyed to the last known day — the ledger only
/// holds the current accumulated totals, so there is nothing to attribute
/// to the days in between.
pub fn evaluate(last_day: Option<Date>, today: Date, totals: MacroTotals) -> RolloverDecision {
    match last_day {
        Some(last) if last < today => RolloverDecision::Close {
            summary: DailySummary::close_day(last, totals),
        },
        _ => RolloverDecision::NoOp,
    }
}

#[cfg(test)]
mod rollover_tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn same_day_is_noop() {
        let decision = evaluate(
            Some(date!(2026 - 03 - 10)),
            date!(2026 - 03 - 10),
            MacroTotals::default(),
        );
        assert_eq!(decision, RolloverDecision::NoOp);
    }

    #[test]
    fn unpinned_day_is_noop() {
        let decision = evaluate(None, date!(2026 - 03 - 10), MacroTotals::default());
        assert_eq!(decision, RolloverDecision::NoOp);
    }

    #[test]
    fn next_day_closes_with_previous_days_totals() {
        let totals = MacroTotals {
            calories: 1800,
            protein: 120,
            carbs: 150,
            fats: 60,
        };
        match evaluate(Some(date!(2026 - 03 - 10)), date!(2026 - 03 - 11), totals) {
            RolloverDecision::Close { summary } => {
                assert_eq!(summary.date, date!(2026 - 03 - 10));
                assert_eq!(summary.calories, 1800);
                assert_eq!(summary.protein, 120);
                assert_eq!(summary.carbs, 150);
                assert_eq!(summary.fats, 60);
            }
            other => panic!("expected Close, got {:?}", other),
        }
    }

    #[test]
    fn multi_day_gap_closes_once_under_last_known_day() {
        let totals = MacroTotals {
            calories: 1000,
            protein: 80,
            carbs: 90,
            fats: 30,
        };
        match evaluate(Some(date!(2026 - 03 - 10)), date!(2026 - 03 - 12), totals) {
            RolloverDecision::Close { summary } => {
                assert_eq!(summary.date, date!(2026 - 03 - 10));
                assert_eq!(summary.calories, 1000);
            }
            other => panic!("expected Close, got {:?}", other),
        }
    }

    #[test]
    fn clock_moved_backwards_is_noop() {
        let decision = evaluate(
            Some(date!(2026 - 03 - 11)),
            date!(2026 - 03 - 10),
            MacroTotals::default(),
        );
        assert_eq!(decision, RolloverDecision::NoOp);
    }

    #[test]
    fn local_day_respects_configured_offset() {
        // 01:30 UTC is still the previous day at UTC-3.
        let now = datetime!(2026 - 03 - 11 01:30 UTC);
        let offset = UtcOffset::from_whole_seconds(-3 * 3600).unwrap();
        assert_eq!(local_day(now, offset), date!(2026 - 03 - 10));
        assert_eq!(local_day(now, UtcOffset::UTC), date!(2026 - 03 - 11));
    }
}
