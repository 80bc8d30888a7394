use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// User-set daily macro targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroGoals {
    pub calories: i64,
    pub protein: i64, // grams
    pub carbs: i64,   // grams
    pub fats: i64,    // grams
}

impl Default for MacroGoals {
    fn default() -> Self {
        Self {
            calories: 2000,
            protein: 150,
            carbs: 200,
            fats: 70,
        }
    }
}

/// Running sum of today's committed meals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
}

impl MacroTotals {
    pub fn accumulate(&mut self, meal: &MealRecord) {
        self.calories += meal.calories;
        self.protein += meal.protein;
        self.carbs += meal.carbs;
        self.fats += meal.fats;
    }
}

/// One food the analyzer recognized inside a meal photo. Immutable once
/// produced; owned by its `MealRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedItem {
    pub id: Uuid,
    pub name: String,
    pub grams: i64,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
}

/// A committed (or candidate) meal. Totals may be user-edited, so they are
/// plain integers with no sign constraint. The image is kept only while the
/// record lives in "today"; rollover drops the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: Uuid,
    pub title: String,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
    pub items: Vec<DetectedItem>,
    pub image: Option<ByteBuf>,
    pub timestamp: OffsetDateTime,
}

impl MealRecord {
    /// A record from user-typed values: no image, no item breakdown.
    pub fn manual(
        title: String,
        calories: i64,
        protein: i64,
        carbs: i64,
        fats: i64,
        timestamp: OffsetDateTime,
    ) -> Self {
        let trimmed = title.trim();
        Self {
            id: Uuid::new_v4(),
            title: if trimmed.is_empty() {
                "Meal".to_string()
            } else {
                trimmed.to_string()
            },
            calories,
            protein,
            carbs,
            fats,
            items: Vec::new(),
            image: None,
            timestamp,
        }
    }
}

/// Numeric-only record of a closed day. Kept in history indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub id: Uuid,
    pub date: Date,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fats: i64,
}

impl DailySummary {
    pub fn close_day(date: Date, totals: MacroTotals) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            calories: totals.calories,
            protein: totals.protein,
            carbs: totals.carbs,
            fats: totals.fats,
        }
    }
}
