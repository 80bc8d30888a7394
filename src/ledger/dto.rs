use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::model::{DetectedItem, MacroTotals, MealRecord};
use super::store::TodaySnapshot;

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub date: Date,
    pub totals: MacroTotals,
    pub meals: Vec<MealItem>,
    pub ai_used: u32,
    pub ai_limit: u32,
    pub ai_remaining: u32,
}

impl TodayResponse {
    pub fn new(snapshot: TodaySnapshot, ai_limit: u32) -> Self {
        Self {
            date: snapshot.date,
            totals: snapshot.totals,
            meals: snapshot.meals.iter().map(MealItem::from).collect(),
            ai_used: snapshot.ai_usage_count,
            ai_limit,
            ai_remaining: ai_limit.saturating_sub(snapshot.ai_usage_count),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealItem {
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

impl From<&MealRecord> for MealItem {
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

/// Manual entry. Absent fields are zero; the sheet's blank-field rule.
#[derive(Debug, Deserialize)]
pub struct ManualMealRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub calories: i64,
    #[serde(default)]
    pub protein: i64,
    #[serde(default)]
    pub carbs: i64,
    #[serde(default)]
    pub fats: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatedMealResponse {
    pub id: Uuid,
    pub timestamp: OffsetDateTime,
    pub totals: MacroTotals,
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn manual_request_defaults_absent_fields_to_zero() {
        let body: ManualMealRequest = serde_json::from_str(r#"{"title":"Oats"}"#).unwrap();
        assert_eq!(body.title, "Oats");
        assert_eq!(body.calories, 0);
        assert_eq!(body.protein, 0);
        assert_eq!(body.carbs, 0);
        assert_eq!(body.fats, 0);

        let empty: ManualMealRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.title, "");
        assert_eq!(empty.calories, 0);
    }

    #[test]
    fn meal_item_flags_image_without_shipping_bytes() {
        let mut record =
            MealRecord::manual("Bowl".into(), 600, 40, 55, 20, OffsetDateTime::now_utc());
        record.image = Some(serde_bytes::ByteBuf::from(vec![0u8; 64]));

        let item = MealItem::from(&record);
        assert!(item.has_image);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"has_image\":true"));
        assert!(!json.contains("\"image\""));
    }
}
