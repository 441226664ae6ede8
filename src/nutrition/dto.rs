use serde::{Deserialize, Serialize};

use super::model::{FoodEntry, MacroTotals, MealCategory};

/// Manual add or edit. A known `id` replaces that entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntryInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub fiber: f64,
    #[serde(default = "one")]
    pub quantity: f64,
    pub category: MealCategory,
}

fn one() -> f64 {
    1.0
}

impl From<FoodEntryInput> for FoodEntry {
    fn from(i: FoodEntryInput) -> Self {
        FoodEntry {
            id: i.id.unwrap_or_default(),
            name: i.name,
            calories: i.calories,
            protein: i.protein,
            carbs: i.carbs,
            fat: i.fat,
            fiber: i.fiber,
            quantity: i.quantity,
            category: i.category,
        }
    }
}

/// The day's ledger after a change.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub entries: Vec<FoodEntry>,
    pub totals: MacroTotals,
}
