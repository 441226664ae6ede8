use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::model::{FoodAnalysis, MacroTotals};

/// A completed image analysis. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFoodAnalysis {
    pub id: Uuid,
    pub food_items: Vec<String>,
    pub macros: MacroTotals,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_id: Option<Uuid>,
}

impl StoredFoodAnalysis {
    pub fn new(analysis: FoodAnalysis, user_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            food_items: analysis.food_items,
            macros: analysis.macros,
            created_at: OffsetDateTime::now_utc(),
            user_id,
        }
    }
}
