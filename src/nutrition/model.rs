use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;

/// Smallest serving step a quantity can express.
pub const QUANTITY_STEP: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealCategory {
    /// Display order for grouped views.
    pub const ALL: [MealCategory; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Lunch => "Lunch",
            Self::Dinner => "Dinner",
            Self::Snack => "Snack",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

/// One logged food item. Macro values are per single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    pub id: String,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub quantity: f64,
    pub category: MealCategory,
}

impl FoodEntry {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Checks a manually entered entry and snaps its quantity to the serving step.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(ValidationError::field("name", "must not be empty"));
        }
        if self.id.trim().is_empty() {
            self.id = Self::new_id();
        }
        for (field, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
            ("fiber", self.fiber),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::field(field, "must be a non-negative number"));
            }
        }
        if !self.quantity.is_finite() || self.quantity < QUANTITY_STEP {
            return Err(ValidationError::field(
                "quantity",
                format!("must be at least {QUANTITY_STEP}"),
            ));
        }
        self.quantity = (self.quantity / QUANTITY_STEP).round() * QUANTITY_STEP;
        Ok(self)
    }
}

/// Sum of per-unit value times quantity over a set of entries. Derived only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyGoals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

pub const DAILY_GOALS: DailyGoals = DailyGoals {
    calories: 2000.0,
    protein: 50.0,
    carbs: 225.0,
    fat: 70.0,
    fiber: 30.0,
};

/// Result of an image analysis in its multi-item form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodAnalysis {
    pub food_items: Vec<String>,
    pub macros: MacroTotals,
}

#[cfg(test)]
mod model_tests {
    use super::*;

    fn entry(quantity: f64) -> FoodEntry {
        FoodEntry {
            id: String::new(),
            name: "  Oats ".into(),
            calories: 150.0,
            protein: 5.0,
            carbs: 27.0,
            fat: 3.0,
            fiber: 4.0,
            quantity,
            category: MealCategory::Breakfast,
        }
    }

    #[test]
    fn validated_trims_assigns_id_and_snaps_quantity() {
        let e = entry(1.3).validated().unwrap();
        assert_eq!(e.name, "Oats");
        assert!(!e.id.is_empty());
        assert_eq!(e.quantity, 1.25);
    }

    #[test]
    fn validated_rejects_small_quantity_and_negative_macros() {
        assert!(entry(0.1).validated().is_err());
        let mut bad = entry(1.0);
        bad.fat = -1.0;
        assert_eq!(
            bad.validated().unwrap_err(),
            ValidationError::field("fat", "must be a non-negative number")
        );
    }

    #[test]
    fn category_wire_names() {
        assert_eq!(serde_json::to_string(&MealCategory::Dinner).unwrap(), "\"Dinner\"");
        assert_eq!(MealCategory::parse("Snack"), Some(MealCategory::Snack));
        assert_eq!(MealCategory::parse("snack"), None);
    }
}
