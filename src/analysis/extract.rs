//! Pulling a nutrition payload out of free-form model text.

use serde_json::{Map, Value};

use super::AnalysisOutcome;
use crate::errors::AnalysisError;
use crate::nutrition::model::{FoodAnalysis, FoodEntry, MacroTotals, MealCategory, QUANTITY_STEP};

pub const UNKNOWN_FOOD: &str = "Unknown Food";

const CALORIES: &[&str] = &["calories", "kcal"];
const PROTEIN: &[&str] = &["protein", "proteins"];
const CARBS: &[&str] = &["carbs", "carbohydrates"];
const FAT: &[&str] = &["fat", "fats"];
const FIBER: &[&str] = &["fiber", "fibers", "fibre"];

/// Parses the text between the first `{` and the last `}` (inclusive).
pub fn extract_json_object(text: &str) -> Result<Value, AnalysisError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(AnalysisError::Parse("no JSON object in response".into()));
    };
    if end < start {
        return Err(AnalysisError::Parse("no JSON object in response".into()));
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| AnalysisError::Parse(e.to_string()))
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// Looks a macro up at the top level first, then under `macros`.
fn macro_value(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    let nested = obj.get("macros").and_then(Value::as_object);
    let found = keys
        .iter()
        .find_map(|k| obj.get(*k).and_then(as_number))
        .or_else(|| nested.and_then(|m| keys.iter().find_map(|k| m.get(*k).and_then(as_number))));
    round1(found.unwrap_or(0.0).max(0.0))
}

fn food_items(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("foodItems")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Fills every gap with a default. A non-object value yields all defaults.
pub fn normalize(value: &Value) -> AnalysisOutcome {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    let items = food_items(obj);
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| (!items.is_empty()).then(|| items.join(", ")))
        .unwrap_or_else(|| UNKNOWN_FOOD.to_string());

    let macros = MacroTotals {
        calories: macro_value(obj, CALORIES),
        protein: macro_value(obj, PROTEIN),
        carbs: macro_value(obj, CARBS),
        fat: macro_value(obj, FAT),
        fiber: macro_value(obj, FIBER),
    };

    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .and_then(MealCategory::parse)
        .unwrap_or(MealCategory::Snack);

    let quantity = obj
        .get("quantity")
        .and_then(as_number)
        .filter(|q| *q >= QUANTITY_STEP)
        .map(|q| (q / QUANTITY_STEP).round() * QUANTITY_STEP)
        .unwrap_or(1.0);

    AnalysisOutcome {
        entry: FoodEntry {
            id: FoodEntry::new_id(),
            name,
            calories: macros.calories,
            protein: macros.protein,
            carbs: macros.carbs,
            fat: macros.fat,
            fiber: macros.fiber,
            quantity,
            category,
        },
        analysis: FoodAnalysis {
            food_items: items,
            macros,
        },
    }
}

/// Extraction followed by normalization.
pub fn parse_model_text(text: &str) -> Result<AnalysisOutcome, AnalysisError> {
    extract_json_object(text).map(|v| normalize(&v))
}

#[cfg(test)]
mod extract_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_the_braced_substring_is_parsed() {
        let v = extract_json_object(r#"Here is the result: {"name":"Apple","calories":95} extra"#).unwrap();
        assert_eq!(v, json!({"name": "Apple", "calories": 95}));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let out = parse_model_text(r#"Here is the result: {"name":"Apple","calories":95} extra"#).unwrap();
        let e = out.entry;
        assert_eq!(e.name, "Apple");
        assert_eq!(e.calories, 95.0);
        assert_eq!((e.protein, e.carbs, e.fat, e.fiber), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(e.category, MealCategory::Snack);
        assert_eq!(e.quantity, 1.0);
        assert!(out.analysis.food_items.is_empty());
    }

    #[test]
    fn no_braces_is_a_parse_failure() {
        let err = parse_model_text("I cannot identify any food here.").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
        assert!(err.to_string().starts_with("parse failure"));
    }

    #[test]
    fn reversed_or_broken_braces_fail() {
        assert!(matches!(extract_json_object("} then {"), Err(AnalysisError::Parse(_))));
        assert!(matches!(extract_json_object("{ not json }"), Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn multi_item_shape_with_nested_aliases() {
        let text = r#"```json
        {"foodItems":["rice","beans"],"macros":{"calories":412.46,"carbohydrates":70.04,"proteins":"15.25","fats":6,"fibers":12.97}}
        ```"#;
        let out = parse_model_text(text).unwrap();
        assert_eq!(out.analysis.food_items, vec!["rice", "beans"]);
        assert_eq!(out.analysis.macros.calories, 412.5);
        assert_eq!(out.analysis.macros.carbs, 70.0);
        assert_eq!(out.analysis.macros.protein, 15.3);
        assert_eq!(out.analysis.macros.fat, 6.0);
        assert_eq!(out.analysis.macros.fiber, 13.0);
        assert_eq!(out.entry.name, "rice, beans");
    }

    #[test]
    fn non_numeric_and_negative_values_become_zero() {
        let out = parse_model_text(r#"{"name":"Soup","calories":"lots","fat":-3,"category":"Dinner"}"#).unwrap();
        assert_eq!(out.entry.calories, 0.0);
        assert_eq!(out.entry.fat, 0.0);
        assert_eq!(out.entry.category, MealCategory::Dinner);
    }

    #[test]
    fn invalid_category_falls_back_to_snack() {
        let out = parse_model_text(r#"{"name":"Toast","category":"Brunch"}"#).unwrap();
        assert_eq!(out.entry.category, MealCategory::Snack);
    }

    #[test]
    fn non_object_json_normalizes_to_defaults() {
        let out = normalize(&json!([1, 2, 3]));
        assert_eq!(out.entry.name, UNKNOWN_FOOD);
        assert_eq!(out.analysis.macros, MacroTotals::default());
        assert_eq!(out.entry.quantity, 1.0);
    }

    #[test]
    fn rounding_is_one_decimal() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(12.35000001), 12.4);
        assert_eq!(round1(0.0), 0.0);
    }
}
