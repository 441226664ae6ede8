use super::model::{FoodEntry, MealCategory};

struct Template {
    id: &'static str,
    name: &'static str,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    fiber: f64,
    category: MealCategory,
}

const COMMON_FOODS: [Template; 8] = [
    Template {
        id: "banana",
        name: "Banana",
        calories: 105.0,
        protein: 1.3,
        carbs: 27.0,
        fat: 0.4,
        fiber: 3.1,
        category: MealCategory::Snack,
    },
    Template {
        id: "chicken-breast",
        name: "Grilled Chicken Breast",
        calories: 165.0,
        protein: 31.0,
        carbs: 0.0,
        fat: 3.6,
        fiber: 0.0,
        category: MealCategory::Lunch,
    },
    Template {
        id: "brown-rice",
        name: "Brown Rice (1 cup)",
        calories: 216.0,
        protein: 5.0,
        carbs: 45.0,
        fat: 1.8,
        fiber: 3.5,
        category: MealCategory::Lunch,
    },
    Template {
        id: "avocado-half",
        name: "Avocado (1/2)",
        calories: 161.0,
        protein: 2.0,
        carbs: 8.5,
        fat: 15.0,
        fiber: 6.7,
        category: MealCategory::Breakfast,
    },
    Template {
        id: "greek-yogurt",
        name: "Greek Yogurt",
        calories: 100.0,
        protein: 17.0,
        carbs: 6.0,
        fat: 0.4,
        fiber: 0.0,
        category: MealCategory::Breakfast,
    },
    Template {
        id: "salmon",
        name: "Salmon (3 oz)",
        calories: 177.0,
        protein: 19.0,
        carbs: 0.0,
        fat: 11.0,
        fiber: 0.0,
        category: MealCategory::Dinner,
    },
    Template {
        id: "sweet-potato",
        name: "Sweet Potato",
        calories: 112.0,
        protein: 2.0,
        carbs: 26.0,
        fat: 0.1,
        fiber: 3.8,
        category: MealCategory::Dinner,
    },
    Template {
        id: "egg",
        name: "Egg",
        calories: 72.0,
        protein: 6.0,
        carbs: 0.6,
        fat: 5.0,
        fiber: 0.0,
        category: MealCategory::Breakfast,
    },
];

impl From<&Template> for FoodEntry {
    fn from(t: &Template) -> Self {
        FoodEntry {
            id: t.id.to_string(),
            name: t.name.to_string(),
            calories: t.calories,
            protein: t.protein,
            carbs: t.carbs,
            fat: t.fat,
            fiber: t.fiber,
            quantity: 1.0,
            category: t.category,
        }
    }
}

/// Quick-add templates with stable ids.
pub fn common_foods() -> Vec<FoodEntry> {
    COMMON_FOODS.iter().map(FoodEntry::from).collect()
}

pub fn find(id: &str) -> Option<FoodEntry> {
    COMMON_FOODS.iter().find(|t| t.id == id).map(FoodEntry::from)
}

#[cfg(test)]
mod catalog_tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let foods = common_foods();
        let mut ids: Vec<_> = foods.iter().map(|f| f.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), foods.len());
    }

    #[test]
    fn find_by_id() {
        assert_eq!(find("egg").map(|f| f.calories), Some(72.0));
        assert!(find("pizza").is_none());
    }
}
