use serde::Serialize;

use super::model::{DailyGoals, FoodEntry, MacroTotals, DAILY_GOALS};

const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARBS: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

/// Recomputes totals from scratch over every entry.
pub fn totals(entries: &[FoodEntry]) -> MacroTotals {
    entries.iter().fold(MacroTotals::default(), |acc, e| MacroTotals {
        calories: acc.calories + e.calories * e.quantity,
        protein: acc.protein + e.protein * e.quantity,
        carbs: acc.carbs + e.carbs * e.quantity,
        fat: acc.fat + e.fat * e.quantity,
        fiber: acc.fiber + e.fiber * e.quantity,
    })
}

/// Progress towards a target, clamped to `0..=100`.
pub fn percent_of_goal(value: f64, max: f64) -> f64 {
    if max <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroCalories {
    pub calories: f64,
    /// Whole-number share of the macro calorie total.
    pub percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalorieBreakdown {
    pub protein: MacroCalories,
    pub carbs: MacroCalories,
    pub fat: MacroCalories,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionSummary {
    pub totals: MacroTotals,
    pub goals: DailyGoals,
    pub progress: GoalProgress,
    pub remaining_calories: f64,
    pub breakdown: CalorieBreakdown,
}

pub fn calorie_breakdown(t: &MacroTotals) -> CalorieBreakdown {
    let protein = t.protein * KCAL_PER_G_PROTEIN;
    let carbs = t.carbs * KCAL_PER_G_CARBS;
    let fat = t.fat * KCAL_PER_G_FAT;
    let total = protein + carbs + fat;
    let share = |v: f64| {
        if total <= 0.0 {
            0
        } else {
            (v / total * 100.0).round() as u32
        }
    };
    CalorieBreakdown {
        protein: MacroCalories { calories: protein, percent: share(protein) },
        carbs: MacroCalories { calories: carbs, percent: share(carbs) },
        fat: MacroCalories { calories: fat, percent: share(fat) },
    }
}

pub fn summary(entries: &[FoodEntry]) -> NutritionSummary {
    let t = totals(entries);
    let g = DAILY_GOALS;
    NutritionSummary {
        totals: t,
        goals: g,
        progress: GoalProgress {
            calories: percent_of_goal(t.calories, g.calories),
            protein: percent_of_goal(t.protein, g.protein),
            carbs: percent_of_goal(t.carbs, g.carbs),
            fat: percent_of_goal(t.fat, g.fat),
            fiber: percent_of_goal(t.fiber, g.fiber),
        },
        remaining_calories: (g.calories - t.calories).max(0.0),
        breakdown: calorie_breakdown(&t),
    }
}

#[cfg(test)]
mod aggregator_tests {
    use super::*;
    use crate::nutrition::model::MealCategory;

    fn entry(calories: f64, protein: f64, carbs: f64, fat: f64, fiber: f64, quantity: f64) -> FoodEntry {
        FoodEntry {
            id: FoodEntry::new_id(),
            name: "x".into(),
            calories,
            protein,
            carbs,
            fat,
            fiber,
            quantity,
            category: MealCategory::Lunch,
        }
    }

    #[test]
    fn empty_list_is_all_zero() {
        assert_eq!(totals(&[]), MacroTotals::default());
    }

    #[test]
    fn totals_weight_each_field_by_quantity() {
        let entries = vec![
            entry(100.0, 10.0, 20.0, 5.0, 2.0, 2.0),
            entry(50.0, 1.0, 4.0, 0.5, 1.0, 0.5),
        ];
        let t = totals(&entries);
        assert_eq!(t.calories, 225.0);
        assert_eq!(t.protein, 20.5);
        assert_eq!(t.carbs, 42.0);
        assert_eq!(t.fat, 10.25);
        assert_eq!(t.fiber, 4.5);
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent_of_goal(1000.0, 2000.0), 50.0);
        assert_eq!(percent_of_goal(5000.0, 2000.0), 100.0);
        assert_eq!(percent_of_goal(-10.0, 2000.0), 0.0);
        assert_eq!(percent_of_goal(10.0, 0.0), 0.0);
    }

    #[test]
    fn summary_reports_remaining_and_breakdown() {
        let s = summary(&[entry(2500.0, 25.0, 50.0, 20.0, 0.0, 1.0)]);
        assert_eq!(s.remaining_calories, 0.0);
        assert_eq!(s.progress.calories, 100.0);
        assert_eq!(s.progress.protein, 50.0);
        // 100 + 200 + 180 = 480 kcal from macros
        assert_eq!(s.breakdown.protein.calories, 100.0);
        assert_eq!(s.breakdown.fat.calories, 180.0);
        assert_eq!(s.breakdown.carbs.percent, 42);
        assert_eq!(s.breakdown.protein.percent, 21);
        assert_eq!(s.breakdown.fat.percent, 38);
    }

    #[test]
    fn breakdown_of_nothing_is_zero_percent() {
        let b = calorie_breakdown(&MacroTotals::default());
        assert_eq!(b.protein.percent, 0);
        assert_eq!(b.carbs.percent, 0);
        assert_eq!(b.fat.percent, 0);
    }
}
