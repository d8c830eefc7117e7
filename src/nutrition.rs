use serde::{Deserialize, Serialize};

use crate::models::{MealPlanEntry, RecipeIngredient};

/// Rounds half-way cases up. The sum is first snapped to 1e-6 so that
/// `0.13 * 50.0 + 0.1 * 100.0` lands on 16.5 rather than 16.4999…
pub fn round_half_up(value: f64) -> i64 {
    let snapped = (value * 1e6).round() / 1e6;
    (snapped + 0.5).floor() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionTotals {
    pub calories: i64,
    pub protein_g: f64,
}

/// Values typed in by the user when a recipe has no ingredient breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ManualNutrition {
    pub calories_per_serving: i64,
    pub protein_g: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NutritionSource {
    Manual(ManualNutrition),
    Derived(Vec<RecipeIngredient>),
}

impl Default for NutritionSource {
    fn default() -> Self {
        NutritionSource::Manual(ManualNutrition::default())
    }
}

impl NutritionSource {
    pub fn totals(&self) -> NutritionTotals {
        match self {
            NutritionSource::Manual(values) => NutritionTotals {
                calories: values.calories_per_serving,
                protein_g: values.protein_g,
            },
            NutritionSource::Derived(ingredients) => derive_totals(ingredients),
        }
    }

    pub fn ingredients(&self) -> &[RecipeIngredient] {
        match self {
            NutritionSource::Manual(_) => &[],
            NutritionSource::Derived(ingredients) => ingredients,
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, NutritionSource::Derived(_))
    }
}

pub fn derive_totals(ingredients: &[RecipeIngredient]) -> NutritionTotals {
    let (calories, protein) = ingredients.iter().fold((0.0_f64, 0.0_f64), |(cal, pro), ing| {
        (
            cal + ing.calories_per_g * ing.amount_g,
            pro + ing.protein_per_g * ing.amount_g,
        )
    });
    NutritionTotals {
        calories: round_half_up(calories),
        protein_g: round_half_up(protein) as f64,
    }
}

/// Sum of what a set of planned meals contributes to one day.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyNutrition {
    pub calories: i64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

pub fn aggregate_meals<'a>(meals: impl IntoIterator<Item = &'a MealPlanEntry>) -> DailyNutrition {
    let mut daily = DailyNutrition::default();
    for meal in meals {
        // A meal whose recipe was deleted contributes nothing.
        if let Some(recipe) = &meal.recipe {
            daily.calories += recipe.calories();
            daily.protein_g += recipe.protein();
            daily.carbs_g += recipe.carbs_g.unwrap_or(0.0);
            daily.fat_g += recipe.fat_g.unwrap_or(0.0);
        }
    }
    daily
}
