use chrono::NaiveDate;
use std::cmp::Reverse;
use uuid::Uuid;

use crate::api_connection::ApiConnectionError;
use crate::models::{Category, Ingredient, MealPlanEntry, MealType, NewMealPlanEntry, Recipe};
use crate::store::DataStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    #[default]
    MostUsed,
    Newest,
    CaloriesLow,
    CaloriesHigh,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogueQuery {
    pub category: Option<Category>,
    pub search: String,
    pub sort: SortOrder,
}

impl CatalogueQuery {
    /// Category filter, then name search, then a stable sort.
    pub fn apply<'a>(&self, recipes: &'a [Recipe]) -> Vec<&'a Recipe> {
        let needle = self.search.trim().to_lowercase();
        let mut visible: Vec<&Recipe> = recipes
            .iter()
            .filter(|r| self.category.map_or(true, |c| r.category == c))
            .filter(|r| needle.is_empty() || r.name.to_lowercase().contains(&needle))
            .collect();

        match self.sort {
            SortOrder::MostUsed => visible.sort_by_key(|r| Reverse(r.usage())),
            // Recipes without a timestamp go last.
            SortOrder::Newest => visible.sort_by_key(|r| Reverse(r.created_at)),
            SortOrder::CaloriesLow => visible.sort_by_key(|r| r.calories()),
            SortOrder::CaloriesHigh => visible.sort_by_key(|r| Reverse(r.calories())),
        }
        visible
    }
}

pub fn filter_ingredients<'a>(ingredients: &'a [Ingredient], filter: &str) -> Vec<&'a Ingredient> {
    let needle = filter.trim().to_lowercase();
    ingredients
        .iter()
        .filter(|i| i.name.to_lowercase().contains(&needle))
        .collect()
}

/// "Add to meal plan" from a catalogue card.
pub async fn add_to_plan(
    store: &DataStore,
    recipe_id: Uuid,
    date: NaiveDate,
    meal_type: MealType,
) -> Result<MealPlanEntry, ApiConnectionError> {
    store
        .create_meal_plan(&NewMealPlanEntry {
            date,
            meal_type,
            recipe_id,
        })
        .await
}
