use chrono::{Days, NaiveDate};
use uuid::Uuid;

use crate::api_connection::ApiConnectionError;
use crate::models::{MealPlanEntry, MealType};
use crate::nutrition::{aggregate_meals, NutritionTotals};
use crate::recipe_detail::RecipeDetail;
use crate::store::DataStore;

const LOOKAHEAD_DAYS: u64 = 2;
const PREVIEW_NAMES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct UpcomingDay {
    pub date: NaiveDate,
    pub meal_count: usize,
    pub recipe_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub totals: NutritionTotals,
    /// Breakfast, Lunch, Dinner, Snack; types with nothing planned are left out.
    pub by_meal_type: Vec<(MealType, Vec<MealPlanEntry>)>,
    pub upcoming: Vec<UpcomingDay>,
}

impl TodaySummary {
    pub fn build(date: NaiveDate, today_meals: &[MealPlanEntry], upcoming_meals: &[MealPlanEntry]) -> Self {
        let todays: Vec<&MealPlanEntry> = today_meals.iter().filter(|m| m.date == date).collect();
        let daily = aggregate_meals(todays.iter().copied());

        let by_meal_type = MealType::ALL
            .iter()
            .filter_map(|&meal_type| {
                let slot: Vec<MealPlanEntry> = todays
                    .iter()
                    .filter(|m| m.meal_type == meal_type)
                    .map(|m| (*m).clone())
                    .collect();
                (!slot.is_empty()).then_some((meal_type, slot))
            })
            .collect();

        let upcoming = date
            .iter_days()
            .skip(1)
            .take(LOOKAHEAD_DAYS as usize)
            .map(|day| {
                let meals: Vec<&MealPlanEntry> = upcoming_meals.iter().filter(|m| m.date == day).collect();
                UpcomingDay {
                    date: day,
                    meal_count: meals.len(),
                    recipe_names: meals
                        .iter()
                        .take(PREVIEW_NAMES)
                        .map(|m| m.recipe_name().to_string())
                        .collect(),
                }
            })
            .collect();

        Self {
            date,
            totals: NutritionTotals {
                calories: daily.calories,
                protein_g: daily.protein_g,
            },
            by_meal_type,
            upcoming,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_meal_type.is_empty()
    }

    /// Read-only detail of the recipe behind one of today's entries.
    pub fn open(&self, entry_id: Uuid) -> Option<RecipeDetail> {
        self.by_meal_type
            .iter()
            .flat_map(|(_, entries)| entries)
            .find(|entry| entry.id == entry_id)
            .and_then(|entry| entry.recipe.clone())
            .map(RecipeDetail::view_only)
    }
}

pub async fn load(store: &DataStore, date: NaiveDate) -> Result<TodaySummary, ApiConnectionError> {
    let today_meals = store.meal_plans(date, date).await?;
    let upcoming_meals = match (
        date.checked_add_days(Days::new(1)),
        date.checked_add_days(Days::new(LOOKAHEAD_DAYS)),
    ) {
        (Some(first), Some(last)) => store.meal_plans(first, last).await?,
        _ => Vec::new(),
    };
    Ok(TodaySummary::build(date, &today_meals, &upcoming_meals))
}
