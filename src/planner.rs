use chrono::{Datelike, Days, NaiveDate, Weekday};
use thiserror::Error;
use uuid::Uuid;

use crate::api_connection::ApiConnectionError;
use crate::confirm::Confirm;
use crate::models::{MealPlanEntry, MealType, NewMealPlanEntry};
use crate::nutrition::{aggregate_meals, DailyNutrition};
use crate::store::DataStore;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("date is out of the supported calendar range")]
    DateOutOfRange,
    #[error(transparent)]
    Api(#[from] ApiConnectionError),
}

/// Seven consecutive days starting on the configured week-start weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Week {
    pub start: NaiveDate,
    end: NaiveDate,
}

impl Week {
    /// Fails only for dates within a week of the calendar's limits.
    pub fn containing(date: NaiveDate, week_start: Weekday) -> Result<Self, PlannerError> {
        let back = (7 + date.weekday().num_days_from_sunday() - week_start.num_days_from_sunday()) % 7;
        let start = date
            .checked_sub_days(Days::new(back as u64))
            .ok_or(PlannerError::DateOutOfRange)?;
        let end = start
            .checked_add_days(Days::new(6))
            .ok_or(PlannerError::DateOutOfRange)?;
        Ok(Self { start, end })
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..7)
            .filter_map(|offset| self.start.checked_add_days(Days::new(offset)))
            .collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Ticket for one week fetch; only the newest ticket's response is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRequest {
    pub seq: u64,
    pub week: Week,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayColumn<'a> {
    pub date: NaiveDate,
    pub slots: Vec<(MealType, Option<&'a MealPlanEntry>)>,
    pub nutrition: DailyNutrition,
}

pub struct Planner {
    pivot: NaiveDate,
    week_start: Weekday,
    week: Week,
    meals: Vec<MealPlanEntry>,
    shown: Option<Week>,
    issued: u64,
}

impl Planner {
    pub fn new(pivot: NaiveDate, week_start: Weekday) -> Result<Self, PlannerError> {
        Ok(Self {
            pivot,
            week_start,
            week: Week::containing(pivot, week_start)?,
            meals: Vec::new(),
            shown: None,
            issued: 0,
        })
    }

    pub fn pivot(&self) -> NaiveDate {
        self.pivot
    }

    pub fn week(&self) -> Week {
        self.week
    }

    /// Week whose entries are currently held; lags `week()` while paging.
    pub fn shown_week(&self) -> Option<Week> {
        self.shown
    }

    pub fn meals(&self) -> &[MealPlanEntry] {
        &self.meals
    }

    pub fn next_week(&mut self) -> Result<(), PlannerError> {
        let pivot = self
            .pivot
            .checked_add_days(Days::new(7))
            .ok_or(PlannerError::DateOutOfRange)?;
        self.move_to(pivot)
    }

    pub fn previous_week(&mut self) -> Result<(), PlannerError> {
        let pivot = self
            .pivot
            .checked_sub_days(Days::new(7))
            .ok_or(PlannerError::DateOutOfRange)?;
        self.move_to(pivot)
    }

    fn move_to(&mut self, pivot: NaiveDate) -> Result<(), PlannerError> {
        self.week = Week::containing(pivot, self.week_start)?;
        self.pivot = pivot;
        Ok(())
    }

    pub fn begin_fetch(&mut self) -> WeekRequest {
        self.issued += 1;
        WeekRequest {
            seq: self.issued,
            week: self.week,
        }
    }

    /// Applies a fetched week unless a newer request has been issued since.
    /// Until then the previous week's entries stay in place.
    pub fn complete_fetch(&mut self, request: WeekRequest, meals: Vec<MealPlanEntry>) -> bool {
        if request.seq != self.issued {
            tracing::warn!(
                seq = request.seq,
                latest = self.issued,
                start = %request.week.start,
                "discarding superseded week response"
            );
            return false;
        }
        self.meals = meals;
        self.shown = Some(request.week);
        true
    }

    pub async fn refresh(&mut self, store: &DataStore) -> Result<bool, PlannerError> {
        let request = self.begin_fetch();
        if let Some(cached) = store.cached_meal_plans(request.week.start, request.week.end()) {
            self.meals = cached;
            self.shown = Some(request.week);
        }
        let meals = store.meal_plans(request.week.start, request.week.end()).await?;
        Ok(self.complete_fetch(request, meals))
    }

    /// Refresh after a mutation the backend already accepted. A failure here
    /// leaves the previous grid in place and must not undo the mutation's result.
    async fn refresh_after_mutation(&mut self, store: &DataStore) {
        if let Err(err) = self.refresh(store).await {
            tracing::warn!(error = %err, start = %self.week.start, "week refresh after mutation failed");
        }
    }

    /// First entry booked into the slot; further entries are not shown in the grid.
    pub fn meal_for_slot(&self, date: NaiveDate, meal_type: MealType) -> Option<&MealPlanEntry> {
        self.meals
            .iter()
            .find(|m| m.date == date && m.meal_type == meal_type)
    }

    pub fn entries_for_slot(&self, date: NaiveDate, meal_type: MealType) -> Vec<&MealPlanEntry> {
        self.meals
            .iter()
            .filter(|m| m.date == date && m.meal_type == meal_type)
            .collect()
    }

    pub fn daily_nutrition(&self, date: NaiveDate) -> DailyNutrition {
        aggregate_meals(self.meals.iter().filter(|m| m.date == date))
    }

    pub fn grid(&self) -> Vec<DayColumn<'_>> {
        self.week
            .dates()
            .into_iter()
            .map(|date| DayColumn {
                date,
                slots: MealType::ALL
                    .iter()
                    .map(|&meal_type| (meal_type, self.meal_for_slot(date, meal_type)))
                    .collect(),
                nutrition: self.daily_nutrition(date),
            })
            .collect()
    }

    /// Succeeds as soon as the backend stores the entry.
    pub async fn add_meal(
        &mut self,
        store: &DataStore,
        date: NaiveDate,
        meal_type: MealType,
        recipe_id: Uuid,
    ) -> Result<MealPlanEntry, PlannerError> {
        let created = store
            .create_meal_plan(&NewMealPlanEntry {
                date,
                meal_type,
                recipe_id,
            })
            .await?;
        self.refresh_after_mutation(store).await;
        Ok(created)
    }

    /// Returns `false` when the user declines the confirmation.
    pub async fn remove_meal(
        &mut self,
        store: &DataStore,
        id: Uuid,
        confirm: &dyn Confirm,
    ) -> Result<bool, PlannerError> {
        if !confirm.confirm("Remove this meal?") {
            return Ok(false);
        }
        store.delete_meal_plan(id).await?;
        if let Some(pos) = self.meals.iter().position(|m| m.id == id) {
            self.meals.remove(pos);
        }
        self.refresh_after_mutation(store).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::{ApiClient, StaticToken};
    use crate::cache::CachePolicy;
    use crate::confirm::Fixed;
    use crate::models::Recipe;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> DataStore {
        let client = ApiClient::new(server.uri(), Arc::new(StaticToken(Some("t".into()))));
        DataStore::new(client, CachePolicy::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(date: NaiveDate, meal_type: MealType, name: &str, calories: i64) -> MealPlanEntry {
        let recipe: Recipe = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": name,
            "category": "Dinner",
            "calories_per_serving": calories,
            "protein_g": 10.0
        }))
        .unwrap();
        MealPlanEntry {
            id: Uuid::new_v4(),
            date,
            meal_type,
            recipe_id: recipe.id,
            recipe: Some(recipe),
        }
    }

    #[test]
    fn test_week_is_seven_days_from_week_start_containing_pivot() {
        for week_start in [Weekday::Sun, Weekday::Mon, Weekday::Wed, Weekday::Sat] {
            for offset in 0..14 {
                let pivot = date(2024, 6, 1) + Days::new(offset);
                let week = Week::containing(pivot, week_start).unwrap();
                let dates = week.dates();
                assert_eq!(dates[0].weekday(), week_start);
                assert!(week.contains(pivot));
                assert!(dates.windows(2).all(|w| w[1] == w[0] + Days::new(1)));
                assert_eq!(dates[6], week.end());
            }
        }
    }

    #[test]
    fn test_sunday_start_week_for_june_tenth() {
        let week = Week::containing(date(2024, 6, 10), Weekday::Sun).unwrap();
        assert_eq!(week.start, date(2024, 6, 9));
        assert_eq!(week.end(), date(2024, 6, 15));
    }

    #[test]
    fn test_paging_moves_pivot_by_seven_days() {
        let mut planner = Planner::new(date(2024, 6, 10), Weekday::Mon).unwrap();
        planner.next_week().unwrap();
        assert_eq!(planner.pivot(), date(2024, 6, 17));
        planner.previous_week().unwrap();
        planner.previous_week().unwrap();
        assert_eq!(planner.pivot(), date(2024, 6, 3));
        assert_eq!(planner.week().start, date(2024, 6, 3));
    }

    #[test]
    fn test_superseded_response_is_discarded() {
        let mut planner = Planner::new(date(2024, 6, 10), Weekday::Sun).unwrap();
        let first = planner.begin_fetch();
        planner.next_week().unwrap();
        let second = planner.begin_fetch();

        let next_week_meal = entry(date(2024, 6, 18), MealType::Lunch, "Tacos", 500);
        assert!(planner.complete_fetch(second, vec![next_week_meal]));
        let stale_meal = entry(date(2024, 6, 10), MealType::Lunch, "Soup", 200);
        assert!(!planner.complete_fetch(first, vec![stale_meal]));

        assert_eq!(planner.shown_week(), Some(planner.week()));
        assert_eq!(planner.meals()[0].recipe_name(), "Tacos");
    }

    #[test]
    fn test_slot_lookup_returns_first_match_and_totals_sum_all() {
        let day = date(2024, 6, 10);
        let mut planner = Planner::new(day, Weekday::Sun).unwrap();
        let request = planner.begin_fetch();
        planner.complete_fetch(
            request,
            vec![
                entry(day, MealType::Dinner, "Steak", 800),
                entry(day, MealType::Dinner, "Salad", 150),
                entry(day, MealType::Breakfast, "Pancakes", 435),
                entry(date(2024, 6, 11), MealType::Dinner, "Pasta", 600),
            ],
        );

        assert_eq!(planner.meal_for_slot(day, MealType::Dinner).unwrap().recipe_name(), "Steak");
        assert_eq!(planner.entries_for_slot(day, MealType::Dinner).len(), 2);
        assert!(planner.meal_for_slot(day, MealType::Snack).is_none());

        let nutrition = planner.daily_nutrition(day);
        assert_eq!(nutrition.calories, 800 + 150 + 435);
        assert_eq!(nutrition.protein_g, 30.0);

        let grid = planner.grid();
        assert_eq!(grid.len(), 7);
        let monday = grid.iter().find(|c| c.date == day).unwrap();
        assert_eq!(monday.slots.len(), 4);
        assert_eq!(monday.slots[0].0, MealType::Breakfast);
        assert_eq!(monday.slots[0].1.unwrap().recipe_name(), "Pancakes");
    }

    #[test]
    fn test_weeks_at_the_calendar_limits_are_rejected() {
        // A week starting on the last day cannot fit; neither can one that
        // would have to start before the first.
        assert!(matches!(
            Week::containing(NaiveDate::MAX, NaiveDate::MAX.weekday()),
            Err(PlannerError::DateOutOfRange)
        ));
        assert!(matches!(
            Planner::new(NaiveDate::MIN, NaiveDate::MIN.weekday().succ()),
            Err(PlannerError::DateOutOfRange)
        ));

        let last_full_week = NaiveDate::MAX - Days::new(14);
        let mut planner = Planner::new(last_full_week, Weekday::Sun).unwrap();
        let before = planner.week();
        let mut paged = Ok(());
        while paged.is_ok() {
            paged = planner.next_week();
        }
        assert!(matches!(paged, Err(PlannerError::DateOutOfRange)));
        assert!(planner.week().start >= before.start);
        assert_eq!(planner.week(), Week::containing(planner.pivot(), Weekday::Sun).unwrap());
    }

    #[tokio::test]
    async fn test_add_meal_succeeds_when_the_refresh_fails() {
        let server = MockServer::start().await;
        let recipe_id = Uuid::new_v4();
        let entry_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/meal-plans/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": entry_id, "date": "2024-06-10", "meal_type": "Dinner", "recipe_id": recipe_id
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/meal-plans/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let mut planner = Planner::new(date(2024, 6, 10), Weekday::Sun).unwrap();
        let created = planner
            .add_meal(&store(&server), date(2024, 6, 10), MealType::Dinner, recipe_id)
            .await
            .unwrap();
        assert_eq!(created.id, entry_id);
        assert_eq!(planner.shown_week(), None);
    }

    #[tokio::test]
    async fn test_remove_meal_succeeds_when_the_refresh_fails() {
        let server = MockServer::start().await;
        let day = date(2024, 6, 10);
        let kept = entry(day, MealType::Lunch, "Soup", 200);
        let removed = entry(day, MealType::Dinner, "Stew", 700);
        Mock::given(method("DELETE"))
            .and(path(format!("/meal-plans/{}", removed.id)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/meal-plans/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut planner = Planner::new(day, Weekday::Sun).unwrap();
        let request = planner.begin_fetch();
        planner.complete_fetch(request, vec![kept.clone(), removed.clone()]);

        assert!(planner.remove_meal(&store(&server), removed.id, &Fixed(true)).await.unwrap());
        assert_eq!(planner.meals(), &[kept]);
    }
}
