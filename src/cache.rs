use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::api_connection::endpoints;

/// Families of cached reads; invalidation works on whole families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPrefix {
    Recipes,
    Ingredients,
    MealPlans,
}

/// Logical identity of one cached backend read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Recipes,
    Ingredients,
    MealPlans { start: NaiveDate, end: NaiveDate },
}

impl QueryKey {
    pub fn prefix(&self) -> KeyPrefix {
        match self {
            QueryKey::Recipes => KeyPrefix::Recipes,
            QueryKey::Ingredients => KeyPrefix::Ingredients,
            QueryKey::MealPlans { .. } => KeyPrefix::MealPlans,
        }
    }

    pub fn path(&self) -> String {
        match self {
            QueryKey::Recipes => endpoints::RECIPES.to_string(),
            QueryKey::Ingredients => endpoints::INGREDIENTS.to_string(),
            QueryKey::MealPlans { start, end } => endpoints::meal_plans_between(*start, *end),
        }
    }
}

/// Every backend write the client performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CreateRecipe,
    UpdateRecipe,
    DeleteRecipe,
    CreateMealPlan,
    DeleteMealPlan,
    UploadImage,
    ParseRecipe,
}

impl Mutation {
    /// Key families that are stale once this mutation succeeds.
    ///
    /// Meal-plan entries embed their recipe, so recipe edits and deletes
    /// also touch them. Planning a meal bumps the recipe's usage count.
    pub fn invalidates(&self) -> &'static [KeyPrefix] {
        match self {
            Mutation::CreateRecipe => &[KeyPrefix::Recipes],
            Mutation::UpdateRecipe => &[KeyPrefix::Recipes, KeyPrefix::MealPlans],
            Mutation::DeleteRecipe => &[KeyPrefix::Recipes, KeyPrefix::MealPlans],
            Mutation::CreateMealPlan => &[KeyPrefix::MealPlans, KeyPrefix::Recipes],
            Mutation::DeleteMealPlan => &[KeyPrefix::MealPlans],
            Mutation::UploadImage | Mutation::ParseRecipe => &[],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub recipes_stale_after: Duration,
    pub ingredients_stale_after: Duration,
    pub meal_plans_stale_after: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            recipes_stale_after: Duration::from_secs(5 * 60),
            ingredients_stale_after: Duration::from_secs(5 * 60),
            meal_plans_stale_after: Duration::ZERO,
        }
    }
}

impl CachePolicy {
    fn stale_after(&self, prefix: KeyPrefix) -> Duration {
        match prefix {
            KeyPrefix::Recipes => self.recipes_stale_after,
            KeyPrefix::Ingredients => self.ingredients_stale_after,
            KeyPrefix::MealPlans => self.meal_plans_stale_after,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    fetched_at: Instant,
    invalidated: bool,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    policy: CachePolicy,
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
}

impl QueryCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value still inside its freshness window.
    pub fn fresh(&self, key: &QueryKey) -> Option<Value> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        let window = self.policy.stale_after(key.prefix());
        if entry.invalidated || window.is_zero() || entry.fetched_at.elapsed() >= window {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Cached value regardless of age, for showing something while refetching.
    pub fn stale(&self, key: &QueryKey) -> Option<Value> {
        self.lock().get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: QueryKey, value: Value) {
        self.lock().insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                invalidated: false,
            },
        );
    }

    /// Marks every key in `prefix` stale; values stay readable through `stale`.
    pub fn invalidate(&self, prefix: KeyPrefix) -> usize {
        let mut entries = self.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.prefix() == prefix {
                entry.invalidated = true;
                count += 1;
            }
        }
        tracing::debug!(?prefix, count, "invalidated cached queries");
        count
    }

    pub fn apply(&self, mutation: Mutation) {
        for prefix in mutation.invalidates() {
            self.invalidate(*prefix);
        }
    }

    /// Drops the first element whose `id` matches from every cached list in
    /// `prefix`. Returns how many lists changed.
    pub fn remove_item(&self, prefix: KeyPrefix, id: Uuid) -> usize {
        let id = id.to_string();
        let mut entries = self.lock();
        let mut changed = 0;
        for (key, entry) in entries.iter_mut() {
            if key.prefix() != prefix {
                continue;
            }
            if let Value::Array(items) = &mut entry.value {
                if let Some(pos) = items
                    .iter()
                    .position(|item| item.get("id").and_then(Value::as_str) == Some(id.as_str()))
                {
                    items.remove(pos);
                    changed += 1;
                }
            }
        }
        changed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn week() -> QueryKey {
        QueryKey::MealPlans {
            start: NaiveDate::from_ymd_opt(2024, 6, 9).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recipes_stay_fresh_for_window() {
        let cache = QueryCache::new(CachePolicy::default());
        cache.insert(QueryKey::Recipes, json!([]));
        assert!(cache.fresh(&QueryKey::Recipes).is_some());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.fresh(&QueryKey::Recipes).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.fresh(&QueryKey::Recipes).is_none());
        assert!(cache.stale(&QueryKey::Recipes).is_some());
    }

    #[test]
    fn test_meal_plans_are_never_fresh_but_keep_previous_data() {
        let cache = QueryCache::new(CachePolicy::default());
        cache.insert(week(), json!([{ "id": "a" }]));
        assert!(cache.fresh(&week()).is_none());
        assert_eq!(cache.stale(&week()).unwrap(), json!([{ "id": "a" }]));
    }

    #[test]
    fn test_mutation_table_invalidates_listed_prefixes_only() {
        let cache = QueryCache::new(CachePolicy::default());
        cache.insert(QueryKey::Recipes, json!([]));
        cache.insert(QueryKey::Ingredients, json!([]));
        cache.insert(week(), json!([]));

        cache.apply(Mutation::DeleteMealPlan);
        assert!(cache.fresh(&QueryKey::Recipes).is_some());
        assert!(cache.fresh(&QueryKey::Ingredients).is_some());

        cache.apply(Mutation::UpdateRecipe);
        assert!(cache.fresh(&QueryKey::Recipes).is_none());
        assert!(cache.fresh(&QueryKey::Ingredients).is_some());
    }

    #[test]
    fn test_upload_and_parse_invalidate_nothing() {
        assert!(Mutation::UploadImage.invalidates().is_empty());
        assert!(Mutation::ParseRecipe.invalidates().is_empty());
    }

    #[test]
    fn test_remove_item_drops_exactly_one_match_per_list() {
        let cache = QueryCache::new(CachePolicy::default());
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();
        cache.insert(
            week(),
            json!([{ "id": target.to_string() }, { "id": other.to_string() }]),
        );
        let other_week = QueryKey::MealPlans {
            start: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
        };
        cache.insert(other_week.clone(), json!([{ "id": target.to_string() }]));
        cache.insert(QueryKey::Recipes, json!([{ "id": target.to_string() }]));

        assert_eq!(cache.remove_item(KeyPrefix::MealPlans, target), 2);
        assert_eq!(cache.stale(&week()).unwrap(), json!([{ "id": other.to_string() }]));
        assert_eq!(cache.stale(&other_week).unwrap(), json!([]));
        // Other families are untouched.
        assert_eq!(cache.stale(&QueryKey::Recipes).unwrap().as_array().unwrap().len(), 1);
    }
}
