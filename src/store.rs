use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::api_connection::endpoints::{self, MessageResponse, ParseRequest, UploadResponse};
use crate::api_connection::{ApiClient, ApiConnectionError};
use crate::cache::{CachePolicy, KeyPrefix, Mutation, QueryCache, QueryKey};
use crate::models::{Ingredient, MealPlanEntry, NewMealPlanEntry, Recipe, RecipePayload};
use crate::recipe_parser::ParsedRecipe;

/// Backend reads go through the query cache; backend writes go through
/// `commit`, the one place that applies the invalidation table.
pub struct DataStore {
    client: ApiClient,
    cache: QueryCache,
}

impl DataStore {
    pub fn new(client: ApiClient, policy: CachePolicy) -> Self {
        Self {
            client,
            cache: QueryCache::new(policy),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn query<T: DeserializeOwned>(&self, key: QueryKey) -> Result<T, ApiConnectionError> {
        if let Some(value) = self.cache.fresh(&key) {
            tracing::debug!(?key, "cache hit");
            return Ok(serde_json::from_value(value)?);
        }
        let value: Value = self.client.get(&key.path()).await?;
        let decoded = serde_json::from_value(value.clone())?;
        self.cache.insert(key, value);
        Ok(decoded)
    }

    fn cached<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        self.cache
            .stale(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    fn commit(&self, mutation: Mutation) {
        tracing::info!(?mutation, "mutation committed");
        self.cache.apply(mutation);
    }

    pub async fn recipes(&self) -> Result<Vec<Recipe>, ApiConnectionError> {
        self.query(QueryKey::Recipes).await
    }

    pub async fn recipe(&self, id: Uuid) -> Result<Option<Recipe>, ApiConnectionError> {
        Ok(self.recipes().await?.into_iter().find(|r| r.id == id))
    }

    pub async fn ingredients(&self) -> Result<Vec<Ingredient>, ApiConnectionError> {
        self.query(QueryKey::Ingredients).await
    }

    /// Not cached: each debounced search goes to the backend.
    pub async fn search_ingredients(&self, query: &str) -> Result<Vec<Ingredient>, ApiConnectionError> {
        self.client.get(&endpoints::ingredient_search(query)).await
    }

    pub async fn meal_plans(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MealPlanEntry>, ApiConnectionError> {
        self.query(QueryKey::MealPlans { start, end }).await
    }

    /// Last known entries for the range, however old.
    pub fn cached_meal_plans(&self, start: NaiveDate, end: NaiveDate) -> Option<Vec<MealPlanEntry>> {
        self.cached(&QueryKey::MealPlans { start, end })
    }

    pub async fn create_recipe(&self, payload: &RecipePayload) -> Result<Recipe, ApiConnectionError> {
        let created = self.client.post(endpoints::RECIPES, payload).await?;
        self.commit(Mutation::CreateRecipe);
        Ok(created)
    }

    pub async fn update_recipe(&self, id: Uuid, payload: &RecipePayload) -> Result<Recipe, ApiConnectionError> {
        let updated = self.client.put(&endpoints::recipe(id), payload).await?;
        self.commit(Mutation::UpdateRecipe);
        Ok(updated)
    }

    pub async fn delete_recipe(&self, id: Uuid) -> Result<(), ApiConnectionError> {
        let _: Option<MessageResponse> = self.client.delete(&endpoints::recipe(id)).await?;
        self.cache.remove_item(KeyPrefix::Recipes, id);
        self.commit(Mutation::DeleteRecipe);
        Ok(())
    }

    pub async fn create_meal_plan(&self, entry: &NewMealPlanEntry) -> Result<MealPlanEntry, ApiConnectionError> {
        let created = self.client.post(endpoints::MEAL_PLANS, entry).await?;
        self.commit(Mutation::CreateMealPlan);
        Ok(created)
    }

    pub async fn delete_meal_plan(&self, id: Uuid) -> Result<(), ApiConnectionError> {
        let _: Option<MessageResponse> = self.client.delete(&endpoints::meal_plan(id)).await?;
        self.cache.remove_item(KeyPrefix::MealPlans, id);
        self.commit(Mutation::DeleteMealPlan);
        Ok(())
    }

    pub async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String, ApiConnectionError> {
        let part = Part::bytes(bytes).file_name(file_name.to_string()).mime_str(mime)?;
        let form = Form::new().part("file", part);
        let uploaded: UploadResponse = self.client.post_multipart(endpoints::UPLOAD, form).await?;
        self.commit(Mutation::UploadImage);
        Ok(uploaded.url)
    }

    pub async fn parse_recipe_text(&self, text: &str) -> Result<ParsedRecipe, ApiConnectionError> {
        let request = ParseRequest { text: text.to_string() };
        let parsed = self.client.post(endpoints::PARSE, &request).await?;
        self.commit(Mutation::ParseRecipe);
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::StaticToken;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> DataStore {
        let client = ApiClient::new(server.uri(), Arc::new(StaticToken(Some("t".into()))));
        DataStore::new(client, CachePolicy::default())
    }

    fn recipe_json(id: Uuid, name: &str) -> Value {
        json!({ "id": id, "name": name, "category": "Dinner", "calories_per_serving": 500, "protein_g": 30 })
    }

    #[tokio::test]
    async fn test_recipes_are_served_from_cache_within_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recipes/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([recipe_json(Uuid::new_v4(), "Chili")])))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server);
        assert_eq!(store.recipes().await.unwrap().len(), 1);
        assert_eq!(store.recipes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_recipe_forces_refetch() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/recipes/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/recipes/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(recipe_json(id, "Soup")))
            .mount(&server)
            .await;

        let store = store(&server);
        store.recipes().await.unwrap();
        let payload = RecipePayload {
            name: "Soup".into(),
            description: None,
            instructions: String::new(),
            image_url: None,
            category: crate::models::Category::Dinner,
            calories_per_serving: 500,
            protein_g: 30.0,
            carbs_g: None,
            fat_g: None,
            ingredients: vec![],
        };
        let created = store.create_recipe(&payload).await.unwrap();
        assert_eq!(created.id, id);
        store.recipes().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_meal_plan_filters_cached_week() {
        let server = MockServer::start().await;
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let recipe = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/meal-plans/"))
            .and(query_param("start_date", "2024-06-09"))
            .and(query_param("end_date", "2024-06-15"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": keep, "date": "2024-06-10", "meal_type": "Lunch", "recipe_id": recipe },
                { "id": gone, "date": "2024-06-10", "meal_type": "Dinner", "recipe_id": recipe }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("/meal-plans/{}", gone)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Meal plan deleted" })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server);
        let start = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(store.meal_plans(start, end).await.unwrap().len(), 2);

        store.delete_meal_plan(gone).await.unwrap();
        let cached = store.cached_meal_plans(start, end).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, keep);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_fresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recipes/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = store(&server);
        store.recipes().await.unwrap();
        assert!(store.delete_recipe(Uuid::new_v4()).await.is_err());
        store.recipes().await.unwrap();
    }
}
