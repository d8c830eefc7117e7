use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const RECIPES: &str = "/recipes/";
pub const INGREDIENTS: &str = "/recipes/ingredients";
pub const UPLOAD: &str = "/recipes/upload";
pub const PARSE: &str = "/recipes/parse";
pub const MEAL_PLANS: &str = "/meal-plans/";

pub fn recipe(id: Uuid) -> String {
    format!("/recipes/{}", id)
}

pub fn ingredient_search(query: &str) -> String {
    format!("/recipes/ingredients/search?q={}", urlencoding::encode(query))
}

pub fn meal_plans_between(start: NaiveDate, end: NaiveDate) -> String {
    format!("{}?start_date={}&end_date={}", MEAL_PLANS, start, end)
}

pub fn meal_plan(id: Uuid) -> String {
    format!("/meal-plans/{}", id)
}

#[derive(Debug, Serialize, Clone)]
pub struct ParseRequest {
    pub text: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}
