use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, clap::ValueEnum)]
pub enum Category {
    Breakfast,
    Lunch,
    #[default]
    Dinner,
    Snack,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Breakfast,
        Category::Lunch,
        Category::Dinner,
        Category::Snack,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Breakfast => "Breakfast",
            Category::Lunch => "Lunch",
            Category::Dinner => "Dinner",
            Category::Snack => "Snack",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    /// Display order used by the planner grid and the today view.
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Catalogue ids come back as strings from our own tables but as integers
/// from the upstream food database.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s),
        Some(Raw::Int(i)) => Some(i.to_string()),
        Some(Raw::Float(f)) => Some(f.to_string()),
        None => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "string_or_number", skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub calories_per_g: f64,
    #[serde(default)]
    pub protein_per_g: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub api_id: Option<String>,
    #[serde(default)]
    pub calories_per_g: f64,
    #[serde(default)]
    pub protein_per_g: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    pub amount_g: f64,
}

impl RecipeIngredient {
    /// Returns `None` unless `amount_g` is a finite, strictly positive number.
    pub fn from_catalogue(ingredient: &Ingredient, amount_g: f64) -> Option<Self> {
        if !amount_g.is_finite() || amount_g <= 0.0 {
            return None;
        }
        Some(Self {
            name: ingredient.name.clone(),
            api_id: ingredient
                .api_id
                .clone()
                .or_else(|| ingredient.id.map(|id| id.to_string())),
            calories_per_g: ingredient.calories_per_g,
            protein_per_g: ingredient.protein_per_g,
            image_url: ingredient.image_url.clone(),
            amount_g,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub calories_per_serving: Option<i64>,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub carbs_g: Option<f64>,
    #[serde(default)]
    pub fat_g: Option<f64>,
    #[serde(default)]
    pub usage_count: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
}

impl Recipe {
    pub fn calories(&self) -> i64 {
        self.calories_per_serving.unwrap_or(0)
    }

    pub fn protein(&self) -> f64 {
        self.protein_g.unwrap_or(0.0)
    }

    pub fn usage(&self) -> i64 {
        self.usage_count.unwrap_or(0)
    }
}

/// Body of `POST /recipes/` and `PUT /recipes/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipePayload {
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub image_url: Option<String>,
    pub category: Category,
    pub calories_per_serving: i64,
    pub protein_g: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f64>,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlanEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub recipe_id: Uuid,
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

impl MealPlanEntry {
    pub fn recipe_name(&self) -> &str {
        self.recipe
            .as_ref()
            .map(|r| r.name.as_str())
            .unwrap_or("Unknown Recipe")
    }
}

/// Body of `POST /meal-plans/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMealPlanEntry {
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub recipe_id: Uuid,
}
