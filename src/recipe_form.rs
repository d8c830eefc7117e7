use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::api_connection::ApiConnectionError;
use crate::models::{Category, Ingredient, Recipe, RecipeIngredient, RecipePayload};
use crate::nutrition::{ManualNutrition, NutritionSource, NutritionTotals};
use crate::store::DataStore;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
/// Queries must be longer than this many characters to reach the backend.
pub const MIN_SEARCH_CHARS: usize = 2;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("recipe name is required")]
    MissingName,
    #[error("Failed to save recipe: {0}")]
    Save(#[source] ApiConnectionError),
    #[error("Failed to import recipe text: {0}")]
    Import(#[source] ApiConnectionError),
    #[error("Failed to upload image: {0}")]
    Upload(#[source] ApiConnectionError),
}

/// The recipe being edited. Nutrition is either typed in or derived from the
/// ingredient list; manual values survive while ingredients are present and
/// come back once the last ingredient is removed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub image_url: String,
    pub category: Category,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub(crate) nutrition: NutritionSource,
    pub(crate) remembered_manual: ManualNutrition,
}

impl Default for RecipeDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            instructions: String::new(),
            image_url: String::new(),
            category: Category::Dinner,
            carbs_g: None,
            fat_g: None,
            nutrition: NutritionSource::default(),
            remembered_manual: ManualNutrition::default(),
        }
    }
}

impl RecipeDraft {
    pub fn from_recipe(recipe: &Recipe) -> Self {
        let manual = ManualNutrition {
            calories_per_serving: recipe.calories(),
            protein_g: recipe.protein(),
        };
        let nutrition = if recipe.ingredients.is_empty() {
            NutritionSource::Manual(manual)
        } else {
            NutritionSource::Derived(recipe.ingredients.clone())
        };
        Self {
            name: recipe.name.clone(),
            description: recipe.description.clone().unwrap_or_default(),
            instructions: recipe.instructions.clone().unwrap_or_default(),
            image_url: recipe.image_url.clone().unwrap_or_default(),
            category: recipe.category,
            carbs_g: recipe.carbs_g,
            fat_g: recipe.fat_g,
            nutrition,
            remembered_manual: manual,
        }
    }

    pub fn nutrition(&self) -> &NutritionSource {
        &self.nutrition
    }

    pub fn totals(&self) -> NutritionTotals {
        self.nutrition.totals()
    }

    pub fn ingredients(&self) -> &[RecipeIngredient] {
        self.nutrition.ingredients()
    }

    pub fn manual_values(&self) -> ManualNutrition {
        match &self.nutrition {
            NutritionSource::Manual(values) => *values,
            NutritionSource::Derived(_) => self.remembered_manual,
        }
    }

    /// Records typed-in values. While ingredients are present they are kept
    /// aside and do not affect the totals.
    pub fn set_manual(&mut self, values: ManualNutrition) {
        self.remembered_manual = values;
        if let NutritionSource::Manual(current) = &mut self.nutrition {
            *current = values;
        }
    }

    pub fn push_ingredient(&mut self, ingredient: RecipeIngredient) {
        match &mut self.nutrition {
            NutritionSource::Manual(values) => {
                self.remembered_manual = *values;
                self.nutrition = NutritionSource::Derived(vec![ingredient]);
            }
            NutritionSource::Derived(list) => list.push(ingredient),
        }
    }

    pub fn remove_ingredient(&mut self, index: usize) -> Option<RecipeIngredient> {
        let NutritionSource::Derived(list) = &mut self.nutrition else {
            return None;
        };
        if index >= list.len() {
            return None;
        }
        let removed = list.remove(index);
        if list.is_empty() {
            self.nutrition = NutritionSource::Manual(self.remembered_manual);
        }
        Some(removed)
    }

    pub fn to_payload(&self) -> RecipePayload {
        let totals = self.totals();
        RecipePayload {
            name: self.name.trim().to_string(),
            description: optional_text(&self.description),
            instructions: self.instructions.clone(),
            image_url: optional_text(&self.image_url),
            category: self.category,
            calories_per_serving: totals.calories,
            protein_g: totals.protein_g,
            carbs_g: self.carbs_g,
            fat_g: self.fat_g,
            ingredients: self.ingredients().to_vec(),
        }
    }
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    TooShort,
    Superseded,
    Results(Vec<Ingredient>),
}

/// Debounced lookup against the ingredient search endpoint. A query that is
/// still waiting out its quiet period is dropped when a newer one arrives.
#[derive(Debug)]
pub struct IngredientSearch {
    debounce: Duration,
    generation: AtomicU64,
    results: Mutex<Vec<Ingredient>>,
}

impl Default for IngredientSearch {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl IngredientSearch {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            generation: AtomicU64::new(0),
            results: Mutex::new(Vec::new()),
        }
    }

    pub async fn query(&self, store: &DataStore, text: &str) -> Result<SearchOutcome, ApiConnectionError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let text = text.trim();
        if text.chars().count() <= MIN_SEARCH_CHARS {
            self.set_results(Vec::new());
            return Ok(SearchOutcome::TooShort);
        }

        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(SearchOutcome::Superseded);
        }

        let found = store.search_ingredients(text).await?;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(SearchOutcome::Superseded);
        }
        self.set_results(found.clone());
        Ok(SearchOutcome::Results(found))
    }

    pub fn results(&self) -> Vec<Ingredient> {
        self.results.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.set_results(Vec::new());
    }

    fn set_results(&self, results: Vec<Ingredient>) {
        if let Ok(mut current) = self.results.lock() {
            *current = results;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(Uuid),
}

pub struct RecipeForm {
    pub draft: RecipeDraft,
    pub search: IngredientSearch,
    mode: FormMode,
    error: Option<String>,
}

impl Default for RecipeForm {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeForm {
    pub fn new() -> Self {
        Self {
            draft: RecipeDraft::default(),
            search: IngredientSearch::default(),
            mode: FormMode::Create,
            error: None,
        }
    }

    pub fn edit(recipe: &Recipe) -> Self {
        Self {
            draft: RecipeDraft::from_recipe(recipe),
            search: IngredientSearch::default(),
            mode: FormMode::Edit(recipe.id),
            error: None,
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Adds the selected search result with the typed gram amount. Anything
    /// but a positive number leaves the form untouched and returns `false`.
    pub fn add_ingredient(&mut self, ingredient: &Ingredient, amount_text: &str) -> bool {
        let Ok(amount_g) = amount_text.trim().parse::<f64>() else {
            return false;
        };
        let Some(entry) = RecipeIngredient::from_catalogue(ingredient, amount_g) else {
            return false;
        };
        self.draft.push_ingredient(entry);
        self.search.clear();
        true
    }

    pub fn remove_ingredient(&mut self, index: usize) -> bool {
        self.draft.remove_ingredient(index).is_some()
    }

    pub async fn submit(&mut self, store: &DataStore) -> Result<Recipe, FormError> {
        self.error = None;
        if self.draft.name.trim().is_empty() {
            return Err(FormError::MissingName);
        }
        let payload = self.draft.to_payload();
        let result = match self.mode {
            FormMode::Create => store.create_recipe(&payload).await,
            FormMode::Edit(id) => store.update_recipe(id, &payload).await,
        };
        match result {
            Ok(saved) => {
                if self.mode == FormMode::Create {
                    self.draft = RecipeDraft::default();
                }
                Ok(saved)
            }
            Err(err) => {
                tracing::warn!(error = %err, "saving recipe failed");
                self.error = Some("Failed to save recipe".to_string());
                Err(FormError::Save(err))
            }
        }
    }

    pub async fn import_text(&mut self, store: &DataStore, text: &str) -> Result<Vec<&'static str>, FormError> {
        self.error = None;
        match store.parse_recipe_text(text).await {
            Ok(parsed) => Ok(parsed.merge_into(&mut self.draft)),
            Err(err) => {
                self.error = Some("Failed to parse recipe text".to_string());
                Err(FormError::Import(err))
            }
        }
    }

    pub async fn upload_image(&mut self, store: &DataStore, path: &Path) -> Result<String, FormError> {
        self.error = None;
        let uploaded: Result<String, ApiConnectionError> = async {
            let bytes = tokio::fs::read(path).await?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("image");
            store.upload_image(file_name, bytes, &image_mime(path)).await
        }
        .await;

        match uploaded {
            Ok(url) => {
                self.draft.image_url = url.clone();
                Ok(url)
            }
            Err(err) => {
                self.error = Some("Failed to upload image".to_string());
                Err(FormError::Upload(err))
            }
        }
    }
}

fn image_mime(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}
