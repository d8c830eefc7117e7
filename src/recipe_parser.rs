use serde::{Deserialize, Serialize};

use crate::models::Category;
use crate::nutrition::round_half_up;
use crate::recipe_form::RecipeDraft;

/// Structured fields returned by `POST /recipes/parse`. Every field is
/// optional; the model may leave out anything it could not find.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ParsedRecipe {
    #[serde(default, alias = "title")]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub calories_per_serving: Option<f64>,
    #[serde(default)]
    pub protein_g: Option<f64>,
}

impl ParsedRecipe {
    /// Copies every field the parser returned onto the draft; fields it
    /// omitted keep their current draft value. Returns the names of the
    /// fields that were applied.
    pub fn merge_into(&self, draft: &mut RecipeDraft) -> Vec<&'static str> {
        let mut applied = Vec::new();

        if let Some(name) = non_blank(&self.name) {
            draft.name = name;
            applied.push("name");
        }
        if let Some(description) = non_blank(&self.description) {
            draft.description = description;
            applied.push("description");
        }
        if let Some(instructions) = non_blank(&self.instructions) {
            draft.instructions = instructions;
            applied.push("instructions");
        }
        if let Some(image_url) = non_blank(&self.image_url) {
            draft.image_url = image_url;
            applied.push("image_url");
        }
        if let Some(category) = self.category.as_deref().and_then(|c| c.parse::<Category>().ok()) {
            draft.category = category;
            applied.push("category");
        }

        if self.calories_per_serving.is_some() || self.protein_g.is_some() {
            let mut manual = draft.manual_values();
            if let Some(calories) = self.calories_per_serving.filter(|c| c.is_finite()) {
                manual.calories_per_serving = round_half_up(calories);
                applied.push("calories_per_serving");
            }
            if let Some(protein) = self.protein_g.filter(|p| p.is_finite()) {
                manual.protein_g = protein;
                applied.push("protein_g");
            }
            draft.set_manual(manual);
        }

        applied
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
