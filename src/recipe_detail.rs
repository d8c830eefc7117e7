use thiserror::Error;

use crate::api_connection::ApiConnectionError;
use crate::confirm::Confirm;
use crate::models::Recipe;
use crate::recipe_form::{FormError, RecipeForm};
use crate::store::DataStore;

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("this recipe is shown read-only")]
    ReadOnly,
    #[error("Failed to delete recipe: {0}")]
    Delete(#[from] ApiConnectionError),
    #[error(transparent)]
    Edit(#[from] FormError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Cancelled,
    Closed,
    Updated(Recipe),
}

/// Read view of one recipe plus its delete and edit actions.
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    view_only: bool,
}

impl RecipeDetail {
    pub fn new(recipe: Recipe) -> Self {
        Self { recipe, view_only: false }
    }

    pub fn view_only(recipe: Recipe) -> Self {
        Self { recipe, view_only: true }
    }

    pub async fn delete(&self, store: &DataStore, confirm: &dyn Confirm) -> Result<DetailOutcome, DetailError> {
        if self.view_only {
            return Err(DetailError::ReadOnly);
        }
        if !confirm.confirm(&format!("Are you sure you want to delete \"{}\"?", self.recipe.name)) {
            return Ok(DetailOutcome::Cancelled);
        }
        store.delete_recipe(self.recipe.id).await?;
        Ok(DetailOutcome::Closed)
    }

    pub fn edit(&self) -> Result<RecipeForm, DetailError> {
        if self.view_only {
            return Err(DetailError::ReadOnly);
        }
        Ok(RecipeForm::edit(&self.recipe))
    }

    pub async fn finish_edit(&mut self, form: &mut RecipeForm, store: &DataStore) -> Result<DetailOutcome, DetailError> {
        let saved = form.submit(store).await?;
        self.recipe = saved.clone();
        Ok(DetailOutcome::Updated(saved))
    }
}
