use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::catalogue::SortOrder;
use crate::models::{Category, MealType};
use crate::theme::ThemePreference;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan weekly meals against the meal planner backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in, sign up or sign out
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Browse and edit the recipe catalogue
    #[command(subcommand)]
    Recipes(RecipeCommand),
    /// Browse the ingredient catalogue
    #[command(subcommand)]
    Ingredients(IngredientCommand),
    /// Weekly meal planner
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Today's meals, nutrition and the next two days
    Today {
        /// Day to show instead of today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Show the recipe behind one of the day's meals (read-only)
        #[arg(long, value_name = "ENTRY_ID")]
        show: Option<Uuid>,
    },
    /// Light/dark/auto theme
    #[command(subcommand)]
    Theme(ThemeCommand),
}

/// The password is always read from the terminal, never from argv.
#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    #[arg(long)]
    pub email: String,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    SignIn(CredentialArgs),
    SignUp(CredentialArgs),
    SignOut,
    /// Show the signed-in user
    Status,
}

/// Fields shared by `recipes create` and `recipes edit`. Unset fields keep
/// their current value when editing.
#[derive(Args, Debug, Clone, Default)]
pub struct RecipeFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub instructions: Option<String>,
    #[arg(long, value_enum)]
    pub category: Option<Category>,
    /// Local image to upload
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Manual calories per serving, used while no ingredients are listed
    #[arg(long)]
    pub calories: Option<f64>,
    /// Manual protein per serving in grams
    #[arg(long)]
    pub protein: Option<f64>,
    /// Catalogue ingredient and amount in grams, e.g. `flour=120`
    #[arg(long = "ingredient", value_name = "NAME=GRAMS")]
    pub ingredients: Vec<String>,
    /// Free-text recipe file to pre-fill the form through the parse service
    #[arg(long)]
    pub import: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum RecipeCommand {
    List {
        #[arg(long, value_enum)]
        category: Option<Category>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = SortOrder::MostUsed)]
        sort: SortOrder,
    },
    Show {
        id: Uuid,
    },
    Create(RecipeFields),
    Edit {
        id: Uuid,
        #[command(flatten)]
        fields: RecipeFields,
    },
    Delete {
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Add a recipe to the meal plan
    Plan {
        id: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_enum)]
        meal_type: MealType,
    },
}

#[derive(Subcommand, Debug)]
pub enum IngredientCommand {
    List {
        /// Case-insensitive substring filter on the name
        #[arg(long)]
        filter: Option<String>,
    },
    Search {
        query: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    Week {
        /// Any day inside the week to show (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Weeks to page forward (negative pages back)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i32,
    },
    Add {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_enum)]
        meal_type: MealType,
        #[arg(long)]
        recipe: Uuid,
    },
    Remove {
        id: Uuid,
        /// Week the meal belongs to (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        yes: bool,
    },
    /// Write the week as CSV to a file or stdout
    Export {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ThemeCommand {
    Show,
    Set {
        #[arg(value_enum)]
        preference: ThemePreference,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Splits `name=grams`. The amount is left as text so the form can reject it.
pub fn split_ingredient_arg(raw: &str) -> Option<(&str, &str)> {
    let (name, amount) = raw.rsplit_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some((name, amount.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sign_in_takes_no_password_argument() {
        let cli = Cli::try_parse_from(["meal-planner", "auth", "sign-in", "--email", "cook@example.com"]).unwrap();
        assert!(matches!(cli.command, Command::Auth(AuthCommand::SignIn(ref args)) if args.email == "cook@example.com"));
        assert!(Cli::try_parse_from([
            "meal-planner", "auth", "sign-in", "--email", "cook@example.com", "--password", "hunter22",
        ])
        .is_err());
    }

    #[test]
    fn test_parses_plan_add() {
        let cli = Cli::try_parse_from([
            "meal-planner", "plan", "add", "--date", "2024-06-10", "--meal-type", "breakfast",
            "--recipe", "6f1c2a4e-8d7b-4c1e-9a3f-2b5d7e9c1a04",
        ])
        .unwrap();
        match cli.command {
            Command::Plan(PlanCommand::Add { date, meal_type, .. }) => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
                assert_eq!(meal_type, MealType::Breakfast);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parses_repeated_ingredients_and_negative_offset() {
        let cli = Cli::try_parse_from([
            "meal-planner", "recipes", "create", "--name", "Pancakes",
            "--ingredient", "flour=120", "--ingredient", "milk=200",
        ])
        .unwrap();
        match cli.command {
            Command::Recipes(RecipeCommand::Create(fields)) => assert_eq!(fields.ingredients.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["meal-planner", "plan", "week", "--offset", "-1"]).unwrap();
        assert!(matches!(cli.command, Command::Plan(PlanCommand::Week { offset: -1, .. })));
    }

    #[test]
    fn test_today_show_takes_an_entry_id() {
        let cli = Cli::try_parse_from([
            "meal-planner", "today", "--show", "0b9e4d3c-1f2a-4b5c-8d7e-6a5b4c3d2e1f",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Today { date: None, show: Some(_) }));
        assert!(Cli::try_parse_from(["meal-planner", "today", "--show", "stew"]).is_err());
    }

    #[test]
    fn test_split_ingredient_arg() {
        assert_eq!(split_ingredient_arg("flour = 120"), Some(("flour", "120")));
        assert_eq!(split_ingredient_arg("a=b=5"), Some(("a=b", "5")));
        assert_eq!(split_ingredient_arg("flour"), None);
        assert_eq!(split_ingredient_arg("=5"), None);
    }
}
