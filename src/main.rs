use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use std::io;
use std::time::Duration;
use uuid::Uuid;

use meal_planner::app::{App, Screen};
use meal_planner::auth::Credentials;
use meal_planner::catalogue::{add_to_plan, filter_ingredients, CatalogueQuery};
use meal_planner::cli::{
    parse_args, split_ingredient_arg, AuthCommand, Command, IngredientCommand, PlanCommand, RecipeCommand,
    RecipeFields, ThemeCommand,
};
use meal_planner::config::AppConfig;
use meal_planner::confirm::{read_password, Confirm, Fixed, StdinConfirm};
use meal_planner::export::write_week_csv;
use meal_planner::models::{Ingredient, Recipe};
use meal_planner::nutrition::round_half_up;
use meal_planner::planner::Planner;
use meal_planner::recipe_detail::{DetailOutcome, RecipeDetail};
use meal_planner::recipe_form::{IngredientSearch, RecipeForm, SearchOutcome};
use meal_planner::store::DataStore;
use meal_planner::today;

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "meal_planner=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    // stdout carries command output; logs go to stderr.
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    }
}

fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(Fixed(true))
    } else {
        Box::new(StdinConfirm)
    }
}

fn require(app: &App, screen: Screen) -> Result<()> {
    if app.screen(screen) == Screen::SignIn {
        bail!("Not signed in. Run `meal-planner auth sign-in --email <EMAIL>` first.");
    }
    Ok(())
}

fn print_recipe_line(recipe: &Recipe) {
    println!(
        "{}  {:<30} {:<9} {:>5} kcal {:>6.1} g protein  used {}x",
        recipe.id,
        recipe.name,
        recipe.category,
        recipe.calories(),
        recipe.protein(),
        recipe.usage()
    );
}

fn print_recipe(recipe: &Recipe) {
    println!("{} ({})", recipe.name, recipe.category);
    println!("  id: {}", recipe.id);
    if let Some(description) = &recipe.description {
        println!("  {}", description);
    }
    println!("  {} kcal, {:.1} g protein per serving", recipe.calories(), recipe.protein());
    if let Some(url) = &recipe.image_url {
        println!("  image: {}", url);
    }
    if !recipe.ingredients.is_empty() {
        println!("  ingredients:");
        for ingredient in &recipe.ingredients {
            println!("    - {} {} g", ingredient.name, ingredient.amount_g);
        }
    }
    if let Some(instructions) = recipe.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
        println!("  instructions:\n{}", instructions);
    }
}

async fn fill_form(form: &mut RecipeForm, store: &DataStore, fields: &RecipeFields) -> Result<()> {
    if let Some(path) = &fields.import {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read recipe file '{}'", path.display()))?;
        println!("Sending recipe text to the parser...");
        let filled = form.import_text(store, &text).await?;
        println!("Filled from text: {}", filled.join(", "));
    }

    let draft = &mut form.draft;
    if let Some(name) = &fields.name {
        draft.name = name.clone();
    }
    if let Some(description) = &fields.description {
        draft.description = description.clone();
    }
    if let Some(instructions) = &fields.instructions {
        draft.instructions = instructions.clone();
    }
    if let Some(category) = fields.category {
        draft.category = category;
    }
    if fields.calories.is_some() || fields.protein.is_some() {
        let mut manual = draft.manual_values();
        if let Some(calories) = fields.calories {
            manual.calories_per_serving = round_half_up(calories);
        }
        if let Some(protein) = fields.protein {
            manual.protein_g = protein;
        }
        draft.set_manual(manual);
    }

    for raw in &fields.ingredients {
        let (name, amount) =
            split_ingredient_arg(raw).ok_or_else(|| anyhow!("Expected NAME=GRAMS, got '{}'", raw))?;
        let found = store
            .search_ingredients(name)
            .await
            .with_context(|| format!("Ingredient search for '{}' failed", name))?;
        let ingredient = found
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
            .or_else(|| found.first())
            .ok_or_else(|| anyhow!("No catalogue ingredient matches '{}'", name))?;
        if !form.add_ingredient(ingredient, amount) {
            bail!("Amount for '{}' must be a positive number of grams, got '{}'", name, amount);
        }
    }

    if let Some(path) = &fields.image {
        let url = form.upload_image(store, path).await?;
        println!("Uploaded image: {}", url);
    }
    Ok(())
}

async fn load_recipe(store: &DataStore, id: Uuid) -> Result<Recipe> {
    store
        .recipe(id)
        .await
        .context("Failed to load recipes")?
        .ok_or_else(|| anyhow!("No recipe with id {}", id))
}

async fn run_auth(app: &App, command: AuthCommand) -> Result<()> {
    match command {
        AuthCommand::SignIn(args) => {
            let password = read_password(false).context("Failed to read password")?;
            let credentials = Credentials { email: args.email, password };
            let user = app.auth.sign_in(&credentials).await.context("Sign-in failed")?;
            println!("Signed in as {}", user.email.as_deref().unwrap_or(&user.id));
        }
        AuthCommand::SignUp(args) => {
            let password = read_password(true).context("Failed to read password")?;
            let credentials = Credentials { email: args.email, password };
            match app.auth.sign_up(&credentials).await.context("Sign-up failed")? {
                Some(user) => println!("Signed up and signed in as {}", user.email.as_deref().unwrap_or(&user.id)),
                None => println!("Check {} for a confirmation link, then sign in.", credentials.email),
            }
        }
        AuthCommand::SignOut => {
            app.auth.sign_out().await.context("Sign-out failed")?;
            println!("Signed out.");
        }
        AuthCommand::Status => match app.auth.user() {
            Some(user) => println!("Signed in as {} ({})", user.email.as_deref().unwrap_or("no email"), user.id),
            None => println!("Not signed in."),
        },
    }
    Ok(())
}

async fn run_recipes(app: &App, command: RecipeCommand) -> Result<()> {
    require(app, Screen::Recipes)?;
    let store = &app.store;
    match command {
        RecipeCommand::List { category, search, sort } => {
            let recipes = store.recipes().await.context("Failed to load recipes")?;
            let query = CatalogueQuery {
                category,
                search: search.unwrap_or_default(),
                sort,
            };
            let visible = query.apply(&recipes);
            if visible.is_empty() {
                println!("No recipes found.");
            }
            for recipe in visible {
                print_recipe_line(recipe);
            }
        }
        RecipeCommand::Show { id } => {
            let detail = RecipeDetail::new(load_recipe(store, id).await?);
            print_recipe(&detail.recipe);
        }
        RecipeCommand::Create(fields) => {
            let mut form = RecipeForm::new();
            fill_form(&mut form, store, &fields).await?;
            let saved = form.submit(store).await?;
            println!("Created recipe:");
            print_recipe(&saved);
        }
        RecipeCommand::Edit { id, fields } => {
            let mut detail = RecipeDetail::new(load_recipe(store, id).await?);
            let mut form = detail.edit()?;
            fill_form(&mut form, store, &fields).await?;
            if let DetailOutcome::Updated(saved) = detail.finish_edit(&mut form, store).await? {
                println!("Updated recipe:");
                print_recipe(&saved);
            }
        }
        RecipeCommand::Delete { id, yes } => {
            let detail = RecipeDetail::new(load_recipe(store, id).await?);
            match detail.delete(store, confirmer(yes).as_ref()).await? {
                DetailOutcome::Cancelled => println!("Kept \"{}\".", detail.recipe.name),
                _ => println!("Deleted \"{}\".", detail.recipe.name),
            }
        }
        RecipeCommand::Plan { id, date, meal_type } => {
            let entry = add_to_plan(store, id, date, meal_type)
                .await
                .context("Failed to add recipe to the meal plan")?;
            println!("Planned recipe {} for {} on {} ({})", entry.recipe_id, meal_type, date, entry.id);
        }
    }
    Ok(())
}

async fn run_ingredients(app: &App, command: IngredientCommand) -> Result<()> {
    require(app, Screen::Recipes)?;
    let store = &app.store;
    let found: Vec<Ingredient> = match command {
        IngredientCommand::List { filter } => {
            let all = store.ingredients().await.context("Failed to load ingredients")?;
            filter_ingredients(&all, filter.as_deref().unwrap_or(""))
                .into_iter()
                .cloned()
                .collect()
        }
        IngredientCommand::Search { query } => {
            match IngredientSearch::new(Duration::ZERO).query(store, &query).await? {
                SearchOutcome::Results(found) => found,
                SearchOutcome::TooShort => bail!("Search needs more than 2 characters"),
                SearchOutcome::Superseded => Vec::new(),
            }
        }
    };
    if found.is_empty() {
        println!("No ingredients found.");
    }
    for ingredient in found {
        println!(
            "{:<30} {:>6.2} kcal/g {:>6.3} g protein/g  {}",
            ingredient.name,
            ingredient.calories_per_g,
            ingredient.protein_per_g,
            ingredient.api_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn load_planner(app: &App, date: NaiveDate) -> Result<Planner> {
    let mut planner = Planner::new(date, app.config.week_start)?;
    planner.refresh(&app.store).await.context("Failed to load the meal plan")?;
    Ok(planner)
}

fn print_week(planner: &Planner) {
    let week = planner.week();
    println!("Week of {} to {}", week.start, week.end());
    for column in planner.grid() {
        println!(
            "\n{}  {} kcal, {:.1} g protein",
            column.date.format("%a %Y-%m-%d"),
            column.nutrition.calories,
            column.nutrition.protein_g
        );
        for (meal_type, entry) in column.slots {
            match entry {
                Some(entry) => {
                    let extra = planner.entries_for_slot(column.date, meal_type).len() - 1;
                    let more = if extra > 0 { format!(" (+{} more)", extra) } else { String::new() };
                    println!("  {:<9} {}{}  [{}]", meal_type, entry.recipe_name(), more, entry.id);
                }
                None => println!("  {:<9} -", meal_type),
            }
        }
    }
}

async fn run_plan(app: &App, command: PlanCommand) -> Result<()> {
    require(app, Screen::Planner)?;
    let today = Local::now().date_naive();
    match command {
        PlanCommand::Week { date, offset } => {
            let mut planner = Planner::new(date.unwrap_or(today), app.config.week_start)?;
            for _ in 0..offset.unsigned_abs() {
                if offset > 0 {
                    planner.next_week()?;
                } else {
                    planner.previous_week()?;
                }
            }
            planner.refresh(&app.store).await.context("Failed to load the meal plan")?;
            print_week(&planner);
        }
        PlanCommand::Add { date, meal_type, recipe } => {
            let mut planner = Planner::new(date, app.config.week_start)?;
            let entry = planner
                .add_meal(&app.store, date, meal_type, recipe)
                .await
                .context("Failed to add meal")?;
            println!("Added recipe {} to {} on {} ({})", entry.recipe_id, meal_type, date, entry.id);
        }
        PlanCommand::Remove { id, date, yes } => {
            let mut planner = load_planner(app, date.unwrap_or(today)).await?;
            if planner.remove_meal(&app.store, id, confirmer(yes).as_ref()).await? {
                println!("Removed meal {}.", id);
            } else {
                println!("Kept meal {}.", id);
            }
        }
        PlanCommand::Export { date, output } => {
            let planner = load_planner(app, date.unwrap_or(today)).await?;
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create '{}'", path.display()))?;
                    write_week_csv(file, &planner)?;
                    println!("Wrote {}", path.display());
                }
                None => write_week_csv(io::stdout().lock(), &planner)?,
            }
        }
    }
    Ok(())
}

async fn run_today(app: &App, date: Option<NaiveDate>, show: Option<Uuid>) -> Result<()> {
    require(app, Screen::Today)?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let summary = today::load(&app.store, date).await.context("Failed to load today's meals")?;

    if let Some(entry_id) = show {
        let detail = summary
            .open(entry_id)
            .with_context(|| format!("No meal {} planned for {}", entry_id, date))?;
        print_recipe(&detail.recipe);
        return Ok(());
    }

    println!("{}", date.format("%A, %B %-d"));
    println!("{} kcal, {:.1} g protein", summary.totals.calories, summary.totals.protein_g);
    if summary.is_empty() {
        println!("\nNo meals planned for today.");
    }
    for (meal_type, entries) in &summary.by_meal_type {
        println!("\n{}", meal_type);
        for entry in entries {
            let calories = entry.recipe.as_ref().map(|r| r.calories()).unwrap_or(0);
            println!("  {}  {} kcal  [{}]", entry.recipe_name(), calories, entry.id);
        }
    }
    println!("\nComing up");
    for day in &summary.upcoming {
        let names = if day.recipe_names.is_empty() {
            "nothing planned".to_string()
        } else {
            day.recipe_names.join(", ")
        };
        println!("  {}  {} meals: {}", day.date.format("%a %Y-%m-%d"), day.meal_count, names);
    }
    Ok(())
}

fn run_theme(app: &mut App, command: ThemeCommand) -> Result<()> {
    if let ThemeCommand::Set { preference } = command {
        app.theme.set(preference).context("Failed to save theme preference")?;
    }
    let mode = app.theme.mode();
    println!("theme: {} (showing {})", app.theme.preference(), mode);
    Ok(())
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Auth(command) => run_auth(app, command).await,
        Command::Recipes(command) => run_recipes(app, command).await,
        Command::Ingredients(command) => run_ingredients(app, command).await,
        Command::Plan(command) => run_plan(app, command).await,
        Command::Today { date, show } => run_today(app, date, show).await,
        Command::Theme(command) => run_theme(app, command),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = parse_args();
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let mut app = App::init(config).await?;

    let result = run(&mut app, cli.command).await;
    app.shutdown();
    result
}
