use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::io::Write;

use crate::planner::Planner;

const HEADER: [&str; 5] = ["date", "meal_type", "recipe", "calories", "protein_g"];
const TOTAL_ROW: &str = "TOTAL";

/// Writes the planner's current week: every booked entry in grid order,
/// followed by one TOTAL row per day.
pub fn write_week_csv<W: Write>(writer: W, planner: &Planner) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(HEADER).context("Failed to write CSV header")?;

    let grid = planner.grid();
    for column in &grid {
        let date = column.date.to_string();
        for (meal_type, _) in &column.slots {
            for entry in planner.entries_for_slot(column.date, *meal_type) {
                let (calories, protein) = entry
                    .recipe
                    .as_ref()
                    .map(|r| (r.calories(), r.protein()))
                    .unwrap_or((0, 0.0));
                let calories = calories.to_string();
                let protein = format!("{:.1}", protein);
                wtr.write_record([
                    date.as_str(),
                    meal_type.as_str(),
                    entry.recipe_name(),
                    calories.as_str(),
                    protein.as_str(),
                ])
                .with_context(|| format!("Failed to write meal row for {}", date))?;
            }
        }
    }

    for column in &grid {
        let date = column.date.to_string();
        let calories = column.nutrition.calories.to_string();
        let protein = format!("{:.1}", column.nutrition.protein_g);
        wtr.write_record([date.as_str(), TOTAL_ROW, "", calories.as_str(), protein.as_str()])
            .with_context(|| format!("Failed to write total row for {}", column.date))?;
    }

    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MealPlanEntry, MealType, Recipe};
    use chrono::{NaiveDate, Weekday};
    use uuid::Uuid;

    fn entry(date: NaiveDate, meal_type: MealType, name: &str, calories: i64, protein: f64) -> MealPlanEntry {
        let recipe: Recipe = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": name,
            "category": "Breakfast",
            "calories_per_serving": calories,
            "protein_g": protein
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
    fn test_writes_meal_rows_then_daily_totals() {
        let monday = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let mut planner = Planner::new(monday, Weekday::Mon).unwrap();
        let request = planner.begin_fetch();
        planner.complete_fetch(
            request,
            vec![
                entry(monday, MealType::Dinner, "Stew, beef", 700, 40.0),
                entry(monday, MealType::Breakfast, "Pancakes", 435, 17.0),
            ],
        );

        let mut out = Vec::new();
        write_week_csv(&mut out, &planner).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "date,meal_type,recipe,calories,protein_g");
        assert_eq!(lines[1], "2024-06-10,Breakfast,Pancakes,435,17.0");
        assert_eq!(lines[2], "2024-06-10,Dinner,\"Stew, beef\",700,40.0");
        assert_eq!(lines[3], "2024-06-10,TOTAL,,1135,57.0");
        assert_eq!(lines[4], "2024-06-11,TOTAL,,0,0.0");
        assert_eq!(lines.len(), 1 + 2 + 7);
    }

    #[test]
    fn test_empty_week_still_has_seven_total_rows() {
        let planner = Planner::new(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(), Weekday::Sun).unwrap();
        let mut out = Vec::new();
        write_week_csv(&mut out, &planner).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 8);
        assert!(text.lines().nth(1).unwrap().starts_with("2024-06-09,TOTAL"));
    }
}
