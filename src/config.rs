use anyhow::{anyhow, Context, Result};
use chrono::Weekday;
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const API_URL_ENV_VAR: &str = "MEAL_PLANNER_API_URL";
pub const SUPABASE_URL_ENV_VAR: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV_VAR: &str = "SUPABASE_ANON_KEY";
pub const WEEK_START_ENV_VAR: &str = "MEAL_PLANNER_WEEK_START";
pub const RECIPES_STALE_ENV_VAR: &str = "MEAL_PLANNER_RECIPES_STALE_SECS";
pub const DATA_DIR_ENV_VAR: &str = "MEAL_PLANNER_DATA_DIR";
pub const PREFERS_DARK_ENV_VAR: &str = "MEAL_PLANNER_PREFERS_DARK";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_RECIPES_STALE_SECS: u64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub supabase: Option<SupabaseConfig>,
    pub week_start: Weekday,
    pub recipes_stale_after: Duration,
    pub data_dir: PathBuf,
    pub prefers_dark: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let api_url = env::var(API_URL_ENV_VAR)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let supabase = match (env::var(SUPABASE_URL_ENV_VAR), env::var(SUPABASE_ANON_KEY_ENV_VAR)) {
            (Ok(url), Ok(anon_key)) => Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
            }),
            _ => None,
        };

        let week_start = match env::var(WEEK_START_ENV_VAR) {
            Ok(raw) => parse_weekday(&raw)
                .with_context(|| format!("Invalid value for {}", WEEK_START_ENV_VAR))?,
            Err(_) => Weekday::Sun,
        };

        let recipes_stale_after = match env::var(RECIPES_STALE_ENV_VAR) {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid value for {}: '{}'", RECIPES_STALE_ENV_VAR, raw))?,
            ),
            Err(_) => Duration::from_secs(DEFAULT_RECIPES_STALE_SECS),
        };

        let data_dir = match env::var(DATA_DIR_ENV_VAR) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .or_else(dirs::home_dir)
                .ok_or_else(|| anyhow!("Could not determine a data directory; set {}", DATA_DIR_ENV_VAR))?
                .join("meal-planner"),
        };

        let prefers_dark = env::var(PREFERS_DARK_ENV_VAR)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "dark"))
            .unwrap_or(false);

        Ok(Self {
            api_url,
            supabase,
            week_start,
            recipes_stale_after,
            data_dir,
            prefers_dark,
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }
}

/// Accepts full or abbreviated English weekday names, case-insensitively.
pub fn parse_weekday(raw: &str) -> Result<Weekday> {
    raw.trim()
        .parse::<Weekday>()
        .map_err(|_| anyhow!("'{}' is not a weekday (expected e.g. 'sun' or 'monday')", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weekday_accepts_short_and_long_names() {
        assert_eq!(parse_weekday("sun").unwrap(), Weekday::Sun);
        assert_eq!(parse_weekday("Monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday(" SAT ").unwrap(), Weekday::Sat);
    }

    #[test]
    fn test_parse_weekday_rejects_garbage() {
        assert!(parse_weekday("someday").is_err());
    }

    #[test]
    fn test_paths_live_under_data_dir() {
        let config = AppConfig {
            api_url: DEFAULT_API_URL.to_string(),
            supabase: None,
            week_start: Weekday::Sun,
            recipes_stale_after: Duration::from_secs(300),
            data_dir: PathBuf::from("/tmp/mp"),
            prefers_dark: false,
        };
        assert_eq!(config.session_path(), PathBuf::from("/tmp/mp/session.json"));
        assert_eq!(config.preferences_path(), PathBuf::from("/tmp/mp/preferences.json"));
    }
}
