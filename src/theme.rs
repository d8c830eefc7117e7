use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    Auto,
}

impl ThemePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
            ThemePreference::Auto => "auto",
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            // Older builds stored "system" for the same behaviour.
            "auto" | "system" => Ok(ThemePreference::Auto),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Light,
    Dark,
}

impl ColorMode {
    fn from_os(prefers_dark: bool) -> Self {
        if prefers_dark {
            ColorMode::Dark
        } else {
            ColorMode::Light
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        })
    }
}

pub fn resolve(preference: ThemePreference, prefers_dark: bool) -> ColorMode {
    match preference {
        ThemePreference::Light => ColorMode::Light,
        ThemePreference::Dark => ColorMode::Dark,
        ThemePreference::Auto => ColorMode::from_os(prefers_dark),
    }
}

/// Small key/value store for client-side preferences.
pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        self.values
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "preference store poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences as one JSON object on disk.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> HashMap<String, String> {
        std::fs::read(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_slice(&raw).ok())
            .unwrap_or_default()
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn save(&self, key: &str, value: &str) -> io::Result<()> {
        let mut all = self.read_all();
        all.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&all)?)
    }
}

/// Light/dark/auto preference reconciled with the OS color scheme.
pub struct ThemeService {
    store: Arc<dyn PreferenceStore>,
    os_prefers_dark: watch::Receiver<bool>,
    preference: ThemePreference,
    mode: Arc<watch::Sender<ColorMode>>,
    os_listener: Option<JoinHandle<()>>,
}

impl ThemeService {
    /// Must be called inside a Tokio runtime: `auto` spawns an OS listener.
    pub fn init(store: Arc<dyn PreferenceStore>, os_prefers_dark: watch::Receiver<bool>) -> Self {
        let preference = store
            .load(THEME_KEY)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        let initial = resolve(preference, *os_prefers_dark.borrow());
        let (mode, _) = watch::channel(initial);
        let mut service = Self {
            store,
            os_prefers_dark,
            preference,
            mode: Arc::new(mode),
            os_listener: None,
        };
        service.apply();
        service
    }

    pub fn preference(&self) -> ThemePreference {
        self.preference
    }

    pub fn mode(&self) -> ColorMode {
        *self.mode.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ColorMode> {
        self.mode.subscribe()
    }

    pub fn set(&mut self, preference: ThemePreference) -> io::Result<()> {
        self.preference = preference;
        self.apply();
        self.store.save(THEME_KEY, preference.as_str())
    }

    pub fn shutdown(&mut self) {
        if let Some(listener) = self.os_listener.take() {
            listener.abort();
        }
    }

    fn apply(&mut self) {
        self.shutdown();
        let resolved = resolve(self.preference, *self.os_prefers_dark.borrow());
        self.mode.send_replace(resolved);
        tracing::debug!(preference = %self.preference, mode = %resolved, "theme applied");

        if self.preference == ThemePreference::Auto {
            let mut os = self.os_prefers_dark.clone();
            let mode = Arc::clone(&self.mode);
            self.os_listener = Some(tokio::spawn(async move {
                while os.changed().await.is_ok() {
                    let prefers_dark = *os.borrow_and_update();
                    mode.send_replace(ColorMode::from_os(prefers_dark));
                }
            }));
        }
    }
}

impl Drop for ThemeService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn next_mode(rx: &mut watch::Receiver<ColorMode>) -> ColorMode {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("mode did not change")
            .unwrap();
        *rx.borrow_and_update()
    }

    #[tokio::test]
    async fn test_defaults_to_auto_and_follows_dark_os() {
        let (_os, os_rx) = watch::channel(true);
        let theme = ThemeService::init(Arc::new(MemoryPreferenceStore::default()), os_rx);
        assert_eq!(theme.preference(), ThemePreference::Auto);
        assert_eq!(theme.mode(), ColorMode::Dark);
    }

    #[tokio::test]
    async fn test_auto_reresolves_when_os_flips() {
        let (os, os_rx) = watch::channel(true);
        let theme = ThemeService::init(Arc::new(MemoryPreferenceStore::default()), os_rx);
        let mut modes = theme.subscribe();

        os.send(false).unwrap();
        assert_eq!(next_mode(&mut modes).await, ColorMode::Light);
        os.send(true).unwrap();
        assert_eq!(next_mode(&mut modes).await, ColorMode::Dark);
    }

    #[tokio::test]
    async fn test_explicit_theme_ignores_os_and_persists_raw_value() {
        let store = Arc::new(MemoryPreferenceStore::default());
        let (os, os_rx) = watch::channel(true);
        let mut theme = ThemeService::init(store.clone(), os_rx);

        theme.set(ThemePreference::Light).unwrap();
        assert_eq!(theme.mode(), ColorMode::Light);
        assert_eq!(store.load(THEME_KEY).as_deref(), Some("light"));

        os.send(false).unwrap();
        os.send(true).unwrap();
        tokio::task::yield_now().await;
        assert_eq!(theme.mode(), ColorMode::Light);

        theme.set(ThemePreference::Auto).unwrap();
        assert_eq!(theme.mode(), ColorMode::Dark);
        assert_eq!(store.load(THEME_KEY).as_deref(), Some("auto"));
    }

    #[tokio::test]
    async fn test_initial_preference_comes_from_store() {
        let store = Arc::new(MemoryPreferenceStore::default());
        store.save(THEME_KEY, "dark").unwrap();
        let (_os, os_rx) = watch::channel(false);
        let theme = ThemeService::init(store, os_rx);
        assert_eq!(theme.preference(), ThemePreference::Dark);
        assert_eq!(theme.mode(), ColorMode::Dark);
    }

    #[tokio::test]
    async fn test_unknown_stored_value_falls_back_to_auto() {
        let store = Arc::new(MemoryPreferenceStore::default());
        store.save(THEME_KEY, "sepia").unwrap();
        let (_os, os_rx) = watch::channel(false);
        let theme = ThemeService::init(store, os_rx);
        assert_eq!(theme.preference(), ThemePreference::Auto);
    }

    #[test]
    fn test_file_store_round_trips_multiple_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs").join("preferences.json"));
        assert_eq!(store.load(THEME_KEY), None);
        store.save(THEME_KEY, "dark").unwrap();
        store.save("week_start", "mon").unwrap();
        assert_eq!(store.load(THEME_KEY).as_deref(), Some("dark"));
        assert_eq!(store.load("week_start").as_deref(), Some("mon"));
    }
}
