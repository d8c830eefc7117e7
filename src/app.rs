use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;

use crate::api_connection::ApiClient;
use crate::auth::{AuthProvider, AuthService, SupabaseAuth};
use crate::cache::CachePolicy;
use crate::config::AppConfig;
use crate::store::DataStore;
use crate::theme::{FilePreferenceStore, ThemeService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SignIn,
    Today,
    Recipes,
    Planner,
}

/// Process-wide services, built once at start-up.
pub struct App {
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub store: DataStore,
    pub theme: ThemeService,
    // Held so the auto theme listener keeps running for the process lifetime.
    _os_prefers_dark: watch::Sender<bool>,
}

impl App {
    pub async fn init(config: AppConfig) -> Result<Self> {
        let provider = Arc::new(SupabaseAuth::new(config.supabase.clone(), config.session_path()));
        Self::with_provider(config, provider).await
    }

    pub async fn with_provider(config: AppConfig, provider: Arc<dyn AuthProvider>) -> Result<Self> {
        let auth = AuthService::init(provider)
            .await
            .context("Failed to restore auth session")?;

        let client = ApiClient::new(config.api_url.clone(), auth.clone());
        let policy = CachePolicy {
            recipes_stale_after: config.recipes_stale_after,
            ..CachePolicy::default()
        };
        let store = DataStore::new(client, policy);

        let (os_prefers_dark, os_rx) = watch::channel(config.prefers_dark);
        let preferences = Arc::new(FilePreferenceStore::new(config.preferences_path()));
        let theme = ThemeService::init(preferences, os_rx);

        tracing::debug!(api_url = %config.api_url, signed_in = auth.is_signed_in(), "app initialised");
        Ok(Self {
            config,
            auth,
            store,
            theme,
            _os_prefers_dark: os_prefers_dark,
        })
    }

    /// Every screen sits behind a signed-in user.
    pub fn screen(&self, requested: Screen) -> Screen {
        if self.auth.is_signed_in() {
            requested
        } else {
            Screen::SignIn
        }
    }

    pub fn shutdown(&mut self) {
        self.theme.shutdown();
    }
}
