use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{AuthError, AuthProvider, Credentials, Session, User};
use crate::config::{SupabaseConfig, SUPABASE_ANON_KEY_ENV_VAR, SUPABASE_URL_ENV_VAR};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize, Default)]
struct ErrorResponse {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Supabase GoTrue password auth. The session is kept in a JSON file so it
/// survives between runs.
pub struct SupabaseAuth {
    http: Client,
    config: Option<SupabaseConfig>,
    session_path: PathBuf,
}

impl SupabaseAuth {
    pub fn new(config: Option<SupabaseConfig>, session_path: PathBuf) -> Self {
        Self {
            http: Client::new(),
            config,
            session_path,
        }
    }

    fn config(&self) -> Result<&SupabaseConfig, AuthError> {
        self.config
            .as_ref()
            .ok_or(AuthError::MissingConfig(SUPABASE_URL_ENV_VAR))
            .and_then(|c| {
                if c.anon_key.is_empty() {
                    Err(AuthError::MissingConfig(SUPABASE_ANON_KEY_ENV_VAR))
                } else {
                    Ok(c)
                }
            })
    }

    async fn post_auth<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        bearer: Option<&str>,
    ) -> Result<String, AuthError> {
        let config = self.config()?;
        let mut request = self
            .http
            .post(format!("{}/auth/v1/{}", config.url, path))
            .header("apikey", &config.anon_key)
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            let parsed: ErrorResponse = serde_json::from_str(&text).unwrap_or_default();
            let message = parsed
                .error_description
                .or(parsed.msg)
                .or(parsed.message)
                .unwrap_or(text);
            Err(AuthError::Rejected { status, message })
        }
    }

    async fn store(&self, session: Option<&Session>) -> Result<(), AuthError> {
        match session {
            Some(session) => {
                if let Some(parent) = self.session_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&self.session_path, serde_json::to_vec_pretty(session)?).await?;
            }
            None => match tokio::fs::remove_file(&self.session_path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            },
        }
        Ok(())
    }

    /// Trades the refresh token for a new session. The provider may omit the
    /// user on refresh, in which case the stored one is kept.
    async fn refresh(&self, expired: &Session) -> Result<Option<Session>, AuthError> {
        let Some(refresh_token) = expired.refresh_token.as_deref() else {
            return Ok(None);
        };
        let text = self
            .post_auth("token?grant_type=refresh_token", &RefreshRequest { refresh_token }, None)
            .await?;
        let mut response: TokenResponse = serde_json::from_str(&text)?;
        if response.user.is_none() {
            response.user = Some(expired.user.clone());
        }
        Ok(into_session(response))
    }
}

fn into_session(response: TokenResponse) -> Option<Session> {
    Some(Session {
        access_token: response.access_token?,
        refresh_token: response.refresh_token,
        expires_at: response.expires_at,
        user: response.user?,
    })
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let raw = match tokio::fs::read(&self.session_path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let session = match serde_json::from_slice::<Session>(&raw) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, path = %self.session_path.display(), "ignoring unreadable session file");
                return Ok(None);
            }
        };
        if !session.is_expired(Utc::now().timestamp()) {
            return Ok(Some(session));
        }

        match self.refresh(&session).await {
            Ok(Some(renewed)) => {
                tracing::info!(user = %renewed.user.id, "refreshed expired session");
                self.store(Some(&renewed)).await?;
                Ok(Some(renewed))
            }
            Ok(None) => {
                tracing::warn!(user = %session.user.id, "expired session has no refresh token; signing out");
                self.store(None).await?;
                Ok(None)
            }
            Err(AuthError::Network(err)) => {
                // Keep the file so the next run can retry the refresh.
                tracing::warn!(error = %err, "could not reach auth provider to refresh session");
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(error = %err, user = %session.user.id, "session refresh rejected; signing out");
                self.store(None).await?;
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let text = self.post_auth("token?grant_type=password", credentials, None).await?;
        let response: TokenResponse = serde_json::from_str(&text)?;
        let session = into_session(response).ok_or_else(|| AuthError::Rejected {
            status: reqwest::StatusCode::OK,
            message: "sign-in response carried no session".to_string(),
        })?;
        self.store(Some(&session)).await?;
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, AuthError> {
        let text = self.post_auth("signup", credentials, None).await?;
        let response: TokenResponse = serde_json::from_str(&text)?;
        let session = into_session(response);
        if let Some(session) = &session {
            self.store(Some(session)).await?;
        }
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        self.store(None).await?;
        let config = self.config()?;
        let response = self
            .http
            .post(format!("{}/auth/v1/logout", config.url))
            .header("apikey", &config.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(AuthError::Rejected { status, message })
        }
    }
}
