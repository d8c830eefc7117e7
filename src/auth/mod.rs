pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::api_connection::TokenSource;

pub use supabase::SupabaseAuth;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth provider is not configured: {0} is missing")]
    MissingConfig(&'static str),
    #[error("auth provider rejected the request ({status}): {message}")]
    Rejected { status: reqwest::StatusCode, message: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// Sessions without an expiry never expire locally.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// The external identity service. Implementations own session persistence.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;
    /// `None` when the provider wants the address confirmed before signing in.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<Session>, AuthError>;
    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;
}

/// Signed-in state for the whole process. Doubles as the API client's
/// token source.
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    session: watch::Sender<Option<Session>>,
}

impl AuthService {
    pub async fn init(provider: Arc<dyn AuthProvider>) -> Result<Arc<Self>, AuthError> {
        let session = provider.current_session().await?;
        if let Some(s) = &session {
            tracing::info!(user = %s.user.id, "restored session");
        }
        let (tx, _) = watch::channel(session);
        Ok(Arc::new(Self { provider, session: tx }))
    }

    pub fn user(&self) -> Option<User> {
        self.session.borrow().as_ref().map(|s| s.user.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Fires on every sign-in, sign-up with session, and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let session = self.provider.sign_in(credentials).await?;
        let user = session.user.clone();
        tracing::info!(user = %user.id, "signed in");
        self.session.send_replace(Some(session));
        Ok(user)
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<Option<User>, AuthError> {
        match self.provider.sign_up(credentials).await? {
            Some(session) => {
                let user = session.user.clone();
                tracing::info!(user = %user.id, "signed up");
                self.session.send_replace(Some(session));
                Ok(Some(user))
            }
            None => {
                tracing::info!(email = %credentials.email, "sign-up awaiting email confirmation");
                Ok(None)
            }
        }
    }

    /// The local session is cleared even if the provider call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.session.send_replace(None);
        match previous {
            Some(session) => {
                tracing::info!(user = %session.user.id, "signed out");
                self.provider.sign_out(&session).await
            }
            None => Ok(()),
        }
    }
}

impl TokenSource for AuthService {
    fn access_token(&self) -> Option<String> {
        self.session.borrow().as_ref().map(|s| s.access_token.clone())
    }
}
