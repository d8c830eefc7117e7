use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError { status: StatusCode, error_body: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the bearer token of the current session, if any.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// A fixed token, mostly useful in tests and scripts.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

enum Body {
    Json(serde_json::Value),
    Multipart(Form),
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiConnectionError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiConnectionError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(Body::Json(body))).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiConnectionError> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(Body::Json(body))).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiConnectionError> {
        self.send(Method::DELETE, path, None).await
    }

    /// Multipart bodies let reqwest set the boundary content type itself.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiConnectionError> {
        self.send(Method::POST, path, Some(Body::Multipart(form))).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let authorization = match self.tokens.access_token() {
            Some(token) => format!("Bearer {}", token),
            None => String::new(),
        };
        self.http.request(method, url).header(AUTHORIZATION, authorization)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
    ) -> Result<T, ApiConnectionError> {
        let mut builder = self.request(method.clone(), path);
        builder = match body {
            Some(Body::Json(value)) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&value)?),
            Some(Body::Multipart(form)) => builder.multipart(form),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        tracing::debug!(%method, path, %status, "api response");

        if status.is_success() {
            let text = response.text().await?;
            if text.trim().is_empty() {
                Ok(serde_json::from_str("null")?)
            } else {
                Ok(serde_json::from_str(&text)?)
            }
        } else {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            Err(ApiConnectionError::ApiError { status, error_body })
        }
    }
}
