use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::error::ApiError;

/// Source of the bearer credential attached to every request.
///
/// Injected explicitly instead of read from ambient shared storage, so the
/// application shell owns where tokens live and tests can swap credentials
/// freely. Returning `None` fails the request with
/// [`ApiError::MissingCredential`] before anything hits the wire.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed-token provider for shells that resolve the credential at login.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the screening backend, wrapping `reqwest` with bearer
/// authentication and a short-lived response cache for directory lookups.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    cache: Cache<String, serde_json::Value>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("cache_entries", &self.cache.entry_count())
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, credentials, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        // Directory lookups are read-mostly; 5 minute TTL keeps roster
        // pagination snappy without holding stale records across a session.
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(300))
            .build();

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            cache,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer_token(&self) -> Result<String, ApiError> {
        self.credentials
            .bearer_token()
            .ok_or(ApiError::MissingCredential)
    }

    pub async fn get_json<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        resource: &str,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let token = self.bearer_token()?;
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;
        Self::handle_response(response, resource).await
    }

    /// GET with a read-through cache, keyed by path and query. Used for the
    /// read-only directory endpoints; never for session or patient writes.
    pub async fn get_json_cached<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        resource: &str,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let cache_key = Self::cache_key(path, query);
        if let Some(cached) = self.cache.get(&cache_key).await {
            debug!(key = %cache_key, "Directory cache hit");
            return serde_json::from_value(cached).map_err(ApiError::from);
        }

        let value: serde_json::Value = self.get_json(path, query, resource).await?;
        self.cache.insert(cache_key, value.clone()).await;
        serde_json::from_value(value).map_err(ApiError::from)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B, resource: &str) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.bearer_token()?;
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::handle_response(response, resource).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B, resource: &str) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.bearer_token()?;
        let response = self
            .http
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::handle_response(response, resource).await
    }

    /// Drop cached directory responses whose key contains `pattern`. Called
    /// after writes that can invalidate roster state.
    pub async fn invalidate_cache(&self, pattern: &str) {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.contains(pattern))
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        for key in keys {
            self.cache.invalidate(&key).await;
        }
        debug!(pattern = %pattern, "Invalidated cached directory responses");
    }

    pub async fn clear_cache(&self) {
        self.cache.invalidate_all();
        info!("Directory response cache cleared");
    }

    fn cache_key(path: &str, query: &[(&str, String)]) -> String {
        let mut key = path.to_string();
        for (name, value) in query {
            key.push('&');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        key
    }

    async fn handle_response<T>(response: reqwest::Response, resource: &str) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            let value: serde_json::Value = response.json().await?;
            return serde_json::from_value(value).map_err(ApiError::from);
        }

        let message = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, message, resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCredentials;

    impl CredentialProvider for NoCredentials {
        fn bearer_token(&self) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn missing_credential_fails_before_the_wire() {
        let client = ApiClient::new("http://localhost:1", Arc::new(NoCredentials)).unwrap();
        let err = client
            .get_json::<serde_json::Value>("/students", &[], "student list")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingCredential));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client =
            ApiClient::new("http://api.local/", Arc::new(StaticCredentials::new("t"))).unwrap();
        assert_eq!(client.url("/students"), "http://api.local/students");
    }

    #[test]
    fn cache_key_includes_query() {
        let key = ApiClient::cache_key("/students", &[("school", "Ban Nong Bua".to_string())]);
        assert_eq!(key, "/students&school=Ban Nong Bua");
    }
}
