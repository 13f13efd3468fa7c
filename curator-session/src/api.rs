//! Authenticated HTTP client with one-shot refresh-and-retry.

use crate::error::{SessionError, SessionResult};
use crate::token_store::TokenStore;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, multipart::Form};
use serde::{Serialize, de::DeserializeOwned};
use shared::config::ClientConfig;
use shared::models::CredentialPair;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = "curator-session";

/// HTTP client for the Curator backend.
///
/// Attaches the stored access token and, when a token-bearing request comes
/// back 401, refreshes the token once and retries the request once.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
    tokens: Arc<dyn TokenStore>,
    refresh_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Create a client for `base_url` with a default `reqwest` client.
    ///
    /// # Errors
    /// Returns [`SessionError::Network`] when the HTTP client cannot be built.
    pub fn new(base_url: Url, tokens: Arc<dyn TokenStore>) -> SessionResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(SessionError::from_transport)?;
        Ok(Self::with_client(base_url, client, tokens))
    }

    /// Create a client from resolved configuration.
    ///
    /// # Errors
    /// Returns [`SessionError::Network`] when the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> SessionResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(SessionError::from_transport)?;
        Ok(Self::with_client(config.api_base_url.clone(), client, tokens))
    }

    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub fn with_client(mut base_url: Url, client: Client, tokens: Arc<dyn TokenStore>) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            client,
            tokens,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Base URL all paths are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The token store shared with the session manager.
    #[must_use]
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    fn api_url(&self, path: &str) -> SessionResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| SessionError::InvalidRequest(format!("{path}: {err}")))
    }

    fn current_access_token(&self) -> Option<String> {
        match self.tokens.get() {
            Ok(tokens) => tokens.access_token,
            Err(err) => {
                warn!(error = %err, "token store unreadable; sending request without credentials");
                None
            }
        }
    }

    fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> SessionResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| SessionError::Decode(err.to_string()))
    }

    async fn check_status(response: Response, carried_token: bool) -> SessionResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(SessionError::from_status(status, &body, carried_token))
    }

    /// Send the request produced by `build`, refreshing and retrying once on a 401.
    ///
    /// `build` is called again for the retry, so bodies that cannot be
    /// cloned (multipart forms) are rebuilt from scratch.
    async fn send_with_refresh<F>(&self, build: F) -> SessionResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let token = self.current_access_token();

        let response = Self::authorize(build(), token.as_deref())
            .send()
            .await
            .map_err(SessionError::from_transport)?;

        let Some(sent_token) = token else {
            return Self::check_status(response, false).await;
        };
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_status(response, true).await;
        }

        let rejected = Self::check_status(response, true).await;
        let original = match rejected {
            Err(err) => err,
            Ok(response) => return Ok(response),
        };

        let fresh_token = match self.refresh_after(&sent_token).await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "token refresh failed; giving up on request");
                return Err(original);
            }
        };

        debug!("retrying request with refreshed access token");
        let retried = Self::authorize(build(), Some(&fresh_token))
            .send()
            .await
            .map_err(SessionError::from_transport)?;
        Self::check_status(retried, true).await
    }

    /// Obtain a usable access token after `stale` was rejected.
    ///
    /// Refreshes are serialized. When another caller already replaced the
    /// rejected token, the stored token is reused without a second refresh.
    async fn refresh_after(&self, stale: &str) -> SessionResult<String> {
        let _guard = self.refresh_lock.lock().await;
        let stored = self.tokens.get()?;
        if let (Some(current), Some(_)) = (&stored.access_token, &stored.refresh_token) {
            if current != stale {
                debug!("access token already refreshed by a concurrent request");
                return Ok(current.clone());
            }
        }
        let pair = stored.pair().ok_or_else(|| SessionError::Authentication {
            message: "No refresh token available".to_string(),
        })?;
        Ok(self.refresh_pair(&pair).await?.access_token)
    }

    async fn refresh_pair(&self, pair: &CredentialPair) -> SessionResult<CredentialPair> {
        let refreshed = self.refresh_tokens(&pair.refresh_token).await?;
        let next = pair.with_access_token(refreshed.access);
        self.tokens.set(&next)?;
        info!("access token refreshed");
        Ok(next)
    }

    /// Exchange the stored refresh token for a new access token now.
    ///
    /// The refresh token itself is kept; only the access token changes.
    ///
    /// # Errors
    /// Returns [`SessionError::Authentication`] when no complete pair is
    /// stored, or whatever the refresh endpoint or token store reports.
    pub async fn refresh_access_token(&self) -> SessionResult<CredentialPair> {
        let _guard = self.refresh_lock.lock().await;
        let pair = self
            .tokens
            .get()?
            .pair()
            .ok_or_else(|| SessionError::Authentication {
                message: "No refresh token available".to_string(),
            })?;
        self.refresh_pair(&pair).await
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send_raw(method, path, body).await?;
        Self::decode(response).await
    }

    async fn send_raw<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> SessionResult<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.api_url(path)?;
        debug!(method = %method, path, "api request");
        self.send_with_refresh(|| {
            let request = self.client.request(method.clone(), url.clone());
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> SessionResult<T> {
        self.send_json::<(), T>(Method::GET, path, None)
            .await
    }

    /// `GET` a JSON resource with query parameters.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn get_with_query<Q, T>(&self, path: &str, query: &Q) -> SessionResult<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.api_url(path)?;
        debug!(method = "GET", path, "api request");
        let response = self
            .send_with_refresh(|| self.client.get(url.clone()).query(query))
            .await?;
        Self::decode(response).await
    }

    /// `POST` a JSON body and decode the JSON response.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, Some(body))
            .await
    }

    /// `POST` a JSON body, ignoring any response body.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn post_no_content<B>(&self, path: &str, body: &B) -> SessionResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send_raw(Method::POST, path, Some(body))
            .await
            .map(drop)
    }

    /// `PATCH` a JSON body and decode the JSON response.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, Some(body))
            .await
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn delete(&self, path: &str) -> SessionResult<()> {
        self.send_raw::<()>(Method::DELETE, path, None)
            .await
            .map(drop)
    }

    /// `PATCH` a multipart form and decode the JSON response.
    ///
    /// `form` is invoked once per attempt; the form is sent as-is, never
    /// JSON-encoded.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn patch_multipart<F, T>(&self, path: &str, form: F) -> SessionResult<T>
    where
        F: Fn() -> Form,
        T: DeserializeOwned,
    {
        let url = self.api_url(path)?;
        debug!(method = "PATCH", path, "api multipart request");
        let response = self
            .send_with_refresh(|| {
                self.client.patch(url.clone()).multipart(form())
            })
            .await?;
        Self::decode(response).await
    }

    /// `POST` without credentials, in a single attempt.
    ///
    /// Used for the credential and refresh exchanges, so a rejection here
    /// can never start a refresh of its own.
    async fn send_anonymous<B>(&self, path: &str, body: &B) -> SessionResult<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.api_url(path)?;
        debug!(method = "POST", path, "anonymous api request");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(SessionError::from_transport)?;
        Self::check_status(response, false).await
    }

    pub(crate) async fn post_anonymous<B, T>(&self, path: &str, body: &B) -> SessionResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send_anonymous(path, body).await?;
        Self::decode(response).await
    }

    pub(crate) async fn post_anonymous_no_content<B>(&self, path: &str, body: &B) -> SessionResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send_anonymous(path, body).await.map(drop)
    }
}
