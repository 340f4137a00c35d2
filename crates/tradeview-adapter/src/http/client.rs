/*
[INPUT]:  HTTP configuration (base URL, public credential, timeouts) and session store
[OUTPUT]: Authenticated JSON requests with single-flight refresh and one retry
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing credential/refresh behavior
*/

use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::http::{Result, SyncError};
use crate::session::SessionStore;
use crate::types::{ErrorBody, RefreshRequest, RefreshResponse};

/// Default backend location
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";

pub(crate) const REFRESH_ENDPOINT: &str = "/auth/refresh";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Fixed credential sent on endpoints marked anonymous
    pub public_key: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Refresh before sending when the stored session is about to expire
    pub proactive_refresh: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            public_key: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            proactive_refresh: true,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// Which bearer credential a request carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    /// The stored access token; the public credential while logged out
    Session,
    /// The fixed public credential
    Public,
    /// No `Authorization` header (login, register, refresh)
    None,
}

/// Request client shared by every consumer of the backend.
///
/// Construct once and hand out `Arc<ApiClient>`; the session store is shared
/// by all calls made through this client and by nothing else.
#[derive(Debug)]
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
    public_key: Option<String>,
    session: SessionStore,
    refresh_gate: Mutex<()>,
    proactive_refresh: bool,
}

impl ApiClient {
    /// Create a client with default configuration and an in-memory session
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default(), SessionStore::in_memory())
    }

    /// Create a client with custom configuration and session store
    pub fn with_config(config: ClientConfig, session: SessionStore) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "base url {} cannot carry paths",
                config.base_url
            )));
        }

        Ok(Self {
            http_client,
            base_url,
            public_key: config.public_key,
            session,
            refresh_gate: Mutex::new(()),
            proactive_refresh: config.proactive_refresh,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build full URL for an endpoint path plus query pairs
    pub(crate) fn endpoint_url(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{endpoint}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET a JSON resource
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        credential: Credential,
    ) -> Result<T> {
        self.request(Method::GET, endpoint, query, None, credential).await
    }

    /// Send a JSON body and decode the JSON response
    pub async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        credential: Credential,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(method, endpoint, &[], Some(body), credential).await
    }

    /// Perform a request, refreshing the session and retrying once on rejection
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
        credential: Credential,
    ) -> Result<T> {
        let url = self.endpoint_url(endpoint, query)?;
        let refreshable = credential == Credential::Session && !is_refresh_endpoint(endpoint);

        if refreshable
            && self.proactive_refresh
            && self.session.is_expiring_soon()
            && self.session.get_refresh().is_some()
        {
            let generation = self.session.generation();
            match self.refresh_single_flight(generation).await {
                Ok(()) => {}
                // Offline: try the stored token anyway, the call reports the network failure.
                Err(err) if err.is_network() => {}
                Err(err) => return Err(err),
            }
        }

        let (token, generation) = self.session.snapshot();
        let first = self
            .send_once(&method, &url, body.as_ref(), credential, token.as_deref())
            .await;

        let message = match first {
            Err(SyncError::Unauthorized { message })
                if refreshable && self.session.get_refresh().is_some() =>
            {
                message
            }
            other => return other,
        };

        debug!(endpoint, "credential rejected; attempting refresh");
        match self.refresh_single_flight(generation).await {
            Ok(()) => {
                let (token, _) = self.session.snapshot();
                self.send_once(&method, &url, body.as_ref(), credential, token.as_deref())
                    .await
            }
            // The caller sees the original rejection whatever broke the refresh.
            Err(err) => {
                debug!(endpoint, error = %err, "refresh did not recover the request");
                Err(SyncError::Unauthorized { message })
            }
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// A rejected refresh clears the session; a network failure leaves it intact.
    pub async fn refresh_access_token(&self) -> Result<()> {
        let Some(refresh_token) = self.session.get_refresh() else {
            return Err(SyncError::SessionExpired);
        };

        let url = self.endpoint_url(REFRESH_ENDPOINT, &[])?;
        let body = serde_json::to_value(RefreshRequest { refresh_token })?;
        let generation = self.session.generation();

        info!("refreshing access token");
        match self
            .send_once::<RefreshResponse>(&Method::POST, &url, Some(&body), Credential::None, None)
            .await
        {
            Ok(response) => {
                let applied = self.session.update_access_if(
                    generation,
                    &response.access_token,
                    response.expires_in,
                );
                if applied {
                    info!(expires_in = response.expires_in, "access token refreshed");
                    Ok(())
                } else if self.session.is_logged_in() {
                    debug!("session replaced during refresh; refreshed token dropped");
                    Ok(())
                } else {
                    warn!("session cleared during refresh; refreshed token dropped");
                    Err(SyncError::SessionExpired)
                }
            }
            Err(err) if err.is_network() => {
                warn!(error = %err, "token refresh failed: network");
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, "token refresh rejected; clearing session");
                self.session.clear_if(generation);
                Err(SyncError::SessionExpired)
            }
        }
    }

    /// Collapse concurrent refreshes into one.
    ///
    /// `seen_generation` is the session generation the caller's failed request
    /// used. If the session moved on while waiting for the gate, another caller
    /// already refreshed (or the session was cleared) and its result is reused.
    async fn refresh_single_flight(&self, seen_generation: u64) -> Result<()> {
        let _gate = self.refresh_gate.lock().await;

        if self.session.generation() != seen_generation {
            return if self.session.is_logged_in() {
                Ok(())
            } else {
                Err(SyncError::SessionExpired)
            };
        }

        self.refresh_access_token().await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        credential: Credential,
        access_token: Option<&str>,
    ) -> Result<T> {
        let mut builder = self.http_client.request(method.clone(), url.clone());
        if let Some(bearer) = self.bearer_for(credential, access_token) {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(method = %method, url = %url, "api request");
        let response = builder.send().await.map_err(|err| {
            warn!(url = %url, error = %err, "network error");
            SyncError::Network(err)
        })?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| "Request failed".to_string());
            warn!(url = %url, status = status.as_u16(), %message, "api error");
            return Err(SyncError::api_error(status, message));
        }

        if bytes.is_empty() {
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn bearer_for<'a>(
        &'a self,
        credential: Credential,
        access_token: Option<&'a str>,
    ) -> Option<&'a str> {
        match credential {
            Credential::Session => access_token.or(self.public_key.as_deref()),
            Credential::Public => self.public_key.as_deref(),
            Credential::None => None,
        }
    }
}

fn is_refresh_endpoint(endpoint: &str) -> bool {
    endpoint.starts_with(REFRESH_ENDPOINT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_keeps_base_path_prefix() {
        let client = ApiClient::with_config(
            ClientConfig::with_base_url("http://localhost:5001/api/"),
            SessionStore::in_memory(),
        )
        .unwrap();
        let url = client
            .endpoint_url("/market/candles/BTCUSDT/1h", &[("limit", "100".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5001/api/market/candles/BTCUSDT/1h?limit=100"
        );
    }

    #[test]
    fn test_bearer_selection() {
        let config = ClientConfig {
            public_key: Some("anon".to_string()),
            ..ClientConfig::default()
        };
        let client = ApiClient::with_config(config, SessionStore::in_memory()).unwrap();

        assert_eq!(client.bearer_for(Credential::Session, Some("tok")), Some("tok"));
        assert_eq!(client.bearer_for(Credential::Session, None), Some("anon"));
        assert_eq!(client.bearer_for(Credential::Public, Some("tok")), Some("anon"));
        assert_eq!(client.bearer_for(Credential::None, Some("tok")), None);
    }

    #[test]
    fn test_refresh_endpoint_detection() {
        assert!(is_refresh_endpoint("/auth/refresh"));
        assert!(!is_refresh_endpoint("/auth/login"));
    }
}
