/*
[INPUT]:  User credentials and registration data
[OUTPUT]: Stored session tokens (login), cleared session (logout)
[POS]:    HTTP layer - auth endpoints driving the session store
[UPDATE]: When auth endpoints or token handling change
*/

use reqwest::Method;
use serde::de::IgnoredAny;
use tracing::{info, warn};

use crate::http::client::Credential;
use crate::http::{ApiClient, Result};
use crate::types::{LoginRequest, LoginResponse, RegisterRequest};

impl ApiClient {
    /// Log in and store the issued token pair
    ///
    /// POST /auth/login
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .send(Method::POST, "/auth/login", &body, Credential::None)
            .await?;

        self.session().set_tokens(
            &response.access_token,
            &response.refresh_token,
            response.expires_in,
        );
        info!(username, expires_in = response.expires_in, "logged in");

        Ok(response)
    }

    /// Create an account
    ///
    /// POST /auth/register
    pub async fn register(&self, request: &RegisterRequest) -> Result<serde_json::Value> {
        self.send(Method::POST, "/auth/register", request, Credential::None)
            .await
    }

    /// Tell the backend we are leaving and drop the session locally.
    ///
    /// POST /auth/logout. The session is cleared even when the call fails.
    pub async fn logout(&self) -> Result<()> {
        let result: Result<IgnoredAny> = self
            .request(Method::POST, "/auth/logout", &[], None, Credential::Session)
            .await;
        self.session().clear();

        match result {
            Ok(_) => {
                info!("logged out");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "logout request failed; session cleared locally");
                Err(err)
            }
        }
    }
}
