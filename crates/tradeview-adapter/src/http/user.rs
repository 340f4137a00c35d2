/*
[INPUT]:  Profile/settings changes and watchlist symbols
[OUTPUT]: User account data (profile, balance, portfolio, trades, watchlist)
[POS]:    HTTP layer - user data endpoints (require session credential)
[UPDATE]: When adding new user endpoints or changing query parameters
*/

// ### User Endpoints

use reqwest::Method;
use serde_json::Value;

use crate::http::client::Credential;
use crate::http::{ApiClient, Result};
use crate::types::{UpdateProfileRequest, UpdateSettingsRequest, UserProfile, WatchlistRequest};

impl ApiClient {
    /// GET /user/profile
    pub async fn get_profile(&self) -> Result<UserProfile> {
        self.get("/user/profile", &[], Credential::Session).await
    }

    /// PUT /user/profile
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Value> {
        self.send(Method::PUT, "/user/profile", request, Credential::Session)
            .await
    }

    /// GET /user/balance
    pub async fn get_balance(&self) -> Result<Value> {
        self.get("/user/balance", &[], Credential::Session).await
    }

    /// POST /user/balance/reset
    pub async fn reset_balance(&self) -> Result<Value> {
        self.request(
            Method::POST,
            "/user/balance/reset",
            &[],
            None,
            Credential::Session,
        )
        .await
    }

    /// GET /user/login-activity
    pub async fn get_login_activity(&self) -> Result<Value> {
        self.get("/user/login-activity", &[], Credential::Session)
            .await
    }

    /// PUT /user/settings
    pub async fn update_settings(&self, request: &UpdateSettingsRequest) -> Result<Value> {
        self.send(Method::PUT, "/user/settings", request, Credential::Session)
            .await
    }

    /// GET /user/portfolio
    pub async fn get_portfolio(&self) -> Result<Value> {
        self.get("/user/portfolio", &[], Credential::Session).await
    }

    /// GET /user/trades
    pub async fn get_trade_history(&self) -> Result<Value> {
        self.get("/user/trades", &[], Credential::Session).await
    }

    /// GET /user/watchlist
    pub async fn get_watchlist(&self) -> Result<Value> {
        self.get("/user/watchlist", &[], Credential::Session).await
    }

    /// POST /user/watchlist
    pub async fn add_to_watchlist(&self, symbol: &str) -> Result<Value> {
        let body = WatchlistRequest {
            symbol: symbol.to_string(),
        };
        self.send(Method::POST, "/user/watchlist", &body, Credential::Session)
            .await
    }

    /// DELETE /user/watchlist/{symbol}
    pub async fn remove_from_watchlist(&self, symbol: &str) -> Result<Value> {
        let endpoint = format!("/user/watchlist/{symbol}");
        self.request(Method::DELETE, &endpoint, &[], None, Credential::Session)
            .await
    }
}
