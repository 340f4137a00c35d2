/*
[INPUT]:  Order requests and order identifiers
[OUTPUT]: Order placement, listing and cancellation results
[POS]:    HTTP layer - trading endpoints (require session credential)
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use reqwest::Method;
use serde_json::Value;

use crate::http::client::Credential;
use crate::http::{ApiClient, Result};
use crate::types::{OrderStatus, PlaceOrderRequest};

impl ApiClient {
    /// Place an order. Invalid parameters fail before anything is sent.
    ///
    /// POST /trading/order
    pub async fn place_order(&self, request: &PlaceOrderRequest) -> Result<Value> {
        request.validate()?;
        self.send(Method::POST, "/trading/order", request, Credential::Session)
            .await
    }

    /// GET /trading/orders?status={status}
    pub async fn get_orders(&self, status: Option<OrderStatus>) -> Result<Value> {
        let query: Vec<(&str, String)> = status
            .map(|s| vec![("status", s.as_query().to_string())])
            .unwrap_or_default();
        self.get("/trading/orders", &query, Credential::Session).await
    }

    /// DELETE /trading/order/{id}
    pub async fn cancel_order(&self, order_id: &str) -> Result<Value> {
        let endpoint = format!("/trading/order/{order_id}");
        self.request(Method::DELETE, &endpoint, &[], None, Credential::Session)
            .await
    }
}
