//! REST backend client
//!
//! Thin client over the warteg management API: stock and sales mutations,
//! menu reads, aggregated sales reads, social posting, and ephemeral
//! live-session token issuance. Auth is a bearer token supplied through
//! configuration; a non-success status surfaces as [`Error::Network`] with
//! the status and body preserved for the log.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::command::types::{SalePayload, SocialPostPayload, StockPayload};
use crate::command::{Backend, TokenProvider};
use crate::predict::SalesRecord;
use crate::{Error, Result};

/// A menu item as stored by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Backend identifier; absent when creating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// Unit price in rupiah
    pub price: f64,
    /// Category (e.g. "lauk", "minuman")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Aggregation window for sales reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalesPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl SalesPeriod {
    const fn path(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Deserialize)]
struct LiveTokenResponse {
    token: String,
}

/// Client for the warteg management REST API
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl ApiClient {
    /// Create a client for the given base URL.
    #[must_use]
    pub fn new(base_url: &str, token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// List the menu.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it
    pub async fn menu(&self) -> Result<Vec<MenuItem>> {
        let response = self.get("/api/menu").await?;
        Ok(response.json().await?)
    }

    /// Create a menu item.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it
    pub async fn create_menu_item(&self, item: &MenuItem) -> Result<MenuItem> {
        let url = format!("{}/api/menu", self.base_url);
        let response = self
            .authorized(self.client.post(&url).json(item))
            .send()
            .await?;
        let response = check_status(response, "menu create").await?;
        Ok(response.json().await?)
    }

    /// Fetch historical sales for the given aggregation window.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend rejects it
    pub async fn sales(&self, period: SalesPeriod) -> Result<Vec<SalesRecord>> {
        let response = self.get(&format!("/api/sales/{}", period.path())).await?;
        Ok(response.json().await?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        check_status(response, path).await
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

/// Reject non-success responses, keeping status and body for the log.
async fn check_status(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = %status, body = %body, context, "backend API error");
    Err(Error::Network(format!("{context}: {status}: {body}")))
}

#[async_trait]
impl Backend for ApiClient {
    async fn add_stock(&self, payload: &StockPayload) -> Result<()> {
        let url = format!("{}/api/stock", self.base_url);
        let response = self
            .authorized(self.client.put(&url).json(payload))
            .send()
            .await?;
        check_status(response, "stock add").await?;
        tracing::info!(item = %payload.item_name, quantity = payload.quantity, "stock added");
        Ok(())
    }

    async fn record_sale(&self, payload: &SalePayload) -> Result<()> {
        let url = format!("{}/api/sales", self.base_url);
        let response = self
            .authorized(self.client.put(&url).json(payload))
            .send()
            .await?;
        check_status(response, "sale record").await?;
        tracing::info!(items = payload.items.len(), "sale recorded");
        Ok(())
    }

    async fn post_social(&self, payload: &SocialPostPayload) -> Result<()> {
        let url = format!("{}/api/social/posts", self.base_url);
        let response = self
            .authorized(self.client.post(&url).json(payload))
            .send()
            .await?;
        check_status(response, "social post").await?;
        tracing::info!("social post created");
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for ApiClient {
    async fn live_token(&self) -> Result<String> {
        let response = self.get("/api/auth/live-token").await?;
        let parsed: LiveTokenResponse = response.json().await?;
        Ok(parsed.token)
    }
}
