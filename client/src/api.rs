use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::RwLock;

use courier_common::order::OrderStatus;
use courier_common::user::Role;
use courier_common::wire::{
    AuthResponse, BidRecord, MessageRecord, OrderDraft, OrderRecord, ReviewDraft, ReviewRecord,
    WalletRecord,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// REST client for the marketplace API.
///
/// Collection reads return typed records; mutations drop the response
/// body since every mutation is followed by a full reconciliation pass
/// that re-fetches the authoritative state.
pub struct Api {
    http: reqwest::Client,
    base: String,
    token: RwLock<Option<String>>,
}

impl Api {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            http,
            base: config.api_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Installs (or clears) the bearer token attached to every request.
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Sends the request and decodes a JSON body of the expected shape.
    async fn fetch<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let resp = self.authorize(req).await.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Sends the request and discards the response body.
    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<()> {
        let resp = self.authorize(req).await.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    // ─── Auth ───

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let req = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        self.fetch(req).await
    }

    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: Role,
    ) -> Result<AuthResponse> {
        let req = self.http.post(self.url("/auth/register")).json(&json!({
            "email": email,
            "name": name,
            "password": password,
            "role": role,
        }));
        self.fetch(req).await
    }

    // ─── Orders ───

    pub async fn list_orders(&self) -> Result<Vec<OrderRecord>> {
        self.fetch(self.http.get(self.url("/orders"))).await
    }

    pub async fn get_order(&self, id: &str) -> Result<OrderRecord> {
        self.fetch(self.http.get(self.url(&format!("/orders/{id}"))))
            .await
    }

    pub async fn create_order(&self, draft: &OrderDraft) -> Result<()> {
        self.execute(self.http.post(self.url("/orders")).json(draft))
            .await
    }

    pub async fn set_order_status(&self, id: &str, status: OrderStatus) -> Result<()> {
        let req = self
            .http
            .patch(self.url(&format!("/orders/{id}/status")))
            .json(&json!({ "status": status }));
        self.execute(req).await
    }

    // ─── Bids ───

    pub async fn list_bids(&self, order_id: Option<&str>) -> Result<Vec<BidRecord>> {
        let mut req = self.http.get(self.url("/bids"));
        if let Some(order_id) = order_id {
            req = req.query(&[("orderId", order_id)]);
        }
        self.fetch(req).await
    }

    pub async fn create_bid(&self, order_id: &str, user_id: &str, amount: f64) -> Result<()> {
        let req = self.http.post(self.url("/bids")).json(&json!({
            "orderId": order_id,
            "userId": user_id,
            "amount": amount,
        }));
        self.execute(req).await
    }

    pub async fn update_bid(&self, id: &str, amount: f64) -> Result<()> {
        let req = self
            .http
            .patch(self.url(&format!("/bids/{id}")))
            .json(&json!({ "amount": amount }));
        self.execute(req).await
    }

    // ─── Wallets ───

    pub async fn get_wallet(&self, user_id: &str) -> Result<WalletRecord> {
        self.fetch(self.http.get(self.url(&format!("/wallets/{user_id}"))))
            .await
    }

    pub async fn update_wallet(&self, user_id: &str, balance: f64, escrow: f64) -> Result<()> {
        let req = self
            .http
            .patch(self.url(&format!("/wallets/{user_id}")))
            .json(&json!({ "balance": balance, "escrow": escrow }));
        self.execute(req).await
    }

    // ─── Messages ───

    pub async fn list_messages(&self) -> Result<Vec<MessageRecord>> {
        self.fetch(self.http.get(self.url("/messages"))).await
    }

    /// Posts a chat message. The write side names the body field
    /// `content` even though reads come back as `text`.
    pub async fn send_message(&self, order_id: &str, sender_id: &str, text: &str) -> Result<()> {
        let req = self.http.post(self.url("/messages")).json(&json!({
            "orderId": order_id,
            "senderId": sender_id,
            "content": text,
        }));
        self.execute(req).await
    }

    // ─── Reviews ───

    pub async fn list_reviews(&self) -> Result<Vec<ReviewRecord>> {
        self.fetch(self.http.get(self.url("/reviews"))).await
    }

    pub async fn create_review(&self, draft: &ReviewDraft) -> Result<()> {
        self.execute(self.http.post(self.url("/reviews")).json(draft))
            .await
    }
}
