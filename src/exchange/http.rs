//! Generic JSON-over-REST venue adapter

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use super::ExchangeAdapter;
use crate::{
    errors::{ExchangeError, MeshError, MeshResult},
    types::{Balance, CancelRequest, Kline, OrderAck, OrderBook, OrderRequest, Ticker},
};

/// Talks to a venue exposing the mesh's neutral REST layout:
///
/// | operation          | request                                   |
/// |--------------------|-------------------------------------------|
/// | connectivity       | `GET /ping`                               |
/// | server time        | `GET /time` → `{"server_time": <ms>}`     |
/// | ticker             | `GET /ticker?symbol=`                     |
/// | order book         | `GET /depth?symbol=&limit=`               |
/// | klines             | `GET /klines?symbol=&interval=&limit=`    |
/// | balances           | `GET /balance`                            |
/// | place / cancel     | `POST /order` / `DELETE /order`           |
///
/// Non-2xx responses become [`ExchangeError::from_status`] so the classifier sees the usual
/// wording ("too many requests", "unauthorized", ...).
pub struct HttpExchangeAdapter {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct ServerTime {
    server_time: i64,
}

impl HttpExchangeAdapter {
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> MeshResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                warn!("⚠️ Failed to initialize HTTP client for {}: {}", name, e);
                MeshError::ClientBuild {
                    exchange: name.to_string(),
                    source: e,
                }
            })?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            client,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header("X-API-KEY", key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, context: &str) -> Result<T, ExchangeError> {
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("⚠️ {} {} returned error status {}: {}", self.name, context, status, body);
            return Err(ExchangeError::from_status(status.as_u16(), &body));
        }

        let bytes = response.bytes().await?;
        debug!(exchange = %self.name, context, bytes = bytes.len(), "Decoded venue response");
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ExchangeAdapter for HttpExchangeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        let builder = self.request(Method::GET, "/ticker").query(&[("symbol", symbol)]);
        self.send(builder, "ticker").await
    }

    async fn get_order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook, ExchangeError> {
        let limit = limit.to_string();
        let builder = self
            .request(Method::GET, "/depth")
            .query(&[("symbol", symbol), ("limit", limit.as_str())]);
        self.send(builder, "depth").await
    }

    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Kline>, ExchangeError> {
        let limit = limit.to_string();
        let builder = self.request(Method::GET, "/klines").query(&[
            ("symbol", symbol),
            ("interval", interval),
            ("limit", limit.as_str()),
        ]);
        self.send(builder, "klines").await
    }

    async fn get_balance(&self) -> Result<Vec<Balance>, ExchangeError> {
        self.send(self.request(Method::GET, "/balance"), "balance").await
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let builder = self.request(Method::POST, "/order").json(request);
        self.send(builder, "place order").await
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck, ExchangeError> {
        let builder = self.request(Method::DELETE, "/order").json(request);
        self.send(builder, "cancel order").await
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>, ExchangeError> {
        let time: ServerTime = self.send(self.request(Method::GET, "/time"), "time").await?;
        Utc.timestamp_millis_opt(time.server_time)
            .single()
            .ok_or_else(|| ExchangeError::Decode(format!("invalid server time {}", time.server_time)))
    }

    async fn test_connectivity(&self) -> Result<bool, ExchangeError> {
        let response = self.request(Method::GET, "/ping").send().await?;
        Ok(response.status().is_success())
    }
}
