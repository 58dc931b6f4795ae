// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Token price statistics from the CoinGecko API.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::OffChainSource;
use crate::calls::OffChainKind;
use crate::config::constants::endpoints::COINGECKO_API_URL;
use crate::connection::ConnectionContext;
use crate::errors::OffChainError;

/// Serves [`OffChainKind::PriceStats`].
///
/// Arguments are token contract addresses. The payload maps each lowercase
/// address to `{ price, change24Hr, volume24Hr, marketCap }` in USD. The
/// source works without a connection.
#[derive(Debug, Clone)]
pub struct CoingeckoSource {
    client: reqwest::Client,
    base_url: String,
    platform: String,
}

impl CoingeckoSource {
    /// Source on the public API for Ethereum tokens.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: COINGECKO_API_URL.to_string(),
            platform: "ethereum".to_string(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the asset platform the contract addresses live on.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }
}

#[async_trait]
impl OffChainSource for CoingeckoSource {
    fn kind(&self) -> OffChainKind {
        OffChainKind::PriceStats
    }

    fn requires_connection(&self) -> bool {
        false
    }

    async fn fetch(
        &self,
        _connection: Option<&ConnectionContext>,
        args: &[String],
    ) -> Result<Value, OffChainError> {
        if args.is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let url = format!("{}/simple/token_price/{}", self.base_url, self.platform);
        let addresses = args
            .iter()
            .map(|a| a.to_lowercase())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("contract_addresses", addresses.as_str()),
                ("vs_currencies", "usd"),
                ("include_market_cap", "true"),
                ("include_24hr_vol", "true"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await
            .map_err(|e| OffChainError::request(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OffChainError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| OffChainError::request(&url, e))?;

        debug!(tokens = args.len(), "Fetched token price stats");
        normalize_token_prices(raw)
    }
}

/// Normalizes a `simple/token_price` response.
///
/// ```text
/// { "0xabc": { "usd": 1.0, "usd_24h_change": .., "usd_24h_vol": .., "usd_market_cap": .. } }
///   -> { "0xabc": { "price": 1.0, "change24Hr": .., "volume24Hr": .., "marketCap": .. } }
/// ```
///
/// Missing statistics become `null`; entries that are not objects are skipped.
pub fn normalize_token_prices(raw: Value) -> Result<Value, OffChainError> {
    let Value::Object(tokens) = raw else {
        return Err(OffChainError::payload("price response is not an object"));
    };

    let normalized = tokens
        .into_iter()
        .filter_map(|(id, stats)| {
            let Value::Object(stats) = stats else {
                return None;
            };
            let field = |name: &str| stats.get(name).cloned().unwrap_or(Value::Null);

            let mut entry = Map::new();
            entry.insert("price".to_string(), field("usd"));
            entry.insert("change24Hr".to_string(), field("usd_24h_change"));
            entry.insert("volume24Hr".to_string(), field("usd_24h_vol"));
            entry.insert("marketCap".to_string(), field("usd_market_cap"));
            Some((id.to_lowercase(), Value::Object(entry)))
        })
        .collect();

    Ok(Value::Object(normalized))
}
