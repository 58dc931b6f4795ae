// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Index pool snapshots, pool activity and staking data from GraphQL subgraphs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

use super::OffChainSource;
use crate::calls::OffChainKind;
use crate::config::constants::endpoints::{
    INDEXED_MAINNET_SUBGRAPH_URL, INDEXED_RINKEBY_SUBGRAPH_URL, UNISWAP_V2_SUBGRAPH_URL,
};
use crate::connection::ConnectionContext;
use crate::errors::OffChainError;

const TRADES_QUERY: &str = r#"
query poolTrades($pair: String!) {
  swaps(first: 20, orderBy: timestamp, orderDirection: desc, where: { pair: $pair }) {
    id
    timestamp
    amount0In
    amount1In
    amount0Out
    amount1Out
    amountUSD
  }
}"#;

const SWAPS_QUERY: &str = r#"
query poolSwaps($pool: String!) {
  swaps(first: 20, orderBy: timestamp, orderDirection: desc, where: { pool: $pool }) {
    id
    caller
    tokenIn
    tokenOut
    tokenAmountIn
    tokenAmountOut
    timestamp
  }
}"#;

const INDEX_POOLS_QUERY: &str = r#"
{
  categories(first: 100) {
    id
    name
    symbol
    description
  }
  indexPools(first: 100) {
    id
    category {
      id
    }
    size
    name
    symbol
    isPublic
    totalSupply
    totalWeight
    swapFee
    tokens {
      id
      token {
        id
        decimals
        name
        symbol
      }
      ready
      balance
      minimumBalance
      denorm
      desiredDenorm
    }
  }
}"#;

const STAKING_QUERY: &str = r#"
{
  ndxStakingPools(first: 100) {
    id
    stakingToken
    indexPool
    isWethPair
    startsAt
    isReady
    totalSupply
    periodFinish
    lastUpdateTime
    totalRewards
    claimedRewards
    rewardRate
    rewardPerTokenStored
  }
}"#;

/// Subgraph URLs: the index subgraph per chain id, plus the DEX subgraph used
/// for trade history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphEndpoints {
    index_by_chain: HashMap<u64, String>,
    dex: String,
}

impl Default for SubgraphEndpoints {
    fn default() -> Self {
        let mut index_by_chain = HashMap::new();
        index_by_chain.insert(1, INDEXED_MAINNET_SUBGRAPH_URL.to_string());
        index_by_chain.insert(4, INDEXED_RINKEBY_SUBGRAPH_URL.to_string());
        Self {
            index_by_chain,
            dex: UNISWAP_V2_SUBGRAPH_URL.to_string(),
        }
    }
}

impl SubgraphEndpoints {
    /// Endpoints with no index subgraph and the given DEX subgraph.
    pub fn new(dex: impl Into<String>) -> Self {
        Self {
            index_by_chain: HashMap::new(),
            dex: dex.into(),
        }
    }

    /// Sets the index subgraph for a chain.
    #[must_use]
    pub fn with_index(mut self, chain_id: u64, url: impl Into<String>) -> Self {
        self.index_by_chain.insert(chain_id, url.into());
        self
    }

    /// Index subgraph of a chain.
    pub fn index_url(&self, chain_id: u64) -> Option<&str> {
        self.index_by_chain.get(&chain_id).map(String::as_str)
    }

    /// DEX subgraph.
    pub fn dex_url(&self) -> &str {
        &self.dex
    }

    fn index_for(&self, connection: Option<&ConnectionContext>) -> Result<&str, OffChainError> {
        let chain_id = connection.ok_or(OffChainError::NotConnected)?.chain_id();
        self.index_url(chain_id)
            .ok_or(OffChainError::NoEndpoint { chain_id })
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl GraphQlResponse {
    fn into_data(self) -> Result<Value, OffChainError> {
        if let Some(first) = self.errors.first() {
            return Err(OffChainError::payload(format!(
                "GraphQL error: {} ({} total)",
                first.message,
                self.errors.len()
            )));
        }
        self.data
            .ok_or_else(|| OffChainError::payload("GraphQL response has no data"))
    }
}

/// Posts a GraphQL query and returns its `data` object.
async fn post_graphql(
    client: &reqwest::Client,
    url: &str,
    query: &str,
    variables: Value,
) -> Result<Value, OffChainError> {
    let response = client
        .post(url)
        .json(&json!({ "query": query, "variables": variables }))
        .send()
        .await
        .map_err(|e| OffChainError::request(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(OffChainError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body: GraphQlResponse = response
        .json()
        .await
        .map_err(|e| OffChainError::request(url, e))?;
    body.into_data()
}

/// Serves [`OffChainKind::PoolTradesAndSwaps`].
///
/// Takes one argument, the pool address. Trades come from the DEX subgraph
/// and swaps from the connected chain's index subgraph; both are queried
/// concurrently.
#[derive(Debug, Clone)]
pub struct PoolActivitySource {
    client: reqwest::Client,
    endpoints: SubgraphEndpoints,
}

impl PoolActivitySource {
    /// Creates the source.
    pub fn new(client: reqwest::Client, endpoints: SubgraphEndpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl OffChainSource for PoolActivitySource {
    fn kind(&self) -> OffChainKind {
        OffChainKind::PoolTradesAndSwaps
    }

    async fn fetch(
        &self,
        connection: Option<&ConnectionContext>,
        args: &[String],
    ) -> Result<Value, OffChainError> {
        let index_url = self.endpoints.index_for(connection)?;
        let pool = args
            .first()
            .map(|p| p.to_lowercase())
            .ok_or_else(|| OffChainError::payload("pool address argument is required"))?;

        let (trades, swaps) = futures::try_join!(
            post_graphql(
                &self.client,
                self.endpoints.dex_url(),
                TRADES_QUERY,
                json!({ "pair": pool }),
            ),
            post_graphql(&self.client, index_url, SWAPS_QUERY, json!({ "pool": pool })),
        )?;

        debug!(pool = %pool, "Fetched pool trades and swaps");
        Ok(normalize_pool_activity(&pool, trades, swaps))
    }
}

/// Combines the two query results into `{ poolId, trades, swaps }`.
///
/// Each list is taken from the `swaps` field of its response; a missing field
/// yields an empty list.
pub fn normalize_pool_activity(pool: &str, trades: Value, swaps: Value) -> Value {
    let list = |mut data: Value| match data.get_mut("swaps").map(Value::take) {
        Some(Value::Array(items)) => Value::Array(items),
        _ => Value::Array(Vec::new()),
    };

    json!({
        "poolId": pool,
        "trades": list(trades),
        "swaps": list(swaps),
    })
}

/// Serves [`OffChainKind::IndexPools`]: every index pool and category of the
/// connected chain's index subgraph, normalized by
/// [`normalize_index_pools`]. Takes no arguments.
#[derive(Debug, Clone)]
pub struct IndexPoolsSource {
    client: reqwest::Client,
    endpoints: SubgraphEndpoints,
}

impl IndexPoolsSource {
    /// Creates the source.
    pub fn new(client: reqwest::Client, endpoints: SubgraphEndpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl OffChainSource for IndexPoolsSource {
    fn kind(&self) -> OffChainKind {
        OffChainKind::IndexPools
    }

    async fn fetch(
        &self,
        connection: Option<&ConnectionContext>,
        _args: &[String],
    ) -> Result<Value, OffChainError> {
        let url = self.endpoints.index_for(connection)?;
        let data = post_graphql(&self.client, url, INDEX_POOLS_QUERY, json!({})).await?;
        let snapshot = normalize_index_pools(data)?;
        debug!(
            pools = snapshot["indexPools"].as_object().map_or(0, Map::len),
            "Fetched index pool snapshot"
        );
        Ok(snapshot)
    }
}

/// Normalizes the index subgraph snapshot into lookup tables keyed by
/// lowercase id:
///
/// ```json
/// { "categories": { id: category }, "indexPools": { id: pool }, "tokens": { id: token } }
/// ```
///
/// Each pool keeps its fields, its `category` becomes the category id and its
/// `tokens` list becomes `tokenIds`, in pool order. Token records are
/// collected once across all pools, with the pool's per-token record (balance,
/// weights) kept under the pool as `records`.
pub fn normalize_index_pools(mut data: Value) -> Result<Value, OffChainError> {
    let Some(Value::Array(pools)) = data.get_mut("indexPools").map(Value::take) else {
        return Err(OffChainError::payload("index snapshot has no indexPools list"));
    };
    let categories = match data.get_mut("categories").map(Value::take) {
        Some(Value::Array(categories)) => categories,
        _ => Vec::new(),
    };

    let mut category_table = Map::new();
    for category in categories {
        if let Some(id) = lowercase_id(&category) {
            category_table.insert(id, category);
        }
    }

    let mut pool_table = Map::new();
    let mut token_table = Map::new();
    for mut pool in pools {
        let Some(id) = lowercase_id(&pool) else {
            continue;
        };
        let Some(fields) = pool.as_object_mut() else {
            continue;
        };

        if let Some(category) = fields.get("category").and_then(lowercase_id) {
            fields.insert("category".to_string(), Value::String(category));
        }

        let records = match fields.remove("tokens") {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        };
        let mut token_ids = Vec::with_capacity(records.len());
        let mut pool_records = Map::new();
        for mut record in records {
            let Some(token) = record.get_mut("token").map(Value::take) else {
                continue;
            };
            let Some(token_id) = lowercase_id(&token) else {
                continue;
            };
            if let Some(record) = record.as_object_mut() {
                record.remove("token");
            }
            token_table.entry(token_id.clone()).or_insert(token);
            pool_records.insert(token_id.clone(), record);
            token_ids.push(Value::String(token_id));
        }
        fields.insert("tokenIds".to_string(), Value::Array(token_ids));
        fields.insert("records".to_string(), Value::Object(pool_records));

        pool_table.insert(id, pool);
    }

    Ok(json!({
        "categories": category_table,
        "indexPools": pool_table,
        "tokens": token_table,
    }))
}

fn lowercase_id(entity: &Value) -> Option<String> {
    entity.get("id")?.as_str().map(str::to_lowercase)
}

/// Serves [`OffChainKind::StakingData`]: the staking pools of the connected
/// chain's index subgraph. Takes no arguments.
#[derive(Debug, Clone)]
pub struct StakingSource {
    client: reqwest::Client,
    endpoints: SubgraphEndpoints,
}

impl StakingSource {
    /// Creates the source.
    pub fn new(client: reqwest::Client, endpoints: SubgraphEndpoints) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl OffChainSource for StakingSource {
    fn kind(&self) -> OffChainKind {
        OffChainKind::StakingData
    }

    async fn fetch(
        &self,
        connection: Option<&ConnectionContext>,
        _args: &[String],
    ) -> Result<Value, OffChainError> {
        let url = self.endpoints.index_for(connection)?;
        post_graphql(&self.client, url, STAKING_QUERY, json!({})).await
    }
}
