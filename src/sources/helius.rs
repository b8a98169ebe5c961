//! Helius JSON-RPC and DAS client.
//!
//! - `getAsset` (DAS) for name and symbol
//! - `getAccountInfo` with `jsonParsed` encoding for the mint account
//! - `getTokenAccounts` (DAS) for the holder sample, ranked locally

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{EnrichmentSource, HolderPage, TokenInfo, TokenMetadata};
use crate::domain::Mint;
use crate::error::FetchError;

/// Accounts requested per holder page. Balances are ranked locally and
/// the requested limit is taken from the top.
const HOLDER_PAGE_SIZE: u32 = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Enrichment source backed by a Helius RPC endpoint.
#[derive(Debug, Clone)]
pub struct HeliusSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HeliusSource {
    /// Creates a client for `rpc_url` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(rpc_url: &str, api_key: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client {
                status: 0,
                message: format!("http client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/?api-key={api_key}", rpc_url.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, FetchError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "token-radar",
            "method": method,
            "params": params,
        });
        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), text));
        }
        let envelope: RpcEnvelope<T> = response.json().await?;
        envelope.into_result()
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl<T> RpcEnvelope<T> {
    fn into_result(self) -> Result<T, FetchError> {
        if let Some(err) = self.error {
            return Err(classify_rpc_error(err.code, err.message));
        }
        self.result.ok_or_else(|| FetchError::Client {
            status: 404,
            message: "empty result".to_string(),
        })
    }
}

/// Invalid request/params and not-found style codes are client errors;
/// rate limits and server-side codes are transient.
fn classify_rpc_error(code: i64, message: String) -> FetchError {
    match code {
        -32600 | -32602 | -32601 => FetchError::Client {
            status: 400,
            message,
        },
        -32429 => FetchError::Transient(format!("rate limited: {message}")),
        _ if message.to_ascii_lowercase().contains("not found") => FetchError::Client {
            status: 404,
            message,
        },
        _ => FetchError::Transient(format!("rpc {code}: {message}")),
    }
}

#[derive(Debug, Deserialize)]
struct AssetResult {
    #[serde(default)]
    content: Option<AssetContent>,
    #[serde(default)]
    token_info: Option<AssetTokenInfo>,
}

#[derive(Debug, Deserialize)]
struct AssetContent {
    #[serde(default)]
    metadata: Option<AssetMetadata>,
}

#[derive(Debug, Deserialize)]
struct AssetMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetTokenInfo {
    #[serde(default)]
    symbol: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<AssetResult> for TokenMetadata {
    fn from(asset: AssetResult) -> Self {
        let metadata = asset.content.and_then(|c| c.metadata);
        let (name, symbol) = metadata.map_or((None, None), |m| (m.name, m.symbol));
        Self {
            name: non_blank(name),
            symbol: non_blank(symbol).or_else(|| non_blank(asset.token_info.and_then(|t| t.symbol))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    value: Option<AccountValue>,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedMint {
    decimals: u8,
    supply: String,
    #[serde(default)]
    mint_authority: Option<String>,
    #[serde(default)]
    freeze_authority: Option<String>,
}

fn parse_mint_account(result: AccountInfoResult) -> Result<TokenInfo, FetchError> {
    let Some(value) = result.value else {
        return Err(FetchError::Client {
            status: 404,
            message: "mint account not found".to_string(),
        });
    };
    let info = value
        .data
        .pointer("/parsed/info")
        .cloned()
        .ok_or_else(|| FetchError::Decode("account is not a parsed mint".to_string()))?;
    let parsed: ParsedMint =
        serde_json::from_value(info).map_err(|e| FetchError::Decode(e.to_string()))?;
    let raw_supply: f64 = parsed
        .supply
        .parse()
        .map_err(|_| FetchError::Decode(format!("bad supply {}", parsed.supply)))?;
    Ok(TokenInfo {
        decimals: parsed.decimals,
        supply: raw_supply / 10f64.powi(i32::from(parsed.decimals)),
        mint_authority: parsed.mint_authority,
        freeze_authority: parsed.freeze_authority,
    })
}

#[derive(Debug, Deserialize)]
struct TokenAccountsResult {
    #[serde(default)]
    token_accounts: Vec<TokenAccount>,
}

#[derive(Debug, Deserialize)]
struct TokenAccount {
    #[serde(default)]
    amount: f64,
}

/// Ranks raw balances largest first and keeps `limit` of them. The holder
/// total is the count of non-empty accounts on the page.
fn rank_holders(accounts: &[TokenAccount], limit: u32) -> HolderPage {
    let mut balances: Vec<f64> = accounts
        .iter()
        .map(|a| a.amount)
        .filter(|a| a.is_finite() && *a > 0.0)
        .collect();
    let total = balances.len() as u64;
    balances.sort_by(|a, b| b.total_cmp(a));
    balances.truncate(limit as usize);
    HolderPage {
        balances,
        total: Some(total),
    }
}

#[async_trait]
impl EnrichmentSource for HeliusSource {
    async fn fetch_token_metadata(&self, mint: &Mint) -> Result<TokenMetadata, FetchError> {
        let asset: AssetResult = self
            .call("getAsset", json!({ "id": mint.as_str() }))
            .await?;
        Ok(asset.into())
    }

    async fn fetch_token_info(&self, mint: &Mint) -> Result<TokenInfo, FetchError> {
        let result: AccountInfoResult = self
            .call(
                "getAccountInfo",
                json!([mint.as_str(), { "encoding": "jsonParsed" }]),
            )
            .await?;
        parse_mint_account(result)
    }

    async fn fetch_token_holders(
        &self,
        mint: &Mint,
        limit: u32,
    ) -> Result<HolderPage, FetchError> {
        let result: TokenAccountsResult = self
            .call(
                "getTokenAccounts",
                json!({ "mint": mint.as_str(), "limit": HOLDER_PAGE_SIZE, "page": 1 }),
            )
            .await?;
        // Raw amounts share one decimals scale, so ranking and percentages
        // are unaffected by not converting to UI units.
        Ok(rank_holders(&result.token_accounts, limit))
    }
}
