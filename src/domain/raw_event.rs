//! Inbound transaction-shaped records as delivered by the webhook source.
//!
//! Field names follow the upstream enhanced-transaction JSON (camelCase).
//! Every field is optional: upstream classification decides which ones
//! are populated, and the normalizer never assumes any of them exist.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// A single transaction record from the event source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Transaction signature (unique id), when present.
    #[serde(default)]
    pub signature: Option<String>,
    /// Block time in epoch seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Upstream-declared transaction type (e.g. `"SWAP"`).
    #[serde(default, rename = "type")]
    pub declared_type: Option<String>,
    /// Upstream-declared source program name (e.g. `"RAYDIUM"`).
    #[serde(default)]
    pub source: Option<String>,
    /// Fee payer wallet address.
    #[serde(default)]
    pub fee_payer: Option<String>,
    /// Fungible token transfers.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub token_transfers: Vec<TokenTransfer>,
    /// Native coin transfers (amounts in lamports).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub native_transfers: Vec<NativeTransfer>,
    /// Top-level instructions with their inner instructions.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub instructions: Vec<Instruction>,
    /// Optional pre-parsed event metadata, kept for audit only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<serde_json::Value>,
}

/// A fungible token transfer leg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    /// Mint of the transferred token.
    pub mint: String,
    /// Sending wallet.
    #[serde(default)]
    pub from_user_account: Option<String>,
    /// Receiving wallet.
    #[serde(default)]
    pub to_user_account: Option<String>,
    /// UI amount (decimals already applied).
    #[serde(default)]
    pub token_amount: f64,
}

/// A native coin transfer leg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    /// Sending wallet.
    #[serde(default)]
    pub from_user_account: Option<String>,
    /// Receiving wallet.
    #[serde(default)]
    pub to_user_account: Option<String>,
    /// Amount in lamports.
    #[serde(default)]
    pub amount: i64,
}

/// A program invocation inside the transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Invoked program id.
    pub program_id: String,
    /// Accounts passed to the instruction, in order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub accounts: Vec<String>,
    /// Cross-program invocations made by this instruction.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub inner_instructions: Vec<Instruction>,
}

/// Webhook body: either one record or an ordered batch of records.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    /// An ordered sequence of records.
    Batch(Vec<RawEvent>),
    /// A single record.
    Single(Box<RawEvent>),
}

impl WebhookPayload {
    /// Flattens the payload into an ordered list of records.
    #[must_use]
    pub fn into_events(self) -> Vec<RawEvent> {
        match self {
            Self::Batch(events) => events,
            Self::Single(event) => vec![*event],
        }
    }
}

impl RawEvent {
    /// Block time as a UTC timestamp, falling back to `now` when absent or
    /// out of range.
    #[must_use]
    pub fn timestamp_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(now)
    }

    /// Program ids of every instruction, inner instructions included, in
    /// depth-first order.
    #[must_use]
    pub fn program_ids(&self) -> Vec<&str> {
        fn walk<'a>(instructions: &'a [Instruction], out: &mut Vec<&'a str>) {
            for ix in instructions {
                out.push(ix.program_id.as_str());
                walk(&ix.inner_instructions, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.instructions, &mut out);
        out
    }

    /// Composite identifier for records that carry no signature.
    #[must_use]
    pub fn derived_event_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.declared_type.as_deref().unwrap_or("UNKNOWN"),
            self.timestamp.unwrap_or_default(),
            self.fee_payer.as_deref().unwrap_or("-"),
        )
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
