//! Event normalizer: dedup gate, classification and extraction.
//!
//! Classification precedence, first match wins:
//!
//! 1. declared type field (`SWAP`, `CREATE_POOL`, `TRANSFER`, ...)
//! 2. source name matched against known DEX names
//! 3. instruction program ids matched against the DEX program registry
//! 4. any token transfer present (generic transfer)
//! 5. otherwise unrecognized
//!
//! Each raw event yields at most one [`NormalizedEvent`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::raw_event::LAMPORTS_PER_SOL;
use crate::domain::{
    DedupCache, KeySpace, Mint, NormalizedEvent, NormalizedPoolCreation, NormalizedSwap,
    Provenance, RawEvent, Side, TokenSighting, TokenTransfer,
};

/// Known DEX program ids and their venue labels.
pub const DEX_PROGRAMS: &[(&str, &str)] = &[
    ("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8", "raydium_amm"),
    ("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C", "raydium_cpmm"),
    ("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK", "raydium_clmm"),
    ("LanMV9sAd7wArD4vJFi2qDdfnVhFxYSUg6eADduJ3uj", "raydium_launchlab"),
    ("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P", "pump_fun"),
    ("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA", "pumpswap"),
    ("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc", "orca"),
    ("LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo", "meteora_dlmm"),
    ("cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG", "meteora_damm_v2"),
    ("Eo7WjKq67rjJQSZxS6z3YkapzY3eMj6Xy8X5EQVn5UaB", "meteora_pools"),
    ("JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4", "jupiter"),
    ("MoonCVVNZFSYkqNXP6bxHLPL6QQJiMagDL3qcqUQTrG", "moonshot"),
];

/// Upstream source names that identify a DEX trade.
pub const DEX_SOURCES: &[&str] = &[
    "RAYDIUM",
    "RAYDIUM_CPMM",
    "RAYDIUM_CLMM",
    "PUMP_FUN",
    "PUMP_AMM",
    "JUPITER",
    "ORCA",
    "WHIRLPOOL",
    "METEORA",
    "METEORA_DLMM",
    "MOONSHOT",
    "LIFINITY",
    "PHOENIX",
    "OPENBOOK",
];

const POOL_CREATION_TYPES: &[&str] = &[
    "CREATE_POOL",
    "INITIALIZE_POOL",
    "CREATE_AMM",
    "INITIALIZE_AMM",
    "CREATE_LIQUIDITY_POOL",
];

/// Returns the venue label for a program id in the DEX registry.
#[must_use]
pub fn dex_label(program_id: &str) -> Option<&'static str> {
    DEX_PROGRAMS
        .iter()
        .find(|(id, _)| *id == program_id)
        .map(|(_, label)| *label)
}

/// Record category chosen by the classification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Token-vs-quote trade.
    Swap,
    /// Pool creation.
    PoolCreation,
    /// Generic token transfer.
    Transfer,
    /// Nothing recognizable.
    Unrecognized,
}

/// Classification result: category plus the rule that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Chosen category.
    pub category: Category,
    /// Rule that produced it; `None` for unrecognized events.
    pub provenance: Option<Provenance>,
}

impl Classification {
    const fn new(category: Category, provenance: Provenance) -> Self {
        Self {
            category,
            provenance: Some(provenance),
        }
    }
}

/// Per-event extraction failure. Logged and skipped by batch callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    /// A transfer amount was NaN or infinite.
    #[error("non-finite amount on transfer of {mint}")]
    NonFiniteAmount {
        /// Mint of the offending transfer.
        mint: String,
    },
}

/// Classifies a raw event. Pure; no dedup side effects.
#[must_use]
pub fn classify(event: &RawEvent) -> Classification {
    if let Some(declared) = event.declared_type.as_deref() {
        let declared = declared.trim().to_ascii_uppercase();
        if declared == "SWAP" {
            return Classification::new(Category::Swap, Provenance::DeclaredType);
        }
        if POOL_CREATION_TYPES.contains(&declared.as_str()) {
            return Classification::new(Category::PoolCreation, Provenance::DeclaredType);
        }
        if declared == "TRANSFER" {
            return Classification::new(Category::Transfer, Provenance::DeclaredType);
        }
    }

    if let Some(source) = event.source.as_deref()
        && DEX_SOURCES.contains(&source.trim().to_ascii_uppercase().as_str())
    {
        return Classification::new(Category::Swap, Provenance::SourceName);
    }

    if event.program_ids().into_iter().any(|id| dex_label(id).is_some()) {
        return Classification::new(Category::Swap, Provenance::ProgramRegistry);
    }

    if !event.token_transfers.is_empty() {
        return Classification::new(Category::Transfer, Provenance::TransferFallback);
    }

    Classification {
        category: Category::Unrecognized,
        provenance: None,
    }
}

/// Quote-side amounts found on a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct QuoteLeg {
    mint: Option<&'static str>,
    sol: Option<f64>,
    usd: Option<f64>,
}

fn finite(transfer: &TokenTransfer) -> Result<f64, NormalizeError> {
    if transfer.token_amount.is_finite() {
        Ok(transfer.token_amount.abs())
    } else {
        Err(NormalizeError::NonFiniteAmount {
            mint: transfer.mint.clone(),
        })
    }
}

/// Dedup-gated conversion of raw events into canonical records.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    dedup: Arc<DedupCache>,
    sol_price_usd: f64,
}

impl EventNormalizer {
    /// Creates a normalizer gated by `dedup`, converting native amounts
    /// to USD at `sol_price_usd`.
    #[must_use]
    pub fn new(dedup: Arc<DedupCache>, sol_price_usd: f64) -> Self {
        Self {
            dedup,
            sol_price_usd,
        }
    }

    /// Returns the shared dedup cache.
    #[must_use]
    pub fn dedup(&self) -> &Arc<DedupCache> {
        &self.dedup
    }

    /// Dedup gate. Returns `true` the first time an event is seen, keyed
    /// by signature or, without one, by the derived event id.
    #[must_use]
    pub fn admit(&self, event: &RawEvent) -> bool {
        match event.signature.as_deref() {
            Some(signature) if !signature.is_empty() => {
                self.dedup.check_and_mark(KeySpace::Signature, signature)
            }
            _ => self
                .dedup
                .check_and_mark(KeySpace::EventId, &event.derived_event_id()),
        }
    }

    /// Dedup-gates and normalizes a batch in order. Duplicates are
    /// omitted; failing events are logged and skipped.
    #[must_use]
    pub fn normalize_batch(&self, events: &[RawEvent], now: DateTime<Utc>) -> Vec<NormalizedEvent> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            if !self.admit(event) {
                tracing::debug!(signature = ?event.signature, "duplicate event skipped");
                continue;
            }
            match self.normalize(event, now) {
                Ok(normalized) => out.push(normalized),
                Err(e) => {
                    tracing::warn!(signature = ?event.signature, error = %e, "event normalization failed");
                }
            }
        }
        out
    }

    /// Classifies and extracts one event without touching the dedup cache.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError`] when the event carries unusable amounts.
    pub fn normalize(
        &self,
        event: &RawEvent,
        now: DateTime<Utc>,
    ) -> Result<NormalizedEvent, NormalizeError> {
        let classification = classify(event);
        let Some(provenance) = classification.provenance else {
            return Ok(NormalizedEvent::Unrecognized);
        };
        let normalized = match classification.category {
            Category::Swap => self
                .extract_swap(event, provenance, now)?
                .map(NormalizedEvent::Swap),
            Category::PoolCreation => self
                .extract_pool(event, now)?
                .map(NormalizedEvent::PoolCreation),
            Category::Transfer => {
                subject_transfer(event).map(|transfer| {
                    NormalizedEvent::TokenSighting(TokenSighting {
                        token_mint: Mint::from(transfer.mint.as_str()),
                        signature: event.signature.clone(),
                        seen_at: event.timestamp_or(now),
                    })
                })
            }
            Category::Unrecognized => None,
        };
        Ok(normalized.unwrap_or(NormalizedEvent::Unrecognized))
    }

    fn extract_swap(
        &self,
        event: &RawEvent,
        provenance: Provenance,
        now: DateTime<Utc>,
    ) -> Result<Option<NormalizedSwap>, NormalizeError> {
        let Some(signature) = event.signature.clone().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let Some(subject) = subject_transfer(event) else {
            return Ok(None);
        };
        let token_mint = Mint::from(subject.mint.as_str());
        if token_mint.is_quote_asset() {
            return Ok(None);
        }
        let amount_token = finite(subject)?;
        let quote = self.quote_leg(event)?;

        let fee_payer = event.fee_payer.as_deref();
        let (side, buyer, seller) = match fee_payer {
            Some(payer) if subject.to_user_account.as_deref() == Some(payer) => {
                (Side::Buy, Some(payer.to_string()), None)
            }
            Some(payer) if subject.from_user_account.as_deref() == Some(payer) => {
                (Side::Sell, None, Some(payer.to_string()))
            }
            _ => (Side::Unknown, None, None),
        };

        let (dex, pool_address) = venue(event);
        Ok(Some(NormalizedSwap {
            token_mint,
            signature,
            timestamp: event.timestamp_or(now),
            side,
            amount_usd: quote.usd,
            amount_token: (amount_token > 0.0).then_some(amount_token),
            amount_sol: quote.sol,
            buyer,
            seller,
            pool_address,
            dex,
            provenance,
        }))
    }

    fn extract_pool(
        &self,
        event: &RawEvent,
        now: DateTime<Utc>,
    ) -> Result<Option<NormalizedPoolCreation>, NormalizeError> {
        let Some(subject) = subject_transfer(event) else {
            return Ok(None);
        };
        let token_mint = Mint::from(subject.mint.as_str());
        let quote = self.quote_leg(event)?;
        let (dex, pool_address) = venue(event);
        let pool_address = pool_address.or_else(|| {
            event
                .instructions
                .first()
                .and_then(|ix| ix.accounts.first())
                .cloned()
        });

        // A fresh pool holds equal value on both sides.
        Ok(Some(NormalizedPoolCreation {
            base_mint: token_mint.clone(),
            token_mint,
            pool_address,
            dex: dex.unwrap_or_else(|| "unknown".to_string()),
            quote_mint: quote.mint.map(Mint::from),
            created_at: event.timestamp_or(now),
            signature: event.signature.clone(),
            initial_liquidity_usd: quote.usd.map(|usd| usd * 2.0),
            initial_liquidity_sol: quote.sol.map(|sol| sol * 2.0),
        }))
    }

    /// Finds the quote leg: the first native or stablecoin token transfer
    /// with a positive amount, else the sum of all native lamport transfers.
    fn quote_leg(&self, event: &RawEvent) -> Result<QuoteLeg, NormalizeError> {
        for transfer in &event.token_transfers {
            let mint = Mint::from(transfer.mint.as_str());
            if mint.is_native() {
                let sol = finite(transfer)?;
                if sol > 0.0 {
                    return Ok(self.sol_leg(sol, Some(crate::domain::mint::WSOL_MINT)));
                }
            } else if mint.is_stable() {
                let usd = finite(transfer)?;
                if usd > 0.0 {
                    let label = crate::domain::mint::STABLE_MINTS
                        .iter()
                        .copied()
                        .find(|m| *m == transfer.mint);
                    return Ok(QuoteLeg {
                        mint: label,
                        sol: Some(usd / self.sol_price_usd),
                        usd: Some(usd),
                    });
                }
            }
        }

        let lamports: u64 = event
            .native_transfers
            .iter()
            .map(|t| t.amount.unsigned_abs())
            .fold(0u64, u64::saturating_add);
        #[allow(clippy::cast_precision_loss)]
        let sol = lamports as f64 / LAMPORTS_PER_SOL;
        Ok(self.sol_leg(sol, None))
    }

    fn sol_leg(&self, sol: f64, mint: Option<&'static str>) -> QuoteLeg {
        if sol > 0.0 {
            QuoteLeg {
                mint,
                sol: Some(sol),
                usd: Some(sol * self.sol_price_usd),
            }
        } else {
            QuoteLeg {
                mint,
                ..QuoteLeg::default()
            }
        }
    }
}

/// First token transfer whose mint is not a quote asset.
fn subject_transfer(event: &RawEvent) -> Option<&TokenTransfer> {
    event
        .token_transfers
        .iter()
        .find(|t| !t.mint.is_empty() && !Mint::from(t.mint.as_str()).is_quote_asset())
}

/// Venue label and provisional pool address from the first instruction
/// (depth-first) whose program is in the DEX registry. Falls back to the
/// upstream source name for the label.
fn venue(event: &RawEvent) -> (Option<String>, Option<String>) {
    fn find(
        instructions: &[crate::domain::Instruction],
    ) -> Option<(&'static str, Option<&String>)> {
        for ix in instructions {
            if let Some(label) = dex_label(&ix.program_id) {
                return Some((label, ix.accounts.first()));
            }
            if let Some(found) = find(&ix.inner_instructions) {
                return Some(found);
            }
        }
        None
    }

    match find(&event.instructions) {
        Some((label, account)) => (Some(label.to_string()), account.cloned()),
        None => (
            event
                .source
                .as_deref()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty() && s != "unknown"),
            None,
        ),
    }
}
