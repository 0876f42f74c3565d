//! Distributed-ledger client abstraction
//!
//! Narrow interface over the ledger operations the service needs:
//! - Consensus topics (create, submit message, query info)
//! - A fungible platform token
//! - Transfers of the native currency or the token
//!
//! Every call is a single request/receipt round trip. Ids are carried as the
//! ledger's textual form (`0.0.1234`).

#[cfg(feature = "hedera")]
mod hedera;
mod memory;

#[cfg(feature = "hedera")]
pub use self::hedera::HederaLedger;
pub use memory::MemoryLedger;

use crate::config::LedgerConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Receipt of a consensus message submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub sequence_number: u64,
    pub transaction_id: String,
}

/// Topic state as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicInfo {
    pub topic_id: String,
    pub memo: String,
    pub sequence_number: u64,
}

/// Fungible token definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
}

/// A single value transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    /// Token to move; `None` moves the native currency
    pub token: Option<String>,
    pub from: String,
    pub to: String,
    /// Amount in the smallest unit (tinybars or token base units)
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_id: String,
    pub status: String,
}

/// Ledger operations used by the gateway and billing
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create a consensus topic with the given memo
    async fn create_topic(&self, memo: &str) -> Result<String>;

    /// Append a message to a topic
    async fn submit_message(&self, topic_id: &str, message: &[u8]) -> Result<SubmitReceipt>;

    async fn topic_info(&self, topic_id: &str) -> Result<TopicInfo>;

    /// Create a fungible token with the operator as treasury
    async fn create_token(&self, spec: &TokenSpec) -> Result<String>;

    async fn transfer(&self, spec: &TransferSpec) -> Result<TransferReceipt>;

    /// Account that signs and pays for transactions
    fn operator(&self) -> String;
}

/// Ids resolved at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerHandles {
    pub registry_topic: Option<String>,
    pub token_id: Option<String>,
}

/// Memo attached to the registry topic
pub const REGISTRY_TOPIC_MEMO: &str = "PaperLedger registry";

/// Create a ledger client based on configuration
///
/// Returns `Ok(None)` for provider `none`.
pub fn create_ledger(config: &LedgerConfig) -> Result<Option<Arc<dyn Ledger>>> {
    match config.provider.as_str() {
        "none" => {
            warn!("Ledger disabled; upload and ledger payments will be unavailable");
            Ok(None)
        }
        "memory" => Ok(Some(Arc::new(MemoryLedger::new("0.0.2")))),
        #[cfg(feature = "hedera")]
        "hedera" => Ok(Some(Arc::new(HederaLedger::from_config(config)?))),
        #[cfg(not(feature = "hedera"))]
        "hedera" => Err(AppError::Configuration {
            message: "Built without the `hedera` feature".to_string(),
        }),
        other => Err(AppError::Configuration {
            message: format!("Unknown ledger provider: {}", other),
        }),
    }
}

/// Resolve the registry topic and platform token, creating them when needed
///
/// Registry handling is best effort: concurrent first starts may each
/// create a topic.
pub async fn bootstrap(ledger: &dyn Ledger, config: &LedgerConfig) -> Result<LedgerHandles> {
    let registry_topic = match config.registry_topic_id.as_deref() {
        Some(id) => match ledger.topic_info(id).await {
            Ok(info) => {
                info!(topic_id = %info.topic_id, sequence = info.sequence_number, "Using registry topic");
                info.topic_id
            }
            Err(e) => {
                warn!(topic_id = %id, error = %e, "Registry topic unreachable, creating a new one");
                create_registry(ledger).await?
            }
        },
        None => create_registry(ledger).await?,
    };

    let token_id = match (&config.token_id, &config.token_name, &config.token_symbol) {
        (Some(id), _, _) => Some(id.clone()),
        (None, Some(name), Some(symbol)) => {
            let spec = TokenSpec {
                name: name.clone(),
                symbol: symbol.clone(),
                decimals: config.token_decimals,
                initial_supply: config.token_initial_supply,
            };
            let id = ledger.create_token(&spec).await?;
            info!(token_id = %id, symbol = %spec.symbol, "Created platform token");
            Some(id)
        }
        _ => None,
    };

    Ok(LedgerHandles {
        registry_topic: Some(registry_topic),
        token_id,
    })
}

async fn create_registry(ledger: &dyn Ledger) -> Result<String> {
    let id = ledger.create_topic(REGISTRY_TOPIC_MEMO).await?;
    info!(topic_id = %id, "Created registry topic; set HEDERA_REGISTRY_TOPIC_ID to reuse it");
    Ok(id)
}
