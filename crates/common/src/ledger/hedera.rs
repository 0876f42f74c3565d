//! Hedera client through the vendor SDK

use std::future::Future;
use std::str::FromStr;
use std::time::Instant;

use ::hedera::{
    AccountId, Client, Hbar, PrivateKey, TokenCreateTransaction, TokenId, TopicCreateTransaction,
    TopicId, TopicInfoQuery, TopicMessageSubmitTransaction, TransferTransaction,
};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{Ledger, SubmitReceipt, TokenSpec, TopicInfo, TransferReceipt, TransferSpec};
use crate::config::LedgerConfig;
use crate::errors::{AppError, Result};
use crate::metrics;

pub struct HederaLedger {
    client: Client,
    operator_id: AccountId,
    operator_key: PrivateKey,
}

fn ledger_error(e: ::hedera::Error) -> AppError {
    AppError::Ledger {
        message: e.to_string(),
    }
}

fn config_error(message: String) -> AppError {
    AppError::Configuration { message }
}

/// Accepts `0.0.N` or a long-zero EVM address (`0x` + 40 hex digits)
pub fn parse_account(value: &str) -> Result<AccountId> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x") {
        Some(address) => AccountId::from_solidity_address(address),
        None => AccountId::from_str(value),
    };
    parsed.map_err(|e| config_error(format!("Invalid account id '{}': {}", value, e)))
}

fn parse_topic(value: &str) -> Result<TopicId> {
    TopicId::from_str(value).map_err(|e| AppError::Ledger {
        message: format!("Invalid topic id '{}': {}", value, e),
    })
}

fn parse_token(value: &str) -> Result<TokenId> {
    TokenId::from_str(value).map_err(|e| AppError::Ledger {
        message: format!("Invalid token id '{}': {}", value, e),
    })
}

async fn timed<T, F>(operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let result = call.await;
    metrics::record_ledger(start.elapsed().as_secs_f64(), operation, result.is_ok());
    result
}

impl HederaLedger {
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let operator = config
            .operator_id
            .as_deref()
            .ok_or_else(|| config_error("HEDERA_ACCOUNT_ID is required".to_string()))?;
        let key = config
            .operator_key
            .as_deref()
            .ok_or_else(|| config_error("HEDERA_PRIVATE_KEY is required".to_string()))?;

        let operator_id = parse_account(operator)?;
        let operator_key = PrivateKey::from_str(key.trim())
            .map_err(|e| config_error(format!("Invalid operator key: {}", e)))?;

        let client = Client::for_name(&config.network)
            .map_err(|e| config_error(format!("Invalid network '{}': {}", config.network, e)))?;
        client.set_operator(operator_id, operator_key.clone());

        info!(network = %config.network, operator = %operator_id, "Hedera client initialized");

        Ok(Self {
            client,
            operator_id,
            operator_key,
        })
    }
}

#[async_trait]
impl Ledger for HederaLedger {
    async fn create_topic(&self, memo: &str) -> Result<String> {
        timed("create_topic", async {
            let receipt = TopicCreateTransaction::new()
                .topic_memo(memo)
                .execute(&self.client)
                .await
                .map_err(ledger_error)?
                .get_receipt(&self.client)
                .await
                .map_err(ledger_error)?;

            let topic_id = receipt.topic_id.ok_or_else(|| AppError::Ledger {
                message: "Receipt carried no topic id".to_string(),
            })?;
            debug!(topic_id = %topic_id, "Created topic");
            Ok(topic_id.to_string())
        })
        .await
    }

    async fn submit_message(&self, topic_id: &str, message: &[u8]) -> Result<SubmitReceipt> {
        let topic = parse_topic(topic_id)?;
        timed("submit_message", async {
            let response = TopicMessageSubmitTransaction::new()
                .topic_id(topic)
                .message(message.to_vec())
                .execute(&self.client)
                .await
                .map_err(ledger_error)?;
            let receipt = response
                .get_receipt(&self.client)
                .await
                .map_err(ledger_error)?;

            Ok(SubmitReceipt {
                sequence_number: receipt.topic_sequence_number,
                transaction_id: response.transaction_id.to_string(),
            })
        })
        .await
    }

    async fn topic_info(&self, topic_id: &str) -> Result<TopicInfo> {
        let topic = parse_topic(topic_id)?;
        timed("topic_info", async {
            let info = TopicInfoQuery::new()
                .topic_id(topic)
                .execute(&self.client)
                .await
                .map_err(ledger_error)?;

            Ok(TopicInfo {
                topic_id: info.topic_id.to_string(),
                memo: info.topic_memo,
                sequence_number: info.sequence_number,
            })
        })
        .await
    }

    async fn create_token(&self, spec: &TokenSpec) -> Result<String> {
        timed("create_token", async {
            let receipt = TokenCreateTransaction::new()
                .name(spec.name.as_str())
                .symbol(spec.symbol.as_str())
                .decimals(spec.decimals)
                .initial_supply(spec.initial_supply)
                .treasury_account_id(self.operator_id)
                .admin_key(self.operator_key.public_key())
                .execute(&self.client)
                .await
                .map_err(ledger_error)?
                .get_receipt(&self.client)
                .await
                .map_err(ledger_error)?;

            let token_id = receipt.token_id.ok_or_else(|| AppError::Ledger {
                message: "Receipt carried no token id".to_string(),
            })?;
            Ok(token_id.to_string())
        })
        .await
    }

    async fn transfer(&self, spec: &TransferSpec) -> Result<TransferReceipt> {
        let from = parse_account(&spec.from)?;
        let to = parse_account(&spec.to)?;
        let token = spec.token.as_deref().map(parse_token).transpose()?;

        timed("transfer", async {
            let mut tx = TransferTransaction::new();
            match token {
                Some(token) => {
                    tx.token_transfer(token, from, -spec.amount)
                        .token_transfer(token, to, spec.amount);
                }
                None => {
                    tx.hbar_transfer(from, Hbar::from_tinybars(-spec.amount))
                        .hbar_transfer(to, Hbar::from_tinybars(spec.amount));
                }
            }

            let response = tx.execute(&self.client).await.map_err(ledger_error)?;
            let receipt = response
                .get_receipt(&self.client)
                .await
                .map_err(ledger_error)?;

            Ok(TransferReceipt {
                transaction_id: response.transaction_id.to_string(),
                status: format!("{:?}", receipt.status),
            })
        })
        .await
    }

    fn operator(&self) -> String {
        self.operator_id.to_string()
    }
}
