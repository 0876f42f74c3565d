//! In-process ledger with deterministic ids

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Ledger, SubmitReceipt, TokenSpec, TopicInfo, TransferReceipt, TransferSpec};
use crate::errors::{AppError, Result};

/// First entity number handed out
const FIRST_ENTITY: u64 = 1001;

/// Native balance the operator starts with, in tinybars
const OPERATOR_FLOAT: i64 = 1_000 * 100_000_000;

#[derive(Debug)]
struct Topic {
    memo: String,
    messages: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct State {
    next_entity: u64,
    next_tx: u64,
    topics: HashMap<String, Topic>,
    // (token or None for native, account) -> balance
    balances: HashMap<(Option<String>, String), i64>,
    transfers: Vec<TransferSpec>,
}

/// Ledger held in memory; used by tests and the `memory` provider
#[derive(Clone)]
pub struct MemoryLedger {
    operator: String,
    state: Arc<Mutex<State>>,
}

impl MemoryLedger {
    pub fn new(operator: impl Into<String>) -> Self {
        let operator = operator.into();
        let mut balances = HashMap::new();
        balances.insert((None, operator.clone()), OPERATOR_FLOAT);

        Self {
            operator,
            state: Arc::new(Mutex::new(State {
                next_entity: FIRST_ENTITY,
                next_tx: 1,
                topics: HashMap::new(),
                balances,
                transfers: Vec::new(),
            })),
        }
    }

    /// Balance of `account` in `token` (or the native currency)
    pub async fn balance(&self, token: Option<&str>, account: &str) -> i64 {
        let state = self.state.lock().await;
        state
            .balances
            .get(&(token.map(str::to_string), account.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Messages submitted to a topic, oldest first
    pub async fn messages(&self, topic_id: &str) -> Vec<Vec<u8>> {
        let state = self.state.lock().await;
        state
            .topics
            .get(topic_id)
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    pub async fn transfers(&self) -> Vec<TransferSpec> {
        self.state.lock().await.transfers.clone()
    }

    fn transaction_id(&self, state: &mut State) -> String {
        let id = format!("{}@{}.0", self.operator, state.next_tx);
        state.next_tx += 1;
        id
    }
}

impl State {
    fn allocate(&mut self) -> String {
        let id = format!("0.0.{}", self.next_entity);
        self.next_entity += 1;
        id
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create_topic(&self, memo: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        let id = state.allocate();
        state.topics.insert(
            id.clone(),
            Topic {
                memo: memo.to_string(),
                messages: Vec::new(),
            },
        );
        debug!(topic_id = %id, "Created topic");
        Ok(id)
    }

    async fn submit_message(&self, topic_id: &str, message: &[u8]) -> Result<SubmitReceipt> {
        let mut state = self.state.lock().await;
        let transaction_id = self.transaction_id(&mut state);
        let topic = state.topics.get_mut(topic_id).ok_or_else(|| AppError::Ledger {
            message: format!("INVALID_TOPIC_ID: {}", topic_id),
        })?;
        topic.messages.push(message.to_vec());

        Ok(SubmitReceipt {
            sequence_number: topic.messages.len() as u64,
            transaction_id,
        })
    }

    async fn topic_info(&self, topic_id: &str) -> Result<TopicInfo> {
        let state = self.state.lock().await;
        let topic = state.topics.get(topic_id).ok_or_else(|| AppError::Ledger {
            message: format!("INVALID_TOPIC_ID: {}", topic_id),
        })?;

        Ok(TopicInfo {
            topic_id: topic_id.to_string(),
            memo: topic.memo.clone(),
            sequence_number: topic.messages.len() as u64,
        })
    }

    async fn create_token(&self, spec: &TokenSpec) -> Result<String> {
        let supply = i64::try_from(spec.initial_supply).map_err(|_| AppError::Ledger {
            message: "INVALID_TOKEN_INITIAL_SUPPLY".to_string(),
        })?;

        let mut state = self.state.lock().await;
        let id = state.allocate();
        state
            .balances
            .insert((Some(id.clone()), self.operator.clone()), supply);
        Ok(id)
    }

    async fn transfer(&self, spec: &TransferSpec) -> Result<TransferReceipt> {
        if spec.amount <= 0 {
            return Err(AppError::Ledger {
                message: "INVALID_ACCOUNT_AMOUNTS".to_string(),
            });
        }

        let mut state = self.state.lock().await;
        let from_key = (spec.token.clone(), spec.from.clone());
        let available = state.balances.get(&from_key).copied().unwrap_or(0);
        if available < spec.amount {
            return Err(AppError::Ledger {
                message: "INSUFFICIENT_ACCOUNT_BALANCE".to_string(),
            });
        }

        state.balances.insert(from_key, available - spec.amount);
        *state
            .balances
            .entry((spec.token.clone(), spec.to.clone()))
            .or_insert(0) += spec.amount;
        state.transfers.push(spec.clone());

        Ok(TransferReceipt {
            transaction_id: self.transaction_id(&mut state),
            status: "SUCCESS".to_string(),
        })
    }

    fn operator(&self) -> String {
        self.operator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let ledger = MemoryLedger::new("0.0.2");
        assert_eq!(ledger.create_topic("a").await.unwrap(), "0.0.1001");
        assert_eq!(ledger.create_topic("b").await.unwrap(), "0.0.1002");
    }

    #[tokio::test]
    async fn test_submit_advances_sequence() {
        let ledger = MemoryLedger::new("0.0.2");
        let topic = ledger.create_topic("papers").await.unwrap();

        let first = ledger.submit_message(&topic, b"one").await.unwrap();
        let second = ledger.submit_message(&topic, b"two").await.unwrap();
        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);
        assert_ne!(first.transaction_id, second.transaction_id);

        let info = ledger.topic_info(&topic).await.unwrap();
        assert_eq!(info.sequence_number, 2);
        assert_eq!(ledger.messages(&topic).await[1], b"two");
    }

    #[tokio::test]
    async fn test_submit_to_unknown_topic_fails() {
        let ledger = MemoryLedger::new("0.0.2");
        assert!(matches!(
            ledger.submit_message("0.0.42", b"x").await,
            Err(AppError::Ledger { .. })
        ));
    }

    #[tokio::test]
    async fn test_token_transfer_moves_balance() {
        let ledger = MemoryLedger::new("0.0.2");
        let token = ledger
            .create_token(&TokenSpec {
                name: "Paper Token".into(),
                symbol: "PAPR".into(),
                decimals: 2,
                initial_supply: 1_000,
            })
            .await
            .unwrap();

        let receipt = ledger
            .transfer(&TransferSpec {
                token: Some(token.clone()),
                from: "0.0.2".into(),
                to: "0.0.7".into(),
                amount: 250,
            })
            .await
            .unwrap();
        assert_eq!(receipt.status, "SUCCESS");
        assert_eq!(ledger.balance(Some(&token), "0.0.2").await, 750);
        assert_eq!(ledger.balance(Some(&token), "0.0.7").await, 250);
    }

    #[tokio::test]
    async fn test_overdraft_rejected() {
        let ledger = MemoryLedger::new("0.0.2");
        let err = ledger
            .transfer(&TransferSpec {
                token: None,
                from: "0.0.7".into(),
                to: "0.0.2".into(),
                amount: 1,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("INSUFFICIENT_ACCOUNT_BALANCE"));
        assert!(ledger.transfers().await.is_empty());
    }
}
