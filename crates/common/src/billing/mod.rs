//! Quotes and payment settlement
//!
//! A quote is the sum of the selected papers' fees plus a platform fee
//! percentage. Settlement is pluggable: the simulated processor moves no
//! value and says so on its receipt; the ledger processor executes a real
//! transfer and only succeeds on a successful receipt.

use crate::config::PaymentConfig;
use crate::db::models::{PaymentReceipt, Quote, RelatedPaper};
use crate::errors::{AppError, Result};
use crate::ledger::{Ledger, TransferSpec};
use crate::metrics;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Decimal places of the native currency (tinybars)
pub const NATIVE_DECIMALS: u32 = 8;

/// Round to 8 decimal places
fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

impl Quote {
    /// Price a selection with the platform fee added on top
    pub fn compute(papers: Vec<RelatedPaper>, platform_fee_percent: f64) -> Self {
        let papers_cost = round8(papers.iter().map(|p| p.fee).sum());
        let platform_fee = round8(papers_cost * platform_fee_percent / 100.0);

        Self {
            papers_cost,
            platform_fee,
            total: round8(papers_cost + platform_fee),
            papers,
        }
    }

    pub fn paper_ids(&self) -> Vec<String> {
        self.papers.iter().map(|p| p.paper_id.clone()).collect()
    }
}

/// Settles a quote for a session
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn settle(&self, session_id: Uuid, quote: &Quote) -> Result<PaymentReceipt>;

    /// Mode label for logs and metrics
    fn mode(&self) -> &str;
}

/// Records a payment without moving any value
#[derive(Debug, Clone, Default)]
pub struct SimulatedPayment;

#[async_trait]
impl PaymentProcessor for SimulatedPayment {
    async fn settle(&self, session_id: Uuid, quote: &Quote) -> Result<PaymentReceipt> {
        info!(session_id = %session_id, total = quote.total, "Simulated payment recorded");
        metrics::record_payment(self.mode(), true);

        Ok(PaymentReceipt {
            simulated: true,
            transaction_id: None,
            amount: quote.total,
            paper_ids: quote.paper_ids(),
            settled_at: Utc::now(),
        })
    }

    fn mode(&self) -> &str {
        "simulated"
    }
}

/// Pays the quote total from the operator to a recipient account
pub struct LedgerPayment {
    ledger: Arc<dyn Ledger>,
    recipient: String,
    token: Option<String>,
    decimals: u32,
}

impl LedgerPayment {
    /// `token` of `None` pays in the native currency
    pub fn new(
        ledger: Arc<dyn Ledger>,
        recipient: String,
        token: Option<String>,
        token_decimals: u32,
    ) -> Self {
        let decimals = if token.is_some() {
            token_decimals
        } else {
            NATIVE_DECIMALS
        };
        Self {
            ledger,
            recipient,
            token,
            decimals,
        }
    }

    /// Quote total in the smallest unit
    pub fn base_units(&self, total: f64) -> Result<i64> {
        let scaled = (total * 10f64.powi(self.decimals as i32)).round();
        if !scaled.is_finite() || scaled < 0.0 || scaled > i64::MAX as f64 {
            return Err(AppError::PaymentFailed {
                message: format!("Amount {} cannot be represented", total),
            });
        }
        Ok(scaled as i64)
    }
}

#[async_trait]
impl PaymentProcessor for LedgerPayment {
    async fn settle(&self, session_id: Uuid, quote: &Quote) -> Result<PaymentReceipt> {
        let amount = self.base_units(quote.total)?;

        let transaction_id = if amount == 0 {
            None
        } else {
            let spec = TransferSpec {
                token: self.token.clone(),
                from: self.ledger.operator(),
                to: self.recipient.clone(),
                amount,
            };

            match self.ledger.transfer(&spec).await {
                Ok(receipt) => {
                    info!(
                        session_id = %session_id,
                        transaction_id = %receipt.transaction_id,
                        amount,
                        "Ledger payment settled"
                    );
                    Some(receipt.transaction_id)
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Ledger payment failed");
                    metrics::record_payment(self.mode(), false);
                    return Err(AppError::PaymentFailed {
                        message: e.to_string(),
                    });
                }
            }
        };

        metrics::record_payment(self.mode(), true);
        Ok(PaymentReceipt {
            simulated: false,
            transaction_id,
            amount: quote.total,
            paper_ids: quote.paper_ids(),
            settled_at: Utc::now(),
        })
    }

    fn mode(&self) -> &str {
        "ledger"
    }
}

/// Create a payment processor based on configuration
pub fn create_payment_processor(
    config: &PaymentConfig,
    ledger: Option<Arc<dyn Ledger>>,
    token: Option<String>,
    token_decimals: u32,
) -> Result<Arc<dyn PaymentProcessor>> {
    match config.mode.as_str() {
        "simulated" => Ok(Arc::new(SimulatedPayment)),
        "ledger" => {
            let ledger = ledger.ok_or_else(|| AppError::Configuration {
                message: "Ledger payments need a ledger provider".to_string(),
            })?;
            let recipient = config
                .recipient_account
                .clone()
                .ok_or_else(|| AppError::Configuration {
                    message: "Ledger payments need payment.recipient_account".to_string(),
                })?;
            Ok(Arc::new(LedgerPayment::new(
                ledger,
                recipient,
                token,
                token_decimals,
            )))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown payment mode: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, TokenSpec};

    fn related(id: &str, fee: f64) -> RelatedPaper {
        RelatedPaper {
            paper_id: id.to_string(),
            title: id.to_uppercase(),
            fee,
            content_id: None,
        }
    }

    #[test]
    fn test_quote_with_platform_fee() {
        let quote = Quote::compute(vec![related("a", 5.0), related("b", 10.0)], 5.0);
        assert_eq!(quote.papers_cost, 15.0);
        assert_eq!(quote.platform_fee, 0.75);
        assert_eq!(quote.total, 15.75);
        assert_eq!(quote.paper_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_quote_rounds_to_eight_places() {
        let quote = Quote::compute(vec![related("a", 0.1), related("b", 0.2)], 0.0);
        assert_eq!(quote.papers_cost, 0.3);
        assert_eq!(quote.total, 0.3);
    }

    #[tokio::test]
    async fn test_simulated_receipt_is_marked() {
        let quote = Quote::compute(vec![related("a", 5.0)], 5.0);
        let receipt = SimulatedPayment.settle(Uuid::new_v4(), &quote).await.unwrap();
        assert!(receipt.simulated);
        assert!(receipt.transaction_id.is_none());
        assert_eq!(receipt.amount, 5.25);
    }

    #[tokio::test]
    async fn test_ledger_payment_moves_tokens() {
        let ledger = Arc::new(MemoryLedger::new("0.0.2"));
        let token = ledger
            .create_token(&TokenSpec {
                name: "Paper Token".into(),
                symbol: "PAPR".into(),
                decimals: 2,
                initial_supply: 100_000,
            })
            .await
            .unwrap();

        let payment = LedgerPayment::new(ledger.clone(), "0.0.7".into(), Some(token.clone()), 2);
        let quote = Quote::compute(vec![related("a", 5.0), related("b", 10.0)], 5.0);
        let receipt = payment.settle(Uuid::new_v4(), &quote).await.unwrap();

        assert!(!receipt.simulated);
        assert!(receipt.transaction_id.is_some());
        assert_eq!(ledger.balance(Some(&token), "0.0.7").await, 1575);
    }

    #[tokio::test]
    async fn test_ledger_payment_failure_surfaces() {
        let ledger = Arc::new(MemoryLedger::new("0.0.2"));
        // Token never created, so the operator holds none of it
        let payment = LedgerPayment::new(ledger, "0.0.7".into(), Some("0.0.4242".into()), 2);
        let quote = Quote::compute(vec![related("a", 5.0)], 0.0);

        let err = payment.settle(Uuid::new_v4(), &quote).await.unwrap_err();
        assert!(matches!(err, AppError::PaymentFailed { .. }));
    }

    #[test]
    fn test_native_amounts_use_tinybars() {
        let payment = LedgerPayment::new(Arc::new(MemoryLedger::new("0.0.2")), "0.0.7".into(), None, 2);
        assert_eq!(payment.base_units(1.5).unwrap(), 150_000_000);
    }

    #[test]
    fn test_factory_requires_ledger_for_ledger_mode() {
        let config = PaymentConfig {
            mode: "ledger".to_string(),
            recipient_account: Some("0.0.7".to_string()),
            ..PaymentConfig::default()
        };
        assert!(create_payment_processor(&config, None, None, 2).is_err());

        let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new("0.0.2"));
        let processor = create_payment_processor(&config, Some(ledger), None, 2).unwrap();
        assert_eq!(processor.mode(), "ledger");
    }
}
