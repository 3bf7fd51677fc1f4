//! # Payments
//!
//! Tip flow for the wallet mini-app: a reference is issued before the wallet
//! sends funds, and the resulting transaction is checked against the
//! provider before the tip is accepted.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use domains::{AppError, PaymentVerifier, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long an issued reference stays confirmable.
pub const INTENT_TTL: Duration = Duration::hours(1);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentRequest {
    pub to_address: String,
    pub author_name: String,
    pub post_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub to_address: String,
    pub author_name: String,
    pub post_title: String,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

/// Success payload returned by the wallet's pay command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentConfirmation {
    pub reference: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dev_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Value>,
}

pub struct PaymentService {
    verifier: Option<Arc<dyn PaymentVerifier>>,
    ledger: DashMap<String, PaymentIntent>,
    intent_ttl: Duration,
}

impl PaymentService {
    /// Without a verifier every known reference is accepted (development mode).
    pub fn new(verifier: Option<Arc<dyn PaymentVerifier>>) -> Self {
        Self {
            verifier,
            ledger: DashMap::new(),
            intent_ttl: INTENT_TTL,
        }
    }

    pub fn with_intent_ttl(mut self, ttl: Duration) -> Self {
        self.intent_ttl = ttl;
        self
    }

    /// Number of references awaiting confirmation.
    pub fn pending(&self) -> usize {
        self.ledger.len()
    }

    pub fn initiate(&self, request: PaymentRequest) -> PaymentIntent {
        let now = Utc::now();
        self.prune(now);

        let intent = PaymentIntent {
            id: Uuid::new_v4().simple().to_string(),
            to_address: request.to_address,
            author_name: request.author_name,
            post_title: request.post_title,
            created_at: now,
        };
        info!(reference = %intent.id, author = %intent.author_name, post = %intent.post_title, "payment initiated");
        self.ledger.insert(intent.id.clone(), intent.clone());
        intent
    }

    /// Takes the reference out of the ledger for the duration of the check;
    /// it is put back only when the transaction could not be confirmed.
    pub async fn confirm(&self, payload: PaymentConfirmation) -> Result<ConfirmOutcome> {
        if payload.reference.is_empty() || payload.transaction_id.is_empty() {
            return Err(AppError::ValidationError(
                "reference and transaction_id are required".into(),
            ));
        }

        let now = Utc::now();
        self.prune(now);
        let Some((reference, intent)) = self.ledger.remove(&payload.reference) else {
            return Err(AppError::ValidationError("Unknown payment reference".into()));
        };
        if self.is_expired(&intent, now) {
            return Err(AppError::ValidationError("Unknown payment reference".into()));
        }

        let Some(verifier) = &self.verifier else {
            warn!(%reference, "payment verification not configured, accepting in dev mode");
            return Ok(ConfirmOutcome {
                success: true,
                dev_mode: true,
                transaction: None,
            });
        };

        let transaction = match verifier.transaction(&payload.transaction_id).await {
            Ok(transaction) => transaction,
            Err(err) => {
                self.ledger.insert(reference, intent);
                return Err(err);
            }
        };
        let reference_matches =
            transaction.get("reference").and_then(Value::as_str) == Some(reference.as_str());
        let failed = transaction.get("status").and_then(Value::as_str) == Some("failed");

        if reference_matches && !failed {
            info!(%reference, transaction_id = %payload.transaction_id, "payment verified");
            Ok(ConfirmOutcome {
                success: true,
                dev_mode: false,
                transaction: Some(transaction),
            })
        } else {
            warn!(%reference, transaction_id = %payload.transaction_id, "payment verification failed");
            self.ledger.insert(reference, intent);
            Ok(ConfirmOutcome {
                success: false,
                dev_mode: false,
                transaction: Some(transaction),
            })
        }
    }

    fn is_expired(&self, intent: &PaymentIntent, now: DateTime<Utc>) -> bool {
        now - intent.created_at >= self.intent_ttl
    }

    fn prune(&self, now: DateTime<Utc>) {
        let before = self.ledger.len();
        self.ledger.retain(|_, intent| !self.is_expired(intent, now));
        let dropped = before.saturating_sub(self.ledger.len());
        if dropped > 0 {
            debug!(dropped, "expired payment references dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use domains::MockPaymentVerifier;
    use serde_json::json;

    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            to_address: "0xabc".into(),
            author_name: "Alice".into(),
            post_title: "Hello".into(),
        }
    }

    #[test]
    fn references_are_dashless_uuids() {
        let service = PaymentService::new(None);
        let intent = service.initiate(request());
        assert_eq!(intent.id.len(), 32);
        assert!(!intent.id.contains('-'));
        assert_eq!(intent.author_name, "Alice");
    }

    #[tokio::test]
    async fn unknown_reference_is_rejected() {
        let service = PaymentService::new(None);
        let err = service
            .confirm(PaymentConfirmation {
                reference: "never-issued".into(),
                transaction_id: "tx".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn dev_mode_accepts_issued_reference_once() {
        let service = PaymentService::new(None);
        let intent = service.initiate(request());
        let confirmation = PaymentConfirmation {
            reference: intent.id.clone(),
            transaction_id: "tx-1".into(),
        };

        let outcome = service.confirm(confirmation.clone()).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.dev_mode);

        assert!(service.confirm(confirmation).await.is_err());
    }

    #[tokio::test]
    async fn verified_transaction_must_match_reference() {
        let mut verifier = MockPaymentVerifier::new();
        verifier
            .expect_transaction()
            .returning(|_| Ok(json!({ "reference": "someone-else", "status": "mined" })));
        let service = PaymentService::new(Some(Arc::new(verifier)));
        let intent = service.initiate(request());

        let outcome = service
            .confirm(PaymentConfirmation {
                reference: intent.id,
                transaction_id: "tx-1".into(),
            })
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.transaction.unwrap()["reference"], "someone-else");
    }

    #[tokio::test]
    async fn failed_transaction_is_not_accepted() {
        let service_ref = Arc::new(std::sync::Mutex::new(String::new()));
        let expected = service_ref.clone();

        let mut verifier = MockPaymentVerifier::new();
        verifier.expect_transaction().returning(move |_| {
            let reference = expected.lock().unwrap().clone();
            Ok(json!({ "reference": reference, "status": "failed" }))
        });
        let service = PaymentService::new(Some(Arc::new(verifier)));
        let intent = service.initiate(request());
        *service_ref.lock().unwrap() = intent.id.clone();

        let outcome = service
            .confirm(PaymentConfirmation {
                reference: intent.id,
                transaction_id: "tx-1".into(),
            })
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let mut verifier = MockPaymentVerifier::new();
        verifier.expect_transaction().returning(|_| {
            Err(AppError::Upstream {
                status: 404,
                body: json!({ "code": "not_found" }),
            })
        });
        let service = PaymentService::new(Some(Arc::new(verifier)));
        let intent = service.initiate(request());

        let err = service
            .confirm(PaymentConfirmation {
                reference: intent.id,
                transaction_id: "tx-404".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 404, .. }));
    }

    #[tokio::test]
    async fn expired_reference_is_rejected_and_dropped() {
        let service = PaymentService::new(None).with_intent_ttl(Duration::zero());
        let intent = service.initiate(request());

        let err = service
            .confirm(PaymentConfirmation {
                reference: intent.id,
                transaction_id: "tx-1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(service.pending(), 0);
    }

    #[test]
    fn initiating_drops_abandoned_references() {
        let service = PaymentService::new(None).with_intent_ttl(Duration::zero());
        service.initiate(request());
        service.initiate(request());
        assert_eq!(service.pending(), 1);
    }

    #[tokio::test]
    async fn unconfirmed_reference_stays_available() {
        let mut verifier = MockPaymentVerifier::new();
        verifier
            .expect_transaction()
            .returning(|_| Ok(json!({ "reference": "other", "status": "mined" })));
        let service = PaymentService::new(Some(Arc::new(verifier)));
        let intent = service.initiate(request());

        let outcome = service
            .confirm(PaymentConfirmation {
                reference: intent.id,
                transaction_id: "tx-1".into(),
            })
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(service.pending(), 1);
    }

    /// Answers after a delay with whatever reference it was given.
    struct SlowVerifier {
        reference: std::sync::Mutex<String>,
    }

    #[async_trait::async_trait]
    impl PaymentVerifier for SlowVerifier {
        async fn transaction(&self, _transaction_id: &str) -> Result<Value> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let reference = self.reference.lock().unwrap().clone();
            Ok(json!({ "reference": reference, "status": "mined" }))
        }
    }

    #[tokio::test]
    async fn concurrent_confirmations_succeed_once() {
        let verifier = Arc::new(SlowVerifier {
            reference: std::sync::Mutex::new(String::new()),
        });
        let service = PaymentService::new(Some(verifier.clone()));
        let intent = service.initiate(request());
        *verifier.reference.lock().unwrap() = intent.id.clone();

        let confirmation = || PaymentConfirmation {
            reference: intent.id.clone(),
            transaction_id: "tx-1".into(),
        };
        let (first, second) = tokio::join!(
            service.confirm(confirmation()),
            service.confirm(confirmation())
        );

        let successes = [first, second]
            .into_iter()
            .filter(|r| matches!(r, Ok(outcome) if outcome.success))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(service.pending(), 0);
    }
}
