use serde::{Deserialize, Serialize};

use crate::{db_types::PaymentStatus, recon_api::ReconciliationError};

/// A payment notification as delivered by the payment provider.
///
/// ```json
/// { "transactionId": "tx-abc", "paymentStatus": "APPROVED" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub transaction_id: String,
    pub payment_status: String,
}

impl WebhookEvent {
    pub fn new<S: Into<String>>(transaction_id: S, payment_status: S) -> Self {
        Self { transaction_id: transaction_id.into(), payment_status: payment_status.into() }
    }

    pub fn from_json(json: &str) -> Result<Self, ReconciliationError> {
        serde_json::from_str(json).map_err(|e| ReconciliationError::Validation(format!("Malformed webhook body. {e}")))
    }

    /// Checks the event and returns the trimmed transaction id and the parsed status. Unknown statuses are rejected.
    pub fn validate(&self) -> Result<(String, PaymentStatus), ReconciliationError> {
        let txid = self.transaction_id.trim();
        if txid.is_empty() {
            return Err(ReconciliationError::Validation("The transaction id is blank".to_string()));
        }
        let status =
            self.payment_status.parse::<PaymentStatus>().map_err(|e| ReconciliationError::Validation(e.to_string()))?;
        Ok((txid.to_string(), status))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_webhook() {
        let event = WebhookEvent::from_json(r#"{"transactionId": " tx-abc ", "paymentStatus": "approved"}"#).unwrap();
        let (txid, status) = event.validate().unwrap();
        assert_eq!(txid, "tx-abc");
        assert_eq!(status, PaymentStatus::Approved);
    }

    #[test]
    fn invalid_webhooks() {
        assert!(WebhookEvent::from_json(r#"{"transactionId": "tx-abc"}"#).is_err());
        assert!(WebhookEvent::new("  ", "APPROVED").validate().is_err());
        assert!(matches!(
            WebhookEvent::new("tx-abc", "REFUNDED").validate(),
            Err(ReconciliationError::Validation(_))
        ));
    }
}
