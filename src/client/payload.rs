//! Caller-facing payloads.

use serde::{Deserialize, Serialize};

/// A business record to notarize: its id and content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransPayload {
    pub business_id: String,
    pub hash: String,
}

impl CreateTransPayload {
    pub fn new(business_id: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            business_id: business_id.into(),
            hash: hash.into(),
        }
    }

    /// Both fields must be present and non-blank.
    pub fn validate(&self) -> Result<(), String> {
        if self.business_id.trim().is_empty() {
            return Err("businessId must not be empty".to_string());
        }
        if self.hash.trim().is_empty() {
            return Err("hash must not be empty".to_string());
        }
        Ok(())
    }
}

/// Transaction id handed back after a commit or a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let payload: CreateTransPayload =
            serde_json::from_str(r#"{"businessId":"B1","hash":"H1"}"#).unwrap();
        assert_eq!(payload, CreateTransPayload::new("B1", "H1"));
        assert!(payload.validate().is_ok());

        let json = serde_json::to_string(&TransactionReceipt {
            transaction_id: "abc".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"transactionId":"abc"}"#);
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert!(CreateTransPayload::new(" ", "H1").validate().is_err());
        assert!(CreateTransPayload::new("B1", "").validate().is_err());
    }
}
