// ============================================================================
// REMIT-INVOICING - Invoice Model
// ============================================================================
// Invoice records as the backend API represents them. Statuses travel as
// numeric string codes on the wire.
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Invoice lifecycle status.
///
/// Wire codes: "0" draft, "1" processing, "2" completed, "3" overdue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InvoiceStatus {
    Draft,
    Processing,
    Completed,
    Overdue,
}

impl InvoiceStatus {
    pub fn code(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "0",
            InvoiceStatus::Processing => "1",
            InvoiceStatus::Completed => "2",
            InvoiceStatus::Overdue => "3",
        }
    }

    pub fn from_code(code: &str) -> Result<Self, String> {
        match code {
            "0" => Ok(InvoiceStatus::Draft),
            "1" => Ok(InvoiceStatus::Processing),
            "2" => Ok(InvoiceStatus::Completed),
            "3" => Ok(InvoiceStatus::Overdue),
            other => Err(format!("Unknown invoice status code: {}", other)),
        }
    }

    /// Whether a payment may be started from this status. Processing means
    /// a payment was already submitted; Completed is settled.
    pub fn is_activatable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Overdue)
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_code(&value)
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        status.code().to_string()
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::Completed => "completed",
            InvoiceStatus::Overdue => "overdue",
        };
        write!(f, "{}", label)
    }
}

/// Invoice record as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub recipient: String,

    /// Decimal amount as a string; the backend owns rounding
    pub amount: String,
    pub currency: String,

    #[serde(rename = "invoiceStatus")]
    pub status: InvoiceStatus,

    /// Set once an activation payment was submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_tx_hash: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_codes_roundtrip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Processing,
            InvoiceStatus::Completed,
            InvoiceStatus::Overdue,
        ] {
            assert_eq!(InvoiceStatus::from_code(status.code()), Ok(status));
        }
    }

    #[test]
    fn test_status_rejects_unknown_code() {
        assert!(InvoiceStatus::from_code("4").is_err());
        assert!(InvoiceStatus::from_code("draft").is_err());
        assert!(InvoiceStatus::from_code("").is_err());
    }

    #[test]
    fn test_activatable_statuses() {
        assert!(InvoiceStatus::Draft.is_activatable());
        assert!(InvoiceStatus::Overdue.is_activatable());
        assert!(!InvoiceStatus::Processing.is_activatable());
        assert!(!InvoiceStatus::Completed.is_activatable());
    }

    #[test]
    fn test_status_serde_uses_wire_codes() {
        let encoded = serde_json::to_string(&InvoiceStatus::Processing).unwrap();
        assert_eq!(encoded, r#""1""#);

        let decoded: InvoiceStatus = serde_json::from_str(r#""3""#).unwrap();
        assert_eq!(decoded, InvoiceStatus::Overdue);

        assert!(serde_json::from_str::<InvoiceStatus>(r#""9""#).is_err());
    }

    #[test]
    fn test_invoice_parses_backend_json() {
        let body = r#"{
            "id": "inv-42",
            "invoiceNumber": "INV-2024-042",
            "recipient": "Acme Logistics",
            "amount": "1250.00",
            "currency": "USDC",
            "invoiceStatus": "0",
            "createdAt": "2024-11-05T12:30:00Z"
        }"#;

        let invoice: Invoice = serde_json::from_str(body).unwrap();
        assert_eq!(invoice.id, "inv-42");
        assert_eq!(invoice.invoice_number, "INV-2024-042");
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.invoice_tx_hash, None);
        assert_eq!(invoice.due_at, None);
    }

    #[test]
    fn test_invoice_serializes_camel_case() {
        let invoice = Invoice {
            id: "inv-1".to_string(),
            invoice_number: "INV-2024-001".to_string(),
            recipient: "Acme Logistics".to_string(),
            amount: "10.00".to_string(),
            currency: "USDC".to_string(),
            status: InvoiceStatus::Processing,
            invoice_tx_hash: Some("abc123".to_string()),
            created_at: "2024-11-05T12:30:00Z".parse().unwrap(),
            due_at: None,
        };

        let value = serde_json::to_value(&invoice).unwrap();
        assert_eq!(value["invoiceNumber"], "INV-2024-001");
        assert_eq!(value["invoiceStatus"], "1");
        assert_eq!(value["invoiceTxHash"], "abc123");
        assert!(value.get("dueAt").is_none());
    }
}
