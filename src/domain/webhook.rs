use super::money::Cents;
use serde::Deserialize;

/// Gateway event kinds this subsystem reacts to. Everything else decodes
/// to `Unhandled` and is ignored explicitly rather than falling through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PaymentIntentSucceeded,
    PaymentIntentPaymentFailed,
    PaymentIntentCanceled,
    PaymentIntentProcessing,
    #[serde(other)]
    Unhandled,
}

/// The intent object carried inside a webhook envelope: its id, status,
/// amount, the fee once settled, and the gateway's last error if any.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventObject {
    pub id: String,
    pub status: Option<String>,
    pub amount: Option<Cents>,
    #[serde(default)]
    pub fee: Option<Cents>,
    #[serde(default)]
    pub last_error: Option<EventError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventError {
    pub message: Option<String>,
}

/// One webhook delivery from the payment gateway. Delivery is assumed
/// at-least-once and possibly out of order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayEvent {
    pub kind: EventKind,
    pub object: EventObject,
}

impl GatewayEvent {
    /// The failure message to persist and forward to administrators when
    /// the gateway could not collect.
    pub fn failure_message(&self) -> String {
        self.object
            .last_error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| "Payment failed without a gateway error message".to_string())
    }
}
