use super::money::Cents;
use super::parties::{CompanyId, PaymentId, RoundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initial,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
    ActionRequired,
}

impl PaymentStatus {
    /// Succeeded, failed and cancelled end a collection attempt;
    /// action-required can still move to any terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// The gateway's own intent status vocabulary, decoded at the adapter
/// boundary. Anything the gateway adds later lands on `Unknown` instead of
/// silently aliasing a known state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIntentStatus {
    Succeeded,
    Processing,
    Canceled,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    #[serde(other)]
    Unknown,
}

impl From<GatewayIntentStatus> for PaymentStatus {
    fn from(status: GatewayIntentStatus) -> Self {
        match status {
            GatewayIntentStatus::Succeeded => PaymentStatus::Succeeded,
            GatewayIntentStatus::Processing => PaymentStatus::Processing,
            GatewayIntentStatus::Canceled => PaymentStatus::Cancelled,
            GatewayIntentStatus::RequiresPaymentMethod
            | GatewayIntentStatus::RequiresConfirmation
            | GatewayIntentStatus::RequiresAction => PaymentStatus::ActionRequired,
            GatewayIntentStatus::Unknown => PaymentStatus::Failed,
        }
    }
}

/// The company-side collection for one round. 1:1 with its round; the
/// storage layer enforces that and the global uniqueness of intent ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub round: RoundId,
    pub amount: Cents,
    pub fee: Option<Cents>,
    pub status: PaymentStatus,
    pub intent_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Payment {
    /// Stages a payment for a round in its initial state. The store
    /// assigns the id on insert.
    pub fn stage(round: RoundId, amount: Cents) -> Self {
        Self {
            id: PaymentId(0),
            round,
            amount,
            fee: None,
            status: PaymentStatus::Initial,
            intent_id: None,
            processed_at: None,
            failed_at: None,
            cancelled_at: None,
            failure_reason: None,
        }
    }

    pub fn mark_failed(&mut self, reason: String, at: DateTime<Utc>) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason);
        self.failed_at = Some(at);
    }

    pub fn mark_cancelled(&mut self, at: DateTime<Utc>) {
        self.status = PaymentStatus::Cancelled;
        self.cancelled_at = Some(at);
    }
}

/// Append-only ledger row recording the gross amount collected for a
/// round. Written exactly once, when the payment settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: u64,
    pub round: RoundId,
    pub amount: Cents,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the gateway needs to pull the round's total from the
/// company's bank account over the ACH rail, in one confirmed intent.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentRequest {
    pub amount: Cents,
    pub customer_id: String,
    pub payment_method_id: String,
    pub mandate_id: String,
    /// Deterministic per round, so a network-level client retry cannot
    /// charge the company twice.
    pub idempotency_key: String,
    pub description: String,
    pub round: RoundId,
    pub company: CompanyId,
    pub confirm: bool,
}

/// The gateway's view of an intent, as returned from a create or retrieve
/// call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSnapshot {
    pub id: String,
    pub status: GatewayIntentStatus,
    pub amount: Cents,
    pub fee: Option<Cents>,
    pub last_error: Option<String>,
}
