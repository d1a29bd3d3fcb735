use super::money::Cents;
use super::parties::{
    AdminContact, CompanyId, EntityHolding, InvestorId, InvestorProfile, PaymentId, PaymentSource,
    RoundId,
};
use super::payment::{BalanceTransaction, IntentRequest, IntentSnapshot, Payment};
use super::round::{Dividend, Round};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

#[async_trait]
pub trait RoundStore: Send + Sync {
    /// The most recent issuance date among the company's rounds, used for
    /// the no-overlapping-round precondition.
    async fn latest_issued_at(&self, company: CompanyId) -> Result<Option<NaiveDate>>;

    /// Persists a round and its dividends as one atomic unit, assigning
    /// ids. Re-checks the no-overlapping-round invariant under the store's
    /// serialization point and fails with a conflict if violated, writing
    /// nothing.
    async fn commit_round(
        &self,
        round: Round,
        dividends: Vec<Dividend>,
    ) -> Result<(Round, Vec<Dividend>)>;

    async fn round(&self, id: RoundId) -> Result<Option<Round>>;

    async fn dividends(&self, round: RoundId) -> Result<Vec<Dividend>>;

    async fn set_ready_for_payment(&self, id: RoundId, ready: bool) -> Result<()>;
}

/// Result of an idempotent settlement attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// This call performed the settlement: the payment succeeded, the
    /// ledger row was appended, and the round was marked paid.
    Settled { payment: Payment, round: Round },
    /// The payment had already settled; nothing was written.
    AlreadySettled(Payment),
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;

    async fn find_by_round(&self, round: RoundId) -> Result<Option<Payment>>;

    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<Payment>>;

    /// Inserts a payment, assigning its id. At most one payment may exist
    /// per round; a second insert for the same round is rejected.
    async fn insert(&self, payment: Payment) -> Result<Payment>;

    /// Updates a payment in place. Gateway intent ids are globally unique;
    /// an update that would duplicate another payment's intent id is
    /// rejected.
    async fn update(&self, payment: Payment) -> Result<()>;

    /// Atomically marks the payment succeeded with the collected fee,
    /// appends exactly one balance transaction for the gross amount, and
    /// marks the round paid. Safe to call repeatedly: once the payment is
    /// succeeded the call reports `AlreadySettled` and writes nothing.
    async fn settle_succeeded(
        &self,
        intent_id: &str,
        fee: Option<Cents>,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome>;

    async fn balance_transactions(&self, round: RoundId) -> Result<Vec<BalanceTransaction>>;
}

/// The investor capability surface: onboarding, sanction residency and
/// payment threshold, plus resolution of pass-through entities into their
/// underlying holders.
#[async_trait]
pub trait InvestorDirectory: Send + Sync {
    async fn profile(&self, investor: InvestorId) -> Result<Option<InvestorProfile>>;

    async fn entity_holdings(&self, entity: &str) -> Result<Vec<EntityHolding>>;
}

/// The company capability surface consumed by the payment collector.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// The company's payment source, already filtered to alive and ready.
    async fn ready_payment_source(&self, company: CompanyId) -> Result<Option<PaymentSource>>;

    /// Fetches the company's gateway customer id, creating it on first use.
    async fn gateway_customer_id(&self, company: CompanyId) -> Result<String>;

    async fn administrators(&self, company: CompanyId) -> Result<Vec<AdminContact>>;
}

/// External tax engine. The percentage is per investor and tax year; cent
/// rounding of the withheld amount happens per dividend row, not here.
#[async_trait]
pub trait WithholdingCalculator: Send + Sync {
    async fn percentage(
        &self,
        investor: InvestorId,
        tax_year: i32,
        rows: &[Dividend],
    ) -> Result<Decimal>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestorNotice {
    DividendIssued,
    SanctionedCountryRetention,
    BelowThresholdRetention,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminNotice {
    PaymentFailed { round: RoundId, reason: String },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Sends one notice to an investor about a round. Implementations keep
    /// a find-or-create tracking record per (round, investor) pair so a
    /// repeated dispatch sends nothing twice.
    async fn notify_investor(
        &self,
        round: RoundId,
        investor: InvestorId,
        notice: InvestorNotice,
    ) -> Result<()>;

    async fn notify_admin(&self, contact: &AdminContact, notice: AdminNotice) -> Result<()>;
}

/// Hand-off to the external payout job system. Deliberately takes no round
/// argument: the payout job scans for eligible pending work itself.
#[async_trait]
pub trait PayoutQueue: Send + Sync {
    async fn enqueue_pending_payouts(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    pub company: Option<CompanyId>,
    pub round: Option<RoundId>,
    pub payment: Option<PaymentId>,
}

/// Error-tracking collaborator for gateway failures.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str, context: &ErrorContext);
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: IntentRequest) -> Result<IntentSnapshot>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<IntentSnapshot>;
}

pub type RoundStoreBox = Box<dyn RoundStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type InvestorDirectoryBox = Box<dyn InvestorDirectory>;
pub type CompanyDirectoryBox = Box<dyn CompanyDirectory>;
pub type WithholdingCalculatorBox = Box<dyn WithholdingCalculator>;
pub type NotificationDispatcherBox = Box<dyn NotificationDispatcher>;
pub type PayoutQueueBox = Box<dyn PayoutQueue>;
pub type ErrorReporterBox = Box<dyn ErrorReporter>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
