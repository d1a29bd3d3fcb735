use crate::domain::parties::InvestorId;
use crate::domain::ports::{ErrorContext, ErrorReporter, PayoutQueue, WithholdingCalculator};
use crate::domain::round::Dividend;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::error;

/// Withholding calculator applying one flat percentage to every investor.
/// Stands in for the external tax engine in the CLI harness and tests.
pub struct FlatRateCalculator {
    rate: Decimal,
}

impl FlatRateCalculator {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl WithholdingCalculator for FlatRateCalculator {
    async fn percentage(
        &self,
        _investor: InvestorId,
        _tax_year: i32,
        _rows: &[Dividend],
    ) -> Result<Decimal> {
        Ok(self.rate)
    }
}

/// Payout queue that only counts enqueues. The real payout job system is
/// external; what this subsystem owes it is exactly one nudge per
/// settlement.
#[derive(Default, Clone)]
pub struct RecordingPayoutQueue {
    enqueues: Arc<AtomicUsize>,
}

impl RecordingPayoutQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) -> usize {
        self.enqueues.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PayoutQueue for RecordingPayoutQueue {
    async fn enqueue_pending_payouts(&self) -> Result<()> {
        self.enqueues.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Error reporter that forwards to the tracing pipeline.
#[derive(Default, Clone)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, message: &str, context: &ErrorContext) {
        error!(
            company = context.company.map(|id| id.0),
            round = context.round.map(|id| id.0),
            payment = context.payment.map(|id| id.0),
            message,
            "Gateway error reported"
        );
    }
}

/// Error reporter that records every report, for asserting on context ids.
#[derive(Default, Clone)]
pub struct RecordingReporter {
    reports: Arc<RwLock<Vec<(String, ErrorContext)>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, ErrorContext)> {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, message: &str, context: &ErrorContext) {
        self.reports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.to_string(), context.clone()));
    }
}
