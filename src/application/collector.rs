use crate::domain::money::Cents;
use crate::domain::parties::{CompanyId, PaymentId, RoundId};
use crate::domain::payment::{IntentRequest, Payment, PaymentStatus};
use crate::domain::ports::{
    AdminNotice, CompanyDirectoryBox, ErrorContext, ErrorReporterBox, NotificationDispatcherBox,
    PaymentGatewayBox, PaymentStoreBox, PayoutQueueBox, RoundStoreBox, SettleOutcome,
};
use crate::domain::round::Round;
use crate::domain::webhook::{EventKind, GatewayEvent};
use crate::error::{DistributionError, Result};
use chrono::Utc;
use tracing::{debug, error, info};

/// Drives the company-side funds collection for a round: creates the
/// gateway payment intent, reconciles asynchronous webhook deliveries into
/// local payment and round state, and hands settled rounds to the payout
/// queue.
pub struct PaymentCollector {
    rounds: RoundStoreBox,
    payments: PaymentStoreBox,
    companies: CompanyDirectoryBox,
    gateway: PaymentGatewayBox,
    notifier: NotificationDispatcherBox,
    payouts: PayoutQueueBox,
    reporter: ErrorReporterBox,
}

impl PaymentCollector {
    pub fn new(
        rounds: RoundStoreBox,
        payments: PaymentStoreBox,
        companies: CompanyDirectoryBox,
        gateway: PaymentGatewayBox,
        notifier: NotificationDispatcherBox,
        payouts: PayoutQueueBox,
        reporter: ErrorReporterBox,
    ) -> Self {
        Self {
            rounds,
            payments,
            companies,
            gateway,
            notifier,
            payouts,
            reporter,
        }
    }

    /// Creates (or reuses) the gateway payment intent collecting a round's
    /// total from the issuing company.
    ///
    /// Prerequisites are checked before anything is written. If a payment
    /// already carries an intent id the call is an idempotent no-op and
    /// the gateway is not contacted; the gateway-side idempotency key
    /// additionally guards against duplicate charges from network-level
    /// retries.
    pub async fn create_payment_intent(&self, round_id: RoundId) -> Result<Payment> {
        let round = self.rounds.round(round_id).await?.ok_or_else(|| {
            DistributionError::PreconditionError(format!("Round {round_id} not found"))
        })?;
        let source = self
            .companies
            .ready_payment_source(round.company)
            .await?
            .ok_or_else(|| {
                DistributionError::PreconditionError(format!(
                    "Company {} has no ready payment source",
                    round.company
                ))
            })?;
        if !round.ready_for_payment {
            return Err(DistributionError::PreconditionError(format!(
                "Round {round_id} is not marked ready for payment"
            )));
        }
        if round.is_paid() {
            return Err(DistributionError::PreconditionError(format!(
                "Round {round_id} is already paid"
            )));
        }

        let existing = self.payments.find_by_round(round_id).await?;
        if let Some(payment) = &existing
            && payment.intent_id.is_some()
        {
            return Ok(payment.clone());
        }
        let payment = match existing {
            Some(payment) => payment,
            None => {
                self.payments
                    .insert(Payment::stage(round_id, round.total))
                    .await?
            }
        };

        let customer_id = self.companies.gateway_customer_id(round.company).await?;
        let request = IntentRequest {
            amount: round.total,
            customer_id,
            payment_method_id: source.payment_method_id,
            mandate_id: source.mandate_id,
            idempotency_key: format!("round-{}-collection", round.id),
            description: format!(
                "Dividend round {} collection for company {}",
                round.id, round.company
            ),
            round: round.id,
            company: round.company,
            confirm: true,
        };

        match self.gateway.create_intent(request).await {
            Ok(snapshot) => {
                let mut payment = payment;
                payment.intent_id = Some(snapshot.id);
                payment.status = snapshot.status.into();
                self.payments.update(payment.clone()).await?;
                info!(
                    round = %round.id,
                    payment = %payment.id,
                    status = ?payment.status,
                    "Payment intent created"
                );
                Ok(payment)
            }
            Err(gateway_error) => {
                let message = match gateway_error {
                    DistributionError::GatewayError(message) => message,
                    other => other.to_string(),
                };
                let mut payment = payment;
                payment.mark_failed(message.clone(), Utc::now());
                let payment_id = payment.id;
                self.payments.update(payment).await?;
                error!(round = %round.id, %message, "Gateway rejected payment intent");
                self.reporter.report(
                    &message,
                    &ErrorContext {
                        company: Some(round.company),
                        round: Some(round.id),
                        payment: Some(payment_id),
                    },
                );
                Err(DistributionError::GatewayError(message))
            }
        }
    }

    /// Applies one asynchronous gateway event to local state.
    ///
    /// Delivery is at-least-once and possibly out of order, so every
    /// branch tolerates replays and stale events: terminal payments are
    /// never downgraded, and a replayed settlement writes nothing. Events
    /// referencing intents outside this domain are ignored.
    pub async fn process_webhook(&self, event: GatewayEvent) -> Result<()> {
        let Some(payment) = self.payments.find_by_intent(&event.object.id).await? else {
            debug!(intent = %event.object.id, "Webhook for unknown intent ignored");
            return Ok(());
        };

        match event.kind {
            EventKind::PaymentIntentSucceeded => {
                self.settle(&event.object.id, event.object.fee).await
            }
            EventKind::PaymentIntentPaymentFailed => {
                if payment.status.is_terminal() {
                    return Ok(());
                }
                let reason = event.failure_message();
                let mut payment = payment;
                payment.mark_failed(reason.clone(), Utc::now());
                let round_id = payment.round;
                self.payments.update(payment).await?;
                if let Some(company) = self.company_of(round_id).await? {
                    for admin in self.companies.administrators(company).await? {
                        self.notifier
                            .notify_admin(
                                &admin,
                                AdminNotice::PaymentFailed {
                                    round: round_id,
                                    reason: reason.clone(),
                                },
                            )
                            .await?;
                    }
                }
                Ok(())
            }
            EventKind::PaymentIntentCanceled => {
                if payment.status.is_terminal() {
                    return Ok(());
                }
                let mut payment = payment;
                payment.mark_cancelled(Utc::now());
                self.payments.update(payment).await?;
                Ok(())
            }
            EventKind::PaymentIntentProcessing => {
                if payment.status.is_terminal() || payment.status == PaymentStatus::Processing {
                    return Ok(());
                }
                let mut payment = payment;
                payment.status = PaymentStatus::Processing;
                self.payments.update(payment).await?;
                Ok(())
            }
            EventKind::Unhandled => Ok(()),
        }
    }

    /// Manual reconciliation against the gateway's authoritative intent
    /// state, for deliveries that never arrived. A refreshed success goes
    /// through the same atomic settlement as the webhook path, so the two
    /// paths cannot disagree about the ledger row, the round's paid flag,
    /// or the payout enqueue.
    pub async fn update_payment_status(&self, payment_id: PaymentId) -> Result<Payment> {
        let payment = self.payments.get(payment_id).await?.ok_or_else(|| {
            DistributionError::PreconditionError(format!("Payment {payment_id} not found"))
        })?;
        let intent_id = payment.intent_id.clone().ok_or_else(|| {
            DistributionError::PreconditionError(format!(
                "Payment {payment_id} has no gateway intent to refresh"
            ))
        })?;

        let snapshot = self.gateway.retrieve_intent(&intent_id).await?;
        let refreshed: PaymentStatus = snapshot.status.into();
        if refreshed == payment.status {
            return Ok(payment);
        }

        if refreshed == PaymentStatus::Succeeded {
            self.settle(&intent_id, snapshot.fee).await?;
        } else {
            let mut payment = payment;
            match refreshed {
                PaymentStatus::Failed => payment.mark_failed(
                    snapshot
                        .last_error
                        .unwrap_or_else(|| "Gateway reported failure".to_string()),
                    Utc::now(),
                ),
                PaymentStatus::Cancelled => payment.mark_cancelled(Utc::now()),
                status => payment.status = status,
            }
            self.payments.update(payment).await?;
        }

        self.payments.get(payment_id).await?.ok_or_else(|| {
            DistributionError::PreconditionError(format!("Payment {payment_id} not found"))
        })
    }

    /// The single settlement path shared by webhook and manual refresh:
    /// one atomic store operation marks the payment succeeded, appends the
    /// one balance transaction, and marks the round paid. The payout
    /// enqueue happens only on the call that actually settled.
    async fn settle(&self, intent_id: &str, fee: Option<Cents>) -> Result<()> {
        match self
            .payments
            .settle_succeeded(intent_id, fee, Utc::now())
            .await?
        {
            SettleOutcome::Settled { payment, round } => {
                info!(
                    round = %round.id,
                    payment = %payment.id,
                    amount = %payment.amount,
                    "Round collection settled"
                );
                self.payouts.enqueue_pending_payouts().await
            }
            SettleOutcome::AlreadySettled(_) => Ok(()),
        }
    }

    async fn company_of(&self, round_id: RoundId) -> Result<Option<CompanyId>> {
        Ok(self
            .rounds
            .round(round_id)
            .await?
            .as_ref()
            .map(|round: &Round| round.company))
    }
}
