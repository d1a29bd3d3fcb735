use crate::domain::money::Cents;
use crate::domain::parties::{
    AdminContact, CompanyId, EntityHolding, InvestorId, InvestorProfile, PaymentId, PaymentSource,
    RoundId,
};
use crate::domain::payment::{BalanceTransaction, Payment, PaymentStatus};
use crate::domain::ports::{
    CompanyDirectory, InvestorDirectory, PaymentStore, RoundStore, SettleOutcome,
};
use crate::domain::round::{Dividend, Round, RoundStatus};
use crate::error::{DistributionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct DistributionState {
    rounds: HashMap<RoundId, Round>,
    dividends: HashMap<RoundId, Vec<Dividend>>,
    payments: HashMap<PaymentId, Payment>,
    ledger: Vec<BalanceTransaction>,
    next_round_id: u64,
    next_payment_id: u64,
    next_ledger_id: u64,
}

/// A thread-safe in-memory store for rounds, dividends, payments and the
/// balance ledger.
///
/// All state sits behind one `Arc<RwLock<_>>`, so every multi-entity
/// operation (`commit_round`, `settle_succeeded`) holds a single write
/// guard for its whole duration: the guard is both the atomicity boundary
/// and the per-company serialization point that closes the
/// check-then-act race on round creation.
#[derive(Default, Clone)]
pub struct InMemoryDistributionStore {
    state: Arc<RwLock<DistributionState>>,
}

impl InMemoryDistributionStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoundStore for InMemoryDistributionStore {
    async fn latest_issued_at(&self, company: CompanyId) -> Result<Option<NaiveDate>> {
        let state = self.state.read().await;
        Ok(state
            .rounds
            .values()
            .filter(|round| round.company == company)
            .map(|round| round.issued_at)
            .max())
    }

    async fn commit_round(
        &self,
        round: Round,
        dividends: Vec<Dividend>,
    ) -> Result<(Round, Vec<Dividend>)> {
        let mut state = self.state.write().await;

        if let Some(conflicting) = state
            .rounds
            .values()
            .find(|existing| existing.company == round.company && existing.issued_at >= round.issued_at)
        {
            return Err(DistributionError::ConflictError(format!(
                "Round {} issued on {} conflicts with an issuance on {}",
                conflicting.id, conflicting.issued_at, round.issued_at
            )));
        }

        state.next_round_id += 1;
        let id = RoundId(state.next_round_id);
        let mut round = round;
        round.id = id;
        let mut dividends = dividends;
        for dividend in &mut dividends {
            dividend.round = id;
        }

        state.rounds.insert(id, round.clone());
        state.dividends.insert(id, dividends.clone());
        Ok((round, dividends))
    }

    async fn round(&self, id: RoundId) -> Result<Option<Round>> {
        let state = self.state.read().await;
        Ok(state.rounds.get(&id).cloned())
    }

    async fn dividends(&self, round: RoundId) -> Result<Vec<Dividend>> {
        let state = self.state.read().await;
        Ok(state.dividends.get(&round).cloned().unwrap_or_default())
    }

    async fn set_ready_for_payment(&self, id: RoundId, ready: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let round = state.rounds.get_mut(&id).ok_or_else(|| {
            DistributionError::PreconditionError(format!("Round {id} not found"))
        })?;
        round.ready_for_payment = ready;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for InMemoryDistributionStore {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.get(&id).cloned())
    }

    async fn find_by_round(&self, round: RoundId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|payment| payment.round == round)
            .cloned())
    }

    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|payment| payment.intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn insert(&self, payment: Payment) -> Result<Payment> {
        let mut state = self.state.write().await;
        if state
            .payments
            .values()
            .any(|existing| existing.round == payment.round)
        {
            return Err(DistributionError::ConflictError(format!(
                "A payment already exists for round {}",
                payment.round
            )));
        }
        state.next_payment_id += 1;
        let id = PaymentId(state.next_payment_id);
        let mut payment = payment;
        payment.id = id;
        state.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.payments.contains_key(&payment.id) {
            return Err(DistributionError::PreconditionError(format!(
                "Payment {} not found",
                payment.id
            )));
        }
        if let Some(intent_id) = &payment.intent_id
            && state.payments.values().any(|existing| {
                existing.id != payment.id && existing.intent_id.as_deref() == Some(intent_id)
            })
        {
            return Err(DistributionError::ConflictError(format!(
                "Gateway intent {intent_id} is already recorded on another payment"
            )));
        }
        state.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn settle_succeeded(
        &self,
        intent_id: &str,
        fee: Option<Cents>,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome> {
        let mut state = self.state.write().await;

        let matched = state
            .payments
            .values()
            .find(|payment| payment.intent_id.as_deref() == Some(intent_id))
            .cloned()
            .ok_or_else(|| {
                DistributionError::PreconditionError(format!(
                    "No payment recorded for gateway intent {intent_id}"
                ))
            })?;

        if matched.status == PaymentStatus::Succeeded {
            return Ok(SettleOutcome::AlreadySettled(matched));
        }
        let payment_id = matched.id;
        let round_id = matched.round;
        let amount = matched.amount;

        let round = state.rounds.get_mut(&round_id).ok_or_else(|| {
            DistributionError::PreconditionError(format!("Round {round_id} not found"))
        })?;
        round.status = RoundStatus::Paid;
        round.paid_at = Some(now);
        let round = round.clone();

        state.next_ledger_id += 1;
        let ledger_id = state.next_ledger_id;
        state.ledger.push(BalanceTransaction {
            id: ledger_id,
            round: round_id,
            amount,
            description: format!("Collection for dividend round {round_id}"),
            created_at: now,
        });

        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| {
                DistributionError::PreconditionError(format!("Payment {payment_id} not found"))
            })?;
        payment.status = PaymentStatus::Succeeded;
        payment.processed_at = Some(now);
        payment.fee = fee;
        let payment = payment.clone();

        Ok(SettleOutcome::Settled { payment, round })
    }

    async fn balance_transactions(&self, round: RoundId) -> Result<Vec<BalanceTransaction>> {
        let state = self.state.read().await;
        Ok(state
            .ledger
            .iter()
            .filter(|entry| entry.round == round)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct CompanyRecord {
    payment_source: Option<PaymentSource>,
    customer_id: Option<String>,
    administrators: Vec<AdminContact>,
}

#[derive(Default)]
struct DirectoryState {
    investors: HashMap<InvestorId, InvestorProfile>,
    entities: HashMap<String, Vec<EntityHolding>>,
    companies: HashMap<CompanyId, CompanyRecord>,
}

/// In-memory investor and company directory, used by the CLI harness and
/// the test suites.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    state: Arc<std::sync::RwLock<DirectoryState>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DirectoryState> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryState> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn add_investor(&self, profile: InvestorProfile) {
        self.write().investors.insert(profile.investor, profile);
    }

    pub fn add_entity(&self, name: &str, holdings: Vec<EntityHolding>) {
        self.write().entities.insert(name.to_string(), holdings);
    }

    pub fn set_payment_source(&self, company: CompanyId, source: PaymentSource) {
        self.write()
            .companies
            .entry(company)
            .or_default()
            .payment_source = Some(source);
    }

    pub fn set_administrators(&self, company: CompanyId, administrators: Vec<AdminContact>) {
        self.write()
            .companies
            .entry(company)
            .or_default()
            .administrators = administrators;
    }
}

#[async_trait]
impl InvestorDirectory for InMemoryDirectory {
    async fn profile(&self, investor: InvestorId) -> Result<Option<InvestorProfile>> {
        Ok(self.read().investors.get(&investor).cloned())
    }

    async fn entity_holdings(&self, entity: &str) -> Result<Vec<EntityHolding>> {
        Ok(self.read().entities.get(entity).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryDirectory {
    async fn ready_payment_source(&self, company: CompanyId) -> Result<Option<PaymentSource>> {
        Ok(self
            .read()
            .companies
            .get(&company)
            .and_then(|record| record.payment_source.clone()))
    }

    async fn gateway_customer_id(&self, company: CompanyId) -> Result<String> {
        let mut state = self.write();
        let record = state.companies.entry(company).or_default();
        Ok(record
            .customer_id
            .get_or_insert_with(|| format!("cus_{company}"))
            .clone())
    }

    async fn administrators(&self, company: CompanyId) -> Result<Vec<AdminContact>> {
        Ok(self
            .read()
            .companies
            .get(&company)
            .map(|record| record.administrators.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn round(company: u64, date: (i32, u32, u32)) -> Round {
        Round::stage(
            CompanyId(company),
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            Cents(100000),
            dec!(1000),
            2,
        )
    }

    #[tokio::test]
    async fn test_commit_round_assigns_ids() {
        let store = InMemoryDistributionStore::new();
        let dividends = vec![Dividend::stage(InvestorId(1), Cents(100000), Cents(0), dec!(1000))];

        let (committed, dividends) = store
            .commit_round(round(1, (2025, 3, 1)), dividends)
            .await
            .unwrap();

        assert_eq!(committed.id, RoundId(1));
        assert_eq!(dividends[0].round, RoundId(1));
        assert_eq!(store.round(RoundId(1)).await.unwrap().unwrap(), committed);
        assert_eq!(store.dividends(RoundId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_round_rejects_conflicts_and_writes_nothing() {
        let store = InMemoryDistributionStore::new();
        store
            .commit_round(round(1, (2025, 3, 1)), vec![])
            .await
            .unwrap();

        // Same date and an earlier date both conflict.
        for date in [(2025, 3, 1), (2025, 2, 1)] {
            let result = store.commit_round(round(1, date), vec![]).await;
            assert!(matches!(result, Err(DistributionError::ConflictError(_))));
        }
        let state = store.state.read().await;
        assert_eq!(state.rounds.len(), 1);
        assert_eq!(state.dividends.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_is_per_company() {
        let store = InMemoryDistributionStore::new();
        store
            .commit_round(round(1, (2025, 3, 1)), vec![])
            .await
            .unwrap();
        assert!(store.commit_round(round(2, (2025, 3, 1)), vec![]).await.is_ok());
        assert!(store.commit_round(round(1, (2025, 4, 1)), vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_one_payment_per_round() {
        let store = InMemoryDistributionStore::new();
        let (committed, _) = store
            .commit_round(round(1, (2025, 3, 1)), vec![])
            .await
            .unwrap();

        store
            .insert(Payment::stage(committed.id, committed.total))
            .await
            .unwrap();
        let duplicate = store
            .insert(Payment::stage(committed.id, committed.total))
            .await;
        assert!(matches!(duplicate, Err(DistributionError::ConflictError(_))));
    }

    #[tokio::test]
    async fn test_intent_ids_are_unique_across_payments() {
        let store = InMemoryDistributionStore::new();
        let (first, _) = store
            .commit_round(round(1, (2025, 3, 1)), vec![])
            .await
            .unwrap();
        let (second, _) = store
            .commit_round(round(2, (2025, 3, 1)), vec![])
            .await
            .unwrap();

        let mut a = store.insert(Payment::stage(first.id, first.total)).await.unwrap();
        let mut b = store.insert(Payment::stage(second.id, second.total)).await.unwrap();
        a.intent_id = Some("pi_1".to_string());
        store.update(a).await.unwrap();
        b.intent_id = Some("pi_1".to_string());
        assert!(matches!(
            store.update(b).await,
            Err(DistributionError::ConflictError(_))
        ));
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let store = InMemoryDistributionStore::new();
        let (committed, _) = store
            .commit_round(round(1, (2025, 3, 1)), vec![])
            .await
            .unwrap();
        let mut payment = store
            .insert(Payment::stage(committed.id, committed.total))
            .await
            .unwrap();
        payment.intent_id = Some("pi_1".to_string());
        store.update(payment).await.unwrap();

        let now = Utc::now();
        let first = store
            .settle_succeeded("pi_1", Some(Cents(125)), now)
            .await
            .unwrap();
        let SettleOutcome::Settled { payment, round } = first else {
            panic!("first settle should write");
        };
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.fee, Some(Cents(125)));
        assert_eq!(round.status, RoundStatus::Paid);
        assert!(round.paid_at.is_some());

        let second = store
            .settle_succeeded("pi_1", Some(Cents(125)), Utc::now())
            .await
            .unwrap();
        assert!(matches!(second, SettleOutcome::AlreadySettled(_)));

        let ledger = store.balance_transactions(committed.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].amount, committed.total);
        assert!(ledger[0].description.contains(&committed.id.to_string()));
    }

    #[tokio::test]
    async fn test_directory_customer_id_is_created_once() {
        let directory = InMemoryDirectory::new();
        let first = directory.gateway_customer_id(CompanyId(7)).await.unwrap();
        let second = directory.gateway_customer_id(CompanyId(7)).await.unwrap();
        assert_eq!(first, "cus_7");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let directory = InMemoryDirectory::new();
        directory.add_investor(InvestorProfile {
            investor: InvestorId(1),
            onboarded: true,
            sanctioned_resident: false,
            minimum_payment: Cents::ZERO,
        });
        directory.add_entity(
            "Alpha Fund LP",
            vec![EntityHolding {
                investor: InvestorId(1),
                invested: Cents(500000),
            }],
        );

        assert!(directory.profile(InvestorId(1)).await.unwrap().is_some());
        assert!(directory.profile(InvestorId(2)).await.unwrap().is_none());
        assert_eq!(
            directory.entity_holdings("Alpha Fund LP").await.unwrap().len(),
            1
        );
        assert!(directory.entity_holdings("Unknown").await.unwrap().is_empty());
        assert!(
            directory
                .ready_payment_source(CompanyId(1))
                .await
                .unwrap()
                .is_none()
        );
    }
}
