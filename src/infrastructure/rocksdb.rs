use crate::domain::money::Cents;
use crate::domain::parties::{CompanyId, PaymentId, RoundId};
use crate::domain::payment::{BalanceTransaction, Payment, PaymentStatus};
use crate::domain::ports::{PaymentStore, RoundStore, SettleOutcome};
use crate::domain::round::{Dividend, Round, RoundStatus};
use crate::error::{DistributionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Column Family for round records.
pub const CF_ROUNDS: &str = "rounds";
/// Column Family for dividend lists, keyed by round id.
pub const CF_DIVIDENDS: &str = "dividends";
/// Column Family for payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for the append-only balance ledger.
pub const CF_LEDGER: &str = "ledger";

/// A persistent store implementation using RocksDB.
///
/// Rounds, dividends, payments and ledger rows live in separate column
/// families with JSON values. Multi-entity operations go through a single
/// commit mutex plus an atomic `WriteBatch`: the mutex is the
/// serialization point for the conflict and uniqueness checks, the batch
/// guarantees the writes land together or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    commit_mutex: Arc<Mutex<()>>,
    next_round_id: Arc<AtomicU64>,
    next_payment_id: Arc<AtomicU64>,
    next_ledger_id: Arc<AtomicU64>,
}

fn internal(message: String) -> DistributionError {
    DistributionError::InternalError(Box::new(std::io::Error::other(message)))
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist and recovering the id counters.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ROUNDS, CF_DIVIDENDS, CF_PAYMENTS, CF_LEDGER]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)
            .map_err(|e| internal(format!("Failed to open RocksDB: {e}")))?;
        let store = Self {
            db: Arc::new(db),
            commit_mutex: Arc::new(Mutex::new(())),
            next_round_id: Arc::new(AtomicU64::new(0)),
            next_payment_id: Arc::new(AtomicU64::new(0)),
            next_ledger_id: Arc::new(AtomicU64::new(0)),
        };
        store
            .next_round_id
            .store(store.max_key(CF_ROUNDS)?, Ordering::SeqCst);
        store
            .next_payment_id
            .store(store.max_key(CF_PAYMENTS)?, Ordering::SeqCst);
        store
            .next_ledger_id
            .store(store.max_key(CF_LEDGER)?, Ordering::SeqCst);
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("Column family {name} not found")))
    }

    fn max_key(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf(cf_name)?;
        let mut max = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| internal(format!("RocksDB iteration error: {e}")))?;
            let bytes: [u8; 8] = key
                .as_ref()
                .try_into()
                .map_err(|_| internal(format!("Malformed key in {cf_name}")))?;
            max = max.max(u64::from_be_bytes(bytes));
        }
        Ok(max)
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let result = self
            .db
            .get_cf(cf, key.to_be_bytes())
            .map_err(|e| internal(format!("RocksDB read error: {e}")))?;
        match result {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| internal(format!("Deserialization error: {e}"))),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: u64,
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes =
            serde_json::to_vec(value).map_err(|e| internal(format!("Serialization error: {e}")))?;
        batch.put_cf(cf, key.to_be_bytes(), bytes);
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| internal(format!("RocksDB iteration error: {e}")))?;
            values.push(
                serde_json::from_slice(&value)
                    .map_err(|e| internal(format!("Deserialization error: {e}")))?,
            );
        }
        Ok(values)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| internal(format!("RocksDB write error: {e}")))
    }

    fn lock_commits(&self) -> std::sync::MutexGuard<'_, ()> {
        self.commit_mutex
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RoundStore for RocksDbStore {
    async fn latest_issued_at(&self, company: CompanyId) -> Result<Option<NaiveDate>> {
        Ok(self
            .scan::<Round>(CF_ROUNDS)?
            .into_iter()
            .filter(|round| round.company == company)
            .map(|round| round.issued_at)
            .max())
    }

    async fn commit_round(
        &self,
        round: Round,
        dividends: Vec<Dividend>,
    ) -> Result<(Round, Vec<Dividend>)> {
        let _guard = self.lock_commits();

        if let Some(conflicting) = self
            .scan::<Round>(CF_ROUNDS)?
            .into_iter()
            .find(|existing| {
                existing.company == round.company && existing.issued_at >= round.issued_at
            })
        {
            return Err(DistributionError::ConflictError(format!(
                "Round {} issued on {} conflicts with an issuance on {}",
                conflicting.id, conflicting.issued_at, round.issued_at
            )));
        }

        let id = RoundId(self.next_round_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut round = round;
        round.id = id;
        let mut dividends = dividends;
        for dividend in &mut dividends {
            dividend.round = id;
        }

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ROUNDS, id.0, &round)?;
        self.put_json(&mut batch, CF_DIVIDENDS, id.0, &dividends)?;
        self.write(batch)?;
        Ok((round, dividends))
    }

    async fn round(&self, id: RoundId) -> Result<Option<Round>> {
        self.get_json(CF_ROUNDS, id.0)
    }

    async fn dividends(&self, round: RoundId) -> Result<Vec<Dividend>> {
        Ok(self
            .get_json::<Vec<Dividend>>(CF_DIVIDENDS, round.0)?
            .unwrap_or_default())
    }

    async fn set_ready_for_payment(&self, id: RoundId, ready: bool) -> Result<()> {
        let _guard = self.lock_commits();
        let mut round: Round = self.get_json(CF_ROUNDS, id.0)?.ok_or_else(|| {
            DistributionError::PreconditionError(format!("Round {id} not found"))
        })?;
        round.ready_for_payment = ready;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ROUNDS, id.0, &round)?;
        self.write(batch)
    }
}

#[async_trait]
impl PaymentStore for RocksDbStore {
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, id.0)
    }

    async fn find_by_round(&self, round: RoundId) -> Result<Option<Payment>> {
        Ok(self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .find(|payment| payment.round == round))
    }

    async fn find_by_intent(&self, intent_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .find(|payment| payment.intent_id.as_deref() == Some(intent_id)))
    }

    async fn insert(&self, payment: Payment) -> Result<Payment> {
        let _guard = self.lock_commits();
        if self
            .scan::<Payment>(CF_PAYMENTS)?
            .iter()
            .any(|existing| existing.round == payment.round)
        {
            return Err(DistributionError::ConflictError(format!(
                "A payment already exists for round {}",
                payment.round
            )));
        }
        let id = PaymentId(self.next_payment_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut payment = payment;
        payment.id = id;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, id.0, &payment)?;
        self.write(batch)?;
        Ok(payment)
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        let _guard = self.lock_commits();
        if self.get_json::<Payment>(CF_PAYMENTS, payment.id.0)?.is_none() {
            return Err(DistributionError::PreconditionError(format!(
                "Payment {} not found",
                payment.id
            )));
        }
        if let Some(intent_id) = &payment.intent_id
            && self.scan::<Payment>(CF_PAYMENTS)?.iter().any(|existing| {
                existing.id != payment.id && existing.intent_id.as_deref() == Some(intent_id)
            })
        {
            return Err(DistributionError::ConflictError(format!(
                "Gateway intent {intent_id} is already recorded on another payment"
            )));
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, payment.id.0, &payment)?;
        self.write(batch)
    }

    async fn settle_succeeded(
        &self,
        intent_id: &str,
        fee: Option<Cents>,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome> {
        let _guard = self.lock_commits();

        let mut payment = self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .find(|payment| payment.intent_id.as_deref() == Some(intent_id))
            .ok_or_else(|| {
                DistributionError::PreconditionError(format!(
                    "No payment recorded for gateway intent {intent_id}"
                ))
            })?;
        if payment.status == PaymentStatus::Succeeded {
            return Ok(SettleOutcome::AlreadySettled(payment));
        }

        let mut round: Round = self.get_json(CF_ROUNDS, payment.round.0)?.ok_or_else(|| {
            DistributionError::PreconditionError(format!("Round {} not found", payment.round))
        })?;

        payment.status = PaymentStatus::Succeeded;
        payment.processed_at = Some(now);
        payment.fee = fee;
        round.status = RoundStatus::Paid;
        round.paid_at = Some(now);
        let entry = BalanceTransaction {
            id: self.next_ledger_id.fetch_add(1, Ordering::SeqCst) + 1,
            round: round.id,
            amount: payment.amount,
            description: format!("Collection for dividend round {}", round.id),
            created_at: now,
        };

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, payment.id.0, &payment)?;
        self.put_json(&mut batch, CF_ROUNDS, round.id.0, &round)?;
        self.put_json(&mut batch, CF_LEDGER, entry.id, &entry)?;
        self.write(batch)?;

        Ok(SettleOutcome::Settled { payment, round })
    }

    async fn balance_transactions(&self, round: RoundId) -> Result<Vec<BalanceTransaction>> {
        Ok(self
            .scan::<BalanceTransaction>(CF_LEDGER)?
            .into_iter()
            .filter(|entry| entry.round == round)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parties::InvestorId;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn round(company: u64, date: (i32, u32, u32)) -> Round {
        Round::stage(
            CompanyId(company),
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            Cents(250000),
            dec!(500),
            1,
        )
    }

    #[tokio::test]
    async fn test_open_creates_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        for cf in [CF_ROUNDS, CF_DIVIDENDS, CF_PAYMENTS, CF_LEDGER] {
            assert!(store.db.cf_handle(cf).is_some());
        }
    }

    #[tokio::test]
    async fn test_round_and_dividends_round_trip() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        let dividends = vec![Dividend::stage(
            InvestorId(1),
            Cents(250000),
            Cents(100000),
            dec!(500),
        )];

        let (committed, stored) = store
            .commit_round(round(1, (2025, 3, 1)), dividends)
            .await
            .unwrap();
        assert_eq!(committed.id, RoundId(1));

        assert_eq!(store.round(committed.id).await.unwrap().unwrap(), committed);
        assert_eq!(store.dividends(committed.id).await.unwrap(), stored);
        assert_eq!(
            store.latest_issued_at(CompanyId(1)).await.unwrap(),
            Some(committed.issued_at)
        );
    }

    #[tokio::test]
    async fn test_conflicting_round_is_rejected() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        store
            .commit_round(round(1, (2025, 3, 1)), vec![])
            .await
            .unwrap();
        let result = store.commit_round(round(1, (2025, 2, 1)), vec![]).await;
        assert!(matches!(result, Err(DistributionError::ConflictError(_))));
    }

    #[tokio::test]
    async fn test_id_counters_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            store
                .commit_round(round(1, (2025, 3, 1)), vec![])
                .await
                .unwrap();
        }
        let store = RocksDbStore::open(dir.path()).unwrap();
        let (committed, _) = store
            .commit_round(round(2, (2025, 3, 1)), vec![])
            .await
            .unwrap();
        assert_eq!(committed.id, RoundId(2));
    }

    #[tokio::test]
    async fn test_settle_is_idempotent_across_store() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
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

        let first = store
            .settle_succeeded("pi_1", Some(Cents(99)), Utc::now())
            .await
            .unwrap();
        assert!(matches!(first, SettleOutcome::Settled { .. }));
        let second = store
            .settle_succeeded("pi_1", None, Utc::now())
            .await
            .unwrap();
        assert!(matches!(second, SettleOutcome::AlreadySettled(_)));

        assert_eq!(store.balance_transactions(committed.id).await.unwrap().len(), 1);
        let reloaded = store.round(committed.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, RoundStatus::Paid);
    }
}
