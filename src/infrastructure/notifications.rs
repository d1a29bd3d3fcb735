use crate::domain::parties::{AdminContact, InvestorId, RoundId};
use crate::domain::ports::{AdminNotice, InvestorNotice, NotificationDispatcher};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Default)]
struct NoticeState {
    tracked: HashSet<(RoundId, InvestorId)>,
    investor_log: Vec<(RoundId, InvestorId, InvestorNotice)>,
    admin_log: Vec<(String, AdminNotice)>,
}

/// Notification dispatcher backed by an in-memory log.
///
/// Keeps the find-or-create tracking record per (round, investor) pair:
/// re-dispatching a notice for a pair that already has one is a no-op, so
/// a retried round creation cannot email an investor twice.
#[derive(Default, Clone)]
pub struct InMemoryNotices {
    state: Arc<RwLock<NoticeState>>,
}

impl InMemoryNotices {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, NoticeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, NoticeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn investor_notices(&self) -> Vec<(RoundId, InvestorId, InvestorNotice)> {
        self.read().investor_log.clone()
    }

    pub fn admin_notices(&self) -> Vec<(String, AdminNotice)> {
        self.read().admin_log.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotices {
    async fn notify_investor(
        &self,
        round: RoundId,
        investor: InvestorId,
        notice: InvestorNotice,
    ) -> Result<()> {
        let mut state = self.write();
        if !state.tracked.insert((round, investor)) {
            return Ok(());
        }
        state.investor_log.push((round, investor, notice));
        Ok(())
    }

    async fn notify_admin(&self, contact: &AdminContact, notice: AdminNotice) -> Result<()> {
        self.write().admin_log.push((contact.email.clone(), notice));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_notice_per_round_investor_pair() {
        let notices = InMemoryNotices::new();
        notices
            .notify_investor(RoundId(1), InvestorId(1), InvestorNotice::DividendIssued)
            .await
            .unwrap();
        notices
            .notify_investor(RoundId(1), InvestorId(1), InvestorNotice::DividendIssued)
            .await
            .unwrap();
        notices
            .notify_investor(RoundId(2), InvestorId(1), InvestorNotice::DividendIssued)
            .await
            .unwrap();

        assert_eq!(notices.investor_notices().len(), 2);
    }

    #[tokio::test]
    async fn test_admin_notices_are_logged_per_contact() {
        let notices = InMemoryNotices::new();
        let admin = AdminContact {
            name: "Dana".to_string(),
            email: "dana@example.com".to_string(),
        };
        notices
            .notify_admin(
                &admin,
                AdminNotice::PaymentFailed {
                    round: RoundId(1),
                    reason: "declined".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(notices.admin_notices().len(), 1);
        assert_eq!(notices.admin_notices()[0].0, "dana@example.com");
    }
}
