use super::money::Cents;
use super::parties::{CompanyId, InvestorId, RoundId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Issued,
    Paid,
}

/// One distribution event for a company. Created together with its
/// dividends in a single atomic commit; later marked paid by the payment
/// collector once the company-side collection settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub company: CompanyId,
    pub issued_at: NaiveDate,
    pub total: Cents,
    pub shares: Decimal,
    pub investor_count: u32,
    pub status: RoundStatus,
    pub ready_for_payment: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Round {
    /// Stages a new round in its initial state. The store assigns the id
    /// when the round is committed.
    pub fn stage(
        company: CompanyId,
        issued_at: NaiveDate,
        total: Cents,
        shares: Decimal,
        investor_count: u32,
    ) -> Self {
        Self {
            id: RoundId(0),
            company,
            issued_at,
            total,
            shares,
            investor_count,
            status: RoundStatus::Issued,
            ready_for_payment: false,
            paid_at: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == RoundStatus::Paid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendStatus {
    PendingSignup,
    Issued,
    Retained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetainedReason {
    SanctionedCountry,
    BelowThreshold,
}

/// Withholding bookkeeping for a dividend. Either absent entirely or fully
/// populated; the type makes a partially-set state unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withholding {
    pub percentage: Decimal,
    pub withheld: Cents,
    pub net: Cents,
}

impl Withholding {
    /// The zero-withholding record carried by retained dividends: nothing
    /// is deducted and the full gross is reported as net.
    pub fn none_of(total: Cents) -> Self {
        Self {
            percentage: Decimal::ZERO,
            withheld: Cents::ZERO,
            net: total,
        }
    }
}

/// One investor's obligation within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub round: RoundId,
    pub investor: InvestorId,
    pub total: Cents,
    pub qualified: Cents,
    pub shares: Decimal,
    pub status: DividendStatus,
    pub retained_reason: Option<RetainedReason>,
    pub withholding: Option<Withholding>,
}

impl Dividend {
    /// Stages a dividend before the retention policy has run: the status is
    /// provisional and withholding is unset. The store fills in the round
    /// id at commit.
    pub fn stage(investor: InvestorId, total: Cents, qualified: Cents, shares: Decimal) -> Self {
        Self {
            round: RoundId(0),
            investor,
            total,
            qualified,
            shares,
            status: DividendStatus::Issued,
            retained_reason: None,
            withholding: None,
        }
    }

    pub fn retain(&mut self, reason: RetainedReason) {
        self.status = DividendStatus::Retained;
        self.retained_reason = Some(reason);
        self.withholding = Some(Withholding::none_of(self.total));
    }
}

/// Aggregate view of a freshly created round, returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundSummary {
    pub issued: u32,
    pub pending_signup: u32,
    pub retained_sanctioned: u32,
    pub retained_below_threshold: u32,
    pub total_withheld: Cents,
    pub total_net: Cents,
    pub total_retained: Cents,
    pub notification_failures: Vec<String>,
}

impl RoundSummary {
    pub fn tally(dividends: &[Dividend]) -> Self {
        let mut summary = Self::default();
        for dividend in dividends {
            match dividend.status {
                DividendStatus::PendingSignup => summary.pending_signup += 1,
                DividendStatus::Issued => {
                    summary.issued += 1;
                    if let Some(w) = &dividend.withholding {
                        summary.total_withheld += w.withheld;
                        summary.total_net += w.net;
                    }
                }
                DividendStatus::Retained => {
                    match dividend.retained_reason {
                        Some(RetainedReason::SanctionedCountry) => {
                            summary.retained_sanctioned += 1
                        }
                        Some(RetainedReason::BelowThreshold) => {
                            summary.retained_below_threshold += 1
                        }
                        None => {}
                    }
                    summary.total_retained += dividend.total;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_retain_sets_zero_withholding() {
        let mut dividend = Dividend::stage(InvestorId(1), Cents(5000), Cents(4000), dec!(10));
        dividend.retain(RetainedReason::SanctionedCountry);

        assert_eq!(dividend.status, DividendStatus::Retained);
        assert_eq!(
            dividend.retained_reason,
            Some(RetainedReason::SanctionedCountry)
        );
        let w = dividend.withholding.unwrap();
        assert_eq!(w.percentage, Decimal::ZERO);
        assert_eq!(w.withheld, Cents::ZERO);
        assert_eq!(w.net, Cents(5000));
    }

    #[test]
    fn test_summary_tallies_by_status() {
        let mut issued = Dividend::stage(InvestorId(1), Cents(600000), Cents(0), dec!(1));
        issued.withholding = Some(Withholding {
            percentage: dec!(15),
            withheld: Cents(90000),
            net: Cents(510000),
        });
        let mut pending = Dividend::stage(InvestorId(2), Cents(100), Cents(0), dec!(1));
        pending.status = DividendStatus::PendingSignup;
        let mut retained = Dividend::stage(InvestorId(3), Cents(200), Cents(0), dec!(1));
        retained.retain(RetainedReason::BelowThreshold);

        let summary = RoundSummary::tally(&[issued, pending, retained]);
        assert_eq!(summary.issued, 1);
        assert_eq!(summary.pending_signup, 1);
        assert_eq!(summary.retained_below_threshold, 1);
        assert_eq!(summary.retained_sanctioned, 0);
        assert_eq!(summary.total_withheld, Cents(90000));
        assert_eq!(summary.total_net, Cents(510000));
        assert_eq!(summary.total_retained, Cents(200));
    }

    #[test]
    fn test_status_serialization_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&DividendStatus::PendingSignup).unwrap(),
            "\"pending_signup\""
        );
        assert_eq!(
            serde_json::to_string(&RetainedReason::SanctionedCountry).unwrap(),
            "\"sanctioned_country\""
        );
        assert!(serde_json::from_str::<RoundStatus>("\"refunded\"").is_err());
    }
}
