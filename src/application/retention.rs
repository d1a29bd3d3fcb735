use crate::domain::money::Cents;
use crate::domain::parties::InvestorId;
use crate::domain::ports::{InvestorDirectory, InvestorNotice, WithholdingCalculator};
use crate::domain::round::{Dividend, DividendStatus, RetainedReason, Withholding};
use crate::error::{DistributionError, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

/// A notice the evaluator decided to send, dispatched by the orchestrator
/// only after the round has committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedNotice {
    pub investor: InvestorId,
    pub notice: InvestorNotice,
}

/// Decides, per investor, whether that investor's dividends are issued,
/// retained, or pending signup, and computes withholding for the issued
/// ones.
///
/// Branches are evaluated in a fixed order and the first match wins:
/// onboarding, then sanction residency, then the minimum-payment
/// threshold, then the normal withholding path. The decision is made on
/// the investor's full row set (an investor may hold several rows across
/// share classes or expanded pass-through entities), but cent rounding of
/// withheld amounts happens per row.
pub struct RetentionPolicyEvaluator<'a> {
    investors: &'a dyn InvestorDirectory,
    calculator: &'a dyn WithholdingCalculator,
}

impl<'a> RetentionPolicyEvaluator<'a> {
    pub fn new(
        investors: &'a dyn InvestorDirectory,
        calculator: &'a dyn WithholdingCalculator,
    ) -> Self {
        Self {
            investors,
            calculator,
        }
    }

    /// Mutates the staged dividends in place and returns exactly one
    /// planned notice per investor.
    pub async fn evaluate(
        &self,
        issued_at: NaiveDate,
        dividends: &mut [Dividend],
    ) -> Result<Vec<PlannedNotice>> {
        let tax_year = issued_at.year();

        let mut by_investor: BTreeMap<InvestorId, Vec<usize>> = BTreeMap::new();
        for (i, dividend) in dividends.iter().enumerate() {
            by_investor.entry(dividend.investor).or_default().push(i);
        }

        let mut notices = Vec::with_capacity(by_investor.len());
        for (investor, indexes) in by_investor {
            let profile = self.investors.profile(investor).await?.ok_or_else(|| {
                DistributionError::ValidationError(format!("Unknown investor {investor}"))
            })?;

            if !profile.onboarded {
                // Pending-signup investors still get the issuance notice
                // even though no money moves yet.
                for &i in &indexes {
                    dividends[i].status = DividendStatus::PendingSignup;
                    dividends[i].retained_reason = None;
                    dividends[i].withholding = None;
                }
                notices.push(PlannedNotice {
                    investor,
                    notice: InvestorNotice::DividendIssued,
                });
            } else if profile.sanctioned_resident {
                for &i in &indexes {
                    dividends[i].retain(RetainedReason::SanctionedCountry);
                }
                notices.push(PlannedNotice {
                    investor,
                    notice: InvestorNotice::SanctionedCountryRetention,
                });
            } else if indexes.iter().map(|&i| dividends[i].total).sum::<Cents>()
                < profile.minimum_payment
            {
                for &i in &indexes {
                    dividends[i].retain(RetainedReason::BelowThreshold);
                }
                notices.push(PlannedNotice {
                    investor,
                    notice: InvestorNotice::BelowThresholdRetention,
                });
            } else {
                let rows: Vec<Dividend> = indexes.iter().map(|&i| dividends[i].clone()).collect();
                let percentage = self
                    .calculator
                    .percentage(investor, tax_year, &rows)
                    .await?;
                for &i in &indexes {
                    let withheld = dividends[i].total.withhold(percentage)?;
                    dividends[i].status = DividendStatus::Issued;
                    dividends[i].retained_reason = None;
                    dividends[i].withholding = Some(Withholding {
                        percentage,
                        withheld,
                        net: dividends[i].total - withheld,
                    });
                }
                notices.push(PlannedNotice {
                    investor,
                    notice: InvestorNotice::DividendIssued,
                });
            }
        }

        Ok(notices)
    }
}
