use crate::domain::round::{Dividend, DividendStatus, RetainedReason};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct RegisterRecord {
    round: u64,
    investor: u64,
    shares: Decimal,
    total_cents: i64,
    qualified_cents: i64,
    status: &'static str,
    retained_reason: Option<&'static str>,
    withholding_percentage: Option<Decimal>,
    withheld_cents: Option<i64>,
    net_cents: Option<i64>,
}

impl From<&Dividend> for RegisterRecord {
    fn from(dividend: &Dividend) -> Self {
        Self {
            round: dividend.round.0,
            investor: dividend.investor.0,
            shares: dividend.shares,
            total_cents: dividend.total.0,
            qualified_cents: dividend.qualified.0,
            status: match dividend.status {
                DividendStatus::PendingSignup => "pending_signup",
                DividendStatus::Issued => "issued",
                DividendStatus::Retained => "retained",
            },
            retained_reason: dividend.retained_reason.map(|reason| match reason {
                RetainedReason::SanctionedCountry => "sanctioned_country",
                RetainedReason::BelowThreshold => "below_threshold",
            }),
            withholding_percentage: dividend.withholding.as_ref().map(|w| w.percentage),
            withheld_cents: dividend.withholding.as_ref().map(|w| w.withheld.0),
            net_cents: dividend.withholding.as_ref().map(|w| w.net.0),
        }
    }
}

/// Writes the dividend register of a round as CSV, one row per dividend,
/// with cent-exact integer columns.
pub struct RegisterWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> RegisterWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_register(&mut self, dividends: &[Dividend]) -> Result<()> {
        for dividend in dividends {
            self.writer.serialize(RegisterRecord::from(dividend))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
