use crate::domain::money::Cents;
use crate::domain::parties::{InvestorId, InvestorProfile};
use crate::error::{DistributionError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct InvestorRecord {
    investor: u64,
    onboarded: bool,
    sanctioned: bool,
    minimum_usd: Option<Decimal>,
}

/// Reads investor profiles from a CSV source, converting the configured
/// minimum payment into cents at the usual conversion boundary.
pub struct InvestorReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> InvestorReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn profiles(self) -> impl Iterator<Item = Result<InvestorProfile>> {
        self.reader.into_deserialize().map(|result| {
            let record: InvestorRecord = result.map_err(DistributionError::from)?;
            Ok(InvestorProfile {
                investor: InvestorId(record.investor),
                onboarded: record.onboarded,
                sanctioned_resident: record.sanctioned,
                minimum_payment: Cents::from_usd(record.minimum_usd.unwrap_or_default())?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_profiles_with_default_threshold() {
        let data = "investor, onboarded, sanctioned, minimum_usd\n\
                    1, true, false, 25.00\n\
                    2, false, false, ";
        let profiles: Vec<Result<InvestorProfile>> =
            InvestorReader::new(data.as_bytes()).profiles().collect();

        assert_eq!(profiles.len(), 2);
        let first = profiles[0].as_ref().unwrap();
        assert_eq!(first.investor, InvestorId(1));
        assert!(first.onboarded);
        assert_eq!(first.minimum_payment, Cents(2500));

        let second = profiles[1].as_ref().unwrap();
        assert!(!second.onboarded);
        assert_eq!(second.minimum_payment, Cents::ZERO);
    }
}
