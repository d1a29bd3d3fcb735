use crate::domain::computation::{AllocationRow, RowHolder};
use crate::domain::parties::InvestorId;
use crate::error::{DistributionError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct AllocationRecord {
    investor: Option<u64>,
    entity: Option<String>,
    shares: Option<Decimal>,
    gross_usd: Decimal,
    qualified_usd: Decimal,
}

impl TryFrom<AllocationRecord> for AllocationRow {
    type Error = DistributionError;

    fn try_from(record: AllocationRecord) -> Result<Self> {
        let holder = match (record.investor, record.entity) {
            (Some(investor), None) => RowHolder::Investor(InvestorId(investor)),
            (None, Some(entity)) => RowHolder::PassThroughEntity(entity),
            _ => {
                return Err(DistributionError::ValidationError(
                    "Allocation row must name exactly one of investor or entity".to_string(),
                ));
            }
        };
        Ok(AllocationRow {
            holder,
            shares: record.shares,
            gross_usd: record.gross_usd,
            qualified_usd: record.qualified_usd,
        })
    }
}

/// Reads allocation rows from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record
/// lengths, and yields `Result<AllocationRow>` lazily so large
/// computations stream without loading everything up front.
pub struct AllocationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AllocationReader<R> {
    /// Creates a new `AllocationReader` from any `Read` source.
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<AllocationRow>> {
        self.reader.into_deserialize::<AllocationRecord>().map(|result| {
            result
                .map_err(DistributionError::from)
                .and_then(AllocationRow::try_from)
        })
    }
}
