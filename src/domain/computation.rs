use super::parties::{CompanyId, InvestorId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Who an allocation row belongs to: either a directly held investor, or a
/// pass-through entity whose aggregate row gets expanded into one dividend
/// per underlying holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowHolder {
    Investor(InvestorId),
    PassThroughEntity(String),
}

/// One investor's (or entity's) share of the computed distribution,
/// expressed in dollars. Immutable input produced by the upstream
/// allocation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub holder: RowHolder,
    pub shares: Option<Decimal>,
    pub gross_usd: Decimal,
    pub qualified_usd: Decimal,
}

/// The computed distribution for one company: the total dollar amount, the
/// issuance date, and the per-holder allocation rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computation {
    pub company: CompanyId,
    pub total_usd: Decimal,
    pub issued_at: NaiveDate,
    pub return_of_capital: bool,
    pub rows: Vec<AllocationRow>,
}

impl Computation {
    /// Checks the computation for malformed input, collecting every problem
    /// rather than stopping at the first.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.total_usd <= Decimal::ZERO {
            errors.push(format!(
                "Computation total must be positive, got {}",
                self.total_usd
            ));
        }
        if self.rows.is_empty() {
            errors.push("Computation has no allocation rows".to_string());
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.gross_usd < Decimal::ZERO {
                errors.push(format!("Row {i}: gross amount is negative"));
            }
            if row.qualified_usd < Decimal::ZERO {
                errors.push(format!("Row {i}: qualified amount is negative"));
            }
            if row.qualified_usd > row.gross_usd {
                errors.push(format!("Row {i}: qualified amount exceeds gross"));
            }
            if let RowHolder::PassThroughEntity(name) = &row.holder
                && name.trim().is_empty()
            {
                errors.push(format!("Row {i}: pass-through entity name is blank"));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn computation(rows: Vec<AllocationRow>) -> Computation {
        Computation {
            company: CompanyId(1),
            total_usd: dec!(1000),
            issued_at: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            return_of_capital: false,
            rows,
        }
    }

    #[test]
    fn test_valid_computation_has_no_errors() {
        let c = computation(vec![AllocationRow {
            holder: RowHolder::Investor(InvestorId(1)),
            shares: Some(dec!(100)),
            gross_usd: dec!(1000),
            qualified_usd: dec!(800),
        }]);
        assert!(c.validate().is_empty());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut c = computation(vec![
            AllocationRow {
                holder: RowHolder::Investor(InvestorId(1)),
                shares: None,
                gross_usd: dec!(-1),
                qualified_usd: dec!(0),
            },
            AllocationRow {
                holder: RowHolder::PassThroughEntity("  ".to_string()),
                shares: None,
                gross_usd: dec!(10),
                qualified_usd: dec!(20),
            },
        ]);
        c.total_usd = dec!(0);
        let errors = c.validate();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_empty_rows_rejected() {
        let c = computation(vec![]);
        assert_eq!(c.validate(), vec!["Computation has no allocation rows"]);
    }
}
