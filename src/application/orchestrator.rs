use super::retention::{PlannedNotice, RetentionPolicyEvaluator};
use crate::domain::computation::{AllocationRow, Computation, RowHolder};
use crate::domain::money::Cents;
use crate::domain::ports::{
    InvestorDirectoryBox, NotificationDispatcherBox, RoundStoreBox, WithholdingCalculatorBox,
};
use crate::domain::round::{Dividend, Round, RoundSummary};
use crate::error::Result;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{info, warn};

/// What a round-creation attempt produced. Rejections carry every problem
/// found, not just the first; nothing was persisted and no notice fired.
#[derive(Debug)]
pub enum RoundOutcome {
    Created {
        round: Round,
        dividends: Vec<Dividend>,
        summary: RoundSummary,
    },
    Rejected {
        errors: Vec<String>,
    },
}

/// Turns a computed allocation into a persisted round with its dividends.
///
/// The whole creation is all-or-nothing: rows are resolved and the
/// retention policy runs against staged, in-memory dividends, and only a
/// fully evaluated graph is committed, in one atomic store operation.
/// Notices are dispatched strictly after the commit, so an aborted
/// creation fires nothing.
pub struct RoundOrchestrator {
    rounds: RoundStoreBox,
    investors: InvestorDirectoryBox,
    calculator: WithholdingCalculatorBox,
    notifier: NotificationDispatcherBox,
}

impl RoundOrchestrator {
    pub fn new(
        rounds: RoundStoreBox,
        investors: InvestorDirectoryBox,
        calculator: WithholdingCalculatorBox,
        notifier: NotificationDispatcherBox,
    ) -> Self {
        Self {
            rounds,
            investors,
            calculator,
            notifier,
        }
    }

    /// Creates the round for a computation. Never returns `Err`: every
    /// failure is folded into `RoundOutcome::Rejected`.
    pub async fn create_round(&self, computation: Computation) -> RoundOutcome {
        match self.try_create(computation).await {
            Ok(outcome) => outcome,
            Err(error) => RoundOutcome::Rejected {
                errors: vec![error.to_string()],
            },
        }
    }

    async fn try_create(&self, computation: Computation) -> Result<RoundOutcome> {
        let errors = computation.validate();
        if !errors.is_empty() {
            return Ok(RoundOutcome::Rejected { errors });
        }

        // Conflict precondition: the store re-checks this under its own
        // serialization point at commit, so two concurrent creations
        // cannot both slip through this read.
        if let Some(latest) = self.rounds.latest_issued_at(computation.company).await?
            && latest >= computation.issued_at
        {
            return Ok(RoundOutcome::Rejected {
                errors: vec![format!(
                    "A round issued on {latest} conflicts with an issuance on {}",
                    computation.issued_at
                )],
            });
        }

        let (staged, resolution_errors) = self.resolve_rows(&computation.rows).await?;
        if !resolution_errors.is_empty() {
            return Ok(RoundOutcome::Rejected {
                errors: resolution_errors,
            });
        }

        let total = Cents::from_usd(computation.total_usd)?;
        let shares: Decimal = computation
            .rows
            .iter()
            .map(|row| row.shares.unwrap_or_default())
            .sum();
        let investor_count = staged
            .iter()
            .map(|dividend| dividend.investor)
            .collect::<HashSet<_>>()
            .len() as u32;
        let round = Round::stage(
            computation.company,
            computation.issued_at,
            total,
            shares,
            investor_count,
        );

        let mut dividends = staged;
        let evaluator = RetentionPolicyEvaluator::new(&*self.investors, &*self.calculator);
        let notices = evaluator
            .evaluate(computation.issued_at, &mut dividends)
            .await?;

        let (round, dividends) = self.rounds.commit_round(round, dividends).await?;

        let mut summary = RoundSummary::tally(&dividends);
        self.dispatch_notices(&round, notices, &mut summary).await;

        info!(
            round = %round.id,
            company = %round.company,
            total = %round.total,
            investors = round.investor_count,
            "Dividend round created"
        );

        Ok(RoundOutcome::Created {
            round,
            dividends,
            summary,
        })
    }

    /// Resolves allocation rows into staged dividends. Direct investor
    /// rows map one-to-one; pass-through entity rows expand into one
    /// dividend per underlying holding, with the entity's aggregate
    /// amounts split by each holding's share of the entity's total
    /// investment, rounded to the cent per split.
    async fn resolve_rows(
        &self,
        rows: &[AllocationRow],
    ) -> Result<(Vec<Dividend>, Vec<String>)> {
        let mut staged = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            let gross = Cents::from_usd(row.gross_usd)?;
            let qualified = Cents::from_usd(row.qualified_usd)?;
            let shares = row.shares.unwrap_or_default();

            match &row.holder {
                RowHolder::Investor(investor) => {
                    if self.investors.profile(*investor).await?.is_none() {
                        errors.push(format!("Row {i}: unknown investor {investor}"));
                        continue;
                    }
                    staged.push(Dividend::stage(*investor, gross, qualified, shares));
                }
                RowHolder::PassThroughEntity(name) => {
                    let holdings = self.investors.entity_holdings(name).await?;
                    if holdings.is_empty() {
                        errors.push(format!(
                            "Row {i}: pass-through entity \"{name}\" has no holdings"
                        ));
                        continue;
                    }
                    let entity_total: Cents = holdings.iter().map(|h| h.invested).sum();
                    if entity_total.is_zero() {
                        errors.push(format!(
                            "Row {i}: pass-through entity \"{name}\" has a zero total investment"
                        ));
                        continue;
                    }
                    for holding in &holdings {
                        if self.investors.profile(holding.investor).await?.is_none() {
                            errors.push(format!(
                                "Row {i}: entity \"{name}\" references unknown investor {}",
                                holding.investor
                            ));
                            continue;
                        }
                        let holder_gross = gross.proportion(holding.invested, entity_total)?;
                        let holder_qualified =
                            qualified.proportion(holding.invested, entity_total)?;
                        let holder_shares = shares * Decimal::from(holding.invested.0)
                            / Decimal::from(entity_total.0);
                        staged.push(Dividend::stage(
                            holding.investor,
                            holder_gross,
                            holder_qualified,
                            holder_shares,
                        ));
                    }
                }
            }
        }

        Ok((staged, errors))
    }

    /// Notices fire only for a committed round. A dispatch failure is
    /// recorded on the summary and logged; the committed round stands and
    /// the dispatcher's tracking records make a later retry safe.
    async fn dispatch_notices(
        &self,
        round: &Round,
        notices: Vec<PlannedNotice>,
        summary: &mut RoundSummary,
    ) {
        for planned in notices {
            if let Err(error) = self
                .notifier
                .notify_investor(round.id, planned.investor, planned.notice)
                .await
            {
                warn!(
                    round = %round.id,
                    investor = %planned.investor,
                    %error,
                    "Failed to dispatch round notice"
                );
                summary
                    .notification_failures
                    .push(format!("Investor {}: {error}", planned.investor));
            }
        }
    }
}
