use chrono::NaiveDate;
use clap::Parser;
use divirail::application::orchestrator::{RoundOrchestrator, RoundOutcome};
use divirail::domain::computation::Computation;
use divirail::domain::parties::CompanyId;
use divirail::infrastructure::in_memory::{InMemoryDirectory, InMemoryDistributionStore};
use divirail::infrastructure::notifications::InMemoryNotices;
use divirail::infrastructure::support::FlatRateCalculator;
use divirail::interfaces::csv::allocation_reader::AllocationReader;
use divirail::interfaces::csv::investor_reader::InvestorReader;
use divirail::interfaces::csv::register_writer::RegisterWriter;
use miette::{IntoDiagnostic, Result, miette};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Investor profiles CSV file (investor, onboarded, sanctioned, minimum_usd)
    investors: PathBuf,

    /// Allocation rows CSV file (investor, entity, shares, gross_usd, qualified_usd)
    allocations: PathBuf,

    /// Distribution total in dollars
    #[arg(long)]
    total_usd: Decimal,

    /// Issuance date (YYYY-MM-DD)
    #[arg(long)]
    issued_at: NaiveDate,

    /// Treat the distribution as a return of capital
    #[arg(long)]
    return_of_capital: bool,

    /// Flat withholding percentage applied to issued dividends
    #[arg(long, default_value = "15")]
    withholding_rate: Decimal,

    /// Company identifier for the round
    #[arg(long, default_value = "1")]
    company: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let directory = InMemoryDirectory::new();
    let investors = File::open(&cli.investors).into_diagnostic()?;
    for profile in InvestorReader::new(investors).profiles() {
        directory.add_investor(profile.into_diagnostic()?);
    }

    let allocations = File::open(&cli.allocations).into_diagnostic()?;
    let rows = AllocationReader::new(allocations)
        .rows()
        .collect::<Result<Vec<_>, _>>()
        .into_diagnostic()?;

    let computation = Computation {
        company: CompanyId(cli.company),
        total_usd: cli.total_usd,
        issued_at: cli.issued_at,
        return_of_capital: cli.return_of_capital,
        rows,
    };

    let store = InMemoryDistributionStore::new();
    let notices = InMemoryNotices::new();
    let orchestrator = RoundOrchestrator::new(
        Box::new(store),
        Box::new(directory),
        Box::new(FlatRateCalculator::new(cli.withholding_rate)),
        Box::new(notices),
    );

    match orchestrator.create_round(computation).await {
        RoundOutcome::Created {
            round,
            dividends,
            summary,
        } => {
            let stdout = io::stdout();
            let mut writer = RegisterWriter::new(stdout.lock());
            writer.write_register(&dividends).into_diagnostic()?;

            eprintln!(
                "Round {} issued {} for {} investors: \
                 {} issued, {} pending signup, {} retained (sanctioned), {} retained (threshold); \
                 withheld {}, net {}, retained {}",
                round.id,
                round.total,
                round.investor_count,
                summary.issued,
                summary.pending_signup,
                summary.retained_sanctioned,
                summary.retained_below_threshold,
                summary.total_withheld,
                summary.total_net,
                summary.total_retained,
            );
            Ok(())
        }
        RoundOutcome::Rejected { errors } => {
            for error in &errors {
                eprintln!("Error: {error}");
            }
            Err(miette!("Round creation rejected ({} errors)", errors.len()))
        }
    }
}
