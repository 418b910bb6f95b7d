use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod aggregate;
mod dashboard;
mod db;
mod export;
mod ingest;
mod models;
mod report;
mod session;

use dashboard::Dashboard;
use db::Store;
use ingest::ColumnMapping;
use models::{AnalysisKind, ReportSchedule};
use session::Session;

#[derive(Parser)]
#[command(name = "saleasy")]
#[command(about = "Simple sales analytics: upload a CSV, see totals and trends, export reports", long_about = None)]
struct Cli {
    /// SQLite database URL or file path (falls back to DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Username to log in as
    #[arg(long, global = true)]
    user: Option<String>,

    /// Password (falls back to SALEASY_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ColumnArgs {
    /// Input column holding the product name
    #[arg(long, default_value = "product")]
    product_column: String,
    /// Input column holding the price
    #[arg(long, default_value = "price")]
    price_column: String,
    /// Input column holding the sale date
    #[arg(long, default_value = "date")]
    date_column: String,
}

impl ColumnArgs {
    fn mapping(&self) -> ColumnMapping {
        ColumnMapping {
            product: self.product_column.clone(),
            price: self.price_column.clone(),
            date: self.date_column.clone(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Log in, creating the account on first use
    Login,
    /// Analyze a sales CSV
    Analyze {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        columns: ColumnArgs,
        /// sum-per-product, top-product, daily-trend or monthly-trend (defaults to the saved preference)
        #[arg(long)]
        view: Option<AnalysisKind>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Also write the report to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export the cleaned table and top product as an xlsx workbook
    Export {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        columns: ColumnArgs,
        #[arg(long)]
        out: PathBuf,
        /// Also write per-product totals as CSV
        #[arg(long)]
        totals_csv: Option<PathBuf>,
    },
    /// Show or change saved preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
    /// List exported reports
    Reports,
}

#[derive(Subcommand)]
enum PrefsAction {
    Show,
    Set {
        /// sum-per-product, top-product, daily-trend or monthly-trend
        #[arg(long)]
        analysis: AnalysisKind,
        /// daily, weekly or monthly
        #[arg(long)]
        schedule: ReportSchedule,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let database_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| db::DEFAULT_DATABASE_URL.to_string());
    let store = Store::open(&database_url)
        .with_context(|| format!("invalid database URL {database_url}"))?;
    let dashboard = Dashboard::new(store);

    let prepared = dashboard.prepare().await;
    print_warnings(&prepared.warnings);

    if let Commands::InitDb = cli.command {
        if prepared.warnings.is_empty() {
            println!("Schema ready.");
            return Ok(());
        }
        anyhow::bail!("could not prepare the sales database");
    }

    let session = login(&dashboard, &cli).await?;

    match cli.command {
        Commands::InitDb => {}
        Commands::Login => {
            if session.is_offline() {
                println!("Working offline as {}; nothing will be saved.", session.username());
            } else if session.registered() {
                println!("Welcome, {}! Your account was created.", session.username());
            } else {
                println!("Welcome back, {}!", session.username());
            }
        }
        Commands::Analyze {
            csv,
            columns,
            view,
            format,
            out,
        } => {
            let rows = dashboard::load(&csv, &columns.mapping())
                .with_context(|| format!("failed to load {}", csv.display()))?;
            let (_, analysis) = dashboard::analyze(&rows);

            let view = match view {
                Some(view) => view,
                None => {
                    let outcome = dashboard.default_view(&session).await;
                    print_warnings(&outcome.warnings);
                    outcome.value
                }
            };

            let rendered = match format {
                OutputFormat::Text => report::build_report(
                    session.username(),
                    &csv.display().to_string(),
                    view,
                    &analysis,
                ),
                OutputFormat::Json => serde_json::to_string_pretty(&analysis)?,
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, &rendered)?;
                    println!("Report written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Export {
            csv,
            columns,
            out,
            totals_csv,
        } => {
            let rows = dashboard::load(&csv, &columns.mapping())
                .with_context(|| format!("failed to load {}", csv.display()))?;
            let (table, analysis) = dashboard::analyze(&rows);
            if analysis.aggregation.is_empty() {
                println!("No valid sales rows found; exporting an empty report.");
            }

            let outcome = dashboard
                .export(
                    &session,
                    &table,
                    &analysis,
                    &out,
                    totals_csv.as_deref(),
                    Utc::now().naive_utc(),
                )
                .await
                .with_context(|| format!("failed to export {}", out.display()))?;
            print_warnings(&outcome.warnings);
            println!(
                "Workbook written to {} ({}).",
                outcome.value.display(),
                export::XLSX_MIME
            );
        }
        Commands::Prefs { action } => match action {
            PrefsAction::Show => {
                let outcome = dashboard.preferences(&session).await;
                print_warnings(&outcome.warnings);
                if let Some((analysis, schedule)) = outcome.value {
                    println!("Default analysis: {analysis}");
                    println!("Report schedule: {schedule}");
                }
            }
            PrefsAction::Set { analysis, schedule } => {
                let outcome = dashboard
                    .save_preferences(&session, analysis, schedule)
                    .await;
                print_warnings(&outcome.warnings);
                if outcome.value {
                    println!("Preferences saved.");
                }
            }
        },
        Commands::Reports => {
            let outcome = dashboard.history(&session).await;
            print_warnings(&outcome.warnings);
            if outcome.value.is_empty() {
                println!("No reports exported yet.");
            }
            for record in outcome.value {
                println!(
                    "- #{} {} {}",
                    record.id, record.report_time, record.report_file
                );
            }
        }
    }

    session.logout();
    Ok(())
}

async fn login(dashboard: &Dashboard, cli: &Cli) -> anyhow::Result<Session> {
    let username = cli
        .user
        .as_deref()
        .context("--user is required for this command")?;
    let password = match &cli.password {
        Some(password) => password.clone(),
        None => std::env::var("SALEASY_PASSWORD")
            .context("--password or SALEASY_PASSWORD must be set")?,
    };

    let outcome = dashboard.open_session(username, &password).await?;
    print_warnings(&outcome.warnings);
    Ok(outcome.value)
}

fn print_warnings(warnings: &[String]) {
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
}
