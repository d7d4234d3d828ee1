//! # Console Commands
//!
//! ```text
//!   depot serve                              HTTP server
//!   depot migrate                            apply migrations and exit
//!   depot stock check-low [--notify]
//!   depot users make-super-admin <email>
//!   depot machines backfill [--dry-run]
//!   depot machines filters-due [--days N] [--notify]
//!   depot telegram test [message]
//!   depot export <kind> --from D --to D [--output FILE]
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use depot_core::attendance::format_hours;
use depot_db::Database;
use depot_notify::{message, Notifier};
use depot_report::{save_xlsx, ExportKind};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::alerts;
use crate::config::AppConfig;
use crate::export::build_report;
use crate::services;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "depot", version, about = "Inventory, sales, machines and attendance")]
pub struct Cli {
    /// Path to depot.toml
    #[arg(long, global = true, env = "DEPOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve,
    /// Apply database migrations and exit
    Migrate,
    #[command(subcommand)]
    Stock(StockCommand),
    #[command(subcommand)]
    Users(UsersCommand),
    #[command(subcommand)]
    Machines(MachinesCommand),
    #[command(subcommand)]
    Telegram(TelegramCommand),
    /// Write an .xlsx export
    Export(ExportArgs),
}

#[derive(Debug, Subcommand)]
pub enum StockCommand {
    /// List products at or below their low-stock threshold
    CheckLow {
        /// Send the list to Telegram
        #[arg(long)]
        notify: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// Give a user the super_admin role
    MakeSuperAdmin { email: String },
}

#[derive(Debug, Subcommand)]
pub enum MachinesCommand {
    /// Provision machines for completed sales that have none
    Backfill {
        #[arg(long)]
        dry_run: bool,
    },
    /// List filters due for replacement
    FiltersDue {
        #[arg(long, default_value_t = 30)]
        days: i64,
        #[arg(long)]
        notify: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum TelegramCommand {
    /// Send a test message
    Test { message: Option<String> },
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// sales, stock, movements or attendance
    #[arg(value_parser = parse_kind)]
    pub kind: ExportKind,
    #[arg(long)]
    pub from: NaiveDate,
    #[arg(long)]
    pub to: NaiveDate,
    /// Defaults to `<kind>_<from>_<to>.xlsx`
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config).context("loading configuration")?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let db = open(&config).await?;
            db.run_migrations().await?;
            println!("Migrations applied to {}", config.database.path.display());
            Ok(())
        }
        Command::Stock(StockCommand::CheckLow { notify }) => {
            let db = open(&config).await?;
            let notifier = notifier(&config, notify)?;
            let levels = alerts::check_low_stock(&db, &notifier, notify).await?;
            if levels.is_empty() {
                println!("No products are low on stock.");
            }
            for level in &levels {
                println!(
                    "{:<12} {:<32} {:<8} {:>6} / {}",
                    level.sku, level.product_name, level.warehouse_code, level.quantity, level.low_stock_threshold
                );
            }
            Ok(())
        }
        Command::Users(UsersCommand::MakeSuperAdmin { email }) => {
            let db = open(&config).await?;
            let promotion = db.users().promote_super_admin(&email).await?;
            if promotion.already_super_admin {
                println!("{} is already a super admin.", promotion.user.email);
            } else {
                println!("{} is now a super admin.", promotion.user.email);
            }
            Ok(())
        }
        Command::Machines(MachinesCommand::Backfill { dry_run }) => {
            let db = open(&config).await?;
            let report = db.machines().backfill(dry_run).await?;
            let verb = if dry_run { "would create" } else { "created" };
            println!(
                "Scanned {} completed sales; {} {} machines and {} filters for {} sales.",
                report.sales_scanned, verb, report.machines_created, report.filters_created, report.sales_provisioned
            );
            Ok(())
        }
        Command::Machines(MachinesCommand::FiltersDue { days, notify }) => {
            let db = open(&config).await?;
            let notifier = notifier(&config, notify)?;
            let today = config.attendance.clock()?.work_date(Utc::now());
            let due = alerts::check_filters_due(&db, &notifier, days, today, notify).await?;
            if due.is_empty() {
                println!("No filters due within {days} days.");
            }
            for f in &due {
                println!(
                    "{}  {:<18} {:<10} {:<24} {}",
                    f.due_on,
                    f.serial_number,
                    f.filter_sku,
                    f.customer_name,
                    f.customer_phone.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Command::Telegram(TelegramCommand::Test { message: text }) => {
            let notifier = notifier(&config, true)?;
            notifier.send(&message::test_message(text.as_deref(), Utc::now())).await?;
            println!("Test message sent to chat {}.", config.telegram.chat_id);
            Ok(())
        }
        Command::Export(args) => {
            let db = open(&config).await?;
            let offset = config.attendance.offset()?;
            let report = build_report(&db, args.kind, args.from, args.to, offset).await?;
            let output = args
                .output
                .unwrap_or_else(|| PathBuf::from(args.kind.file_name(args.from, args.to)));
            save_xlsx(&report, &output)?;
            println!("Wrote {} rows to {}", report.rows.len(), output.display());
            if args.kind == ExportKind::Attendance {
                let worked = report.column_total(6);
                println!("Total work hours: {}", format_hours(worked));
            }
            Ok(())
        }
    }
}

fn parse_kind(value: &str) -> Result<ExportKind, String> {
    value.parse().map_err(|e: depot_report::ReportError| e.to_string())
}

async fn open(config: &AppConfig) -> anyhow::Result<Database> {
    Database::new(config.database.db_config())
        .await
        .with_context(|| format!("opening {}", config.database.path.display()))
}

/// `required` commands fail when Telegram is off instead of only logging.
fn notifier(config: &AppConfig, required: bool) -> anyhow::Result<Notifier> {
    let notifier = Notifier::from_config(&config.telegram)?;
    if required && !notifier.is_enabled() {
        bail!("Telegram is disabled; set [telegram] in depot.toml or DEPOT_TELEGRAM_BOT_TOKEN");
    }
    Ok(notifier)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let db = open(&config).await?;
    let notifier = Notifier::from_config(&config.telegram)?;
    let addr = config.server.bind_address();
    let state = AppState::new(db.clone(), config, notifier)?;

    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, telegram = state.notifier.is_enabled(), "Starting HTTP server");

    axum::serve(listener, services::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_commands() {
        let cli = Cli::try_parse_from(["depot", "machines", "filters-due", "--days", "14", "--notify"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Machines(MachinesCommand::FiltersDue { days: 14, notify: true })
        ));

        let cli = Cli::try_parse_from(["depot", "users", "make-super-admin", "ops@example.com"]).unwrap();
        assert!(matches!(cli.command, Command::Users(UsersCommand::MakeSuperAdmin { .. })));
    }

    #[test]
    fn test_export_args() {
        let cli = Cli::try_parse_from([
            "depot", "export", "attendance", "--from", "2024-05-01", "--to", "2024-05-31",
        ])
        .unwrap();
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.kind, ExportKind::Attendance);
                assert_eq!(args.from, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["depot", "export", "invoices", "--from", "2024-05-01", "--to", "2024-05-31"]).is_err());
    }
}
