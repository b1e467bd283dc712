use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use checklist_engine::{EngineConfig, Scheduler};
use database::Database;

#[derive(Debug, Parser)]
#[command(name = "nr12-scheduler")]
#[command(about = "Generate NR12 checklists for equipment with due cadences")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler once and print the report
    Run {
        /// Operational date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Also run for the following N days
        #[arg(long, default_value_t = 0)]
        days_ahead: u32,

        /// Restrict to one equipment
        #[arg(long)]
        equipment_id: Option<i64>,
    },
    /// Run on every SCHEDULER_INTERVAL tick until interrupted
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;

    let db = Database::connect(&config.sqlite_url).await?;
    db.migrate().await?;
    let scheduler = Scheduler::new(db.clone(), config.clone());

    match args.command {
        Command::Run {
            date,
            days_ahead,
            equipment_id,
        } => {
            let start = date.unwrap_or_else(|| config.today(Utc::now()));
            let report = scheduler.run_range(start, days_ahead + 1, equipment_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Daemon => {
            info!("Scheduler daemon started (interval {:?})", config.scheduler_interval);
            let mut ticker = tokio::time::interval(config.scheduler_interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        match scheduler.run_due(now).await {
                            Ok(report) => info!("Tick: {}", report),
                            Err(e) => error!("Scheduler run failed: {}", e),
                        }
                        if let Err(e) = scheduler.flag_overdue(now).await {
                            error!("Overdue check failed: {}", e);
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutting down scheduler daemon");
                        break;
                    }
                }
            }
        }
    }

    db.close().await;
    Ok(())
}
