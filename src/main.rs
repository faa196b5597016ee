use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use movie_rentals::application::engine::RentalEngine;
use movie_rentals::config::Config;
use movie_rentals::domain::caller::Caller;
use movie_rentals::domain::ports::{Clock, Stores};
use movie_rentals::infrastructure::clock::{ManualClock, SystemClock};
use movie_rentals::infrastructure::in_memory::in_memory_stores;
use movie_rentals::interfaces::catalog::Catalog;
use movie_rentals::interfaces::csv::event_reader::{EventKind, EventReader};
use movie_rentals::interfaces::csv::report_writer::ReportWriter;
use movie_rentals::telemetry;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Copy, ValueEnum)]
enum Report {
    /// Available stock per movie
    Stock,
    /// Every rental, newest first
    Rentals,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input rental events CSV file (op, customer, movie, at)
    events: PathBuf,

    /// JSON file with movies and customers to seed the stores with
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report printed to stdout after all events are processed
    #[arg(long, value_enum, default_value = "stock")]
    report: Report,

    /// Replay pending reconciliation entries before reporting
    #[arg(long)]
    reconcile: bool,
}

fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            use movie_rentals::infrastructure::rocksdb::RocksDBStore;
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            Ok(store.stores())
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(in_memory_stores())
        }
        None => Ok(in_memory_stores()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).into_diagnostic()?;
    telemetry::init(&config.log.filter);

    let stores = open_stores(cli.db_path)?;

    if let Some(path) = cli.catalog {
        let file = File::open(path).into_diagnostic()?;
        Catalog::from_reader(file)
            .into_diagnostic()?
            .seed(&stores)
            .await
            .into_diagnostic()?;
    }

    // Events carry their own timestamps; the clock is moved to each one before it runs.
    // Rows without one fall back to wall-clock time.
    let wall = SystemClock;
    let clock = Arc::new(ManualClock::new(wall.now()));
    let engine = RentalEngine::new(stores, clock.clone(), config.retry);
    let caller = Caller::system();

    let file = File::open(cli.events).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event_result in reader.events() {
        match event_result {
            Ok(event) => {
                clock.set(event.at.unwrap_or_else(|| wall.now()));
                let result = match event.op {
                    EventKind::Checkout => {
                        engine.checkout(&caller, &event.customer, &event.movie).await
                    }
                    EventKind::Return => {
                        engine
                            .return_rental(&caller, &event.customer, &event.movie)
                            .await
                    }
                };
                if let Err(e) = result {
                    eprintln!("Error processing event: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading event: {}", e);
            }
        }
    }

    if cli.reconcile {
        let report = engine.reconcile(&caller).await.into_diagnostic()?;
        info!(
            repaired = report.repaired,
            pending = report.pending,
            "Reconciliation finished"
        );
    }

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match cli.report {
        Report::Stock => {
            let movies = engine.stock_report().await.into_diagnostic()?;
            writer.write_stock(&movies).into_diagnostic()?;
        }
        Report::Rentals => {
            let rentals = engine.list_rentals(&caller).await.into_diagnostic()?;
            writer.write_rentals(&rentals).into_diagnostic()?;
        }
    }

    Ok(())
}
