use clap::Parser;
use gearbook::application::booking::BookingService;
use gearbook::application::engine::RentalEngine;
use gearbook::application::settlement::SettlementService;
use gearbook::config::{GatewayConfig, StorageConfig};
use gearbook::domain::ports::{PaymentGatewayRef, PaymentStoreRef, ReservationStoreRef};
use gearbook::infrastructure::gateway::{HttpPaymentGateway, SandboxGateway};
use gearbook::infrastructure::in_memory::{
    InMemoryCatalog, InMemoryPaymentStore, InMemoryReservationStore,
};
use gearbook::infrastructure::notifier::TracingNotifier;
use gearbook::interfaces::csv::catalog_reader::CatalogReader;
use gearbook::interfaces::csv::command_reader::CommandReader;
use gearbook::interfaces::csv::reservation_writer::ReservationWriter;
use gearbook::logging;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Equipment catalog CSV file (id, name, price, available)
    catalog: PathBuf,

    /// Rental commands CSV file (command, ref, user, start, end, lines, method, channel)
    commands: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Payment gateway base URL. Without it an offline sandbox gateway is used.
    #[arg(long)]
    gateway_url: Option<String>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn open_stores(config: &StorageConfig) -> Result<(ReservationStoreRef, PaymentStoreRef)> {
    if let Some(_db_path) = &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            let store = gearbook::infrastructure::rocksdb::RocksDBStore::from_config(config)
                .into_diagnostic()?;
            return Ok((Arc::new(store.clone()), Arc::new(store)));
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
        }
    }

    Ok((
        Arc::new(InMemoryReservationStore::new()),
        Arc::new(InMemoryPaymentStore::new()),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let storage = StorageConfig::from_env(cli.db_path);
    let (reservations, payments) = open_stores(&storage)?;

    let use_http_gateway = cli.gateway_url.is_some();
    let gateway_config = match cli.gateway_url {
        Some(base_url) => GatewayConfig {
            base_url,
            ..GatewayConfig::from_env()
        },
        None => GatewayConfig::from_env(),
    };
    let settlement_config = gateway_config.settlement();
    let gateway: PaymentGatewayRef = if use_http_gateway {
        Arc::new(HttpPaymentGateway::new(gateway_config).into_diagnostic()?)
    } else {
        Arc::new(SandboxGateway::new())
    };

    // Load the catalog
    let catalog = InMemoryCatalog::new();
    let catalog_file = File::open(cli.catalog).into_diagnostic()?;
    for item in CatalogReader::new(catalog_file).equipment() {
        match item {
            Ok(equipment) => catalog.upsert(equipment).await,
            Err(e) => eprintln!("Error reading equipment: {}", e),
        }
    }

    let booking = BookingService::new(Arc::new(catalog), reservations.clone());
    let settlement = SettlementService::new(
        reservations,
        payments,
        gateway,
        Arc::new(TracingNotifier),
        settlement_config,
    );
    let engine = RentalEngine::new(booking, settlement);

    // Process commands
    let file = File::open(cli.commands).into_diagnostic()?;
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(command) => {
                if let Err(e) = engine.process_command(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let reservations = engine.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReservationWriter::new(stdout.lock());
    writer.write_reservations(&reservations).into_diagnostic()?;

    Ok(())
}
