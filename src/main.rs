//! bdtrip CLI - REST storage server with a JSON file fallback and file → database sync

use bdtrip::collection::Collection;
use bdtrip::config::{self, AppConfig, DatabaseTarget};
use bdtrip::migrate::{self, MigrateReport};
use bdtrip::storage::{FileStore, SqliteStore};
use bdtrip::sync::{SyncReport, Synchronizer};
use bdtrip::ui::{self, Icons};
use bdtrip::watcher::Watcher;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bdtrip")]
#[command(version)]
#[command(about = "Travel booking storage server backed by a document database with a JSON file fallback")]
#[command(long_about = r#"
bdtrip serves six REST collections (services, destinations, users,
serviceBookings, destinationBookings, admin). Requests go to the database
while it is reachable and to the JSON data file otherwise.

Example usage:
  bdtrip serve --port 4000
  bdtrip sync --watch
  bdtrip migrate --data-file ./db.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./bdtrip.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path, `sqlite://` URL or `:memory:`
        #[arg(short, long)]
        database: Option<String>,

        /// JSON data file used while the database is unavailable
        #[arg(short = 'f', long)]
        data_file: Option<PathBuf>,
    },

    /// Mirror the data file into the database
    Sync {
        /// Keep running and re-sync whenever the data file changes
        #[arg(short, long)]
        watch: bool,

        /// Keep database documents that disappeared from the file
        #[arg(long)]
        no_prune: bool,

        #[arg(short, long)]
        database: Option<String>,

        #[arg(short = 'f', long)]
        data_file: Option<PathBuf>,
    },

    /// Import every document of the data file into the database once
    Migrate {
        #[arg(short, long)]
        database: Option<String>,

        #[arg(short = 'f', long)]
        data_file: Option<PathBuf>,
    },

    /// List legacy id → document id mappings recorded by sync and migrate
    Identities {
        /// Only show one collection
        #[arg(long)]
        collection: Option<Collection>,

        #[arg(short, long)]
        database: Option<String>,
    },

    /// Show document counts per collection
    Stats {
        #[arg(short, long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port, database, data_file } => {
            override_config(&mut config, database, data_file);
            if let Some(port) = port {
                config.port = port;
            }

            ui::header("Starting bdtrip server");
            ui::info("Database", &config.database_target().to_string());
            ui::info("Data file", &config.data_file.display().to_string());
            bdtrip::server::start_server(config).await?;
        }

        Commands::Sync { watch, no_prune, database, data_file } => {
            override_config(&mut config, database, data_file);
            let store = open_database(&config)?;
            let file = FileStore::new(config.data_file.clone());
            let synchronizer = Synchronizer::new(&store).with_prune(!no_prune);

            println!("{} Syncing {} → {}", Icons::SYNC, file.path().display(), config.database_target());
            run_sync(&synchronizer, &file).await;

            if watch {
                let watcher = Watcher::new(file.path().to_path_buf(), config.debounce());
                let mut changes = watcher.watch()?;
                println!("{} Watching {} for changes (Ctrl+C to stop)", Icons::EYE, watcher.path().display());

                loop {
                    tokio::select! {
                        changed = changes.next() => {
                            if changed.is_none() {
                                break;
                            }
                            tracing::info!("Detected db.json change, re-syncing...");
                            run_sync(&synchronizer, &file).await;
                        }
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("Stopping watcher");
                            break;
                        }
                    }
                }
            }
        }

        Commands::Migrate { database, data_file } => {
            override_config(&mut config, database, data_file);
            let file = FileStore::new(config.data_file.clone());
            // Unlike sync, a missing or unreadable data file is fatal here
            let data = file.load_existing().await?;
            let store = open_database(&config)?;

            println!("{} Migrating {} → {}", Icons::PACKAGE, file.path().display(), config.database_target());
            let report = migrate::migrate(&data, &store);
            print_migrate_report(&report);
        }

        Commands::Identities { collection, database } => {
            override_config(&mut config, database, None);
            let store = open_database(&config)?;
            let mappings = store.identity_mappings(collection)?;

            if mappings.is_empty() {
                println!("∅ No legacy identities recorded.");
            } else {
                println!("{} {} legacy identities", Icons::LINK, mappings.len());
                println!("{}", ui::identity_table(&mappings));
            }
        }

        Commands::Stats { database } => {
            override_config(&mut config, database, None);
            let store = open_database(&config)?;
            let stats = store.stats()?;

            println!("{} Database: {}", Icons::STATS, config.database_target());
            println!("{}", ui::stats_table(&stats));
            ui::summary_row("Total documents:", &stats.total_documents().to_string());
        }
    }

    Ok(())
}

fn override_config(config: &mut AppConfig, database: Option<String>, data_file: Option<PathBuf>) {
    if let Some(database) = database {
        config.database = database;
    }
    if let Some(data_file) = data_file {
        config.data_file = data_file;
    }
}

fn open_database(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let target = config.database_target();
    if let DatabaseTarget::File(path) = &target {
        config::ensure_db_dir(path)?;
    }
    let store = SqliteStore::open_target(&target)?;
    ui::backend("Connected to", &target.to_string());
    Ok(store)
}

/// One sync pass; failures are reported and never end a watch session
async fn run_sync(synchronizer: &Synchronizer<'_>, file: &FileStore) {
    match synchronizer.sync_file(file).await {
        Ok(report) => print_sync_report(&report),
        Err(e) => ui::error(&format!("Sync failed: {}", e)),
    }
}

fn print_sync_report(report: &SyncReport) {
    ui::section("Sync");
    for c in &report.collections {
        ui::summary_row(
            &format!("{}:", c.collection),
            &format!(
                "{} docs, {} inserted, {} updated, {} unchanged, {} pruned",
                c.documents, c.inserted, c.updated, c.unchanged, c.pruned
            ),
        );
    }
    for name in &report.skipped_collections {
        println!("  {}", ui::dim(&format!("skipped {} (no matching collection)", name)));
    }
    for warning in &report.warnings {
        ui::warn(&warning.to_string());
    }

    if report.is_noop() {
        ui::success("Database already up to date");
    } else {
        ui::success(&format!(
            "Sync complete: {} inserted, {} updated, {} pruned",
            report.inserted(),
            report.updated(),
            report.pruned()
        ));
    }
}

fn print_migrate_report(report: &MigrateReport) {
    ui::section("Migrate");
    for (collection, imported) in &report.imported {
        ui::summary_row(&format!("{}:", collection), &format!("{} imported", imported));
    }
    for name in &report.skipped_collections {
        println!("  {}", ui::dim(&format!("skipped {} (no matching collection)", name)));
    }
    for warning in &report.warnings {
        ui::warn(&warning.to_string());
    }
    ui::success(&format!("Migration finished: {} documents imported", report.total_imported()));
}
