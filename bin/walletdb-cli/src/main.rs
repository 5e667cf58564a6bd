//! walletdb CLI - Admin Command Line Interface
//!
//! Diagnostics and backup tooling for the secret stores: inspect, export
//! and audit records without going through the RPC service.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walletdb_common::Config;
use walletdb_store::{KeyNamespace, StoreName, StoreRegistry, codec};

#[derive(Parser, Debug)]
#[command(name = "walletdb-cli")]
#[command(about = "walletdb Admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "walletdb.toml")]
    config: PathBuf,

    /// Data directory (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Store to operate on
    #[arg(short, long, value_enum, default_value_t = StoreArg::Wallet)]
    store: StoreArg,

    /// Log level (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreArg {
    Wallet,
    Csr,
    CsrStatus,
}

impl From<StoreArg> for StoreName {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Wallet => StoreName::Wallet,
            StoreArg::Csr => StoreName::Csr,
            StoreArg::CsrStatus => StoreName::CsrStatus,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NamespaceArg {
    DkgDh,
    TempNek,
}

impl From<NamespaceArg> for KeyNamespace {
    fn from(arg: NamespaceArg) -> Self {
        match arg {
            NamespaceArg::DkgDh => KeyNamespace::DkgDhKey,
            NamespaceArg::TempNek => KeyNamespace::TempNek,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory and all stores
    Init,
    /// Show the data directory and record counts
    Info,
    /// Print the value stored under a key
    Get {
        key: String,
        /// Also print format and creation time
        #[arg(long, conflicts_with = "cached")]
        verbose: bool,
        /// Read through an LRU cache sized by `cache.capacity`
        #[arg(long)]
        cached: bool,
    },
    /// Store a value
    Put {
        key: String,
        value: String,
        /// Fail if the key already exists
        #[arg(long)]
        unique: bool,
    },
    /// Delete a key
    Delete {
        key: String,
        /// Only delete keys inside this namespace
        #[arg(long, value_enum)]
        namespace: Option<NamespaceArg>,
    },
    /// List keys
    Keys {
        /// Maximum number of keys to list
        #[arg(long, default_value_t = u64::MAX)]
        max: u64,
    },
    /// Print every record with its creation time
    Dump,
    /// Print the most recently created key
    Latest,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config: Config = if args.config.exists() {
        let config_str = std::fs::read_to_string(&args.config)
            .with_context(|| format!("reading {}", args.config.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("parsing {}", args.config.display()))?
    } else {
        Config::default()
    };

    // CLI takes precedence
    if let Some(data_dir) = &args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("Config file: {}", args.config.display());

    let registry = StoreRegistry::new(config.storage.clone());
    registry.initialize()?;
    let store = registry.get(args.store.into())?;

    match args.command {
        Commands::Init => {
            info!("Stores ready in {}", registry.data_directory()?.display());
        }
        Commands::Info => {
            println!("Data directory: {}", registry.data_directory()?.display());
            for name in StoreName::ALL {
                let store = registry.get(name)?;
                println!("  {:<12} {:>8} records", name, store.len()?);
            }
        }
        Commands::Get { key, cached: true, .. } => {
            let cached = registry.cached(args.store.into(), &config.cache)?;
            match cached.read(&key)? {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("key '{key}' not found in {}", store.name()),
            }
            debug!(
                "Cache capacity {}, {} entries",
                cached.cache().capacity(),
                cached.cache().len()
            );
        }
        Commands::Get { key, verbose, .. } => match store.read_record(&key)? {
            Some(record) => {
                let created_at = record.created_at;
                let format = record.format();
                println!("{}", record.into_payload_string(&key)?);
                if verbose {
                    println!("format: {format:?}");
                    if let Some(ts) = created_at {
                        println!("created: {}", codec::render_timestamp(ts));
                    }
                }
            }
            None => anyhow::bail!("key '{key}' not found in {}", store.name()),
        },
        Commands::Put { key, value, unique } => {
            if unique {
                store.write_if_absent(&key, &value)?;
            } else {
                store.write(&key, &value)?;
            }
            info!("Stored '{}' in {}", key, store.name());
        }
        Commands::Delete { key, namespace } => {
            match namespace {
                Some(ns) => store.delete_in_namespace(&key, ns.into())?,
                None => store.delete(&key)?,
            }
            info!("Deleted '{}' from {}", key, store.name());
        }
        Commands::Keys { max } => {
            let mut visitor = |key: &str| println!("{key}");
            let visited = store.visit_keys(&mut visitor, max)?;
            debug!("Listed {} keys", visited);
        }
        Commands::Dump => {
            let report = store.dump_all()?;
            print!("{}", report.text);
            println!("{} records", report.count);
            if report.skipped > 0 {
                println!("{} corrupt records skipped", report.skipped);
            }
        }
        Commands::Latest => match store.latest_created()? {
            Some(latest) => println!(
                "{} ({})",
                latest.key,
                codec::render_timestamp(latest.created_at)
            ),
            None => println!("no timestamped records in {}", store.name()),
        },
    }

    Ok(())
}
