//! acars-server: UDP ingest server and CLI for acarsdec output.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::{error, info, warn};

use acars_core::config::{self, Config, DEFAULT_CONFIG_FILE};
use acars_core::decode;

mod db;
#[cfg(feature = "postgres")]
mod db_pg;
mod handler;
mod server;

use db::MessageStore;
use handler::Router;
use server::Server;

#[derive(Parser)]
#[command(name = "acars", version, about = "ACARS message receiver and store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the properties config file
    #[arg(long, env = "ACARS_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Database URL (SQLite path or postgres:// URL); overrides database.url
    #[arg(long, env = "ACARS_DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive acarsdec datagrams and store them
    Serve {
        #[command(flatten)]
        config: ConfigArgs,

        /// UDP port to listen on; overrides server.port
        #[arg(short, long, env = "ACARS_PORT")]
        port: Option<u16>,
    },

    /// Decode records from a file (one per line) and print them
    Decode {
        /// Path to file containing acarsdec records, or - for stdin
        file: PathBuf,

        /// Print messages as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Send records from a file to a running server, one datagram per line
    Replay {
        /// Path to file containing acarsdec records
        file: PathBuf,

        /// Server address
        #[arg(long, default_value = "127.0.0.1:9876")]
        target: String,

        /// Delay between datagrams in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,
    },

    /// Show stored message counts per label
    Stats {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print counts as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    // Structured logging, controlled via RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => cmd_serve(config, port).await,
        Commands::Decode { file, json } => cmd_decode(file, json),
        Commands::Replay {
            file,
            target,
            interval_ms,
        } => cmd_replay(file, &target, interval_ms).await,
        Commands::Stats { config, json } => cmd_stats(config, json).await,
    }
}

fn load(args: &ConfigArgs) -> Config {
    let mut config = config::load_config(&args.config).unwrap_or_else(|e| {
        error!(path = %args.config.display(), error = %e, "invalid configuration");
        std::process::exit(1);
    });
    if let Some(url) = &args.database_url {
        config.database.url = Some(url.clone());
    }
    config
}

async fn cmd_serve(args: ConfigArgs, port: Option<u16>) {
    let mut config = load(&args);
    if let Some(p) = port {
        config.server.port = p;
    }

    let store = match &config.database.url {
        Some(url) => connect_store(url).await,
        None => {
            warn!("no database.url configured, messages will only be logged");
            None
        }
    };

    info!(
        skip = ?config.message.skip_labels,
        once = ?config.message.once_labels,
        channels = config.channels.len(),
        "routing policy loaded"
    );
    let router = Router::new(config.label_policy(), config.channel_plan(), store);

    let server = Server::bind(&config.bind_addr(), config.server.max_packet_size)
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to open server socket");
            std::process::exit(1);
        });

    match server.run(&router, shutdown_signal()).await {
        Ok(stats) => info!(
            received = stats.received,
            decoded = stats.decoded,
            rejected = stats.rejected,
            "server stopped"
        ),
        Err(e) => {
            error!(error = %e, "ingestion loop terminated");
            std::process::exit(1);
        }
    }
}

/// Open the store and create its schema. Failure leaves the server running
/// without persistence.
async fn connect_store(url: &str) -> Option<Arc<dyn MessageStore>> {
    let store = match db::open_store(url).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to connect to database, messages will only be logged");
            return None;
        }
    };
    if let Err(e) = store.setup_schema().await {
        error!(error = %e, "failed to set up database schema, messages will only be logged");
        return None;
    }
    info!("database ready");
    Some(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

fn open_input(file: &PathBuf) -> Box<dyn BufRead> {
    if file.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = std::fs::File::open(file).unwrap_or_else(|e| {
            eprintln!("Error opening {}: {e}", file.display());
            std::process::exit(1);
        });
        Box::new(io::BufReader::new(f))
    }
}

fn cmd_decode(file: PathBuf, json: bool) {
    let reader = open_input(&file);

    let mut total = 0u64;
    let mut decoded = 0u64;

    for (i, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };
        if line.trim().is_empty() {
            continue;
        }
        total += 1;

        match decode(line.as_bytes()) {
            Ok(msg) => {
                decoded += 1;
                if json {
                    match serde_json::to_string(&msg) {
                        Ok(s) => println!("{s}"),
                        Err(e) => eprintln!("line {}: {e}", i + 1),
                    }
                } else {
                    println!("{msg}");
                }
            }
            Err(e) => eprintln!("line {}: {e}", i + 1),
        }
    }

    eprintln!();
    eprintln!("Records: {total} read, {decoded} decoded");
}

async fn cmd_replay(file: PathBuf, target: &str, interval_ms: u64) {
    let content = std::fs::read_to_string(&file).unwrap_or_else(|e| {
        eprintln!("Error opening {}: {e}", file.display());
        std::process::exit(1);
    });

    let socket = tokio::net::UdpSocket::bind("0.0.0.0:0")
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "failed to open UDP socket");
            std::process::exit(1);
        });

    let mut sent = 0u64;
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        if let Err(e) = socket.send_to(line.as_bytes(), target).await {
            error!(target, error = %e, "failed to send datagram");
            std::process::exit(1);
        }
        sent += 1;
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    info!(sent, target, "replay complete");
}

async fn cmd_stats(args: ConfigArgs, json: bool) {
    let config = load(&args);
    let Some(url) = config.database.url else {
        eprintln!("No database configured (set database.url or --database-url)");
        std::process::exit(1);
    };

    let stats = db::read_stats(&url).await.unwrap_or_else(|e| {
        eprintln!("Error reading database {url}: {e}");
        std::process::exit(1);
    });

    if json {
        match serde_json::to_string_pretty(&stats) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error encoding stats: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!("Database: {url}");
    println!("  Messages: {}", stats.messages);
    println!();

    if stats.by_label.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Label", "Messages"]);
    for (label, count) in &stats.by_label {
        table.add_row(vec![Cell::new(label), Cell::new(count)]);
    }
    println!("{table}");
}
