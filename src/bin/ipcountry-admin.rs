use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ipcountry::config::Config;
use ipcountry::models::ClientIp;
use ipcountry::storage;

#[derive(Parser)]
#[command(name = "ipcountry-admin")]
#[command(about = "ipcountry cache management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cache table and its unique index
    Init,
    /// Show the cached country for an IP address
    Get {
        /// IPv4 or IPv6 address
        ip: String,
    },
    /// Store a country for an IP address, replacing any cached value
    Put {
        /// IPv4 or IPv6 address
        ip: String,
        /// Country name
        country: String,
    },
}

fn parse_ip(candidate: &str) -> Result<ClientIp> {
    match ClientIp::parse(candidate) {
        Some(ip) => Ok(ip),
        None => bail!("'{}' is not a valid IP address", candidate),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = storage::connect(&config.database).await?;

    // Ensure database is initialized
    store.init().await?;

    match cli.command {
        Commands::Init => {
            println!(
                "✓ Cache table '{}' is ready",
                config.database.table_name
            );
        }
        Commands::Get { ip } => {
            let ip = parse_ip(&ip)?;
            match store.lookup(ip.as_str()).await? {
                Some(record) => println!("{:<40} {}", record.ip, record.country),
                None => println!("{} is not cached", ip),
            }
        }
        Commands::Put { ip, country } => {
            let ip = parse_ip(&ip)?;
            if country.trim().is_empty() {
                bail!("country must not be empty");
            }
            store.insert(ip.as_str(), &country).await?;
            println!("✓ Cached {} -> {}", ip, country);
        }
    }

    Ok(())
}
