//! Binary entrypoint for the Economy Manager CLI.
//!
//! Commands:
//! - `start [--demo]` - run the console on the terminal (`--demo` uses built-in sample players)
//! - `init` - write a starter `config.toml`
//! - `status` - check configuration and database connectivity
//!
//! See the library crate docs for module-level details: `economy_manager::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::Path;

use economy_manager::config::{log_level_filter, Config};
use economy_manager::console::ConsoleServer;
use economy_manager::logutil::mask_secret;
use economy_manager::metrics;
use economy_manager::storage::mysql::MySqlPlayerStore;
use economy_manager::storage::PlayerStore;

#[derive(Parser)]
#[command(name = "economy-manager")]
#[command(about = "Administrative console for player gem and coin balances")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the console on this terminal
    Start {
        /// Use in-memory sample players instead of the database
        #[arg(long)]
        demo: bool,
    },
    /// Write a starter configuration file
    Init,
    /// Check configuration and database connectivity
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load_unchecked(Some(cli.config.as_str())).await.ok(),
    };
    if !matches!(cli.command, Commands::Init) {
        init_logging(pre_config.as_ref(), cli.verbose);
    }

    match cli.command {
        Commands::Start { demo } => {
            info!("Starting Economy Manager v{}", env!("CARGO_PKG_VERSION"));
            let server = if demo {
                let config = Config::load_unchecked(Some(cli.config.as_str())).await?;
                info!("Demo mode: using in-memory sample players");
                ConsoleServer::demo(config)
            } else {
                let config = match Config::load(Some(cli.config.as_str())).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!("Configuration error: {}", e);
                        eprintln!("Configuration error: {}", e);
                        std::process::exit(1);
                    }
                };
                ConsoleServer::connect(config).await?
            };
            server.run_stdio().await?;
        }
        Commands::Init => {
            if Path::new(&cli.config).exists() {
                println!("{} already exists; leaving it unchanged.", cli.config);
                return Ok(());
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote starter configuration to {}", cli.config);
            println!("Set DISCORD_TOKEN, DB_USER and DB_PASSWORD (or edit the file) before `start`.");
        }
        Commands::Status => {
            let config = match Config::load(Some(cli.config.as_str())).await {
                Ok(c) => c,
                Err(e) => {
                    println!("Configuration: INVALID ({})", e);
                    std::process::exit(1);
                }
            };
            println!("Configuration: OK");
            println!("  token:    {}", mask_secret(&config.discord.token));
            println!("  database: {}", config.database.describe());
            println!(
                "  audit:    {}",
                config
                    .discord
                    .log_channel_id
                    .map(|id| format!("channel {}", id))
                    .unwrap_or_else(|| "log only".to_string())
            );
            println!("  session timeout: {} min", config.console.session_timeout);
            match MySqlPlayerStore::connect(&config.database).await {
                Ok(store) => {
                    match store.list_players().await {
                        Ok(players) => println!("Database: OK ({} players)", players.len()),
                        Err(e) => println!("Database: reachable, query failed ({})", e),
                    }
                    store.close().await;
                }
                Err(e) => {
                    warn!("Status check could not reach the database: {}", e);
                    println!("Database: UNAVAILABLE ({})", e);
                }
            }
            println!("Counters: {}", metrics::snapshot());
        }
    }

    Ok(())
}

/// Log to stderr (stdout belongs to the console) and, when configured, a file.
/// Records on the `security` target are also copied to the security log.
fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let configured = config
        .and_then(|c| log_level_filter(&c.logging.level))
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // sqlx logs every statement at info
    builder.filter_module("sqlx", log::LevelFilter::Warn);

    let file = config.and_then(|c| c.logging.file.clone()).and_then(|path| {
        if let Some(dir) = Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()
    });
    let security_path = config.and_then(|c| c.logging.security_file.clone());
    let file = file.map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)));
    let is_tty = atty::is(atty::Stream::Stderr);

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if let Some(ref f) = file {
            if let Ok(mut guard) = f.lock() {
                let _ = writeln!(guard, "{}", line);
            }
        }
        if record.target() == "security" {
            if let Some(ref sec_path) = security_path {
                if let Ok(mut sf) = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(sec_path)
                {
                    let _ = writeln!(sf, "{}", line);
                }
            }
        }
        // With a log file and no terminal attached, skip the duplicate.
        if file.is_none() || is_tty {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    builder.init();
}
