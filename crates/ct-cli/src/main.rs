use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use ct_core::IntervalTracker;
use ct_db::Database;
use tracing_subscriber::EnvFilter;

use ct_cli::commands::{history, migrate, reset, seed, status, toggle, util};
use ct_cli::{Cli, Commands, Config};

/// Open the tracker over the configured database.
///
/// The database directory is created by [`util::lock_database`], which runs first.
async fn open_tracker(config: &Config) -> Result<IntervalTracker<Database>> {
    let db = Database::open(&config.database_path).context("failed to open database")?;
    IntervalTracker::open(db, config.break_policy)
        .await
        .context("failed to initialize tracker")
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = load_config(cli.config.as_deref())?;
    let now = Utc::now();
    let mut stdout = io::stdout().lock();

    // Held until the command finishes so concurrent `ct` runs queue up.
    let _lock = util::lock_database(&config.database_path)?;
    let tracker = open_tracker(&config).await?;

    match command {
        Commands::Toggle { at } => {
            let at = at
                .as_deref()
                .map(|s| util::parse_datetime(s, now))
                .transpose()?
                .unwrap_or(now);
            toggle::run(&mut stdout, &tracker, at, &config.alert).await?;
        }
        Commands::Status { json } => {
            status::run(&mut stdout, &tracker, now, &config.alert, *json).await?;
        }
        Commands::History { json } => {
            history::run(&mut stdout, &tracker, *json).await?;
        }
        Commands::Reset { yes } => {
            reset::run(&mut stdout, &tracker, *yes).await?;
        }
        Commands::Migrate => {
            migrate::run(&mut stdout, &tracker).await?;
        }
        Commands::Seed => {
            seed::run(&mut stdout, &tracker, now).await?;
        }
    }

    Ok(())
}
