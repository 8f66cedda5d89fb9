// Market Replay CLI
// Loads historical data, replays it through the grid strategy and writes run outputs

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};

use market_replay::progress::{LoadProgress, ReplayProgress};
use market_replay::{
    Config, ConfigError, EventSequencer, Executor, GridStrategy, JsonlLoader, MarketDataLoader,
    Strategy,
};

#[derive(Parser)]
#[command(name = "replay")]
#[command(version)]
#[command(about = "Deterministic market data replay backtester", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "replay.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Replay the configured data through the grid strategy
    Run {
        /// Override the output directory
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Validate the configuration and data coverage without replaying
    Check,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            init_logging(if cli.verbose { Level::DEBUG } else { Level::INFO });
            init_config(&cli.config, force)?;
        }

        Commands::Run { output } => {
            let config = load_config_or_exit(&cli.config);
            init_logging(log_level(&config, cli.verbose));
            run_replay(&config, output.as_deref())?;
        }

        Commands::Check => {
            let config = load_config_or_exit(&cli.config);
            init_logging(log_level(&config, cli.verbose));
            check_coverage(&config)?;
        }
    }

    Ok(())
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn log_level(config: &Config, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config.logging.level.parse().unwrap_or(Level::INFO)
}

/// Load config or exit with helpful error message
fn load_config_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration Error");
            eprintln!("{}", e);

            if matches!(e, ConfigError::FileRead(_)) {
                eprintln!();
                eprintln!("💡 Quick fix:");
                eprintln!("   1. Run: replay init --config {}", path);
                eprintln!("   2. Edit the [replay] section to point at your data");
                eprintln!("   3. Try again");
            }

            std::process::exit(1);
        }
    }
}

fn init_config(path: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if Path::new(path).exists() && !force {
        warn!("⚠️  {} already exists, skipping (use --force to overwrite)", path);
        return Ok(());
    }

    Config::default().to_file(path)?;
    info!("📝 Created {}", path);
    info!("💡 Next steps:");
    info!("   1. Edit {} with your instruments and data directory", path);
    info!("   2. Run: replay check");
    info!("   3. Run: replay run");
    Ok(())
}

fn check_coverage(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let loader = JsonlLoader::new(&config.replay.data_dir);
    let request = config.load_request();

    for kind in request.data_kinds() {
        for inst_id in &request.inst_ids {
            match loader.time_range(&request.exchange, inst_id, kind)? {
                Some(range) if range.contains(&request.range) => {
                    info!("✅ {} {}: {}", inst_id, kind, range);
                }
                Some(range) => {
                    warn!("⚠️  {} {}: only {} available", inst_id, kind, range);
                }
                None => {
                    warn!("⚠️  {} {}: no data", inst_id, kind);
                }
            }
        }
    }

    Ok(())
}

fn run_replay(config: &Config, output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    info!("🚀 Market Replay v{}", env!("CARGO_PKG_VERSION"));

    let loader = JsonlLoader::new(&config.replay.data_dir);
    let request = config.load_request();

    let load_bar = LoadProgress::new();
    let stream = match EventSequencer::new(&loader)
        .build_with_progress(&request, &mut |done, total| load_bar.update(done, total))
    {
        Ok(stream) => {
            load_bar.finish(stream.len());
            stream
        }
        Err(e) => {
            load_bar.finish_with_error(&e.to_string());
            error!(category = e.category(), "❌ {}", e);
            return Err(e.into());
        }
    };

    let mut executor = Executor::new(stream, config.executor.clone());
    for (ccy, amount) in &config.balances {
        executor.set_balance(ccy, *amount);
    }
    if let Some(ccy) = &config.replay.baseline_ccy {
        executor.set_baseline_currency(ccy);
    }

    let mut strategy = GridStrategy::new(config.grid.clone())?;
    let replay_bar = ReplayProgress::new(executor.stream().len());
    let report = executor.run_with_progress(&mut strategy, &mut |i, n| replay_bar.update(i, n))?;
    replay_bar.finish(report.deals, &format!("{:.4}", report.final_nav));

    let out_dir = PathBuf::from(output.unwrap_or(&config.output.dir))
        .join(strategy.class())
        .join(Utc::now().format("%Y-%m-%d.%H-%M-%S").to_string());
    fs::create_dir_all(&out_dir)?;
    fs::write(out_dir.join("report.json"), serde_json::to_string_pretty(&report)?)?;
    fs::write(out_dir.join("chart.json"), serde_json::to_string_pretty(executor.chart())?)?;

    info!("📊 Final NAV: {:.4}", report.final_nav);
    for position in &report.positions {
        info!(
            "   {} {:?}: realized {} | unrealized {} | fees {} | closes {}",
            position.inst_id,
            position.direction,
            position.realized_profit,
            position.unrealized_profit,
            position.total_fee,
            position.clear_count
        );
    }
    info!("📁 Outputs written to {}", out_dir.display());

    Ok(())
}
