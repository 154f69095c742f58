use clap::Parser;
use intrasim::application::system::TradingSystem;
use intrasim::config::Config;
use intrasim::domain::errors::{ConfigError, DataError};
use intrasim::domain::ports::{Broker, DataAdapter, DataManager};
use intrasim::infrastructure::broker::SimulatedBroker;
use intrasim::infrastructure::data::CsvDataAdapter;
use intrasim::infrastructure::observability::TracingDataManager;
use intrasim::infrastructure::simulation::UniformSlippage;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_DATA_ERROR: u8 = 3;

/// Intraday multi-strategy trading simulator.
#[derive(Debug, Parser)]
#[command(name = "intrasim", version, about)]
struct Cli {
    /// Trading day to replay (overrides the config file).
    #[arg(long)]
    date: Option<chrono::NaiveDate>,

    /// Playback speed multiplier, 0 for unthrottled (overrides config).
    #[arg(long)]
    speed: Option<u32>,

    /// Log filter, e.g. "info" or "intrasim=debug".
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Path to the TOML configuration.
    #[arg(long, default_value = "intrasim.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to build runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG_ERROR)
            } else if e.downcast_ref::<DataError>().is_some() {
                ExitCode::from(EXIT_DATA_ERROR)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(&cli.config)?;
    if let Some(date) = cli.date {
        config.simulation.date = date;
    }
    if let Some(speed) = cli.speed {
        config.simulation.speed = speed;
    }
    config.validate()?;

    info!(
        "intrasim: {} on {:?} (seed {}, speed {})",
        config.simulation.date,
        config.simulation.symbols,
        config.simulation.seed,
        config.simulation.speed
    );

    let adapter: Arc<dyn DataAdapter> = Arc::new(CsvDataAdapter::new(&config.simulation.data_dir));
    let broker: Arc<dyn Broker> = Arc::new(SimulatedBroker::new(
        config.risk.initial_capital,
        Box::new(UniformSlippage::new(
            config.simulation.slippage_min,
            config.simulation.slippage_max,
            config.simulation.seed,
        )),
    ));
    let data_manager: Arc<dyn DataManager> = Arc::new(TracingDataManager);

    let mut system = TradingSystem::new(config, adapter, broker, data_manager)?;
    let summary = system.run().await?;
    println!("{summary}");
    Ok(())
}
