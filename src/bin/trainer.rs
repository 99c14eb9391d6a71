// steplog-trainer
// Drives a step logger through a mock training loop

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use steplog::{load_config, HaltPolicy, LogFields, LoggerConfig, Severity, StepLogger};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Run a mock training loop through the step logger", long_about = None)]
struct Args {
    /// Minimum severity written to the sinks; overrides the config
    #[clap(short, long)]
    mode: Option<Severity>,

    /// Every Nth step is promoted to INFO; overrides the config
    #[clap(short, long)]
    interval: Option<u64>,

    #[clap(long, default_value_t = 2)]
    epochs: u64,

    #[clap(long, default_value_t = 3)]
    steps: u64,

    /// Directory for durable transcripts
    #[clap(short, long)]
    dir: Option<PathBuf>,

    /// TOML config file, layered under STEPLOG_* environment variables
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Also write the JSON transcript
    #[clap(long)]
    json: bool,

    /// Print the effective configuration and exit
    #[clap(long)]
    print_config: bool,
}

fn mock_loss(epoch: u64, step: u64) -> f64 {
    let t = (epoch * 31 + step * 7) as f64;
    (1.0 / (1.0 + t * 0.1)) * (1.0 + 0.05 * t.sin())
}

fn build_config(args: &Args) -> Result<LoggerConfig> {
    let mut config = load_config(args.config.as_deref()).context("loading logger config")?;
    if let Some(interval) = args.interval {
        config.print_interval = interval;
    }
    if let Some(mode) = args.mode {
        config.log.level = mode;
    }
    if let Some(dir) = &args.dir {
        config.log.dir = dir.clone();
    }
    if args.json {
        config.log.save_as_json = true;
    }
    config.validate().context("validating logger config")?;
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut logger = StepLogger::new(config).context("starting step logger")?;
    tracing::info!("Logging to {:?}", logger.durable_paths());

    for epoch in 1..=args.epochs {
        for step in 1..=args.steps {
            let loss = mock_loss(epoch, step);
            if !loss.is_finite() {
                logger
                    .error(
                        LogFields::event_only("Loss diverged").epoch(epoch).step(step),
                        HaltPolicy::Halt,
                    )?
                    .exit_if_halted();
            }
            logger.add(
                "train",
                Some("train"),
                LogFields::event_only("Computed loss")
                    .epoch(epoch)
                    .step(step)
                    .metric("loss", loss),
            )?;
            logger.add(
                "train",
                Some("train"),
                LogFields::new().metric("auxloss", loss * 0.5),
            )?;
            logger.commit("train", LogFields::event_only("Step done").epoch(epoch).step(step))?;
        }
        logger.test(
            LogFields::event_only("Evaluated")
                .epoch(epoch)
                .metric("test/acc", 1.0 - mock_loss(epoch, args.steps)),
        )?;
    }

    logger.close()?;
    Ok(())
}
