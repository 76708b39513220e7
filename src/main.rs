use anyhow::{Context, Result};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use clinic_reciprocity::{simulate_detailed, AppConfig, OutputFormat};

fn main() -> Result<()> {
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check the RECIPROCITY_* environment variables.");
        e
    })?;

    let log_level = config.logging.max_level();
    init_logging(&config, log_level.unwrap_or(Level::INFO))?;
    if log_level.is_none() {
        warn!(
            "Unknown log level '{}', falling back to info",
            config.logging.level
        );
    }

    let scenario = &config.simulation.scenario;
    info!(
        "Running reciprocity simulation: {} clinics, {} patients, {} rounds, seed {}",
        scenario.clinics, scenario.patients, scenario.rounds, scenario.seed
    );

    let trace = simulate_detailed(&config.simulation).context("Simulation aborted")?;

    match config.output.format {
        OutputFormat::Text => print!("{}", trace.result),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&trace).context("Failed to serialize trace")?;
            println!("{}", json);
        }
    }

    Ok(())
}

/// Install the stderr subscriber so stdout carries only the report
fn init_logging(config: &AppConfig, log_level: Level) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_span_events(if config.logging.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
