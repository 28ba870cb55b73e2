use lfq_core::{BenchConfig, ReportFormat};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => BenchConfig::load(path)?,
        None => BenchConfig::default(),
    };
    tracing::debug!("Effective configuration: {:?}", config);

    for kind in &config.engines {
        let report = lfq_harness::run(*kind, &config)?;
        match config.report {
            ReportFormat::Text => println!("{}\n", report),
            ReportFormat::Json => println!("{}", serde_json::to_string(&report)?),
        }
    }

    Ok(())
}
