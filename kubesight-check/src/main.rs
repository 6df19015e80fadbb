//! Cluster state metrics check.
//!
//! Loads cluster objects from a fixture, keeps per-kind metric stores in
//! sync through watches and publishes a snapshot every interval.

use anyhow::Result;
use clap::Parser;
use kubesight_common::init_tracing;

use kubesight_check::{CHECK_NAME, CheckArgs, CheckConfig, CheckError, CheckRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CheckArgs::parse();

    let config = CheckConfig::load(&args.config)?;

    let logging = config
        .logging
        .clone()
        .with_level_override(args.log_level.as_deref());
    init_tracing(&logging).map_err(CheckError::Logging)?;

    tracing::info!(
        check = CHECK_NAME,
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "Starting"
    );

    let runner = CheckRunner::new(config).await?;

    if args.once {
        let report = runner.run_once().await;
        runner.shutdown().await;
        if !report.committed {
            anyhow::bail!("samples were not committed");
        }
        return Ok(());
    }

    runner.run().await?;
    Ok(())
}
