use anyhow::Context;
use clap::Parser;
use rancher_pipeline_deploy::{
    config::{Args, Config},
    runner::{Deployer, RunSummary},
    DeployError,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = tokio::select! {
        result = run(&args) => result,
        Ok(()) = tokio::signal::ctrl_c() => Err(DeployError::Interrupted.into()),
    };

    match result {
        Ok(summary) => {
            tracing::info!(
                projects = summary.projects,
                apps = summary.apps,
                eligible = summary.eligible(),
                upgraded = summary.upgraded,
                dry_run = summary.dry_run_skipped,
                failed = summary.failed,
                "Done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<RunSummary> {
    let config = Config::from_args(args).context("invalid configuration")?;
    tracing::debug!(?config, "Resolved configuration");

    let deployer = Deployer::new(config).context("failed to set up Rancher client")?;
    let summary = deployer.run().await?;
    Ok(summary)
}
