use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    datapulse::logging::init().context("init logging")?;

    let cli = datapulse::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        datapulse::cli::Command::Run(args) => {
            let summary = datapulse::pipeline::run(args).await.context("run")?;
            for stage in &summary.stages {
                println!(
                    "{}\t{}\textracted={}\tcleaned={}\tloaded={}",
                    summary.run_id,
                    stage.stage.name(),
                    stage.extracted,
                    stage.cleaned,
                    stage.loaded
                );
            }
        }
        datapulse::cli::Command::Migrate(args) => {
            datapulse::gold::migrate(args).await.context("migrate")?;
        }
    }

    Ok(())
}
