mod bootstrap;
mod cli_args;
mod output;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use funpay_parser::HtmlRecordParser;
use funpay_runner::{run_update_runner, AccountContext, UpdateRunner};
use funpay_session::FunPaySessionClient;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::info;

use crate::bootstrap::init_tracing;
use crate::cli_args::Cli;
use crate::output::EventWriter;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}

async fn run_cli(cli: Cli) -> Result<()> {
    let session = Arc::new(
        FunPaySessionClient::new(cli.session_config()).context("failed to build session client")?,
    );
    let parser = Arc::new(HtmlRecordParser::new().context("failed to build record parser")?);

    let home = session
        .fetch_home_page()
        .await
        .context("failed to load the marketplace landing page")?;
    let profile = parser
        .parse_account_profile(&home)
        .context("failed to read the account profile; check the golden key")?;
    session.apply_profile(&profile);
    info!(account_id = profile.id, username = %profile.username, "session ready");

    let mut runner = UpdateRunner::new(
        cli.runner_config(),
        session,
        parser,
        AccountContext::from(&profile),
    )
    .context("invalid runner configuration")?;
    let mut writer = EventWriter::new(std::io::stdout());

    if cli.poll_once {
        let outcome = runner.poll_once().await;
        for event in &outcome.events {
            writer.write_event(event)?;
        }
        eprintln!("{}", writer.summary());
        if let Some(failure) = outcome.report.failure {
            bail!("poll pass failed: {failure}");
        }
        return Ok(());
    }

    let (sink, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let task = tokio::spawn(run_update_runner(runner, sink, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c; stopping");
        }
    }));
    let mut events = ReceiverStream::new(receiver);
    while let Some(event) = events.next().await {
        writer.write_event(&event)?;
    }
    task.await.context("update runner task failed")?;
    eprintln!("{}", writer.summary());
    Ok(())
}
