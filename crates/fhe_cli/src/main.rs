mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{Context as _, Result};
use clap::Parser;
use fhe_core::SuiteConfig;
use fhe_core::logging;
use fhe_dapp::{DappConfig, DappSession, NodeWallet};
use fhe_tasks::args::parse_address;
use fhe_tasks::{Outcome, TaskContext};
use tracing::{error, info};

use crate::cli::{Cli, Subcmd};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init_logging(&config.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    info!("Starting fhe-suite v{VERSION}");

    match dispatch(&cli, &config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<SuiteConfig> {
    SuiteConfig::ensure_dirs().context("failed to create config directories")?;
    let mut config = match &cli.config {
        Some(path) => SuiteConfig::load_from_path(path)?,
        None => SuiteConfig::load()?,
    };
    cli.apply_overrides(&mut config);
    Ok(config)
}

async fn dispatch(cli: &Cli, config: &SuiteConfig) -> Result<ExitCode> {
    // Argument errors are reported before touching the network.
    let command = cli.command.to_command()?;

    let Some(command) = command else {
        // The session runs its own chain check through the wallet.
        let ctx = TaskContext::open(config)?;
        return run_session(cli, config, ctx).await;
    };
    let ctx = TaskContext::from_config(config).await?;

    let outcome = fhe_tasks::run(&ctx, &command).await;
    match &outcome {
        Outcome::Completed(report) => {
            for line in &report.lines {
                println!("{line}");
            }
        }
        Outcome::Declined { command } => println!("{command}: declined"),
        Outcome::Failed { message, .. } => println!("{message}"),
    }
    let code = u8::try_from(outcome.exit_code(cli.strict)).unwrap_or(1);
    Ok(ExitCode::from(code))
}

/// Drive a headless dapp session against the node's accounts and print what
/// the page would show.
async fn run_session(cli: &Cli, config: &SuiteConfig, ctx: TaskContext) -> Result<ExitCode> {
    let Subcmd::Session {
        account,
        transfer_to,
        amount,
    } = &cli.command
    else {
        anyhow::bail!("not a session command");
    };
    let to: Option<Address> = transfer_to.as_deref().map(parse_address).transpose()?;

    let mut dapp_config = DappConfig::from_frontend_dir(&config.frontend_dir)
        .context("no exported FHERC20 deployment; run `fhe-suite deploy fherc20` first")?;
    dapp_config.expected_chain_id = ctx.network.chain_id;
    dapp_config.wait = ctx.wait;

    let wallet = Arc::new(NodeWallet::new(ctx.client.clone(), *account));
    let mut session = DappSession::new(dapp_config, wallet);
    if to.is_some() {
        session = session.with_encryptor(ctx.encryptor().await?);
    }
    let mut session = session.with_permits(ctx.permits.into_inner());

    session.connect().await?;
    if let (Some(to), Some(amount)) = (to, amount) {
        session.transfer(to, *amount).await;
    }

    println!("{}", serde_json::to_string_pretty(&session.view())?);
    let failed = session.tx().error().is_some() || session.network_error().is_some();
    Ok(if cli.strict && failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
