//! Deploy scripts for the demo suite.

use alloy_primitives::{Address, U256};
use fhe_chain::abi::{Auction, Counter, ExampleToken, FHERC20, Voting, names};
use fhe_chain::{ConstructorArgs, DeployOptions, Deployer, Deployment, UintWidth, export_frontend};
use serde_json::json;

use super::CommandReport;
use crate::args::{DeployArgs, DeployTarget};
use crate::context::TaskContext;
use crate::error::TaskError;

const TOKEN_SUPPLY: u64 = 1000;
const TOKEN_INITIAL_BALANCE: u64 = 100;
const AUCTION_DURATION_SECS: u64 = 3600;
const VOTING_PERIOD_SECS: u64 = 30;

impl DeployTarget {
    fn scripts(self) -> &'static [DeployTarget] {
        match self {
            Self::All => &[Self::Fherc20, Self::Auction, Self::Voting, Self::Counter],
            Self::Fherc20 => &[Self::Fherc20],
            Self::Auction => &[Self::Auction],
            Self::Voting => &[Self::Voting],
            Self::Counter => &[Self::Counter],
        }
    }
}

/// Run the deploy script(s) for `args.target` from account 0.
pub async fn deploy(ctx: &TaskContext, args: &DeployArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("deploy");
    let from = ctx.signer(0).await?;
    let deployer = ctx.deployer();

    for script in args.target.scripts() {
        match script {
            DeployTarget::Fherc20 => deploy_example_token(ctx, &deployer, from, &mut report).await?,
            DeployTarget::Auction => deploy_auction(ctx, &deployer, from, &mut report).await?,
            DeployTarget::Voting => deploy_voting(ctx, &deployer, from, &mut report).await?,
            DeployTarget::Counter => deploy_counter(ctx, &deployer, from, &mut report).await?,
            DeployTarget::All => {}
        }
    }

    Ok(report)
}

async fn deploy_example_token(
    ctx: &TaskContext,
    deployer: &Deployer,
    from: Address,
    report: &mut CommandReport,
) -> Result<(), TaskError> {
    let balance = ctx
        .encryptor()
        .await?
        .encrypt(TOKEN_INITIAL_BALANCE, UintWidth::U32)?
        .into_euint32()?;
    let ctor = ExampleToken::constructorCall {
        name: "Test Token".into(),
        symbol: "FHE".into(),
        supply: U256::from(TOKEN_SUPPLY),
        balance,
    };
    let logged = vec![
        json!("Test Token"),
        json!("FHE"),
        json!(TOKEN_SUPPLY),
        json!(TOKEN_INITIAL_BALANCE),
    ];
    let deployment = deployer
        .deploy(
            from,
            names::EXAMPLE_TOKEN,
            ConstructorArgs::new(&ctor, logged),
            DeployOptions::skip_if_deployed(),
        )
        .await?;
    publish(ctx, deployer, &deployment, report)
}

async fn deploy_auction(
    ctx: &TaskContext,
    deployer: &Deployer,
    from: Address,
    report: &mut CommandReport,
) -> Result<(), TaskError> {
    let token_ctor = FHERC20::constructorCall {
        name: "token".into(),
        symbol: "FHE".into(),
    };
    let token = deployer
        .deploy(
            from,
            names::FHERC20,
            ConstructorArgs::new(&token_ctor, vec![json!("token"), json!("FHE")]),
            DeployOptions::skip_if_deployed(),
        )
        .await?;
    publish(ctx, deployer, &token, report)?;

    let auction_ctor = Auction::constructorCall {
        token: token.address(),
        duration: U256::from(AUCTION_DURATION_SECS),
    };
    let logged = vec![json!(token.address()), json!(AUCTION_DURATION_SECS)];
    let auction = deployer
        .deploy(
            from,
            names::AUCTION,
            ConstructorArgs::new(&auction_ctor, logged),
            DeployOptions::always(),
        )
        .await?;
    publish(ctx, deployer, &auction, report)
}

async fn deploy_voting(
    ctx: &TaskContext,
    deployer: &Deployer,
    from: Address,
    report: &mut CommandReport,
) -> Result<(), TaskError> {
    let options = vec!["yes".to_string(), "no".to_string()];
    let ctor = Voting::constructorCall {
        proposal: "question??".into(),
        options: options.clone(),
        period: U256::from(VOTING_PERIOD_SECS),
    };
    let logged = vec![json!("question??"), json!(options), json!(VOTING_PERIOD_SECS)];
    let voting = deployer
        .deploy(
            from,
            names::VOTING,
            ConstructorArgs::new(&ctor, logged),
            DeployOptions::always(),
        )
        .await?;
    publish(ctx, deployer, &voting, report)
}

async fn deploy_counter(
    ctx: &TaskContext,
    deployer: &Deployer,
    from: Address,
    report: &mut CommandReport,
) -> Result<(), TaskError> {
    let counter = deployer
        .deploy(
            from,
            names::COUNTER,
            ConstructorArgs::new(&Counter::constructorCall {}, Vec::new()),
            DeployOptions::skip_if_deployed(),
        )
        .await?;
    publish(ctx, deployer, &counter, report)
}

/// Report the address and, when configured, export frontend descriptors.
fn publish(
    ctx: &TaskContext,
    deployer: &Deployer,
    deployment: &Deployment,
    report: &mut CommandReport,
) -> Result<(), TaskError> {
    let name = &deployment.record.contract_name;
    report.line(format!("{name} contract: {}", deployment.address()));
    if !deployment.newly_deployed {
        report.line(format!("{name}: reusing existing deployment"));
    }
    if let Some(dir) = &ctx.frontend_dir {
        let artifact = deployer.artifacts().load(name)?;
        export_frontend(dir, &artifact, deployment.address())?;
    }
    Ok(())
}
