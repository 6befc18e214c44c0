use fhe_chain::abi::{Voting, names};

use super::{CommandReport, timed};
use crate::args::{VoteArgs, VoteQueryArgs};
use crate::context::TaskContext;
use crate::error::TaskError;

pub async fn vote(ctx: &TaskContext, args: &VoteArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("vote");
    let signer = ctx.signer(args.account).await?;
    let voting = ctx.contract(names::VOTING)?;

    ctx.ensure_funds(signer).await?;

    let option = args.option.encrypt(ctx.encryptor().await?.as_ref())?.into_euint8()?;
    timed(&mut report, "voteDuration", voting.send(signer, &Voting::voteCall { option })).await?;

    report.line(format!("Voted for option {}!", args.option));
    Ok(report)
}

/// Unseal the signer's own vote.
pub async fn get_vote(ctx: &TaskContext, args: &VoteQueryArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("get-vote");
    let signer = ctx.signer(args.account).await?;
    let voting = ctx.contract(names::VOTING)?;

    let permit = ctx
        .permits
        .lock()
        .await
        .get_or_create(ctx.client.as_ref(), voting.address(), signer)
        .await?;
    let call = Voting::getUserVoteCall {
        auth: permit.permission(),
    };
    let sealed = voting.read(signer, &call).await?._0;
    let option = ctx.permits.lock().await.unseal(voting.address(), signer, &sealed)?;

    report.line(format!("Account voted: {option}"));
    Ok(report)
}
