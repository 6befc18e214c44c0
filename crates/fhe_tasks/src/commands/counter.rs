use fhe_chain::abi::{Counter, names};

use super::{CommandReport, timed};
use crate::args::{AddCountArgs, CountArgs};
use crate::context::TaskContext;
use crate::error::TaskError;

pub async fn add_count(ctx: &TaskContext, args: &AddCountArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("add-count");
    let signer = ctx.signer(args.account).await?;
    let counter = ctx.contract(names::COUNTER)?;

    let amount = args.amount.encrypt(ctx.encryptor().await?.as_ref())?.into_euint32()?;
    timed(&mut report, "addDuration", counter.send(signer, &Counter::addCall { amount })).await?;

    report.line(format!("Added {} to counter!", args.amount));
    Ok(report)
}

pub async fn get_count(ctx: &TaskContext, args: &CountArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("get-count");
    let signer = ctx.signer(args.account).await?;
    let counter = ctx.contract(names::COUNTER)?;

    report.line(format!("contract at: {}, for signer: {signer}", counter.address()));
    let permit = ctx
        .permits
        .lock()
        .await
        .get_or_create(ctx.client.as_ref(), counter.address(), signer)
        .await?;
    let call = Counter::getCounterCall {
        publicKey: permit.public_key,
    };
    let sealed = counter.read(signer, &call).await?._0;
    let value = ctx.permits.lock().await.unseal(counter.address(), signer, &sealed)?;

    report.line(format!("Current counter: {value}"));
    Ok(report)
}
