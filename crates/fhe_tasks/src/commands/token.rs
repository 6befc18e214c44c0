use fhe_chain::abi::{FHERC20, names};

use super::{CommandReport, timed};
use crate::args::{BalanceArgs, MintArgs, TransferArgs};
use crate::context::TaskContext;
use crate::error::TaskError;

/// Mint an encrypted amount on `args.token`, to the signer unless `to` is set.
pub async fn mint(ctx: &TaskContext, args: &MintArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("mint");
    let signer = ctx.signer(args.account).await?;
    let token = ctx.contract(&args.token)?;
    let to = args.to.unwrap_or(signer);

    report.line(format!(
        "Running mintEncrypted({}), targeting contract at: {}",
        args.amount,
        token.address()
    ));
    let amount = args.amount.encrypt(ctx.encryptor().await?.as_ref())?.into_euint32()?;
    let call = FHERC20::mintEncryptedCall { to, amount };
    timed(&mut report, "mintEncryptedDuration", token.send(signer, &call)).await?;

    report.line("Done mint");
    Ok(report)
}

pub async fn transfer(ctx: &TaskContext, args: &TransferArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("transfer");
    let signer = ctx.signer(args.account).await?;
    let token = ctx.contract(names::FHERC20)?;
    let to = args.to.unwrap_or(signer);

    report.line(format!(
        "Running transferEncrypted({}) to {to}, targeting contract at: {}",
        args.amount,
        token.address()
    ));
    let amount = args.amount.encrypt(ctx.encryptor().await?.as_ref())?.into_euint32()?;
    let call = FHERC20::transferEncryptedCall { to, amount };
    timed(&mut report, "transferEncryptedDuration", token.send(signer, &call)).await?;

    report.line("Done transfer");
    Ok(report)
}

/// Read and unseal the signer's encrypted balance.
pub async fn get_balance(ctx: &TaskContext, args: &BalanceArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("get-balance");
    let signer = ctx.signer(args.account).await?;
    let token = ctx.contract(&args.token)?;

    let permit = ctx
        .permits
        .lock()
        .await
        .get_or_create(ctx.client.as_ref(), token.address(), signer)
        .await?;
    let call = FHERC20::balanceOfEncryptedCall {
        account: signer,
        auth: permit.permission(),
    };
    let sealed = token.read(signer, &call).await?._0;
    let balance = ctx.permits.lock().await.unseal(token.address(), signer, &sealed)?;

    report.line(format!("got balance result: {balance}"));
    Ok(report)
}
