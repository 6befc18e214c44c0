use fhe_chain::TxRequest;
use fhe_chain::rpc::send_and_confirm;
use tracing::info;

use super::{CommandReport, timed};
use crate::args::FundAccountsArgs;
use crate::context::TaskContext;
use crate::error::TaskError;

/// Send `amount_wei` from account 0 to every other node account.
pub async fn fund_accounts(ctx: &TaskContext, args: &FundAccountsArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("fund-accounts");
    let accounts = ctx.client.accounts().await?;
    let Some((&funder, rest)) = accounts.split_first() else {
        return Err(TaskError::Chain(fhe_chain::ChainError::NoSuchAccount {
            index: 0,
            available: 0,
        }));
    };

    for &account in rest {
        let tx = TxRequest::transfer(funder, account, args.amount_wei);
        timed(&mut report, "fundDuration", send_and_confirm(ctx.client.as_ref(), &tx, ctx.wait)).await?;
        info!(from = %funder, to = %account, amount = %args.amount_wei, "funded account");
        report.line(format!("funded {account} with {} wei", args.amount_wei));
    }
    Ok(report)
}
