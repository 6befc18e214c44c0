use fhe_chain::abi::{Auction, FHERC20, names};
use tracing::info;

use super::{CommandReport, timed};
use crate::args::{BidArgs, EndAuctionArgs, WinnerArgs};
use crate::context::TaskContext;
use crate::error::TaskError;

/// Approve the auction, mint the bid amount to the signer, then bid.
///
/// The three transactions run strictly in order and the first failure stops
/// the rest. Each step gets its own ciphertext.
pub async fn bid(ctx: &TaskContext, args: &BidArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("bid");
    let signer = ctx.signer(args.account).await?;
    let token = ctx.contract(names::FHERC20)?;
    let auction = ctx.contract(names::AUCTION)?;
    let encryptor = ctx.encryptor().await?;
    let encryptor = encryptor.as_ref();

    report.line("setting allowance on token contract...");
    let approve = FHERC20::approveEncryptedCall {
        spender: auction.address(),
        amount: args.amount.encrypt(encryptor)?.into_euint32()?,
    };
    timed(&mut report, "allowanceDuration", token.send(signer, &approve)).await?;

    report.line(format!("minting {}", args.amount));
    let mint = FHERC20::mintEncryptedCall {
        to: signer,
        amount: args.amount.encrypt(encryptor)?.into_euint32()?,
    };
    timed(&mut report, "mintDuration", token.send(signer, &mint)).await?;

    report.line(format!(
        "bidding @ auction contract at: {}, amount: {}",
        auction.address(),
        args.amount
    ));
    let bid = Auction::bidCall {
        amount: args.amount.encrypt(encryptor)?.into_euint32()?,
    };
    timed(&mut report, "bidDuration", auction.send(signer, &bid)).await?;

    info!(bidder = %signer, auction = %auction.address(), "bid placed");
    Ok(report)
}

pub async fn end_auction(ctx: &TaskContext, args: &EndAuctionArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("end-auction");
    let signer = ctx.signer(args.account).await?;
    let auction = ctx.contract(names::AUCTION)?;

    report.line(format!("ending auction at: {}", auction.address()));
    if args.debug {
        report.line("debug mode: ignoring the deadline");
        timed(&mut report, "endAuction", auction.send(signer, &Auction::debugEndAuctionCall {})).await?;
    } else {
        timed(&mut report, "endAuction", auction.send(signer, &Auction::endAuctionCall {})).await?;
    }

    report.line("Auction ended");
    Ok(report)
}

pub async fn get_winner(ctx: &TaskContext, args: &WinnerArgs) -> Result<CommandReport, TaskError> {
    let mut report = CommandReport::new("get-winner");
    let signer = ctx.signer(args.account).await?;
    let auction = ctx.contract(names::AUCTION)?;

    let winner = auction.read(signer, &Auction::getWinnerCall {}).await?._0;
    report.line(format!("winner: {winner}"));
    let winning_bid = auction.read(signer, &Auction::getWinningBidCall {}).await?._0;
    report.line(format!("winning bid: {winning_bid}"));
    Ok(report)
}
