//! Named commands and the dispatcher that runs them.
//!
//! Each command resolves its deployment and signer, optionally encrypts its
//! payload, calls the contract and returns a [`CommandReport`]. [`run`]
//! catches every failure so one bad command never takes the caller down.

mod accounts;
mod auction;
mod counter;
mod deploy;
mod token;
mod voting;

use std::future::Future;
use std::time::{Duration, Instant};

use fhe_core::{Classify, ErrorClass};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::args::{
    AddCountArgs, BalanceArgs, BidArgs, CountArgs, DeployArgs, EndAuctionArgs, FundAccountsArgs,
    MintArgs, TransferArgs, VoteArgs, VoteQueryArgs, WinnerArgs,
};
use crate::context::TaskContext;
use crate::error::TaskError;

pub use accounts::fund_accounts;
pub use auction::{bid, end_auction, get_winner};
pub use counter::{add_count, get_count};
pub use deploy::deploy;
pub use token::{get_balance, mint, transfer};
pub use voting::{get_vote, vote};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mint(MintArgs),
    Transfer(TransferArgs),
    GetBalance(BalanceArgs),
    Bid(BidArgs),
    EndAuction(EndAuctionArgs),
    GetWinner(WinnerArgs),
    Vote(VoteArgs),
    GetVote(VoteQueryArgs),
    AddCount(AddCountArgs),
    GetCount(CountArgs),
    FundAccounts(FundAccountsArgs),
    Deploy(DeployArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mint(_) => "mint",
            Self::Transfer(_) => "transfer",
            Self::GetBalance(_) => "get-balance",
            Self::Bid(_) => "bid",
            Self::EndAuction(_) => "end-auction",
            Self::GetWinner(_) => "get-winner",
            Self::Vote(_) => "vote",
            Self::GetVote(_) => "get-vote",
            Self::AddCount(_) => "add-count",
            Self::GetCount(_) => "get-count",
            Self::FundAccounts(_) => "fund-accounts",
            Self::Deploy(_) => "deploy",
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Human-readable result of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub command: &'static str,
    pub lines: Vec<String>,
    /// Total time spent in on-chain calls.
    pub elapsed: Duration,
}

impl CommandReport {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    pub fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        debug!(command = self.command, "{text}");
        self.lines.push(text);
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Brackets a single on-chain call.
pub struct Stopwatch {
    label: &'static str,
    started: Instant,
}

impl Stopwatch {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    /// Record the elapsed time on `report` and return it.
    pub fn stop(self, report: &mut CommandReport) -> Duration {
        let elapsed = self.started.elapsed();
        info!(label = self.label, elapsed_ms = millis(elapsed), "timed call");
        report.elapsed += elapsed;
        report.line(format!("{}: {:.3}s", self.label, elapsed.as_secs_f64()));
        elapsed
    }
}

/// Await `call` under a [`Stopwatch`], recording the time whether it succeeds
/// or not.
pub(crate) async fn timed<T, E, F>(report: &mut CommandReport, label: &'static str, call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let watch = Stopwatch::start(label);
    let result = call.await;
    watch.stop(report);
    result
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// How a dispatched command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(CommandReport),
    /// The user declined a signing prompt. Not an error.
    Declined { command: &'static str },
    Failed {
        command: &'static str,
        class: ErrorClass,
        message: String,
    },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Business failures exit 0 unless `strict`.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && self.is_failure() { 1 } else { 0 }
    }

    pub fn report(&self) -> Option<&CommandReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

async fn execute(ctx: &TaskContext, command: &Command) -> Result<CommandReport, TaskError> {
    match command {
        Command::Mint(args) => mint(ctx, args).await,
        Command::Transfer(args) => transfer(ctx, args).await,
        Command::GetBalance(args) => get_balance(ctx, args).await,
        Command::Bid(args) => bid(ctx, args).await,
        Command::EndAuction(args) => end_auction(ctx, args).await,
        Command::GetWinner(args) => get_winner(ctx, args).await,
        Command::Vote(args) => vote(ctx, args).await,
        Command::GetVote(args) => get_vote(ctx, args).await,
        Command::AddCount(args) => add_count(ctx, args).await,
        Command::GetCount(args) => get_count(ctx, args).await,
        Command::FundAccounts(args) => fund_accounts(ctx, args).await,
        Command::Deploy(args) => deploy(ctx, args).await,
    }
}

/// Run one command, catching and classifying any failure.
pub async fn run(ctx: &TaskContext, command: &Command) -> Outcome {
    let name = command.name();
    info!(command = name, network = %ctx.network.name, "running command");

    match execute(ctx, command).await {
        Ok(report) => {
            info!(command = name, elapsed_ms = millis(report.elapsed), "command completed");
            Outcome::Completed(report)
        }
        Err(err) => {
            let class = err.class();
            if class.is_silent() {
                debug!(command = name, "user declined");
                return Outcome::Declined { command: name };
            }
            let message = err.user_message();
            if class.is_pending() {
                warn!(command = name, class = %class, "{message}");
            } else {
                error!(command = name, class = %class, error = %err, "{message}");
            }
            Outcome::Failed {
                command: name,
                class,
                message,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_is_zero_unless_strict() {
        let failed = Outcome::Failed {
            command: "bid",
            class: ErrorClass::CallFailed,
            message: "Auction ended".into(),
        };
        assert_eq!(failed.exit_code(false), 0);
        assert_eq!(failed.exit_code(true), 1);

        let declined = Outcome::Declined { command: "bid" };
        assert_eq!(declined.exit_code(true), 0);
    }

    #[test]
    fn stopwatch_accumulates() {
        let mut report = CommandReport::new("vote");
        Stopwatch::start("voteDuration").stop(&mut report);
        Stopwatch::start("voteDuration").stop(&mut report);
        assert_eq!(report.lines.len(), 2);
        assert!(report.contains("voteDuration: "));
    }

    #[tokio::test]
    async fn timed_records_failures_too() {
        let mut report = CommandReport::new("bid");
        let result: Result<(), &str> = timed(&mut report, "bidDuration", async { Err("boom") }).await;
        assert!(result.is_err());
        assert!(report.contains("bidDuration"));
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn command_names_are_kebab_case() {
        let cmd = Command::GetBalance(BalanceArgs::default());
        assert_eq!(cmd.name(), "get-balance");
    }
}
