use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fhe_chain::UintWidth;
use fhe_chain::abi::names;
use fhe_core::SuiteConfig;
use fhe_tasks::args::{
    AddCountArgs, BalanceArgs, BidArgs, CountArgs, DeployArgs, EndAuctionArgs, FundAccountsArgs,
    MintArgs, TransferArgs, VoteArgs, VoteQueryArgs, WinnerArgs, parse_ether,
    parse_optional_address,
};
use fhe_tasks::{Amount, Command, DeployTarget, TaskError};

#[derive(Debug, Parser)]
#[command(name = "fhe-suite", version, about = "Deploy and drive the FHE token, auction and voting contracts")]
pub struct Cli {
    /// Config file (defaults to ~/.fhe-suite/config.json)
    #[arg(long, env = "FHE_SUITE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Network name from the network table
    #[arg(long, global = true)]
    pub network: Option<String>,

    /// Override the RPC URL of the selected network
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Send encrypted inputs as plaintext (mock-FHE networks)
    #[arg(long, global = true)]
    pub mock_fhe: bool,

    /// Exit non-zero when a command fails
    #[arg(long, global = true)]
    pub strict: bool,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Subcmd,
}

#[derive(Debug, Subcommand)]
pub enum Subcmd {
    /// Mint encrypted tokens
    Mint {
        #[arg(long)]
        amount: String,
        /// Recipient, defaults to the signer
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value_t = 0)]
        account: usize,
        /// Deployment to mint on
        #[arg(long, default_value = names::EXAMPLE_TOKEN)]
        token: String,
    },

    /// Transfer encrypted tokens on the FHERC20 deployment
    Transfer {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Read and unseal the signer's balance
    GetBalance {
        #[arg(long, default_value_t = 0)]
        account: usize,
        #[arg(long, default_value = names::FHERC20)]
        token: String,
    },

    /// Approve, mint and bid on the auction
    Bid {
        #[arg(long)]
        amount: String,
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// End the auction
    EndAuction {
        /// Ignore the deadline
        #[arg(long)]
        debug: bool,
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Show the auction winner and winning bid
    GetWinner {
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Cast an encrypted vote
    Vote {
        #[arg(long)]
        option: String,
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Unseal the signer's vote
    GetVote {
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Add to the encrypted counter
    AddCount {
        #[arg(long)]
        amount: String,
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Unseal the counter
    GetCount {
        #[arg(long, default_value_t = 0)]
        account: usize,
    },

    /// Send native currency from account 0 to every other account
    FundAccounts {
        /// Amount per account, in ether
        #[arg(long, default_value = "0.1")]
        amount: String,
    },

    /// Run deploy scripts: fherc20, auction, voting, counter or all
    Deploy {
        #[arg(default_value = "all")]
        target: String,
    },

    /// Connect as a dapp session and print its view, optionally transferring
    Session {
        #[arg(long, default_value_t = 0)]
        account: usize,
        #[arg(long, requires = "amount")]
        transfer_to: Option<String>,
        #[arg(long)]
        amount: Option<u64>,
    },
}

impl Subcmd {
    /// Validate arguments into a dispatcher command. `None` for commands the
    /// dispatcher does not run.
    pub fn to_command(&self) -> Result<Option<Command>, TaskError> {
        let u32_amount = |text: &str| Amount::parse(text, UintWidth::U32);
        let command = match self {
            Self::Mint {
                amount,
                to,
                account,
                token,
            } => Command::Mint(MintArgs {
                amount: u32_amount(amount)?,
                to: parse_optional_address(to.as_deref())?,
                account: *account,
                token: token.clone(),
            }),
            Self::Transfer { amount, to, account } => Command::Transfer(TransferArgs {
                amount: u32_amount(amount)?,
                to: parse_optional_address(to.as_deref())?,
                account: *account,
            }),
            Self::GetBalance { account, token } => Command::GetBalance(BalanceArgs {
                account: *account,
                token: token.clone(),
            }),
            Self::Bid { amount, account } => Command::Bid(BidArgs {
                amount: u32_amount(amount)?,
                account: *account,
            }),
            Self::EndAuction { debug, account } => Command::EndAuction(EndAuctionArgs {
                debug: *debug,
                account: *account,
            }),
            Self::GetWinner { account } => Command::GetWinner(WinnerArgs { account: *account }),
            Self::Vote { option, account } => Command::Vote(VoteArgs::parse(option, *account)?),
            Self::GetVote { account } => Command::GetVote(VoteQueryArgs { account: *account }),
            Self::AddCount { amount, account } => Command::AddCount(AddCountArgs {
                amount: u32_amount(amount)?,
                account: *account,
            }),
            Self::GetCount { account } => Command::GetCount(CountArgs { account: *account }),
            Self::FundAccounts { amount } => Command::FundAccounts(FundAccountsArgs {
                amount_wei: parse_ether(amount)?,
            }),
            Self::Deploy { target } => Command::Deploy(DeployArgs {
                target: DeployTarget::parse(target)?,
            }),
            Self::Session { .. } => return Ok(None),
        };
        Ok(Some(command))
    }
}

impl Cli {
    /// Fold the global flags into the loaded config.
    pub fn apply_overrides(&self, config: &mut SuiteConfig) {
        if let Some(network) = &self.network {
            config.network = network.clone();
        }
        if let Some(url) = &self.rpc_url {
            config
                .custom_rpc_urls
                .insert(config.network.clone(), url.clone());
        }
        if self.mock_fhe {
            config.mock_fhe = true;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}
