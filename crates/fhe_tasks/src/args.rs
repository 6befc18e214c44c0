//! Validated arguments, one struct per command.
//!
//! Everything is parsed and range-checked here, before any network call or
//! encryption happens.

use alloy_primitives::{Address, U256};
use fhe_chain::UintWidth;
use fhe_chain::abi::names;
use fhe_chain::{EncryptedInput, Encryptor};

use crate::error::TaskError;

/// A plaintext integer checked against the width of the field it will be
/// encrypted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount {
    value: u64,
    width: UintWidth,
}

impl Amount {
    /// Parse a decimal integer and reject values that do not fit `width`.
    pub fn parse(text: &str, width: UintWidth) -> Result<Self, TaskError> {
        let trimmed = text.trim();
        let value: u64 = trimmed
            .parse()
            .map_err(|_| TaskError::invalid(format!("'{trimmed}' is not a non-negative integer")))?;
        Self::new(value, width)
    }

    pub fn new(value: u64, width: UintWidth) -> Result<Self, TaskError> {
        if !width.fits(value) {
            return Err(TaskError::invalid(format!(
                "{value} does not fit in {width} (max {})",
                width.max_value()
            )));
        }
        Ok(Self { value, width })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn width(&self) -> UintWidth {
        self.width
    }

    /// Fresh ciphertext for this amount.
    pub fn encrypt(&self, encryptor: &dyn Encryptor) -> Result<EncryptedInput, TaskError> {
        Ok(encryptor.encrypt(self.value, self.width)?)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(text: &str) -> Result<Address, TaskError> {
    text.trim()
        .parse()
        .map_err(|_| TaskError::invalid(format!("'{text}' is not an address")))
}

/// Parse an optional destination, treating an empty string as absent.
pub fn parse_optional_address(text: Option<&str>) -> Result<Option<Address>, TaskError> {
    match text.map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) => parse_address(t).map(Some),
    }
}

/// Parse an amount of native currency given in ether, e.g. `0.1`.
pub fn parse_ether(text: &str) -> Result<U256, TaskError> {
    let trimmed = text.trim();
    let invalid = || TaskError::invalid(format!("'{trimmed}' is not an ether amount"));
    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > 18 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole: U256 = if whole.is_empty() {
        U256::ZERO
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac_wei: U256 = if frac.is_empty() {
        U256::ZERO
    } else {
        format!("{frac:0<18}").parse().map_err(|_| invalid())?
    };
    whole
        .checked_mul(fhe_chain::ONE_ETHER)
        .and_then(|w| w.checked_add(frac_wei))
        .ok_or_else(invalid)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintArgs {
    pub amount: Amount,
    /// Defaults to the signer.
    pub to: Option<Address>,
    pub account: usize,
    /// Deployment to mint on.
    pub token: String,
}

impl MintArgs {
    pub fn new(amount: Amount, account: usize) -> Self {
        Self {
            amount,
            to: None,
            account,
            token: names::EXAMPLE_TOKEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferArgs {
    pub amount: Amount,
    /// Defaults to the signer.
    pub to: Option<Address>,
    pub account: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceArgs {
    pub account: usize,
    /// Deployment to read from.
    pub token: String,
}

impl Default for BalanceArgs {
    fn default() -> Self {
        Self {
            account: 0,
            token: names::FHERC20.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidArgs {
    pub amount: Amount,
    pub account: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndAuctionArgs {
    /// End immediately, ignoring the deadline.
    pub debug: bool,
    pub account: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WinnerArgs {
    pub account: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteArgs {
    pub option: Amount,
    pub account: usize,
}

impl VoteArgs {
    pub fn parse(option: &str, account: usize) -> Result<Self, TaskError> {
        Ok(Self {
            option: Amount::parse(option, UintWidth::U8)?,
            account,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteQueryArgs {
    pub account: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddCountArgs {
    pub amount: Amount,
    pub account: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountArgs {
    pub account: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundAccountsArgs {
    pub amount_wei: U256,
}

impl Default for FundAccountsArgs {
    fn default() -> Self {
        Self {
            amount_wei: fhe_chain::ONE_ETHER / U256::from(10u64),
        }
    }
}

/// Which deploy script to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployTarget {
    Fherc20,
    Auction,
    Voting,
    Counter,
    All,
}

impl DeployTarget {
    pub fn parse(text: &str) -> Result<Self, TaskError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "fherc20" | "token" => Ok(Self::Fherc20),
            "auction" => Ok(Self::Auction),
            "voting" => Ok(Self::Voting),
            "counter" => Ok(Self::Counter),
            "all" => Ok(Self::All),
            other => Err(TaskError::invalid(format!("unknown deploy target '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployArgs {
    pub target: DeployTarget,
}
