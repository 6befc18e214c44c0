//! In-process development chain.
//!
//! [`DevChain`] implements [`ChainClient`] and [`Faucet`] over an in-memory
//! state machine that models the contract suite with mock FHE: encrypted
//! inputs are [`PlaintextEncryptor`] payloads, sealed outputs are real
//! x25519 envelopes opened by the caller's permit. Deploying requires the
//! artifacts from [`DevChain::artifacts`], whose bytecode names the contract
//! being created.

use std::collections::HashMap;

use alloy_primitives::{Address, B256, Bytes, U64, U256, keccak256};
use alloy_sol_types::{SolCall, SolInterface, SolType, sol_data};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::abi::{Auction, Counter, FHERC20, InEuint32, Permission, Voting, names};
use crate::artifacts::{ArtifactStore, ContractArtifact};
use crate::deployer::Faucet;
use crate::error::ChainError;
use crate::fhe::{PlaintextEncryptor, UintWidth};
use crate::network::LOCALFHENIX_CHAIN_ID;
use crate::permit::{PERMIT_DOMAIN_NAME, seal};
use crate::rpc::{ChainClient, ONE_ETHER, TxReceipt, TxRequest};
use fhe_core::USER_REJECTED_CODE;

const DEVNET_CODE_PREFIX: &[u8] = b"\xfedevnet:";
const ACCOUNT_COUNT: usize = 10;
const TX_FEE: U256 = U256::from_limbs([21_000_000_000_000, 0, 0, 0]);
const FAUCET_AMOUNT_ETHER: u64 = 10;
const GENESIS_TIME: u64 = 1_700_000_000;

/// Contracts the devnet knows how to run.
const KNOWN_CONTRACTS: [&str; 5] = [
    names::FHERC20,
    names::EXAMPLE_TOKEN,
    names::AUCTION,
    names::VOTING,
    names::COUNTER,
];

// ---------------------------------------------------------------------------
// Contract models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Revert(String);

fn revert<T>(reason: impl Into<String>) -> Result<T, Revert> {
    Err(Revert(reason.into()))
}

#[derive(Debug, Clone, Default)]
struct TokenState {
    name: String,
    symbol: String,
    balances: HashMap<Address, u64>,
    allowances: HashMap<(Address, Address), u64>,
}

impl TokenState {
    fn balance(&self, account: Address) -> u64 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// Encrypted-token semantics: an unaffordable transfer moves zero
    /// instead of reverting.
    fn transfer(&mut self, from: Address, to: Address, amount: u64) -> u64 {
        let moved = if self.balance(from) >= amount { amount } else { 0 };
        *self.balances.entry(from).or_default() -= moved;
        let dest = self.balances.entry(to).or_default();
        *dest = dest.saturating_add(moved).min(u64::from(u32::MAX));
        moved
    }

    fn transfer_from(&mut self, owner: Address, spender: Address, to: Address, amount: u64) -> u64 {
        let allowed = self.allowances.get(&(owner, spender)).copied().unwrap_or(0);
        let amount = if allowed >= amount { amount } else { 0 };
        let moved = self.transfer(owner, to, amount);
        self.allowances.insert((owner, spender), allowed - moved);
        moved
    }
}

#[derive(Debug, Clone)]
struct AuctionState {
    token: Address,
    end_time: u64,
    ended: bool,
    bids: HashMap<Address, u64>,
    highest_bid: u64,
    winner: Address,
}

#[derive(Debug, Clone)]
struct VotingState {
    options: Vec<String>,
    end_time: u64,
    votes: HashMap<Address, u8>,
}

#[derive(Debug, Clone, Default)]
struct CounterState {
    value: u64,
}

#[derive(Debug, Clone)]
enum Model {
    Token(TokenState),
    Auction(AuctionState),
    Voting(VotingState),
    Counter(CounterState),
}

#[derive(Debug, Clone)]
struct DevContract {
    code: Bytes,
    model: Model,
}

/// Who signed which sealing key for which contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PermitGrant {
    signer: Address,
    contract: Address,
    public_key: B256,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DevState {
    accounts: Vec<Address>,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, DevContract>,
    receipts: HashMap<B256, TxReceipt>,
    grants: HashMap<Bytes, PermitGrant>,
    block: u64,
    now: u64,
    pending_rejections: u32,
    fail_next_receipt: bool,
    faucet_requests: Vec<Address>,
}

struct Call<'a> {
    from: Address,
    to: Address,
    data: &'a [u8],
}

impl DevState {
    fn new(accounts: Vec<Address>) -> Self {
        let mut balances = HashMap::new();
        if let Some(first) = accounts.first() {
            balances.insert(*first, ONE_ETHER * U256::from(1_000u64));
        }
        Self {
            accounts,
            balances,
            nonces: HashMap::new(),
            contracts: HashMap::new(),
            receipts: HashMap::new(),
            grants: HashMap::new(),
            block: 0,
            now: GENESIS_TIME,
            pending_rejections: 0,
            fail_next_receipt: false,
            faucet_requests: Vec::new(),
        }
    }

    fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or(U256::ZERO)
    }

    fn take_rejection(&mut self) -> Result<(), ChainError> {
        if self.pending_rejections > 0 {
            self.pending_rejections -= 1;
            return Err(ChainError::Rpc {
                code: USER_REJECTED_CODE,
                message: "User rejected the request.".into(),
                data: None,
            });
        }
        Ok(())
    }

    fn require_account(&self, address: Address) -> Result<(), ChainError> {
        if !self.accounts.contains(&address) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: format!("unknown account {address}"),
                data: None,
            });
        }
        Ok(())
    }

    fn execute(&mut self, tx: &TxRequest) -> Result<Option<Address>, Revert> {
        match tx.to {
            None => self.create(tx.from, &tx.data).map(Some),
            Some(to) => {
                if !tx.value.is_zero() {
                    *self.balances.entry(tx.from).or_default() -= tx.value;
                    *self.balances.entry(to).or_default() += tx.value;
                }
                if self.contracts.contains_key(&to) {
                    self.dispatch(Call {
                        from: tx.from,
                        to,
                        data: &tx.data,
                    })?;
                }
                Ok(None)
            }
        }
    }

    fn create(&mut self, from: Address, init_code: &[u8]) -> Result<Address, Revert> {
        let Some(rest) = init_code.strip_prefix(DEVNET_CODE_PREFIX) else {
            return revert("devnet only runs devnet artifacts");
        };
        let Some(split) = rest.iter().position(|b| *b == 0) else {
            return revert("malformed devnet bytecode");
        };
        let name = String::from_utf8_lossy(&rest[..split]).to_string();
        let args = &rest[split + 1..];
        let code_len = DEVNET_CODE_PREFIX.len() + split + 1;

        let model = self.construct(from, &name, args)?;
        let nonce = self.nonces.get(&from).copied().unwrap_or(0);
        let address = from.create(nonce);
        self.contracts.insert(
            address,
            DevContract {
                code: Bytes::copy_from_slice(&init_code[..code_len]),
                model,
            },
        );
        debug!(name = %name, %address, "devnet contract created");
        Ok(address)
    }

    fn construct(&self, deployer: Address, name: &str, args: &[u8]) -> Result<Model, Revert> {
        let bad_args = |e: alloy_sol_types::Error| Revert(format!("{name} constructor: {e}"));
        match name {
            names::FHERC20 => {
                let (name, symbol) =
                    <(sol_data::String, sol_data::String)>::abi_decode_params(args, true).map_err(bad_args)?;
                Ok(Model::Token(TokenState {
                    name,
                    symbol,
                    ..TokenState::default()
                }))
            }
            names::EXAMPLE_TOKEN => {
                let (name, symbol, _supply, initial) = <(
                    sol_data::String,
                    sol_data::String,
                    sol_data::Uint<256>,
                    InEuint32,
                )>::abi_decode_params(args, true)
                .map_err(bad_args)?;
                let mut token = TokenState {
                    name,
                    symbol,
                    ..TokenState::default()
                };
                token
                    .balances
                    .insert(deployer, decode_input(&initial.data, UintWidth::U32)?);
                Ok(Model::Token(token))
            }
            names::AUCTION => {
                let (token, duration) =
                    <(sol_data::Address, sol_data::Uint<256>)>::abi_decode_params(args, true).map_err(bad_args)?;
                if !matches!(
                    self.contracts.get(&token).map(|c| &c.model),
                    Some(Model::Token(_))
                ) {
                    return revert("Auction: token is not a contract");
                }
                Ok(Model::Auction(AuctionState {
                    token,
                    end_time: self.now.saturating_add(duration.saturating_to::<u64>()),
                    ended: false,
                    bids: HashMap::new(),
                    highest_bid: 0,
                    winner: Address::ZERO,
                }))
            }
            names::VOTING => {
                let (_proposal, options, period) = <(
                    sol_data::String,
                    sol_data::Array<sol_data::String>,
                    sol_data::Uint<256>,
                )>::abi_decode_params(args, true)
                .map_err(bad_args)?;
                if options.is_empty() || options.len() > usize::from(u8::MAX) {
                    return revert("Voting: invalid option count");
                }
                Ok(Model::Voting(VotingState {
                    options,
                    end_time: self.now.saturating_add(period.saturating_to::<u64>()),
                    votes: HashMap::new(),
                }))
            }
            names::COUNTER => Ok(Model::Counter(CounterState::default())),
            other => revert(format!("unknown devnet contract {other}")),
        }
    }

    fn grant_valid(&self, auth: &Permission, signer: Address, contract: Address) -> bool {
        self.grants.get(&auth.signature).is_some_and(|grant| {
            *grant
                == PermitGrant {
                    signer,
                    contract,
                    public_key: auth.publicKey,
                }
        })
    }

    /// Run one call; returns ABI-encoded output.
    fn dispatch(&mut self, call: Call<'_>) -> Result<Vec<u8>, Revert> {
        let model = match self.contracts.get(&call.to) {
            Some(contract) => contract.model.clone(),
            None => return Ok(Vec::new()),
        };
        match model {
            Model::Token(_) => self.token_call(call),
            Model::Auction(_) => self.auction_call(call),
            Model::Voting(_) => self.voting_call(call),
            Model::Counter(_) => self.counter_call(call),
        }
    }

    fn token_mut(&mut self, address: Address) -> Result<&mut TokenState, Revert> {
        match self.contracts.get_mut(&address).map(|c| &mut c.model) {
            Some(Model::Token(token)) => Ok(token),
            _ => revert("not a token"),
        }
    }

    fn token_call(&mut self, call: Call<'_>) -> Result<Vec<u8>, Revert> {
        use FHERC20::FHERC20Calls as C;

        let decoded = C::abi_decode(call.data, true).map_err(|e| Revert(e.to_string()))?;
        let valid = match &decoded {
            C::balanceOfEncrypted(c) => self.grant_valid(&c.auth, c.account, call.to),
            _ => true,
        };
        let token = self.token_mut(call.to)?;
        match decoded {
            C::name(_) => Ok(FHERC20::nameCall::abi_encode_returns(&(token.name.clone(),))),
            C::symbol(_) => Ok(FHERC20::symbolCall::abi_encode_returns(&(token.symbol.clone(),))),
            C::mintEncrypted(c) => {
                let amount = decode_input(&c.amount.data, UintWidth::U32)?;
                let entry = token.balances.entry(c.to).or_default();
                *entry = entry.saturating_add(amount).min(u64::from(u32::MAX));
                Ok(Vec::new())
            }
            C::transferEncrypted(c) => {
                let amount = decode_input(&c.amount.data, UintWidth::U32)?;
                token.transfer(call.from, c.to, amount);
                Ok(Vec::new())
            }
            C::approveEncrypted(c) => {
                let amount = decode_input(&c.amount.data, UintWidth::U32)?;
                token.allowances.insert((call.from, c.spender), amount);
                Ok(Vec::new())
            }
            C::balanceOfEncrypted(c) => {
                if !valid {
                    return revert("Permission invalid");
                }
                let sealed = seal_output(token.balance(c.account), &c.auth.publicKey)?;
                Ok(FHERC20::balanceOfEncryptedCall::abi_encode_returns(&(sealed,)))
            }
        }
    }

    fn auction_call(&mut self, call: Call<'_>) -> Result<Vec<u8>, Revert> {
        use Auction::AuctionCalls as C;

        let decoded = C::abi_decode(call.data, true).map_err(|e| Revert(e.to_string()))?;
        let now = self.now;
        let Some(Model::Auction(mut auction)) = self.contracts.get(&call.to).map(|c| c.model.clone()) else {
            return revert("not an auction");
        };

        let output = match decoded {
            C::bid(c) => {
                if auction.ended || now >= auction.end_time {
                    return revert("Auction ended");
                }
                let amount = decode_input(&c.amount.data, UintWidth::U32)?;
                let spent = self
                    .token_mut(auction.token)?
                    .transfer_from(call.from, call.to, call.to, amount);
                let total = {
                    let entry = auction.bids.entry(call.from).or_default();
                    *entry += spent;
                    *entry
                };
                if total > auction.highest_bid {
                    auction.highest_bid = total;
                    auction.winner = call.from;
                }
                Vec::new()
            }
            C::endAuction(_) => {
                if now < auction.end_time {
                    return revert("Auction not over yet");
                }
                auction.ended = true;
                Vec::new()
            }
            C::debugEndAuction(_) => {
                auction.ended = true;
                Vec::new()
            }
            C::getWinner(_) => {
                if !auction.ended {
                    return revert("Auction not ended");
                }
                Auction::getWinnerCall::abi_encode_returns(&(auction.winner,))
            }
            C::getWinningBid(_) => {
                if !auction.ended {
                    return revert("Auction not ended");
                }
                Auction::getWinningBidCall::abi_encode_returns(&(U256::from(auction.highest_bid),))
            }
        };

        if let Some(contract) = self.contracts.get_mut(&call.to) {
            contract.model = Model::Auction(auction);
        }
        Ok(output)
    }

    fn voting_call(&mut self, call: Call<'_>) -> Result<Vec<u8>, Revert> {
        use Voting::VotingCalls as C;

        let decoded = C::abi_decode(call.data, true).map_err(|e| Revert(e.to_string()))?;
        let now = self.now;
        let valid = match &decoded {
            C::getUserVote(c) => self.grant_valid(&c.auth, call.from, call.to),
            _ => true,
        };
        let voting = match self.contracts.get_mut(&call.to).map(|c| &mut c.model) {
            Some(Model::Voting(voting)) => voting,
            _ => return revert("not a voting contract"),
        };

        match decoded {
            C::vote(c) => {
                if now >= voting.end_time {
                    return revert("voting is over");
                }
                let option = decode_input(&c.option.data, UintWidth::U8)?;
                let option = u8::try_from(option).map_err(|_| Revert("bad option".into()))?;
                // Encrypted options cannot be range-checked; unknown ones count for nothing.
                if usize::from(option) >= voting.options.len() {
                    debug!(option, "vote for unknown option");
                }
                voting.votes.insert(call.from, option);
                Ok(Vec::new())
            }
            C::getUserVote(c) => {
                if !valid {
                    return revert("Permission invalid");
                }
                let Some(option) = voting.votes.get(&call.from) else {
                    return revert("no vote cast");
                };
                let sealed = seal_output(u64::from(*option), &c.auth.publicKey)?;
                Ok(Voting::getUserVoteCall::abi_encode_returns(&(sealed,)))
            }
        }
    }

    fn counter_call(&mut self, call: Call<'_>) -> Result<Vec<u8>, Revert> {
        use Counter::CounterCalls as C;

        let decoded = C::abi_decode(call.data, true).map_err(|e| Revert(e.to_string()))?;
        let counter = match self.contracts.get_mut(&call.to).map(|c| &mut c.model) {
            Some(Model::Counter(counter)) => counter,
            _ => return revert("not a counter"),
        };
        match decoded {
            C::add(c) => {
                let amount = decode_input(&c.amount.data, UintWidth::U32)?;
                counter.value = (counter.value + amount) & u64::from(u32::MAX);
                Ok(Vec::new())
            }
            C::getCounter(c) => {
                let sealed = seal_output(counter.value, &c.publicKey)?;
                Ok(Counter::getCounterCall::abi_encode_returns(&(sealed,)))
            }
        }
    }
}

fn decode_input(data: &[u8], width: UintWidth) -> Result<u64, Revert> {
    PlaintextEncryptor::decode(data, width)
        .ok_or_else(|| Revert(format!("invalid {width} ciphertext")))
}

fn seal_output(value: u64, public_key: &B256) -> Result<String, Revert> {
    seal(U256::from(value), public_key).map_err(|e| Revert(e.to_string()))
}

fn revert_error(reason: Revert) -> ChainError {
    ChainError::Rpc {
        code: 3,
        message: format!("execution reverted: {}", reason.0),
        data: Some(serde_json::json!({ "message": reason.0 })),
    }
}

// ---------------------------------------------------------------------------
// DevChain
// ---------------------------------------------------------------------------

/// Simulated development network.
pub struct DevChain {
    chain_id: u64,
    state: Mutex<DevState>,
}

impl DevChain {
    /// A fresh chain with ten node-held accounts; only the first is funded.
    pub fn new() -> Self {
        Self::with_chain_id(LOCALFHENIX_CHAIN_ID)
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        let accounts = (0..ACCOUNT_COUNT)
            .map(|i| Address::from_word(keccak256(format!("devnet account {i}"))))
            .collect();
        Self {
            chain_id,
            state: Mutex::new(DevState::new(accounts)),
        }
    }

    /// Artifacts whose bytecode this chain can run, one per known contract.
    pub fn artifacts() -> ArtifactStore {
        let mut store = ArtifactStore::in_memory();
        for name in KNOWN_CONTRACTS {
            store.insert(Self::artifact(name));
        }
        store
    }

    pub fn artifact(name: &str) -> ContractArtifact {
        let mut code = DEVNET_CODE_PREFIX.to_vec();
        code.extend_from_slice(name.as_bytes());
        code.push(0);
        ContractArtifact {
            contract_name: name.to_string(),
            abi: serde_json::Value::Array(Vec::new()),
            bytecode: format!("0x{}", hex::encode(code)),
        }
    }

    pub fn account(&self, index: usize) -> Address {
        self.state.lock().accounts[index]
    }

    /// Make the next `count` signing prompts (transactions or typed data)
    /// fail as if the user declined them.
    pub fn reject_next(&self, count: u32) {
        self.state.lock().pending_rejections += count;
    }

    /// Mine the next transaction with a zero status.
    pub fn fail_next_receipt(&self) {
        self.state.lock().fail_next_receipt = true;
    }

    pub fn advance_time(&self, seconds: u64) {
        self.state.lock().now += seconds;
    }

    pub fn faucet_requests(&self) -> Vec<Address> {
        self.state.lock().faucet_requests.clone()
    }

    /// Forget deployed code, as after a node restart.
    pub fn wipe_contracts(&self) {
        self.state.lock().contracts.clear();
    }

    /// Plaintext encrypted balance of `account` on `token`, bypassing permits.
    pub fn token_balance(&self, token: Address, account: Address) -> Option<u64> {
        match self.state.lock().contracts.get(&token).map(|c| &c.model) {
            Some(Model::Token(t)) => Some(t.balance(account)),
            _ => None,
        }
    }

    /// Plaintext counter value, bypassing permits.
    pub fn counter_value(&self, counter: Address) -> Option<u64> {
        match self.state.lock().contracts.get(&counter).map(|c| &c.model) {
            Some(Model::Counter(c)) => Some(c.value),
            _ => None,
        }
    }
}

impl Default for DevChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for DevChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.state.lock().accounts.clone())
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.state.lock().balance(address))
    }

    async fn code(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self
            .state
            .lock()
            .contracts
            .get(&address)
            .map(|c| c.code.clone())
            .unwrap_or_default())
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ChainError> {
        let Some(to) = tx.to else {
            return Ok(Bytes::new());
        };
        // Calls run against a scratch copy so writes never persist.
        let mut scratch = self.state.lock().clone();
        scratch
            .dispatch(Call {
                from: tx.from,
                to,
                data: &tx.data,
            })
            .map(Bytes::from)
            .map_err(revert_error)
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<B256, ChainError> {
        let mut state = self.state.lock();
        state.take_rejection()?;
        state.require_account(tx.from)?;

        let cost = TX_FEE + tx.value;
        if state.balance(tx.from) < cost {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".into(),
                data: None,
            });
        }

        let nonce = state.nonces.get(&tx.from).copied().unwrap_or(0);
        let mut preimage = tx.from.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        let hash = keccak256(&preimage);

        let failed = std::mem::take(&mut state.fail_next_receipt);
        let contract_address = if failed {
            None
        } else {
            // Simulate first so a revert leaves no trace, as gas estimation would.
            let mut next = state.clone();
            let created = next.execute(tx).map_err(revert_error)?;
            *state = next;
            created
        };

        *state.balances.entry(tx.from).or_default() -= TX_FEE;
        state.nonces.insert(tx.from, nonce + 1);
        state.block += 1;
        let receipt = TxReceipt {
            transaction_hash: hash,
            status: Some(if failed { U64::ZERO } else { U64::from(1u64) }),
            contract_address,
            block_number: Some(U64::from(state.block)),
            gas_used: U256::from(21_000u64),
        };
        state.receipts.insert(hash, receipt);
        debug!(tx = %hash, from = %tx.from, failed, "devnet transaction mined");
        Ok(hash)
    }

    async fn receipt(&self, hash: B256) -> Result<Option<TxReceipt>, ChainError> {
        Ok(self.state.lock().receipts.get(&hash).cloned())
    }

    async fn sign_typed_data(
        &self,
        signer: Address,
        typed_data: &serde_json::Value,
    ) -> Result<Bytes, ChainError> {
        let mut state = self.state.lock();
        state.take_rejection()?;
        state.require_account(signer)?;

        let invalid = |what: &str| ChainError::Rpc {
            code: -32602,
            message: format!("invalid typed data: {what}"),
            data: None,
        };
        let domain = &typed_data["domain"];
        if domain["chainId"].as_u64() != Some(self.chain_id) {
            return Err(invalid("chainId"));
        }
        let contract: Address = serde_json::from_value(domain["verifyingContract"].clone())
            .map_err(|_| invalid("verifyingContract"))?;
        let public_key: B256 = serde_json::from_value(typed_data["message"]["publicKey"].clone())
            .map_err(|_| invalid("publicKey"))?;

        if domain["name"] != PERMIT_DOMAIN_NAME {
            return Err(invalid("domain"));
        }

        let mut preimage = signer.to_vec();
        preimage.extend_from_slice(typed_data.to_string().as_bytes());
        let digest = keccak256(&preimage);
        let mut signature = Vec::with_capacity(65);
        signature.extend_from_slice(digest.as_slice());
        signature.extend_from_slice(keccak256(digest).as_slice());
        signature.push(0x1b);

        let signature = Bytes::from(signature);
        state.grants.insert(
            signature.clone(),
            PermitGrant {
                signer,
                contract,
                public_key,
            },
        );
        Ok(signature)
    }
}

#[async_trait]
impl Faucet for DevChain {
    async fn request_funds(&self, address: Address) -> Result<(), ChainError> {
        let mut state = self.state.lock();
        state.faucet_requests.push(address);
        *state.balances.entry(address).or_default() += ONE_ETHER * U256::from(FAUCET_AMOUNT_ETHER);
        Ok(())
    }
}

/// Calldata helpers mostly useful in tests.
pub fn encrypted_u32(value: u32) -> InEuint32 {
    InEuint32 {
        data: Bytes::copy_from_slice(&value.to_be_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractHandle;
    use crate::permit::PermitStore;
    use crate::rpc::{ReceiptWait, send_and_confirm, signer_at};
    use std::sync::Arc;

    async fn deploy(chain: &DevChain, from: Address, name: &str, args: Vec<u8>) -> Address {
        let artifact = DevChain::artifact(name);
        let mut init = artifact.bytecode_bytes().unwrap().to_vec();
        init.extend_from_slice(&args);
        let receipt = send_and_confirm(chain, &TxRequest::create(from, init), ReceiptWait::default())
            .await
            .unwrap();
        receipt.contract_address.unwrap()
    }

    fn token_args() -> Vec<u8> {
        use alloy_sol_types::SolConstructor;
        FHERC20::constructorCall {
            name: "token".into(),
            symbol: "FHE".into(),
        }
        .abi_encode()
    }

    #[tokio::test]
    async fn accounts_are_stable_and_first_is_funded() {
        let chain = DevChain::new();
        let accounts = chain.accounts().await.unwrap();
        assert_eq!(accounts.len(), ACCOUNT_COUNT);
        assert_eq!(accounts, DevChain::new().accounts().await.unwrap());
        assert!(chain.balance(accounts[0]).await.unwrap() > ONE_ETHER);
        assert_eq!(chain.balance(accounts[1]).await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn create_assigns_address_and_code() {
        let chain = DevChain::new();
        let from = chain.account(0);
        let token = deploy(&chain, from, names::FHERC20, token_args()).await;
        assert_eq!(token, from.create(0));
        assert!(!chain.code(token).await.unwrap().is_empty());
        assert!(chain.code(Address::with_last_byte(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_metadata_is_readable() {
        let chain = Arc::new(DevChain::new());
        let from = chain.account(0);
        let token = deploy(&chain, from, names::FHERC20, token_args()).await;
        let handle = ContractHandle::new(chain.clone(), token);
        let name = handle.read(from, &FHERC20::nameCall {}).await.unwrap();
        let symbol = handle.read(from, &FHERC20::symbolCall {}).await.unwrap();
        assert_eq!(name._0, "token");
        assert_eq!(symbol._0, "FHE");
    }

    #[tokio::test]
    async fn sealed_balance_needs_matching_permit() {
        let chain = Arc::new(DevChain::new());
        let alice = chain.account(0);
        let token = deploy(&chain, alice, names::FHERC20, token_args()).await;
        let handle = ContractHandle::new(chain.clone(), token);
        handle
            .send(alice, &FHERC20::mintEncryptedCall { to: alice, amount: encrypted_u32(25) })
            .await
            .unwrap();

        let mut permits = PermitStore::new();
        let permit = permits.get_or_create(chain.as_ref(), token, alice).await.unwrap();
        let sealed = handle
            .read(alice, &FHERC20::balanceOfEncryptedCall { account: alice, auth: permit.permission() })
            .await
            .unwrap();
        assert_eq!(permit.unseal(&sealed._0).unwrap(), U256::from(25u64));

        let bob = chain.account(1);
        let forged = handle
            .read(bob, &FHERC20::balanceOfEncryptedCall { account: bob, auth: permit.permission() })
            .await
            .unwrap_err();
        assert_eq!(forged.rpc_message(), "Permission invalid");
    }

    #[tokio::test]
    async fn unaffordable_transfer_moves_nothing() {
        let chain = Arc::new(DevChain::new());
        let alice = chain.account(0);
        let bob = chain.account(1);
        let token = deploy(&chain, alice, names::FHERC20, token_args()).await;
        let handle = ContractHandle::new(chain.clone(), token);
        handle
            .send(alice, &FHERC20::mintEncryptedCall { to: alice, amount: encrypted_u32(5) })
            .await
            .unwrap();
        handle
            .send(alice, &FHERC20::transferEncryptedCall { to: bob, amount: encrypted_u32(6) })
            .await
            .unwrap();
        assert_eq!(chain.token_balance(token, alice), Some(5));
        assert_eq!(chain.token_balance(token, bob), Some(0));
    }

    #[tokio::test]
    async fn wrong_width_input_reverts() {
        let chain = Arc::new(DevChain::new());
        let alice = chain.account(0);
        let token = deploy(&chain, alice, names::FHERC20, token_args()).await;
        let handle = ContractHandle::new(chain.clone(), token);
        let bad = InEuint32 { data: Bytes::from(vec![1]) };
        let err = handle
            .send(alice, &FHERC20::mintEncryptedCall { to: alice, amount: bad })
            .await
            .unwrap_err();
        assert!(err.rpc_message().contains("invalid euint32 ciphertext"));
    }

    #[tokio::test]
    async fn rejection_surfaces_4001() {
        let chain = DevChain::new();
        let from = signer_at(&chain, 0).await.unwrap();
        chain.reject_next(1);
        let err = chain
            .send_transaction(&TxRequest::transfer(from, chain.account(1), ONE_ETHER))
            .await
            .unwrap_err();
        assert!(err.is_user_rejection());
        chain
            .send_transaction(&TxRequest::transfer(from, chain.account(1), ONE_ETHER))
            .await
            .unwrap();
        assert_eq!(chain.balance(chain.account(1)).await.unwrap(), ONE_ETHER);
    }

    #[tokio::test]
    async fn failed_receipt_has_zero_status() {
        let chain = DevChain::new();
        let from = chain.account(0);
        chain.fail_next_receipt();
        let err = send_and_confirm(
            &chain,
            &TxRequest::transfer(from, chain.account(2), ONE_ETHER),
            ReceiptWait::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));
        assert_eq!(chain.balance(chain.account(2)).await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn unfunded_sender_is_refused() {
        let chain = DevChain::new();
        let poor = chain.account(3);
        let err = chain
            .send_transaction(&TxRequest::transfer(poor, chain.account(0), U256::from(1u64)))
            .await
            .unwrap_err();
        assert!(err.rpc_message().contains("insufficient funds"));

        chain.request_funds(poor).await.unwrap();
        assert_eq!(chain.faucet_requests(), vec![poor]);
        assert!(chain.balance(poor).await.unwrap() >= ONE_ETHER);
    }

    #[tokio::test]
    async fn auction_requires_end_before_reading_winner() {
        let chain = Arc::new(DevChain::new());
        let alice = chain.account(0);
        let token = deploy(&chain, alice, names::FHERC20, token_args()).await;
        let auction_args = {
            use alloy_sol_types::SolConstructor;
            Auction::constructorCall { token, duration: U256::from(3600u64) }.abi_encode()
        };
        let auction = deploy(&chain, alice, names::AUCTION, auction_args).await;
        let handle = ContractHandle::new(chain.clone(), auction);

        assert!(handle.read(alice, &Auction::getWinnerCall {}).await.is_err());
        assert!(handle.send(alice, &Auction::endAuctionCall {}).await.is_err());

        chain.advance_time(3600);
        handle.send(alice, &Auction::endAuctionCall {}).await.unwrap();
        let winner = handle.read(alice, &Auction::getWinnerCall {}).await.unwrap();
        assert_eq!(winner._0, Address::ZERO);
    }

    #[tokio::test]
    async fn counter_accumulates() {
        let chain = Arc::new(DevChain::new());
        let alice = chain.account(0);
        let counter = deploy(&chain, alice, names::COUNTER, Vec::new()).await;
        let handle = ContractHandle::new(chain.clone(), counter);
        handle.send(alice, &Counter::addCall { amount: encrypted_u32(2) }).await.unwrap();
        handle.send(alice, &Counter::addCall { amount: encrypted_u32(3) }).await.unwrap();
        assert_eq!(chain.counter_value(counter), Some(5));
    }

    #[tokio::test]
    async fn typed_data_for_wrong_chain_is_refused() {
        let chain = DevChain::new();
        let data = crate::permit::permit_typed_data(1, Address::with_last_byte(9), B256::ZERO);
        assert!(chain.sign_typed_data(chain.account(0), &data).await.is_err());
    }
}
