//! ABI bindings for the contract suite.
//!
//! Only the methods the client actually calls are declared. Encrypted inputs
//! travel as single-field tuples (`inEuintN`), permits as `Permission`.

use alloy_primitives::{Address, address};
use alloy_sol_types::sol;

/// Logical contract names, as used for artifacts and deployment records.
pub mod names {
    pub const FHERC20: &str = "FHERC20";
    pub const EXAMPLE_TOKEN: &str = "ExampleToken";
    pub const AUCTION: &str = "Auction";
    pub const VOTING: &str = "Voting";
    pub const COUNTER: &str = "Counter";
}

/// Precompile exposing FHE network parameters.
pub const FHE_OPS_ADDRESS: Address = address!("0000000000000000000000000000000000000080");

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct InEuint8 {
        bytes data;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct InEuint16 {
        bytes data;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct InEuint32 {
        bytes data;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Permission {
        bytes32 publicKey;
        bytes signature;
    }

    #[derive(Debug, PartialEq, Eq)]
    contract FHERC20 {
        constructor(string name, string symbol);

        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function mintEncrypted(address to, InEuint32 calldata amount) external;
        function transferEncrypted(address to, InEuint32 calldata amount) external;
        function approveEncrypted(address spender, InEuint32 calldata amount) external;
        function balanceOfEncrypted(address account, Permission calldata auth) external view returns (string memory);
    }

    #[derive(Debug, PartialEq, Eq)]
    contract ExampleToken {
        constructor(string name, string symbol, uint256 supply, InEuint32 balance);
    }

    #[derive(Debug, PartialEq, Eq)]
    contract Auction {
        constructor(address token, uint256 duration);

        function bid(InEuint32 calldata amount) external;
        function endAuction() external;
        function debugEndAuction() external;
        function getWinner() external view returns (address);
        function getWinningBid() external view returns (uint256);
    }

    #[derive(Debug, PartialEq, Eq)]
    contract Voting {
        constructor(string proposal, string[] options, uint256 period);

        function vote(InEuint8 calldata option) external;
        function getUserVote(Permission calldata auth) external view returns (string memory);
    }

    #[derive(Debug, PartialEq, Eq)]
    contract Counter {
        constructor();

        function add(InEuint32 calldata amount) external;
        function getCounter(bytes32 publicKey) external view returns (string memory);
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IFheOps {
        function getNetworkPublicKey(int32 securityZone) external view returns (bytes memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, FixedBytes, U256};
    use alloy_sol_types::{SolCall, SolConstructor};

    #[test]
    fn transfer_encrypted_uses_tuple_selector() {
        let expected = alloy_primitives::keccak256("transferEncrypted(address,(bytes))");
        assert_eq!(FHERC20::transferEncryptedCall::SELECTOR, expected[..4]);
    }

    #[test]
    fn balance_of_encrypted_signature() {
        assert_eq!(
            FHERC20::balanceOfEncryptedCall::SIGNATURE,
            "balanceOfEncrypted(address,(bytes32,bytes))"
        );
    }

    #[test]
    fn vote_takes_eight_bit_input() {
        assert_eq!(Voting::voteCall::SIGNATURE, "vote((bytes))");
    }

    #[test]
    fn mint_call_round_trips_through_calldata() {
        let call = FHERC20::mintEncryptedCall {
            to: Address::with_last_byte(7),
            amount: InEuint32 {
                data: Bytes::from(vec![0, 0, 0, 10]),
            },
        };
        let encoded = call.abi_encode();
        let decoded = FHERC20::mintEncryptedCall::abi_decode(&encoded, true).unwrap();
        assert_eq!(decoded, call);
    }

    #[test]
    fn auction_constructor_encodes_two_words() {
        let ctor = Auction::constructorCall {
            token: Address::with_last_byte(1),
            duration: U256::from(3600u64),
        };
        assert_eq!(ctor.abi_encode().len(), 64);
    }

    #[test]
    fn permission_carries_public_key() {
        let permission = Permission {
            publicKey: FixedBytes::<32>::repeat_byte(0xaa),
            signature: Bytes::from(vec![1, 2, 3]),
        };
        let call = FHERC20::balanceOfEncryptedCall {
            account: Address::ZERO,
            auth: permission.clone(),
        };
        let decoded = FHERC20::balanceOfEncryptedCall::abi_decode(&call.abi_encode(), true).unwrap();
        assert_eq!(decoded.auth, permission);
    }
}
