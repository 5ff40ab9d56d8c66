//! ERC20 contract binding
//!
//! Only `transfer(address,uint256)` is ever called.

use crate::types::TransferCall;
use alloy::primitives::Bytes;
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// The single whitelisted token method
    interface IERC20Transfer {
        function transfer(address _to, uint256 _value) external returns (bool);
    }
}

/// ABI-encoded calldata for `call`
pub fn transfer_calldata(call: &TransferCall) -> Bytes {
    IERC20Transfer::transferCall {
        _to: call.to,
        _value: call.value,
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_calldata_starts_with_transfer_selector() {
        let call = TransferCall {
            contract: Address::repeat_byte(0xab),
            to: Address::repeat_byte(0xde),
            value: U256::from(1_500_000_000_000_000_000u128),
        };
        let data = transfer_calldata(&call);

        // keccak256("transfer(address,uint256)")[..4]
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[16..36], call.to.as_slice());
    }

    #[test]
    fn test_calldata_decodes_back() {
        let call = TransferCall {
            contract: Address::ZERO,
            to: Address::repeat_byte(0x42),
            value: U256::from(7u64),
        };
        let data = transfer_calldata(&call);
        let decoded = IERC20Transfer::transferCall::abi_decode(&data).unwrap();
        assert_eq!(decoded._to, call.to);
        assert_eq!(decoded._value, call.value);
    }
}
