//! Chain-family adapters: a uniform, stateless interface over TRON and EVM
//! RPC surfaces, used by the deposit detector, confirmation workers and
//! execution workers alike.

mod adapter;
mod error;
mod retry;
mod rlp;

pub mod evm;
pub mod tron;

pub use adapter::{ChainAdapter, RawTransfer, TxReceipt};
pub use error::ChainError;
pub use evm::EvmAdapter;
pub use retry::with_retry;
pub use tron::TronAdapter;

use num_bigint::BigUint;

/// Decodes a `0x`-prefixed big-endian hex integer (as returned by `eth_call`,
/// `eth_getBalance`, log `data` fields, etc.) into a base-10 raw-amount
/// string, never going through a float.
pub(crate) fn u256_hex_to_decimal(hex: &str) -> Result<String, ChainError> {
    let trimmed = hex.trim_start_matches("0x");
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    let bytes = if trimmed.len() % 2 == 0 {
        hex::decode_even(trimmed)
    } else {
        hex::decode_even(&format!("0{trimmed}"))
    }
    .map_err(|e| ChainError::InvalidData(format!("invalid hex integer {hex}: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes).to_string())
}

/// Minimal hex codec so this crate doesn't need to pull in a dedicated hex
/// dependency for a handful of call sites.
pub(crate) mod hex {
    pub fn decode_even(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".to_string());
        }
        let mut out = Vec::with_capacity(s.len() / 2);
        let bytes = s.as_bytes();
        for chunk in bytes.chunks(2) {
            let pair = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
            let byte = u8::from_str_radix(pair, 16).map_err(|e| e.to_string())?;
            out.push(byte);
        }
        Ok(out)
    }

    pub fn encode(bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_zero_and_nonzero_hex_integers() {
        assert_eq!(u256_hex_to_decimal("0x0").unwrap(), "0");
        assert_eq!(u256_hex_to_decimal("0x").unwrap(), "0");
        assert_eq!(u256_hex_to_decimal("0xde0b6b3a7640000").unwrap(), "1000000000000000000");
    }
}
