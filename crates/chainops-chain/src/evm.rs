use async_trait::async_trait;
use chainops_common::model::AssetOnChain;
use num_bigint::BigUint;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

use crate::adapter::{ChainAdapter, RawTransfer, TxReceipt};
use crate::error::ChainError;
use crate::retry::with_retry;
use crate::{hex, rlp};

/// `keccak256("Transfer(address,address,uint256)")`, the ERC-20 transfer
/// topic every token deposit is filtered on (§4.1).
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

pub struct EvmAdapter {
    http: reqwest::Client,
    rpc_url: String,
    max_retry_attempts: u32,
}

impl EvmAdapter {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client builds with static config"),
            rpc_url: rpc_url.into(),
            max_retry_attempts: 5,
        }
    }

    async fn call_once(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(ChainError::from_transport)?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ChainError::Unauthorized(format!("rpc returned {status}")));
        }
        if !status.is_success() {
            return Err(ChainError::Network(format!("rpc returned {status}")));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidData(e.to_string()))?;

        if let Some(error) = envelope.get("error") {
            return Err(ChainError::InvalidData(error.to_string()));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| ChainError::InvalidData("missing result field".to_string()))
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        with_retry(self.max_retry_attempts, || self.call_once(method, params.clone())).await
    }

    fn to_hex_block(n: u64) -> String {
        format!("0x{n:x}")
    }

    fn from_hex(value: &str) -> Result<u64, ChainError> {
        let trimmed = value.trim_start_matches("0x");
        u64::from_str_radix(trimmed, 16)
            .map_err(|_| ChainError::InvalidData(format!("invalid hex integer: {value}")))
    }

    /// Left-pad a 20-byte address into the 32-byte topic form `eth_getLogs`
    /// expects.
    fn address_topic(address: &str) -> String {
        let trimmed = address.trim_start_matches("0x").to_lowercase();
        format!("0x{:0>64}", trimmed)
    }

    fn topic_to_address(topic: &str) -> String {
        let trimmed = topic.trim_start_matches("0x");
        let addr = &trimmed[trimmed.len().saturating_sub(40)..];
        format!("0x{addr}")
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn family_name(&self) -> &'static str {
        "evm"
    }

    async fn current_block(&self) -> Result<u64, ChainError> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidData("eth_blockNumber did not return a string".into()))?;
        Self::from_hex(hex)
    }

    async fn get_transfer_logs(
        &self,
        asset: &AssetOnChain,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, ChainError> {
        let Some(contract) = asset.contract_address.as_ref() else {
            // Native-asset deposits have no ERC-20 Transfer log; this adapter
            // only detects token transfers via eth_getLogs, matching what the
            // upstream RPC surface in §6 actually exposes.
            return Ok(Vec::new());
        };

        let filter = json!({
            "fromBlock": Self::to_hex_block(from_block),
            "toBlock": Self::to_hex_block(to_block),
            "address": contract,
            "topics": [TRANSFER_TOPIC],
        });

        let logs = self.rpc_call("eth_getLogs", json!([filter])).await?;
        let logs = logs
            .as_array()
            .ok_or_else(|| ChainError::InvalidData("eth_getLogs did not return an array".into()))?;

        let mut transfers = Vec::with_capacity(logs.len());
        for log in logs {
            let topics = log
                .get("topics")
                .and_then(Value::as_array)
                .ok_or_else(|| ChainError::InvalidData("log missing topics".into()))?;
            if topics.len() < 3 {
                continue;
            }
            let from_address = Self::topic_to_address(topics[1].as_str().unwrap_or_default());
            let to_address = Self::topic_to_address(topics[2].as_str().unwrap_or_default());
            let data = log
                .get("data")
                .and_then(Value::as_str)
                .ok_or_else(|| ChainError::InvalidData("log missing data".into()))?;
            let amount_raw = crate::u256_hex_to_decimal(data)?;
            let tx_hash = log
                .get("transactionHash")
                .and_then(Value::as_str)
                .ok_or_else(|| ChainError::InvalidData("log missing transactionHash".into()))?
                .to_string();
            let log_index = log
                .get("logIndex")
                .and_then(Value::as_str)
                .map(Self::from_hex)
                .transpose()?
                .unwrap_or(0) as i64;
            let block_number = log
                .get("blockNumber")
                .and_then(Value::as_str)
                .map(Self::from_hex)
                .transpose()?
                .unwrap_or(from_block);

            transfers.push(RawTransfer {
                tx_hash,
                log_index,
                from_address,
                to_address,
                amount_raw,
                block_number,
            });
        }
        Ok(transfers)
    }

    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, ChainError> {
        let result = self
            .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let status = result
            .get("status")
            .and_then(Value::as_str)
            .map(Self::from_hex)
            .transpose()?
            .unwrap_or(0);
        let block_number = result
            .get("blockNumber")
            .and_then(Value::as_str)
            .map(Self::from_hex)
            .transpose()?
            .unwrap_or(0);
        let gas_used = result
            .get("gasUsed")
            .and_then(Value::as_str)
            .map(|h| Self::from_hex(h).map(|v| v.to_string()))
            .transpose()?;
        let gas_price = result
            .get("effectiveGasPrice")
            .and_then(Value::as_str)
            .map(|h| Self::from_hex(h).map(|v| v.to_string()))
            .transpose()?;

        Ok(Some(TxReceipt {
            block_number,
            success: status == 1,
            gas_used,
            gas_price,
        }))
    }

    async fn get_native_balance(&self, address: &str) -> Result<String, ChainError> {
        let result = self
            .rpc_call("eth_getBalance", json!([address, "latest"]))
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidData("eth_getBalance did not return a string".into()))?;
        crate::u256_hex_to_decimal(hex)
    }

    async fn get_token_balance(&self, contract: &str, address: &str) -> Result<String, ChainError> {
        // balanceOf(address) selector 0x70a08231
        let padded = Self::address_topic(address);
        let data = format!("0x70a08231{}", &padded[2..]);
        let call = json!({ "to": contract, "data": data });
        let result = self.rpc_call("eth_call", json!([call, "latest"])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidData("eth_call did not return a string".into()))?;
        crate::u256_hex_to_decimal(hex)
    }

    fn normalize_address(&self, address: &str) -> String {
        address.to_lowercase()
    }
}

/// Fetches the pending-tag nonce for a funding address (§4.10), separate from
/// the `ChainAdapter` trait since only EVM execution workers need it.
impl EvmAdapter {
    pub async fn pending_nonce(&self, address: &str) -> Result<u64, ChainError> {
        let result = self
            .rpc_call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        let hex = result.as_str().ok_or_else(|| {
            ChainError::InvalidData("eth_getTransactionCount did not return a string".into())
        })?;
        Self::from_hex(hex)
    }

    pub async fn fee_data_gas_price(&self) -> Result<String, ChainError> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidData("eth_gasPrice did not return a string".into()))?;
        crate::u256_hex_to_decimal(hex)
    }

    /// Live `eth_chainId`, checked against the configured `Chain.chain_id`
    /// before broadcast so a misconfigured RPC endpoint can't sign and send
    /// on the wrong network (§4.10).
    pub async fn fetch_chain_id(&self) -> Result<u64, ChainError> {
        let result = self.rpc_call("eth_chainId", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidData("eth_chainId did not return a string".into()))?;
        Self::from_hex(hex)
    }

    pub async fn send_raw_transaction(&self, raw_tx_hex: &str) -> Result<String, ChainError> {
        let result = self
            .rpc_call("eth_sendRawTransaction", json!([raw_tx_hex]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChainError::InvalidData("eth_sendRawTransaction did not return a hash".into()))
    }
}

fn decode_address(address: &str) -> Result<[u8; 20], ChainError> {
    let trimmed = address.trim_start_matches("0x");
    if trimmed.len() != 40 {
        return Err(ChainError::InvalidData(format!("invalid address: {address}")));
    }
    let bytes = hex::decode_even(trimmed)
        .map_err(|e| ChainError::InvalidData(format!("invalid address {address}: {e}")))?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// `erc20.transfer(address,uint256)` selector `0xa9059cbb`.
const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Builds ABI-encoded calldata for an ERC-20 transfer (§4.10 consolidation /
/// withdrawal of token assets).
pub fn erc20_transfer_calldata(to: &str, amount_raw: &str) -> Result<Vec<u8>, ChainError> {
    let to_bytes = decode_address(to)?;
    let amount = BigUint::from_str(amount_raw)
        .map_err(|_| ChainError::InvalidData(format!("invalid amount: {amount_raw}")))?;
    let amount_bytes = amount.to_bytes_be();
    if amount_bytes.len() > 32 {
        return Err(ChainError::InvalidData(format!("amount overflows uint256: {amount_raw}")));
    }

    let mut calldata = Vec::with_capacity(4 + 32 + 32);
    calldata.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
    calldata.extend(std::iter::repeat(0u8).take(12));
    calldata.extend_from_slice(&to_bytes);
    calldata.extend(std::iter::repeat(0u8).take(32 - amount_bytes.len()));
    calldata.extend_from_slice(&amount_bytes);
    Ok(calldata)
}

/// Builds the RLP-encoded unsigned legacy transaction the signer is handed
/// for EVM broadcasts (§4.10), pre-EIP-1559 shape: `[nonce, gasPrice,
/// gasLimit, to, value, data, chainId, 0, 0]`.
pub fn build_unsigned_legacy_tx(
    nonce: u64,
    gas_price_wei: &str,
    gas_limit: u64,
    to: &str,
    value_wei: &str,
    data: &[u8],
    chain_id: u64,
) -> Result<String, ChainError> {
    let gas_price = BigUint::from_str(gas_price_wei)
        .map_err(|_| ChainError::InvalidData(format!("invalid gas price: {gas_price_wei}")))?;
    let value = BigUint::from_str(value_wei)
        .map_err(|_| ChainError::InvalidData(format!("invalid value: {value_wei}")))?;
    let to_bytes = decode_address(to)?;

    let items = vec![
        rlp::encode_uint(&BigUint::from(nonce)),
        rlp::encode_uint(&gas_price),
        rlp::encode_uint(&BigUint::from(gas_limit)),
        rlp::encode_bytes(&to_bytes),
        rlp::encode_uint(&value),
        rlp::encode_bytes(data),
        rlp::encode_uint(&BigUint::from(chain_id)),
        rlp::encode_uint(&BigUint::from(0u32)),
        rlp::encode_uint(&BigUint::from(0u32)),
    ];
    let encoded = rlp::encode_list(&items);
    Ok(format!("0x{}", hex::encode(&encoded)))
}

/// Bumps a wei-denominated gas price by 15%, the replacement-underpriced
/// retry rule (§4.10).
pub fn bump_gas_price(gas_price_wei: &str) -> Result<String, ChainError> {
    let price = BigUint::from_str(gas_price_wei)
        .map_err(|_| ChainError::InvalidData(format!("invalid gas price: {gas_price_wei}")))?;
    let bumped = (price * 115u32) / 100u32;
    Ok(bumped.to_string())
}

#[cfg(test)]
mod tx_tests {
    use super::*;

    #[test]
    fn bump_gas_price_adds_fifteen_percent() {
        assert_eq!(bump_gas_price("1000000000").unwrap(), "1150000000");
    }

    #[test]
    fn erc20_calldata_has_selector_and_32_byte_words() {
        let calldata =
            erc20_transfer_calldata("0x0000000000000000000000000000000000000001", "1000")
                .unwrap();
        assert_eq!(&calldata[0..4], &ERC20_TRANSFER_SELECTOR);
        assert_eq!(calldata.len(), 4 + 32 + 32);
    }

    #[test]
    fn unsigned_tx_is_rlp_list_hex() {
        let hex_tx = build_unsigned_legacy_tx(
            0,
            "1",
            21000,
            "0x0000000000000000000000000000000000000001",
            "0",
            &[],
            1,
        )
        .unwrap();
        assert!(hex_tx.starts_with("0xdf"));
    }
}
