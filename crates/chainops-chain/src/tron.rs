use async_trait::async_trait;
use chainops_common::model::AssetOnChain;
use serde_json::{json, Value};
use std::time::Duration;

use crate::adapter::{ChainAdapter, RawTransfer, TxReceipt};
use crate::error::ChainError;
use crate::retry::with_retry;

pub struct TronAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retry_attempts: u32,
}

impl TronAdapter {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client builds with static config"),
            base_url: base_url.into(),
            api_key,
            max_retry_attempts: 5,
        }
    }

    async fn get_once(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            req = req.header("TRON-PRO-API-KEY", key);
        }
        let response = req.send().await.map_err(ChainError::from_transport)?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ChainError::Unauthorized(format!("tron api returned {status}")));
        }
        if !status.is_success() {
            return Err(ChainError::Network(format!("tron api returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| ChainError::InvalidData(e.to_string()))
    }

    async fn post_once(&self, path: &str, body: Value) -> Result<Value, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("TRON-PRO-API-KEY", key);
        }
        let response = req.send().await.map_err(ChainError::from_transport)?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ChainError::Unauthorized(format!("tron api returned {status}")));
        }
        if !status.is_success() {
            return Err(ChainError::Network(format!("tron api returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| ChainError::InvalidData(e.to_string()))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ChainError> {
        with_retry(self.max_retry_attempts, || self.get_once(path, query)).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ChainError> {
        with_retry(self.max_retry_attempts, || self.post_once(path, body.clone())).await
    }
}

#[async_trait]
impl ChainAdapter for TronAdapter {
    fn family_name(&self) -> &'static str {
        "tron"
    }

    async fn current_block(&self) -> Result<u64, ChainError> {
        let result = self.post("/wallet/getnowblock", json!({})).await?;
        result
            .get("block_header")
            .and_then(|h| h.get("raw_data"))
            .and_then(|r| r.get("number"))
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::InvalidData("getnowblock missing block number".into()))
    }

    async fn get_transfer_logs(
        &self,
        asset: &AssetOnChain,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, ChainError> {
        // TRC-20 deposits are read through TronGrid's TRC-20 transaction
        // history endpoint, filtered client-side to the requested block
        // window; native TRX deposits have no comparable log stream and are
        // picked up by account-level balance polling instead (§4.1, §6).
        let Some(contract) = asset.contract_address.as_ref() else {
            return Ok(Vec::new());
        };

        let result = self
            .get(
                "/v1/contracts/transfer",
                &[
                    ("contract_address", contract.clone()),
                    ("only_confirmed", "true".to_string()),
                ],
            )
            .await
            .unwrap_or(Value::Null);

        let transfers = result
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::new();
        for item in transfers {
            let block_number = item
                .get("block")
                .or_else(|| item.get("block_number"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if block_number < from_block || block_number > to_block {
                continue;
            }
            let tx_hash = item
                .get("transaction_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let from_address = item
                .get("from")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let to_address = item
                .get("to")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let amount_raw = item
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or("0")
                .to_string();

            out.push(RawTransfer {
                tx_hash,
                log_index: 0,
                from_address,
                to_address,
                amount_raw,
                block_number,
            });
        }
        Ok(out)
    }

    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, ChainError> {
        let result = self
            .post(
                "/wallet/gettransactioninfobyid",
                json!({ "value": tx_hash }),
            )
            .await?;

        if result.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return Ok(None);
        }

        let block_number = result.get("blockNumber").and_then(Value::as_u64).unwrap_or(0);
        // TRON marks reverted contract calls via `receipt.result`; absence of
        // the field (plain TRX transfers) means success (§4.1).
        let result_code = result
            .get("receipt")
            .and_then(|r| r.get("result"))
            .and_then(Value::as_str);
        let success = result_code.map(|c| c == "SUCCESS").unwrap_or(true);
        let gas_used = result
            .get("receipt")
            .and_then(|r| r.get("energy_fee"))
            .and_then(Value::as_u64)
            .map(|v| v.to_string());

        Ok(Some(TxReceipt {
            block_number,
            success,
            gas_used,
            gas_price: None,
        }))
    }

    async fn get_native_balance(&self, address: &str) -> Result<String, ChainError> {
        let result = self
            .post("/wallet/getaccount", json!({ "address": address, "visible": true }))
            .await?;
        let balance = result.get("balance").and_then(Value::as_u64).unwrap_or(0);
        Ok(balance.to_string())
    }

    async fn get_token_balance(&self, contract: &str, address: &str) -> Result<String, ChainError> {
        let result = self
            .get(
                &format!("/v1/accounts/{address}/trc20"),
                &[("contract_address", contract.to_string())],
            )
            .await?;

        let entries = result
            .get("trc20")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for entry in entries {
            if let Some(obj) = entry.as_object() {
                if let Some(value) = obj.get(contract).and_then(Value::as_str) {
                    return Ok(value.to_string());
                }
            }
        }
        Ok("0".to_string())
    }

    fn normalize_address(&self, address: &str) -> String {
        address.to_string()
    }
}
