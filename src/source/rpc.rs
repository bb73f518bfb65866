//! JSON-RPC Event Source
//!
//! Scans `Iou` logs with `eth_getLogs` in bounded block chunks, orders them
//! by `(blockNumber, transactionIndex, logIndex)`, then resolves each
//! emitting transaction's `from` with `eth_getTransactionByHash`.
//!
//! A transaction contributes at most one transfer. Two matching logs in
//! the same transaction is a malformed event, never a silent pick.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{BlockRange, EventSource, RawTransfer};
use crate::config::{validate_topic, IouConfig};
use crate::iou::address::WORD_LEN;
use crate::iou::{Address, IouError, TransferEvent};

/// Log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    pub block_number: Option<String>,
    pub transaction_hash: Option<String>,
    pub transaction_index: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

/// A log with its position and decoded recipient, sender still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLog {
    pub block_number: u64,
    pub transaction_index: u64,
    pub log_index: u64,
    pub transaction_hash: String,
    pub recipient: Address,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    from: String,
}

pub struct RpcEventSource {
    client: reqwest::Client,
    endpoint: String,
    log_block_range: u64,
    event_topic: String,
    request_id: AtomicU64,
}

impl RpcEventSource {
    pub fn new(
        endpoint: impl Into<String>,
        log_block_range: u64,
        event_topic: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, IouError> {
        if log_block_range == 0 {
            return Err(IouError::InvalidConfig(
                "log_block_range must be positive".to_string(),
            ));
        }
        let event_topic = event_topic.into().trim().to_lowercase();
        validate_topic(&event_topic)?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IouError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            log_block_range,
            event_topic,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(config: &IouConfig) -> Result<Self, IouError> {
        Self::new(
            config.rpc_endpoint.clone(),
            config.log_block_range,
            config.event_topic.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    /// Issue one JSON-RPC call and return its `result`.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, IouError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });

        let response: JsonRpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(IouError::retrieval(format!("{} RPC error: {}", method, err)));
        }

        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    async fn get_logs(
        &self,
        contract: &Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RpcLog>, IouError> {
        let filter = serde_json::json!({
            "address": contract.to_string(),
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
            "topics": [self.event_topic],
        });

        let result = self.call("eth_getLogs", serde_json::json!([filter])).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(result)
            .map_err(|e| IouError::retrieval(format!("unexpected eth_getLogs payload: {}", e)))
    }

    /// Originating account of a transaction.
    pub async fn transaction_sender(&self, tx_hash: &str) -> Result<Address, IouError> {
        let result = self
            .call("eth_getTransactionByHash", serde_json::json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Err(IouError::retrieval(format!("transaction {} not found", tx_hash)));
        }

        let tx: RpcTransaction = serde_json::from_value(result)
            .map_err(|e| IouError::malformed(tx_hash, format!("bad transaction object: {}", e)))?;
        tx.from
            .parse()
            .map_err(|e: IouError| IouError::malformed(tx_hash, e.to_string()))
    }

    /// Nodes may ignore the topic filter, so topic0 is checked again here.
    fn matches_topic(&self, log: &RpcLog) -> bool {
        log.topics
            .first()
            .map(|t0| t0.to_lowercase() == self.event_topic)
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl EventSource for RpcEventSource {
    async fn latest_block(&self) -> Result<u64, IouError> {
        let result = self.call("eth_blockNumber", serde_json::json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| IouError::retrieval("eth_blockNumber returned no quantity"))?;
        parse_quantity(hex).map_err(IouError::Retrieval)
    }

    async fn fetch_transfers(
        &self,
        contract: &Address,
        range: BlockRange,
    ) -> Result<Vec<RawTransfer>, IouError> {
        let started = Instant::now();
        let latest = if range.needs_head() {
            self.latest_block().await?
        } else {
            0
        };
        let Some((start_block, end_block)) = range.resolve(latest)? else {
            debug!(%range, latest, "range starts past head");
            return Ok(Vec::new());
        };

        info!(
            contract = %contract,
            start_block,
            end_block,
            "Scanning logs for Iou events"
        );

        let mut logs = Vec::new();
        let mut current_block = start_block;
        loop {
            let to_block = current_block
                .saturating_add(self.log_block_range - 1)
                .min(end_block);

            let chunk = self.get_logs(contract, current_block, to_block).await?;
            debug!(from = current_block, to = to_block, logs = chunk.len(), "fetched log chunk");
            logs.extend(chunk);

            if to_block >= end_block {
                break;
            }
            current_block = to_block + 1;
        }

        let matching: Vec<RpcLog> = logs
            .into_iter()
            .filter(|log| {
                if log.removed {
                    warn!(tx = ?log.transaction_hash, "skipping removed log");
                    return false;
                }
                self.matches_topic(log)
            })
            .collect();

        let decoded = decode_logs(&matching)?;

        let mut senders: HashMap<String, Address> = HashMap::new();
        let mut transfers = Vec::with_capacity(decoded.len());
        for log in decoded {
            let sender = match senders.get(&log.transaction_hash) {
                Some(sender) => *sender,
                None => {
                    let sender = self.transaction_sender(&log.transaction_hash).await?;
                    senders.insert(log.transaction_hash.clone(), sender);
                    sender
                }
            };
            transfers.push(RawTransfer {
                event: TransferEvent::new(sender, log.recipient),
                block_number: log.block_number,
                transaction_index: log.transaction_index,
                log_index: log.log_index,
                transaction_hash: log.transaction_hash,
            });
        }

        info!(
            transfers = transfers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Decoded Iou transfers"
        );
        Ok(transfers)
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode and order matching logs, enforcing one log per transaction.
pub fn decode_logs(logs: &[RpcLog]) -> Result<Vec<DecodedLog>, IouError> {
    let mut decoded = logs
        .iter()
        .map(decode_log)
        .collect::<Result<Vec<_>, _>>()?;
    decoded.sort_by_key(|d| (d.block_number, d.transaction_index, d.log_index));

    let mut seen: HashMap<&str, u64> = HashMap::new();
    for log in &decoded {
        if let Some(first) = seen.insert(log.transaction_hash.as_str(), log.log_index) {
            return Err(IouError::malformed(
                log.transaction_hash.clone(),
                format!(
                    "multiple matching logs (log indices {} and {})",
                    first, log.log_index
                ),
            ));
        }
    }

    Ok(decoded)
}

/// Position and recipient of a single log entry.
pub fn decode_log(log: &RpcLog) -> Result<DecodedLog, IouError> {
    let tx_hash = log
        .transaction_hash
        .clone()
        .ok_or_else(|| IouError::malformed("<pending>", "log has no transaction hash"))?;

    let field = |value: &Option<String>, name: &str| -> Result<u64, IouError> {
        let hex = value
            .as_deref()
            .ok_or_else(|| IouError::malformed(&tx_hash, format!("log has no {}", name)))?;
        parse_quantity(hex).map_err(|e| IouError::malformed(&tx_hash, e))
    };

    let block_number = field(&log.block_number, "blockNumber")?;
    let transaction_index = field(&log.transaction_index, "transactionIndex")?;
    let log_index = field(&log.log_index, "logIndex")?;
    let recipient = decode_recipient(log).map_err(|e| IouError::malformed(&tx_hash, e))?;

    Ok(DecodedLog {
        block_number,
        transaction_index,
        log_index,
        transaction_hash: tx_hash,
        recipient,
    })
}

/// `_to` from `topics[1]` when indexed, otherwise the first data word.
pub fn decode_recipient(log: &RpcLog) -> Result<Address, String> {
    if let Some(topic) = log.topics.get(1) {
        let word = decode_hex(topic)?;
        return Address::from_word(&word).map_err(|e| e.to_string());
    }

    let data = decode_hex(&log.data)?;
    if data.len() < WORD_LEN {
        return Err(format!(
            "no recipient: {} topics and {} data bytes",
            log.topics.len(),
            data.len()
        ));
    }
    Address::from_word(&data[..WORD_LEN]).map_err(|e| e.to_string())
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| format!("bad hex '{}': {}", s, e))
}

/// Parse a `0x`-prefixed JSON-RPC quantity.
pub fn parse_quantity(s: &str) -> Result<u64, String> {
    let digits = s.trim_start_matches("0x");
    if digits.is_empty() {
        return Err(format!("empty quantity '{}'", s));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("bad quantity '{}': {}", s, e))
}
