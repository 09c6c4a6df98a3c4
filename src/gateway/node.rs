//! Production gateway implementation over HTTP JSON-RPC and WebSocket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{BlockInfo, ChainEvent, ChainGateway, Subscription};
use crate::codec::TxCodec;
use crate::types::{TxRecord, ValidatorRecord};
use crate::utils::error::{IndexerError, Result};

/// Hard deadline on the subscribe handshake. The stream itself has no
/// deadline.
pub const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline applied to every RPC/REST pull so shutdown stays bounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway over a node RPC base and a REST gateway base.
///
/// Pull queries go over one shared HTTP client; each subscription opens a
/// dedicated WebSocket connection whose reader task forwards events into
/// the subscription's channel. [`NodeGateway::stop`] tears down every live
/// subscription.
pub struct NodeGateway {
    rpc_base: String,
    rest_base: String,
    http: reqwest::Client,
    codec: Arc<dyn TxCodec>,
    stop_token: CancellationToken,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::Deserialize<'de>"))]
struct RpcResponse<T> {
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    block_id: BlockId,
    block: RawBlock,
}

#[derive(Debug, Deserialize)]
struct BlockId {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    header: RawHeader,
    data: RawBlockData,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    height: String,
    time: String,
    proposer_address: String,
}

#[derive(Debug, Deserialize)]
struct RawBlockData {
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ValidatorsResult {
    validators: Vec<RawValidator>,
}

#[derive(Debug, Deserialize)]
struct RawValidator {
    address: String,
    voting_power: String,
}

#[derive(Debug, Deserialize)]
struct WsMessage {
    #[serde(default)]
    result: Option<WsResult>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WsResult {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

fn parse_height(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|e| IndexerError::Decode(format!("block height {raw:?}: {e}")))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| IndexerError::Decode(format!("block time {raw:?}: {e}")))
}

/// Maps the RPC base URL onto the node's WebSocket endpoint.
fn websocket_url(rpc_base: &str) -> Result<String> {
    let base = if let Some(rest) = rpc_base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = rpc_base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if rpc_base.starts_with("ws://") || rpc_base.starts_with("wss://") {
        rpc_base.to_string()
    } else {
        return Err(IndexerError::Subscription(format!(
            "cannot derive websocket endpoint from {rpc_base:?}"
        )));
    };
    Ok(format!("{}/websocket", base.trim_end_matches('/')))
}

impl NodeGateway {
    /// Creates a gateway from the node RPC base and the REST base.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Rpc`] if the HTTP client cannot be built.
    pub fn new(rpc_node: &str, client_node: &str, codec: Arc<dyn TxCodec>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IndexerError::Rpc(format!("failed to build http client: {e}")))?;

        Ok(Self {
            rpc_base: rpc_node.trim_end_matches('/').to_string(),
            rest_base: client_node.trim_end_matches('/').to_string(),
            http,
            codec,
            stop_token: CancellationToken::new(),
        })
    }

    async fn rpc_get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.rpc_base);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::Rpc(format!("{url}: HTTP {status}")));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| IndexerError::Rpc(format!("{url}: {e}")))?;

        if let Some(err) = body.error {
            let detail = err.data.unwrap_or_default();
            return Err(IndexerError::Rpc(format!(
                "{url}: {} (code {}) {detail}",
                err.message, err.code
            )));
        }
        body.result
            .ok_or_else(|| IndexerError::Rpc(format!("{url}: empty result")))
    }

    async fn rest_get(&self, endpoint: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{endpoint}", self.rest_base);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::Rpc(format!("{url}: HTTP {status}")));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Queries the REST gateway at `endpoint` and deserializes the JSON
    /// response into `T`.
    ///
    /// # Errors
    ///
    /// Transport failures surface as [`IndexerError::Rpc`]; a response
    /// that does not deserialize surfaces as [`IndexerError::Decode`] so
    /// callers can fail fast instead of retrying.
    pub async fn query_rest<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let raw = self.rest_get(endpoint).await?;
        serde_json::from_slice(&raw)
            .map_err(|e| IndexerError::Decode(format!("{endpoint}: {e}")))
    }

    /// Opens a WebSocket subscription: connect, subscribe, wait for the
    /// node's confirmation, then hand the stream to a reader task.
    async fn subscribe(&self, subscriber: &str, query: &str) -> Result<Subscription> {
        let ws_url = websocket_url(&self.rpc_base)?;

        let handshake = async {
            let (stream, _) = connect_async(ws_url.as_str())
                .await
                .map_err(|e| IndexerError::Subscription(format!("{ws_url}: {e}")))?;
            let (mut write, mut read) = stream.split();

            let request = json!({
                "jsonrpc": "2.0",
                "method": "subscribe",
                "id": subscriber,
                "params": {"query": query},
            });
            write
                .send(Message::Text(request.to_string()))
                .await
                .map_err(|e| {
                    IndexerError::Subscription(format!("failed to send subscribe: {e}"))
                })?;

            // The node acknowledges with an empty result before any event.
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let message: WsMessage = serde_json::from_str(&text).map_err(|e| {
                            IndexerError::Subscription(format!("malformed subscribe ack: {e}"))
                        })?;
                        if let Some(err) = message.error {
                            return Err(IndexerError::Subscription(format!(
                                "subscribe rejected: {err}"
                            )));
                        }
                        if message.result.is_some() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(IndexerError::Subscription(format!("{ws_url}: {e}")));
                    }
                    None => {
                        return Err(IndexerError::Subscription(format!(
                            "{ws_url}: connection closed during handshake"
                        )));
                    }
                }
            }
            Ok((write, read))
        };

        let (mut write, mut read) = tokio::time::timeout(SUBSCRIBE_TIMEOUT, handshake)
            .await
            .map_err(|_| {
                IndexerError::Subscription(format!(
                    "subscribe handshake for {query:?} timed out"
                ))
            })??;

        let cancel = self.stop_token.child_token();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reader_token = cancel.clone();
        let fallback_query = query.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = reader_token.cancelled() => {
                        let _ = write.close().await;
                        break;
                    }
                    message = read.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(parsed) = serde_json::from_str::<WsMessage>(&text) else {
                                debug!("skipping unparseable subscription message");
                                continue;
                            };
                            let Some(result) = parsed.result else { continue };
                            let Some(data) = result.data else { continue };
                            let event = ChainEvent {
                                query: result.query.unwrap_or_else(|| fallback_query.clone()),
                                data,
                            };
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            warn!(query = %fallback_query, "subscription stream closed by node");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(query = %fallback_query, error = %e, "subscription read failed");
                            break;
                        }
                    }
                }
            }
            // Dropping events_tx closes the stream for the consumer.
        });

        debug!(subscriber, query, "subscription established");
        Ok(Subscription::new(events_rx, cancel))
    }
}

#[async_trait]
impl ChainGateway for NodeGateway {
    async fn latest_height(&self) -> Result<i64> {
        let status: StatusResult = self.rpc_get("status").await?;
        parse_height(&status.sync_info.latest_block_height)
    }

    async fn block(&self, height: i64) -> Result<BlockInfo> {
        let result: BlockResult = self.rpc_get(&format!("block?height={height}")).await?;

        let mut txs = Vec::new();
        for encoded in result.block.data.txs.unwrap_or_default() {
            let raw = base64::decode(&encoded)
                .map_err(|e| IndexerError::Decode(format!("tx bytes at height {height}: {e}")))?;
            txs.push(raw);
        }

        Ok(BlockInfo {
            height: parse_height(&result.block.header.height)?,
            timestamp: parse_time(&result.block.header.time)?,
            proposer: result.block.header.proposer_address,
            hash: result.block_id.hash.to_uppercase(),
            txs,
        })
    }

    async fn block_results(&self, height: i64) -> Result<Value> {
        self.rpc_get(&format!("block_results?height={height}")).await
    }

    async fn tx_by_hash(&self, hash: &str) -> Result<TxRecord> {
        let raw = self.rest_get(&format!("txs/{hash}")).await?;
        self.codec.decode_tx(&raw).map_err(|e| match e {
            IndexerError::Decode(msg) => IndexerError::Decode(format!("tx {hash}: {msg}")),
            other => other,
        })
    }

    async fn validators(&self, height: i64) -> Result<Vec<ValidatorRecord>> {
        let result: ValidatorsResult = self
            .rpc_get(&format!("validators?height={height}&per_page=1000000"))
            .await?;

        result
            .validators
            .into_iter()
            .map(|v| {
                let voting_power = v.voting_power.parse::<i64>().map_err(|e| {
                    IndexerError::Decode(format!("voting power {:?}: {e}", v.voting_power))
                })?;
                Ok(ValidatorRecord {
                    address: v.address,
                    voting_power,
                })
            })
            .collect()
    }

    async fn genesis(&self) -> Result<Value> {
        self.rpc_get("genesis").await
    }

    async fn subscribe_new_blocks(&self, subscriber: &str) -> Result<Subscription> {
        self.subscribe(subscriber, "tm.event = 'NewBlock'").await
    }

    async fn subscribe_events(&self, subscriber: &str, query: &str) -> Result<Subscription> {
        self.subscribe(subscriber, query).await
    }

    async fn stop(&self) {
        self.stop_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_url_maps_http_schemes() {
        assert_eq!(
            websocket_url("http://localhost:26657").unwrap(),
            "ws://localhost:26657/websocket"
        );
        assert_eq!(
            websocket_url("https://rpc.example.com/").unwrap(),
            "wss://rpc.example.com/websocket"
        );
        assert_eq!(
            websocket_url("ws://localhost:26657").unwrap(),
            "ws://localhost:26657/websocket"
        );
    }

    #[test]
    fn websocket_url_rejects_unknown_schemes() {
        assert!(websocket_url("ftp://example.com").is_err());
    }

    #[test]
    fn parse_height_rejects_garbage() {
        assert!(parse_height("abc").is_err());
        assert_eq!(parse_height("17").unwrap(), 17);
    }
}
