//! Transaction codec: decoding REST payloads into [`TxRecord`]s.
//!
//! The wire format of the upstream gateway is not the pipeline's concern;
//! workers consume transactions through the [`TxCodec`] capability and
//! multiple implementations can coexist. [`JsonTxCodec`] handles the
//! gateway's JSON rendering of transactions.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{TxRecord, MEMO_MAX_CHARS};
use crate::utils::error::{IndexerError, Result};

/// Decodes raw REST payload bytes into a typed transaction record.
///
/// Implementations must be safe for concurrent use by the worker pool.
pub trait TxCodec: Send + Sync {
    /// Decodes one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Decode`] if the payload cannot be
    /// interpreted. Decode failures are not retried by callers.
    fn decode_tx(&self, raw: &[u8]) -> Result<TxRecord>;
}

fn default_messages() -> Value {
    Value::Array(Vec::new())
}

fn default_fee() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_signatures() -> Value {
    Value::Array(Vec::new())
}

/// JSON rendering of a transaction as served by the REST gateway.
#[derive(Debug, Deserialize)]
struct RestTxResponse {
    height: String,
    txhash: String,
    #[serde(default)]
    gas_wanted: Option<String>,
    #[serde(default)]
    gas_used: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    tx: Option<RestTxEnvelope>,
}

#[derive(Debug, Deserialize)]
struct RestTxEnvelope {
    #[serde(default)]
    value: RestTxBody,
}

#[derive(Debug, Deserialize)]
struct RestTxBody {
    #[serde(default = "default_messages")]
    msg: Value,
    #[serde(default = "default_fee")]
    fee: Value,
    #[serde(default = "default_signatures")]
    signatures: Value,
    #[serde(default)]
    memo: String,
}

impl Default for RestTxBody {
    fn default() -> Self {
        Self {
            msg: default_messages(),
            fee: default_fee(),
            signatures: default_signatures(),
            memo: String::new(),
        }
    }
}

fn parse_i64(field: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|e| IndexerError::Decode(format!("{field} {value:?}: {e}")))
}

/// Codec for the REST gateway's JSON transaction format.
///
/// Numeric fields arrive as decimal strings and are parsed into integers;
/// the message, fee and signature payloads are carried through opaquely.
/// Memos longer than [`MEMO_MAX_CHARS`] characters are truncated.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTxCodec;

impl TxCodec for JsonTxCodec {
    fn decode_tx(&self, raw: &[u8]) -> Result<TxRecord> {
        let response: RestTxResponse = serde_json::from_slice(raw)
            .map_err(|e| IndexerError::Decode(format!("malformed tx response: {e}")))?;

        let height = parse_i64("height", &response.height)?;
        let hash = response.txhash.to_uppercase();
        if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IndexerError::Decode(format!(
                "txhash {:?} is not 64 hex characters",
                response.txhash
            )));
        }

        let gas_wanted = match &response.gas_wanted {
            Some(raw) => parse_i64("gas_wanted", raw)?,
            None => 0,
        };
        let gas_used = match &response.gas_used {
            Some(raw) => parse_i64("gas_used", raw)?,
            None => 0,
        };

        // The worker overwrites this with the enclosing block's timestamp
        // when it assembles the dossier.
        let timestamp = match &response.timestamp {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_err(|e| IndexerError::Decode(format!("timestamp {raw:?}: {e}")))?
                .with_timezone(&Utc),
            None => DateTime::UNIX_EPOCH,
        };

        let body = response.tx.map(|envelope| envelope.value).unwrap_or_default();
        let mut memo = body.memo;
        if memo.chars().count() > MEMO_MAX_CHARS {
            memo = memo.chars().take(MEMO_MAX_CHARS).collect();
        }

        Ok(TxRecord {
            hash,
            height,
            timestamp,
            gas_wanted,
            gas_used,
            messages: body.msg,
            fee: body.fee,
            signatures: body.signatures,
            memo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

    fn sample(hash: &str) -> Vec<u8> {
        json!({
            "height": "2",
            "txhash": hash,
            "gas_wanted": "200000",
            "gas_used": "151212",
            "timestamp": "2020-03-14T10:00:00Z",
            "tx": {
                "type": "core/StdTx",
                "value": {
                    "msg": [{"type": "bank/MsgSend"}],
                    "fee": {"amount": [], "gas": "200000"},
                    "signatures": [{"signature": "sig"}],
                    "memo": "hello"
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn decodes_full_response() {
        let tx = JsonTxCodec.decode_tx(&sample(HASH)).unwrap();
        assert_eq!(tx.hash, HASH);
        assert_eq!(tx.height, 2);
        assert_eq!(tx.gas_wanted, 200_000);
        assert_eq!(tx.gas_used, 151_212);
        assert_eq!(tx.memo, "hello");
        assert!(tx.messages.is_array());
        assert!(tx.fee.is_object());
        assert!(tx.signatures.is_array());
    }

    #[test]
    fn uppercases_lowercase_hashes() {
        let tx = JsonTxCodec
            .decode_tx(&sample(&HASH.to_lowercase()))
            .unwrap();
        assert_eq!(tx.hash, HASH);
    }

    #[test]
    fn rejects_short_hashes() {
        let err = JsonTxCodec.decode_tx(&sample("ABCD")).unwrap_err();
        assert!(matches!(err, IndexerError::Decode(_)));
    }

    #[test]
    fn missing_gas_defaults_to_zero() {
        let raw = json!({"height": "7", "txhash": HASH}).to_string();
        let tx = JsonTxCodec.decode_tx(raw.as_bytes()).unwrap();
        assert_eq!(tx.gas_wanted, 0);
        assert_eq!(tx.gas_used, 0);
        assert_eq!(tx.messages, json!([]));
        assert_eq!(tx.fee, json!({}));
        assert_eq!(tx.memo, "");
    }

    #[test]
    fn truncates_long_memos() {
        let long_memo = "m".repeat(MEMO_MAX_CHARS + 50);
        let raw = json!({
            "height": "1",
            "txhash": HASH,
            "tx": {"value": {"memo": long_memo}}
        })
        .to_string();
        let tx = JsonTxCodec.decode_tx(raw.as_bytes()).unwrap();
        assert_eq!(tx.memo.chars().count(), MEMO_MAX_CHARS);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = JsonTxCodec.decode_tx(b"not json").unwrap_err();
        assert!(matches!(err, IndexerError::Decode(_)));
    }

    #[test]
    fn non_numeric_gas_is_a_decode_error() {
        let raw = json!({"height": "1", "txhash": HASH, "gas_wanted": "lots"}).to_string();
        let err = JsonTxCodec.decode_tx(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, IndexerError::Decode(_)));
    }
}
