//! Gateway pull-surface tests against a mocked node RPC and REST gateway.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tendermint_indexer::{tx_hash, ChainGateway, IndexerError, JsonTxCodec, NodeGateway};

fn gateway(server: &MockServer) -> NodeGateway {
    NodeGateway::new(&server.uri(), &server.uri(), Arc::new(JsonTxCodec)).unwrap()
}

#[tokio::test]
async fn latest_height_reads_sync_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "node_info": {"network": "testchain"},
                "sync_info": {"latest_block_height": "42", "catching_up": false}
            }
        })))
        .mount(&server)
        .await;

    assert_eq!(gateway(&server).latest_height().await.unwrap(), 42);
}

#[tokio::test]
async fn block_decodes_header_and_txs() {
    let raw_tx = b"some-transaction-bytes".to_vec();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/block"))
        .and(query_param("height", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "block_id": {"hash": "00aa00aa00aa00aa00aa00aa00aa00aa00aa00aa00aa00aa00aa00aa00aa00aa"},
                "block": {
                    "header": {
                        "height": "2",
                        "time": "2020-03-14T10:00:00Z",
                        "proposer_address": "B00A00"
                    },
                    "data": {"txs": [base64::encode(&raw_tx)]}
                }
            }
        })))
        .mount(&server)
        .await;

    let block = gateway(&server).block(2).await.unwrap();
    assert_eq!(block.height, 2);
    assert_eq!(block.proposer, "B00A00");
    assert_eq!(block.hash, block.hash.to_uppercase());
    assert_eq!(block.txs, vec![raw_tx.clone()]);
    assert_eq!(tx_hash(&block.txs[0]), tx_hash(&raw_tx));
}

#[tokio::test]
async fn block_without_txs_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/block"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "block_id": {"hash": "AB"},
                "block": {
                    "header": {
                        "height": "1",
                        "time": "2020-03-14T10:00:00Z",
                        "proposer_address": "B00A00"
                    },
                    "data": {"txs": null}
                }
            }
        })))
        .mount(&server)
        .await;

    let block = gateway(&server).block(1).await.unwrap();
    assert!(block.txs.is_empty());
}

#[tokio::test]
async fn validators_preserve_node_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/validators"))
        .and(query_param("height", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": -1,
            "result": {
                "block_height": "5",
                "validators": [
                    {"address": "CCC", "voting_power": "30", "proposer_priority": "0"},
                    {"address": "AAA", "voting_power": "10", "proposer_priority": "0"},
                    {"address": "BBB", "voting_power": "20", "proposer_priority": "0"}
                ]
            }
        })))
        .mount(&server)
        .await;

    let validators = gateway(&server).validators(5).await.unwrap();
    let addresses: Vec<_> = validators.iter().map(|v| v.address.as_str()).collect();
    assert_eq!(addresses, vec!["CCC", "AAA", "BBB"]);
    assert_eq!(validators[0].voting_power, 30);
}

#[tokio::test]
async fn rpc_error_body_surfaces_as_rpc_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/block"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": -1,
            "error": {
                "code": -32603,
                "message": "Internal error",
                "data": "height 99 is not available"
            }
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).block(99).await.unwrap_err();
    match err {
        IndexerError::Rpc(message) => {
            assert!(message.contains("Internal error"));
            assert!(message.contains("height 99 is not available"));
        }
        other => panic!("expected rpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn tx_by_hash_decodes_through_the_codec() {
    let hash = "A".repeat(64);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/txs/{hash}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "height": "2",
            "txhash": hash,
            "gas_wanted": "200000",
            "gas_used": "151212",
            "timestamp": "2020-03-14T10:00:00Z",
            "tx": {"value": {"msg": [], "fee": {}, "signatures": [], "memo": "hi"}}
        })))
        .mount(&server)
        .await;

    let tx = gateway(&server).tx_by_hash(&hash).await.unwrap();
    assert_eq!(tx.hash, hash);
    assert_eq!(tx.height, 2);
    assert_eq!(tx.memo, "hi");
}

#[tokio::test]
async fn rest_503_is_a_transient_rpc_error() {
    let hash = "B".repeat(64);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/txs/{hash}")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway(&server).tx_by_hash(&hash).await.unwrap_err();
    assert!(matches!(err, IndexerError::Rpc(_)));
}

#[tokio::test]
async fn unparseable_tx_body_is_a_decode_error() {
    let hash = "C".repeat(64);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/txs/{hash}")))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway error</html>"))
        .mount(&server)
        .await;

    let err = gateway(&server).tx_by_hash(&hash).await.unwrap_err();
    match err {
        IndexerError::Decode(message) => assert!(message.contains(&hash)),
        other => panic!("expected decode error, got {other:?}"),
    }
}
