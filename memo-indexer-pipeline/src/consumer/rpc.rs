use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::BlockHash;
use bitcoin::consensus::Decodable;
use chrono::{DateTime, Utc};
use memo_indexer_shared::types::{
    Block, LedgerBlock, LedgerTransaction, LocatedTransaction, TxHash,
};
use reqwest::Client as ReqwestClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

use crate::consumer::LedgerSource;
use crate::errors::ConsumerError;

/// `RPC_INVALID_ADDRESS_OR_KEY`: unknown transaction or block.
const RPC_NOT_FOUND: i64 = -5;
/// `RPC_INVALID_PARAMETER`: block height out of range.
const RPC_OUT_OF_RANGE: i64 = -8;
const MAX_RETRIES: usize = 3;

/// Connection settings for a Bitcoin Core node.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct VerboseTransaction {
    hex: String,
    blockhash: Option<String>,
}

#[derive(Deserialize)]
struct BlockHeaderInfo {
    hash: String,
    height: u64,
    time: i64,
}

/// Ledger client speaking the Bitcoin Core JSON-RPC interface.
///
/// Point lookups of confirmed transactions need a node running with
/// `-txindex`. Transport failures are retried with exponential backoff; errors
/// reported by the node are not.
pub struct BitcoinRpcLedger {
    url: String,
    client: ReqwestClient,
    auth: Option<(String, Option<String>)>,
    next_id: AtomicU64,
}

impl BitcoinRpcLedger {
    pub fn new(config: RpcConfig) -> Result<Self, ConsumerError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConsumerError::Http(e.to_string()))?;
        Ok(Self {
            url: config.url,
            client,
            auth: config.user.map(|user| (user, config.password)),
            next_id: AtomicU64::new(0),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ConsumerError> {
        let retry = ExponentialBackoff::from_millis(10)
            .factor(2)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(MAX_RETRIES);

        RetryIf::spawn(
            retry,
            || self.call_once(method, &params),
            |error: &ConsumerError| {
                let transient = error.is_transient();
                if transient {
                    warn!(method, error = %error, "Retrying RPC call");
                }
                transient
            },
        )
        .await
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
    ) -> Result<T, ConsumerError> {
        let body = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConsumerError::Http(e.to_string()))?;
        // The node answers RPC errors with a non-2xx status and a JSON body.
        let status = response.status();
        let response: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ConsumerError::InvalidResponse(format!("{method} ({status}): {e}")))?;

        if let Some(error) = response.error {
            return Err(ConsumerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| ConsumerError::InvalidResponse(format!("{method} returned no result")))
    }

    async fn raw_transaction(&self, txid: &str) -> Result<bitcoin::Transaction, ConsumerError> {
        let hex: String = self
            .call("getrawtransaction", json!([txid, false]))
            .await?;
        decode_hex(&hex)
    }

    async fn block_header(&self, hash: &str) -> Result<Block, ConsumerError> {
        let header: BlockHeaderInfo = self.call("getblockheader", json!([hash, true])).await?;
        Ok(Block {
            height: header.height,
            hash: parse_block_hash(&header.hash)?,
            timestamp: DateTime::<Utc>::from_timestamp(header.time, 0).unwrap_or_default(),
        })
    }
}

fn decode_hex<T: Decodable>(hex: &str) -> Result<T, ConsumerError> {
    let bytes = hex::decode(hex).map_err(|e| ConsumerError::Decoding(e.to_string()))?;
    bitcoin::consensus::deserialize(&bytes).map_err(|e| ConsumerError::Decoding(e.to_string()))
}

fn parse_block_hash(hash: &str) -> Result<BlockHash, ConsumerError> {
    BlockHash::from_str(hash).map_err(|e| ConsumerError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl LedgerSource for BitcoinRpcLedger {
    async fn tip_height(&self) -> Result<u64, ConsumerError> {
        self.call("getblockcount", json!([])).await
    }

    async fn block_hash_at(&self, height: u64) -> Result<Option<BlockHash>, ConsumerError> {
        match self.call::<String>("getblockhash", json!([height])).await {
            Ok(hash) => parse_block_hash(&hash).map(Some),
            Err(ConsumerError::Rpc {
                code: RPC_OUT_OF_RANGE,
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn block_at(&self, height: u64) -> Result<LedgerBlock, ConsumerError> {
        let hash = self
            .block_hash_at(height)
            .await?
            .ok_or(ConsumerError::BlockNotFound(height))?;
        let hex: String = self
            .call("getblock", json!([hash.to_string(), 0]))
            .await?;
        let block: bitcoin::Block = decode_hex(&hex)?;
        Ok(LedgerBlock::from_bitcoin(height, &block))
    }

    async fn unconfirmed_transactions(&self) -> Result<Vec<LedgerTransaction>, ConsumerError> {
        let txids: Vec<String> = self.call("getrawmempool", json!([])).await?;
        let mut transactions = Vec::with_capacity(txids.len());
        for txid in &txids {
            match self.raw_transaction(txid).await {
                Ok(tx) => transactions.push(LedgerTransaction::from(&tx)),
                // Mined or evicted since the pool listing.
                Err(ConsumerError::Rpc {
                    code: RPC_NOT_FOUND,
                    ..
                }) => debug!(tx_hash = %txid, "Unconfirmed transaction left the pool"),
                Err(e) => return Err(e),
            }
        }
        Ok(transactions)
    }

    async fn transaction(
        &self,
        hash: &TxHash,
    ) -> Result<Option<LocatedTransaction>, ConsumerError> {
        let verbose: VerboseTransaction = match self
            .call("getrawtransaction", json!([hash.to_string(), true]))
            .await
        {
            Ok(verbose) => verbose,
            Err(ConsumerError::Rpc {
                code: RPC_NOT_FOUND,
                ..
            }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let tx: bitcoin::Transaction = decode_hex(&verbose.hex)?;
        let block = match verbose.blockhash {
            Some(block_hash) => Some(self.block_header(&block_hash).await?),
            None => None,
        };
        Ok(Some(LocatedTransaction {
            transaction: LedgerTransaction::from(&tx),
            block,
        }))
    }
}
