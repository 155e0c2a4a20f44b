use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context};
use reqwest::blocking::Client as HttpClient;
use reshape_contracts::mint::ChainCall;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::http::{build_client, read_body, truncate_text};

/// EIP-1193 code for a request the user declined.
const USER_REJECTED_CODE: i64 = 4001;
const DRYRUN_ADDRESS: &str = "0x5a9e00000000000000000000000000000000beef";

/// Quantity fields the node expects as `0x` hex strings.
const QUANTITY_FIELDS: &[&str] = &[
    "value",
    "gas",
    "gasPrice",
    "maxFeePerGas",
    "maxPriorityFeePerGas",
    "nonce",
    "chainId",
];

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("wallet is not connected")]
    NotConnected,
    #[error("wallet exposes no accounts")]
    NoAccount,
    #[error("account {0} is not available in the wallet")]
    UnknownAccount(String),
    #[error("User rejected the request")]
    Rejected,
    #[error("wallet error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected wallet response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Signs and submits chain calls for the connected account.
pub trait Wallet: Send {
    fn name(&self) -> &str;
    /// `preferred` picks an account; otherwise the wallet's default is used.
    fn connect(&mut self, preferred: Option<&str>) -> Result<String, WalletError>;
    fn disconnect(&mut self);
    fn address(&self) -> Option<&str>;
    fn send_transaction(&self, call: &ChainCall) -> Result<String, WalletError>;
}

/// A node or signer proxy holding an unlocked account, spoken to over JSON-RPC.
pub struct JsonRpcWallet {
    url: String,
    http: HttpClient,
    preferred: Option<String>,
    chain_id: Option<u64>,
    address: Option<String>,
    next_id: AtomicU64,
}

impl JsonRpcWallet {
    pub fn new(
        url: impl Into<String>,
        preferred: Option<String>,
        chain_id: Option<u64>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            url: url.into(),
            http: build_client()?,
            preferred,
            chain_id,
            address: None,
            next_id: AtomicU64::new(1),
        })
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::debug!(method, id, "wallet rpc request");
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .with_context(|| format!("wallet request failed ({})", self.url))?;
        let (code, ok, body) = read_body("wallet", response)?;
        if !ok {
            return Err(anyhow!(
                "wallet endpoint returned {code}: {}",
                truncate_text(body.trim(), 512)
            )
            .into());
        }
        decode_rpc_response(&body)
    }
}

impl Wallet for JsonRpcWallet {
    fn name(&self) -> &str {
        "rpc"
    }

    fn connect(&mut self, preferred: Option<&str>) -> Result<String, WalletError> {
        let accounts = self.call("eth_accounts", json!([]))?;
        let accounts: Vec<String> = accounts
            .as_array()
            .ok_or_else(|| WalletError::Malformed("eth_accounts did not return a list".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        let address = choose_account(&accounts, preferred.or(self.preferred.as_deref()))?;
        self.address = Some(address.clone());
        Ok(address)
    }

    fn disconnect(&mut self) {
        self.address = None;
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn send_transaction(&self, call: &ChainCall) -> Result<String, WalletError> {
        let from = self.address.as_deref().ok_or(WalletError::NotConnected)?;
        let params = build_transaction_params(from, call, self.chain_id);
        let result = self.call("eth_sendTransaction", json!([params]))?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WalletError::Malformed(format!("expected a hash, got {result}")))
    }
}

fn choose_account(accounts: &[String], preferred: Option<&str>) -> Result<String, WalletError> {
    match preferred {
        Some(preferred) => accounts
            .iter()
            .find(|account| account.eq_ignore_ascii_case(preferred))
            .cloned()
            .ok_or_else(|| WalletError::UnknownAccount(preferred.to_string())),
        None => accounts.first().cloned().ok_or(WalletError::NoAccount),
    }
}

/// `eth_sendTransaction` parameter object: the prepared call, `from`, and hex quantities.
pub fn build_transaction_params(from: &str, call: &ChainCall, chain_id: Option<u64>) -> Value {
    let mut params = match serde_json::to_value(call) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    params.insert("from".to_string(), Value::String(from.to_string()));
    if let Some(chain_id) = chain_id {
        params
            .entry("chainId")
            .or_insert_with(|| Value::from(chain_id));
    }
    for key in QUANTITY_FIELDS {
        if let Some(hex) = params.get(*key).and_then(quantity_hex) {
            params.insert((*key).to_string(), Value::String(hex));
        }
    }
    Value::Object(params)
}

fn quantity_hex(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => number.as_u64().map(|n| format!("0x{n:x}")),
        Value::String(text) if text.starts_with("0x") => None,
        Value::String(text) => text.trim().parse::<u128>().ok().map(|n| format!("0x{n:x}")),
        _ => None,
    }
}

pub fn decode_rpc_response(body: &str) -> Result<Value, WalletError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|err| WalletError::Malformed(format!("invalid JSON-RPC body: {err}")))?;
    if let Some(error) = parsed.get("error").filter(|error| !error.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        if code == USER_REJECTED_CODE {
            return Err(WalletError::Rejected);
        }
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(WalletError::Rpc { code, message });
    }
    parsed
        .get("result")
        .cloned()
        .ok_or_else(|| WalletError::Malformed("response has neither result nor error".into()))
}

/// Offline wallet. Hashes are derived from the call so reruns are reproducible.
pub struct DryrunWallet {
    account: String,
    address: Option<String>,
}

impl DryrunWallet {
    pub fn new(account: Option<String>) -> Self {
        Self {
            account: account.unwrap_or_else(|| DRYRUN_ADDRESS.to_string()),
            address: None,
        }
    }
}

impl Wallet for DryrunWallet {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn connect(&mut self, preferred: Option<&str>) -> Result<String, WalletError> {
        let address = preferred.unwrap_or(&self.account).to_string();
        self.address = Some(address.clone());
        Ok(address)
    }

    fn disconnect(&mut self) {
        self.address = None;
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn send_transaction(&self, call: &ChainCall) -> Result<String, WalletError> {
        let from = self.address.as_deref().ok_or(WalletError::NotConnected)?;
        let params = build_transaction_params(from, call, None);
        let digest = Sha256::digest(params.to_string().as_bytes());
        Ok(format!("0x{}", hex::encode(digest)))
    }
}

/// `0x1234…abcd` form for display.
pub fn abbreviate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(value: Value) -> anyhow::Result<ChainCall> {
        Ok(serde_json::from_value(value)?)
    }

    #[test]
    fn params_add_sender_and_hex_quantities() -> anyhow::Result<()> {
        let prepared = call(json!({
            "to": "0xcontract",
            "data": "0xdeadbeef",
            "value": "0",
            "gas": 210000,
        }))?;
        let params = build_transaction_params("0xabc", &prepared, Some(11011));
        assert_eq!(
            params,
            json!({
                "to": "0xcontract",
                "data": "0xdeadbeef",
                "value": "0x0",
                "gas": "0x33450",
                "from": "0xabc",
                "chainId": "0x2b03",
            })
        );
        Ok(())
    }

    #[test]
    fn params_keep_prepared_chain_id() -> anyhow::Result<()> {
        let prepared = call(json!({"to": "0xc", "chainId": "0xaa36a7"}))?;
        let params = build_transaction_params("0xabc", &prepared, Some(1));
        assert_eq!(params["chainId"], "0xaa36a7");
        Ok(())
    }

    #[test]
    fn decodes_rpc_results_and_errors() {
        assert_eq!(
            decode_rpc_response(r#"{"jsonrpc":"2.0","id":1,"result":"0xabc"}"#).ok(),
            Some(json!("0xabc"))
        );
        assert!(matches!(
            decode_rpc_response(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":4001,"message":"User denied"}}"#
            ),
            Err(WalletError::Rejected)
        ));
        assert!(matches!(
            decode_rpc_response(
                r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"insufficient funds"}}"#
            ),
            Err(WalletError::Rpc { code: -32000, .. })
        ));
        assert!(matches!(
            decode_rpc_response("not json"),
            Err(WalletError::Malformed(_))
        ));
    }

    #[test]
    fn chooses_preferred_or_first_account() {
        let accounts = vec!["0xAAA".to_string(), "0xbbb".to_string()];
        assert_eq!(choose_account(&accounts, None).ok().as_deref(), Some("0xAAA"));
        assert_eq!(
            choose_account(&accounts, Some("0xBBB")).ok().as_deref(),
            Some("0xbbb")
        );
        assert!(matches!(
            choose_account(&accounts, Some("0xccc")),
            Err(WalletError::UnknownAccount(_))
        ));
        assert!(matches!(choose_account(&[], None), Err(WalletError::NoAccount)));
    }

    #[test]
    fn dryrun_wallet_requires_connection_and_is_deterministic() -> anyhow::Result<()> {
        let prepared = call(json!({"to": "0xc", "data": "0x01"}))?;
        let mut wallet = DryrunWallet::new(None);
        assert!(matches!(
            wallet.send_transaction(&prepared),
            Err(WalletError::NotConnected)
        ));

        let address = wallet.connect(None)?;
        assert_eq!(wallet.address(), Some(address.as_str()));
        let first = wallet.send_transaction(&prepared)?;
        let second = wallet.send_transaction(&prepared)?;
        assert_eq!(first, second);
        assert!(first.starts_with("0x"));
        assert_eq!(first.len(), 66);

        wallet.disconnect();
        assert_eq!(wallet.address(), None);
        assert_eq!(wallet.connect(Some("0xfeed"))?, "0xfeed");
        Ok(())
    }

    #[test]
    fn abbreviates_long_addresses() {
        assert_eq!(
            abbreviate_address("0x1234567890abcdef1234567890abcdef1234abcd"),
            "0x1234…abcd"
        );
        assert_eq!(abbreviate_address("0xabc"), "0xabc");
    }
}
