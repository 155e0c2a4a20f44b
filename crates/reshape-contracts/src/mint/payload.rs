use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// MCP tool that prepares an unsigned mint transaction.
pub const MINT_TOOL_NAME: &str = "prepareMintSVGNFT";
/// Contract function a prepared transaction must target.
pub const MINT_FUNCTION_NAME: &str = "mintNFT";

const DEFAULT_NFT_NAME: &str = "AI Generated NFT";
const DEFAULT_NFT_DESCRIPTION: &str = "Unique AI-generated artwork";

/// Chain call descriptor handed to the wallet as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintMetadata {
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub nft_metadata: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub success: bool,
    pub transaction: ChainCall,
    pub metadata: MintMetadata,
}

impl PendingTransaction {
    pub fn nft_name(&self) -> &str {
        self.nft_field("name").unwrap_or(DEFAULT_NFT_NAME)
    }

    pub fn nft_description(&self) -> &str {
        self.nft_field("description")
            .unwrap_or(DEFAULT_NFT_DESCRIPTION)
    }

    pub fn recipient(&self) -> Option<&str> {
        self.metadata.extra.get("recipient").and_then(Value::as_str)
    }

    fn nft_field(&self, key: &str) -> Option<&str> {
        self.metadata
            .nft_metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_mcp_payload_and_keeps_unknown_fields() -> anyhow::Result<()> {
        let pending: PendingTransaction = serde_json::from_value(json!({
            "success": true,
            "transaction": {
                "to": "0x00000000000000000000000000000000000000aa",
                "data": "0xdeadbeef",
                "value": "0x0",
                "chainId": 11011
            },
            "metadata": {
                "functionName": "mintNFT",
                "recipient": "0x00000000000000000000000000000000000000bb",
                "nftMetadata": {"name": "Red Circle", "description": ""}
            }
        }))?;
        assert_eq!(pending.metadata.function_name, MINT_FUNCTION_NAME);
        assert_eq!(pending.transaction.extra["chainId"], json!(11011));
        assert_eq!(pending.nft_name(), "Red Circle");
        assert_eq!(pending.nft_description(), "Unique AI-generated artwork");
        assert_eq!(
            pending.recipient(),
            Some("0x00000000000000000000000000000000000000bb")
        );

        let round = serde_json::to_value(&pending)?;
        assert_eq!(round["metadata"]["functionName"], json!("mintNFT"));
        assert_eq!(round["transaction"]["chainId"], json!(11011));
        Ok(())
    }

    #[test]
    fn missing_nft_metadata_uses_defaults() -> anyhow::Result<()> {
        let pending: PendingTransaction = serde_json::from_value(json!({
            "success": true,
            "transaction": {"to": "0x1"},
            "metadata": {"functionName": "mintNFT"}
        }))?;
        assert_eq!(pending.nft_name(), "AI Generated NFT");
        assert!(pending.recipient().is_none());
        Ok(())
    }
}
