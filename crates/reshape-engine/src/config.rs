use std::env;

const DEFAULT_API_BASE: &str = "http://localhost:3000";
const DEFAULT_CHAT_PATH: &str = "/api/chat";
const DEFAULT_IMAGE_PATH: &str = "/api/generate-image";
const DEFAULT_UPLOAD_PATH: &str = "/api/upload";
const DEFAULT_EXPLORER_TX_BASE: &str = "https://sepolia.etherscan.io/tx/";
const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

/// Endpoint and wallet settings. Every field can come from a `RESHAPE_*`
/// environment variable; CLI flags override on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    pub api_base: String,
    pub chat_path: String,
    pub image_path: String,
    pub upload_path: String,
    pub explorer_tx_base: String,
    pub gateway_url: String,
    pub wallet_rpc_url: Option<String>,
    pub wallet_address: Option<String>,
    pub chain_id: Option<u64>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            image_path: DEFAULT_IMAGE_PATH.to_string(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            explorer_tx_base: DEFAULT_EXPLORER_TX_BASE.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            wallet_rpc_url: None,
            wallet_address: None,
            chain_id: None,
        }
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            api_base: read("RESHAPE_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            chat_path: read("RESHAPE_CHAT_PATH").unwrap_or(defaults.chat_path),
            image_path: read("RESHAPE_IMAGE_PATH").unwrap_or(defaults.image_path),
            upload_path: read("RESHAPE_UPLOAD_PATH").unwrap_or(defaults.upload_path),
            explorer_tx_base: read("RESHAPE_EXPLORER_TX_BASE")
                .unwrap_or(defaults.explorer_tx_base),
            gateway_url: read("RESHAPE_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            wallet_rpc_url: read("RESHAPE_WALLET_RPC_URL"),
            wallet_address: read("RESHAPE_WALLET_ADDRESS"),
            chain_id: read("RESHAPE_CHAIN_ID").and_then(|value| parse_chain_id(&value)),
        }
    }

    pub fn chat_url(&self) -> String {
        self.endpoint(&self.chat_path)
    }

    pub fn image_url(&self) -> String {
        self.endpoint(&self.image_path)
    }

    pub fn upload_url(&self) -> String {
        self.endpoint(&self.upload_path)
    }

    pub fn explorer_link(&self, hash: &str) -> String {
        explorer_link(&self.explorer_tx_base, hash)
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Transaction page for `hash` under an explorer's `/tx/` base.
pub fn explorer_link(tx_base: &str, hash: &str) -> String {
    format!("{}/{hash}", tx_base.trim_end_matches('/'))
}

/// Accepts decimal or `0x` hex chain ids.
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_point_at_local_app() {
        let config = StudioConfig::from_lookup(|_| None);
        assert_eq!(config, StudioConfig::default());
        assert_eq!(config.chat_url(), "http://localhost:3000/api/chat");
        assert_eq!(config.image_url(), "http://localhost:3000/api/generate-image");
        assert_eq!(
            config.explorer_link("0xabc"),
            "https://sepolia.etherscan.io/tx/0xabc"
        );
    }

    #[test]
    fn env_overrides_and_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RESHAPE_API_BASE", "https://reshape.example/ "),
            ("RESHAPE_CHAT_PATH", "api/create"),
            ("RESHAPE_UPLOAD_PATH", "https://pin.example/upload"),
            ("RESHAPE_WALLET_ADDRESS", "   "),
            ("RESHAPE_CHAIN_ID", "0x2b03"),
            ("RESHAPE_EXPLORER_TX_BASE", "https://explorer.shape.org/tx/"),
        ]);
        let config = StudioConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.chat_url(), "https://reshape.example/api/create");
        assert_eq!(config.upload_url(), "https://pin.example/upload");
        assert_eq!(config.wallet_address, None);
        assert_eq!(config.chain_id, Some(11011));
        assert_eq!(
            config.explorer_link("0x1"),
            "https://explorer.shape.org/tx/0x1"
        );
    }

    #[test]
    fn explorer_link_tolerates_missing_trailing_slash() {
        assert_eq!(
            explorer_link("https://explorer.shape.org/tx", "0x1"),
            "https://explorer.shape.org/tx/0x1"
        );
        assert_eq!(
            explorer_link("https://explorer.shape.org/tx/", "0x1"),
            "https://explorer.shape.org/tx/0x1"
        );
    }

    #[test]
    fn parse_chain_id_forms() {
        assert_eq!(parse_chain_id("11011"), Some(11011));
        assert_eq!(parse_chain_id("0xaa36a7"), Some(11_155_111));
        assert_eq!(parse_chain_id("shape"), None);
    }
}
