use indexmap::IndexMap;

use crate::mint::MINT_TOOL_NAME;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// The tool's result is an unsigned transaction for the user to confirm.
    pub prepares_transaction: bool,
}

/// MCP tools the chat endpoint exposes to the model, in display order.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: IndexMap<String, ToolSpec>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ToolCatalog {
    pub fn new(tools: Option<IndexMap<String, ToolSpec>>) -> Self {
        Self {
            tools: tools.unwrap_or_else(default_tools),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn transaction_tools(&self) -> Vec<&ToolSpec> {
        self.tools
            .values()
            .filter(|tool| tool.prepares_transaction)
            .collect()
    }
}

fn default_tools() -> IndexMap<String, ToolSpec> {
    let mut map = IndexMap::new();
    let mut insert = |name: &str, description: &str, prepares_transaction: bool| {
        map.insert(
            name.to_string(),
            ToolSpec {
                name: name.to_string(),
                description: description.to_string(),
                prepares_transaction,
            },
        );
    };

    insert(MINT_TOOL_NAME, "Prepare NFT minting transactions", true);
    insert("getShapeNft", "Fetch NFT collections for addresses", false);
    insert(
        "getCollectionAnalytics",
        "Get collection statistics and market data",
        false,
    );
    insert(
        "getChainStatus",
        "Check Shape network status and gas prices",
        false,
    );
    insert("getTopShapeCreators", "Find top creators and artists", false);
    map
}
