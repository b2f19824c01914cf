use std::collections::HashMap;

/// Filter criteria for listing nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub node_type: Option<String>,
    pub include_deleted: bool,
    pub limit: Option<usize>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Storage-level statistics, surfaced by the `stats` CLI command.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StorageStats {
    pub node_count: u64,
    pub edge_count: u64,
    pub node_counts_by_type: HashMap<String, u64>,
    pub db_size_bytes: u64,
}
