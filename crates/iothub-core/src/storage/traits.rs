use crate::error::Result;
use crate::storage::filters::{NodeFilter, StorageStats};
use crate::types::{Edge, Node};
use std::path::Path;

/// Storage trait for the node/edge tree. Implementations must provide
/// read-your-writes consistency within a single call but need not expose
/// cross-call transactions — the cache-coherent mutator owns multi-step
/// consistency above this trait.
pub trait Storage: Send + Sync {
    // === Node operations ===

    fn put_node(&self, node: &Node) -> Result<()>;
    fn get_node(&self, id: &str) -> Result<Option<Node>>;
    fn delete_node(&self, id: &str) -> Result<()>;
    fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>>;

    // === Edge operations ===

    fn put_edge(&self, edge: &Edge) -> Result<()>;
    fn get_edge(&self, id: &str) -> Result<Option<Edge>>;
    fn delete_edge(&self, id: &str) -> Result<()>;

    /// Edges where this node is downstream (its parents).
    fn edges_up(&self, node_id: &str) -> Result<Vec<Edge>>;
    /// Edges where this node is upstream (its children).
    fn edges_down(&self, node_id: &str) -> Result<Vec<Edge>>;

    // === Batch ===

    fn put_nodes_batch(&self, nodes: &[Node]) -> Result<()>;
    fn put_edges_batch(&self, edges: &[Edge]) -> Result<()>;

    // === Metadata ===

    fn put_metadata(&self, key: &str, value: &[u8]) -> Result<()>;
    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Root node id, cached in metadata at first discovery.
    fn root_id(&self) -> Result<Option<String>>;
    fn set_root_id(&self, id: &str) -> Result<()>;

    // === Maintenance ===

    fn compact(&self) -> Result<()>;
    fn stats(&self) -> Result<StorageStats>;
    fn snapshot(&self, path: &Path) -> Result<()>;

    /// Breadth-first walk of every node reachable downstream of `id`,
    /// optionally filtered by type. `id` itself is never included.
    fn node_descendants(
        &self,
        id: &str,
        node_type: Option<&str>,
        include_deleted: bool,
    ) -> Result<Vec<Node>> {
        let _ = include_deleted; // nodes carry no tombstone flag in this model
        let mut seen = std::collections::HashSet::new();
        let mut queue: std::collections::VecDeque<String> = self
            .edges_down(id)?
            .into_iter()
            .map(|e| e.downstream)
            .collect();
        let mut out = Vec::new();

        while let Some(node_id) = queue.pop_front() {
            if !seen.insert(node_id.clone()) {
                continue;
            }
            if let Some(node) = self.get_node(&node_id)? {
                if node_type.map(|t| t == node.node_type).unwrap_or(true) {
                    out.push(node);
                }
            }
            for edge in self.edges_down(&node_id)? {
                queue.push_back(edge.downstream);
            }
        }
        Ok(out)
    }
}
