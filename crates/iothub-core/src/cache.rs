use crate::error::{HubError, Result};
use crate::merge::{merge_edge_points, merge_points};
use crate::storage::Storage;
use crate::types::{Edge, Node, Point};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Per-call cache of nodes and edges touched by one mutation, populated
/// lazily from storage. Exists so a single ancestor walk never re-reads
/// the same node or edge twice within one `write_point` call.
#[derive(Default)]
struct NodeEdgeCache {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
}

impl NodeEdgeCache {
    fn node<'a>(&'a mut self, storage: &dyn Storage, id: &str) -> Result<Option<&'a Node>> {
        if !self.nodes.contains_key(id) {
            if let Some(n) = storage.get_node(id)? {
                self.nodes.insert(id.to_string(), n);
            }
        }
        Ok(self.nodes.get(id))
    }

    fn edge<'a>(&'a mut self, storage: &dyn Storage, id: &str) -> Result<Option<&'a Edge>> {
        if !self.edges.contains_key(id) {
            if let Some(e) = storage.get_edge(id)? {
                self.edges.insert(id.to_string(), e);
            }
        }
        Ok(self.edges.get(id))
    }
}

/// Applies a point write to the node tree with cache-coherent hash
/// propagation: every ancestor whose subtree hash is affected is
/// recomputed and persisted in the same logical mutation.
///
/// Holds a process-wide edge cache (mirrored from storage on every write)
/// so readers that only need edge shape don't have to hit the store.
pub struct Mutator {
    storage: Arc<dyn Storage>,
    edge_cache: Arc<RwLock<HashMap<String, Edge>>>,
}

impl Mutator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Mutator {
            storage,
            edge_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Write a point to a node, recompute its hash, and propagate the hash
    /// change up through every ancestor edge.
    pub fn write_point(&self, node_id: &str, point: Point) -> Result<()> {
        self.write_points(node_id, &[point])
    }

    pub fn write_points(&self, node_id: &str, points: &[Point]) -> Result<()> {
        let mut cache = NodeEdgeCache::default();

        let mut node = cache
            .node(self.storage.as_ref(), node_id)?
            .cloned()
            .ok_or_else(|| HubError::NodeNotFound(node_id.to_string()))?;

        merge_points(&mut node.points, points);
        cache.nodes.insert(node.id.clone(), node);
        self.propagate_from_node(&mut cache, node_id)?;
        Ok(())
    }

    /// Write a point onto the edge between `node_id` and `parent_id`. The
    /// downstream node's own hash is untouched by an edge-point write; only
    /// the edge's hash changes, so propagation starts at `parent_id` rather
    /// than at `node_id`.
    pub fn write_edge_point(&self, node_id: &str, parent_id: &str, point: Point) -> Result<()> {
        let mut cache = NodeEdgeCache::default();

        let downstream_hash = cache
            .node(self.storage.as_ref(), node_id)?
            .map(|n| n.hash)
            .ok_or_else(|| HubError::NodeNotFound(node_id.to_string()))?;

        let edges = self.storage.edges_up(node_id)?;
        let mut edge = edges
            .into_iter()
            .find(|e| e.upstream == parent_id)
            .ok_or_else(|| HubError::EdgeNotFound(format!("{parent_id}->{node_id}")))?;

        merge_edge_points(&mut edge.points, &[point]);
        edge.hash = Self::edge_hash(&edge, downstream_hash);
        self.storage.put_edge(&edge)?;
        cache.edges.insert(edge.id.clone(), edge.clone());
        self.edge_cache.write().unwrap().insert(edge.id.clone(), edge);

        self.propagate_from_node(&mut cache, parent_id)?;
        Ok(())
    }

    /// Recompute `node_id`'s hash from its current down-edges and persist it
    /// if it changed, then fold that change into every edge directly above
    /// it and continue the walk at each such edge's upstream node. This is
    /// the bottom-up half of the Merkle chain: child hash → edge hash (which
    /// now depends on the child's hash) → parent hash → next edge → ...
    ///
    /// Stops at any node whose recomputed hash didn't change, so an ancestor
    /// outside the affected subtree is never touched.
    fn propagate_from_node(&self, cache: &mut NodeEdgeCache, node_id: &str) -> Result<()> {
        let mut frontier = vec![node_id.to_string()];

        while let Some(current_id) = frontier.pop() {
            let mut node = match cache.node(self.storage.as_ref(), &current_id)?.cloned() {
                Some(n) => n,
                None => continue,
            };

            let new_hash = self.node_hash(&node)?;
            if new_hash == node.hash {
                continue;
            }
            node.hash = new_hash;
            self.storage.put_node(&node)?;
            cache.nodes.insert(node.id.clone(), node);

            for mut edge in self.storage.edges_up(&current_id)? {
                if edge.is_root() {
                    continue;
                }
                let new_edge_hash = Self::edge_hash(&edge, new_hash);
                if new_edge_hash == edge.hash {
                    continue;
                }
                edge.hash = new_edge_hash;
                self.storage.put_edge(&edge)?;
                cache.edges.insert(edge.id.clone(), edge.clone());
                self.edge_cache.write().unwrap().insert(edge.id.clone(), edge.clone());
                frontier.push(edge.upstream.clone());
            }
        }
        Ok(())
    }

    /// A node's hash folds in its own points and the hashes of every edge
    /// directly below it (the edges where this node is the upstream
    /// endpoint), so a change to any child's hash, once folded into that
    /// child's up-edge, is visible here without re-walking the subtree.
    fn node_hash(&self, node: &Node) -> Result<[u8; 32]> {
        let mut hasher = Sha256::new();
        hasher.update(node.node_type.as_bytes());
        let points_bytes = bincode::serialize(&node.points).map_err(HubError::from)?;
        hasher.update(&points_bytes);

        let mut down_hashes: Vec<[u8; 32]> = self
            .storage
            .edges_down(&node.id)?
            .into_iter()
            .map(|e| e.hash)
            .collect();
        down_hashes.sort();
        for h in down_hashes {
            hasher.update(h);
        }

        Ok(hasher.finalize().into())
    }

    /// An edge's hash folds in its endpoints, its own points, and its
    /// downstream node's current hash, so a point write at the bottom of a
    /// chain is detectable at every edge above it.
    fn edge_hash(edge: &Edge, downstream_node_hash: [u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(edge.upstream.as_bytes());
        hasher.update(edge.downstream.as_bytes());
        if let Ok(bytes) = bincode::serialize(&edge.points) {
            hasher.update(&bytes);
        }
        hasher.update(downstream_node_hash);
        hasher.finalize().into()
    }

    /// Create a new edge between two existing nodes (or the implicit root
    /// upstream of `""`). The edge's hash is seeded from the downstream
    /// node's current hash, then folded into the upstream node's hash (and
    /// propagated further) so a freshly added edge is reflected immediately,
    /// without waiting for a subsequent point write.
    pub fn add_edge(&self, mut edge: Edge) -> Result<Edge> {
        let downstream_hash = self
            .storage
            .get_node(&edge.downstream)?
            .map(|n| n.hash)
            .unwrap_or([0u8; 32]);
        edge.hash = Self::edge_hash(&edge, downstream_hash);
        self.storage.put_edge(&edge)?;
        self.edge_cache.write().unwrap().insert(edge.id.clone(), edge.clone());

        if !edge.is_root() {
            let mut cache = NodeEdgeCache::default();
            self.propagate_from_node(&mut cache, &edge.upstream)?;
        }

        Ok(edge)
    }

    pub fn edge_cache_snapshot(&self) -> HashMap<String, Edge> {
        self.edge_cache.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RedbStorage;
    use tempfile::TempDir;

    fn harness() -> (Mutator, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(RedbStorage::open(dir.path().join("hub.redb")).unwrap());
        (Mutator::new(storage), dir)
    }

    #[test]
    fn write_point_updates_node_hash() {
        let (mutator, _dir) = harness();
        let node = Node::new("device");
        mutator.storage.put_node(&node).unwrap();
        let before = mutator.storage.get_node(&node.id).unwrap().unwrap().hash;

        mutator.write_point(&node.id, Point::new("value", 1.0)).unwrap();
        let after = mutator.storage.get_node(&node.id).unwrap().unwrap().hash;
        assert_ne!(before, after);
    }

    #[test]
    fn write_point_propagates_hash_to_ancestor() {
        let (mutator, _dir) = harness();
        let root = Node::new("device");
        let child = Node::new("device");
        mutator.storage.put_node(&root).unwrap();
        mutator.storage.put_node(&child).unwrap();
        mutator
            .add_edge(Edge::new(root.id.clone(), child.id.clone()))
            .unwrap();

        let root_hash_before = mutator.storage.get_node(&root.id).unwrap().unwrap().hash;
        mutator.write_point(&child.id, Point::new("value", 3.0)).unwrap();
        let root_hash_after = mutator.storage.get_node(&root.id).unwrap().unwrap().hash;
        assert_ne!(root_hash_before, root_hash_after);
    }

    #[test]
    fn write_point_missing_node_errors() {
        let (mutator, _dir) = harness();
        assert!(mutator.write_point("missing", Point::new("value", 1.0)).is_err());
    }

    /// A second write to the same child must change the ancestor's hash
    /// again, not just the first one. Regresses a bug where the ancestor's
    /// hash only folded in its own upstream edges (which a child's point
    /// write never touches), so the second write was a no-op for every
    /// hash above the child.
    #[test]
    fn repeated_writes_to_same_child_keep_changing_ancestor_hash() {
        let (mutator, _dir) = harness();
        let root = Node::new("device");
        let child = Node::new("device");
        mutator.storage.put_node(&root).unwrap();
        mutator.storage.put_node(&child).unwrap();
        let edge = mutator
            .add_edge(Edge::new(root.id.clone(), child.id.clone()))
            .unwrap();

        mutator.write_point(&child.id, Point::new("value", 1.0)).unwrap();
        let root_hash_1 = mutator.storage.get_node(&root.id).unwrap().unwrap().hash;
        let edge_hash_1 = mutator.storage.get_edge(&edge.id).unwrap().unwrap().hash;

        mutator.write_point(&child.id, Point::new("value", 2.0)).unwrap();
        let root_hash_2 = mutator.storage.get_node(&root.id).unwrap().unwrap().hash;
        let edge_hash_2 = mutator.storage.get_edge(&edge.id).unwrap().unwrap().hash;

        assert_ne!(root_hash_1, root_hash_2, "second write must still change the ancestor's hash");
        assert_ne!(edge_hash_1, edge_hash_2, "second write must still change the edge's hash");
    }
}
