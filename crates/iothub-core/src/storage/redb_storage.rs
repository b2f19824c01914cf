use crate::error::{HubError, Result};
use crate::storage::filters::{NodeFilter, StorageStats};
use crate::storage::traits::Storage;
use crate::types::{Edge, Node};
use redb::{Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
const EDGES: TableDefinition<&str, &[u8]> = TableDefinition::new("edges");

const NODES_BY_TYPE: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("nodes_by_type");
const EDGES_BY_UP: MultimapTableDefinition<&str, &str> = MultimapTableDefinition::new("edges_by_up");
const EDGES_BY_DOWN: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("edges_by_down");

const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";
const ROOT_ID_KEY: &str = "root_id";
const STATS_NODE_COUNT_KEY: &str = "stats:node_count";
const STATS_EDGE_COUNT_KEY: &str = "stats:edge_count";

/// redb-backed implementation of [`Storage`].
pub struct RedbStorage {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HubError::Internal(format!("creating data dir: {e}")))?;
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(NODES)?;
            let _ = write_txn.open_table(EDGES)?;
            let _ = write_txn.open_multimap_table(NODES_BY_TYPE)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_UP)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_DOWN)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string().as_bytes())?;
            }
        }
        write_txn.commit()?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = {
            let table = read_txn.open_table(META).ok();
            table
                .and_then(|t| {
                    t.get(SCHEMA_VERSION_KEY)
                        .ok()
                        .flatten()
                        .and_then(|v| std::str::from_utf8(v.value()).ok().and_then(|s| s.parse::<u32>().ok()))
                })
                .unwrap_or(1)
        };

        if version != CURRENT_SCHEMA_VERSION {
            return Err(HubError::Internal(format!(
                "database schema v{version} does not match binary's v{CURRENT_SCHEMA_VERSION}"
            )));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn serialize_node(node: &Node) -> Result<Vec<u8>> {
        bincode::serialize(node).map_err(HubError::from)
    }

    fn deserialize_node(bytes: &[u8]) -> Result<Node> {
        bincode::deserialize(bytes).map_err(HubError::from)
    }

    fn serialize_edge(edge: &Edge) -> Result<Vec<u8>> {
        bincode::serialize(edge).map_err(HubError::from)
    }

    fn deserialize_edge(bytes: &[u8]) -> Result<Edge> {
        bincode::deserialize(bytes).map_err(HubError::from)
    }

    fn update_node_indexes(
        &self,
        txn: &redb::WriteTransaction,
        node: &Node,
        old_node: Option<&Node>,
    ) -> Result<()> {
        let mut type_table = txn.open_multimap_table(NODES_BY_TYPE)?;
        if let Some(old) = old_node {
            if old.node_type != node.node_type {
                type_table.remove(old.node_type.as_str(), node.id.as_str())?;
            }
        }
        type_table.insert(node.node_type.as_str(), node.id.as_str())?;
        Ok(())
    }

    fn update_edge_indexes(&self, txn: &redb::WriteTransaction, edge: &Edge) -> Result<()> {
        {
            let mut up_table = txn.open_multimap_table(EDGES_BY_UP)?;
            up_table.insert(edge.upstream.as_str(), edge.id.as_str())?;
        }
        {
            let mut down_table = txn.open_multimap_table(EDGES_BY_DOWN)?;
            down_table.insert(edge.downstream.as_str(), edge.id.as_str())?;
        }
        Ok(())
    }

    fn remove_edge_from_indexes(&self, txn: &redb::WriteTransaction, edge: &Edge) -> Result<()> {
        {
            let mut up_table = txn.open_multimap_table(EDGES_BY_UP)?;
            up_table.remove(edge.upstream.as_str(), edge.id.as_str())?;
        }
        {
            let mut down_table = txn.open_multimap_table(EDGES_BY_DOWN)?;
            down_table.remove(edge.downstream.as_str(), edge.id.as_str())?;
        }
        Ok(())
    }

    fn increment_meta_counter(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META)?;
            let current = meta.get(key)?.map(|v| {
                let mut b = [0u8; 8];
                b.copy_from_slice(v.value());
                u64::from_le_bytes(b)
            }).unwrap_or(0);
            meta.insert(key, (current + 1).to_le_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn decrement_meta_counter(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META)?;
            let current = meta.get(key)?.map(|v| {
                let mut b = [0u8; 8];
                b.copy_from_slice(v.value());
                u64::from_le_bytes(b)
            }).unwrap_or(0);
            meta.insert(key, current.saturating_sub(1).to_le_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn read_meta_counter(&self, key: &str) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let meta = read_txn.open_table(META)?;
        Ok(meta.get(key)?.map(|v| {
            let mut b = [0u8; 8];
            b.copy_from_slice(v.value());
            u64::from_le_bytes(b)
        }).unwrap_or(0))
    }
}

impl Storage for RedbStorage {
    fn put_node(&self, node: &Node) -> Result<()> {
        let write_txn = self.db.begin_write()?;

        let old_node = {
            let nodes_table = write_txn.open_table(NODES)?;
            let old_bytes = nodes_table.get(node.id.as_str())?.map(|g| g.value().to_vec());
            old_bytes.map(|b| Self::deserialize_node(&b)).transpose()?
        };

        let node_bytes = Self::serialize_node(node)?;
        {
            let mut nodes_table = write_txn.open_table(NODES)?;
            nodes_table.insert(node.id.as_str(), node_bytes.as_slice())?;
        }
        self.update_node_indexes(&write_txn, node, old_node.as_ref())?;
        write_txn.commit()?;

        if old_node.is_none() {
            self.increment_meta_counter(STATS_NODE_COUNT_KEY)?;
        }
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NODES)?;
        match table.get(id)? {
            Some(bytes) => Ok(Some(Self::deserialize_node(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn delete_node(&self, id: &str) -> Result<()> {
        if self.get_node(id)?.is_none() {
            return Err(HubError::NodeNotFound(id.to_string()));
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut nodes_table = write_txn.open_table(NODES)?;
            nodes_table.remove(id)?;
        }
        write_txn.commit()?;
        self.decrement_meta_counter(STATS_NODE_COUNT_KEY)?;
        Ok(())
    }

    fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let read_txn = self.db.begin_read()?;
        let nodes_table = read_txn.open_table(NODES)?;
        let mut nodes = Vec::new();

        if let Some(ref node_type) = filter.node_type {
            let type_index = read_txn.open_multimap_table(NODES_BY_TYPE)?;
            for result in type_index.get(node_type.as_str())? {
                let id = result?;
                if let Some(bytes) = nodes_table.get(id.value())? {
                    nodes.push(Self::deserialize_node(bytes.value())?);
                }
            }
        } else {
            for entry in nodes_table.iter()? {
                let (_, bytes) = entry?;
                nodes.push(Self::deserialize_node(bytes.value())?);
            }
        }

        if let Some(limit) = filter.limit {
            nodes.truncate(limit);
        }
        Ok(nodes)
    }

    fn put_edge(&self, edge: &Edge) -> Result<()> {
        if edge.upstream == edge.downstream {
            return Err(HubError::InvalidEdge {
                reason: "self-edges are not allowed".into(),
            });
        }

        let write_txn = self.db.begin_write()?;
        let existed = {
            let edges_table = write_txn.open_table(EDGES)?;
            edges_table.get(edge.id.as_str())?.is_some()
        };

        let edge_bytes = Self::serialize_edge(edge)?;
        {
            let mut edges_table = write_txn.open_table(EDGES)?;
            edges_table.insert(edge.id.as_str(), edge_bytes.as_slice())?;
        }
        self.update_edge_indexes(&write_txn, edge)?;
        write_txn.commit()?;

        if !existed {
            self.increment_meta_counter(STATS_EDGE_COUNT_KEY)?;
        }
        Ok(())
    }

    fn get_edge(&self, id: &str) -> Result<Option<Edge>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EDGES)?;
        match table.get(id)? {
            Some(bytes) => Ok(Some(Self::deserialize_edge(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn delete_edge(&self, id: &str) -> Result<()> {
        let edge = self.get_edge(id)?.ok_or_else(|| HubError::EdgeNotFound(id.to_string()))?;
        let write_txn = self.db.begin_write()?;
        self.remove_edge_from_indexes(&write_txn, &edge)?;
        {
            let mut edges_table = write_txn.open_table(EDGES)?;
            edges_table.remove(id)?;
        }
        write_txn.commit()?;
        self.decrement_meta_counter(STATS_EDGE_COUNT_KEY)?;
        Ok(())
    }

    fn edges_up(&self, node_id: &str) -> Result<Vec<Edge>> {
        let read_txn = self.db.begin_read()?;
        let edges_table = read_txn.open_table(EDGES)?;
        let down_index = read_txn.open_multimap_table(EDGES_BY_DOWN)?;

        let mut edges = Vec::new();
        for result in down_index.get(node_id)? {
            let edge_id = result?;
            if let Some(bytes) = edges_table.get(edge_id.value())? {
                edges.push(Self::deserialize_edge(bytes.value())?);
            }
        }
        Ok(edges)
    }

    fn edges_down(&self, node_id: &str) -> Result<Vec<Edge>> {
        let read_txn = self.db.begin_read()?;
        let edges_table = read_txn.open_table(EDGES)?;
        let up_index = read_txn.open_multimap_table(EDGES_BY_UP)?;

        let mut edges = Vec::new();
        for result in up_index.get(node_id)? {
            let edge_id = result?;
            if let Some(bytes) = edges_table.get(edge_id.value())? {
                edges.push(Self::deserialize_edge(bytes.value())?);
            }
        }
        Ok(edges)
    }

    fn put_nodes_batch(&self, nodes: &[Node]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        let mut new_count = 0u64;
        for node in nodes {
            let old_existed = {
                let nodes_table = write_txn.open_table(NODES)?;
                nodes_table.get(node.id.as_str())?.is_some()
            };
            let old_node = if old_existed {
                let nodes_table = write_txn.open_table(NODES)?;
                nodes_table
                    .get(node.id.as_str())?
                    .map(|g| g.value().to_vec())
                    .map(|b| Self::deserialize_node(&b))
                    .transpose()?
            } else {
                new_count += 1;
                None
            };
            let bytes = Self::serialize_node(node)?;
            {
                let mut nodes_table = write_txn.open_table(NODES)?;
                nodes_table.insert(node.id.as_str(), bytes.as_slice())?;
            }
            self.update_node_indexes(&write_txn, node, old_node.as_ref())?;
        }
        write_txn.commit()?;
        for _ in 0..new_count {
            self.increment_meta_counter(STATS_NODE_COUNT_KEY)?;
        }
        Ok(())
    }

    fn put_edges_batch(&self, edges: &[Edge]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        let mut new_count = 0u64;
        for edge in edges {
            let existed = {
                let edges_table = write_txn.open_table(EDGES)?;
                edges_table.get(edge.id.as_str())?.is_some()
            };
            if !existed {
                new_count += 1;
            }
            let bytes = Self::serialize_edge(edge)?;
            {
                let mut edges_table = write_txn.open_table(EDGES)?;
                edges_table.insert(edge.id.as_str(), bytes.as_slice())?;
            }
            self.update_edge_indexes(&write_txn, edge)?;
        }
        write_txn.commit()?;
        for _ in 0..new_count {
            self.increment_meta_counter(STATS_EDGE_COUNT_KEY)?;
        }
        Ok(())
    }

    fn put_metadata(&self, key: &str, value: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META)?;
            meta.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let meta = read_txn.open_table(META)?;
        Ok(meta.get(key)?.map(|v| v.value().to_vec()))
    }

    fn root_id(&self) -> Result<Option<String>> {
        Ok(self
            .get_metadata(ROOT_ID_KEY)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }

    fn set_root_id(&self, id: &str) -> Result<()> {
        self.put_metadata(ROOT_ID_KEY, id.as_bytes())
    }

    fn compact(&self) -> Result<()> {
        // redb compacts its free list automatically; kept for API symmetry
        // with the CLI `doctor` command.
        Ok(())
    }

    fn stats(&self) -> Result<StorageStats> {
        let node_count = self.read_meta_counter(STATS_NODE_COUNT_KEY)?;
        let edge_count = self.read_meta_counter(STATS_EDGE_COUNT_KEY)?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        let mut node_counts_by_type = std::collections::HashMap::new();
        let read_txn = self.db.begin_read()?;
        let type_index = read_txn.open_multimap_table(NODES_BY_TYPE)?;
        for entry in type_index.iter()? {
            let (key, values) = entry?;
            node_counts_by_type.insert(key.value().to_string(), values.count() as u64);
        }

        Ok(StorageStats {
            node_count,
            edge_count,
            node_counts_by_type,
            db_size_bytes,
        })
    }

    fn snapshot(&self, path: &Path) -> Result<()> {
        std::fs::copy(&self.path, path)
            .map_err(|e| HubError::Internal(format!("creating snapshot: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;
    use tempfile::TempDir;

    fn test_storage() -> (RedbStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = RedbStorage::open(dir.path().join("hub.redb")).unwrap();
        (storage, dir)
    }

    #[test]
    fn put_and_get_node_round_trips() {
        let (storage, _dir) = test_storage();
        let mut node = Node::new("device");
        node.points.push(Point::new("value", 42.0));
        storage.put_node(&node).unwrap();

        let fetched = storage.get_node(&node.id).unwrap().unwrap();
        assert_eq!(fetched, node);
    }

    #[test]
    fn delete_missing_node_errors() {
        let (storage, _dir) = test_storage();
        assert!(storage.delete_node("nonexistent").is_err());
    }

    #[test]
    fn edges_up_and_down_round_trip_through_indexes() {
        let (storage, _dir) = test_storage();
        let root = Node::new("device");
        let child = Node::new("device");
        storage.put_node(&root).unwrap();
        storage.put_node(&child).unwrap();

        let edge = Edge::new(root.id.clone(), child.id.clone());
        storage.put_edge(&edge).unwrap();

        let down = storage.edges_down(&root.id).unwrap();
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].id, edge.id);

        let up = storage.edges_up(&child.id).unwrap();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].id, edge.id);
    }

    #[test]
    fn stats_reflects_put_and_delete() {
        let (storage, _dir) = test_storage();
        let node = Node::new("device");
        storage.put_node(&node).unwrap();
        assert_eq!(storage.stats().unwrap().node_count, 1);

        storage.delete_node(&node.id).unwrap();
        assert_eq!(storage.stats().unwrap().node_count, 0);
    }

    #[test]
    fn reject_self_edge() {
        let (storage, _dir) = test_storage();
        let node = Node::new("device");
        storage.put_node(&node).unwrap();
        let edge = Edge::new(node.id.clone(), node.id.clone());
        assert!(storage.put_edge(&edge).is_err());
    }

    #[test]
    fn root_id_persists_in_metadata() {
        let (storage, _dir) = test_storage();
        assert_eq!(storage.root_id().unwrap(), None);
        storage.set_root_id("root-1").unwrap();
        assert_eq!(storage.root_id().unwrap(), Some("root-1".to_string()));
    }
}
