use crate::error::Result;
use crate::types::{Node, Point};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Decodes a node's points into a typed configuration, and names the node
/// type the client manager should scan for.
pub trait ClientConfig: Send + Sync + Clone + 'static {
    /// The node type tag this config is decoded from, e.g. `"canSocket"`.
    fn node_type() -> &'static str;

    fn from_node(node: &Node) -> Result<Self>
    where
        Self: Sized;
}

/// A supervised worker backing one node of `Self::Config::node_type()`.
/// The client manager spawns one task per instance and feeds it points
/// delivered on the node's own subject and on the edge above it.
#[async_trait]
pub trait ClientState: Send + 'static {
    type Config: ClientConfig;

    fn new(config: Self::Config, node_id: String, parent_id: String) -> Self;

    /// Run until `stop` fires or the worker exits on its own (e.g. an
    /// unrecoverable adapter error). `points` carries points written
    /// directly to this node; `edge_points` carries points written to the
    /// edge above it.
    async fn run(
        &mut self,
        stop: oneshot::Receiver<()>,
        points: mpsc::Receiver<Vec<Point>>,
        edge_points: mpsc::Receiver<Vec<Point>>,
    ) -> Result<()>;
}
