//! Thin gRPC client for the IoT hub daemon's operator-facing read surface.
//!
//! # Example
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut client = iothub_client::HubClient::connect("http://localhost:9090").await?;
//!     if let Some(node) = client.get_node("root").await? {
//!         println!("root type: {}", node.r#type);
//!     }
//!     Ok(())
//! }
//! ```
use iothub_proto::hub_service_client::HubServiceClient;
use iothub_proto::{
    CreateEdgeRequest, CreateEdgeResponse, GetNodeRequest, ListNodesRequest, Node, StatsRequest,
    StatsResponse,
};
use tonic::transport::Channel;

/// Re-export generated proto types for callers that need raw access.
pub use iothub_proto as proto;

pub struct HubClient {
    inner: HubServiceClient<Channel>,
}

impl HubClient {
    /// Connect to a running hub daemon. `addr` is a full URI, e.g.
    /// `"http://localhost:9090"`.
    pub async fn connect(addr: impl Into<String>) -> anyhow::Result<Self> {
        let channel = Channel::from_shared(addr.into())?.connect().await?;
        Ok(Self {
            inner: HubServiceClient::new(channel),
        })
    }

    /// Expose the raw gRPC client for full proto access.
    pub fn inner(&mut self) -> &mut HubServiceClient<Channel> {
        &mut self.inner
    }

    pub async fn get_node(&mut self, id: &str) -> anyhow::Result<Option<Node>> {
        match self
            .inner
            .get_node(GetNodeRequest { id: id.to_string() })
            .await
        {
            Ok(resp) => Ok(resp.into_inner().node),
            Err(status) if status.code() == tonic::Code::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_nodes(&mut self, node_type: &str, limit: u32) -> anyhow::Result<Vec<Node>> {
        let resp = self
            .inner
            .list_nodes(ListNodesRequest {
                r#type: node_type.to_string(),
                limit,
            })
            .await?;
        Ok(resp.into_inner().nodes)
    }

    pub async fn create_edge(&mut self, up: &str, down: &str) -> anyhow::Result<CreateEdgeResponse> {
        let resp = self
            .inner
            .create_edge(CreateEdgeRequest {
                up: up.to_string(),
                down: down.to_string(),
            })
            .await?;
        Ok(resp.into_inner())
    }

    pub async fn stats(&mut self) -> anyhow::Result<StatsResponse> {
        let resp = self.inner.stats(StatsRequest {}).await?;
        Ok(resp.into_inner())
    }
}
