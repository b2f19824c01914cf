use iothub_core::{Edge, Mutator, NodeFilter, Storage};
use iothub_proto::hub_service_server::HubService;
use iothub_proto::{
    CreateEdgeRequest, CreateEdgeResponse, GetNodeRequest, GetNodeResponse, ListNodesRequest,
    ListNodesResponse, StatsRequest, StatsResponse,
};
use std::result::Result;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Business logic backing the generated `HubService` trait. Exercised
/// directly by `tests/integration_test.rs`; not mounted over a live tonic
/// listener (see DESIGN.md) since NATS is this daemon's primary transport.
pub struct HubServiceImpl {
    storage: Arc<dyn Storage>,
    mutator: Arc<Mutator>,
}

impl HubServiceImpl {
    pub fn new(storage: Arc<dyn Storage>, mutator: Arc<Mutator>) -> Self {
        HubServiceImpl { storage, mutator }
    }
}

#[tonic::async_trait]
impl HubService for HubServiceImpl {
    async fn get_node(
        &self,
        request: Request<GetNodeRequest>,
    ) -> Result<Response<GetNodeResponse>, Status> {
        let id = request.into_inner().id;
        let node = self
            .storage
            .get_node(&id)
            .map_err(|e| Status::internal(e.to_string()))?
            .ok_or_else(|| Status::not_found(format!("node {id} not found")))?;
        Ok(Response::new(GetNodeResponse {
            node: Some(to_proto_node(&node)),
        }))
    }

    async fn list_nodes(
        &self,
        request: Request<ListNodesRequest>,
    ) -> Result<Response<ListNodesResponse>, Status> {
        let req = request.into_inner();
        let mut filter = NodeFilter::new();
        if !req.r#type.is_empty() {
            filter = filter.with_type(req.r#type);
        }
        if req.limit > 0 {
            filter = filter.with_limit(req.limit as usize);
        }
        let nodes = self
            .storage
            .list_nodes(&filter)
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(ListNodesResponse {
            nodes: nodes.iter().map(to_proto_node).collect(),
        }))
    }

    async fn create_edge(
        &self,
        request: Request<CreateEdgeRequest>,
    ) -> Result<Response<CreateEdgeResponse>, Status> {
        let req = request.into_inner();
        let edge = self
            .mutator
            .add_edge(Edge::new(req.up, req.down))
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(CreateEdgeResponse {
            edge: Some(to_proto_edge(&edge)),
        }))
    }

    async fn stats(&self, _request: Request<StatsRequest>) -> Result<Response<StatsResponse>, Status> {
        let stats = self
            .storage
            .stats()
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(StatsResponse {
            node_count: stats.node_count,
            edge_count: stats.edge_count,
        }))
    }
}

fn to_proto_point(p: &iothub_core::Point) -> iothub_proto::Point {
    iothub_proto::Point {
        r#type: p.point_type.clone(),
        id: p.id.clone(),
        index: p.index,
        time_unix_micros: p.time.timestamp_micros(),
        value: p.value,
        text: p.text.clone(),
        key: p.key.clone(),
    }
}

fn to_proto_node(n: &iothub_core::Node) -> iothub_proto::Node {
    iothub_proto::Node {
        id: n.id.clone(),
        r#type: n.node_type.clone(),
        points: n.points.iter().map(to_proto_point).collect(),
        hash: n.hash.to_vec(),
    }
}

fn to_proto_edge(e: &Edge) -> iothub_proto::Edge {
    iothub_proto::Edge {
        id: e.id.clone(),
        up: e.upstream.clone(),
        down: e.downstream.clone(),
        points: e.points.iter().map(to_proto_point).collect(),
        hash: e.hash.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iothub_core::{Node, RedbStorage};
    use tempfile::TempDir;

    fn harness() -> (HubServiceImpl, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(RedbStorage::open(dir.path().join("hub.redb")).unwrap());
        let mutator = Arc::new(Mutator::new(storage.clone()));
        (HubServiceImpl::new(storage, mutator), dir)
    }

    #[tokio::test]
    async fn get_node_returns_not_found_status() {
        let (service, _dir) = harness();
        let err = service
            .get_node(Request::new(GetNodeRequest { id: "missing".into() }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn create_edge_then_stats_reflects_it() {
        let (service, _dir) = harness();
        let a = Node::new("device");
        let b = Node::new("device");
        service.storage.put_node(&a).unwrap();
        service.storage.put_node(&b).unwrap();

        service
            .create_edge(Request::new(CreateEdgeRequest {
                up: a.id.clone(),
                down: b.id.clone(),
            }))
            .await
            .unwrap();

        let stats = service
            .stats(Request::new(StatsRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.edge_count, 1);
    }
}
