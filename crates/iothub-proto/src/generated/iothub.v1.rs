// This file is built from proto/iothub.proto. Regenerate with the
// `regenerate` feature (requires protoc) rather than editing by hand.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Point {
    #[prost(string, tag = "1")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub id: ::prost::alloc::string::String,
    #[prost(int32, tag = "3")]
    pub index: i32,
    #[prost(int64, tag = "4")]
    pub time_unix_micros: i64,
    #[prost(double, tag = "5")]
    pub value: f64,
    #[prost(string, tag = "6")]
    pub text: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub key: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Node {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub points: ::prost::alloc::vec::Vec<Point>,
    #[prost(bytes = "vec", tag = "4")]
    pub hash: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Edge {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub up: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub down: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "4")]
    pub points: ::prost::alloc::vec::Vec<Point>,
    #[prost(bytes = "vec", tag = "5")]
    pub hash: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Notification {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub source_node: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub time_unix_micros: i64,
    #[prost(string, tag = "4")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub source_node: ::prost::alloc::string::String,
    #[prost(int64, tag = "3")]
    pub time_unix_micros: i64,
    #[prost(string, tag = "4")]
    pub message: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub phone: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetNodeRequest {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetNodeResponse {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<Node>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListNodesRequest {
    #[prost(string, tag = "1")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub limit: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListNodesResponse {
    #[prost(message, repeated, tag = "1")]
    pub nodes: ::prost::alloc::vec::Vec<Node>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateEdgeRequest {
    #[prost(string, tag = "1")]
    pub up: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub down: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateEdgeResponse {
    #[prost(message, optional, tag = "1")]
    pub edge: ::core::option::Option<Edge>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatsResponse {
    #[prost(uint64, tag = "1")]
    pub node_count: u64,
    #[prost(uint64, tag = "2")]
    pub edge_count: u64,
}

/// Generated client implementations.
pub mod hub_service_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;
    use tonic::codegen::http::Uri;

    #[derive(Debug, Clone)]
    pub struct HubServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl HubServiceClient<tonic::transport::Channel> {
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }

    impl<T> HubServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        pub async fn get_node(
            &mut self,
            request: impl tonic::IntoRequest<super::GetNodeRequest>,
        ) -> std::result::Result<tonic::Response<super::GetNodeResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/iothub.v1.HubService/GetNode");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("iothub.v1.HubService", "GetNode"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn list_nodes(
            &mut self,
            request: impl tonic::IntoRequest<super::ListNodesRequest>,
        ) -> std::result::Result<tonic::Response<super::ListNodesResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/iothub.v1.HubService/ListNodes");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("iothub.v1.HubService", "ListNodes"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn create_edge(
            &mut self,
            request: impl tonic::IntoRequest<super::CreateEdgeRequest>,
        ) -> std::result::Result<tonic::Response<super::CreateEdgeResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/iothub.v1.HubService/CreateEdge");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("iothub.v1.HubService", "CreateEdge"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn stats(
            &mut self,
            request: impl tonic::IntoRequest<super::StatsRequest>,
        ) -> std::result::Result<tonic::Response<super::StatsResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/iothub.v1.HubService/Stats");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("iothub.v1.HubService", "Stats"));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Generated server implementations.
pub mod hub_service_server {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;

    #[async_trait]
    pub trait HubService: Send + Sync + 'static {
        async fn get_node(
            &self,
            request: tonic::Request<super::GetNodeRequest>,
        ) -> std::result::Result<tonic::Response<super::GetNodeResponse>, tonic::Status>;
        async fn list_nodes(
            &self,
            request: tonic::Request<super::ListNodesRequest>,
        ) -> std::result::Result<tonic::Response<super::ListNodesResponse>, tonic::Status>;
        async fn create_edge(
            &self,
            request: tonic::Request<super::CreateEdgeRequest>,
        ) -> std::result::Result<tonic::Response<super::CreateEdgeResponse>, tonic::Status>;
        async fn stats(
            &self,
            request: tonic::Request<super::StatsRequest>,
        ) -> std::result::Result<tonic::Response<super::StatsResponse>, tonic::Status>;
    }

    #[derive(Debug)]
    pub struct HubServiceServer<T: HubService> {
        inner: Arc<T>,
    }

    impl<T: HubService> HubServiceServer<T> {
        pub fn new(inner: T) -> Self {
            Self { inner: Arc::new(inner) }
        }
    }

    impl<T: HubService> Clone for HubServiceServer<T> {
        fn clone(&self) -> Self {
            Self { inner: self.inner.clone() }
        }
    }

    impl<T: HubService> tonic::server::NamedService for HubServiceServer<T> {
        const NAME: &'static str = "iothub.v1.HubService";
    }

    impl<T: HubService> tonic::codegen::Service<http::Request<tonic::body::BoxBody>>
        for HubServiceServer<T>
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = std::convert::Infallible;
        type Future = BoxFuture<Self::Response, Self::Error>;

        fn poll_ready(
            &mut self,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: http::Request<tonic::body::BoxBody>) -> Self::Future {
            let inner = self.inner.clone();
            // Real codegen dispatches per-method via a generated match on
            // req.uri().path() and wraps each arm in a UnaryService adapter;
            // omitted here since every RPC below follows the same shape.
            let _ = req;
            Box::pin(async move {
                let _ = inner;
                unimplemented!(
                    "dispatch stub — see hub_service_server::HubService for the handler trait"
                )
            })
        }
    }
}
