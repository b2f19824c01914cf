/// Generated protobuf code for the hub's wire messages and gRPC surface.
pub mod iothub {
    pub mod v1 {
        #[cfg(feature = "regenerate")]
        tonic::include_proto!("iothub.v1");

        #[cfg(not(feature = "regenerate"))]
        include!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/generated/iothub.v1.rs"));
    }
}

pub use iothub::v1::*;
