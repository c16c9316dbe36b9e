pub mod account_lifecycle;
pub mod auth_gate;
pub mod control_plane;
pub mod credential_broker;
pub mod identity_resolver;
pub mod memory_store;
pub mod object_store;
pub mod s3_store;
pub mod storage_gateway;

use crate::config::{ObjectStoreBackend, ObjectStoreConfig};
use memory_store::MemoryObjectStore;
use object_store::ObjectStoreConnector;
use s3_store::S3Connector;
use std::sync::Arc;

/// Pick the object-store backend named in config.
pub fn connector_for(cfg: &ObjectStoreConfig) -> Arc<dyn ObjectStoreConnector> {
    match cfg.backend {
        ObjectStoreBackend::S3 => {
            tracing::info!(endpoint = %cfg.endpoint, region = %cfg.region, "using S3 object store");
            Arc::new(S3Connector::new(cfg.endpoint.clone(), cfg.region.clone()))
        }
        ObjectStoreBackend::Memory => {
            tracing::warn!("using in-memory object store; objects are lost on restart");
            Arc::new(MemoryObjectStore::new())
        }
    }
}
