//! Bucket gateway: lets users holding a bearer token manage objects in their
//! default bucket on an S3-compatible store, with per-user credentials
//! resolved through the control plane on every request.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use state::GatewayState;
