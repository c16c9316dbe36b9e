//! Core data models for the gateway.
//!
//! `account` mirrors the control plane's JSON records, `bucket` and `object`
//! carry the validated names used against the object store.

pub mod account;
pub mod bucket;
pub mod credentials;
pub mod object;
