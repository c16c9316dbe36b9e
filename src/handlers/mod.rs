pub mod account_handlers;
pub mod auth;
pub mod file_handlers;
pub mod health_handlers;
