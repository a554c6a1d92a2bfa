// Library exports for mail2sheets crate
// This allows tests and other crates to use the modules

pub mod auth;
pub mod config;
pub mod error;
pub mod gmail;
pub mod http;
pub mod message;
pub mod processor;
pub mod sheets;
pub mod store;
