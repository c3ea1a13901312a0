//! Minimal JSON API server library.

pub mod config;
pub mod database;
pub mod docs;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{AppContext, Shutdown};
