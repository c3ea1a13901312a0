//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (pipeline assembly, serve loop)
//!     → request.rs (request ID, client address, per-request context)
//!     → body.rs (JSON parsing, size limit)
//!     → static_files.rs (public directory)
//!     → [routing decides handler]
//!     → error.rs / response.rs (error taxonomy, payload shapes)
//!     → Send to client
//! ```

pub mod body;
pub mod error;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use error::ApiError;
pub use request::{RequestContext, X_REQUEST_ID};
pub use server::HttpServer;
