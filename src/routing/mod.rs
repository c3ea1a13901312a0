//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request that survived every pipeline stage
//!     → router.rs (verb + path lookup, dual mount)
//!     → validation.rs (route middleware, POST /api/data only)
//!     → handlers.rs
//!     → or: not-found fallback (API-scoped JSON vs plain page)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Wrong method on a known path is treated as not found
//! - Validation failure never reaches the handler

pub mod handlers;
pub mod router;
pub mod validation;

pub use router::build_router;
