//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (protective response headers, applied on the way out)
//!     → access_control.rs (origin allow-list, preflight)
//!     → rate_limit.rs (per-client fixed window)
//!     → Pass to body parsing and routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: a rejected check ends the request
//! - No trust in forwarded client addresses unless configured

pub mod access_control;
pub mod headers;
pub mod rate_limit;
