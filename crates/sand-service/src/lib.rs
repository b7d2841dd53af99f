//! SAND Service
//!
//! Reference HTTP service whose API routes are guarded by SAND token
//! verification. Exposed as a library so integration tests can build the
//! router without binding a port.

pub mod config;
pub mod errors;
pub mod observability;
pub mod routes;
