//! Caching reverse-proxy for the Visual Crossing weather API.
//!
//! Exposes the crate's modules so integration tests can drive the router
//! directly with a fake cache store and a mocked upstream.

pub mod cache;
pub mod config;
pub mod rate_limit;
pub mod routes;
pub mod upstream;
