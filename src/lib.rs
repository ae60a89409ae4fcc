#![deny(missing_docs)]

//! Core library for the DocQuery analysis server.

/// Single- and multi-file analysis orchestration.
pub mod analysis;
/// HTTP routing and REST handlers.
pub mod api;
/// Supervised analysis backend and completion client.
pub mod backend;
/// Environment-driven configuration management.
pub mod config;
/// File classification and content extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Analysis metrics helpers.
pub mod metrics;
/// Read-only artifact store boundary.
pub mod storage;
