//! Runtime wiring for the binary.
//!
//! - [`App`] - builds the HTTP clients and the batch runner from [`Config`](crate::config::Config)
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod app;
pub mod tracing;

pub use app::App;
pub use self::tracing::setup_tracing;
