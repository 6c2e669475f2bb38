//! Testu API server library.
//!
//! Exposes the building blocks (config, state, engine, status streams,
//! routes, error handling) so integration tests and the binary entrypoint
//! can both access them.

pub mod app;
pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod pages;
pub mod query;
pub mod routes;
pub mod state;
pub mod stream;
pub mod tls;
