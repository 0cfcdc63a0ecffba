//! HTTP API over the trip collaboration facade.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
