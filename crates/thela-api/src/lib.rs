//! # thela-api
//!
//! HTTP surface over the thela workflow.
//!
//! This crate provides:
//! - `ApiService`: route parsing, bearer-token actor resolution, and JSON
//!   responses over one shared `Workflow`
//! - `serve`: a blocking accept loop (one request per connection)
//! - `ServiceConfig`: TOML deployment configuration (bind address, data
//!   directory, token table)
//!
//! Error mapping: validation 400, missing records 404, role gates 403,
//! contention/stale/illegal/terminal conflicts 409. Successful mutations
//! flush the JSONL snapshots under the configured data directory.

pub mod config;
pub mod http;

pub use config::{ConfigError, ServiceConfig, TokenEntry};
pub use http::{ApiRequest, ApiService, HttpResponse, HttpServeError, serve};
