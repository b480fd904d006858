//! CoreDNS MySQL record store
//!
//! Persists DNS records for the CoreDNS `mysql` plugin and exposes list /
//! append / set / delete over them.

pub mod codec;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod metrics;
pub mod store;
pub mod types;

pub use context::OpContext;
pub use db::{ConnectionDescriptor, ConnectionManager};
pub use error::{BatchError, BatchResult, StoreError};
pub use store::{RecordProvider, ZoneStore};
pub use types::{Record, RecordKind};
