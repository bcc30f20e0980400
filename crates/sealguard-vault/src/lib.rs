//! HTTP-backed implementations of the sealguard trait seams.
//!
//! `VaultClient` speaks the Vault `sys/health` and `sys/unseal` API;
//! `GraphiteQueueSink` pushes seal-state samples to a collector queue.

mod client;
mod graphite;

pub use client::{classify_health, VaultClient};
pub use graphite::GraphiteQueueSink;
