//! Upstream registries - metadata client for the proxied documentation sources

mod client;

pub use client::{PackageMetadata, Registry, UpstreamClient, UpstreamConfig};
