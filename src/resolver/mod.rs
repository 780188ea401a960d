//! Client token resolution with a shared, run-scoped cache
//!
//! Tokens that are already literal addresses resolve to themselves.
//! Hostnames go through the [`NameResolver`]; when that fails the
//! two-label base domain is tried instead and the hit is recorded as a
//! fallback.

mod cache;

pub use cache::{base_domain, Resolution, ResolutionCache};

use async_trait::async_trait;
use std::io;
use std::net::IpAddr;

/// Hostname to address lookup.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolve `host` to zero or more addresses.
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl NameResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}
