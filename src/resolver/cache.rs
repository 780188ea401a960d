use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use super::NameResolver;

/// How a client token was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The token itself (or a cached entry for it) gave the address
    Direct(IpAddr),
    /// Only the token's base domain resolved
    Fallback(IpAddr),
    /// Neither the token nor its base domain resolved
    Unresolved,
}

impl Resolution {
    pub fn address(&self) -> Option<IpAddr> {
        match self {
            Resolution::Direct(ip) | Resolution::Fallback(ip) => Some(*ip),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback(_))
    }
}

/// Token to address cache shared by every enrichment task of a pipeline run.
///
/// Entries never expire. Unresolved tokens are not cached, so a later
/// lookup of the same token tries the network again.
pub struct ResolutionCache {
    resolver: Arc<dyn NameResolver>,
    entries: DashMap<String, IpAddr>,
}

impl ResolutionCache {
    pub fn new(resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            resolver,
            entries: DashMap::new(),
        }
    }

    /// Resolve a client token to an address.
    ///
    /// A cache hit is always reported as [`Resolution::Direct`], even when
    /// the entry was originally stored through the base-domain fallback.
    pub async fn resolve(&self, token: &str) -> Resolution {
        if let Some(cached) = self.entries.get(token) {
            return Resolution::Direct(*cached.value());
        }

        if let Ok(ip) = token.parse::<IpAddr>() {
            self.entries.insert(token.to_string(), ip);
            return Resolution::Direct(ip);
        }

        if let Some(ip) = self.first_address(token).await {
            self.entries.insert(token.to_string(), ip);
            return Resolution::Direct(ip);
        }

        let Some(base) = base_domain(token) else {
            return Resolution::Unresolved;
        };

        match self.first_address(base).await {
            Some(ip) => {
                debug!(token, base, %ip, "resolved through base domain");
                self.entries.insert(token.to_string(), ip);
                Resolution::Fallback(ip)
            }
            None => Resolution::Unresolved,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn first_address(&self, host: &str) -> Option<IpAddr> {
        match self.resolver.lookup(host).await {
            Ok(addrs) => {
                let first = addrs.into_iter().next();
                if first.is_none() {
                    debug!(host, "name resolution returned no addresses");
                }
                first
            }
            Err(e) => {
                debug!(host, error = %e, "name resolution failed");
                None
            }
        }
    }
}

/// Last two labels of a hostname with at least three labels.
///
/// `a.b.example.com` gives `example.com`; `example.com` gives `None`.
pub fn base_domain(host: &str) -> Option<&str> {
    let mut dots = host.rmatch_indices('.');
    dots.next()?;
    let (start, _) = dots.next()?;
    Some(&host[start + 1..])
}
