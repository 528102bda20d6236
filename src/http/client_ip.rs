//! Client address resolution behind reverse proxies.

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolves the address a request should be rate limited under.
///
/// `X-Forwarded-For` is only believed when the socket peer is a trusted
/// proxy. The chain is then walked from the right, skipping trusted hops,
/// and the first untrusted hop is the client. Anything else falls back to
/// the peer address.
#[derive(Debug, Clone, Default)]
pub struct ClientIpResolver {
    trusted_proxies: Arc<Vec<IpAddr>>,
}

impl ClientIpResolver {
    /// Create a resolver trusting the given proxy addresses.
    pub fn new(trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            trusted_proxies: Arc::new(trusted_proxies),
        }
    }

    /// Whether `addr` is a trusted proxy.
    pub fn is_trusted(&self, addr: IpAddr) -> bool {
        self.trusted_proxies.contains(&addr)
    }

    /// The client address for a request arriving from `peer`.
    pub fn resolve(&self, peer: IpAddr, headers: &HeaderMap) -> IpAddr {
        if !self.is_trusted(peer) {
            return peer;
        }

        let hops: Vec<IpAddr> = headers
            .get_all(FORWARDED_FOR)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|hop| hop.trim().parse().ok())
            .collect();

        hops.into_iter()
            .rev()
            .find(|hop| !self.is_trusted(*hop))
            .unwrap_or(peer)
    }
}
