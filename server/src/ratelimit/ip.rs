//! Client address resolution for IP-keyed rate limits.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use axum::http::HeaderMap;

use crate::ratelimit::constants::IPV6_PREFIX_BITS;

/// Header carrying the proxy chain, client first.
const FORWARDED_FOR: &str = "X-Forwarded-For";

/// Header carrying the single client address set by the proxy.
const REAL_IP: &str = "X-Real-IP";

/// Where a client address was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpSource {
    ForwardedFor,
    RealIp,
    Peer,
    /// No usable header and no connect info; loopback stands in.
    Unknown,
}

impl IpSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ForwardedFor => "x-forwarded-for",
            Self::RealIp => "x-real-ip",
            Self::Peer => "peer",
            Self::Unknown => "unknown",
        }
    }
}

/// A resolved client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp {
    pub addr: IpAddr,
    pub source: IpSource,
}

impl ClientIp {
    /// Resolve the client for a request. Proxy headers are read only with
    /// `trust_proxy`.
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        let from_headers = trust_proxy
            .then(|| {
                header_ip(headers, FORWARDED_FOR)
                    .map(|addr| (addr, IpSource::ForwardedFor))
                    .or_else(|| header_ip(headers, REAL_IP).map(|addr| (addr, IpSource::RealIp)))
            })
            .flatten();

        let (addr, source) = from_headers
            .or_else(|| peer.map(|p| (p.ip(), IpSource::Peer)))
            .unwrap_or((IpAddr::V4(Ipv4Addr::LOCALHOST), IpSource::Unknown));

        Self { addr, source }
    }

    /// Rate limit identifier for this client.
    ///
    /// IPv4 and IPv4-mapped IPv6 yield the dotted quad. Other IPv6 addresses
    /// yield their /64 network.
    pub fn identifier(&self) -> String {
        match self.addr {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4.to_string(),
                None => {
                    let mask = u128::MAX << (128 - IPV6_PREFIX_BITS);
                    let network = Ipv6Addr::from(u128::from(v6) & mask);
                    format!("{network}/{IPV6_PREFIX_BITS}")
                }
            },
        }
    }
}

/// First address in a comma-separated header, if it parses.
fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    value.split(',').next()?.trim().parse().ok()
}
