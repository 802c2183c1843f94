//! Limiter key resolution behind reverse proxies.
//!
//! The candidate chain is the socket peer followed by the `X-Forwarded-For`
//! entries read right to left. With `trusted_hops` proxies in front of us,
//! the client is the entry `trusted_hops` steps down that chain, or the
//! furthest one available.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let mut chain: Vec<String> = Vec::new();
    if let Some(peer) = peer {
        chain.push(normalize_ip(peer.ip()).to_string());
    }
    if trusted_hops > 0 {
        let forwarded = headers
            .get_all(FORWARDED_FOR)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        chain.extend(forwarded.into_iter().rev());
    }

    if chain.is_empty() {
        return UNKNOWN_CLIENT.to_string();
    }
    let index = trusted_hops.min(chain.len() - 1);
    chain.swap_remove(index)
}

/// IPv4-mapped IPv6 peers count as their IPv4 address.
fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}
