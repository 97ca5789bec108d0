//! WAN IP extraction from the router status page.

use crate::config::LanNetwork;
use regex::Regex;
use std::{net::Ipv4Addr, sync::OnceLock};

/// The status page lists the LAN address first and the WAN address second.
const WAN_IP_MATCH_INDEX: usize = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpClass {
    External,
    Internal,
}

fn dotted_quad() -> &'static Regex {
    static DOTTED_QUAD: OnceLock<Regex> = OnceLock::new();
    DOTTED_QUAD.get_or_init(|| {
        Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("invalid dotted quad regex")
    })
}

/// Extract the WAN IP from the page body
///
/// Returns `None` when the page holds fewer than two dotted quads or the
/// second one is not a valid IPv4 address.
pub fn extract_wan_ip(body: &str) -> Option<Ipv4Addr> {
    dotted_quad()
        .find_iter(body)
        .nth(WAN_IP_MATCH_INDEX)
        .and_then(|m| m.as_str().parse().ok())
}

pub fn classify(ip: Ipv4Addr, lan_network: &LanNetwork) -> IpClass {
    if lan_network.contains(ip) {
        IpClass::Internal
    } else {
        IpClass::External
    }
}
