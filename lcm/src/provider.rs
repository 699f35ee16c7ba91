//! Provider url parsing.

use std::net::Ipv4Addr;

use tracing::warn;

use crate::error::Error;

/// Configuration of the UDP multicast provider, parsed from a
/// `udpm://[address[:port]]?ttl=N` url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpmConfig {
    /// Multicast group to join and publish to.
    pub address: Ipv4Addr,
    /// UDP port of the group.
    pub port: u16,
    /// Multicast time-to-live. Zero keeps packets on the local host.
    pub ttl: u32,
}

impl Default for UdpmConfig {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::new(239, 255, 76, 67),
            port: 7667,
            ttl: 0,
        }
    }
}

impl UdpmConfig {
    /// Parse a provider url. The scheme must be `udpm`; address, port,
    /// and `ttl` are optional and default to `239.255.76.67`, `7667`,
    /// and `0`.
    pub fn parse(url: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidProvider(format!("`{url}`: {reason}"));

        let rest = url
            .strip_prefix("udpm://")
            .ok_or_else(|| invalid("the scheme must be `udpm`"))?;
        let (authority, query) = match rest.split_once('?') {
            Some((authority, query)) => (authority, Some(query)),
            None => (rest, None),
        };

        let mut config = Self::default();
        if !authority.is_empty() {
            let (address, port) = match authority.split_once(':') {
                Some((address, port)) => (address, Some(port)),
                None => (authority, None),
            };
            config.address = address
                .parse()
                .map_err(|_| invalid("the address is not an IPv4 address"))?;
            if let Some(port) = port {
                config.port = port
                    .parse()
                    .map_err(|_| invalid("the port is not a 16-bit integer"))?;
            }
        }

        let options = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter(|option| !option.is_empty());
        for option in options {
            match option.split_once('=') {
                Some(("ttl", value)) => {
                    config.ttl = value
                        .parse()
                        .map_err(|_| invalid("the ttl is not an integer"))?;
                }
                _ => return Err(invalid("the only recognized option is `ttl`")),
            }
        }

        if !config.address.is_multicast() {
            return Err(invalid("the address is not a multicast group"));
        }
        if config.ttl > 1 {
            warn!(
                ttl = config.ttl,
                "multicast ttl above 1: published packets will be forwarded beyond the local subnet"
            );
        }
        Ok(config)
    }
}
