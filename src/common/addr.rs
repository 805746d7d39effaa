//! Destination descriptor

use std::fmt;
use std::net::IpAddr;

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Udp,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "TCP"),
            Network::Udp => write!(f, "UDP"),
        }
    }
}

/// Destination of an inbound connection.
///
/// Produced by the connection acceptor, immutable afterwards. The host may be
/// a domain name with the IP left unresolved; IP-based rules only fire when
/// the acceptor supplied a resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr {
    host: String,
    ip: Option<IpAddr>,
    port: u16,
    network: Network,
}

impl Addr {
    pub fn new(network: Network, host: impl Into<String>, ip: Option<IpAddr>, port: u16) -> Self {
        Addr {
            host: host.into(),
            ip,
            port,
            network,
        }
    }

    /// TCP destination known only by host name
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Network::Tcp, host, None, port)
    }

    /// Attach the resolved IP (builder style, before the Addr is handed off)
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Address string suitable for dialing, preferring the resolved IP
    pub fn endpoint(&self) -> String {
        if let Some(ip) = self.ip {
            format!("{}:{}", ip, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.is_empty() {
            write!(f, "{}", self.endpoint())
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_display() {
        let addr = Addr::tcp("example.com", 443);
        assert_eq!(addr.to_string(), "example.com:443");
        assert_eq!(addr.endpoint(), "example.com:443");
    }

    #[test]
    fn test_endpoint_prefers_ip() {
        let addr = Addr::tcp("example.com", 443).with_ip("93.184.216.34".parse().unwrap());
        assert_eq!(addr.endpoint(), "93.184.216.34:443");
        assert_eq!(addr.to_string(), "example.com:443");
    }
}
