//! Shadowsocks outbound adapter
//!
//! Carries the routing-side contract of a tunnel-backed proxy: constructed
//! from an `ss://` URL, dials the tunnel endpoint, metered against the shared
//! traffic counters. The cipher framing itself lives behind this boundary and
//! is supplied by the transport layer.

use super::{OutboundProxy, ProxyStream, ProxyType};
use crate::common::Addr;
use crate::statistic::{MeteredStream, TrafficMeter};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

pub struct Shadowsocks {
    name: String,
    server: String,
    port: u16,
    cipher: String,
    password: String,
    meter: Arc<TrafficMeter>,
}

impl Shadowsocks {
    /// Build from an `ss://cipher:password@server:port` URL.
    ///
    /// A malformed URL is a hard validation failure, fatal to the reload that
    /// declared this proxy.
    pub fn from_url(name: &str, url: &str, meter: Arc<TrafficMeter>) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::proxy(format!("invalid ss url for {}: {}", name, e)))?;

        if parsed.scheme() != "ss" {
            return Err(Error::proxy(format!(
                "invalid ss url for {}: scheme {}",
                name,
                parsed.scheme()
            )));
        }

        let server = parsed
            .host_str()
            .ok_or_else(|| Error::proxy(format!("invalid ss url for {}: missing host", name)))?
            .to_string();
        let port = parsed
            .port()
            .ok_or_else(|| Error::proxy(format!("invalid ss url for {}: missing port", name)))?;

        let cipher = parsed.username().to_string();
        let password = parsed
            .password()
            .ok_or_else(|| Error::proxy(format!("invalid ss url for {}: missing password", name)))?
            .to_string();

        if cipher.is_empty() {
            return Err(Error::proxy(format!(
                "invalid ss url for {}: missing cipher",
                name
            )));
        }

        Ok(Shadowsocks {
            name: name.to_string(),
            server,
            port,
            cipher,
            password,
            meter,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

#[async_trait]
impl OutboundProxy for Shadowsocks {
    fn name(&self) -> &str {
        &self.name
    }

    fn proxy_type(&self) -> ProxyType {
        ProxyType::Shadowsocks
    }

    async fn connect(&self, addr: &Addr) -> Result<Box<dyn ProxyStream>> {
        let endpoint = format!("{}:{}", self.server, self.port);
        debug!("{} connecting to {} via {}", self.name, addr, endpoint);

        let stream = TcpStream::connect(&endpoint).await.map_err(|e| {
            Error::connection(format!("{}: failed to reach {}: {}", self.name, endpoint, e))
        })?;

        Ok(Box::new(MeteredStream::new(stream, self.meter.clone())))
    }
}
