//! Direct outbound (no proxy)

use super::{OutboundProxy, ProxyStream, ProxyType};
use crate::common::Addr;
use crate::statistic::{MeteredStream, TrafficMeter};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::debug;

/// Opens a raw outbound connection to the destination, metered against the
/// shared traffic counters.
pub struct Direct {
    meter: Arc<TrafficMeter>,
}

impl Direct {
    pub fn new(meter: Arc<TrafficMeter>) -> Self {
        Direct { meter }
    }
}

#[async_trait]
impl OutboundProxy for Direct {
    fn name(&self) -> &str {
        "DIRECT"
    }

    fn proxy_type(&self) -> ProxyType {
        ProxyType::Direct
    }

    async fn connect(&self, addr: &Addr) -> Result<Box<dyn ProxyStream>> {
        let endpoint = addr.endpoint();
        debug!("Direct connecting to {}", endpoint);

        let stream = TcpStream::connect(&endpoint)
            .await
            .map_err(|e| Error::connection(format!("Failed to connect to {}: {}", endpoint, e)))?;

        Ok(Box::new(MeteredStream::new(stream, self.meter.clone())))
    }
}
