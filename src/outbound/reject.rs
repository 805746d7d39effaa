//! Reject outbound (blackhole matched traffic)

use super::{OutboundProxy, ProxyStream, ProxyType};
use crate::common::Addr;
use crate::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Fails every connect immediately, terminating the connection's handling.
pub struct Reject;

impl Reject {
    pub fn new() -> Self {
        Reject
    }
}

impl Default for Reject {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundProxy for Reject {
    fn name(&self) -> &str {
        "REJECT"
    }

    fn proxy_type(&self) -> ProxyType {
        ProxyType::Reject
    }

    async fn connect(&self, addr: &Addr) -> Result<Box<dyn ProxyStream>> {
        debug!("REJECT {}", addr);
        Err(Error::connection(format!("connection to {} rejected", addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reject_always_fails() {
        let reject = Reject::new();
        assert_eq!(reject.name(), "REJECT");
        let result = reject.connect(&Addr::tcp("example.com", 443)).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
