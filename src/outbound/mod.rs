//! Outbound adapters: strategies for opening the remote leg of a connection

mod direct;
mod reject;
mod shadowsocks;

pub use direct::Direct;
pub use reject::Reject;
pub use shadowsocks::Shadowsocks;

use crate::common::Addr;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Adapter variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyType {
    Direct,
    Reject,
    Shadowsocks,
    UrlTest,
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Direct => write!(f, "Direct"),
            ProxyType::Reject => write!(f, "Reject"),
            ProxyType::Shadowsocks => write!(f, "Shadowsocks"),
            ProxyType::UrlTest => write!(f, "URLTest"),
        }
    }
}

/// Stream returned by an adapter's `connect`
pub trait ProxyStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ProxyStream for T {}

/// An outbound-connection factory, addressed by name from the proxy table.
#[async_trait]
pub trait OutboundProxy: Send + Sync {
    fn name(&self) -> &str;

    fn proxy_type(&self) -> ProxyType;

    /// Open the remote leg toward `addr`
    async fn connect(&self, addr: &Addr) -> Result<Box<dyn ProxyStream>>;

    /// Release background resources. Idempotent; a no-op for plain adapters,
    /// overridden by groups that own a probe task.
    fn close(&self) {}
}
