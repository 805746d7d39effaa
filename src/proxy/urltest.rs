//! URL-test proxy group
//!
//! Owns an ordered set of member proxies and a background probe task that
//! periodically measures each member's latency toward the test URL, keeping
//! the fastest reachable member selected.

use crate::common::Addr;
use crate::outbound::{OutboundProxy, ProxyStream, ProxyType};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct UrlTest {
    name: String,
    members: Vec<Arc<dyn OutboundProxy>>,
    selected: RwLock<usize>,
    probe_addr: Addr,
    test_url: String,
    interval: Duration,
    cancel: CancellationToken,
}

impl UrlTest {
    /// Create the group and start its probe task.
    ///
    /// Fails on an empty member list or an unparsable test URL. Exactly one
    /// probe task runs per instance; it stops when `close` is called.
    pub fn new(
        name: &str,
        members: Vec<Arc<dyn OutboundProxy>>,
        test_url: &str,
        interval: Duration,
    ) -> Result<Arc<Self>> {
        if members.is_empty() {
            return Err(Error::config(format!(
                "url-test group {} has no resolvable members",
                name
            )));
        }

        let group = Arc::new(UrlTest {
            name: name.to_string(),
            members,
            selected: RwLock::new(0),
            probe_addr: parse_probe_addr(name, test_url)?,
            test_url: test_url.to_string(),
            interval,
            cancel: CancellationToken::new(),
        });

        tokio::spawn(Self::probe_loop(group.clone()));
        Ok(group)
    }

    /// Name of the currently selected member
    pub fn now(&self) -> String {
        self.members[*self.selected.read()].name().to_string()
    }

    pub fn members(&self) -> &[Arc<dyn OutboundProxy>] {
        &self.members
    }

    pub fn test_url(&self) -> &str {
        &self.test_url
    }

    async fn probe_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.probe_once().await,
            }
        }
        debug!("url-test group {} probe task stopped", self.name);
    }

    /// One probe cycle: measure every member, then select the fastest
    /// reachable one, ties going to the earliest declared. When no member is
    /// reachable the previous selection is retained.
    pub(crate) async fn probe_once(&self) {
        let mut best: Option<(usize, Duration)> = None;

        for (idx, member) in self.members.iter().enumerate() {
            let start = Instant::now();
            match tokio::time::timeout(PROBE_TIMEOUT, member.connect(&self.probe_addr)).await {
                Ok(Ok(_stream)) => {
                    let latency = start.elapsed();
                    debug!(
                        "url-test {}: {} {}ms",
                        self.name,
                        member.name(),
                        latency.as_millis()
                    );
                    if best.map_or(true, |(_, b)| latency < b) {
                        best = Some((idx, latency));
                    }
                }
                _ => {
                    debug!("url-test {}: {} unreachable", self.name, member.name());
                }
            }
        }

        if let Some((idx, _)) = best {
            *self.selected.write() = idx;
        }
    }
}

fn parse_probe_addr(name: &str, test_url: &str) -> Result<Addr> {
    let url = Url::parse(test_url)
        .map_err(|e| Error::config(format!("url-test group {}: bad test url: {}", name, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::config(format!("url-test group {}: test url has no host", name)))?;
    let port = url.port_or_known_default().unwrap_or(80);
    Ok(Addr::tcp(host, port))
}

#[async_trait]
impl OutboundProxy for UrlTest {
    fn name(&self) -> &str {
        &self.name
    }

    fn proxy_type(&self) -> ProxyType {
        ProxyType::UrlTest
    }

    async fn connect(&self, addr: &Addr) -> Result<Box<dyn ProxyStream>> {
        // Capture the selection before any await; it may change underneath us
        let member = {
            let idx = *self.selected.read();
            self.members[idx].clone()
        };
        member.connect(addr).await
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    struct FakeMember {
        name: String,
        latency_ms: AtomicU64,
        reachable: AtomicBool,
        probes: AtomicUsize,
    }

    impl FakeMember {
        fn new(name: &str, latency_ms: u64) -> Arc<Self> {
            Arc::new(FakeMember {
                name: name.to_string(),
                latency_ms: AtomicU64::new(latency_ms),
                reachable: AtomicBool::new(true),
                probes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl OutboundProxy for FakeMember {
        fn name(&self) -> &str {
            &self.name
        }

        fn proxy_type(&self) -> ProxyType {
            ProxyType::Direct
        }

        async fn connect(&self, _addr: &Addr) -> Result<Box<dyn ProxyStream>> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if !self.reachable.load(Ordering::SeqCst) {
                return Err(Error::connection("unreachable"));
            }
            tokio::time::sleep(Duration::from_millis(self.latency_ms.load(Ordering::SeqCst)))
                .await;
            let (near, _far) = tokio::io::duplex(8);
            Ok(Box::new(near))
        }
    }

    fn group(members: Vec<Arc<dyn OutboundProxy>>) -> Arc<UrlTest> {
        // Hour-long interval so only explicit probe_once calls drive selection
        UrlTest::new(
            "auto",
            members,
            "http://www.gstatic.com/generate_204",
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_selects_lowest_latency_member() {
        let a = FakeMember::new("A", 50);
        let b = FakeMember::new("B", 5);
        let g = group(vec![a.clone(), b.clone()]);

        g.probe_once().await;
        assert_eq!(g.now(), "B");
    }

    #[tokio::test]
    async fn test_retains_selection_when_all_unreachable() {
        let a = FakeMember::new("A", 50);
        let b = FakeMember::new("B", 5);
        let g = group(vec![a.clone(), b.clone()]);

        g.probe_once().await;
        assert_eq!(g.now(), "B");

        a.reachable.store(false, Ordering::SeqCst);
        b.reachable.store(false, Ordering::SeqCst);
        g.probe_once().await;
        assert_eq!(g.now(), "B");
    }

    #[tokio::test]
    async fn test_fails_over_to_reachable_member() {
        let a = FakeMember::new("A", 50);
        let b = FakeMember::new("B", 5);
        let g = group(vec![a.clone(), b.clone()]);

        g.probe_once().await;
        assert_eq!(g.now(), "B");

        b.reachable.store(false, Ordering::SeqCst);
        g.probe_once().await;
        assert_eq!(g.now(), "A");
    }

    #[tokio::test]
    async fn test_tie_break_by_declaration_order() {
        let a = FakeMember::new("A", 0);
        let b = FakeMember::new("B", 0);
        let g = group(vec![a.clone(), b.clone()]);

        g.probe_once().await;
        assert_eq!(g.now(), "A");
    }

    #[tokio::test]
    async fn test_connect_delegates_to_selected() {
        let a = FakeMember::new("A", 20);
        let b = FakeMember::new("B", 0);
        let g = group(vec![a.clone(), b.clone()]);

        g.probe_once().await;
        let before = b.probes.load(Ordering::SeqCst);
        g.connect(&Addr::tcp("example.com", 443)).await.unwrap();
        assert_eq!(b.probes.load(Ordering::SeqCst), before + 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_probing() {
        let a = FakeMember::new("A", 0);
        let g = UrlTest::new(
            "auto",
            vec![a.clone() as Arc<dyn OutboundProxy>],
            "http://www.gstatic.com/generate_204",
            Duration::from_millis(10),
        )
        .unwrap();

        // Let the probe task run at least once
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(a.probes.load(Ordering::SeqCst) > 0);

        g.close();
        g.close();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let settled = a.probes.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(a.probes.load(Ordering::SeqCst), settled);
    }

    #[tokio::test]
    async fn test_empty_member_list_is_an_error() {
        let result = UrlTest::new(
            "auto",
            Vec::new(),
            "http://www.gstatic.com/generate_204",
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_bad_test_url_is_an_error() {
        let a = FakeMember::new("A", 0);
        let result = UrlTest::new(
            "auto",
            vec![a as Arc<dyn OutboundProxy>],
            "::not a url::",
            Duration::from_secs(1),
        );
        assert!(result.is_err());
    }
}
