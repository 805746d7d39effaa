//! Tunnel core: owns the routing tables, dispatches inbound connections to
//! outbound adapters, and republishes structured events on the log bus.

mod log;

pub use log::{LogEvent, LogLevel};

use crate::config::{self, Compiled, Document};
use crate::observable::Observable;
use crate::outbound::{Direct, OutboundProxy, Reject};
use crate::rule::{GeoIpReader, Rule};
use crate::statistic::TrafficMeter;
use crate::common::Addr;
use crate::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Connection handle supplied by the acceptor side.
///
/// Dropping the handle closes the local leg; the tunnel relies on that on
/// every exit path.
pub trait InboundConn: AsyncRead + AsyncWrite + Send + Unpin {
    fn addr(&self) -> &Addr;
}

/// The rule table and proxy table of one configuration generation. Always
/// swapped as a unit, so a match never pairs a rule with a proxy table from a
/// different generation.
pub struct RouterTables {
    pub rules: Vec<Rule>,
    pub proxies: HashMap<String, Arc<dyn OutboundProxy>>,
}

impl RouterTables {
    /// Tables containing only the reserved adapters
    fn builtin(meter: &Arc<TrafficMeter>) -> Self {
        let mut proxies: HashMap<String, Arc<dyn OutboundProxy>> = HashMap::new();
        proxies.insert("DIRECT".to_string(), Arc::new(Direct::new(meter.clone())));
        proxies.insert("REJECT".to_string(), Arc::new(Reject::new()));
        RouterTables {
            rules: Vec::new(),
            proxies,
        }
    }
}

/// Routing core. One instance per process, created at startup and shared by
/// reference with the acceptor and the control plane.
pub struct Tunnel {
    queue: mpsc::UnboundedSender<Box<dyn InboundConn>>,
    tables: RwLock<Arc<RouterTables>>,
    bus: Observable<LogEvent>,
    traffic: Arc<TrafficMeter>,
    geoip: Arc<GeoIpReader>,
    config_path: PathBuf,
}

impl Tunnel {
    /// Create the tunnel and start its dispatch loop.
    pub fn new(config_path: impl Into<PathBuf>) -> Arc<Self> {
        Self::with_geoip(config_path, Arc::new(GeoIpReader::default()))
    }

    pub fn with_geoip(config_path: impl Into<PathBuf>, geoip: Arc<GeoIpReader>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let traffic = Arc::new(TrafficMeter::new());

        let tunnel = Arc::new(Tunnel {
            queue: tx,
            tables: RwLock::new(Arc::new(RouterTables::builtin(&traffic))),
            bus: Observable::new(),
            traffic,
            geoip,
            config_path: config_path.into(),
        });

        tokio::spawn(Self::dispatch(tunnel.clone(), rx));
        tunnel
    }

    /// Enqueue an inbound connection. Never blocks; the queue is unbounded,
    /// so a sustained burst grows memory until handling tasks drain it.
    pub fn submit(&self, conn: Box<dyn InboundConn>) {
        let _ = self.queue.send(conn);
    }

    /// Traffic counters shared with the adapters
    pub fn traffic(&self) -> &Arc<TrafficMeter> {
        &self.traffic
    }

    /// Log broadcast bus
    pub fn log(&self) -> &Observable<LogEvent> {
        &self.bus
    }

    /// Point-in-time snapshot of the live tables
    pub fn tables(&self) -> Arc<RouterTables> {
        self.tables.read().clone()
    }

    /// Reload the configuration document and atomically swap in the compiled
    /// tables. On any failure the live tables are left untouched. Probe tasks
    /// of every superseded group are stopped, even when the new table holds a
    /// same-named group.
    pub async fn update_config(&self) -> Result<()> {
        let doc = Document::load(&self.config_path)?;
        let compiled = config::compile(&doc, &self.traffic, &self.geoip)?;
        info!(
            "configuration loaded: {} rules, {} proxies",
            compiled.rules.len(),
            compiled.proxies.len()
        );
        self.apply(compiled);
        Ok(())
    }

    /// Swap in already-compiled tables, tearing down the previous generation's
    /// background tasks.
    pub fn apply(&self, compiled: Compiled) {
        let next = Arc::new(RouterTables {
            rules: compiled.rules,
            proxies: compiled.proxies,
        });

        let mut tables = self.tables.write();
        for proxy in tables.proxies.values() {
            proxy.close();
        }
        *tables = next;
    }

    /// Resolve the proxy for a destination: first matching rule wins, a stale
    /// adapter name or the absence of any match falls back to DIRECT. The
    /// table lock is released before the caller performs any I/O.
    pub fn match_proxy(&self, addr: &Addr) -> Arc<dyn OutboundProxy> {
        let tables = self.tables();

        for rule in &tables.rules {
            if !rule.is_match(addr) {
                continue;
            }
            if let Some(proxy) = tables.proxies.get(rule.adapter()) {
                self.emit(
                    LogLevel::Info,
                    format!("{} match {} using {}", addr, rule.kind(), rule.adapter()),
                );
                return proxy.clone();
            }
            self.emit(
                LogLevel::Info,
                format!(
                    "{} match {} but adapter {} is gone, using DIRECT",
                    addr,
                    rule.kind(),
                    rule.adapter()
                ),
            );
            return self.direct_of(&tables);
        }

        self.emit(
            LogLevel::Info,
            format!("{} doesn't match any rule, using DIRECT", addr),
        );
        self.direct_of(&tables)
    }

    fn direct_of(&self, tables: &RouterTables) -> Arc<dyn OutboundProxy> {
        tables
            .proxies
            .get("DIRECT")
            .cloned()
            .unwrap_or_else(|| Arc::new(Direct::new(self.traffic.clone())))
    }

    async fn dispatch(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Box<dyn InboundConn>>) {
        while let Some(conn) = rx.recv().await {
            let tunnel = self.clone();
            tokio::spawn(async move {
                tunnel.handle(conn).await;
            });
        }
    }

    /// Handle one inbound connection end to end. Both legs are owned here and
    /// closed when this task returns, whichever path it takes.
    async fn handle(&self, mut local: Box<dyn InboundConn>) {
        let addr = local.addr().clone();
        let proxy = self.match_proxy(&addr);

        let mut remote = match proxy.connect(&addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.emit(LogLevel::Warning, format!("Proxy connect error: {}", e));
                return;
            }
        };

        match tokio::io::copy_bidirectional(&mut local, &mut remote).await {
            Ok((up, down)) => {
                self.emit(
                    LogLevel::Debug,
                    format!("{} closed, {}B up {}B down", addr, up, down),
                );
            }
            Err(e) => {
                self.emit(LogLevel::Debug, format!("{} relay ended: {}", addr, e));
            }
        }
    }

    fn emit(&self, level: LogLevel, payload: String) {
        match level {
            LogLevel::Debug => debug!("{}", payload),
            LogLevel::Info => info!("{}", payload),
            LogLevel::Warning => warn!("{}", payload),
            LogLevel::Error => error!("{}", payload),
        }
        self.bus.publish(LogEvent::new(level, payload));
    }
}
