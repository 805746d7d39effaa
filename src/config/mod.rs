//! Declarative routing configuration and its compiler
//!
//! A document has three sections: `proxies`, `proxy-groups` and `rules`, each
//! entry a comma-delimited value string. Malformed entries are skipped, never
//! fatal; only an unreadable document or a proxy constructor rejecting its
//! input aborts a compile.

use crate::outbound::{Direct, OutboundProxy, Reject, Shadowsocks};
use crate::proxy::UrlTest;
use crate::rule::{GeoIpReader, Rule, RuleKind};
use crate::statistic::TrafficMeter;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Probe interval applied when a group line omits or mangles its own
const DEFAULT_GROUP_INTERVAL_SECS: u64 = 300;

/// Raw configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Document {
    /// name -> "kind, server, port, cipher, password"
    pub proxies: BTreeMap<String, String>,
    /// name -> "url-test, member..., test-url, interval"
    pub proxy_groups: BTreeMap<String, String>,
    /// ordered "KIND,payload,adapter" lines
    pub rules: Vec<String>,
}

impl Document {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Output of a successful compile: the rule table and proxy table that get
/// swapped into the tunnel as a unit.
pub struct Compiled {
    pub rules: Vec<Rule>,
    pub proxies: HashMap<String, Arc<dyn OutboundProxy>>,
}

/// Compile a document into routing tables.
///
/// `DIRECT` and `REJECT` are always (re)inserted afterwards, overriding any
/// user-declared proxy with those names.
pub fn compile(
    doc: &Document,
    meter: &Arc<TrafficMeter>,
    geoip: &Arc<GeoIpReader>,
) -> Result<Compiled> {
    let mut proxies: HashMap<String, Arc<dyn OutboundProxy>> = HashMap::new();

    for (name, value) in &doc.proxies {
        let fields = split_fields(value);
        if fields.len() < 5 {
            warn!("skipping malformed proxy line {}: {}", name, value);
            continue;
        }
        match fields[0].as_str() {
            "ss" => {
                let url = format!(
                    "ss://{}:{}@{}:{}",
                    fields[3], fields[4], fields[1], fields[2]
                );
                let ss = Shadowsocks::from_url(name, &url, meter.clone())?;
                proxies.insert(name.clone(), Arc::new(ss));
            }
            kind => {
                warn!("skipping proxy {} with unknown kind {}", name, kind);
            }
        }
    }

    for (name, value) in &doc.proxy_groups {
        let fields = split_fields(value);
        if fields.len() < 4 {
            warn!("skipping malformed proxy group {}: {}", name, value);
            continue;
        }
        match fields[0].as_str() {
            "url-test" => {
                let url = &fields[fields.len() - 2];
                let interval = fields[fields.len() - 1]
                    .parse()
                    .unwrap_or(DEFAULT_GROUP_INTERVAL_SECS);

                let mut members = Vec::new();
                for member_name in &fields[1..fields.len() - 2] {
                    match proxies.get(member_name) {
                        Some(proxy) => members.push(proxy.clone()),
                        None => debug!("group {}: unknown member {}", name, member_name),
                    }
                }

                let group = match UrlTest::new(name, members, url, Duration::from_secs(interval))
                {
                    Ok(group) => group,
                    Err(e) => {
                        // Earlier groups already run probe tasks; stop them
                        // before abandoning the compile, nothing will ever
                        // reference them again.
                        for proxy in proxies.values() {
                            proxy.close();
                        }
                        return Err(e);
                    }
                };
                proxies.insert(name.clone(), group);
            }
            kind => {
                warn!("skipping proxy group {} with unknown kind {}", name, kind);
            }
        }
    }

    let mut rules = Vec::new();
    for line in &doc.rules {
        match compile_rule(line, geoip) {
            Some(rule) => rules.push(rule),
            None => warn!("skipping malformed rule line: {}", line),
        }
    }

    proxies.insert("DIRECT".to_string(), Arc::new(Direct::new(meter.clone())));
    proxies.insert("REJECT".to_string(), Arc::new(Reject::new()));

    Ok(Compiled { rules, proxies })
}

fn compile_rule(line: &str, geoip: &Arc<GeoIpReader>) -> Option<Rule> {
    let fields = split_fields(line);
    let kind = RuleKind::try_from(fields.first()?.as_str()).ok()?;

    if kind == RuleKind::Final {
        // FINAL,adapter or the older FINAL,,adapter spelling
        if fields.len() < 2 {
            return None;
        }
        let adapter = fields.last().filter(|s| !s.is_empty())?;
        return Some(Rule::Final {
            adapter: adapter.clone(),
        });
    }

    if fields.len() < 3 {
        return None;
    }
    let payload = fields[1].clone();
    let adapter = fields[2].clone();

    match kind {
        RuleKind::DomainSuffix => Some(Rule::DomainSuffix {
            suffix: payload,
            adapter,
        }),
        RuleKind::DomainKeyword => Some(Rule::DomainKeyword {
            keyword: payload,
            adapter,
        }),
        RuleKind::GeoIp => Some(Rule::GeoIp {
            country: payload,
            adapter,
            reader: geoip.clone(),
        }),
        RuleKind::IpCidr => Some(Rule::IpCidr {
            net: payload.parse().ok()?,
            adapter,
        }),
        RuleKind::Final => None,
    }
}

fn split_fields(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).collect()
}
