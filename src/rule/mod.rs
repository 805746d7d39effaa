//! Routing rules: predicates over a destination address, each bound to a
//! named outbound adapter.

mod geoip;

pub use geoip::GeoIpReader;

use crate::common::Addr;
use crate::{Error, Result};
use ipnet::IpNet;
use std::fmt;
use std::sync::Arc;

/// Rule kind, in the config grammar's spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    DomainSuffix,
    DomainKeyword,
    GeoIp,
    IpCidr,
    Final,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::DomainSuffix => write!(f, "DOMAIN-SUFFIX"),
            RuleKind::DomainKeyword => write!(f, "DOMAIN-KEYWORD"),
            RuleKind::GeoIp => write!(f, "GEOIP"),
            RuleKind::IpCidr => write!(f, "IP-CIDR"),
            RuleKind::Final => write!(f, "FINAL"),
        }
    }
}

impl TryFrom<&str> for RuleKind {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DOMAIN-SUFFIX" => Ok(RuleKind::DomainSuffix),
            "DOMAIN-KEYWORD" => Ok(RuleKind::DomainKeyword),
            "GEOIP" => Ok(RuleKind::GeoIp),
            "IP-CIDR" | "IP-CIDR6" => Ok(RuleKind::IpCidr),
            "FINAL" | "MATCH" => Ok(RuleKind::Final),
            _ => Err(Error::rule(format!("Unknown rule kind: {}", s))),
        }
    }
}

/// A single routing rule.
///
/// The variant set is closed; rules are evaluated in declaration order and
/// the first match wins. `Final` always matches and, when present, sits at
/// the end of the table.
#[derive(Clone)]
pub enum Rule {
    DomainSuffix {
        suffix: String,
        adapter: String,
    },
    DomainKeyword {
        keyword: String,
        adapter: String,
    },
    GeoIp {
        country: String,
        adapter: String,
        reader: Arc<GeoIpReader>,
    },
    IpCidr {
        net: IpNet,
        adapter: String,
    },
    Final {
        adapter: String,
    },
}

impl Rule {
    pub fn is_match(&self, addr: &Addr) -> bool {
        match self {
            Rule::DomainSuffix { suffix, .. } => {
                let host = addr.host().to_lowercase();
                let suffix = suffix.to_lowercase();
                host == suffix || host.ends_with(&format!(".{}", suffix))
            }
            Rule::DomainKeyword { keyword, .. } => {
                addr.host().to_lowercase().contains(&keyword.to_lowercase())
            }
            Rule::GeoIp {
                country, reader, ..
            } => match addr.ip() {
                Some(ip) => reader.matches(ip, country),
                None => false,
            },
            Rule::IpCidr { net, .. } => match addr.ip() {
                Some(ip) => net.contains(&ip),
                None => false,
            },
            Rule::Final { .. } => true,
        }
    }

    /// Name of the outbound adapter this rule routes to
    pub fn adapter(&self) -> &str {
        match self {
            Rule::DomainSuffix { adapter, .. }
            | Rule::DomainKeyword { adapter, .. }
            | Rule::GeoIp { adapter, .. }
            | Rule::IpCidr { adapter, .. }
            | Rule::Final { adapter } => adapter,
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::DomainSuffix { .. } => RuleKind::DomainSuffix,
            Rule::DomainKeyword { .. } => RuleKind::DomainKeyword,
            Rule::GeoIp { .. } => RuleKind::GeoIp,
            Rule::IpCidr { .. } => RuleKind::IpCidr,
            Rule::Final { .. } => RuleKind::Final,
        }
    }

    /// The rule in its config-line spelling, for snapshots and logs
    pub fn describe(&self) -> String {
        match self {
            Rule::DomainSuffix { suffix, adapter } => {
                format!("DOMAIN-SUFFIX,{},{}", suffix, adapter)
            }
            Rule::DomainKeyword { keyword, adapter } => {
                format!("DOMAIN-KEYWORD,{},{}", keyword, adapter)
            }
            Rule::GeoIp {
                country, adapter, ..
            } => format!("GEOIP,{},{}", country, adapter),
            Rule::IpCidr { net, adapter } => format!("IP-CIDR,{},{}", net, adapter),
            Rule::Final { adapter } => format!("FINAL,{}", adapter),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
