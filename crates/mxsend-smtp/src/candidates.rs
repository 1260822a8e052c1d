//! Delivery candidates and the resolver seam.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use crate::{Error, Result};

/// Address family tie-break inside one priority bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FamilyPreference {
    /// IPv4 addresses are tried first.
    Ipv4First,
    /// IPv6 addresses are tried first.
    #[default]
    Ipv6First,
}

impl FamilyPreference {
    /// Orders two addresses by family; addresses of the same family are
    /// equal so a stable sort keeps their resolver order.
    #[must_use]
    pub fn compare(self, a: &IpAddr, b: &IpAddr) -> Ordering {
        let rank = |ip: &IpAddr| match (self, ip) {
            (Self::Ipv4First, IpAddr::V4(_)) | (Self::Ipv6First, IpAddr::V6(_)) => 0u8,
            _ => 1,
        };
        rank(a).cmp(&rank(b))
    }
}

/// One mail exchanger: a priority, an optional name and its addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxCandidate {
    /// MX priority, lower is preferred.
    pub priority: u16,
    /// Host name, if known.
    pub host: Option<String>,
    /// Addresses to try, in order.
    pub addresses: Vec<IpAddr>,
}

impl MxCandidate {
    /// Creates a candidate.
    #[must_use]
    pub fn new(priority: u16, host: Option<String>, addresses: Vec<IpAddr>) -> Self {
        Self {
            priority,
            host,
            addresses,
        }
    }
}

/// One address to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name, or the address itself when the candidate has no name.
    pub name: String,
    /// Socket address.
    pub addr: SocketAddr,
    /// Priority of the owning candidate.
    pub priority: u16,
}

/// Candidates ordered by priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    candidates: Vec<MxCandidate>,
}

impl CandidateList {
    /// Wraps candidates that are already in delivery order.
    #[must_use]
    pub const fn new(candidates: Vec<MxCandidate>) -> Self {
        Self { candidates }
    }

    /// Sorts candidates by priority and the addresses of each candidate with
    /// `compare`. Both sorts are stable.
    #[must_use]
    pub fn sorted_by<F>(mut candidates: Vec<MxCandidate>, compare: F) -> Self
    where
        F: Fn(&IpAddr, &IpAddr) -> Ordering,
    {
        candidates.sort_by_key(|c| c.priority);
        for candidate in &mut candidates {
            candidate.addresses.sort_by(&compare);
        }
        Self { candidates }
    }

    /// Sorts candidates with a [`FamilyPreference`].
    #[must_use]
    pub fn sorted(candidates: Vec<MxCandidate>, preference: FamilyPreference) -> Self {
        Self::sorted_by(candidates, |a, b| preference.compare(a, b))
    }

    /// Returns the candidates.
    #[must_use]
    pub fn candidates(&self) -> &[MxCandidate] {
        &self.candidates
    }

    /// Returns true if there is no address to try.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.iter().all(|c| c.addresses.is_empty())
    }

    /// Iterates over every address in delivery order.
    pub fn targets(&self, port: u16) -> impl Iterator<Item = Target> + '_ {
        self.candidates.iter().flat_map(move |candidate| {
            candidate.addresses.iter().map(move |&ip| Target {
                name: candidate
                    .host
                    .clone()
                    .unwrap_or_else(|| ip.to_string()),
                addr: SocketAddr::new(ip, port),
                priority: candidate.priority,
            })
        })
    }
}

/// Looks up delivery candidates and DANE records.
pub trait Resolver: Send + Sync {
    /// Returns the mail exchangers of `domain` in delivery order.
    fn resolve_mx(&self, domain: &str) -> impl Future<Output = Result<CandidateList>> + Send;

    /// Returns true if TLSA records are published for `host` and `port`.
    fn has_tlsa(&self, host: &str, port: u16) -> impl Future<Output = bool> + Send;
}

/// A configured mail exchanger of a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// MX priority.
    pub priority: u16,
    /// Host name.
    pub host: String,
    /// Fixed addresses. When empty the host name is looked up.
    pub addresses: Vec<IpAddr>,
    /// Host publishes TLSA records.
    pub tlsa: bool,
}

/// Resolver backed by configured routes.
///
/// Domains without a route fall back to an implicit MX: the domain's own
/// addresses at priority 0.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    routes: HashMap<String, Vec<Route>>,
    preference: FamilyPreference,
    port: u16,
}

impl StaticResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        routes: HashMap<String, Vec<Route>>,
        preference: FamilyPreference,
        port: u16,
    ) -> Self {
        let routes = routes
            .into_iter()
            .map(|(domain, routes)| (domain.to_ascii_lowercase(), routes))
            .collect();
        Self {
            routes,
            preference,
            port,
        }
    }

    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, self.port))
            .await
            .map_err(|e| Error::Resolve {
                domain: host.to_string(),
                reason: e.to_string(),
            })?;
        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        Ok(ips)
    }
}

impl Resolver for StaticResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<CandidateList> {
        let key = domain.to_ascii_lowercase();
        let mut candidates = Vec::new();

        if let Some(routes) = self.routes.get(&key) {
            for route in routes {
                let addresses = if route.addresses.is_empty() {
                    self.lookup(&route.host).await?
                } else {
                    route.addresses.clone()
                };
                candidates.push(MxCandidate::new(
                    route.priority,
                    Some(route.host.clone()),
                    addresses,
                ));
            }
        } else {
            tracing::debug!(domain, "no route configured, using implicit MX");
            let addresses = self.lookup(domain).await?;
            candidates.push(MxCandidate::new(0, Some(domain.to_string()), addresses));
        }

        let list = CandidateList::sorted(candidates, self.preference);
        if list.is_empty() {
            return Err(Error::NoMailExchanger(domain.to_string()));
        }
        Ok(list)
    }

    async fn has_tlsa(&self, host: &str, port: u16) -> bool {
        port == self.port
            && self
                .routes
                .values()
                .flatten()
                .any(|route| route.tlsa && route.host.eq_ignore_ascii_case(host))
    }
}
