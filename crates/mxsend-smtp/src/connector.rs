//! MX failover and session negotiation.
//!
//! Candidates are tried strictly in order. Each connection is dropped before
//! the next one is opened, so at most one socket is open at any time.

use crate::candidates::{CandidateList, Resolver, Target};
use crate::connection::{Client, Config, Network};
use crate::{Error, Result};

/// Connects to the first candidate that completes negotiation.
pub struct Connector<'a, N, R> {
    network: &'a N,
    resolver: &'a R,
    config: &'a Config,
}

impl<'a, N, R> Connector<'a, N, R>
where
    N: Network,
    R: Resolver,
{
    /// Creates a connector.
    #[must_use]
    pub const fn new(network: &'a N, resolver: &'a R, config: &'a Config) -> Self {
        Self {
            network,
            resolver,
            config,
        }
    }

    /// Walks the candidate list until one host is ready for a mail
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] if every candidate failed for reasons of
    /// its own, or the first error that would recur on every host (local TLS
    /// setup, local I/O faults).
    pub async fn connect_and_negotiate(
        &self,
        candidates: &CandidateList,
    ) -> Result<Client<N::Stream>> {
        let mut last = None;

        for (attempt, target) in candidates.targets(self.config.port).enumerate() {
            tracing::info!(
                attempt = attempt + 1,
                host = %target.name,
                addr = %target.addr,
                priority = target.priority,
                "Connecting"
            );

            match self.negotiate(&target).await {
                Ok(client) => {
                    tracing::info!(host = %target.name, "Connected");
                    return Ok(client);
                }
                Err(e) if e.is_per_host() => {
                    tracing::warn!(host = %target.name, addr = %target.addr, error = %e, "Delivery host failed");
                    last = Some(Box::new(e));
                }
                Err(e) => {
                    tracing::error!(host = %target.name, error = %e, "Local failure, not trying other hosts");
                    return Err(e);
                }
            }
        }

        Err(Error::Exhausted { last })
    }

    async fn negotiate(&self, target: &Target) -> Result<Client<N::Stream>> {
        let stream = match self.network.connect(target.addr).await {
            Ok(stream) => stream,
            Err(Error::Io(e)) => return Err(Error::Connect(e)),
            Err(e) => return Err(e),
        };
        let mut client = Client::new(stream, target.name.clone(), self.config.io_timeout);
        let helo_name = self.config.helo_name.as_str();

        let greeted = match client.read_greeting().await {
            Ok(_) => client.ehlo(helo_name).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = greeted {
            client.close_after(&e).await;
            return Err(e);
        }

        if client.extensions().starttls() {
            return client.starttls(self.network, helo_name).await;
        }

        if self.resolver.has_tlsa(&target.name, self.config.port).await {
            let e = Error::DanePolicy {
                host: target.name.clone(),
            };
            tracing::warn!(host = %target.name, "TLSA records published but STARTTLS not offered");
            client.close_after(&e).await;
            return Err(e);
        }

        Ok(client)
    }
}
