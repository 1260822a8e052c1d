//! One complete delivery attempt: preflight, MX lookup, failover, transaction.

use bytes::Bytes;
use mxsend_mime::preflight;

use crate::candidates::Resolver;
use crate::connection::{Config, Network};
use crate::connector::Connector;
use crate::delivery::{Envelope, Outcome, deliver};
use crate::error::{Diagnostic, Result};

/// Delivers messages to the mail exchangers of a domain.
pub struct Relay<N, R> {
    network: N,
    resolver: R,
    config: Config,
}

impl<N, R> Relay<N, R>
where
    N: Network,
    R: Resolver,
{
    /// Creates a relay.
    #[must_use]
    pub const fn new(network: N, resolver: R, config: Config) -> Self {
        Self {
            network,
            resolver,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Delivers `message` to `domain`.
    ///
    /// The envelope and message are checked before any connection is opened. The session
    /// is closed with QUIT whatever the outcome of the transaction, unless the
    /// connection was lost.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the attempt; see [`crate::Error::diagnostic`].
    pub async fn send(&self, domain: &str, envelope: &Envelope, message: &Bytes) -> Result<Outcome> {
        envelope.validate()?;
        let recode = preflight(message)?;
        tracing::debug!(
            domain,
            size = message.len(),
            eight_bit = recode.has_8bit(),
            long_lines = recode.has_long_lines(),
            "Message checked"
        );

        let candidates = self.resolver.resolve_mx(domain).await?;
        let connector = Connector::new(&self.network, &self.resolver, &self.config);
        let mut client = connector.connect_and_negotiate(&candidates).await?;

        match deliver(&mut client, envelope, message, &self.config).await {
            Ok(outcome) => {
                client.quit().await;
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(host = %client.host(), error = %e, "Transaction failed");
                client.close_after(&e).await;
                Err(e)
            }
        }
    }
}

/// Maps the result of [`Relay::send`] to its diagnostic line.
#[must_use]
pub fn verdict(result: &Result<Outcome>) -> Diagnostic {
    match result {
        Ok(outcome) => outcome.diagnostic(),
        Err(e) => e.diagnostic(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::candidates::{CandidateList, MxCandidate};
    use crate::types::Address;
    use crate::{DiagnosticClass, Error};
    use std::net::{IpAddr, SocketAddr};
    use std::sync::{Arc, Mutex};
    use tokio_test::io::{Builder, Mock};

    /// Serves one scripted session and counts connects.
    struct OneHost {
        script: Mutex<Option<Mock>>,
        connects: Arc<Mutex<usize>>,
    }

    impl Network for OneHost {
        type Stream = Mock;

        async fn connect(&self, _addr: SocketAddr) -> Result<Mock> {
            *self.connects.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| Error::Io(std::io::ErrorKind::ConnectionRefused.into()))
        }

        async fn upgrade(&self, stream: Mock, _host: &str) -> Result<Mock> {
            Ok(stream)
        }
    }

    struct Fixed;

    impl Resolver for Fixed {
        async fn resolve_mx(&self, _domain: &str) -> Result<CandidateList> {
            Ok(CandidateList::new(vec![MxCandidate::new(
                10,
                Some("mx.example.org".into()),
                vec![IpAddr::from([192, 0, 2, 1])],
            )]))
        }

        async fn has_tlsa(&self, _host: &str, _port: u16) -> bool {
            false
        }
    }

    fn envelope() -> Envelope {
        Envelope::new(
            Address::reverse_path("<>").unwrap(),
            vec![Address::new("rcpt@example.org").unwrap()],
        )
    }

    fn relay(script: Option<Mock>) -> (Relay<OneHost, Fixed>, Arc<Mutex<usize>>) {
        let connects = Arc::default();
        let network = OneHost {
            script: Mutex::new(script),
            connects: Arc::clone(&connects),
        };
        let config = Config::builder("relay.example.com").build();
        (Relay::new(network, Fixed, config), connects)
    }

    #[tokio::test]
    async fn full_session() {
        let script = Builder::new()
            .read(b"220 mx.example.org ESMTP\r\n")
            .write(b"EHLO relay.example.com\r\n")
            .read(b"250 mx.example.org\r\n")
            .write(b"MAIL FROM:<>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<rcpt@example.org>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write(b"Subject: bounce\r\n\r\nbody\r\n.\r\n")
            .read(b"250 2.0.0 ok\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let (relay, _) = relay(Some(script));
        let result = relay
            .send("example.org", &envelope(), &Bytes::from_static(b"Subject: bounce\n\nbody\n"))
            .await;
        let line = verdict(&result);
        assert_eq!(line.class, DiagnosticClass::Success);
        assert_eq!(
            line.to_string(),
            "Kmx.example.org accepted message./Remote host said: 250 2.0.0 ok"
        );
    }

    #[tokio::test]
    async fn rejection_still_quits() {
        let script = Builder::new()
            .read(b"220 ready\r\n")
            .write(b"EHLO relay.example.com\r\n")
            .read(b"250 mx.example.org\r\n")
            .write(b"MAIL FROM:<>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<rcpt@example.org>\r\n")
            .read(b"550 5.1.1 unknown user\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();
        let (relay, _) = relay(Some(script));
        let result = relay
            .send("example.org", &envelope(), &Bytes::from_static(b"x\r\n"))
            .await;
        assert_eq!(verdict(&result).to_string(), "D550 5.1.1 unknown user");
    }

    #[tokio::test]
    async fn malformed_message_never_connects() {
        let (relay, connects) = relay(None);
        let message = format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n--x\r\n",
            "z".repeat(69)
        );
        let result = relay
            .send("example.org", &envelope(), &Bytes::from(message))
            .await;
        assert_eq!(
            verdict(&result).to_string(),
            "D5.6.3 boundary definition is too long"
        );
        assert_eq!(*connects.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_envelope_never_connects() {
        let (relay, connects) = relay(None);
        let envelope = Envelope::new(Address::reverse_path("<>").unwrap(), Vec::new());
        let result = relay
            .send("example.org", &envelope, &Bytes::from_static(b"x\r\n"))
            .await;
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
        assert_eq!(verdict(&result).class, DiagnosticClass::Permanent);
        assert_eq!(*connects.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn no_host_reachable() {
        let (relay, connects) = relay(None);
        let result = relay
            .send("example.org", &envelope(), &Bytes::from_static(b"x\r\n"))
            .await;
        assert_eq!(*connects.lock().unwrap(), 1);
        let line = verdict(&result);
        assert_eq!(line.class, DiagnosticClass::Temporary);
        assert!(matches!(result, Err(Error::Exhausted { last: Some(_) })));
    }
}
