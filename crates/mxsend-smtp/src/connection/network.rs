//! Network seam: outbound connections and the STARTTLS upgrade.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::stream::{SmtpStream, TlsSettings, create_tls_connector};
use crate::{Error, Result};

/// Opens connections to delivery hosts.
pub trait Network: Send + Sync {
    /// Connection type.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Connects to `addr`.
    ///
    /// An [`Error::Io`] returned here is treated as [`Error::Connect`].
    fn connect(&self, addr: SocketAddr) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Checks that local TLS material is usable before STARTTLS is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsSetup`] if TLS cannot be initialised locally.
    fn check_tls(&self) -> Result<()> {
        Ok(())
    }

    /// Runs the TLS handshake on a connection that accepted STARTTLS.
    fn upgrade(
        &self,
        stream: Self::Stream,
        host: &str,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// TCP network with rustls for STARTTLS.
///
/// The TLS connector is built on first use, so broken TLS material only
/// fails deliveries to hosts offering STARTTLS.
pub struct TcpNetwork {
    connect_timeout: Duration,
    handshake_timeout: Duration,
    tls: TlsSettings,
    connector: OnceLock<std::result::Result<TlsConnector, String>>,
}

impl TcpNetwork {
    /// Creates a network with the given timeouts and TLS material.
    #[must_use]
    pub const fn new(connect_timeout: Duration, handshake_timeout: Duration, tls: TlsSettings) -> Self {
        Self {
            connect_timeout,
            handshake_timeout,
            tls,
            connector: OnceLock::new(),
        }
    }

    fn connector(&self) -> Result<&TlsConnector> {
        self.connector
            .get_or_init(|| {
                create_tls_connector(&self.tls).map_err(|e| match e {
                    Error::TlsSetup(reason) => reason,
                    other => other.to_string(),
                })
            })
            .as_ref()
            .map_err(|reason| Error::TlsSetup(reason.clone()))
    }
}

impl Network for TcpNetwork {
    type Stream = SmtpStream;

    async fn connect(&self, addr: SocketAddr) -> Result<SmtpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(tcp) => tcp.map(SmtpStream::Plain).map_err(Error::Connect),
            Err(_) => Err(Error::Timeout),
        }
    }

    fn check_tls(&self) -> Result<()> {
        self.connector().map(|_| ())
    }

    async fn upgrade(&self, stream: SmtpStream, host: &str) -> Result<SmtpStream> {
        let connector = self.connector()?;
        match tokio::time::timeout(self.handshake_timeout, stream.upgrade_to_tls(connector, host))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::TlsHandshake("handshake timed out".to_string())),
        }
    }
}
