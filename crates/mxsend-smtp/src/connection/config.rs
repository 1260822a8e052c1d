//! Delivery configuration types.

use std::time::Duration;

/// Default SMTP port.
pub const DEFAULT_PORT: u16 = 25;

/// Delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name sent with EHLO/HELO and in recoding notes.
    pub helo_name: String,
    /// Remote SMTP port.
    pub port: u16,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
    /// Use BDAT when the server offers CHUNKING.
    pub chunking: bool,
    /// Agent named in recoded Content-Transfer-Encoding fields.
    pub agent: String,
}

impl Config {
    /// Creates a configuration with default port and timeouts.
    #[must_use]
    pub fn new(helo_name: impl Into<String>) -> Self {
        Self {
            helo_name: helo_name.into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(300),
            chunking: true,
            agent: concat!("mxsend/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(helo_name: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            config: Self::new(helo_name),
        }
    }
}

/// Builder for delivery configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the read/write timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Enables or disables BDAT.
    #[must_use]
    pub const fn chunking(mut self, chunking: bool) -> Self {
        self.config.chunking = chunking;
        self
    }

    /// Sets the agent name.
    #[must_use]
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.config.agent = agent.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        self.config
    }
}
