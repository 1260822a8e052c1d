//! SMTP connection management.

mod client;
mod config;
mod framed;
mod network;
mod stream;

pub use client::Client;
pub use config::{Config, ConfigBuilder, DEFAULT_PORT};
pub use framed::{FramedStream, MAX_LINE_LENGTH};
pub use network::{Network, TcpNetwork};
pub use stream::{SmtpStream, TlsSettings, create_tls_connector};
