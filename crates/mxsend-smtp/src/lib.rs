//! # mxsend-smtp
//!
//! Outbound SMTP delivery to the mail exchangers of a domain.
//!
//! ## Features
//!
//! - **MX failover**: candidates are tried in priority order, one socket at a
//!   time, until one host completes negotiation
//! - **Negotiation**: greeting, EHLO with HELO fallback, STARTTLS and DANE
//!   enforcement
//! - **Transfer**: DATA with 8-bit to Quoted-Printable recoding, or BDAT
//!   chunks when CHUNKING is advertised
//! - **Diagnostics**: every outcome maps to a `K`, `Z` or `D` status line
//!
//! ## Quick Start
//!
//! ```ignore
//! use bytes::Bytes;
//! use mxsend_smtp::{Address, Config, Envelope, FamilyPreference, Relay, StaticResolver};
//! use mxsend_smtp::connection::{TcpNetwork, TlsSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::new("relay.example.com");
//!     let network = TcpNetwork::new(config.connect_timeout, config.io_timeout, TlsSettings::default());
//!     let resolver = StaticResolver::new(Default::default(), FamilyPreference::Ipv6First, config.port);
//!     let relay = Relay::new(network, resolver, config);
//!
//!     let envelope = Envelope::new(
//!         Address::new("sender@example.com").unwrap(),
//!         vec![Address::new("rcpt@example.org").unwrap()],
//!     );
//!     let result = relay
//!         .send("example.org", &envelope, &Bytes::from_static(b"Subject: hi\r\n\r\nhello\r\n"))
//!         .await;
//!     println!("{}", mxsend_smtp::verdict(&result));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`candidates`]: MX candidate ordering and the resolver seam
//! - [`command`]: SMTP command builders
//! - [`connection`]: Streams, reply framing and the session client
//! - [`connector`]: MX failover and negotiation
//! - [`delivery`]: Envelope and message transfer
//! - [`parser`]: Reply line parser
//! - [`relay`]: Complete delivery attempts
//! - [`types`]: Addresses, extensions and replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod candidates;
pub mod command;
pub mod connection;
pub mod connector;
pub mod delivery;
mod error;
pub mod parser;
pub mod relay;
pub mod types;

pub use candidates::{CandidateList, FamilyPreference, MxCandidate, Resolver, Route, StaticResolver};
pub use connection::{Client, Config, ConfigBuilder};
pub use connector::Connector;
pub use delivery::{Envelope, Outcome, RecipientStatus, TransferMode, deliver};
pub use error::{Diagnostic, DiagnosticClass, Error, Result, Stage, is_remote_kind};
pub use relay::{Relay, verdict};
pub use types::{Address, Extension, ExtensionSet, Reply, ReplyCode};
