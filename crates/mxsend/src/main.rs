//! `mxsend` - delivers one queued message to the mail exchangers of a domain.
//!
//! Logs go to stderr. Exactly one status line goes to stdout: `K` when the
//! message was accepted, `Z` for a temporary failure, `D` for a permanent
//! one.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use mxsend_smtp::connection::TcpNetwork;
use mxsend_smtp::{Address, Envelope, Relay, StaticResolver, verdict};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Settings;

#[derive(Parser, Debug)]
#[command(name = "mxsend")]
#[command(about = "Deliver a queued message over SMTP", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Envelope sender; empty for a bounce
    #[arg(short, long, default_value = "")]
    sender: String,

    /// Destination domain
    #[arg(short, long)]
    domain: String,

    /// Queued message file
    message: PathBuf,

    /// Envelope recipients
    #[arg(required = true)]
    recipients: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mxsend=info,mxsend_smtp=info,mxsend_mime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let envelope = Envelope::new(
        Address::reverse_path(cli.sender.as_str())
            .with_context(|| format!("invalid sender {:?}", cli.sender))?,
        cli.recipients
            .iter()
            .map(|rcpt| Address::new(rcpt.as_str()).with_context(|| format!("invalid recipient {rcpt:?}")))
            .collect::<Result<_>>()?,
    );
    let message = Bytes::from(
        std::fs::read(&cli.message)
            .with_context(|| format!("reading {}", cli.message.display()))?,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    let config = settings.smtp_config();
    let network = TcpNetwork::new(
        config.connect_timeout,
        config.io_timeout,
        settings.tls_settings(),
    );
    let resolver = StaticResolver::new(
        settings.routes(),
        settings.family_preference.into(),
        config.port,
    );
    let relay = Relay::new(network, resolver, config);

    info!(domain = %cli.domain, size = message.len(), recipients = envelope.recipients.len(), "Starting delivery");
    let result = runtime.block_on(relay.send(&cli.domain, &envelope, &message));

    let line = verdict(&result);
    if let Err(e) = &result {
        tracing::error!(error = %e, permanent = e.is_permanent(), "Delivery failed");
    }
    println!("{line}");
    Ok(())
}
