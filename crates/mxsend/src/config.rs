//! Configuration file.

use std::collections::HashMap;
use std::ffi::OsString;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mxsend_smtp::connection::TlsSettings;
use mxsend_smtp::{Config, FamilyPreference, Route};
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MXSEND_CONFIG";

/// System-wide configuration file.
const SYSTEM_CONFIG: &str = "/etc/mxsend/config.json";

/// Relay settings as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Name sent in EHLO/HELO.
    #[serde(default = "default_helo_name")]
    pub helo_name: String,
    /// Remote SMTP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Timeout for every read and write.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
    /// Use BDAT when the server offers CHUNKING.
    #[serde(default = "default_chunking")]
    pub chunking: bool,
    /// Address family tried first within one MX priority.
    #[serde(default)]
    pub family_preference: Family,
    /// TLS material.
    #[serde(default)]
    pub tls: Tls,
    /// Mail exchangers per domain.
    #[serde(default)]
    pub routes: HashMap<String, Vec<RouteEntry>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            helo_name: default_helo_name(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            io_timeout_secs: default_io_timeout(),
            chunking: default_chunking(),
            family_preference: Family::default(),
            tls: Tls::default(),
            routes: HashMap::new(),
        }
    }
}

fn default_helo_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

const fn default_port() -> u16 {
    mxsend_smtp::connection::DEFAULT_PORT
}

const fn default_connect_timeout() -> u64 {
    30
}

const fn default_io_timeout() -> u64 {
    300
}

const fn default_chunking() -> bool {
    true
}

/// Address family preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// IPv4 first.
    Ipv4,
    /// IPv6 first.
    #[default]
    Ipv6,
}

impl From<Family> for FamilyPreference {
    fn from(family: Family) -> Self {
        match family {
            Family::Ipv4 => Self::Ipv4First,
            Family::Ipv6 => Self::Ipv6First,
        }
    }
}

/// PEM files for STARTTLS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tls {
    /// Extra trust anchors.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    /// Client certificate chain.
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    /// Client private key.
    #[serde(default)]
    pub client_key: Option<PathBuf>,
}

/// One configured mail exchanger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// MX priority.
    #[serde(default)]
    pub priority: u16,
    /// Host name.
    pub host: String,
    /// Fixed addresses; the host name is looked up when empty.
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
    /// The host publishes TLSA records.
    #[serde(default)]
    pub tlsa: bool,
}

impl Settings {
    /// Loads the first configuration file found, or the defaults.
    ///
    /// Order: `explicit`, `$MXSEND_CONFIG`, the user configuration
    /// directory, `/etc/mxsend/config.json`. A file named explicitly or by
    /// the environment must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a named file is missing or any file fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let user = dirs::config_dir().map(|dir| dir.join("mxsend").join("config.json"));
        let found = locate(
            explicit,
            std::env::var_os(CONFIG_ENV),
            user.as_deref(),
            Path::new(SYSTEM_CONFIG),
        )?;

        match found {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration");
                Self::from_file(&path)
            }
            None => {
                tracing::debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parses one configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Session settings for the relay.
    #[must_use]
    pub fn smtp_config(&self) -> Config {
        Config::builder(self.helo_name.clone())
            .port(self.port)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .io_timeout(Duration::from_secs(self.io_timeout_secs))
            .chunking(self.chunking)
            .build()
    }

    /// TLS material for the network.
    #[must_use]
    pub fn tls_settings(&self) -> TlsSettings {
        TlsSettings {
            ca_file: self.tls.ca_file.clone(),
            client_cert: self.tls.client_cert.clone(),
            client_key: self.tls.client_key.clone(),
        }
    }

    /// Routes for the static resolver.
    #[must_use]
    pub fn routes(&self) -> HashMap<String, Vec<Route>> {
        self.routes
            .iter()
            .map(|(domain, entries)| {
                let routes = entries
                    .iter()
                    .map(|entry| Route {
                        priority: entry.priority,
                        host: entry.host.clone(),
                        addresses: entry.addresses.clone(),
                        tlsa: entry.tlsa,
                    })
                    .collect();
                (domain.clone(), routes)
            })
            .collect()
    }
}

fn locate(
    explicit: Option<&Path>,
    env: Option<OsString>,
    user: Option<&Path>,
    system: &Path,
) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("configuration file {} not found", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(path) = env.filter(|p| !p.is_empty()).map(PathBuf::from) {
        if !path.is_file() {
            bail!("{CONFIG_ENV} names missing file {}", path.display());
        }
        return Ok(Some(path));
    }
    Ok([user, Some(system)]
        .into_iter()
        .flatten()
        .find(|path| path.is_file())
        .map(Path::to_path_buf))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mxsend-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn empty_object_uses_defaults() {
            let settings: Settings = serde_json::from_str("{}").unwrap();
            assert_eq!(settings.port, 25);
            assert_eq!(settings.connect_timeout_secs, 30);
            assert_eq!(settings.io_timeout_secs, 300);
            assert!(settings.chunking);
            assert_eq!(settings.family_preference, Family::Ipv6);
            assert!(!settings.helo_name.is_empty());
        }

        #[test]
        fn full_file() {
            let json = r#"{
                "helo_name": "relay.example.com",
                "port": 2525,
                "chunking": false,
                "family_preference": "ipv4",
                "tls": { "ca_file": "/etc/mxsend/ca.pem" },
                "routes": {
                    "example.org": [
                        { "priority": 10, "host": "mx.example.org", "addresses": ["192.0.2.1"], "tlsa": true },
                        { "host": "backup.example.org" }
                    ]
                }
            }"#;
            let settings: Settings = serde_json::from_str(json).unwrap();
            assert_eq!(settings.helo_name, "relay.example.com");
            assert_eq!(
                FamilyPreference::from(settings.family_preference),
                FamilyPreference::Ipv4First
            );

            let config = settings.smtp_config();
            assert_eq!(config.port, 2525);
            assert!(!config.chunking);
            assert_eq!(config.io_timeout, Duration::from_secs(300));

            let routes = settings.routes();
            let example = &routes["example.org"];
            assert!(example[0].tlsa);
            assert_eq!(example[1].priority, 0);
            assert!(example[1].addresses.is_empty());

            let tls = settings.tls_settings();
            assert_eq!(tls.ca_file, Some(PathBuf::from("/etc/mxsend/ca.pem")));
            assert_eq!(tls.client_key, None);
        }

        #[test]
        fn unknown_family_is_rejected() {
            assert!(serde_json::from_str::<Settings>(r#"{"family_preference": "ipx"}"#).is_err());
        }
    }

    mod locate_tests {
        use super::*;

        #[test]
        fn explicit_wins() {
            let explicit = temp_file("explicit.json", "{}");
            let env = temp_file("env.json", "{}");
            let found = locate(
                Some(&explicit),
                Some(env.into_os_string()),
                None,
                Path::new("/nonexistent/system.json"),
            )
            .unwrap();
            assert_eq!(found, Some(explicit));
        }

        #[test]
        fn missing_explicit_is_an_error() {
            let result = locate(
                Some(Path::new("/nonexistent/mxsend.json")),
                None,
                None,
                Path::new("/nonexistent/system.json"),
            );
            assert!(result.is_err());
        }

        #[test]
        fn environment_before_user_dir() {
            let env = temp_file("from-env.json", "{}");
            let user = temp_file("user.json", "{}");
            let found = locate(
                None,
                Some(env.clone().into_os_string()),
                Some(&user),
                Path::new("/nonexistent/system.json"),
            )
            .unwrap();
            assert_eq!(found, Some(env));
        }

        #[test]
        fn falls_through_to_defaults() {
            let found = locate(
                None,
                None,
                Some(Path::new("/nonexistent/user.json")),
                Path::new("/nonexistent/system.json"),
            )
            .unwrap();
            assert_eq!(found, None);
        }

        #[test]
        fn reads_file() {
            let path = temp_file("port.json", r#"{"port": 587}"#);
            assert_eq!(Settings::from_file(&path).unwrap().port, 587);

            let broken = temp_file("broken.json", "{ port");
            let err = Settings::from_file(&broken).unwrap_err();
            assert!(err.to_string().starts_with("parsing "));
        }
    }
}
