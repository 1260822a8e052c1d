//! Envelope address types.

use crate::error::{Error, Result};

/// Email address for SMTP envelope.
///
/// The empty address is the null reverse path `<>` used for bounces and is
/// only valid as a sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Self::validate(&addr)?;
        Ok(Self(addr))
    }

    /// Creates a sender address, accepting the empty string as `<>`.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-empty address is invalid.
    pub fn reverse_path(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        if addr.is_empty() || addr == "<>" {
            return Ok(Self::null());
        }
        Self::new(addr)
    }

    /// The null reverse path.
    #[must_use]
    pub const fn null() -> Self {
        Self(String::new())
    }

    /// Returns true for the null reverse path.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rejects strings that cannot be put between angle brackets on a
    /// command line. The local part is not parsed further.
    fn validate(addr: &str) -> Result<()> {
        let invalid = |reason: &str| Err(Error::InvalidAddress(format!("{addr:?}: {reason}")));

        if addr
            .bytes()
            .any(|b| b.is_ascii_control() || matches!(b, b'<' | b'>' | b' '))
        {
            return invalid("forbidden character");
        }
        match addr.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            Some(_) => invalid("empty local part or domain"),
            None => invalid("missing @"),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert!(!addr.is_null());
        assert_eq!(addr.to_string(), "<user@example.com>");
    }

    #[test]
    fn quoted_local_part_with_at() {
        assert!(Address::new("\"a@b\"@example.com").is_ok());
    }

    #[test]
    fn invalid_addresses() {
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("user@example.com\r\nRSET").is_err());
        assert!(Address::new("<user@example.com>").is_err());
    }

    #[test]
    fn null_reverse_path() {
        let addr = Address::reverse_path("").unwrap();
        assert!(addr.is_null());
        assert_eq!(addr.to_string(), "<>");
        assert_eq!(Address::reverse_path("<>").unwrap(), Address::null());
    }

    #[test]
    fn reverse_path_still_validates() {
        assert!(Address::reverse_path("bogus").is_err());
        assert!(Address::reverse_path("a@b.example").is_ok());
    }
}
