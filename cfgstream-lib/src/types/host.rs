use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::ErrorKind;
use crate::types::Result;

/// Address of a cluster node's management endpoint, as `host:port`.
///
/// The host part is normalized to lowercase, so that the same node reported
/// with different spelling is still recognized as one candidate.
///
/// # Examples
///
/// ```
/// use cfgstream_lib::HostAddr;
///
/// let addr: HostAddr = "Node-A.local:8091".parse().unwrap();
/// assert_eq!(addr.host(), "node-a.local");
/// assert_eq!(addr.port(), 8091);
/// assert_eq!(addr.to_string(), "node-a.local:8091");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostAddr {
    host: String,
    port: u16,
}

impl HostAddr {
    /// Create an address from its parts
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Self {
            host: host.to_lowercase(),
            port,
        }
    }

    /// The hostname or IP address, without brackets
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The management port
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    fn is_ipv6(&self) -> bool {
        self.host.contains(':')
    }
}

impl FromStr for HostAddr {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason| ErrorKind::InvalidHostAddr(s.to_string(), reason);

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(|| invalid("missing port"))?;

        // A bare IPv6 address would otherwise be split at its last group
        if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
            return Err(invalid("IPv6 addresses must be enclosed in brackets"));
        }

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<&str> for HostAddr {
    type Error = ErrorKind;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl TryFrom<String> for HostAddr {
    type Error = ErrorKind;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Serialize for HostAddr {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HostAddr {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10.0.0.1:8091", "10.0.0.1", 8091)]
    #[case("node-a.local:18091", "node-a.local", 18091)]
    #[case("NODE-A.Local:8091", "node-a.local", 8091)]
    #[case("[::1]:8091", "::1", 8091)]
    #[case("  localhost:9000 ", "localhost", 9000)]
    fn test_parse_valid(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let addr: HostAddr = input.parse().unwrap();
        assert_eq!(addr.host(), host);
        assert_eq!(addr.port(), port);
    }

    #[rstest]
    #[case("localhost", "missing port")]
    #[case(":8091", "missing host")]
    #[case("localhost:http", "invalid port")]
    #[case("localhost:70000", "invalid port")]
    #[case("::1:8091", "IPv6 addresses must be enclosed in brackets")]
    fn test_parse_invalid(#[case] input: &str, #[case] reason: &'static str) {
        assert_eq!(
            input.parse::<HostAddr>(),
            Err(ErrorKind::InvalidHostAddr(input.to_string(), reason))
        );
    }

    #[test]
    fn test_display_roundtrips_ipv6() {
        let addr: HostAddr = "[fe80::1]:8091".parse().unwrap();
        assert_eq!(addr.to_string(), "[fe80::1]:8091");
        assert_eq!(addr.to_string().parse::<HostAddr>().unwrap(), addr);
    }

    #[test]
    fn test_same_node_different_case_is_equal() {
        assert_eq!(HostAddr::new("A.example", 8091), HostAddr::new("a.example", 8091));
    }

    #[test]
    fn test_deserialize_from_string() {
        let addr: HostAddr = serde_json::from_str("\"10.0.0.2:8091\"").unwrap();
        assert_eq!(addr, HostAddr::new("10.0.0.2", 8091));
        assert!(serde_json::from_str::<HostAddr>("\"10.0.0.2\"").is_err());
    }
}
