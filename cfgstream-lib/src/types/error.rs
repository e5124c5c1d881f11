use http::StatusCode;
use http::header::InvalidHeaderValue;
use serde::{Serialize, Serializer};
use std::hash::Hash;
use thiserror::Error;

/// Possible errors when following a cluster configuration stream
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network error while opening or reading the configuration stream
    #[error("Network error while streaming cluster config: {0}")]
    NetworkRequest(#[source] reqwest::Error),

    /// The HTTP client used for streaming could not be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The node answered the streaming request with a status other than `200 OK`
    #[error("Node rejected the streaming request with status code {0}")]
    RejectedStatusCode(StatusCode),

    /// The given string is not a valid `host:port` address
    #[error("Invalid host address `{0}`: {1}")]
    InvalidHostAddr(String, &'static str),

    /// A received config block could not be parsed
    #[error("Invalid cluster config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// A received config block is not valid UTF-8
    #[error("Config block is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The streaming endpoint URL could not be constructed
    #[error("Cannot build streaming URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header value (e.g. the user agent) could not be parsed
    #[error("Header could not be parsed: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    /// A refresh was forced while no stream was open
    #[error("Tried to force a refresh while not streaming")]
    NotStreaming,

    /// The config stream has already been shut down
    #[error("Config stream has been closed")]
    Closed,
}

impl ErrorKind {
    /// Return the underlying `reqwest` error, if any
    #[must_use]
    pub const fn reqwest_error(&self) -> Option<&reqwest::Error> {
        match self {
            Self::NetworkRequest(e) | Self::BuildRequestClient(e) => Some(e),
            _ => None,
        }
    }

    /// Return a short human-readable reason, suitable for a single log line.
    ///
    /// For network errors the innermost source is used, since the outer
    /// `reqwest` message only repeats the URL.
    #[must_use]
    pub fn details(&self) -> String {
        match self.reqwest_error() {
            Some(e) => {
                let mut source: &dyn std::error::Error = e;
                while let Some(inner) = source.source() {
                    source = inner;
                }
                source.to_string()
            }
            None => self.to_string(),
        }
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NetworkRequest(e1), Self::NetworkRequest(e2))
            | (Self::BuildRequestClient(e1), Self::BuildRequestClient(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (Self::RejectedStatusCode(c1), Self::RejectedStatusCode(c2)) => c1 == c2,
            (Self::InvalidHostAddr(s1, r1), Self::InvalidHostAddr(s2, r2)) => s1 == s2 && r1 == r2,
            (Self::InvalidConfig(e1), Self::InvalidConfig(e2)) => e1.to_string() == e2.to_string(),
            (Self::InvalidUtf8(e1), Self::InvalidUtf8(e2)) => e1 == e2,
            (Self::InvalidUrl(e1), Self::InvalidUrl(e2)) => e1 == e2,
            (Self::InvalidHeader(_), Self::InvalidHeader(_))
            | (Self::NotStreaming, Self::NotStreaming)
            | (Self::Closed, Self::Closed) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}

impl Hash for ErrorKind {
    fn hash<H>(&self, state: &mut H)
    where
        H: std::hash::Hasher,
    {
        match self {
            Self::NetworkRequest(e) | Self::BuildRequestClient(e) => e.to_string().hash(state),
            Self::RejectedStatusCode(c) => c.hash(state),
            Self::InvalidHostAddr(s, r) => (s, r).hash(state),
            Self::InvalidConfig(e) => e.to_string().hash(state),
            Self::InvalidUtf8(e) => e.to_string().hash(state),
            Self::InvalidUrl(e) => e.to_string().hash(state),
            Self::InvalidHeader(e) => e.to_string().hash(state),
            Self::NotStreaming | Self::Closed => std::mem::discriminant(self).hash(state),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
