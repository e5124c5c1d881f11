#![allow(unreachable_pub)]

mod config;
mod error;
mod host;

pub use config::{ClusterConfig, Node, NodePorts};
pub use error::ErrorKind;
pub use host::HostAddr;

/// The cfgstream `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
