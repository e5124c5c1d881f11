use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::Result;
use crate::{ErrorKind, HostAddr};

/// The part of a bucket configuration that describes the cluster topology.
///
/// Only the fields needed to follow the cluster are modeled; everything else
/// in the document is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Revision of the configuration, increasing with every change
    #[serde(default)]
    pub rev: Option<u64>,

    /// Name of the bucket this configuration belongs to
    #[serde(default)]
    pub name: Option<String>,

    /// All nodes currently part of the cluster
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// A single cluster node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Hostname or IP address of the node
    pub host: String,

    /// Ports the node listens on
    pub ports: NodePorts,
}

/// Management ports of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePorts {
    /// Plaintext management port
    pub http_mgmt: u16,

    /// TLS management port
    pub https_mgmt: u16,
}

impl ClusterConfig {
    /// Management endpoints of all nodes, using the TLS port if `tls` is set.
    #[must_use]
    pub fn mgmt_hosts(&self, tls: bool) -> Vec<HostAddr> {
        self.nodes
            .iter()
            .map(|node| {
                let port = if tls {
                    node.ports.https_mgmt
                } else {
                    node.ports.http_mgmt
                };
                HostAddr::new(&node.host, port)
            })
            .collect()
    }
}

impl FromStr for ClusterConfig {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
