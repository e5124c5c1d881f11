mod compact;
mod json;
mod raw;

pub(crate) use compact::Compact;
pub(crate) use json::Json;
pub(crate) use raw::Raw;

use anyhow::Result;
use cfgstream_lib::ConfigUpdate;

pub(crate) trait UpdateFormatter {
    /// Format a single config update as one line of output, without the
    /// trailing newline
    fn format(&self, update: &ConfigUpdate) -> Result<String>;
}

#[cfg(test)]
pub(crate) fn mock_update(rev: Option<u64>, nodes: &[(&str, u16, u16)]) -> ConfigUpdate {
    use cfgstream_lib::{ClusterConfig, Node, NodePorts};

    let config = ClusterConfig {
        rev,
        name: Some("default".to_string()),
        nodes: nodes
            .iter()
            .map(|&(host, http_mgmt, https_mgmt)| Node {
                host: host.to_string(),
                ports: NodePorts {
                    http_mgmt,
                    https_mgmt,
                },
            })
            .collect(),
    };
    let raw = serde_json::to_string(&config).unwrap();
    ConfigUpdate {
        config,
        raw,
        source: "10.0.0.1:8091".parse().unwrap(),
    }
}
