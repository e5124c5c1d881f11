use anyhow::{Context, Result};
use cfgstream_lib::{ConfigUpdate, HostAddr};
use serde::Serialize;

use super::UpdateFormatter;

/// One JSON object per line, e.g.
/// `{"source":"10.0.0.1:8091","rev":12,"nodes":["10.0.0.1:8091"]}`
pub(crate) struct Json {
    tls: bool,
}

impl Json {
    pub(crate) const fn new(tls: bool) -> Self {
        Self { tls }
    }
}

#[derive(Serialize)]
struct JsonUpdate<'a> {
    source: &'a HostAddr,
    rev: Option<u64>,
    nodes: Vec<HostAddr>,
}

impl UpdateFormatter for Json {
    fn format(&self, update: &ConfigUpdate) -> Result<String> {
        let json = JsonUpdate {
            source: &update.source,
            rev: update.config.rev,
            nodes: update.config.mgmt_hosts(self.tls),
        };
        serde_json::to_string(&json).context("Cannot format config update as JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::update::mock_update;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_format_update() {
        let update = mock_update(Some(3), &[("Node-A.local", 8091, 18091)]);
        let line = Json::new(true).format(&update).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&line).unwrap(),
            json!({
                "source": "10.0.0.1:8091",
                "rev": 3,
                "nodes": ["node-a.local:18091"],
            })
        );
    }

    #[test]
    fn test_format_update_without_rev() {
        let update = mock_update(None, &[]);
        assert_eq!(
            Json::new(false).format(&update).unwrap(),
            r#"{"source":"10.0.0.1:8091","rev":null,"nodes":[]}"#
        );
    }
}
