use anyhow::Result;
use cfgstream_lib::ConfigUpdate;

use super::UpdateFormatter;

/// One summary line per update:
/// `rev <rev> from <source>: <n> nodes [<node>, ...]`
pub(crate) struct Compact {
    tls: bool,
}

impl Compact {
    pub(crate) const fn new(tls: bool) -> Self {
        Self { tls }
    }
}

impl UpdateFormatter for Compact {
    fn format(&self, update: &ConfigUpdate) -> Result<String> {
        let rev = update
            .config
            .rev
            .map_or_else(|| "?".to_string(), |rev| rev.to_string());
        let nodes: Vec<String> = update
            .config
            .mgmt_hosts(self.tls)
            .iter()
            .map(ToString::to_string)
            .collect();
        Ok(format!(
            "rev {rev} from {}: {} nodes [{}]",
            update.source,
            nodes.len(),
            nodes.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::update::mock_update;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_update() {
        let update = mock_update(
            Some(12),
            &[("10.0.0.1", 8091, 18091), ("10.0.0.2", 8091, 18091)],
        );
        assert_eq!(
            Compact::new(false).format(&update).unwrap(),
            "rev 12 from 10.0.0.1:8091: 2 nodes [10.0.0.1:8091, 10.0.0.2:8091]"
        );
        assert_eq!(
            Compact::new(true).format(&update).unwrap(),
            "rev 12 from 10.0.0.1:8091: 2 nodes [10.0.0.1:18091, 10.0.0.2:18091]"
        );
    }

    #[test]
    fn test_format_update_without_rev() {
        let update = mock_update(None, &[]);
        assert_eq!(
            Compact::new(false).format(&update).unwrap(),
            "rev ? from 10.0.0.1:8091: 0 nodes []"
        );
    }
}
