use anyhow::Result;
use cfgstream_lib::ConfigUpdate;

use super::UpdateFormatter;

/// The config document exactly as the node sent it
pub(crate) struct Raw;

impl UpdateFormatter for Raw {
    fn format(&self, update: &ConfigUpdate) -> Result<String> {
        Ok(update.raw.trim_end().to_string())
    }
}
