pub(crate) mod log;
pub(crate) mod update;

use self::update::UpdateFormatter;
use crate::options::OutputFormat;

/// Create an update formatter based on the given format option.
///
/// `tls` selects which management port is shown for the nodes of a config.
pub(crate) fn get_update_formatter(format: OutputFormat, tls: bool) -> Box<dyn UpdateFormatter> {
    match format {
        OutputFormat::Compact => Box::new(update::Compact::new(tls)),
        OutputFormat::Json => Box::new(update::Json::new(tls)),
        OutputFormat::Raw => Box::new(update::Raw),
    }
}
