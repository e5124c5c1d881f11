//! `-v` and `-q` flags controlling how much cfgstream logs.
//!
//! Warnings and errors are reported by default.
//! - `-v` shows info, e.g. node list changes and failovers
//! - `-vv` shows debug
//! - `-vvv` shows trace
//! - `-q` shows errors only
//! - `-qq` silences all log output
//!
//! In a config file, the level is given by name instead: `verbose = "info"`.

use log::LevelFilter;
use serde::Deserialize;
use std::fmt;

/// Level used when neither `-v` nor `-q` is given
const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// Pass many times for more log output
    ///
    /// By default, only warnings and errors are reported. Passing `-v` one
    /// time also prints info messages, `-vv` enables debug logging and
    /// `-vvv` trace.
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet",
    )]
    verbose: u8,

    /// Pass many times for less log output
    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "verbose",
    )]
    quiet: u8,
}

impl Verbosity {
    /// Get the log level filter.
    pub(crate) fn log_level_filter(&self) -> LevelFilter {
        filter_for(level_value(DEFAULT_LEVEL) + i16::from(self.verbose) - i16::from(self.quiet))
    }
}

// A level can also be given by name, e.g. "info", "warning" or "Debug"
impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let level = match s.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            level => {
                return Err(serde::de::Error::custom(format!(
                    "invalid log level `{level}`"
                )));
            }
        };

        let offset = level_value(level) - level_value(DEFAULT_LEVEL);
        let steps = u8::try_from(offset.unsigned_abs()).unwrap_or(u8::MAX);
        Ok(if offset >= 0 {
            Verbosity {
                verbose: steps,
                quiet: 0,
            }
        } else {
            Verbosity {
                verbose: 0,
                quiet: steps,
            }
        })
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.log_level_filter())
    }
}

const fn level_value(level: LevelFilter) -> i16 {
    match level {
        LevelFilter::Off => 0,
        LevelFilter::Error => 1,
        LevelFilter::Warn => 2,
        LevelFilter::Info => 3,
        LevelFilter::Debug => 4,
        LevelFilter::Trace => 5,
    }
}

const fn filter_for(value: i16) -> LevelFilter {
    match value {
        i16::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[derive(Debug, clap::Parser)]
    struct Cli {
        #[clap(flatten)]
        verbose: Verbosity,
    }

    fn level(args: &[&str]) -> LevelFilter {
        Cli::parse_from(std::iter::once("cfgstream").chain(args.iter().copied()))
            .verbose
            .log_level_filter()
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_log_level() {
        assert_eq!(Verbosity::default().log_level_filter(), LevelFilter::Warn);
    }

    #[test]
    fn test_flags() {
        assert_eq!(level(&["-v"]), LevelFilter::Info);
        assert_eq!(level(&["-vv"]), LevelFilter::Debug);
        assert_eq!(level(&["-vvvvvv"]), LevelFilter::Trace);
        assert_eq!(level(&["-q"]), LevelFilter::Error);
        assert_eq!(level(&["-qqq"]), LevelFilter::Off);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["cfgstream", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_deserialize_level_name() {
        #[derive(Deserialize)]
        struct File {
            verbose: Verbosity,
        }

        let parse = |s: &str| {
            toml::from_str::<File>(&format!("verbose = \"{s}\""))
                .unwrap()
                .verbose
                .log_level_filter()
        };
        assert_eq!(parse("Info"), LevelFilter::Info);
        assert_eq!(parse("warning"), LevelFilter::Warn);
        assert_eq!(parse("trace"), LevelFilter::Trace);
        assert_eq!(parse("off"), LevelFilter::Off);
        assert!(toml::from_str::<File>("verbose = \"loud\"").is_err());
    }
}
