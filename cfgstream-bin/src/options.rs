use crate::verbosity::Verbosity;
use anyhow::{Context, Error, Result, anyhow};
use clap::builder::PossibleValuesParser;
use clap::{Parser, builder::TypedValueParser};
use cfgstream_lib::{
    DEFAULT_BUCKET, DEFAULT_BURNOUT, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_EXHAUSTED_WAIT,
    HostAddr,
};
use const_format::{concatcp, formatcp};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::{fs, path::PathBuf, str::FromStr, time::Duration};
use strum::{Display, EnumIter, VariantNames};

pub(crate) const CFGSTREAM_CONFIG_FILE: &str = "cfgstream.toml";

const DEFAULT_BURNOUT_STR: &str = "5s";
const DEFAULT_EXHAUSTED_WAIT_STR: &str = "1s";

// this exists because clap requires `&str` type values for defaults
// whereas serde expects owned `String` types
const CONNECT_TIMEOUT_STR: &str = concatcp!(DEFAULT_CONNECT_TIMEOUT_SECS);
// We use a custom help message here because we want to show the default
// value of the config file, but also be able to check if the user has
// provided a custom value. If they didn't, we won't throw an error if
// the file doesn't exist.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    CFGSTREAM_CONFIG_FILE,
);

/// The format used to print each config update
#[derive(Debug, Deserialize, Default, Clone, Copy, Display, EnumIter, VariantNames, PartialEq, Eq)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum OutputFormat {
    /// One summary line per update
    #[default]
    Compact,
    /// One JSON object per update
    Json,
    /// The config document as received
    Raw,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format.to_lowercase().as_str() {
            "compact" | "string" => Ok(OutputFormat::Compact),
            "json" => Ok(OutputFormat::Json),
            "raw" => Ok(OutputFormat::Raw),
            _ => Err(anyhow!("Unknown format {format}")),
        }
    }
}

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    bucket: String = DEFAULT_BUCKET.to_string();
    burnout: Duration = DEFAULT_BURNOUT;
    exhausted_wait: Duration = DEFAULT_EXHAUSTED_WAIT;
    connect_timeout: u64 = DEFAULT_CONNECT_TIMEOUT_SECS;
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// cfgstream follows the configuration of a cluster bucket over the
/// streaming endpoint of its nodes and prints every update it receives.
///
/// When a node goes away, the stream is continued from another node. The
/// node list is kept up to date with the cluster topology.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct CfgstreamOptions {
    /// Configuration file to use
    #[arg(short, long = "config")]
    #[arg(help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

/// The main configuration for cfgstream
#[derive(Parser, Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Seed nodes to connect to, as `host:port` of the management endpoint
    #[arg(
        name = "hosts",
        value_name = "HOSTS",
        long_help = "Seed nodes to connect to, as `host:port` of the management endpoint.

Only one node is needed to get started. Once the first config arrives, the
node list is replaced with the nodes of the cluster. IPv6 addresses must be
enclosed in brackets, e.g. `[::1]:8091`."
    )]
    #[serde(default)]
    pub(crate) hosts: Vec<HostAddr>,

    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Name of the bucket whose configuration is followed
    #[arg(short, long, default_value = DEFAULT_BUCKET)]
    #[serde(default = "bucket")]
    pub(crate) bucket: String,

    /// Connect to the nodes over TLS, using their secure management ports.
    /// Certificates are not validated.
    #[arg(long, verbatim_doc_comment)]
    #[serde(default)]
    pub(crate) tls: bool,

    /// Username for HTTP basic authentication
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) username: Option<String>,

    /// Password for HTTP basic authentication
    #[arg(short, long, env = "CFGSTREAM_PASSWORD", hide_env_values = true)]
    #[serde(default)]
    pub(crate) password: Option<SecretString>,

    /// How long a node is skipped after connecting to it, as long as other
    /// nodes are available
    #[arg(long, value_parser = humantime::parse_duration, default_value = DEFAULT_BURNOUT_STR)]
    #[serde(default = "burnout", with = "humantime_serde")]
    pub(crate) burnout: Duration,

    /// How long to wait before trying again when all nodes were tried
    /// recently
    #[arg(long, value_parser = humantime::parse_duration, default_value = DEFAULT_EXHAUSTED_WAIT_STR)]
    #[serde(default = "exhausted_wait", with = "humantime_serde")]
    pub(crate) exhausted_wait: Duration,

    /// Connection timeout in seconds
    #[arg(long, default_value = CONNECT_TIMEOUT_STR)]
    #[serde(default = "connect_timeout")]
    pub(crate) connect_timeout: u64,

    /// Output format for config updates
    #[arg(short, long, default_value = "compact", value_parser = PossibleValuesParser::new(OutputFormat::VARIANTS).try_map(|s| s.parse::<OutputFormat>()))]
    #[serde(default)]
    pub(crate) format: OutputFormat,

    /// Exit after printing this many config updates
    #[arg(short = 'n', long)]
    #[serde(default)]
    pub(crate) max_updates: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        // Read configuration file
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // If the config file has a password, but the CLI doesn't, use the
        // password from the config file.
        // This is outside of fold_in! because SecretBox doesn't implement Eq.
        if self.password.is_none() && toml.password.is_some() {
            self.password = toml.password;
        }

        // NOTE: if you see an error within this macro call, check to make sure that
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..password,

                // Keys with defaults to assign
                hosts: Vec::<HostAddr>::new(),
                verbose: Verbosity::default(),
                bucket: DEFAULT_BUCKET,
                tls: false,
                username: None,
                burnout: DEFAULT_BURNOUT,
                exhausted_wait: DEFAULT_EXHAUSTED_WAIT,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
                format: OutputFormat::default(),
                max_updates: None,
            }
        }
    }
}
