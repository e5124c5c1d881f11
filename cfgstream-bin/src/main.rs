//! `cfgstream` follows the live configuration of a cluster bucket.
//!
//! It keeps a streaming connection to one node of the cluster and prints
//! each config update it receives. When the node goes away, the stream is
//! picked up from another node of the cluster.
//!
//! The cfgstream binary is a wrapper around cfgstream-lib, which provides
//! the streaming client.
//!
//! Follow the `default` bucket through a single seed node:
//! ```sh
//! cfgstream 10.0.0.1:8091
//! ```
//!
//! Follow another bucket over TLS, printing JSON:
//! ```sh
//! cfgstream --tls -b travel-sample -u Administrator -f json 10.0.0.1:18091
//! ```
//!
//! Print the first config and exit:
//! ```sh
//! cfgstream -n 1 -f raw 10.0.0.1:8091
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Error, Result, anyhow, bail};
use clap::{Parser, crate_version};
use formatters::log::init_logging;
use log::{error, info};

#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature

use cfgstream_lib::{ConfigUpdate, StreamClientBuilder};

mod formatters;
mod options;
mod verbosity;

use crate::formatters::update::UpdateFormatter;
use crate::options::{CFGSTREAM_CONFIG_FILE, CfgstreamOptions, Config};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<CfgstreamOptions> {
    let mut opts = CfgstreamOptions::parse();

    // Logging is set up after merging, so that a `verbose` level from the
    // config file applies. A merge error is reported once logging is up.
    let merged = merge_config_file(&mut opts);
    init_logging(&opts.config.verbose);
    merged?;

    if opts.config.hosts.is_empty() {
        bail!(
            "No hosts given. Pass at least one seed node as `host:port`, or set `hosts` in the config file"
        );
    }

    Ok(opts)
}

/// Load the config file given with `--config`, or `cfgstream.toml` from the
/// current directory if it exists, and merge it into the CLI options
fn merge_config_file(opts: &mut CfgstreamOptions) -> Result<()> {
    let (path, explicit) = match &opts.config_file {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(CFGSTREAM_CONFIG_FILE), false),
    };

    // A missing default file is fine, an invalid one is an error just like
    // an invalid explicit file
    if !explicit && !path.is_file() {
        return Ok(());
    }

    match Config::load_from_file(&path) {
        Ok(c) => opts.config.merge(c),
        Err(e) => {
            let which = if explicit { "configuration" } else { "default configuration" };
            bail!("Cannot load {which} file `{}`: {e:?}", path.display());
        }
    }
    Ok(())
}

/// Set up runtime and call cfgstream entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!(
                "Error while loading config: {e}\n\
                See: https://docs.rs/cfgstream/{}",
                crate_version!()
            );
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;

    match runtime.block_on(run(&opts.config)) {
        Err(e) if Some(ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Follow the config stream and print every update until interrupted
async fn run(config: &Config) -> Result<i32> {
    let client = StreamClientBuilder::builder()
        .hosts(config.hosts.clone())
        .bucket(config.bucket.clone())
        .tls(config.tls)
        .username(config.username.clone())
        .password(config.password.clone())
        .burnout(config.burnout)
        .exhausted_wait(config.exhausted_wait)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .build()
        .client()
        .context("Failed to create config stream client")?;

    let formatter = formatters::get_update_formatter(config.format, config.tls);
    let (handle, mut updates) = client.start_with_topology();
    let mut stdout = io::stdout().lock();
    let mut received = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        if config.max_updates.is_some_and(|max| received >= max) {
            info!("Received {received} config update(s), exiting");
            break Ok(());
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, closing config stream");
                break Ok(());
            }
            update = updates.recv() => {
                let Some(update) = update else {
                    break Err(anyhow!("Config stream stopped unexpectedly"));
                };
                received += 1;
                if let Err(e) = print_update(&mut stdout, formatter.as_ref(), &update) {
                    break Err(e);
                }
            }
        }
    };

    handle.shutdown().await;
    result.map(|()| ExitCode::Success as i32)
}

/// Write a single formatted update to `out`, flushing so that the line shows
/// up immediately when piped
fn print_update(
    out: &mut impl Write,
    formatter: &dyn UpdateFormatter,
    update: &ConfigUpdate,
) -> Result<()> {
    let line = formatter.format(update)?;
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}
