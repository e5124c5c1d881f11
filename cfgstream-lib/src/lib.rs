//! `cfgstream` is a library for following the configuration of a cluster
//! over its HTTP streaming endpoint.
//!
//! A node publishes every revision of a bucket's configuration on a single,
//! long-lived response. The client keeps one such stream open, moves on to
//! another node when the current one fails or rejects the request, and hands
//! each config document to a [`ConfigSink`].
//!
//! ```no_run
//! use cfgstream_lib::{HostAddr, Result, StreamClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = StreamClientBuilder::builder()
//!       .hosts(vec!["10.0.0.1:8091".parse::<HostAddr>()?])
//!       .bucket("travel-sample")
//!       .build()
//!       .client()?;
//!
//!   let (handle, mut updates) = client.start_with_topology();
//!   while let Some(update) = updates.recv().await {
//!       println!("rev {:?} from {}", update.config.rev, update.source);
//!   }
//!   handle.shutdown().await;
//!   Ok(())
//! }
//! ```
//!
//! Any closure taking the raw block and its source node can serve as a sink:
//!
//! ```no_run
//! use cfgstream_lib::{ConfigTransport, HostAddr, Result, StreamClientBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = StreamClientBuilder::builder()
//!       .hosts(vec!["10.0.0.1:8091".parse::<HostAddr>()?])
//!       .build()
//!       .client()?;
//!
//!   let handle = client.start(|block: &str, source: &HostAddr| -> Result<()> {
//!       println!("{source}: {block}");
//!       Ok(())
//!   });
//!   handle.force_refresh().await?;
//!   handle.close();
//!   Ok(())
//! }
//! ```

#[cfg(feature = "native-tls")]
use openssl_sys as _; // required for vendored-openssl feature

mod client;
mod decoder;
mod orchestrator;
mod rotation;
mod session;
mod sink;
mod types;

#[cfg(test)]
mod test_utils;

pub use crate::{
    client::{
        ConfigTransport, DEFAULT_BUCKET, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
        StreamClient, StreamClientBuilder, StreamHandle,
    },
    decoder::BLOCK_DELIMITER,
    orchestrator::DEFAULT_EXHAUSTED_WAIT,
    rotation::{DEFAULT_BURNOUT, HostRotation},
    sink::{ConfigSink, ConfigUpdate, TopologySink},
    types::*,
};
