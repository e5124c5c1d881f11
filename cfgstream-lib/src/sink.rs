//! Consumers of the config blocks received from the stream.
//!
//! The orchestrator hands every block to a [`ConfigSink`], in the order the
//! blocks arrived on the wire. [`TopologySink`] is the sink used by default:
//! it keeps the [`HostRotation`] in sync with the cluster topology and
//! forwards parsed configs to a subscriber.

use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::types::Result;
use crate::{ClusterConfig, HostAddr, HostRotation};

/// Receives every config block extracted from the stream.
///
/// Errors returned from [`handle_config`](Self::handle_config) are logged by
/// the caller and never interrupt the stream.
pub trait ConfigSink: Send + Sync {
    /// Handle one raw config block, received from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be parsed or applied.
    fn handle_config(&self, block: &str, source: &HostAddr) -> Result<()>;
}

impl<F> ConfigSink for F
where
    F: Fn(&str, &HostAddr) -> Result<()> + Send + Sync,
{
    fn handle_config(&self, block: &str, source: &HostAddr) -> Result<()> {
        self(block, source)
    }
}

/// A parsed configuration, together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdate {
    /// The parsed topology
    pub config: ClusterConfig,
    /// The block exactly as received
    pub raw: String,
    /// The node that sent the config
    pub source: HostAddr,
}

/// Default sink: updates the node list from each config and publishes the
/// config to a subscriber.
#[derive(Debug)]
pub struct TopologySink {
    rotation: Arc<HostRotation>,
    tls: bool,
    updates: UnboundedSender<ConfigUpdate>,
}

impl TopologySink {
    /// Create a sink writing node lists into `rotation`.
    ///
    /// Management ports are taken from `httpsMgmt` when `tls` is set, and from
    /// `httpMgmt` otherwise. Parsed configs can be read from the returned
    /// receiver; dropping it is fine.
    #[must_use]
    pub fn new(rotation: Arc<HostRotation>, tls: bool) -> (Self, UnboundedReceiver<ConfigUpdate>) {
        let (updates, receiver) = unbounded_channel();
        let sink = Self {
            rotation,
            tls,
            updates,
        };
        (sink, receiver)
    }

    fn update_nodes(&self, config: &ClusterConfig, source: &HostAddr) {
        let hosts = config.mgmt_hosts(self.tls);
        if hosts.is_empty() {
            log::warn!("Config from {source} lists no nodes, keeping the current node list");
            return;
        }

        self.rotation.set(hosts.iter().cloned());

        log::info!("Updated node list");
        for host in &hosts {
            log::info!("  {host}");
        }
    }
}

impl ConfigSink for TopologySink {
    fn handle_config(&self, block: &str, source: &HostAddr) -> Result<()> {
        let config: ClusterConfig = block.parse()?;
        self.update_nodes(&config, source);

        let update = ConfigUpdate {
            config,
            raw: block.to_string(),
            source: source.clone(),
        };
        if self.updates.send(update).is_err() {
            log::debug!("No subscriber for config updates, dropping config from {source}");
        }
        Ok(())
    }
}
