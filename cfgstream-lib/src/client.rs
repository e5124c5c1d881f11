//! Entry point for following a cluster's configuration stream.
//!
//! This module defines [`StreamClientBuilder`], [`StreamClient`] and
//! [`StreamHandle`]. The builder collects the settings, the client owns the
//! HTTP client and the node list, and starting the client spawns the
//! orchestrator and returns a handle to control it.
#![allow(clippy::module_name_repetitions)]

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderValue};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use typed_builder::TypedBuilder;

use crate::orchestrator::{Command, DEFAULT_EXHAUSTED_WAIT, Orchestrator};
use crate::rotation::DEFAULT_BURNOUT;
use crate::session::StreamEndpoint;
use crate::{ConfigSink, ConfigUpdate, ErrorKind, HostAddr, HostRotation, Result, TopologySink};

/// Default bucket to follow, `default`.
pub const DEFAULT_BUCKET: &str = "default";
/// Default connect timeout in seconds, 10.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default user agent, `cfgstream-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("cfgstream/", env!("CARGO_PKG_VERSION"));

/// TCP keepalive, so that dead nodes are noticed on an otherwise idle stream.
/// See <https://tldp.org/HOWTO/TCP-Keepalive-HOWTO/overview.html> for more info
const TCP_KEEPALIVE: u64 = 60;

/// Capacity of the command queue from the handle to the orchestrator
const COMMAND_BUFFER: usize = 8;

/// Builder for [`StreamClient`].
///
/// ```
/// use cfgstream_lib::{HostAddr, StreamClientBuilder};
/// use std::time::Duration;
///
/// # fn main() -> cfgstream_lib::Result<()> {
/// let client = StreamClientBuilder::builder()
///     .hosts(vec!["10.0.0.1:8091".parse::<HostAddr>()?])
///     .bucket("travel-sample")
///     .burnout(Duration::from_secs(10))
///     .build()
///     .client()?;
/// assert_eq!(client.bucket(), "travel-sample");
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `StreamClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `StreamClientBuilder`.
"))]
pub struct StreamClientBuilder {
    /// Seed nodes to connect to, as management endpoints (`host:port`).
    ///
    /// The list is replaced as soon as the first config arrives, when using
    /// [`StreamClient::start_with_topology`].
    hosts: Vec<HostAddr>,

    /// Name of the bucket whose configuration is streamed.
    #[builder(default_code = "String::from(DEFAULT_BUCKET)")]
    bucket: String,

    /// Connect over TLS, using the nodes' `httpsMgmt` ports.
    ///
    /// ## Warning
    ///
    /// Certificates are **not** validated. The management listener of a
    /// cluster commonly uses a self-signed certificate.
    tls: bool,

    /// How long a node is skipped after a connection attempt, while other
    /// nodes are available.
    #[builder(default = DEFAULT_BURNOUT)]
    burnout: Duration,

    /// How long to wait before trying again when every node was tried
    /// within its burn-out window.
    #[builder(default = DEFAULT_EXHAUSTED_WAIT)]
    exhausted_wait: Duration,

    /// Timeout for establishing a connection to a node.
    ///
    /// There is no timeout for the response itself, since the stream is
    /// expected to stay open indefinitely.
    #[builder(default = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))]
    connect_timeout: Duration,

    /// User-agent sent with every streaming request.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Username for HTTP basic authentication.
    username: Option<String>,

    /// Password for HTTP basic authentication. Ignored without a username.
    password: Option<SecretString>,
}

impl Default for StreamClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StreamClientBuilder {
    /// Instantiates a [`StreamClient`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client(self) -> Result<StreamClient> {
        let Self {
            hosts,
            bucket,
            tls,
            burnout,
            exhausted_wait,
            connect_timeout,
            user_agent,
            username,
            password,
        } = self;

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&user_agent)?);

        let builder = reqwest::ClientBuilder::new()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE));

        #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
        let builder = builder.danger_accept_invalid_certs(tls);

        let reqwest_client = builder.build().map_err(ErrorKind::BuildRequestClient)?;

        let endpoint = StreamEndpoint {
            client: reqwest_client,
            bucket,
            tls,
            credentials: username.map(|username| (username, password)),
        };

        Ok(StreamClient {
            endpoint: Arc::new(endpoint),
            rotation: Arc::new(HostRotation::new(burnout, hosts)),
            exhausted_wait,
        })
    }
}

/// A configured, not yet started, config stream.
///
/// See [`StreamClientBuilder`] for the available options.
#[derive(Debug)]
pub struct StreamClient {
    endpoint: Arc<StreamEndpoint>,
    rotation: Arc<HostRotation>,
    exhausted_wait: Duration,
}

impl StreamClient {
    /// The candidate node list used by this client.
    ///
    /// A custom [`ConfigSink`] should write the node list it derives from
    /// each config back into it.
    #[must_use]
    pub fn rotation(&self) -> Arc<HostRotation> {
        Arc::clone(&self.rotation)
    }

    /// The bucket being followed
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.endpoint.bucket
    }

    /// Whether nodes are contacted over TLS
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.endpoint.tls
    }

    /// Start streaming, handing every config block to `sink`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<S>(self, sink: S) -> StreamHandle
    where
        S: ConfigSink + 'static,
    {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown) = watch::channel(false);

        let orchestrator = Orchestrator::new(
            self.endpoint,
            self.rotation,
            Box::new(sink),
            self.exhausted_wait,
            commands,
            shutdown,
        );
        let task = tokio::spawn(orchestrator.run());

        StreamHandle {
            commands: commands_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Start streaming with a [`TopologySink`], which keeps the node list
    /// up to date. Parsed configs are published on the returned receiver.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start_with_topology(self) -> (StreamHandle, UnboundedReceiver<ConfigUpdate>) {
        let (sink, updates) = TopologySink::new(self.rotation(), self.is_tls());
        (self.start(sink), updates)
    }
}

/// What a configuration transport offers to the component managing
/// configuration subscriptions.
#[async_trait]
pub trait ConfigTransport: Send + Sync {
    /// Offer a config that arrived through a different channel, e.g. piggybacked
    /// on a data-path response.
    fn inject_new_config(&self, raw: &str, source: &HostAddr);

    /// Drop the current connection and reconnect, possibly to another node.
    ///
    /// # Errors
    ///
    /// Fails if there is no connection to refresh, or the transport is closed.
    async fn force_refresh(&self) -> Result<()>;

    /// Stop the transport. No configs are delivered after this returns.
    fn close(&self);
}

/// Controls a running config stream.
///
/// Dropping the handle shuts the stream down, just like [`close`](ConfigTransport::close).
#[derive(Debug)]
pub struct StreamHandle {
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Whether [`close`](ConfigTransport::close) was called, or the stream
    /// stopped otherwise.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.task.is_finished()
    }

    /// Close the stream and wait until the orchestrator has stopped.
    pub async fn shutdown(self) {
        self.close();
        // The task never panics on its own; a panicking sink is caught
        let _ = self.task.await;
    }
}

#[async_trait]
impl ConfigTransport for StreamHandle {
    /// Streaming has no out-of-band channel, so injected configs are ignored.
    /// The stream itself delivers every config the node publishes.
    fn inject_new_config(&self, _raw: &str, source: &HostAddr) {
        if !self.is_closed() {
            log::debug!("Ignoring config injected from {source}, the stream delivers all configs");
        }
    }

    async fn force_refresh(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ErrorKind::Closed);
        }
        let (command, reply) = Command::force_refresh();
        self.commands
            .send(command)
            .await
            .map_err(|_| ErrorKind::Closed)?;
        reply.await.map_err(|_| ErrorKind::Closed)?
    }

    fn close(&self) {
        self.shutdown.send_replace(true);
    }
}
