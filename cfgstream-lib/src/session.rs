//! A single streaming request to one cluster node.
//!
//! Each [`Session`] owns a spawned task that performs the request, splits the
//! response body into config blocks and reports them to the orchestrator as
//! [`SessionEvent`]s. Aborting the task drops the in-flight request. The
//! session is over once the task has finished, for whatever reason.

use http::StatusCode;
use reqwest::{RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::decoder::BlockDecoder;
use crate::types::Result;
use crate::{ErrorKind, HostAddr};

/// Path of the bucket streaming endpoint, without the bucket name
const STREAMING_PATH: [&str; 3] = ["pools", "default", "bucketsStreaming"];

/// Everything needed to open a stream, shared by all sessions
#[derive(Debug)]
pub(crate) struct StreamEndpoint {
    pub(crate) client: reqwest::Client,
    pub(crate) bucket: String,
    pub(crate) tls: bool,
    pub(crate) credentials: Option<(String, Option<SecretString>)>,
}

impl StreamEndpoint {
    /// URL of the streaming endpoint on the given node
    pub(crate) fn url(&self, host: &HostAddr) -> Result<Url> {
        let scheme = if self.tls { "https" } else { "http" };
        let mut url = Url::parse(&format!("{scheme}://{host}/"))?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(STREAMING_PATH)
            .push(&self.bucket);
        Ok(url)
    }

    fn request(&self, host: &HostAddr) -> Result<RequestBuilder> {
        let request = self.client.get(self.url(host)?);
        Ok(match &self.credentials {
            Some((username, password)) => request.basic_auth(
                username,
                password.as_ref().map(ExposeSecret::expose_secret),
            ),
            None => request,
        })
    }
}

/// Identifies a session, so that events of a replaced session can be told apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SessionId(u64);

impl SessionId {
    pub(crate) const fn first() -> Self {
        Self(1)
    }

    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that happened on a session's stream
#[derive(Debug)]
pub(crate) struct SessionEvent {
    pub(crate) session: SessionId,
    pub(crate) kind: SessionEventKind,
}

#[derive(Debug)]
pub(crate) enum SessionEventKind {
    /// A complete config block, without its delimiter
    Block(Vec<u8>),
    /// The node answered with a status other than `200 OK`
    Rejected(StatusCode),
    /// The request failed or the connection broke
    Failed(ErrorKind),
}

/// Handle to the task streaming from one node
#[derive(Debug)]
pub(crate) struct Session {
    id: SessionId,
    host: HostAddr,
    pub(crate) task: JoinHandle<()>,
}

impl Session {
    /// Start streaming from `host`. Events are reported on `events`.
    pub(crate) fn open(
        id: SessionId,
        host: HostAddr,
        endpoint: Arc<StreamEndpoint>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        log::info!(
            "Opening config stream (host={host}, tls={}, bucket={})",
            endpoint.tls,
            endpoint.bucket
        );

        let task = tokio::spawn({
            let host = host.clone();
            async move {
                let reporter = Reporter { id, events };
                if let Err(e) = stream(&host, &endpoint, &reporter).await {
                    reporter.send(SessionEventKind::Failed(e)).await;
                }
            }
        });

        Self { id, host, task }
    }

    pub(crate) const fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) const fn host(&self) -> &HostAddr {
        &self.host
    }

    /// Forcibly terminate the request and wait until the task is gone.
    ///
    /// Once this returns, the session cannot emit any further events.
    pub(crate) async fn abort(self) {
        self.task.abort();
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            log::error!("Config stream task for {} panicked", self.host);
        }
    }
}

struct Reporter {
    id: SessionId,
    events: mpsc::Sender<SessionEvent>,
}

impl Reporter {
    /// Send an event, returning `false` if nobody is listening anymore
    async fn send(&self, kind: SessionEventKind) -> bool {
        let event = SessionEvent {
            session: self.id,
            kind,
        };
        self.events.send(event).await.is_ok()
    }
}

async fn stream(host: &HostAddr, endpoint: &StreamEndpoint, reporter: &Reporter) -> Result<()> {
    let mut response = endpoint
        .request(host)?
        .send()
        .await
        .map_err(ErrorKind::NetworkRequest)?;

    let status = response.status();
    if status != StatusCode::OK {
        // Dropping the response terminates the request
        drop(response);
        reporter.send(SessionEventKind::Rejected(status)).await;
        return Ok(());
    }

    let mut decoder = BlockDecoder::new();
    while let Some(chunk) = response.chunk().await.map_err(ErrorKind::NetworkRequest)? {
        decoder.push(&chunk);
        while let Some(block) = decoder.next_block() {
            if !reporter.send(SessionEventKind::Block(block)).await {
                return Ok(());
            }
        }
    }

    if !decoder.pending().is_empty() {
        log::debug!(
            "Config stream from {host} ended with {} bytes of incomplete config",
            decoder.pending().len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn endpoint(bucket: &str, tls: bool) -> StreamEndpoint {
        StreamEndpoint {
            client: reqwest::Client::new(),
            bucket: bucket.to_string(),
            tls,
            credentials: None,
        }
    }

    #[test]
    fn test_streaming_url() {
        let host = HostAddr::new("10.0.0.1", 8091);
        assert_eq!(
            endpoint("travel-sample", false).url(&host).unwrap().as_str(),
            "http://10.0.0.1:8091/pools/default/bucketsStreaming/travel-sample"
        );
    }

    #[test]
    fn test_streaming_url_tls() {
        let host = HostAddr::new("node-a.local", 18091);
        assert_eq!(
            endpoint("default", true).url(&host).unwrap().as_str(),
            "https://node-a.local:18091/pools/default/bucketsStreaming/default"
        );
    }

    #[test]
    fn test_streaming_url_ipv6() {
        let host: HostAddr = "[::1]:8091".parse().unwrap();
        assert_eq!(
            endpoint("default", false).url(&host).unwrap().as_str(),
            "http://[::1]:8091/pools/default/bucketsStreaming/default"
        );
    }

    #[test]
    fn test_bucket_name_is_a_single_segment() {
        let host = HostAddr::new("localhost", 8091);
        assert_eq!(
            endpoint("a/b c", false).url(&host).unwrap().path(),
            "/pools/default/bucketsStreaming/a%2Fb%20c"
        );
    }

    #[test]
    fn test_session_ids_increase() {
        let first = SessionId::first();
        assert!(first.next() > first);
        assert_eq!(first.next().to_string(), "#2");
    }
}
