//! `test-utils` is used for testing in both `cfgstream-lib` and `cfgstream-bin`.
//! This crate does not depend on `cfgstream-lib` or `cfgstream-bin`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Path prefix of the bucket streaming endpoint, as used by wiremock matchers
#[macro_export]
macro_rules! streaming_path_regex {
    () => {
        r"^/pools/default/bucketsStreaming/[^/]+$"
    };
}

/// Create a mock cluster node, which responds with a predefined status on the
/// bucket streaming endpoint.
///
/// Extra builder calls on the [`wiremock::ResponseTemplate`] can be chained:
///
/// ```ignore
/// let node = mock_stream_server!(200, set_body_string(stream_body!(config)));
/// ```
#[macro_export]
macro_rules! mock_stream_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from_u16($status).unwrap());
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path_regex($crate::streaming_path_regex!()))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// Join config documents into a streaming response body, terminating each of
/// them with the block delimiter.
#[macro_export]
macro_rules! stream_body {
    ($($block:expr),* $(,)?) => {{
        let mut body = String::new();
        $(
            body.push_str(&$block);
            body.push_str("\n\n\n\n");
        )*
        body
    }};
}

/// Build a minimal cluster config document.
///
/// Each node is given as `"host" => (http_mgmt_port, https_mgmt_port)`.
///
/// ```ignore
/// let config = cluster_config!(7; "10.0.0.1" => (8091, 18091), "10.0.0.2" => (8091, 18091));
/// ```
#[macro_export]
macro_rules! cluster_config {
    ($rev:expr; $($host:expr => ($http:expr, $https:expr)),* $(,)?) => {{
        let nodes: Vec<serde_json::Value> = vec![
            $(
                serde_json::json!({
                    "host": $host,
                    "ports": { "httpMgmt": $http, "httpsMgmt": $https },
                }),
            )*
        ];
        serde_json::json!({
            "rev": $rev,
            "name": "default",
            "nodes": nodes,
        })
        .to_string()
    }};
}

/// Host address (`host:port`) of a running wiremock server
#[macro_export]
macro_rules! mock_host {
    ($server:expr) => {{
        let address = $server.address();
        format!("{}:{}", address.ip(), address.port())
    }};
}
