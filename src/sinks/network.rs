//! HTTP request sink.
//!
//! # Responsibilities
//! - Time one inbound request from entry to response
//! - Capture request identity (endpoint, method, client IP, user agent)
//! - Capture response metadata, including the handler side channel
//! - Emit exactly one `network` record per request
//!
//! # Design Decisions
//! - Installed as an axum `from_fn_with_state` middleware
//! - Handlers talk to the sink through response extensions
//!   ([`ResponseMessage`], [`ErrorCode`]), never through shared state
//! - A drop guard owns the timing, so a request whose handler never
//!   returns (cancelled or unwinding) still leaves an `aborted` record

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::header::{CONTENT_LENGTH, USER_AGENT},
    middleware::Next,
    response::{IntoResponseParts, Response, ResponseParts},
};
use tracing_subscriber::fmt::writer::MakeWriter;

use crate::config::NetworkConfig;
use crate::record::{RecordType, SinkLogger};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Human-readable outcome a handler attaches to its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage(pub String);

impl ResponseMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl IntoResponseParts for ResponseMessage {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// Machine-readable error code a handler attaches to its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode(pub String);

impl ErrorCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl IntoResponseParts for ErrorCode {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

/// Request logging sink, used as middleware state.
#[derive(Debug, Clone)]
pub struct NetworkSink {
    logger: SinkLogger,
    trust_forwarded_headers: bool,
}

impl NetworkSink {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            logger: SinkLogger::new(RecordType::Network, &config.sink),
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }

    pub fn with_writer<W>(config: &NetworkConfig, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            logger: SinkLogger::with_writer(RecordType::Network, &config.sink, writer),
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }

    /// Resolve the client address the way reverse-proxied services expect:
    /// forwarded headers first (when trusted), then the socket peer.
    pub fn client_ip(&self, request: &Request) -> String {
        if self.trust_forwarded_headers {
            let forwarded = header_str(request, X_FORWARDED_FOR)
                .and_then(|value| value.split(',').next())
                .and_then(parse_ip)
                .or_else(|| header_str(request, X_REAL_IP).and_then(parse_ip));
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default()
    }
}

fn header_str<'r>(request: &'r Request, name: &str) -> Option<&'r str> {
    request.headers().get(name).and_then(|value| value.to_str().ok())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_nanos() as f64 / 1e6
}

/// Body size in bytes, or −1 when it is not known up front.
fn response_size(response: &Response) -> i64 {
    if let Some(exact) = response.body().size_hint().exact() {
        return i64::try_from(exact).unwrap_or(i64::MAX);
    }

    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(-1)
}

/// Timing context for one request. Emits an `aborted` record if dropped
/// before [`RequestTiming::finish`] runs.
struct RequestTiming<'a> {
    sink: &'a NetworkSink,
    start: Instant,
    endpoint: String,
    method: String,
    ip: String,
    user_agent: String,
    finished: bool,
}

impl<'a> RequestTiming<'a> {
    fn start(sink: &'a NetworkSink, request: &Request) -> Self {
        let uri = request.uri();
        let endpoint = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());

        Self {
            sink,
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: request.method().as_str().to_string(),
            ip: sink.client_ip(request),
            user_agent: header_str(request, USER_AGENT.as_str())
                .unwrap_or_default()
                .to_string(),
            finished: false,
        }
    }

    fn finish(mut self, response: &Response) {
        self.finished = true;

        let status = response.status().as_u16();
        let message = response
            .extensions()
            .get::<ResponseMessage>()
            .map(|m| m.0.as_str());
        let error_code = response
            .extensions()
            .get::<ErrorCode>()
            .map(|c| c.0.as_str());
        let response_time_ms = elapsed_ms(self.start);
        let response_size_bytes = response_size(response);

        self.sink.logger.in_scope(|| {
            tracing::info!(
                endpoint = self.endpoint.as_str(),
                method = self.method.as_str(),
                ip = self.ip.as_str(),
                "user-agent" = self.user_agent.as_str(),
                status,
                message,
                "error-code" = error_code,
                "response-time-ms" = response_time_ms,
                "response-size-bytes" = response_size_bytes
            )
        });
    }
}

impl Drop for RequestTiming<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let response_time_ms = elapsed_ms(self.start);
        self.sink.logger.in_scope(|| {
            tracing::warn!(
                endpoint = self.endpoint.as_str(),
                method = self.method.as_str(),
                ip = self.ip.as_str(),
                "user-agent" = self.user_agent.as_str(),
                "response-time-ms" = response_time_ms,
                aborted = true
            )
        });
    }
}

/// Middleware writing one `network` record per request.
pub async fn network_logger(
    State(sink): State<NetworkSink>,
    request: Request,
    next: Next,
) -> Response {
    let timing = RequestTiming::start(&sink, &request);
    let response = next.run(request).await;
    timing.finish(&response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CaptureWriter;
    use axum::body::Body;
    use axum::http::{request::Builder, Method};

    fn request(uri: &str) -> Builder {
        axum::http::Request::builder().method(Method::GET).uri(uri)
    }

    fn sink(trust_forwarded_headers: bool) -> NetworkSink {
        let config = NetworkConfig {
            trust_forwarded_headers,
            ..NetworkConfig::default()
        };
        NetworkSink::with_writer(&config, CaptureWriter::new())
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let req = request("/")
            .header(X_FORWARDED_FOR, "203.0.113.9, 10.0.0.1")
            .header(X_REAL_IP, "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(sink(true).client_ip(&req), "203.0.113.9");
    }

    #[test]
    fn test_real_ip_used_when_forwarded_for_is_garbage() {
        let req = request("/")
            .header(X_FORWARDED_FOR, "unknown")
            .header(X_REAL_IP, "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(sink(true).client_ip(&req), "198.51.100.2");
    }

    #[test]
    fn test_untrusted_headers_fall_back_to_peer() {
        let mut req = request("/")
            .header(X_FORWARDED_FOR, "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let peer: SocketAddr = "192.0.2.7:51000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));

        assert_eq!(sink(false).client_ip(&req), "192.0.2.7");
    }

    #[test]
    fn test_no_address_is_empty() {
        let req = request("/").body(Body::empty()).unwrap();
        assert_eq!(sink(true).client_ip(&req), "");
    }

    #[test]
    fn test_response_size_prefers_exact_body_length() {
        let response = Response::new(Body::from("hello"));
        assert_eq!(response_size(&response), 5);
        assert_eq!(response_size(&Response::new(Body::empty())), 0);
    }
}
