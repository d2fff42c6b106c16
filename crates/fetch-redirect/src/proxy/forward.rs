//! Translation between proxied HTTP requests and [`Fetch`](crate::Fetch) calls.
//!
//! Bodies are streamed back verbatim: no parsing, no transformation.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::header::{CONNECTION, HOST, VIA};
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_core::Stream;

use super::correlation::CORRELATION_HEADER;
use crate::error::ProxyError;
use crate::fetch::{BodyStream, BoxError, FetchOptions, FetchResponse};
use crate::stats::ProxyStats;

/// Headers that should NOT be forwarded (hop-by-hop headers).
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "proxy-connection",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
];

/// Name this proxy uses in `Via` entries.
pub const VIA_PSEUDONYM: &str = "fetch-redirect";

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Header names listed in `Connection`, which are hop-by-hop for this message only.
fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Copy `headers` minus everything that must not cross this hop.
fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut kept = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) || listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        kept.append(name.clone(), value.clone());
    }
    kept
}

/// Reject requests that already carry this proxy's `Via` entry.
pub fn check_loop(headers: &HeaderMap) -> Result<(), ProxyError> {
    let seen = headers
        .get_all(VIA)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|entry| entry.split_whitespace().nth(1) == Some(VIA_PSEUDONYM));
    if seen {
        return Err(ProxyError::LoopDetected);
    }
    Ok(())
}

/// Work out the absolute address a proxied request is aimed at.
///
/// Absolute-form targets (`GET http://host/path`) are used verbatim.
/// Origin-form targets are rebuilt from the `Host` header as plain HTTP.
pub fn resolve_address(method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<String, ProxyError> {
    if *method == Method::CONNECT {
        return Err(ProxyError::ConnectUnsupported);
    }

    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.to_string());
    }

    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(ProxyError::MissingHost)?;
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Ok(format!("http://{host}{path_and_query}"))
}

/// Build the options for the outbound fetch from the client's request.
///
/// Hop-by-hop headers, headers named in `Connection`, and `content-length`
/// are dropped (the outbound client sets its own framing). A `Via` entry for
/// this proxy is appended. An empty body is treated as no body.
pub fn request_options(method: &Method, headers: &HeaderMap, body: Bytes) -> FetchOptions {
    let mut forwarded = end_to_end_headers(headers);
    forwarded.remove(axum::http::header::CONTENT_LENGTH);
    forwarded.append(VIA, HeaderValue::from_static("1.1 fetch-redirect"));

    FetchOptions {
        method: Some(method.clone()),
        headers: forwarded,
        body: (!body.is_empty()).then_some(body),
    }
}

/// Whether `err` (or anything in its source chain) is a timeout.
pub fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(re) = e.downcast_ref::<reqwest::Error>() {
            if re.is_timeout() {
                return true;
            }
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Passes body chunks through unchanged while recording timing and size on
/// the request span once the stream ends.
struct TimedBody {
    inner: BodyStream,
    span: tracing::Span,
    start: Instant,
    bytes: u64,
    first_chunk_seen: bool,
}

impl Stream for TimedBody {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !self.first_chunk_seen {
                    self.first_chunk_seen = true;
                    self.span
                        .record("ttfb_ms", self.start.elapsed().as_millis() as u64);
                }
                self.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(parent: &self.span, error = %e, "Upstream body stream failed");
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.span
                    .record("total_duration_ms", self.start.elapsed().as_millis() as u64);
                self.span.record("response_bytes", self.bytes);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Build an axum Response from the fetch result, streaming the body back.
pub fn build_response<E>(
    result: Result<FetchResponse, E>,
    start: Instant,
    correlation_id: &str,
    stats: &ProxyStats,
) -> Response
where
    E: std::error::Error + 'static,
{
    let span = tracing::Span::current();

    let upstream = match result {
        Ok(resp) => resp,
        Err(e) => {
            stats.inc_failures();
            let latency = start.elapsed().as_millis() as u64;
            let error = if is_timeout(&e) {
                ProxyError::UpstreamTimeout
            } else {
                ProxyError::UpstreamConnection
            };
            span.record("status", error.status().as_u16());
            tracing::error!(error = %e, latency_ms = latency, "Upstream fetch failed");
            return with_correlation(error.into_response(), correlation_id);
        }
    };

    let status = upstream.status;
    span.record("status", status.as_u16());
    tracing::info!(
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Fetch complete"
    );

    let mut response_builder = Response::builder().status(status);
    for (name, value) in end_to_end_headers(&upstream.headers).iter() {
        response_builder = response_builder.header(name, value);
    }

    let body = Body::from_stream(TimedBody {
        inner: upstream.body,
        span,
        start,
        bytes: 0,
        first_chunk_seen: false,
    });

    match response_builder.body(body) {
        Ok(response) => with_correlation(response, correlation_id),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build response");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
            )
                .into_response()
        }
    }
}

/// Stamp `response` with the correlation ID header.
pub fn with_correlation(mut response: Response, correlation_id: &str) -> Response {
    response.headers_mut().insert(
        CORRELATION_HEADER,
        HeaderValue::from_str(correlation_id).unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    );
    response
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_absolute_form_is_used_verbatim() {
        let uri: Uri = "http://api.cosmic-claw.com/v1/data?page=2".parse().unwrap();
        let address = resolve_address(&Method::GET, &uri, &headers(&[("host", "ignored.test")])).unwrap();
        assert_eq!(address, "http://api.cosmic-claw.com/v1/data?page=2");
    }

    #[test]
    fn test_origin_form_uses_host_header() {
        let uri: Uri = "/v1/data?page=2".parse().unwrap();
        let address =
            resolve_address(&Method::GET, &uri, &headers(&[("host", "api.cosmic-claw.com:8080")])).unwrap();
        assert_eq!(address, "http://api.cosmic-claw.com:8080/v1/data?page=2");
    }

    #[test]
    fn test_missing_host_and_connect_are_rejected() {
        let uri: Uri = "/v1/data".parse().unwrap();
        let err = resolve_address(&Method::GET, &uri, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ProxyError::MissingHost));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let uri: Uri = "api.cosmic-claw.com:443".parse().unwrap();
        let err = resolve_address(&Method::CONNECT, &uri, &HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ProxyError::ConnectUnsupported));
    }

    #[test]
    fn test_request_options_strip_hop_by_hop() {
        let incoming = headers(&[
            ("host", "example.com"),
            ("proxy-connection", "keep-alive"),
            ("connection", "close"),
            ("content-length", "7"),
            ("content-type", "application/json"),
            ("x-custom", "a"),
            ("x-custom", "b"),
        ]);
        let options = request_options(&Method::POST, &incoming, Bytes::from_static(b"{\"a\":1}"));

        assert_eq!(options.method, Some(Method::POST));
        assert_eq!(options.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(options.headers.len(), 4);
        assert_eq!(options.headers["content-type"], "application/json");
        assert_eq!(options.headers["via"], "1.1 fetch-redirect");
        let custom: Vec<_> = options.headers.get_all("x-custom").iter().collect();
        assert_eq!(custom, vec!["a", "b"]);
    }

    #[test]
    fn test_connection_listed_headers_are_stripped() {
        let incoming = headers(&[
            ("connection", "X-Session, keep-alive"),
            ("connection", "x-hop"),
            ("x-session", "s1"),
            ("x-hop", "h1"),
            ("x-kept", "k1"),
            ("via", "1.1 corp-gateway"),
        ]);
        let options = request_options(&Method::GET, &incoming, Bytes::new());

        assert!(options.headers.get("x-session").is_none());
        assert!(options.headers.get("x-hop").is_none());
        assert_eq!(options.headers["x-kept"], "k1");
        let via: Vec<_> = options.headers.get_all("via").iter().collect();
        assert_eq!(via, vec!["1.1 corp-gateway", "1.1 fetch-redirect"]);
    }

    #[test]
    fn test_loop_detected_from_via() {
        assert!(check_loop(&HeaderMap::new()).is_ok());
        assert!(check_loop(&headers(&[("via", "1.1 corp-gateway")])).is_ok());
        assert!(check_loop(&headers(&[("via", "1.0 fetch-redirect-mirror")])).is_ok());

        let err = check_loop(&headers(&[("via", "1.1 corp-gateway, 1.1 fetch-redirect")])).unwrap_err();
        assert!(matches!(err, ProxyError::LoopDetected));
        assert_eq!(err.status(), StatusCode::LOOP_DETECTED);
    }

    #[test]
    fn test_empty_body_becomes_none() {
        let options = request_options(&Method::GET, &HeaderMap::new(), Bytes::new());
        assert_eq!(options.body, None);
    }

    #[test]
    fn test_timeout_detection_walks_sources() {
        #[derive(Debug, thiserror::Error)]
        #[error("wrapped")]
        struct Wrapped(#[source] std::io::Error);

        let timed_out = Wrapped(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(is_timeout(&timed_out));

        let refused = Wrapped(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no"));
        assert!(!is_timeout(&refused));
    }

    #[tokio::test]
    async fn test_error_maps_to_gateway_status() {
        let stats = ProxyStats::new();
        let result: Result<FetchResponse, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        let response = build_response(result, Instant::now(), "abc", &stats);
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()[CORRELATION_HEADER], "abc");

        let result: Result<FetchResponse, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no"));
        let response = build_response(result, Instant::now(), "def", &stats);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(stats.snapshot().failed_requests, 2);
    }

    #[tokio::test]
    async fn test_success_streams_body_and_filters_headers() {
        let stats = ProxyStats::new();
        let upstream = FetchResponse::from_bytes(
            StatusCode::OK,
            headers(&[
                ("content-type", "application/json"),
                ("connection", "close, x-upstream-hop"),
                ("x-upstream-hop", "1"),
            ]),
            "{\"memory\":[]}",
        );
        let response = build_response(Ok::<_, std::io::Error>(upstream), Instant::now(), "abc", &stats);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert!(response.headers().get("connection").is_none());
        assert!(response.headers().get("x-upstream-hop").is_none());
        assert_eq!(response.headers()[CORRELATION_HEADER], "abc");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "{\"memory\":[]}");
        assert_eq!(stats.snapshot().failed_requests, 0);
    }
}
