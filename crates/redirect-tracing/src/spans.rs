//! Span builder helpers for fetch-redirect instrumentation.

/// Create a tracing span for one request handled by the proxy.
///
/// Usage: `let span = proxy_request_span!(correlation_id, method, address);`
///
/// Fields recorded later:
/// - `status`: upstream status code (or the proxy's own error status)
/// - `ttfb_ms`: milliseconds from fetch start to the first body chunk
/// - `total_duration_ms`: milliseconds from fetch start to body end
/// - `response_bytes`: number of body bytes streamed back
#[macro_export]
macro_rules! proxy_request_span {
    ($correlation_id:expr, $method:expr, $address:expr) => {
        tracing::info_span!(
            "proxy_request",
            correlation_id = %$correlation_id,
            method = %$method,
            address = %$address,
            status = tracing::field::Empty,
            ttfb_ms = tracing::field::Empty,
            total_duration_ms = tracing::field::Empty,
            response_bytes = tracing::field::Empty,
        )
    };
}

/// Create a tracing span for a single call into the wrapped fetch capability.
#[macro_export]
macro_rules! upstream_fetch_span {
    ($address:expr, $redirected:expr) => {
        tracing::debug_span!(
            "upstream_fetch",
            address = %$address,
            redirected = $redirected,
        )
    };
}
