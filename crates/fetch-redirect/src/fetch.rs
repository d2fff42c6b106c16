//! The network-fetch capability and the values that flow through it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;
use http::{HeaderMap, Method, StatusCode};

use crate::address::Address;

/// Boxed error carried by response body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A streamed response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Per-request options. Opaque to redirect rules: they are either passed
/// through untouched or dropped entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// HTTP method; `None` means GET.
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl FetchOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A response produced by a [`Fetch`] capability. The body is streamed.
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl FetchResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response whose body is already in memory.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let chunk: Result<Bytes, BoxError> = Ok(body.into());
        Self::new(status, headers, Box::pin(futures_util::stream::iter([chunk])))
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Drain the body into a single buffer.
    pub async fn bytes(mut self) -> Result<Bytes, BoxError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Asynchronous network-fetch capability.
///
/// Implementations issue exactly one outbound request per call. Wrappers such
/// as [`Interceptor`](crate::Interceptor) implement this trait themselves, so
/// capabilities compose by nesting.
pub trait Fetch: Send + Sync {
    /// Error type of a failed fetch.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch `address`, applying `options` when given.
    fn fetch(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> impl Future<Output = Result<FetchResponse, Self::Error>> + Send;
}

impl<T: Fetch> Fetch for &T {
    type Error = T::Error;

    fn fetch(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> impl Future<Output = Result<FetchResponse, Self::Error>> + Send {
        (**self).fetch(address, options)
    }
}

impl<T: Fetch> Fetch for Arc<T> {
    type Error = T::Error;

    fn fetch(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> impl Future<Output = Result<FetchResponse, Self::Error>> + Send {
        (**self).fetch(address, options)
    }
}

/// A [`Fetch`] backed by an async closure.
///
/// Build one with [`fetch_fn`].
#[derive(Clone)]
pub struct FetchFn<F> {
    f: F,
}

/// Turn `f` into a [`Fetch`] capability.
pub fn fetch_fn<F>(f: F) -> FetchFn<F> {
    FetchFn { f }
}

impl<F, Fut, E> Fetch for FetchFn<F>
where
    F: Fn(Address, Option<FetchOptions>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FetchResponse, E>> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn fetch(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> impl Future<Output = Result<FetchResponse, Self::Error>> + Send {
        (self.f)(address, options)
    }
}
