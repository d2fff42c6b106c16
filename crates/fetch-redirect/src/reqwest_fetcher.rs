//! Production [`Fetch`] capability over `reqwest`.

use std::time::Duration;

use futures_util::StreamExt;
use http::Method;

use crate::address::Address;
use crate::fetch::{BoxError, Fetch, FetchOptions, FetchResponse};

/// Issues real HTTP requests. Response bodies are streamed, never buffered.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a fetcher whose client applies `timeout` to every request.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn build_request(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> Result<reqwest::Request, reqwest::Error> {
        match address {
            Address::Text(url) => {
                let options = options.unwrap_or_default();
                let method = options.method.unwrap_or(Method::GET);
                let mut builder = self.client.request(method, url).headers(options.headers);
                if let Some(body) = options.body {
                    builder = builder.body(body);
                }
                builder.build()
            }
            Address::Request(req) => {
                let mut request = reqwest::Request::try_from(req)?;
                // Options given alongside a prepared request take precedence.
                if let Some(options) = options {
                    if let Some(method) = options.method {
                        *request.method_mut() = method;
                    }
                    request.headers_mut().extend(options.headers);
                    if let Some(body) = options.body {
                        *request.body_mut() = Some(body.into());
                    }
                }
                Ok(request)
            }
        }
    }
}

impl Fetch for ReqwestFetcher {
    type Error = reqwest::Error;

    async fn fetch(
        &self,
        address: Address,
        options: Option<FetchOptions>,
    ) -> Result<FetchResponse, reqwest::Error> {
        let request = self.build_request(address, options)?;
        let response = self.client.execute(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Box::new(e) as BoxError));

        Ok(FetchResponse::new(status, headers, Box::pin(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    /// Ignore any proxy configured in the environment.
    fn direct_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn test_text_address_with_options() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/foo")
                    .header("x-trace", "abc")
                    .body("payload");
                then.status(201).header("x-upstream", "yes").body("created");
            })
            .await;

        let fetcher = ReqwestFetcher::new(direct_client());
        let options = FetchOptions::method(Method::POST)
            .with_header(
                http::HeaderName::from_static("x-trace"),
                http::HeaderValue::from_static("abc"),
            )
            .with_body("payload");

        let response = fetcher
            .fetch(Address::from(server.url("/foo")), Some(options))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, http::StatusCode::CREATED);
        assert_eq!(response.headers["x-upstream"], "yes");
        assert_eq!(response.bytes().await.unwrap(), "created");
    }

    #[tokio::test]
    async fn test_text_address_defaults_to_get() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/zenith-memory.json");
                then.status(200).body("{}");
            })
            .await;

        let fetcher = ReqwestFetcher::new(direct_client());
        let response = fetcher
            .fetch(Address::from(server.url("/zenith-memory.json")), None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.bytes().await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_prepared_request_is_sent_as_is() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/v1/data").body("raw");
                then.status(204);
            })
            .await;

        let req = http::Request::builder()
            .method(Method::PUT)
            .uri(server.url("/v1/data"))
            .body(bytes::Bytes::from_static(b"raw"))
            .unwrap();

        let fetcher = ReqwestFetcher::new(direct_client());
        let response = fetcher.fetch(Address::from(req), None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, http::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_prepared_request_options_take_precedence() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/data")
                    .header("x-original", "kept")
                    .header("x-trace", "abc")
                    .body("override");
                then.status(200);
            })
            .await;

        let req = http::Request::builder()
            .method(Method::PUT)
            .uri(server.url("/v1/data"))
            .header("x-original", "kept")
            .body(bytes::Bytes::from_static(b"raw"))
            .unwrap();
        let options = FetchOptions::method(Method::POST)
            .with_header(
                http::HeaderName::from_static("x-trace"),
                http::HeaderValue::from_static("abc"),
            )
            .with_body("override");

        let fetcher = ReqwestFetcher::new(direct_client());
        let response = fetcher.fetch(Address::from(req), Some(options)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_url_is_a_reqwest_error() {
        let fetcher = ReqwestFetcher::new(direct_client());
        let err = fetcher
            .fetch(Address::from("not a url"), None)
            .await
            .unwrap_err();
        assert!(err.is_builder());
    }
}
