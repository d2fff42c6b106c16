//! fetch-redirect: a fetch interceptor that sends requests for one API host
//! to a static file instead.
//!
//! The library is built around the [`Fetch`] capability. [`install`] wraps a
//! capability once in an [`Interceptor`]; the result is itself a [`Fetch`] and
//! is handed to whatever issues requests. The `fetch-redirect` binary hosts
//! the installed interceptor behind an HTTP forward proxy.
//!
//! ```no_run
//! use fetch_redirect::{install, Fetch, ReqwestFetcher};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let fetcher = install(ReqwestFetcher::new(reqwest::Client::new()));
//! let response = fetcher
//!     .fetch("https://api.cosmic-claw.com/v1/data".into(), None)
//!     .await?;
//! let memory = response.bytes().await?;
//! # let _ = memory;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod fetch;
pub mod interceptor;
pub mod proxy;
pub mod reqwest_fetcher;
pub mod server;
pub mod stats;

pub use address::Address;
pub use fetch::{fetch_fn, BodyStream, BoxError, Fetch, FetchFn, FetchOptions, FetchResponse};
pub use interceptor::{install, FetchExt, Interceptor, RedirectRule, MATCH_PATTERN, REDIRECT_TARGET};
pub use reqwest_fetcher::ReqwestFetcher;
