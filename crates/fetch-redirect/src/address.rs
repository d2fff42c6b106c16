//! Request addresses accepted by a [`Fetch`](crate::Fetch) capability.

use std::fmt;

use bytes::Bytes;

/// The target of a fetch.
///
/// Only [`Address::Text`] is inspected by redirect rules. A prepared
/// [`Address::Request`] carries its own URI, method, headers and body and is
/// always forwarded as-is.
#[derive(Debug)]
pub enum Address {
    /// A textual URL, e.g. `https://example.com/foo`.
    Text(String),
    /// A fully prepared HTTP request.
    Request(http::Request<Bytes>),
}

impl Address {
    /// The address as text, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Address::Text(s) => Some(s.as_str()),
            Address::Request(_) => None,
        }
    }

    /// Whether this is a prepared request rather than a textual URL.
    pub fn is_request(&self) -> bool {
        matches!(self, Address::Request(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Text(s) => f.write_str(s),
            Address::Request(req) => write!(f, "{} {}", req.method(), req.uri()),
        }
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address::Text(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address::Text(s.to_string())
    }
}

impl From<reqwest::Url> for Address {
    fn from(url: reqwest::Url) -> Self {
        Address::Text(url.into())
    }
}

impl From<http::Request<Bytes>> for Address {
    fn from(req: http::Request<Bytes>) -> Self {
        Address::Request(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_addresses_expose_text() {
        let address = Address::from("https://example.com/foo");
        assert_eq!(address.as_text(), Some("https://example.com/foo"));
        assert!(!address.is_request());

        let url = reqwest::Url::parse("https://example.com/a?b=c").unwrap();
        assert_eq!(Address::from(url).as_text(), Some("https://example.com/a?b=c"));
    }

    #[test]
    fn test_request_addresses_hide_text() {
        let req = http::Request::builder()
            .method("PUT")
            .uri("https://api.cosmic-claw.com/v1/data")
            .body(Bytes::new())
            .unwrap();
        let address = Address::from(req);

        assert_eq!(address.as_text(), None);
        assert!(address.is_request());
        assert_eq!(address.to_string(), "PUT https://api.cosmic-claw.com/v1/data");
    }
}
