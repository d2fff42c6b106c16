//! Correlation IDs tying a proxied response to its log lines.

use uuid::Uuid;

/// Response header carrying the correlation ID.
pub const CORRELATION_HEADER: &str = "x-fetch-redirect-id";

/// Generate a new correlation ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
