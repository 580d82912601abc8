//! CORS Configuration
//!
//! The review feed API is consumed directly from customers' own websites,
//! so the feed routes accept any origin. Nothing stateful crosses this
//! boundary: callers present an API identity in the request body and the
//! responses carry no credentials.

use std::time::Duration;

use http::Method;
use tower_http::cors::{Any, CorsLayer};

/// Methods the feed endpoints accept (plus preflight)
pub const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

/// Preflight cache lifetime (1 hour)
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// CORS layer for the public review feed routes.
///
/// Any origin, no credentials: the feed is meant to be embedded in
/// third-party pages.
pub fn public_feed_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([http::header::CONTENT_TYPE])
        .max_age(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feed_layer_builds() {
        let layer = public_feed_layer();
        let _ = format!("{:?}", layer);
    }
}
