// ABOUTME: CORS middleware configuration for the query API
// ABOUTME: Builds a tower-http CorsLayer from the configured origin list
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use http::{header::HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Configure CORS for browser clients
///
/// A `*` entry (or an empty list) allows any origin; otherwise only the
/// listed origins are allowed. Only `GET` and `POST` are exposed.
///
/// ```bash
/// # Allow all origins (development)
/// export CORS_ORIGINS="*"
///
/// # Allow specific origins (production)
/// export CORS_ORIGINS="https://analytics.example.com,https://admin.example.com"
/// ```
#[must_use]
pub fn setup_cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s.trim()).ok())
            .collect();
        if parsed.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_methods([Method::GET, Method::POST])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_for_wildcard_and_lists() {
        let _any = setup_cors(&["*".to_owned()]);
        let _list = setup_cors(&["https://a.example.com".to_owned(), "not a header\n".to_owned()]);
        let _empty = setup_cors(&[]);
    }
}
