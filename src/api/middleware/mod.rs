pub mod identity;
pub mod verify_internal;

use http::request::Parts as ReqParts;
use http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::constants::USER_ID_HEADER;

/// `*` allows any origin; otherwise a comma-separated list of suffixes to match against.
pub fn cors(allowed_origins: &str) -> CorsLayer {
    let allowed = if allowed_origins.trim() == "*" {
        AllowOrigin::any()
    } else {
        let suffixes: Vec<String> = allowed_origins
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        AllowOrigin::predicate(move |org: &HeaderValue, _: &ReqParts| {
            suffixes
                .iter()
                .any(|suffix| org.as_bytes().ends_with(suffix.as_bytes()))
        })
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            http::header::CONTENT_TYPE,
            http::header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .allow_origin(allowed)
}
