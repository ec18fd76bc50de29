use axum::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;

use crate::api::server::RouteError;
use crate::constants::USER_ID_HEADER;
use crate::db::prelude::UserId;

/// The acting user, taken from the gateway-set `x-user-id` header.
///
/// Rejects with 401 when the header is missing or isn't a positive integer. Whether the user
/// exists is left to the ledger, after the request body has been validated.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = RouteError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| AuthUser(UserId(id)))
            .ok_or(RouteError::AuthError(StatusCode::UNAUTHORIZED))
    }
}

#[cfg(test)]
mod test {
    use http::Request;

    use super::*;

    async fn extract(value: Option<&str>) -> Result<AuthUser, RouteError> {
        let mut builder = Request::get("/");
        if let Some(value) = value {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();

        AuthUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_header_parsing() {
        assert_eq!(extract(Some("42")).await.unwrap().0, UserId(42));
        assert_eq!(extract(Some(" 7 ")).await.unwrap().0, UserId(7));

        for bad in [None, Some(""), Some("0"), Some("-3"), Some("abc"), Some("1.5")] {
            assert!(
                matches!(
                    extract(bad).await,
                    Err(RouteError::AuthError(status)) if status == StatusCode::UNAUTHORIZED
                ),
                "header {bad:?}"
            );
        }
    }
}
