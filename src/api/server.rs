use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::api::middleware::cors;
use crate::api::middleware::verify_internal::verify_internal_ident;
use crate::ledger::{Ledger, LedgerError};
use crate::util::env::{self, EnvErr};

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone, Debug)]
pub struct AppState {
    pub ledger: Ledger,
    pub internal_token: String,
}

pub fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let admin_routes = Router::new()
        .route("/trpc/admin.grant", post(admin_grant))
        .route("/trpc/admin.deduct", post(admin_deduct))
        .route_layer(from_fn_with_state(state.clone(), verify_internal_ident));

    Router::new()
        .merge(admin_routes)
        .route("/health", get(health))
        //
        // acting-user procedures
        .route("/trpc/tokens.getBalance", get(get_balance))
        .route("/trpc/tokens.award", post(award))
        .route("/trpc/tokens.spend", post(spend))
        .route("/trpc/tokens.getHistory", get(get_history))
        .route("/trpc/tokens.claimDailyBonus", post(claim_daily_bonus))
        .route("/trpc/tokens.getStreak", get(get_streak))
        //
        // unauthenticated
        .route("/trpc/users.register", post(register))
        .route("/trpc/leaderboard.top", get(leaderboard_top))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .layer(cors)
        .with_state(state)
}

/// Logs the source of any `RouteError` that a handler turned into a response
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument(skip(ledger))]
pub async fn start_server(ledger: Ledger) -> Result<(), RouteError> {
    let env = env::env().await?;
    let state = Arc::new(AppState {
        ledger,
        internal_token: env.internal_token.clone(),
    });
    let app = router(state, cors(&env.cors_allow_origins));

    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), env.server_api_port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tracing::info!(
        server_url = &format!("http://127.0.0.1:{}", socket_addr.port()),
        store = ?env.ledger_store,
        "server ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::error!(error = ?e, "unable to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    AuthError(StatusCode),

    #[error(transparent)]
    EnvError(#[from] EnvErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<JsonRejection> for RouteError {
    fn from(rejection: JsonRejection) -> Self {
        RouteError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for RouteError {
    fn from(rejection: QueryRejection) -> Self {
        RouteError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message, err) = match &self {
            RouteError::Ledger(ledger_err) => match ledger_err {
                LedgerError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.to_owned(), None),
                LedgerError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, ledger_err.to_string(), None)
                }
                LedgerError::Conflict(msg) => (StatusCode::CONFLICT, msg.to_owned(), None),
                LedgerError::Store(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("internal storage error"),
                    Some(self),
                ),
            },

            RouteError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_owned(), None),

            RouteError::AuthError(status) => (
                status.to_owned(),
                String::from("missing or invalid caller identity"),
                None,
            ),

            RouteError::EnvError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                Some(self),
            ),

            RouteError::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                Some(self),
            ),
        };

        let mut response = (status, Json(ErrorResponse { message })).into_response();
        if let Some(err) = err {
            response.extensions_mut().insert(Arc::new(err));
        }

        response
    }
}
