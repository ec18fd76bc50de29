use std::sync::Arc;

use thiserror::Error;

use crate::db::prelude::{PgStore, StoreError};
use crate::ledger::Ledger;
use crate::util::env::{self, EnvErr, StoreKind};
use crate::util::telemetry;

mod api;
mod constants;
mod db;
mod ledger;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Route(#[from] api::server::RouteError),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_registry = telemetry::Telemetry::new().await?.register();

    tracing::info!("starting main application");

    let ledger = match env::env().await?.ledger_store {
        StoreKind::Postgres => Ledger::new(Arc::new(PgStore::connect().await?)),
        StoreKind::Memory => {
            tracing::warn!("using the in-memory ledger store, nothing will be persisted");
            Ledger::in_memory()
        }
    };

    let served = api::server::start_server(ledger).await;

    telemetry_registry.shutdown();
    Ok(served?)
}
