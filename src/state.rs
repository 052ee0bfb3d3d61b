use std::sync::Arc;

use crate::{
    config::Config,
    error::AppError,
    ledger::{Ledger, LedgerClient},
    menu::{self, MenuItem},
    store::FileStore,
};

pub struct AppState {
    pub config: Config,
    pub ledger: LedgerClient,
    pub menu: Vec<MenuItem>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        Self::with_config(config)
            .await
            .expect("Data directory misconfigured!")
    }

    /// Builds the state against an explicit config; the writer task is
    /// spawned here and lives as long as the process.
    pub async fn with_config(config: Config) -> Result<Arc<Self>, AppError> {
        let store = FileStore::open(&config.data_dir).await?;
        let (ledger, client) = Ledger::open(store).await?;
        tokio::spawn(ledger.run());

        Ok(Arc::new(Self {
            config,
            ledger: client,
            menu: menu::default_catalog(),
        }))
    }
}
