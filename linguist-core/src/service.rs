// Wiring of the service components from configuration.

use std::sync::Arc;

use tracing::info;

use crate::analyze::{AnalysisSettings, Analyzer};
use crate::catalog::{self, EntityCatalog};
use crate::classify::ExtensionClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::LinguistConfig;
use crate::fetch::DefaultFetcher;
use crate::query::{QueryFacade, QuerySettings};
use crate::scheduler::{
    REFRESH_QUEUE_CAPACITY, RefreshQueue, ScheduleSettings, Scheduler, refresh_channel,
};
use crate::store::{ResultStore, SqliteStore};

/// The assembled service: store, scheduler, and query facade sharing one
/// catalog, analyzer, and clock.
#[derive(Debug)]
pub struct LinguistService {
    pub store: Arc<dyn ResultStore>,
    pub scheduler: Arc<Scheduler>,
    pub facade: Arc<QueryFacade>,
    refresh_queue: Option<RefreshQueue>,
}

impl LinguistService {
    /// Build with the real clock, the configured store, and the configured
    /// catalog (HTTP when `catalog.url` is set, static otherwise).
    pub fn from_config(config: &LinguistConfig) -> crate::error::Result<Self> {
        config.validate()?;
        let store: Arc<dyn ResultStore> = match &config.store.path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => Arc::new(SqliteStore::in_memory()?),
        };
        Self::assemble(
            config,
            store,
            catalog::from_config(config),
            Arc::new(SystemClock),
        )
    }

    /// Build around explicit collaborators.
    pub fn assemble(
        config: &LinguistConfig,
        store: Arc<dyn ResultStore>,
        catalog: Arc<dyn EntityCatalog>,
        clock: Arc<dyn Clock>,
    ) -> crate::error::Result<Self> {
        let analyzer = Arc::new(Analyzer::new(
            Arc::new(DefaultFetcher::new(config.analysis.max_file_bytes)),
            Arc::new(ExtensionClassifier::new()),
            AnalysisSettings::from_config(&config.analysis)?,
            Arc::clone(&clock),
        ));
        Ok(Self::with_analyzer(config, store, catalog, clock, analyzer))
    }

    /// Build around an explicit analyzer, e.g. one with a fake fetcher.
    pub fn with_analyzer(
        config: &LinguistConfig,
        store: Arc<dyn ResultStore>,
        catalog: Arc<dyn EntityCatalog>,
        clock: Arc<dyn Clock>,
        analyzer: Arc<Analyzer>,
    ) -> Self {
        let scheduler = Arc::new(Scheduler::new(
            catalog,
            analyzer,
            Arc::clone(&store),
            Arc::clone(&clock),
            ScheduleSettings::from_config(config),
        ));
        let (refresh, refresh_queue) = refresh_channel(REFRESH_QUEUE_CAPACITY);
        let facade = Arc::new(QueryFacade::new(
            Arc::clone(&store),
            Arc::clone(&scheduler),
            refresh,
            clock,
            QuerySettings::from_config(config),
        ));
        info!(
            on_miss = ?config.query.on_miss,
            persistent = config.store.path.is_some(),
            "Service assembled"
        );
        Self {
            store,
            scheduler,
            facade,
            refresh_queue: Some(refresh_queue),
        }
    }

    /// The receiving end of the refresh queue; `None` once taken.
    pub fn take_refresh_queue(&mut self) -> Option<RefreshQueue> {
        self.refresh_queue.take()
    }
}
