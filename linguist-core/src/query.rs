// Query facade: the read path behind the HTTP API.
//
// Reads never pay analysis cost unless the miss policy says so: stored
// results are returned immediately and a stale hit only enqueues a refresh.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::clock::Clock;
use crate::config::{LinguistConfig, MissPolicy};
use crate::scheduler::{EntityOutcome, RefreshHandle, Scheduler};
use crate::staleness::is_fresh;
use crate::store::ResultStore;
use crate::types::{AnalysisResult, EntityRef};

/// A stored result together with its freshness at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedResult {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Found(CachedResult),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub on_miss: MissPolicy,
    pub max_age: Duration,
}

impl QuerySettings {
    pub fn from_config(config: &LinguistConfig) -> Self {
        Self {
            on_miss: config.query.on_miss,
            max_age: config.cache.max_age.as_duration(),
        }
    }
}

#[derive(Debug)]
pub struct QueryFacade {
    store: Arc<dyn ResultStore>,
    scheduler: Arc<Scheduler>,
    refresh: RefreshHandle,
    clock: Arc<dyn Clock>,
    settings: QuerySettings,
}

impl QueryFacade {
    pub fn new(
        store: Arc<dyn ResultStore>,
        scheduler: Arc<Scheduler>,
        refresh: RefreshHandle,
        clock: Arc<dyn Clock>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            store,
            scheduler,
            refresh,
            clock,
            settings,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    fn cached(&self, result: AnalysisResult) -> CachedResult {
        let fresh = is_fresh(Some(&result), self.settings.max_age, self.clock.now());
        CachedResult { result, fresh }
    }

    /// Current result for an entity.
    #[instrument(skip_all, name = "query_get", fields(entity = %entity_ref))]
    pub async fn get(&self, entity_ref: &EntityRef) -> crate::error::Result<QueryOutcome> {
        if let Some(result) = self.store.read(entity_ref).await? {
            let cached = self.cached(result);
            if !cached.fresh {
                debug!("Stale result served, refresh enqueued");
                self.refresh.request(entity_ref.clone());
            }
            return Ok(QueryOutcome::Found(cached));
        }

        match self.settings.on_miss {
            MissPolicy::NotFound => Ok(QueryOutcome::NotFound),
            MissPolicy::Compute => self.compute(entity_ref).await,
        }
    }

    async fn compute(&self, entity_ref: &EntityRef) -> crate::error::Result<QueryOutcome> {
        match self.scheduler.refresh_entity(entity_ref).await? {
            EntityOutcome::Stored(result) => Ok(QueryOutcome::Found(self.cached(result))),
            // A concurrent writer got there first
            EntityOutcome::Superseded => Ok(self
                .store
                .read(entity_ref)
                .await?
                .map_or(QueryOutcome::NotFound, |r| QueryOutcome::Found(self.cached(r)))),
            EntityOutcome::InFlight | EntityOutcome::NotTracked => Ok(QueryOutcome::NotFound),
            EntityOutcome::Failed(e) => {
                warn!(error = %e, kind = e.kind(), "On-demand analysis failed");
                Ok(QueryOutcome::NotFound)
            }
            EntityOutcome::StoreFailed(e) => Err(e),
        }
    }

    /// Ask for a re-analysis without waiting for it. Returns whether the
    /// request was queued.
    pub fn refresh(&self, entity_ref: &EntityRef) -> bool {
        self.refresh.request(entity_ref.clone())
    }

    /// Every stored result, ordered by entity reference.
    pub async fn list(&self) -> crate::error::Result<Vec<CachedResult>> {
        Ok(self
            .store
            .read_all()
            .await?
            .into_iter()
            .map(|r| self.cached(r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{AnalysisSettings, Analyzer};
    use crate::catalog::StaticCatalog;
    use crate::classify::ExtensionClassifier;
    use crate::clock::ManualClock;
    use crate::progress::NoopReporter;
    use crate::scheduler::{RefreshQueue, ScheduleSettings, refresh_channel};
    use crate::store::SqliteStore;
    use crate::testing::{ScriptedFetcher, tracked};

    struct Harness {
        facade: QueryFacade,
        store: Arc<SqliteStore>,
        clock: Arc<ManualClock>,
        fetcher: Arc<ScriptedFetcher>,
        queue: RefreshQueue,
    }

    fn harness(on_miss: MissPolicy) -> Harness {
        let clock = Arc::new(ManualClock::at_epoch());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .with_tree("/srv/web")
                .with_tree("/srv/api"),
        );
        let analyzer = Arc::new(Analyzer::new(
            fetcher.clone(),
            Arc::new(ExtensionClassifier::new()),
            AnalysisSettings::default(),
            clock.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(StaticCatalog::new(vec![tracked("web"), tracked("api")])),
            analyzer,
            store.clone(),
            clock.clone(),
            ScheduleSettings::default(),
        ));
        let (handle, queue) = refresh_channel(8);
        let facade = QueryFacade::new(
            store.clone(),
            scheduler,
            handle,
            clock.clone(),
            QuerySettings {
                on_miss,
                max_age: Duration::from_secs(30 * 86_400),
            },
        );
        Harness {
            facade,
            store,
            clock,
            fetcher,
            queue,
        }
    }

    #[tokio::test]
    async fn fresh_result_is_served_without_analysis() {
        let mut h = harness(MissPolicy::NotFound);
        h.facade.scheduler().run_tick(&NoopReporter).await.unwrap();
        let calls = h.fetcher.calls();
        let stored = h
            .store
            .read(&EntityRef::from("component:default/web"))
            .await
            .unwrap()
            .unwrap();

        h.clock.advance(Duration::from_secs(3600));
        let outcome = h
            .facade
            .get(&EntityRef::from("component:default/web"))
            .await
            .unwrap();
        let QueryOutcome::Found(cached) = outcome else {
            panic!("expected a cached result");
        };
        assert!(cached.fresh);
        assert_eq!(cached.result, stored);
        assert_eq!(h.fetcher.calls(), calls);
        assert!(h.queue.try_recv().is_none());
    }

    #[tokio::test]
    async fn stale_result_is_served_and_refresh_enqueued() {
        let mut h = harness(MissPolicy::NotFound);
        h.facade.scheduler().run_tick(&NoopReporter).await.unwrap();
        h.clock.advance(Duration::from_secs(31 * 86_400));

        let outcome = h
            .facade
            .get(&EntityRef::from("component:default/web"))
            .await
            .unwrap();
        let QueryOutcome::Found(cached) = outcome else {
            panic!("expected a cached result");
        };
        assert!(!cached.fresh);
        assert_eq!(
            h.queue.try_recv(),
            Some(EntityRef::from("component:default/web"))
        );
    }

    #[tokio::test]
    async fn miss_is_not_found_by_default() {
        let h = harness(MissPolicy::NotFound);
        let outcome = h
            .facade
            .get(&EntityRef::from("component:default/web"))
            .await
            .unwrap();
        assert_eq!(outcome, QueryOutcome::NotFound);
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn miss_computes_when_configured() {
        let h = harness(MissPolicy::Compute);
        let outcome = h
            .facade
            .get(&EntityRef::from("component:default/web"))
            .await
            .unwrap();
        let QueryOutcome::Found(cached) = outcome else {
            panic!("expected a computed result");
        };
        assert!(cached.fresh);
        assert_eq!(cached.result.stat("go").unwrap().bytes, 100);
        assert!(
            h.store
                .read(&EntityRef::from("component:default/web"))
                .await
                .unwrap()
                .is_some()
        );

        let untracked = h
            .facade
            .get(&EntityRef::from("component:default/ghost"))
            .await
            .unwrap();
        assert_eq!(untracked, QueryOutcome::NotFound);
    }

    #[tokio::test]
    async fn refresh_enqueues_and_list_returns_everything() {
        let mut h = harness(MissPolicy::NotFound);
        assert!(h.facade.refresh(&EntityRef::from("component:default/api")));
        assert_eq!(
            h.queue.try_recv(),
            Some(EntityRef::from("component:default/api"))
        );

        h.facade.scheduler().run_tick(&NoopReporter).await.unwrap();
        let all = h.facade.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|c| c.fresh));
        assert_eq!(all[0].result.entity_ref.as_str(), "component:default/api");
    }

    #[test]
    fn cached_result_serializes_flat() {
        let result = AnalysisResult {
            entity_ref: EntityRef::from("component:default/web"),
            stats: vec![],
            language_count: 0,
            computed_at: chrono::DateTime::default(),
            source_location_used: None,
            unit: crate::types::StatUnit::Bytes,
            total_bytes: 0,
            total_lines: None,
            files_analyzed: 0,
            unreadable_files: 0,
        };
        let json = serde_json::to_value(CachedResult {
            result,
            fresh: true,
        })
        .unwrap();
        assert_eq!(json["entityRef"], "component:default/web");
        assert_eq!(json["fresh"], true);
    }
}
