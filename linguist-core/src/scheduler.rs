// Scheduler: recurring ticks that keep the result store fresh.
//
// One tick: take the tick lease, enumerate tracked entities, select the
// stale ones (absent first, then oldest), and drive Analyzer → ResultStore
// for each under the tick's time budget.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::analyze::Analyzer;
use crate::catalog::EntityCatalog;
use crate::clock::Clock;
use crate::config::LinguistConfig;
use crate::error::{AnalysisError, LinguistError};
use crate::progress::{NoopReporter, ProgressReporter};
use crate::staleness::is_fresh_at;
use crate::store::ResultStore;
use crate::types::{AnalysisResult, EntityRef, TrackedEntity};

/// Default capacity of the on-demand refresh queue.
pub const REFRESH_QUEUE_CAPACITY: usize = 256;

/// Timing and sizing of scheduled ticks.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub frequency: Duration,
    /// Budget for one tick, and the lease ttl.
    pub timeout: Duration,
    pub initial_delay: Duration,
    /// Maximum entities analyzed per tick.
    pub batch_size: usize,
    pub lease_name: String,
    pub max_age: Duration,
}

impl ScheduleSettings {
    pub fn from_config(config: &LinguistConfig) -> Self {
        Self {
            frequency: config.schedule.frequency.as_duration(),
            timeout: config.schedule.timeout.as_duration(),
            initial_delay: config.schedule.initial_delay.as_duration(),
            batch_size: config.schedule.batch_size,
            lease_name: config.schedule.lease_name.clone(),
            max_age: config.cache.max_age.as_duration(),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self::from_config(&LinguistConfig::default())
    }
}

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    Completed,
    /// The budget ran out; unfinished entities wait for the next tick.
    TimedOut,
    /// Another tick was still running in this process.
    SkippedRunning,
    /// Another instance holds the tick lease.
    LeaseHeldElsewhere,
}

/// One entity that failed during a tick.
#[derive(Debug, Clone, Serialize)]
pub struct EntityFailure {
    pub entity_ref: EntityRef,
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

/// Summary of one tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub status: TickStatus,
    pub started_at: DateTime<Utc>,
    pub entities_seen: usize,
    pub stale: usize,
    pub selected: usize,
    pub stored: usize,
    /// Results discarded because a newer one was already stored.
    pub superseded: usize,
    pub skipped_in_flight: usize,
    pub abandoned: usize,
    pub failures: Vec<EntityFailure>,
}

impl TickReport {
    fn new(tick: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            tick,
            status: TickStatus::Completed,
            started_at,
            entities_seen: 0,
            stale: 0,
            selected: 0,
            stored: 0,
            superseded: 0,
            skipped_in_flight: 0,
            abandoned: 0,
            failures: Vec::new(),
        }
    }

    /// Selected entities that reached an outcome.
    pub fn handled(&self) -> usize {
        self.stored + self.superseded + self.skipped_in_flight + self.failures.len()
    }

    fn record(&mut self, entity_ref: &EntityRef, outcome: &EntityOutcome) {
        match outcome {
            EntityOutcome::Stored(_) => self.stored += 1,
            EntityOutcome::Superseded => self.superseded += 1,
            EntityOutcome::InFlight => self.skipped_in_flight += 1,
            EntityOutcome::NotTracked => {}
            EntityOutcome::Failed(e) => self.failures.push(EntityFailure {
                entity_ref: entity_ref.clone(),
                kind: e.kind().to_string(),
                message: e.to_string(),
                retryable: e.is_retryable(),
            }),
            EntityOutcome::StoreFailed(e) => self.failures.push(EntityFailure {
                entity_ref: entity_ref.clone(),
                kind: "store_unavailable".to_string(),
                message: e.to_string(),
                retryable: e.is_retryable(),
            }),
        }
    }
}

/// Result of analyzing a single entity.
#[derive(Debug)]
pub enum EntityOutcome {
    Stored(AnalysisResult),
    /// Analysis succeeded but a newer result was already stored.
    Superseded,
    /// The entity is already being analyzed.
    InFlight,
    /// The catalog does not know the entity.
    NotTracked,
    Failed(AnalysisError),
    StoreFailed(LinguistError),
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSnapshot {
    pub started_at: DateTime<Utc>,
    pub last_tick_start: Option<DateTime<Utc>>,
    pub next_tick_due: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub running: bool,
    pub in_flight: usize,
}

#[derive(Debug)]
struct ScheduleState {
    started_at: DateTime<Utc>,
    last_tick_start: Option<DateTime<Utc>>,
    ticks: u64,
}

type InFlightSet = Arc<Mutex<HashSet<EntityRef>>>;

fn lock_set(set: &Mutex<HashSet<EntityRef>>) -> MutexGuard<'_, HashSet<EntityRef>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Membership in the in-flight set; released on drop, including when a
/// timeout drops the analysis future.
#[derive(Debug)]
struct InFlightGuard {
    set: InFlightSet,
    entity: EntityRef,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_set(&self.set).remove(&self.entity);
    }
}

/// Clears the running flag on drop.
#[derive(Debug)]
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sender side of the on-demand refresh queue.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<EntityRef>,
}

impl RefreshHandle {
    /// Enqueue a refresh without waiting. Returns false when the queue is
    /// full or the scheduler has stopped.
    pub fn request(&self, entity_ref: EntityRef) -> bool {
        match self.tx.try_send(entity_ref) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(entity)) => {
                warn!(entity = %entity, "Refresh queue full, request dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(entity)) => {
                debug!(entity = %entity, "Scheduler stopped, refresh request dropped");
                false
            }
        }
    }
}

/// Receiver side of the refresh queue, consumed by [`Scheduler::run`].
#[derive(Debug)]
pub struct RefreshQueue {
    rx: mpsc::Receiver<EntityRef>,
}

impl RefreshQueue {
    /// Take a pending request without waiting.
    pub fn try_recv(&mut self) -> Option<EntityRef> {
        self.rx.try_recv().ok()
    }
}

pub fn refresh_channel(capacity: usize) -> (RefreshHandle, RefreshQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RefreshHandle { tx }, RefreshQueue { rx })
}

/// Drives periodic analysis of tracked entities.
#[derive(Debug)]
pub struct Scheduler {
    catalog: Arc<dyn EntityCatalog>,
    analyzer: Arc<Analyzer>,
    store: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    settings: ScheduleSettings,
    holder: String,
    state: Mutex<ScheduleState>,
    in_flight: InFlightSet,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(
        catalog: Arc<dyn EntityCatalog>,
        analyzer: Arc<Analyzer>,
        store: Arc<dyn ResultStore>,
        clock: Arc<dyn Clock>,
        settings: ScheduleSettings,
    ) -> Self {
        let started_at = clock.now();
        Self {
            catalog,
            analyzer,
            store,
            clock,
            settings,
            holder: format!("linguist-{}", uuid::Uuid::new_v4()),
            state: Mutex::new(ScheduleState {
                started_at,
                last_tick_start: None,
                ticks: 0,
            }),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            running: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    /// Identity used when taking the tick lease.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    fn state(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn due_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state();
        let (base, wait) = match state.last_tick_start {
            None => (state.started_at, self.settings.initial_delay),
            Some(last) => (last, self.settings.frequency),
        };
        chrono::Duration::from_std(wait)
            .ok()
            .and_then(|wait| base.checked_add_signed(wait))
    }

    /// Whether a tick should start at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at().is_some_and(|due| now >= due)
    }

    fn time_until_due(&self) -> Duration {
        let Some(due) = self.due_at() else {
            return self.settings.frequency;
        };
        (due - self.clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        let next_tick_due = self.due_at();
        let state = self.state();
        ScheduleSnapshot {
            started_at: state.started_at,
            last_tick_start: state.last_tick_start,
            next_tick_due,
            ticks: state.ticks,
            running: self.is_running(),
            in_flight: lock_set(&self.in_flight).len(),
        }
    }

    /// Record a tick start, consuming the schedule slot.
    fn claim_slot(&self, now: DateTime<Utc>) -> u64 {
        let mut state = self.state();
        state.last_tick_start = Some(now);
        state.ticks += 1;
        state.ticks
    }

    fn claim_entity(&self, entity: &EntityRef) -> Option<InFlightGuard> {
        let mut set = lock_set(&self.in_flight);
        if !set.insert(entity.clone()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            entity: entity.clone(),
        })
    }

    /// Run one tick now, regardless of whether it is due.
    pub async fn run_tick(
        &self,
        reporter: &dyn ProgressReporter,
    ) -> crate::error::Result<TickReport> {
        let now = self.clock.now();
        let tick = self.claim_slot(now);
        self.execute_tick(tick, now, reporter).await
    }

    #[instrument(skip_all, name = "tick", fields(tick = tick))]
    async fn execute_tick(
        &self,
        tick: u64,
        started_at: DateTime<Utc>,
        reporter: &dyn ProgressReporter,
    ) -> crate::error::Result<TickReport> {
        let mut report = TickReport::new(tick, started_at);

        let Some(_running) = RunningGuard::acquire(&self.running) else {
            info!("Previous tick still running, skipping");
            report.status = TickStatus::SkippedRunning;
            return Ok(report);
        };

        let acquired = self
            .store
            .try_acquire_lease(
                &self.settings.lease_name,
                &self.holder,
                self.settings.timeout,
                started_at,
            )
            .await?;
        if !acquired {
            debug!(lease = %self.settings.lease_name, "Tick lease held elsewhere");
            report.status = TickStatus::LeaseHeldElsewhere;
            return Ok(report);
        }

        let deadline = Instant::now() + self.settings.timeout;
        let outcome =
            tokio::time::timeout_at(deadline, self.tick_body(&mut report, deadline, reporter))
                .await;
        reporter.tick_finished();

        if let Err(e) = self
            .store
            .release_lease(&self.settings.lease_name, &self.holder)
            .await
        {
            warn!(error = %e, "Failed to release tick lease");
        }

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                report.status = TickStatus::TimedOut;
                report.abandoned = report.selected.saturating_sub(report.handled());
            }
        }

        info!(
            status = ?report.status,
            seen = report.entities_seen,
            stale = report.stale,
            stored = report.stored,
            failed = report.failures.len(),
            abandoned = report.abandoned,
            "Tick finished"
        );
        Ok(report)
    }

    async fn tick_body(
        &self,
        report: &mut TickReport,
        deadline: Instant,
        reporter: &dyn ProgressReporter,
    ) -> crate::error::Result<()> {
        let entities = self.catalog.list_tracked_entities().await?;
        report.entities_seen = entities.len();

        let stored: HashMap<EntityRef, DateTime<Utc>> = self
            .store
            .read_all()
            .await?
            .into_iter()
            .map(|r| (r.entity_ref, r.computed_at))
            .collect();

        let now = self.clock.now();
        let mut stale: Vec<(Option<DateTime<Utc>>, TrackedEntity)> = entities
            .into_iter()
            .filter_map(|entity| {
                let computed_at = stored.get(&entity.entity_ref).copied();
                let fresh =
                    computed_at.is_some_and(|c| is_fresh_at(c, self.settings.max_age, now));
                (!fresh).then_some((computed_at, entity))
            })
            .collect();
        report.stale = stale.len();

        // Absent results first, then oldest.
        stale.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.entity_ref.cmp(&b.1.entity_ref))
        });
        stale.truncate(self.settings.batch_size);
        report.selected = stale.len();

        reporter.tick_started(report.tick, report.selected);
        for (index, (_, entity)) in stale.iter().enumerate() {
            if Instant::now() >= deadline {
                report.status = TickStatus::TimedOut;
                report.abandoned = report.selected - index;
                break;
            }
            let outcome = self.process_entity(entity, deadline).await;
            reporter.entity_finished(&entity.entity_ref, outcome_label(&outcome));
            report.record(&entity.entity_ref, &outcome);
        }
        Ok(())
    }

    #[instrument(skip_all, fields(entity = %entity.entity_ref))]
    async fn process_entity(&self, entity: &TrackedEntity, deadline: Instant) -> EntityOutcome {
        let Some(_guard) = self.claim_entity(&entity.entity_ref) else {
            debug!("Already in flight, skipping");
            return EntityOutcome::InFlight;
        };

        let analysis = tokio::time::timeout_at(
            deadline,
            self.analyzer
                .analyze(&entity.entity_ref, entity.location.as_ref()),
        )
        .await;

        let result = match analysis {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(error = %e, kind = e.kind(), "Analysis failed");
                return EntityOutcome::Failed(e);
            }
            Err(_) => {
                let e = AnalysisError::Timeout {
                    entity: entity.entity_ref.to_string(),
                    after: self.settings.timeout,
                };
                warn!(error = %e, "Analysis abandoned");
                return EntityOutcome::Failed(e);
            }
        };

        match self.store.upsert(&result).await {
            Ok(true) => EntityOutcome::Stored(result),
            Ok(false) => EntityOutcome::Superseded,
            Err(e) => {
                warn!(error = %e, "Failed to store result");
                EntityOutcome::StoreFailed(e)
            }
        }
    }

    /// Analyze one entity now, regardless of freshness.
    ///
    /// Still subject to the in-flight set and the tick timeout. Yields
    /// [`EntityOutcome::InFlight`] while another instance holds the tick
    /// lease or the entity's own lease.
    pub async fn refresh_entity(
        &self,
        entity_ref: &EntityRef,
    ) -> crate::error::Result<EntityOutcome> {
        let Some(entity) = self.catalog.resolve(entity_ref).await? else {
            debug!(entity = %entity_ref, "Refresh requested for untracked entity");
            return Ok(EntityOutcome::NotTracked);
        };

        let now = self.clock.now();
        let tick_holder = self
            .store
            .lease_holder(&self.settings.lease_name, now)
            .await?;
        if tick_holder.is_some_and(|holder| holder != self.holder) {
            debug!(entity = %entity_ref, "Tick running elsewhere, refresh deferred");
            return Ok(EntityOutcome::InFlight);
        }

        let lease = entity_lease_name(entity_ref);
        let acquired = self
            .store
            .try_acquire_lease(&lease, &self.holder, self.settings.timeout, now)
            .await?;
        if !acquired {
            debug!(%lease, "Entity lease held elsewhere");
            return Ok(EntityOutcome::InFlight);
        }

        let deadline = Instant::now() + self.settings.timeout;
        let outcome = self.process_entity(&entity, deadline).await;

        if let Err(e) = self.store.release_lease(&lease, &self.holder).await {
            warn!(error = %e, %lease, "Failed to release entity lease");
        }
        Ok(outcome)
    }

    /// Scheduler loop: fires due ticks, serves refresh requests, and stops
    /// when `shutdown` flips to true. An in-progress tick is allowed to
    /// finish (bounded by its timeout) before returning.
    pub async fn run(
        self: Arc<Self>,
        mut queue: RefreshQueue,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            frequency = ?self.settings.frequency,
            timeout = ?self.settings.timeout,
            initial_delay = ?self.settings.initial_delay,
            batch_size = self.settings.batch_size,
            "Scheduler started"
        );
        let mut tick_task: Option<JoinHandle<()>> = None;
        let mut refreshes: JoinSet<()> = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }
            let wait = self.time_until_due();
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(entity_ref) = queue.rx.recv() => {
                    let scheduler = Arc::clone(&self);
                    refreshes.spawn(async move {
                        match scheduler.refresh_entity(&entity_ref).await {
                            Ok(outcome) => {
                                debug!(
                                    entity = %entity_ref,
                                    outcome = outcome_label(&outcome),
                                    "Refresh finished"
                                );
                            }
                            Err(e) => warn!(entity = %entity_ref, error = %e, "Refresh failed"),
                        }
                    });
                }
                Some(_) = refreshes.join_next(), if !refreshes.is_empty() => {}
                () = tokio::time::sleep(wait) => {
                    let now = self.clock.now();
                    if !self.is_due(now) {
                        continue;
                    }
                    let tick = self.claim_slot(now);
                    if tick_task.as_ref().is_some_and(|t| !t.is_finished()) {
                        info!(tick, "Previous tick still running, skipping");
                        continue;
                    }
                    let scheduler = Arc::clone(&self);
                    tick_task = Some(tokio::spawn(async move {
                        if let Err(e) = scheduler.execute_tick(tick, now, &NoopReporter).await {
                            warn!(tick, error = %e, "Tick failed");
                        }
                    }));
                }
            }
        }

        info!("Scheduler stopping");
        refreshes.shutdown().await;
        if let Some(task) = tick_task {
            let _ = task.await;
        }
    }

    /// Spawn [`Scheduler::run`] on the current runtime.
    pub fn spawn(
        self: Arc<Self>,
        queue: RefreshQueue,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(queue, shutdown))
    }
}

/// Fleet-wide lease guarding on-demand analysis of one entity.
fn entity_lease_name(entity_ref: &EntityRef) -> String {
    format!("linguist:entity:{entity_ref}")
}

fn outcome_label(outcome: &EntityOutcome) -> &'static str {
    match outcome {
        EntityOutcome::Stored(_) => "stored",
        EntityOutcome::Superseded => "superseded",
        EntityOutcome::InFlight => "in_flight",
        EntityOutcome::NotTracked => "not_tracked",
        EntityOutcome::Failed(e) => e.kind(),
        EntityOutcome::StoreFailed(_) => "store_unavailable",
    }
}
