//! Occupancy Coordinator - owns one area's run-time state
//!
//! Producers: the state-change listener (debounced) and the poll loop.
//! Consumer: `refresh`, which runs the calculator under the area lock.
//! Historical analysis runs on a blocking worker behind its own async lock
//! and swaps its outputs in at the end.

pub mod debounce;
pub mod diagnostics;
pub mod lifecycle;
pub mod metrics;


use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::logic::calculator::{
    CalculationInput, DecayState, ProbabilityCalculator, ProbabilityResult,
};
use crate::logic::config::AreaConfig;
use crate::logic::error::{CalculationError, CoordinatorError, HistoryError, StorageError};
use crate::logic::history::{AnalysisInsights, EnvironmentalBaselines, HistoricalAnalyzer, TimeslotCache};
use crate::logic::host::{HistoryProvider, KeyValueStore, StateChange, StateProvider};
use crate::logic::model::OccupancyThreshold;
use crate::logic::priors::PriorStore;
use crate::logic::sensors::{SensorObservation, SensorStateStore};
use crate::logic::storage::{AreaStorage, PersistedState};

pub use debounce::Debouncer;
pub use diagnostics::{Diagnostics, TimeslotSummary};
pub use lifecycle::LifecycleState;
pub use metrics::OccupancyHistory;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Config seconds as a `TimeDelta`, saturating instead of panicking
fn seconds(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

// ============================================================================
// STATE
// ============================================================================

struct AreaState {
    config: AreaConfig,
    lifecycle: LifecycleState,
    sensors: SensorStateStore,
    priors: PriorStore,
    timeslots: Option<Arc<TimeslotCache>>,
    baselines: Arc<EnvironmentalBaselines>,
    insights: Option<Arc<AnalysisInsights>>,
    decay: DecayState,
    history: OccupancyHistory,
    previous_probability: Option<f64>,
    result: Option<ProbabilityResult>,
    last_update_success: bool,
    last_error: Option<String>,
    low_confidence: bool,
    last_save: Option<DateTime<Utc>>,
    last_analysis: Option<DateTime<Utc>>,
}

impl AreaState {
    fn new(config: AreaConfig) -> Self {
        Self {
            decay: DecayState::new(&config.decay),
            config,
            lifecycle: LifecycleState::Uninitialized,
            sensors: SensorStateStore::new(),
            priors: PriorStore::new(),
            timeslots: None,
            baselines: Arc::new(EnvironmentalBaselines::default()),
            insights: None,
            history: OccupancyHistory::default(),
            previous_probability: None,
            result: None,
            last_update_success: true,
            last_error: None,
            low_confidence: false,
            last_save: None,
            last_analysis: None,
        }
    }

    fn advance(&mut self, next: LifecycleState) {
        if self.lifecycle.can_transition_to(next) {
            log::debug!("[{}] {} -> {}", self.config.area_id, self.lifecycle, next);
            self.lifecycle = next;
        }
    }

    fn availability(&self) -> BTreeMap<String, bool> {
        self.config
            .sensors
            .iter()
            .map(|(id, _)| {
                let available = self.sensors.get(id).map(|o| o.available).unwrap_or(false);
                (id.to_string(), available)
            })
            .collect()
    }

    fn refresh(&mut self, now: DateTime<Utc>) -> Result<ProbabilityResult, CalculationError> {
        let outcome = self.calculate(now);
        match &outcome {
            Ok(result) => {
                self.result = Some(result.clone());
                self.last_update_success = true;
                self.last_error = None;
            }
            Err(e) => {
                log::error!("[{}] Update failed: {}", self.config.area_id, e);
                self.last_update_success = false;
                self.last_error = Some(e.to_string());
            }
        }
        outcome
    }

    fn calculate(&mut self, now: DateTime<Utc>) -> Result<ProbabilityResult, CalculationError> {
        if !self.lifecycle.runs_full_calculation() {
            let threshold = self.config.threshold.decimal()?;
            return Ok(ProbabilityResult::minimal(self.availability(), threshold, now));
        }

        let timeslot = match (&self.timeslots, self.lifecycle.uses_timeslots()) {
            (Some(cache), true) => cache.current(now),
            _ => None,
        };
        // Last full result of this session. Restored samples only feed the
        // metrics; decay state is not persisted, so a restart starts from
        // the default prior.
        let previous = self.previous_probability;

        let calculation = ProbabilityCalculator::new(&self.config).calculate(CalculationInput {
            states: &self.sensors,
            priors: &self.priors,
            timeslot,
            baselines: &self.baselines,
            decay: &self.decay,
            previous_probability: previous,
            now,
        })?;

        self.decay = calculation.decay;
        for update in calculation.prior_updates {
            self.priors.record(update);
        }

        let mut result = calculation.result;
        self.previous_probability = Some(result.probability);
        self.history.record(result.probability, result.is_occupied, now);
        result.metrics = Some(
            self.history
                .metrics(now, self.config.timing.poll_interval_secs),
        );

        let low = result.confidence_score < self.config.minimum_confidence;
        if low && !self.low_confidence {
            log::warn!(
                "[{}] Low confidence: {:.0}% of sensors available",
                self.config.area_id,
                result.confidence_score * 100.0
            );
        }
        self.low_confidence = low;

        Ok(result)
    }

    fn persisted(&self) -> PersistedState {
        PersistedState {
            probability_history: self.history.probability_history(),
            occupancy_history: self.history.occupancy_history(),
            last_occupied: self.history.last_occupied(),
            last_state_change: self.history.last_state_change(),
            learned_priors: self.priors.to_map(),
            ..Default::default()
        }
    }
}

struct Runtime {
    shutdown: watch::Sender<bool>,
    debouncer: Debouncer,
    debounce_task: JoinHandle<()>,
    listener: JoinHandle<()>,
    scheduler: JoinHandle<()>,
    analysis: JoinHandle<()>,
}

struct Inner {
    area: Mutex<AreaState>,
    analysis_lock: AsyncMutex<()>,
    states: Arc<dyn StateProvider>,
    history: Arc<dyn HistoryProvider>,
    storage: AreaStorage,
    runtime: Mutex<Option<Runtime>>,
}

// ============================================================================
// PUBLIC API
// ============================================================================

#[derive(Clone)]
pub struct OccupancyCoordinator {
    inner: Arc<Inner>,
}

impl OccupancyCoordinator {
    /// Validate config and wire host adapters; nothing runs until `setup`
    pub fn new(
        config: AreaConfig,
        states: Arc<dyn StateProvider>,
        history: Arc<dyn HistoryProvider>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, CoordinatorError> {
        config.validate()?;
        let storage = AreaStorage::new(store, config.storage_key());
        Ok(Self {
            inner: Arc::new(Inner {
                area: Mutex::new(AreaState::new(config)),
                analysis_lock: AsyncMutex::new(()),
                states,
                history,
                storage,
                runtime: Mutex::new(None),
            }),
        })
    }

    /// Load stored data, take the first full poll and publish a minimal
    /// result. Ends in `HistoricalAnalysisPending`.
    pub async fn setup(&self) -> Result<(), CoordinatorError> {
        self.inner.area.lock().advance(LifecycleState::LoadingStoredData);

        let storage = self.inner.storage.clone();
        let stored = match tokio::task::spawn_blocking(move || storage.load()).await {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!("Stored state load task failed: {}", e);
                None
            }
        };

        {
            let mut area = self.inner.area.lock();
            if let Some(stored) = stored {
                log::info!(
                    "[{}] Restored {} priors, {} probability samples",
                    area.config.area_id,
                    stored.learned_priors.len(),
                    stored.probability_history.len()
                );
                area.history = OccupancyHistory::restore(&stored);
                area.priors = PriorStore::from_records(stored.learned_priors.into_values());
                let configured = area.config.sensors.id_set();
                area.priors.retain(&configured);
            }
            area.advance(LifecycleState::InitializingStates);
        }

        self.poll_states();

        self.inner.area.lock().advance(LifecycleState::MinimalReady);
        self.refresh().await?;

        let mut area = self.inner.area.lock();
        area.advance(LifecycleState::HistoricalAnalysisPending);
        log::info!(
            "[{}] Setup complete, {} sensors tracked",
            area.config.area_id,
            area.sensors.len()
        );
        Ok(())
    }

    /// Setup if needed, then spawn the listener, debouncer, poll and
    /// analysis tasks
    pub async fn start(&self) -> Result<(), CoordinatorError> {
        if self.lifecycle() == LifecycleState::Uninitialized {
            self.setup().await?;
        }

        let mut runtime = self.inner.runtime.lock();
        if runtime.is_some() {
            return Ok(());
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let debounce_ms = self.inner.area.lock().config.timing.debounce_ms;

        let coordinator = self.clone();
        let (debouncer, debounce_task) = Debouncer::spawn(
            Duration::from_millis(debounce_ms),
            shutdown_rx.clone(),
            move || {
                let coordinator = coordinator.clone();
                async move {
                    if let Err(e) = coordinator.refresh().await {
                        log::warn!("Debounced refresh failed: {}", e);
                    }
                }
            },
        );

        let listener = self.spawn_listener(shutdown_rx.clone());
        let scheduler = tokio::spawn(self.clone().scheduler_loop(shutdown_rx.clone()));
        let analysis = tokio::spawn(self.clone().analysis_loop(shutdown_rx));

        *runtime = Some(Runtime {
            shutdown,
            debouncer,
            debounce_task,
            listener,
            scheduler,
            analysis,
        });
        log::info!("Occupancy coordinator started");
        Ok(())
    }

    /// Recompute now. On failure the previous result is kept.
    pub async fn refresh(&self) -> Result<ProbabilityResult, CoordinatorError> {
        let (result, persist) = {
            let mut area = self.inner.area.lock();
            let result = area.refresh(Utc::now())?;
            (result, area.lifecycle.runs_full_calculation())
        };

        if persist {
            if let Err(e) = self.persist(false).await {
                log::warn!("Periodic save failed: {}", e);
            }
        }
        Ok(result)
    }

    /// Schedule a debounced refresh; no-op before `start`
    pub fn request_refresh(&self) {
        match self.inner.runtime.lock().as_ref() {
            Some(runtime) => {
                runtime.debouncer.trigger();
            }
            None => log::debug!("Refresh requested before start, ignoring"),
        }
    }

    /// Re-read every configured sensor from the host
    pub fn poll_states(&self) {
        let configured: Vec<_> = {
            let area = self.inner.area.lock();
            area.config
                .sensors
                .iter()
                .map(|(id, category)| (id.to_string(), category))
                .collect()
        };

        let now = Utc::now();
        let observations: Vec<_> = configured
            .into_iter()
            .map(|(id, category)| {
                let state = self.inner.states.current_state(&id);
                (SensorObservation::from_host(&id, state.as_ref(), now), category)
            })
            .collect();

        let mut area = self.inner.area.lock();
        for (observation, category) in observations {
            // Skip sensors removed while polling
            if area.config.sensors.category_of(&observation.entity_id) == Some(category) {
                area.sensors.apply(observation, category, now);
            }
        }
    }

    /// Apply one host notification and debounce a refresh if it mattered
    pub fn handle_state_change(&self, change: StateChange) {
        let now = Utc::now();
        let changed = {
            let mut area = self.inner.area.lock();
            let Some(category) = area.config.sensors.category_of(&change.entity_id) else {
                return;
            };
            let observation =
                SensorObservation::from_host(&change.entity_id, change.new_state.as_ref(), now);
            area.sensors.apply(observation, category, now)
        };

        if changed {
            self.request_refresh();
        }
    }

    /// One historical analysis pass. Failure keeps the previous priors and
    /// caches; the area still becomes fully ready.
    pub async fn run_analysis(&self) -> Result<(), CoordinatorError> {
        let outcome = {
            let _guard = self.inner.analysis_lock.lock().await;
            let now = Utc::now();

            let (enabled, analyzer, rebuild_timeslots) = {
                let area = self.inner.area.lock();
                let analysis_interval = seconds(area.config.timing.analysis_interval_secs);
                let stale = area
                    .timeslots
                    .as_ref()
                    .map_or(true, |t| t.is_stale(now, analysis_interval));
                (
                    area.config.historical_analysis_enabled,
                    HistoricalAnalyzer::new(area.config.sensors.clone(), area.config.history_period_days),
                    stale,
                )
            };

            if !enabled {
                log::info!("Historical analysis disabled, using default priors");
                self.inner.area.lock().advance(LifecycleState::FullyReady);
                Ok(())
            } else {
                let history = self.inner.history.clone();
                let output = tokio::task::spawn_blocking(move || {
                    analyzer.analyze(history.as_ref(), now, rebuild_timeslots)
                })
                .await
                .map_err(|e| HistoryError::Worker(e.to_string()))
                .and_then(|r| r);

                let mut area = self.inner.area.lock();
                let outcome = match output {
                    Ok(output) => {
                        area.priors.merge_learned(output.learned_priors);
                        let configured = area.config.sensors.id_set();
                        area.priors.retain(&configured);
                        if let Some(cache) = output.timeslots {
                            area.timeslots = Some(Arc::new(cache));
                        }
                        area.baselines = Arc::new(output.baselines);
                        area.insights = Some(Arc::new(output.insights));
                        area.last_analysis = Some(now);
                        Ok(())
                    }
                    Err(e) => {
                        log::warn!(
                            "[{}] Historical analysis failed, keeping previous priors: {}",
                            area.config.area_id,
                            e
                        );
                        Err(CoordinatorError::History(e))
                    }
                };
                area.advance(LifecycleState::FullyReady);
                outcome
            }
        };

        self.refresh().await?;
        outcome
    }

    /// Swap in new options without tearing the area down
    pub async fn update_options(&self, config: AreaConfig) -> Result<(), CoordinatorError> {
        config.validate()?;

        let (sensors_changed, analysis_enabled) = {
            let mut area = self.inner.area.lock();
            let sensors_changed = area.config.sensors != config.sensors;
            let configured = config.sensors.id_set();

            area.sensors.retain(&configured);
            area.priors.retain(&configured);
            area.decay.reconfigure(&config.decay);
            if sensors_changed {
                area.timeslots = None;
            }
            let analysis_enabled = config.historical_analysis_enabled;
            area.config = config;
            log::info!("[{}] Options updated", area.config.area_id);
            (sensors_changed, analysis_enabled)
        };

        self.poll_states();

        if sensors_changed {
            self.respawn_listener();
            if analysis_enabled && self.inner.runtime.lock().is_some() {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = coordinator.run_analysis().await {
                        log::warn!("Analysis after options update failed: {}", e);
                    }
                });
            }
        }

        self.refresh().await?;
        Ok(())
    }

    /// Set the occupancy threshold (percent) and recompute
    pub async fn update_threshold(&self, percent: f64) -> Result<(), CoordinatorError> {
        let threshold = OccupancyThreshold::new(percent)?;
        self.inner.area.lock().config.threshold = threshold;
        self.refresh().await?;
        Ok(())
    }

    /// Save if the save interval has elapsed, or unconditionally with `force`.
    /// Returns whether a save happened.
    pub async fn persist(&self, force: bool) -> Result<bool, CoordinatorError> {
        let now = Utc::now();
        let state = {
            let mut area = self.inner.area.lock();
            let interval = seconds(area.config.timing.save_interval_secs);
            let due = force || area.last_save.map_or(true, |t| now - t >= interval);
            if !due {
                return Ok(false);
            }
            area.last_save = Some(now);
            area.persisted()
        };

        let storage = self.inner.storage.clone();
        tokio::task::spawn_blocking(move || storage.save(&state))
            .await
            .map_err(|e| StorageError::Worker(e.to_string()))??;
        log::debug!("Saved area state to {}", self.inner.storage.key());
        Ok(true)
    }

    /// Stop background tasks and force a final save
    pub async fn shutdown(&self) {
        let runtime = self.inner.runtime.lock().take();
        if let Some(runtime) = runtime {
            let _ = runtime.shutdown.send(true);
            let tasks = [
                runtime.analysis,
                runtime.scheduler,
                runtime.listener,
                runtime.debounce_task,
            ];
            for task in tasks {
                let abort = task.abort_handle();
                if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                    abort.abort();
                }
            }
        }

        if let Err(e) = self.persist(true).await {
            log::error!("Final save failed: {}", e);
        }
        log::info!("Occupancy coordinator stopped");
    }

    pub fn result(&self) -> Option<ProbabilityResult> {
        self.inner.area.lock().result.clone()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.area.lock().lifecycle
    }

    pub fn last_update_success(&self) -> bool {
        self.inner.area.lock().last_update_success
    }

    pub fn config(&self) -> AreaConfig {
        self.inner.area.lock().config.clone()
    }

    pub fn priors(&self) -> PriorStore {
        self.inner.area.lock().priors.clone()
    }

    pub fn timeslot_cache(&self) -> Option<Arc<TimeslotCache>> {
        self.inner.area.lock().timeslots.clone()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let area = self.inner.area.lock();
        Diagnostics {
            area_id: area.config.area_id.clone(),
            name: area.config.name.clone(),
            lifecycle: area.lifecycle,
            last_update_success: area.last_update_success,
            last_error: area.last_error.clone(),
            low_confidence: area.low_confidence,
            result: area.result.clone(),
            sensor_states: area.sensors.snapshot(),
            motion_timestamps: area
                .sensors
                .motion_timestamps()
                .iter()
                .map(|(id, t)| (id.clone(), *t))
                .collect(),
            learned_priors: area.priors.to_map(),
            decay: area.decay.clone(),
            probability_history: area.history.probability_history(),
            occupancy_history: area.history.occupancy_history(),
            last_occupied: area.history.last_occupied(),
            last_state_change: area.history.last_state_change(),
            timeslots: area.timeslots.as_ref().map(|t| TimeslotSummary {
                slot_count: t.slots.len(),
                last_updated: t.last_updated,
            }),
            environmental_baselines: (*area.baselines).clone(),
            insights: area.insights.as_deref().cloned(),
            last_analysis: area.last_analysis,
            last_save: area.last_save,
            config: area.config.clone(),
        }
    }

    // ========================================================================
    // BACKGROUND TASKS
    // ========================================================================

    fn spawn_listener(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let entity_ids = self.inner.area.lock().config.sensors.all_ids();
        let mut changes = self.inner.states.subscribe(&entity_ids);
        let coordinator = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    change = changes.recv() => match change {
                        Some(change) => coordinator.handle_state_change(change),
                        None => {
                            log::debug!("State feed closed, relying on polling");
                            break;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    fn respawn_listener(&self) {
        let mut runtime = self.inner.runtime.lock();
        if let Some(runtime) = runtime.as_mut() {
            runtime.listener.abort();
            runtime.listener = self.spawn_listener(runtime.shutdown.subscribe());
        }
    }

    /// Poll and refresh every `poll_interval_secs`
    async fn scheduler_loop(self, mut shutdown: watch::Receiver<bool>) {
        log::info!("Scheduler loop started");
        loop {
            let poll_interval =
                Duration::from_secs(self.inner.area.lock().config.timing.poll_interval_secs);

            tokio::select! {
                _ = sleep(poll_interval) => {}
                _ = shutdown.changed() => break,
            }

            self.poll_states();
            if let Err(e) = self.refresh().await {
                log::warn!("Scheduled refresh failed: {}", e);
            }
        }
        log::info!("Scheduler loop stopped");
    }

    /// Analyze immediately, then every `analysis_interval_secs`. Separate
    /// from the poll loop.
    async fn analysis_loop(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if let Err(e) = self.run_analysis().await {
                log::warn!("Scheduled analysis failed: {}", e);
            }

            let analysis_interval =
                Duration::from_secs(self.inner.area.lock().config.timing.analysis_interval_secs);
            tokio::select! {
                _ = sleep(analysis_interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        log::debug!("Analysis loop stopped");
    }
}
