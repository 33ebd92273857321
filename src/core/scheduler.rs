/// Refresh task: the single background loop that decides what to show,
/// renders it and pushes it to the panel.
///
/// All shared state sits behind one mutex that is never held across an
/// await. Generation, display output and config writes run on the blocking
/// pool, so at most one render is ever in flight.
use chrono::NaiveDateTime;
use serde::Serialize;
use std::panic;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Notify, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::DeviceConfig;
use crate::core::action::{ManualUpdateRequest, RefreshAction, RefreshMetrics, RefreshOutcome, RenderJob};
use crate::core::clock::{Clock, SystemClock, device_time};
use crate::display::DisplayManager;
use crate::error::{PersistenceError, RefreshError};
use crate::playlist::refresh_info::RefreshInfo;
use crate::render::plugins::PluginRegistry;
use crate::services::storage::ConfigStore;

/// What the loop is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Idle,
    Resolving,
    Rendering,
    Persisting,
    Stopped,
}

/// Point-in-time view of the task, for status endpoints and logs
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub phase: TaskPhase,
    pub active_playlist: Option<String>,
    pub last_refresh: Option<RefreshInfo>,
}

type Reply = oneshot::Sender<Result<RefreshMetrics, RefreshError>>;

struct ManualJob {
    request: ManualUpdateRequest,
    reply: Reply,
}

struct TaskState {
    config: DeviceConfig,
    running: bool,
    phase: TaskPhase,
    /// Mailbox for the one pending manual request
    manual: Option<ManualJob>,
}

struct Shared {
    state: Mutex<TaskState>,
    wake: Notify,
    /// Serialises config writes so the file always ends on the newest snapshot
    write_lock: Mutex<()>,
    registry: PluginRegistry,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    display: Arc<Mutex<DisplayManager>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: TaskPhase) {
        let mut state = self.lock();
        if state.running {
            state.phase = phase;
        }
    }

    /// Write the current config. Blocking.
    fn persist(&self) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.lock().config.clone();
        self.store.write_config(&snapshot)
    }
}

pub struct RefreshTask {
    shared: Arc<Shared>,
    /// Held by `stop` until the loop has exited
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    /// Held by a manual caller from submission until its reply arrives
    manual_slot: tokio::sync::Mutex<()>,
}

impl RefreshTask {
    pub fn new(
        config: DeviceConfig,
        registry: PluginRegistry,
        display: DisplayManager,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self::with_clock(config, registry, display, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: DeviceConfig,
        registry: PluginRegistry,
        display: DisplayManager,
        store: Arc<dyn ConfigStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TaskState {
                    config,
                    running: false,
                    phase: TaskPhase::Stopped,
                    manual: None,
                }),
                wake: Notify::new(),
                write_lock: Mutex::new(()),
                registry,
                store,
                clock,
                display: Arc::new(Mutex::new(display)),
            }),
            worker: tokio::sync::Mutex::new(None),
            manual_slot: tokio::sync::Mutex::new(()),
        }
    }

    /// Spawn the refresh loop. No-op when already running; waits for a
    /// `stop` in progress to finish first.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Refresh task already running");
            return;
        }

        {
            let mut state = self.shared.lock();
            state.running = true;
            state.phase = TaskPhase::Idle;
        }
        info!("Starting refresh task");
        *worker = Some(tokio::spawn(run(self.shared.clone())));
    }

    /// Stop the loop and wait for it to exit. An in-flight render is allowed
    /// to finish; a manual request still waiting is answered with `Stopped`.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let pending = {
            let mut state = self.shared.lock();
            state.running = false;
            state.phase = TaskPhase::Stopped;
            state.manual.take()
        };
        if let Some(job) = pending {
            let _ = job.reply.send(Err(RefreshError::Stopped));
        }
        self.shared.wake.notify_one();

        if let Some(handle) = worker.take() {
            info!("Stopping refresh task");
            if let Err(e) = handle.await {
                error!("Refresh task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Wake the loop so config edits take effect now. No-op when stopped.
    pub fn signal_config_change(&self) {
        if !self.is_running() {
            debug!("Config change signalled while stopped, ignoring");
            return;
        }
        self.shared.wake.notify_one();
    }

    /// Render now, ahead of the playlist. Waits for any earlier manual
    /// request to complete first, then for this one's result.
    pub async fn manual_update(&self, request: ManualUpdateRequest) -> Result<RefreshMetrics, RefreshError> {
        let _slot = self.manual_slot.lock().await;

        let (reply, result) = oneshot::channel();
        {
            let mut state = self.shared.lock();
            if !state.running {
                warn!("Manual update rejected: refresh task is not running");
                return Err(RefreshError::NotRunning);
            }
            state.manual = Some(ManualJob { request, reply });
        }
        self.shared.wake.notify_one();

        // A dropped sender means the loop went away without answering
        result.await.unwrap_or(Err(RefreshError::Stopped))
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.shared.lock();
        SchedulerStatus {
            running: state.running,
            phase: state.phase,
            active_playlist: state.config.playlist_config.active_playlist.clone(),
            last_refresh: state.config.refresh_info.clone(),
        }
    }

    /// Snapshot of the live config
    pub fn config(&self) -> DeviceConfig {
        self.shared.lock().config.clone()
    }

    /// Edit the live config, persist it and wake the loop. The edit stays
    /// applied even when the write fails.
    pub async fn update_config<R>(&self, edit: impl FnOnce(&mut DeviceConfig) -> R) -> Result<R, RefreshError> {
        let result = edit(&mut self.shared.lock().config);
        let written = save(&self.shared).await;
        self.signal_config_change();
        match written {
            Ok(written) => Ok(written.map(|()| result)?),
            Err(e) => panic::resume_unwind(e.into_panic()),
        }
    }
}

async fn run(shared: Arc<Shared>) {
    loop {
        let poll = {
            let state = shared.lock();
            if !state.running {
                break;
            }
            state.config.cycle_interval()
        };

        tokio::select! {
            _ = shared.wake.notified() => debug!("Refresh task woken"),
            _ = time::sleep(poll) => debug!("Poll interval elapsed"),
        }

        let (job, reply) = match next_job(&shared) {
            Claim::Render(job, reply) => (job, reply),
            Claim::Skipped => {
                save_logged(&shared, "playlist position").await;
                shared.set_phase(TaskPhase::Idle);
                continue;
            }
            Claim::Nothing => {
                shared.set_phase(TaskPhase::Idle);
                continue;
            }
        };

        info!("Refreshing: {}", job.action.describe());
        let result = render(&shared, job).await;

        match reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = result {
                    error!("Playlist refresh failed: {}", e);
                    // the cursor already moved past the failing instance
                    save_logged(&shared, "playlist position").await;
                }
            }
        }
        shared.set_phase(TaskPhase::Idle);
    }
    info!("Refresh task exited");
}

enum Claim {
    Render(RenderJob, Option<Reply>),
    /// The playlist cursor moved but nothing can be rendered
    Skipped,
    Nothing,
}

/// Pick this cycle's work: a pending manual request first, else the playlist
fn next_job(shared: &Shared) -> Claim {
    let mut state = shared.lock();
    if !state.running {
        return Claim::Nothing;
    }
    state.phase = TaskPhase::Resolving;
    let now = device_time(shared.clock.now(), &state.config.timezone);

    if let Some(ManualJob { request, reply }) = state.manual.take() {
        let prepared = RefreshAction::from_request(request, &state.config)
            .and_then(|action| RenderJob::prepare(action, &state.config, &shared.registry, now));
        return match prepared {
            Ok(job) => Claim::Render(job, Some(reply)),
            Err(e) => {
                warn!("Manual update rejected: {}", e);
                let _ = reply.send(Err(e));
                Claim::Nothing
            }
        };
    }

    let TaskState { config, .. } = &mut *state;
    let Some(scheduled) = config
        .playlist_config
        .determine_next_plugin(config.refresh_info.as_ref(), now)
    else {
        return Claim::Nothing;
    };
    let action = RefreshAction::Playlist {
        playlist: scheduled.playlist,
        instance: scheduled.instance,
        forced: false,
    };
    match RenderJob::prepare(action, config, &shared.registry, now) {
        Ok(job) => Claim::Render(job, None),
        Err(e) => {
            warn!("Skipping playlist refresh: {}", e);
            Claim::Skipped
        }
    }
}

/// Run one job on the blocking pool and record its result
async fn render(shared: &Arc<Shared>, job: RenderJob) -> Result<RefreshMetrics, RefreshError> {
    shared.set_phase(TaskPhase::Rendering);
    let plugin_id = job.action.plugin_id().to_string();
    let now = job.now;
    let action = job.action.clone();

    let display = shared.display.clone();
    let outcome = tokio::task::spawn_blocking(move || job.run(&display))
        .await
        .unwrap_or_else(|e| {
            Err(RefreshError::Generation {
                plugin_id: plugin_id.clone(),
                message: format!("Render panicked: {e}"),
            })
        })?;

    record(shared, &action, outcome, now).await
}

/// Store the refresh record and write the config. A failed write is logged;
/// the render itself already succeeded.
async fn record(
    shared: &Arc<Shared>,
    action: &RefreshAction,
    outcome: RefreshOutcome,
    now: NaiveDateTime,
) -> Result<RefreshMetrics, RefreshError> {
    {
        let mut state = shared.lock();
        if state.running {
            state.phase = TaskPhase::Persisting;
        }
        if let RefreshAction::Playlist { playlist, instance, .. } = action {
            state
                .config
                .playlist_config
                .mark_refreshed(playlist, &instance.plugin_id, &instance.name, now);
        }
        state.config.refresh_info = Some(outcome.info);
    }

    save_logged(shared, "refresh info").await;

    info!(
        "Refresh {} of '{}' done in {}ms (cached: {})",
        outcome.metrics.refresh_id, outcome.metrics.plugin_id, outcome.metrics.request_ms, outcome.metrics.used_cached
    );
    Ok(outcome.metrics)
}

/// Write the config on the blocking pool
async fn save(shared: &Arc<Shared>) -> Result<Result<(), PersistenceError>, JoinError> {
    let writer = shared.clone();
    tokio::task::spawn_blocking(move || writer.persist()).await
}

/// Save from inside the loop, where a failed write is only logged
async fn save_logged(shared: &Arc<Shared>, what: &str) {
    match save(shared).await {
        Ok(Ok(())) => debug!("Persisted {}", what),
        Ok(Err(e)) => error!("Failed to persist {}: {}", what, e),
        Err(e) => error!("Config write task failed: {}", e),
    }
}
