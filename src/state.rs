//! Application state: study configuration, the optional generation client,
//! the replenishment controller, and the in-memory workspace store.
//!
//! Workspaces created over HTTP live in the store until deleted or until they
//! sit idle past `workspace_idle_ttl_secs`; a WebSocket connection owns a
//! private workspace that dies with the connection.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, info, instrument};

use crate::config::{load_config_from_env, StudyConfig};
use crate::error::GenerationError;
use crate::gemini::{Gemini, GenerationClient};
use crate::replenish::ReplenishmentController;
use crate::workspace::Workspace;

pub type SharedWorkspace = Arc<Mutex<Workspace>>;

struct StoredWorkspace {
    workspace: SharedWorkspace,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub config: StudyConfig,
    pub generator: Option<Arc<dyn GenerationClient>>,
    pub replenisher: ReplenishmentController,
    workspaces: Arc<RwLock<HashMap<String, StoredWorkspace>>>,
}

impl AppState {
    /// Build state from env: load config, init the Gemini client if a key is set.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_config_from_env();

        let generator: Option<Arc<dyn GenerationClient>> = match Gemini::from_env(&config.generation) {
            Some(g) => {
                info!(target: "letmecook_backend", base_url = %g.base_url, model = %g.primary_model, fallback_model = %g.fallback_model, "Gemini enabled.");
                Some(Arc::new(g))
            }
            None => {
                info!(target: "letmecook_backend", "Gemini disabled (no valid GEMINI_API_KEY). Generation actions will fail.");
                None
            }
        };

        Self::with_generator(config, generator)
    }

    pub fn with_generator(config: StudyConfig, generator: Option<Arc<dyn GenerationClient>>) -> Self {
        let replenisher = ReplenishmentController::from_config(&config);
        info!(target: "session", threshold = replenisher.threshold(), batch = config.session.replenish_batch, "Replenishment configured");
        Self { config, generator, replenisher, workspaces: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn generator(&self) -> Result<&dyn GenerationClient, GenerationError> {
        self.generator.as_deref().ok_or(GenerationError::NotConfigured)
    }

    /// Create a workspace and register it in the store.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_workspace(&self) -> (String, SharedWorkspace) {
        let ws = Workspace::new();
        let id = ws.id().to_string();
        let shared = Arc::new(Mutex::new(ws));
        let stored = StoredWorkspace { workspace: shared.clone(), last_seen: Instant::now() };
        self.workspaces.write().await.insert(id.clone(), stored);
        info!(target: "session", workspace_id = %id, "Workspace created");
        (id, shared)
    }

    /// Look up a workspace and mark it as recently used.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_workspace(&self, id: &str) -> Option<SharedWorkspace> {
        let mut map = self.workspaces.write().await;
        let stored = map.get_mut(id)?;
        stored.last_seen = Instant::now();
        Some(stored.workspace.clone())
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn remove_workspace(&self, id: &str) -> bool {
        let removed = self.workspaces.write().await.remove(id).is_some();
        if removed {
            info!(target: "session", workspace_id = %id, "Workspace removed");
        }
        removed
    }

    /// Drop workspaces unused for at least `ttl`. A workspace still held by an
    /// in-progress request is kept.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut map = self.workspaces.write().await;
        let before = map.len();
        map.retain(|_, s| s.last_seen.elapsed() < ttl || Arc::strong_count(&s.workspace) > 1);
        let removed = before - map.len();
        if removed > 0 {
            info!(target: "session", removed, live = map.len(), "Idle workspaces removed");
        } else {
            debug!(target: "session", live = map.len(), "Idle sweep found nothing to remove");
        }
        removed
    }
}

/// Start the background sweep of idle HTTP workspaces. Returns `None` when the
/// TTL is 0 (sweeping disabled).
pub fn spawn_idle_sweep(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let ttl_secs = state.config.session.workspace_idle_ttl_secs;
    if ttl_secs == 0 {
        info!(target: "session", "Idle workspace sweep disabled");
        return None;
    }
    let ttl = Duration::from_secs(ttl_secs);
    let period = (ttl / 4).max(Duration::from_secs(1));
    info!(target: "session", ttl_secs, period_secs = period.as_secs(), "Idle workspace sweep started");
    Some(tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            state.sweep_idle(ttl).await;
        }
    }))
}
