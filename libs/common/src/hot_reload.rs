//! Hot-reloading settings
//!
//! Polls the settings file and swaps in a new `SettingsSnapshot` whenever the
//! file changes and still loads cleanly. Listeners are called with each new
//! snapshot from the polling task.

use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::settings::{load_bot_settings, Result, SettingsSnapshot};

/// Default interval between file checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

type Listener = Arc<dyn Fn(&SettingsSnapshot) + Send + Sync>;

/// File fingerprint used for change detection
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileState {
    modified: Option<SystemTime>,
    contents: Vec<u8>,
}

impl FileState {
    fn read(path: &Path) -> Option<Self> {
        let contents = std::fs::read(path).ok()?;
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        Some(Self { modified, contents })
    }
}

struct Shared {
    path: PathBuf,
    current: RwLock<Arc<SettingsSnapshot>>,
    listeners: RwLock<Vec<Listener>>,
    last_state: Mutex<Option<FileState>>,
}

/// Cloneable read-only view of a `HotReloadingSettings`
#[derive(Clone)]
pub struct SettingsHandle {
    shared: Arc<Shared>,
}

impl SettingsHandle {
    /// Current settings
    pub fn snapshot(&self) -> Arc<SettingsSnapshot> {
        Arc::clone(&self.shared.current.read())
    }
}

impl std::fmt::Debug for SettingsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsHandle")
            .field("path", &self.shared.path)
            .finish()
    }
}

/// Settings snapshot that follows changes to the file on disk
pub struct HotReloadingSettings {
    shared: Arc<Shared>,
    poll_interval: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl HotReloadingSettings {
    /// Load the settings file eagerly; fails if the initial load fails
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Result<Self> {
        let path = path.into();
        let last_state = FileState::read(&path);
        let snapshot = load_bot_settings(&path)?;

        Ok(Self {
            shared: Arc::new(Shared {
                path,
                current: RwLock::new(Arc::new(snapshot)),
                listeners: RwLock::new(Vec::new()),
                last_state: Mutex::new(last_state),
            }),
            poll_interval,
            cancel: CancellationToken::new(),
            task: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Current settings
    pub fn snapshot(&self) -> Arc<SettingsSnapshot> {
        Arc::clone(&self.shared.current.read())
    }

    /// Read-only handle sharing this reloader's snapshots
    pub fn handle(&self) -> SettingsHandle {
        SettingsHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Register a callback invoked after every successful reload
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&SettingsSnapshot) + Send + Sync + 'static,
    {
        self.shared.listeners.write().push(Arc::new(listener));
    }

    /// Check the file once and reload it if it changed
    ///
    /// Returns `true` when a new snapshot was installed.
    pub fn poll_once(&self) -> bool {
        poll_file(&self.shared)
    }

    /// Spawn the polling task on the current tokio runtime
    pub fn start(&mut self) {
        if self.task.is_some() {
            warn!("Settings watcher already running");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        let poll_interval = self.poll_interval;

        info!(
            "Watching {} for changes every {:?}",
            shared.path.display(),
            poll_interval
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        poll_file(&shared);
                    }
                    _ = cancel.cancelled() => {
                        debug!("Settings watcher cancelled");
                        break;
                    }
                }
            }
        }));
    }

    /// Stop the polling task and wait for it to finish
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Settings watcher ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for HotReloadingSettings {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn poll_file(shared: &Shared) -> bool {
    let Some(state) = FileState::read(&shared.path) else {
        debug!("Settings file {} unreadable, keeping current settings", shared.path.display());
        return false;
    };

    {
        let mut last = shared.last_state.lock();
        if last.as_ref() == Some(&state) {
            return false;
        }
        *last = Some(state);
    }

    match load_bot_settings(&shared.path) {
        Ok(snapshot) => {
            let snapshot = Arc::new(snapshot);
            *shared.current.write() = Arc::clone(&snapshot);
            info!("Reloaded settings from {}", shared.path.display());

            // Called outside the lock so a listener may register others
            let listeners: Vec<Listener> = shared.listeners.read().clone();
            for listener in &listeners {
                listener(&snapshot);
            }
            true
        },
        Err(e) => {
            warn!("Settings reload failed, keeping previous settings: {}", e);
            false
        },
    }
}
