//! Lifecycle Controller (C12): start/stop/restart semantics, PID and
//! config persistence, graceful shutdown (§4.8).
//!
//! Grounded in the teacher's `run_db_writer`/task-spawn pattern in
//! `main.rs`, re-purposed as an explicit supervisor instead of a fire-
//! and-forget `tokio::spawn` at process start -- the source's subprocess
//! lifecycle is replaced by an in-process supervised task (§9).

use crate::config::EngineConfig;
use crate::engine::scheduler::Scheduler;
use crate::engine::Engine;
use crate::errors::{EngineError, EngineResult};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunningHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

pub struct LifecycleController {
    engine: Arc<Engine>,
    data_dir: PathBuf,
    running: Mutex<Option<RunningHandle>>,
}

impl LifecycleController {
    pub fn new(engine: Arc<Engine>, data_dir: PathBuf) -> Self {
        Self { engine, data_dir, running: Mutex::new(None) }
    }

    fn pid_path(&self) -> PathBuf {
        self.data_dir.join("zeus_engine.pid")
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config").join("engine_config.json")
    }

    /// Clears a stale PID file (process no longer alive) and fails `start`
    /// if the recorded process is still alive (§4.8 crash recovery).
    fn check_pid_file(&self) -> EngineResult<()> {
        let path = self.pid_path();
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Ok(());
        };
        let Ok(pid) = contents.trim().parse::<u32>() else {
            std::fs::remove_file(&path).ok();
            return Ok(());
        };

        if process_is_alive(pid) {
            return Err(EngineError::AlreadyRunning);
        }
        std::fs::remove_file(&path).ok();
        Ok(())
    }

    fn write_pid_file(&self) -> EngineResult<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.pid_path(), std::process::id().to_string())?;
        Ok(())
    }

    fn write_engine_config(&self, cfg: &EngineConfig) -> EngineResult<()> {
        let path = self.config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(cfg).map_err(EngineError::from)?;
        std::fs::write(path, body)?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        // A blocking try_lock is fine here: this is a cheap, uncontended
        // presence check, never held across an await point.
        self.running.try_lock().map(|g| g.is_some()).unwrap_or(true)
    }

    pub fn get_engine_config(&self) -> Arc<EngineConfig> {
        self.engine.engine_config.load_full()
    }

    /// `start(config)`: validates, persists PID + config, launches the
    /// scheduler. Fails with `ALREADY_RUNNING` if an instance is live.
    pub async fn start(&self, cfg: EngineConfig) -> EngineResult<()> {
        cfg.validate()?;

        let mut guard = self.running.lock().await;
        if guard.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        self.check_pid_file()?;

        self.write_pid_file()?;
        self.write_engine_config(&cfg)?;
        self.engine.engine_config.store(Arc::new(cfg));

        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(self.engine.clone(), cancel.clone());
        let join = tokio::spawn(scheduler.run());

        *guard = Some(RunningHandle { cancel, join });
        tracing::info!("engine started");
        Ok(())
    }

    /// `stop()`: cooperative cancel, wait `shutdown_grace`, clear PID.
    /// Fails with `NOT_RUNNING` if nothing is live.
    pub async fn stop(&self) -> EngineResult<()> {
        let mut guard = self.running.lock().await;
        let Some(handle) = guard.take() else {
            return Err(EngineError::NotRunning);
        };

        handle.cancel.cancel();
        let grace = std::time::Duration::from_secs(self.engine.engine_config.load().shutdown_grace_secs);
        if tokio::time::timeout(grace, handle.join).await.is_err() {
            tracing::warn!("scheduler did not stop within shutdown_grace, abandoning join");
        }

        std::fs::remove_file(self.pid_path()).ok();
        tracing::info!("engine stopped");
        Ok(())
    }

    /// `restart(config)`: `stop` then `start` with the new config.
    pub async fn restart(&self, cfg: EngineConfig) -> EngineResult<()> {
        self.stop().await?;
        self.start(cfg).await
    }

    /// Applies a config update for non-restart fields (§4.6). Returns
    /// `Ok(true)` if the update was applied, `Ok(false)` if it instead
    /// requires a `restart` call (the live value is left unchanged).
    pub async fn apply_live_config(&self, cfg: EngineConfig) -> EngineResult<bool> {
        cfg.validate()?;
        let current = self.engine.engine_config.load_full();
        if current.requires_restart(&cfg) {
            return Ok(false);
        }
        self.write_engine_config(&cfg)?;
        self.engine.engine_config.store(Arc::new(cfg));
        Ok(true)
    }
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // Signal 0 performs no-op permission/existence checking (man kill(2)).
    unsafe { libc_kill0(pid as i32) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
unsafe fn libc_kill0(pid: i32) -> i32 {
    extern "C" {
        fn kill(pid: i32, sig: i32) -> i32;
    }
    kill(pid, 0)
}
