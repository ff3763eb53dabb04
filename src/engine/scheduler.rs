//! Tick-driven scheduler: cooperative single-thread orchestration of a
//! bounded worker pool (§4.6, §5).
//!
//! One loop owns the tick clock; each Task is dispatched to a semaphore-
//! bounded worker. A tick never enqueues a Task that is still running from
//! a previous tick -- it is skipped with `skip_overlap` and logged, which
//! is how property 9/10 (cycle non-overlap, late-tick skip) are kept.

use crate::engine::Engine;
use crate::state::TaskId;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

pub struct Scheduler {
    engine: Arc<Engine>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, cancel: CancellationToken) -> Self {
        Self { engine, cancel }
    }

    pub async fn run(self) {
        let in_flight: Arc<Mutex<HashSet<TaskId>>> = Arc::new(Mutex::new(HashSet::new()));
        let cfg = self.engine.engine_config.load_full();
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(cfg.interval_seconds));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("scheduler received cancellation, stopping tick loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_one_cycle(&in_flight).await;
                }
            }
        }

        // Drain in-flight workers up to shutdown_grace (§4.6, §4.8).
        let cfg = self.engine.engine_config.load_full();
        let grace = std::time::Duration::from_secs(cfg.shutdown_grace_secs);
        let deadline = tokio::time::Instant::now() + grace;
        while tokio::time::Instant::now() < deadline {
            if in_flight.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        tracing::info!("scheduler shut down");
    }

    async fn run_one_cycle(&self, in_flight: &Arc<Mutex<HashSet<TaskId>>>) {
        let cfg = self.engine.engine_config.load_full();
        let tasks = self.engine.enumerate_tasks(&cfg);
        let semaphore = Arc::new(Semaphore::new(cfg.max_concurrent_tasks.max(1)));

        for task in tasks {
            {
                let mut guard = in_flight.lock().await;
                if guard.contains(&task) {
                    tracing::warn!(task = %task, "skip_overlap: previous cycle for this task still running");
                    self.engine.bus.publish(crate::bus::EngineEvent::cycle_failed(&task, "skip_overlap"));
                    continue;
                }
                guard.insert(task.clone());
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => continue,
            };
            let engine = self.engine.clone();
            let in_flight = in_flight.clone();
            let cancel = self.cancel.clone();
            let task_for_spawn = task.clone();

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = engine.run_task_cycle(task_for_spawn.clone(), cancel).await {
                    tracing::warn!(task = %task_for_spawn, error = %e, "task cycle failed");
                }
                in_flight.lock().await.remove(&task_for_spawn);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_hash_and_eq_round_trip() {
        // Overlap skip relies on TaskId being a well-behaved HashSet key.
        let mut set = HashSet::new();
        let t = TaskId { station_code: "EGLC".into(), event_day: chrono::NaiveDate::from_ymd_opt(2025, 11, 19).unwrap() };
        set.insert(t.clone());
        assert!(set.contains(&t));
    }
}
