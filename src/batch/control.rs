use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, RwLock},
};

use tokio::task::AbortHandle;
use tracing::debug;

use crate::ShareLock;

#[derive(Debug, Default)]
struct RunState {
    canceled: bool,
    units: HashMap<u32, AbortHandle>,
    started: HashSet<u32>,
}

/// Control handle of one active batch run.
///
/// Claiming a unit and stopping the run are serialized by one lock: a unit either claims before the stop and
/// runs to completion, or it observes the stop and never calls out.
#[derive(Debug, Default)]
pub struct RunHandle {
    state: Mutex<RunState>,
}

impl RunHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks the spawned unit for `seq`. A unit registered after a stop is aborted unless it already started.
    pub fn register_unit(
        &self,
        seq: u32,
        handle: AbortHandle,
    ) {
        let mut state = self.state.lock().unwrap();
        if state.canceled && !state.started.contains(&seq) {
            handle.abort();
        }
        state.units.insert(seq, handle);
    }

    /// Marks `seq` started. Returns false when the run was stopped first.
    pub fn claim(
        &self,
        seq: u32,
    ) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.canceled {
            return false;
        }
        state.started.insert(seq);
        true
    }

    /// Sets the canceled flag and aborts every unit that has not claimed yet.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.canceled = true;
        let RunState {
            units,
            started,
            ..
        } = &*state;
        let mut aborted = 0;
        for (seq, handle) in units {
            if !started.contains(seq) {
                handle.abort();
                aborted += 1;
            }
        }
        debug!(aborted, "run stopped");
    }

    pub fn is_canceled(&self) -> bool {
        self.state.lock().unwrap().canceled
    }
}

/// Process-wide map of active runs keyed by task id. Presence of a handle is the "running" signal.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: ShareLock<HashMap<String, Arc<RunHandle>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates the handle for `task_id`, or returns `None` if a run is already active.
    pub fn register(
        &self,
        task_id: &str,
    ) -> Option<Arc<RunHandle>> {
        let mut runs = self.runs.write().unwrap();
        if runs.contains_key(task_id) {
            return None;
        }
        let handle = Arc::new(RunHandle::new());
        runs.insert(task_id.to_string(), handle.clone());
        Some(handle)
    }

    pub fn lookup(
        &self,
        task_id: &str,
    ) -> Option<Arc<RunHandle>> {
        self.runs.read().unwrap().get(task_id).cloned()
    }

    /// Stops the run for `task_id`. Returns false when none is active.
    pub fn cancel(
        &self,
        task_id: &str,
    ) -> bool {
        match self.lookup(task_id) {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    pub fn unregister(
        &self,
        task_id: &str,
    ) -> bool {
        self.runs.write().unwrap().remove(task_id).is_some()
    }

    pub fn is_running(
        &self,
        task_id: &str,
    ) -> bool {
        self.runs.read().unwrap().contains_key(task_id)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{RunHandle, RunRegistry};

    #[test]
    fn test_registry_rejects_duplicate_run() {
        let registry = RunRegistry::new();
        assert!(registry.register("t1").is_some());
        assert!(registry.register("t1").is_none());
        assert!(registry.is_running("t1"));
        assert!(registry.unregister("t1"));
        assert!(!registry.cancel("t1"));
        assert!(registry.register("t1").is_some());
    }

    #[test]
    fn test_claim_after_stop_fails() {
        let handle = RunHandle::new();
        assert!(handle.claim(1));
        handle.stop();
        assert!(handle.is_canceled());
        assert!(!handle.claim(2));
    }

    #[tokio::test]
    async fn test_stop_aborts_only_unclaimed_units() {
        let handle = RunHandle::new();
        let claimed = tokio::spawn(async { tokio::time::sleep(Duration::from_millis(50)).await });
        let waiting = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(30)).await });
        handle.register_unit(1, claimed.abort_handle());
        handle.register_unit(2, waiting.abort_handle());
        assert!(handle.claim(1));

        handle.stop();
        assert!(claimed.await.is_ok());
        assert!(waiting.await.unwrap_err().is_cancelled());

        let late = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(30)).await });
        handle.register_unit(3, late.abort_handle());
        assert!(late.await.unwrap_err().is_cancelled());
    }
}
