use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tracing::{info, warn};

use crate::{Result, store::Store};

use super::WorkflowDefinition;

type Snapshot = Arc<HashMap<String, Arc<WorkflowDefinition>>>;

/// Read-mostly map of workflow definitions. Writers publish a whole new snapshot, so readers never see a
/// half-written definition.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    snapshot: RwLock<Snapshot>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<Arc<WorkflowDefinition>> {
        self.snapshot.read().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Replaces one definition.
    pub fn register(
        &self,
        name: &str,
        definition: WorkflowDefinition,
    ) {
        let mut snapshot = self.snapshot.write().unwrap();
        let mut next = HashMap::clone(&snapshot);
        next.insert(name.to_string(), Arc::new(definition));
        *snapshot = Arc::new(next);
    }

    /// Rebuilds the whole registry from stored definitions. Invalid definitions are skipped.
    pub fn refresh_from_store(
        &self,
        store: &Store,
    ) -> Result<usize> {
        let mut next = HashMap::new();
        for record in store.workflows().query(&Default::default())?.rows {
            match WorkflowDefinition::from_value(&record.definition) {
                Ok(definition) => {
                    next.insert(record.name.clone(), Arc::new(definition));
                }
                Err(e) => warn!(workflow = %record.name, error = %e, "skipping invalid workflow definition"),
            }
        }

        let loaded = next.len();
        *self.snapshot.write().unwrap() = Arc::new(next);
        info!(loaded, "workflow registry refreshed");
        Ok(loaded)
    }
}
