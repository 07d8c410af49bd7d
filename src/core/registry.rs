//! Process-wide naming of component instances.
//!
//! Every batching processor (and instrumented exporter) asks the registry for
//! a name of the form `{component_type}/{id}`. Ids are handed out
//! monotonically per component type and never recycled, so historical
//! metrics are never attributed to the wrong instance. A fork is detected by
//! comparing the current process id against the one recorded on the previous
//! registration; the child then starts counting from zero again.

use crate::core::ProcessorInstance;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

static GLOBAL_REGISTRY: Lazy<Arc<InstanceRegistry>> =
    Lazy::new(|| Arc::new(InstanceRegistry::new()));

type PidSource = Box<dyn Fn() -> u32 + Send + Sync>;

#[derive(Debug, Default)]
struct RegistryState {
    next_ids: HashMap<String, u64>,
    live: HashSet<String>,
    owner_pid: Option<u32>,
}

/// Issues unique, human-readable instance names.
pub struct InstanceRegistry {
    state: Mutex<RegistryState>,
    pid: PidSource,
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceRegistry {
    /// Create a registry bound to the real process id.
    pub fn new() -> Self {
        Self::with_pid_source(std::process::id)
    }

    /// Create a registry with a custom process-id source.
    ///
    /// Useful to simulate a fork without actually forking.
    pub fn with_pid_source<F>(pid: F) -> Self
    where
        F: Fn() -> u32 + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(RegistryState::default()),
            pid: Box::new(pid),
        }
    }

    /// The process-wide registry shared by default-constructed processors.
    pub fn global() -> Arc<InstanceRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Register an instance and return its name.
    pub fn register(&self, component_type: &str) -> String {
        self.register_instance(component_type).name().to_string()
    }

    /// Register an instance and return its full identity.
    pub fn register_instance(&self, component_type: &str) -> ProcessorInstance {
        let current_pid = (self.pid)();
        let mut state = self.state.lock();

        if state.owner_pid != Some(current_pid) {
            if state.owner_pid.is_some() {
                tracing::debug!(
                    previous_pid = ?state.owner_pid,
                    current_pid,
                    "Process id changed, resetting instance counters"
                );
            }
            state.next_ids.clear();
            state.live.clear();
            state.owner_pid = Some(current_pid);
        }

        let next_id = state.next_ids.entry(component_type.to_string()).or_insert(0);
        let instance = ProcessorInstance::new(component_type, *next_id);
        *next_id += 1;
        state.live.insert(instance.name().to_string());

        instance
    }

    /// Forget a live name. The numeric id is not reused.
    pub fn unregister(&self, name: &str) {
        self.state.lock().live.remove(name);
    }

    /// Names registered and not yet unregistered, sorted.
    pub fn live_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().live.iter().cloned().collect();
        names.sort();
        names
    }
}
