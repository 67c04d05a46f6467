//! Concurrent module initialization
//!
//! [`ConcurrentInitializer::initialize_all`] spawns one task per registered,
//! not yet enabled module on the host's runtime. Each task checks its hard
//! dependencies against the registry, waits for the completion signal of
//! every present dependency, runs the module's enable callback and then
//! satisfies its own signal. Ordering is carried entirely by the signals, so
//! it holds however the runtime schedules the tasks.
//!
//! A task that fails drops its signal writer unsatisfied; its dependents
//! observe the abandoned signal and fail with
//! [`ModuleError::DependencyFailed`] rather than waiting forever.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::module::registry::dependencies::ModuleDependencies;
use crate::module::registry::descriptor::Descriptor;
use crate::module::registry::instance::ModuleInstance;
use crate::module::registry::table::ModuleRegistry;
use crate::module::signal::CompletionWriter;
use crate::module::traits::{ModuleError, ModuleState};

/// Default delay after which the coordinator reports unfinished modules
pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(30);

struct BatchState {
    scheduled: Vec<String>,
    outcomes: Mutex<BTreeMap<String, Result<(), ModuleError>>>,
    finished: watch::Sender<bool>,
}

impl BatchState {
    fn record(&self, name: &str, outcome: Result<(), ModuleError>) {
        self.lock_outcomes().entry(name.to_string()).or_insert(outcome);
    }

    fn pending(&self) -> Vec<String> {
        let outcomes = self.lock_outcomes();
        self.scheduled
            .iter()
            .filter(|name| !outcomes.contains_key(*name))
            .cloned()
            .collect()
    }

    fn lock_outcomes(&self) -> MutexGuard<'_, BTreeMap<String, Result<(), ModuleError>>> {
        self.outcomes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Non-blocking handle to one initialization batch
#[derive(Clone)]
pub struct InitializationHandle {
    state: Arc<BatchState>,
    finished: watch::Receiver<bool>,
}

impl InitializationHandle {
    /// Names of the modules scheduled in this batch
    pub fn scheduled(&self) -> &[String] {
        &self.state.scheduled
    }

    /// Whether every task of the batch has finished
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait for the batch to finish
    pub async fn wait(&self) {
        let mut finished = self.finished.clone();
        // The sender lives in the shared batch state, so this cannot observe a closed channel
        let _ = finished.wait_for(|done| *done).await;
    }

    /// Wait up to `timeout` for the batch; returns whether it finished
    ///
    /// Timing out does not cancel anything.
    pub async fn join(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    /// Modules whose task failed so far, by name
    pub fn failures(&self) -> Vec<(String, ModuleError)> {
        self.state
            .lock_outcomes()
            .iter()
            .filter_map(|(name, outcome)| {
                outcome.as_ref().err().map(|e| (name.clone(), e.clone()))
            })
            .collect()
    }

    /// Modules enabled by this batch so far, by name
    pub fn enabled(&self) -> Vec<String> {
        self.state
            .lock_outcomes()
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Modules whose task has not finished yet
    pub fn pending(&self) -> Vec<String> {
        self.state.pending()
    }
}

impl std::fmt::Debug for InitializationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationHandle")
            .field("scheduled", &self.state.scheduled)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Schedules initialization tasks for registered modules
#[derive(Debug)]
pub struct ConcurrentInitializer {
    registry: Arc<ModuleRegistry>,
    report_timeout: Duration,
}

impl ConcurrentInitializer {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            report_timeout: DEFAULT_REPORT_TIMEOUT,
        }
    }

    /// Set how long the coordinator waits before logging unfinished modules
    pub fn with_report_timeout(mut self, report_timeout: Duration) -> Self {
        self.report_timeout = report_timeout;
        self
    }

    /// Schedule every registered module that is not enabled yet
    ///
    /// Returns as soon as the tasks are spawned.
    pub async fn initialize_all(&self) -> InitializationHandle {
        let mut batch = Vec::new();
        for instance in self.registry.pending_instances().await {
            let Some(descriptor) = instance.descriptor().cloned() else {
                continue;
            };
            let signals = self.registry.signals();
            signals.rearm_if_abandoned(descriptor.name());
            match signals.take_writer(descriptor.name()) {
                Some(writer) => batch.push((instance, descriptor, writer)),
                None => debug!(
                    "Module {} is already being initialized, not scheduling it again",
                    descriptor.name()
                ),
            }
        }

        let resolution = ModuleDependencies::resolve(batch.iter().map(|(_, d, _)| &**d));
        let scheduled: Vec<String> = batch
            .iter()
            .map(|(_, d, _)| d.name().to_string())
            .collect();

        let (finished_tx, finished_rx) = watch::channel(false);
        let state = Arc::new(BatchState {
            scheduled,
            outcomes: Mutex::new(BTreeMap::new()),
            finished: finished_tx,
        });

        info!("Initializing {} modules", state.scheduled.len());

        let runtime = self.registry.host().runtime();
        let mut tasks = Vec::with_capacity(batch.len());
        for (instance, descriptor, writer) in batch {
            let name = descriptor.name().to_string();
            let cyclic = resolution.is_cyclic(&name);
            let registry = Arc::clone(&self.registry);
            let task_instance = Arc::clone(&instance);
            let task_state = Arc::clone(&state);

            let handle = runtime.spawn(async move {
                let outcome = if cyclic {
                    Err(ModuleError::DependencyCycle {
                        module: descriptor.name().to_string(),
                    })
                } else {
                    run_module(&registry, &task_instance, &descriptor, writer).await
                };
                if let Err(e) = &outcome {
                    warn!("Module {} failed to initialize: {}", descriptor.name(), e);
                    mark_failed(&task_instance, e.to_string());
                }
                task_state.record(descriptor.name(), outcome);
            });
            tasks.push((name, instance, handle));
        }

        let coordinator_state = Arc::clone(&state);
        let report_timeout = self.report_timeout;
        runtime.spawn(async move {
            coordinate(coordinator_state, tasks, report_timeout).await;
        });

        InitializationHandle {
            state,
            finished: finished_rx,
        }
    }
}

/// Body of one module's initialization task
async fn run_module(
    registry: &ModuleRegistry,
    instance: &ModuleInstance,
    descriptor: &Descriptor,
    writer: CompletionWriter,
) -> Result<(), ModuleError> {
    let name = descriptor.name();
    info!("Loading module {}", name);

    let waiters = registry.collect_waiters(descriptor).await?;
    debug!(
        "{} waiting for dependencies: {:?}",
        name,
        waiters.iter().map(|w| w.name()).collect::<Vec<_>>()
    );

    for waiter in waiters {
        let dependency = waiter.name().to_string();
        debug!("Module {} awaiting dependency {}", name, dependency);
        waiter
            .wait()
            .await
            .map_err(|_| ModuleError::DependencyFailed {
                module: name.to_string(),
                dependency,
            })?;
    }

    // The guard spans the retirement check through satisfaction; unregister
    // takes the same guard before disabling.
    let mut module = instance.module().await;
    if instance.is_retired() {
        return Err(ModuleError::NotRegistered(name.to_string()));
    }

    info!("Starting module {}", name);
    module
        .enable()
        .await
        .map_err(|e| ModuleError::EnableFailed {
            module: name.to_string(),
            reason: e.to_string(),
        })?;

    if !instance.set_state(ModuleState::Enabled) {
        return Err(ModuleError::NotRegistered(name.to_string()));
    }
    writer.satisfy();
    drop(module);

    info!("Started module {}", name);
    Ok(())
}

/// Record a failed initialization; a disabled instance keeps its state
fn mark_failed(instance: &ModuleInstance, reason: String) {
    if !instance.set_state(ModuleState::Failed(reason)) {
        debug!("Module {} was unregistered during initialization", instance.label());
    }
}

/// Observe a batch until every task has finished
///
/// Logs once if the batch outlives `report_timeout`; never cancels tasks.
async fn coordinate(
    state: Arc<BatchState>,
    tasks: Vec<(String, Arc<ModuleInstance>, JoinHandle<()>)>,
    report_timeout: Duration,
) {
    let progress_state = Arc::clone(&state);
    let progress = async move {
        for (name, instance, handle) in tasks {
            if let Err(e) = handle.await {
                error!("Initialization task for module {} aborted: {}", name, e);
                let outcome = Err(ModuleError::EnableFailed {
                    module: name.clone(),
                    reason: e.to_string(),
                });
                mark_failed(&instance, e.to_string());
                progress_state.record(&name, outcome);
            }
        }
    };
    tokio::pin!(progress);

    tokio::select! {
        _ = &mut progress => {}
        _ = tokio::time::sleep(report_timeout) => {
            warn!(
                "Module initialization still running after {:?}: {:?}",
                report_timeout,
                state.pending()
            );
            progress.await;
        }
    }

    let failed = state
        .lock_outcomes()
        .values()
        .filter(|outcome| outcome.is_err())
        .count();
    info!(
        "Finished loading modules ({} scheduled, {} failed)",
        state.scheduled.len(),
        failed
    );
    state.finished.send_replace(true);
}
