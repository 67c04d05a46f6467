//! Shared fixtures for module-host integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use module_host::module::registry::{write_info_file, DeclaredModule};
use module_host::{
    Descriptor, Module, ModuleError, ModuleFactory, ModuleHost, ModuleInfo, ModuleInstance,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle callback observed by a [`RecordingModule`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EnableStarted(String),
    Enabled(String),
    Disabled(String),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &Event) -> usize {
        self.events()
            .iter()
            .position(|e| e == event)
            .unwrap_or_else(|| panic!("{:?} not recorded", event))
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.events().contains(event)
    }
}

pub fn enabled(name: &str) -> Event {
    Event::Enabled(name.to_string())
}

pub fn started(name: &str) -> Event {
    Event::EnableStarted(name.to_string())
}

pub fn disabled(name: &str) -> Event {
    Event::Disabled(name.to_string())
}

/// Module that records its callbacks into an [`EventLog`]
pub struct RecordingModule {
    descriptor: Descriptor,
    log: EventLog,
    delay: Duration,
    fail_enable: bool,
    fail_disable: bool,
}

impl RecordingModule {
    pub fn new(descriptor: Descriptor, log: &EventLog) -> Self {
        Self {
            descriptor,
            log: log.clone(),
            delay: Duration::ZERO,
            fail_enable: false,
            fail_disable: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_enable(mut self) -> Self {
        self.fail_enable = true;
        self
    }

    pub fn failing_disable(mut self) -> Self {
        self.fail_disable = true;
        self
    }

    pub fn into_instance(self) -> Arc<ModuleInstance> {
        ModuleInstance::new(Box::new(self))
    }
}

#[async_trait]
impl Module for RecordingModule {
    fn descriptor(&self) -> Option<&Descriptor> {
        Some(&self.descriptor)
    }

    async fn enable(&mut self) -> Result<(), ModuleError> {
        let name = self.descriptor.name().to_string();
        self.log.push(Event::EnableStarted(name.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_enable {
            return Err(ModuleError::OperationError(format!("{} refused to start", name)));
        }
        self.log.push(Event::Enabled(name));
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), ModuleError> {
        let name = self.descriptor.name().to_string();
        self.log.push(Event::Disabled(name.clone()));
        if self.fail_disable {
            return Err(ModuleError::OperationError(format!("{} refused to stop", name)));
        }
        Ok(())
    }
}

/// Recording instance outside any load unit
pub fn instance(info: ModuleInfo, log: &EventLog) -> Arc<ModuleInstance> {
    RecordingModule::new(info.resolve(None), log).into_instance()
}

pub fn slow_instance(info: ModuleInfo, log: &EventLog, delay: Duration) -> Arc<ModuleInstance> {
    RecordingModule::new(info.resolve(None), log)
        .with_delay(delay)
        .into_instance()
}

pub fn failing_instance(info: ModuleInfo, log: &EventLog) -> Arc<ModuleInstance> {
    RecordingModule::new(info.resolve(None), log)
        .failing_enable()
        .into_instance()
}

/// Host that counts its hook invocations
#[derive(Debug, Default)]
pub struct TestHost {
    debug: bool,
    prepared: AtomicUsize,
    registered: Mutex<Vec<String>>,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn debug() -> Arc<Self> {
        Arc::new(Self {
            debug: true,
            ..Default::default()
        })
    }

    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }

    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }
}

impl ModuleHost for TestHost {
    fn is_debug(&self) -> bool {
        self.debug
    }

    fn prepare_module(&self, _module: &mut dyn Module) {
        self.prepared.fetch_add(1, Ordering::SeqCst);
    }

    fn module_registered(&self, instance: &ModuleInstance) {
        if let Some(name) = instance.name() {
            self.registered.lock().unwrap().push(name.to_string());
        }
    }
}

pub const IMPLEMENTATION_VERSION: &str = "2.1.0";

/// Factory with `recording`, `versioned` and `failing` module types
pub fn recording_factory(log: &EventLog) -> ModuleFactory {
    let plain = log.clone();
    let versioned = log.clone();
    let failing = log.clone();
    ModuleFactory::new()
        .with("recording", move |descriptor| {
            Box::new(RecordingModule::new(descriptor, &plain)) as Box<dyn Module>
        })
        .with_versioned("versioned", IMPLEMENTATION_VERSION, move |descriptor| {
            Box::new(RecordingModule::new(descriptor, &versioned)) as Box<dyn Module>
        })
        .with("failing", move |descriptor| {
            Box::new(RecordingModule::new(descriptor, &failing).failing_enable()) as Box<dyn Module>
        })
}

pub fn declared(type_name: &str, info: ModuleInfo) -> DeclaredModule {
    DeclaredModule::new(type_name, info)
}

/// Write a package directory named `dir_name` under `root`
pub fn write_package(root: &Path, dir_name: &str, entries: &[DeclaredModule]) -> PathBuf {
    let package = root.join(dir_name);
    write_info_file(&package, entries).unwrap();
    package
}
