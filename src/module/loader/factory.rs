//! Module constructors
//!
//! The host registers one constructor per module type a package may declare.
//! Loading a package only ever constructs types found here.

use std::collections::HashMap;
use std::sync::Arc;

use crate::module::registry::descriptor::Descriptor;
use crate::module::traits::Module;

type ConstructFn = dyn Fn(Descriptor) -> Box<dyn Module> + Send + Sync;

/// Constructor for one module type
#[derive(Clone)]
pub struct ModuleConstructor {
    implementation_version: Option<String>,
    construct: Arc<ConstructFn>,
}

impl ModuleConstructor {
    /// Version used when a declared module has no explicit version
    pub fn implementation_version(&self) -> Option<&str> {
        self.implementation_version.as_deref()
    }

    pub fn construct(&self, descriptor: Descriptor) -> Box<dyn Module> {
        (self.construct)(descriptor)
    }
}

impl std::fmt::Debug for ModuleConstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleConstructor")
            .field("implementation_version", &self.implementation_version)
            .finish_non_exhaustive()
    }
}

/// Registry of module constructors keyed by type name
#[derive(Debug, Clone, Default)]
pub struct ModuleFactory {
    constructors: HashMap<String, ModuleConstructor>,
}

impl ModuleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor without an implementation version
    pub fn with<F>(self, type_name: impl Into<String>, construct: F) -> Self
    where
        F: Fn(Descriptor) -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.with_constructor(type_name, None, construct)
    }

    /// Register a constructor that reports an implementation version
    pub fn with_versioned<F>(
        self,
        type_name: impl Into<String>,
        implementation_version: impl Into<String>,
        construct: F,
    ) -> Self
    where
        F: Fn(Descriptor) -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.with_constructor(type_name, Some(implementation_version.into()), construct)
    }

    fn with_constructor<F>(
        mut self,
        type_name: impl Into<String>,
        implementation_version: Option<String>,
        construct: F,
    ) -> Self
    where
        F: Fn(Descriptor) -> Box<dyn Module> + Send + Sync + 'static,
    {
        self.constructors.insert(
            type_name.into(),
            ModuleConstructor {
                implementation_version,
                construct: Arc::new(construct),
            },
        );
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&ModuleConstructor> {
        self.constructors.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
