//! Load units
//!
//! A load unit groups the instances constructed together from one package.
//! Units can be chained under a parent unit; tearing a unit down only ever
//! touches its own members.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::module::registry::instance::ModuleInstance;

/// Identity of a load unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadUnitId(Uuid);

impl fmt::Display for LoadUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instances constructed together from one package
pub struct LoadUnit {
    id: LoadUnitId,
    source: PathBuf,
    parent: Option<Arc<LoadUnit>>,
    members: Mutex<Vec<Arc<ModuleInstance>>>,
}

impl LoadUnit {
    pub fn new<P: AsRef<Path>>(source: P, parent: Option<Arc<LoadUnit>>) -> Arc<Self> {
        Arc::new(Self {
            id: LoadUnitId(Uuid::new_v4()),
            source: source.as_ref().to_path_buf(),
            parent,
            members: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> LoadUnitId {
        self.id
    }

    /// Package this unit was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn parent(&self) -> Option<&Arc<LoadUnit>> {
        self.parent.as_ref()
    }

    /// Number of units above this one in the chain
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_ref();
        while let Some(unit) = current {
            depth += 1;
            current = unit.parent.as_ref();
        }
        depth
    }

    /// Members in construction order
    pub fn members(&self) -> Vec<Arc<ModuleInstance>> {
        self.lock_members().clone()
    }

    pub(crate) fn push(&self, instance: Arc<ModuleInstance>) {
        self.lock_members().push(instance);
    }

    fn lock_members(&self) -> MutexGuard<'_, Vec<Arc<ModuleInstance>>> {
        self.members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for LoadUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadUnit")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .field("members", &self.lock_members().len())
            .finish()
    }
}
