//! Module dependency resolution
//!
//! Orders a set of descriptors so dependencies come first and reports the
//! modules that cannot be ordered because they sit in, or behind, a cycle.
//! Only edges between members of the set are considered; hard and soft
//! dependencies constrain ordering alike.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use crate::module::registry::descriptor::Descriptor;

/// Dependency resolution result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyResolution {
    /// Modules in load order (dependencies first)
    pub load_order: Vec<String>,
    /// Modules in a cycle or depending on one
    pub cyclic: Vec<String>,
}

impl DependencyResolution {
    pub fn is_cyclic(&self, name: &str) -> bool {
        self.cyclic.iter().any(|c| c == name)
    }
}

/// Dependency resolver
pub struct ModuleDependencies;

impl ModuleDependencies {
    /// Resolve the load order of `descriptors`
    pub fn resolve<'a, I>(descriptors: I) -> DependencyResolution
    where
        I: IntoIterator<Item = &'a Descriptor>,
    {
        let descriptors: Vec<&Descriptor> = descriptors.into_iter().collect();
        let members: BTreeSet<&str> = descriptors.iter().map(|d| d.name()).collect();

        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for descriptor in &descriptors {
            let deps = descriptor
                .all_dependencies()
                .into_iter()
                .filter(|dep| members.contains(dep) && *dep != descriptor.name())
                .map(str::to_string)
                .collect();
            dependencies.insert(descriptor.name().to_string(), deps);
        }

        let resolution = Self::topological_sort(&dependencies);
        if resolution.cyclic.is_empty() {
            debug!("Dependency resolution complete: {:?}", resolution.load_order);
        } else {
            debug!(
                "Dependency resolution left cyclic modules: {:?}",
                resolution.cyclic
            );
        }
        resolution
    }

    /// Kahn's algorithm over a name -> dependencies map
    fn topological_sort(dependencies: &BTreeMap<String, Vec<String>>) -> DependencyResolution {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for module in dependencies.keys() {
            in_degree.insert(module, 0);
        }

        for (module, deps) in dependencies {
            for dep in deps {
                dependents.entry(dep).or_default().push(module);
                *in_degree.entry(module).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(module, _)| *module)
            .collect();

        let mut load_order = Vec::new();
        while let Some(module) = queue.pop_front() {
            load_order.push(module.to_string());

            if let Some(next) = dependents.get(module) {
                for &dependent in next {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        let cyclic = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(module, _)| module.to_string())
            .collect();

        DependencyResolution { load_order, cyclic }
    }
}
