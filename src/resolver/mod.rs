//! Dependency resolution for discovered bundles
//!
//! Checks every declared dependency of every manifest and removes manifests
//! whose dependencies cannot be satisfied, cascading to their dependents.
//!
//! ## Resolution Process
//!
//! 1. Exclude every manifest whose name is shared with another one
//! 2. For each remaining manifest and each dependency, in name order:
//!    - the dependency must not be the manifest itself
//!    - the dependency must be present
//!    - the present version must satisfy the required range
//! 3. Propagate exclusions with a worklist: when a bundle is excluded, every
//!    still-accepted dependent is excluded too and queued in turn
//! 4. Build the [`DependencyGraph`] of survivors
//!
//! Each step only shrinks the accepted set, so the worklist terminates and
//! reaches the same fixed point as re-running the checks until nothing
//! changes.
//!
//! ## Modules
//!
//! - [`graph`]: Dependency graph with index edges
//! - [`sort`]: Load order planning and cycle detection

pub mod graph;
pub mod sort;

use std::collections::{HashMap, HashSet, VecDeque};

pub use graph::DependencyGraph;
pub use sort::plan;

use crate::error::{OmphalosError, dependency_not_found, deps};
use crate::manifest::Manifest;

/// A manifest removed during resolution, with the reason
#[derive(Debug)]
pub struct Exclusion {
    pub manifest: Manifest,
    pub error: OmphalosError,
}

/// Outcome of dependency resolution
#[derive(Debug, Default)]
pub struct Resolution {
    pub graph: DependencyGraph,
    pub excluded: Vec<Exclusion>,
}

/// Working state of a resolution pass
struct Resolver {
    slots: Vec<Option<Manifest>>,
    by_name: HashMap<String, usize>,
    excluded_names: HashSet<String>,
    dependents: HashMap<String, Vec<usize>>,
    queue: VecDeque<String>,
    excluded: Vec<Exclusion>,
}

impl Resolver {
    fn new(manifests: Vec<Manifest>) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for manifest in &manifests {
            *counts.entry(manifest.name.as_str()).or_default() += 1;
        }
        let shared: HashSet<String> = counts
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .map(|(name, _)| name.to_string())
            .collect();

        let mut resolver = Self {
            slots: Vec::with_capacity(manifests.len()),
            by_name: HashMap::new(),
            excluded_names: HashSet::new(),
            dependents: HashMap::new(),
            queue: VecDeque::new(),
            excluded: Vec::new(),
        };

        for mut manifest in manifests {
            if shared.contains(&manifest.name) {
                manifest.duplicate = true;
                let error = OmphalosError::DuplicateName {
                    name: manifest.name.clone(),
                    location: manifest.location.display().to_string(),
                };
                resolver.record(manifest, error);
                continue;
            }

            let index = resolver.slots.len();
            for dep in manifest.dependencies.keys() {
                resolver
                    .dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(index);
            }
            resolver.by_name.insert(manifest.name.clone(), index);
            resolver.slots.push(Some(manifest));
        }

        resolver
    }

    /// Record an exclusion and queue its dependents
    fn record(&mut self, manifest: Manifest, error: OmphalosError) {
        tracing::warn!(bundle = %manifest.name, "Excluding bundle: {error}");
        self.by_name.remove(&manifest.name);
        if self.excluded_names.insert(manifest.name.clone()) {
            self.queue.push_back(manifest.name.clone());
        }
        self.excluded.push(Exclusion { manifest, error });
    }

    fn exclude(&mut self, index: usize, error: OmphalosError) {
        if let Some(manifest) = self.slots.get_mut(index).and_then(Option::take) {
            self.record(manifest, error);
        }
    }

    /// First violated dependency of the manifest in `index`
    fn check(&self, index: usize) -> Option<OmphalosError> {
        let manifest = self.slots.get(index)?.as_ref()?;
        for (dep, range) in &manifest.dependencies {
            if *dep == manifest.name {
                return Some(OmphalosError::SelfDependency {
                    name: manifest.name.clone(),
                });
            }

            let present = self
                .by_name
                .get(dep)
                .and_then(|&i| self.slots.get(i))
                .and_then(Option::as_ref);
            match present {
                Some(found) if !range.matches(&found.version) => {
                    return Some(OmphalosError::IncompatibleDependency {
                        name: manifest.name.clone(),
                        dependency: dep.clone(),
                        required: range.to_string(),
                        found: found.version.to_string(),
                    });
                }
                Some(_) => {}
                None if self.excluded_names.contains(dep) => {
                    return Some(deps::excluded(&manifest.name, dep));
                }
                None => return Some(dependency_not_found(&manifest.name, dep)),
            }
        }
        None
    }

    fn run(mut self) -> Resolution {
        for index in 0..self.slots.len() {
            if let Some(error) = self.check(index) {
                self.exclude(index, error);
            }
        }

        while let Some(name) = self.queue.pop_front() {
            let dependents = self.dependents.get(&name).cloned().unwrap_or_default();
            for index in dependents {
                let Some(dependent) = self.slots.get(index).and_then(Option::as_ref) else {
                    continue;
                };
                let error = deps::excluded(&dependent.name, &name);
                self.exclude(index, error);
            }
        }

        let survivors = self.slots.into_iter().flatten().collect();
        Resolution {
            graph: DependencyGraph::from_accepted(survivors),
            excluded: self.excluded,
        }
    }
}

/// Resolve dependencies of discovered manifests
///
/// Returns the graph of accepted manifests and every exclusion with its
/// specific reason. Never fails: an unsatisfiable manifest only removes
/// itself and its dependents.
pub fn resolve(manifests: Vec<Manifest>) -> Resolution {
    Resolver::new(manifests).run()
}
