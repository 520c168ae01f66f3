// Copyright 2026 Lore Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Schema migration registry, path finding and execution.
//!
//! Migrations are registered as directed edges between opaque version tokens.
//! A migration request resolves the fewest-hop path through those edges and
//! runs each step against the caller's storage handle in order. Steps are
//! trusted to persist their own version marker; the executor never writes one.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use serde::Serialize;

use crate::compat::CompatibilityMatrix;
use crate::version::VersionId;

pub type MigrationFn<S> = Arc<dyn Fn(&mut S) -> Result<()> + Send + Sync>;

/// One registered edge of the migration graph.
pub struct MigrationStep<S> {
    pub from: VersionId,
    pub to: VersionId,
    pub apply: MigrationFn<S>,
}

impl<S> Clone for MigrationStep<S> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<S> fmt::Debug for MigrationStep<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedStep {
    pub from: VersionId,
    pub to: VersionId,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub from: VersionId,
    pub to: VersionId,
    pub applied: Vec<AppliedStep>,
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no migration path from {from} to {to}")]
    PathNotFound { from: VersionId, to: VersionId },
    #[error("migration {from} -> {to} failed after {applied} applied step(s)")]
    StepFailed {
        from: VersionId,
        to: VersionId,
        applied: usize,
        #[source]
        source: anyhow::Error,
    },
}

struct MigrationGraph<S> {
    // Each source keeps its edges in registration order; BFS expands them in
    // that order, which fixes the tie-break between equal-length paths.
    edges: HashMap<VersionId, Vec<MigrationStep<S>>>,
}

impl<S> MigrationGraph<S> {
    fn new() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    fn register(&mut self, step: MigrationStep<S>) {
        let outgoing = self.edges.entry(step.from.clone()).or_default();
        match outgoing.iter_mut().find(|existing| existing.to == step.to) {
            Some(existing) => *existing = step,
            None => outgoing.push(step),
        }
    }

    fn neighbors(&self, version: &str) -> &[MigrationStep<S>] {
        self.edges.get(version).map(Vec::as_slice).unwrap_or(&[])
    }

    fn find_path<'a>(&'a self, from: &'a str, to: &str) -> Option<Vec<MigrationStep<S>>> {
        let mut visited: HashSet<&'a str> = HashSet::from([from]);
        let mut parents: HashMap<&'a str, &'a MigrationStep<S>> = HashMap::new();
        let mut queue: VecDeque<&'a str> = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = Vec::new();
                let mut cursor = current;
                while let Some(&step) = parents.get(cursor) {
                    path.push(step.clone());
                    cursor = step.from.as_str();
                }
                path.reverse();
                return Some(path);
            }
            for step in self.neighbors(current) {
                if visited.insert(step.to.as_str()) {
                    parents.insert(step.to.as_str(), step);
                    queue.push_back(step.to.as_str());
                }
            }
        }
        None
    }
}

/// Owns the migration graph and the compatibility matrix for one application.
///
/// Registration takes a registry's write lock; lookups share its read lock.
/// Execution resolves the path under the read lock and releases it before any
/// migration function runs.
pub struct MigrationManager<S> {
    app_version: VersionId,
    graph: RwLock<MigrationGraph<S>>,
    compatibility: CompatibilityMatrix,
}

impl<S> MigrationManager<S> {
    pub fn new(app_version: impl Into<VersionId>) -> Self {
        Self {
            app_version: app_version.into(),
            graph: RwLock::new(MigrationGraph::new()),
            compatibility: CompatibilityMatrix::new(),
        }
    }

    pub fn app_version(&self) -> &VersionId {
        &self.app_version
    }

    pub fn register_migration<F>(
        &self,
        from: impl Into<VersionId>,
        to: impl Into<VersionId>,
        apply: F,
    ) where
        F: Fn(&mut S) -> Result<()> + Send + Sync + 'static,
    {
        let step = MigrationStep {
            from: from.into(),
            to: to.into(),
            apply: Arc::new(apply),
        };
        tracing::debug!(from = %step.from, to = %step.to, "registered migration");
        self.graph.write().register(step);
    }

    pub fn neighbors(&self, version: &str) -> Vec<MigrationStep<S>> {
        self.graph.read().neighbors(version).to_vec()
    }

    /// Fewest-hop path from `from` to `to`, or `None` when unreachable.
    pub fn get_migration_path(&self, from: &str, to: &str) -> Option<Vec<MigrationStep<S>>> {
        self.graph.read().find_path(from, to)
    }

    pub fn migrate(
        &self,
        storage: &mut S,
        from: &str,
        to: &str,
    ) -> std::result::Result<MigrationReport, MigrationError> {
        let mut report = MigrationReport {
            from: from.into(),
            to: to.into(),
            applied: Vec::new(),
        };
        if from == to {
            return Ok(report);
        }

        let Some(path) = self.get_migration_path(from, to) else {
            return Err(MigrationError::PathNotFound {
                from: from.into(),
                to: to.into(),
            });
        };

        for step in path {
            tracing::info!(from = %step.from, to = %step.to, "applying migration");
            if let Err(source) = (step.apply)(&mut *storage) {
                return Err(MigrationError::StepFailed {
                    from: step.from,
                    to: step.to,
                    applied: report.applied.len(),
                    source,
                });
            }
            report.applied.push(AppliedStep {
                from: step.from,
                to: step.to,
            });
        }
        Ok(report)
    }

    /// Boolean form of [`MigrationManager::migrate`]; failures are logged.
    pub fn execute_migration(&self, storage: &mut S, from: &str, to: &str) -> bool {
        match self.migrate(storage, from, to) {
            Ok(_) => true,
            Err(MigrationError::PathNotFound { from, to }) => {
                tracing::warn!(%from, %to, "no migration path");
                false
            }
            Err(MigrationError::StepFailed {
                from,
                to,
                applied,
                source,
            }) => {
                let error = format!("{source:#}");
                tracing::error!(%from, %to, applied, %error, "migration step failed");
                false
            }
        }
    }

    pub fn register_compatibility<I, V>(&self, app_version: impl Into<VersionId>, schema_versions: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<VersionId>,
    {
        self.compatibility.register(app_version, schema_versions);
    }

    /// Whether `schema_version` can be used as-is by `app_version`, or by the
    /// running application when `app_version` is `None`.
    pub fn is_compatible(&self, schema_version: &str, app_version: Option<&str>) -> bool {
        let app_version = app_version.unwrap_or(self.app_version.as_str());
        self.compatibility.contains(schema_version, app_version)
    }

    pub fn compatible_schemas(&self, app_version: &str) -> Option<Vec<VersionId>> {
        self.compatibility.accepted(app_version)
    }

    pub fn compatibility(&self) -> &CompatibilityMatrix {
        &self.compatibility
    }
}
