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

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::version::VersionId;

/// Application version -> schema versions it can open without migrating.
#[derive(Debug, Default)]
pub struct CompatibilityMatrix {
    entries: RwLock<HashMap<VersionId, Vec<VersionId>>>,
}

impl CompatibilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the accepted set for `app_version`; earlier entries are not merged.
    pub fn register<I, V>(&self, app_version: impl Into<VersionId>, schema_versions: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<VersionId>,
    {
        let versions = schema_versions.into_iter().map(Into::into).collect();
        self.entries.write().insert(app_version.into(), versions);
    }

    /// Unregistered application versions accept nothing.
    pub fn contains(&self, schema_version: &str, app_version: &str) -> bool {
        self.entries
            .read()
            .get(app_version)
            .is_some_and(|accepted| accepted.iter().any(|v| v == schema_version))
    }

    pub fn accepted(&self, app_version: &str) -> Option<Vec<VersionId>> {
        self.entries.read().get(app_version).cloned()
    }

    pub fn app_versions(&self) -> Vec<VersionId> {
        let mut versions: Vec<VersionId> = self.entries.read().keys().cloned().collect();
        versions.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        versions
    }
}
