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

//! Rows and reports shared by the store, the doctor checks and the CLI output.

use serde::Serialize;

use crate::migrate::MigrationStep;
use crate::version::VersionId;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub from: VersionId,
    pub to: VersionId,
    pub applied_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRow {
    pub from: VersionId,
    pub to: VersionId,
}

impl StepRow {
    pub fn from_path<S>(path: &[MigrationStep<S>]) -> Vec<Self> {
        path.iter()
            .map(|step| Self {
                from: step.from.clone(),
                to: step.to.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaStatus {
    pub app_version: VersionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<VersionId>,
    pub target: VersionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    pub fn new(name: &str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            ok,
            detail: detail.into(),
        }
    }
}
