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

use anyhow::Result;
use serde::Serialize;

use crate::migrate::MigrationReport;
use crate::model::Check;
use crate::model::HistoryRow;
use crate::model::SchemaStatus;
use crate::model::StepRow;

/// Version of the JSON envelope printed by `--json`.
const API_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<StepRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<Check>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            api_version: API_VERSION.to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            api_version: API_VERSION.to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
                hint: None,
            }),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        if let Some(error) = &mut self.error {
            error.hint = Some(hint.to_string());
        }
        self
    }

    pub fn with_schema(mut self, schema: SchemaStatus) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_path(mut self, path: Vec<StepRow>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_migration(mut self, report: MigrationReport) -> Self {
        self.migration = Some(report);
        self
    }

    pub fn with_compatible(mut self, compatible: bool) -> Self {
        self.compatible = Some(compatible);
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryRow>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_checks(mut self, checks: Vec<Check>) -> Self {
        self.ok = checks.iter().all(|check| check.ok);
        self.checks = Some(checks);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}

pub fn print_steps(steps: &[StepRow]) {
    if steps.is_empty() {
        println!("(no steps)");
    }
    for (idx, step) in steps.iter().enumerate() {
        println!("{:>3}. {} -> {}", idx + 1, step.from, step.to);
    }
}
