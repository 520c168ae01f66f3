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

//! Consistency checks between the running release, its migration chain and
//! its compatibility entries, plus the health of an existing store.

use anyhow::Result;

use crate::model::Check;
use crate::schema::BASE_SCHEMA_VERSION;
use crate::schema::Schema;
use crate::store::Store;

pub fn release_checks(schema: &Schema) -> Vec<Check> {
    let app = schema.app_version();
    let target = &schema.target;
    let mut checks = Vec::new();

    let accepted = schema.manager.compatible_schemas(app.as_str());
    checks.push(match &accepted {
        Some(versions) => Check::new(
            "app_version_registered",
            true,
            format!(
                "lore {app} accepts [{}]",
                versions
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ),
        None => {
            let known: Vec<String> = schema
                .manager
                .compatibility()
                .app_versions()
                .iter()
                .map(ToString::to_string)
                .collect();
            Check::new(
                "app_version_registered",
                false,
                format!(
                    "lore {app} has no compatibility entry (registered: [{}])",
                    known.join(", ")
                ),
            )
        }
    });

    let target_ok = schema.accepts(target.as_str());
    checks.push(Check::new(
        "target_compatible",
        target_ok,
        if target_ok {
            format!("target schema {target} is accepted by lore {app}")
        } else {
            format!("target schema {target} is not accepted by lore {app}")
        },
    ));

    checks.push(reachability_check(
        "base_reaches_target",
        schema,
        BASE_SCHEMA_VERSION,
    ));

    let mut stranded = Vec::new();
    for version in accepted.unwrap_or_default() {
        if version != *target
            && schema
                .manager
                .get_migration_path(version.as_str(), target.as_str())
                .is_none()
        {
            stranded.push(version.to_string());
        }
    }
    checks.push(Check::new(
        "accepted_reach_target",
        stranded.is_empty(),
        if stranded.is_empty() {
            format!("every accepted schema can migrate to {target}")
        } else {
            format!("no path to {target} from [{}]", stranded.join(", "))
        },
    ));
    checks
}

pub fn store_checks(schema: &Schema, store: &Store) -> Result<Vec<Check>> {
    let version = store.schema_version()?;
    let compatible = schema.accepts(version.as_str());
    let mut checks = vec![Check::new(
        "store_compatible",
        compatible,
        if compatible {
            format!("stored schema {version} is usable as-is")
        } else {
            format!(
                "stored schema {version} needs migration for lore {}",
                schema.app_version()
            )
        },
    )];
    if !compatible {
        checks.push(reachability_check(
            "store_reaches_target",
            schema,
            version.as_str(),
        ));
    }
    let integrity = store.integrity_check()?;
    checks.push(Check::new(
        "integrity",
        integrity.is_ok(),
        format!(
            "{} ({} records, {} bytes)",
            integrity.status, integrity.stats.record_count, integrity.stats.db_size_bytes
        ),
    ));
    Ok(checks)
}

fn reachability_check(name: &str, schema: &Schema, from: &str) -> Check {
    let target = &schema.target;
    match schema.manager.get_migration_path(from, target.as_str()) {
        Some(path) => Check::new(name, true, format!("{from} -> {target} in {} step(s)", path.len())),
        None => Check::new(name, false, format!("no migration path from {from} to {target}")),
    }
}
