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

mod cli;

use std::path::PathBuf;

use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::CompatArgs;
use crate::cli::MigrateArgs;
use crate::cli::PathArgs;
use lore::config::Config;
use lore::config::StoreLocation;
use lore::doctor;
use lore::migrate::MigrationError;
use lore::model::SchemaStatus;
use lore::model::StepRow;
use lore::output::JsonResponse;
use lore::output::print_json;
use lore::output::print_steps;
use lore::schema::Schema;
use lore::store::Store;
use lore::store::StoreMode;
use lore::version::VersionId;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LORE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { path, json } => handle_result(cmd_init(path, json), json),
        Commands::Status { json } => handle_result(cmd_status(json), json),
        Commands::Migrate(args) => {
            let json = args.json;
            handle_result(cmd_migrate(args), json)
        }
        Commands::Path(args) => {
            let json = args.json;
            handle_result(cmd_path(args), json)
        }
        Commands::Compat(args) => {
            let json = args.json;
            handle_result(cmd_compat(args), json)
        }
        Commands::History { json } => handle_result(cmd_history(json), json),
        Commands::Doctor { json } => handle_result(cmd_doctor(json), json),
    }
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let (code, hint) = match err.downcast_ref::<MigrationError>() {
                    Some(MigrationError::PathNotFound { .. }) => (
                        "no_migration_path",
                        Some("register a migration chain between the two versions"),
                    ),
                    Some(MigrationError::StepFailed { .. }) => (
                        "migration_failed",
                        Some("the store may hold an intermediate schema; rerun `lore migrate`"),
                    ),
                    None => ("error", None),
                };
                let mut resp = JsonResponse::error(code, &format!("{err:#}"));
                if let Some(hint) = hint {
                    resp = resp.with_hint(hint);
                }
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn load_schema() -> Result<Schema> {
    let config = Config::load()?;
    Ok(Schema::from_config(&config))
}

fn cmd_init(path: Option<PathBuf>, json: bool) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {root:?}"))?;

    let config = Config::load()?;
    let store_path = config.store_path_under(&root);
    let schema = Schema::from_config(&config);
    let report = Store::init(&store_path, &schema)?;

    if json {
        let status = SchemaStatus {
            app_version: schema.app_version().clone(),
            stored: Some(report.to.clone()),
            target: schema.target.clone(),
            compatible: Some(schema.accepts(report.to.as_str())),
            record_count: Some(0),
        };
        print_json(&JsonResponse::ok().with_schema(status).with_migration(report))?;
        return Ok(());
    }
    println!(
        "Initialized lore store at {} (schema {})",
        store_path.display(),
        schema.target
    );
    Ok(())
}

fn cmd_status(json: bool) -> Result<()> {
    let location = StoreLocation::from_cwd()?;
    let schema = Schema::from_config(&location.config);
    let store = Store::open_unchecked(&location.store_path, StoreMode::ReadOnly)?;
    let stored = store.schema_version()?;
    let compatible = schema.accepts(stored.as_str());
    let stats = store.stats()?;

    let mut warnings = Vec::new();
    let pending = match schema
        .manager
        .get_migration_path(stored.as_str(), schema.target.as_str())
    {
        Some(path) => StepRow::from_path(&path),
        None => {
            warnings.push(format!(
                "no migration path from {} to {}",
                stored, schema.target
            ));
            Vec::new()
        }
    };

    let status = SchemaStatus {
        app_version: schema.app_version().clone(),
        stored: Some(stored.clone()),
        target: schema.target.clone(),
        compatible: Some(compatible),
        record_count: Some(stats.record_count),
    };

    if json {
        let resp = JsonResponse::ok()
            .with_schema(status)
            .with_path(pending)
            .with_warnings(warnings);
        print_json(&resp)?;
    } else {
        println!("App version: {}", status.app_version);
        println!("Stored schema: {stored}");
        println!("Target schema: {}", status.target);
        println!(
            "Compatible: {}",
            if compatible { "yes" } else { "no" }
        );
        println!("Records: {}", stats.record_count);
        if !pending.is_empty() {
            println!("Pending migrations:");
            print_steps(&pending);
        }
        for warn in warnings {
            eprintln!("warning: {warn}");
        }
    }
    Ok(())
}

fn cmd_migrate(args: MigrateArgs) -> Result<()> {
    let location = StoreLocation::from_cwd()?;
    let schema = Schema::from_config(&location.config);
    let target = args
        .to
        .map(VersionId::from)
        .unwrap_or_else(|| schema.target.clone());

    if args.dry_run {
        let store = Store::open_unchecked(&location.store_path, StoreMode::ReadOnly)?;
        let stored = store.schema_version()?;
        let path = schema
            .manager
            .get_migration_path(stored.as_str(), target.as_str())
            .ok_or_else(|| MigrationError::PathNotFound {
                from: stored.clone(),
                to: target.clone(),
            })?;
        let steps = StepRow::from_path(&path);
        if args.json {
            print_json(&JsonResponse::ok().with_path(steps))?;
        } else {
            print_steps(&steps);
        }
        return Ok(());
    }

    let mut store = Store::open_unchecked(&location.store_path, StoreMode::ReadWrite)?;
    let stored = store.schema_version()?;
    let report = schema
        .manager
        .migrate(&mut store, stored.as_str(), target.as_str())
        .with_context(|| format!("migrate {}", store.path.display()))?;

    let mut warnings = Vec::new();
    let current = store.schema_version()?;
    if current != target {
        warnings.push(format!(
            "migration finished but the store reports schema {current}, expected {target}"
        ));
    }
    if !schema.accepts(current.as_str()) {
        warnings.push(format!(
            "schema {current} is not compatible with lore {}",
            schema.app_version()
        ));
    }

    if args.json {
        let resp = JsonResponse::ok()
            .with_migration(report)
            .with_warnings(warnings);
        print_json(&resp)?;
    } else {
        if report.applied.is_empty() {
            println!("Already at schema {current}");
        } else {
            println!(
                "Migrated {} -> {} ({} steps)",
                report.from,
                report.to,
                report.applied.len()
            );
        }
        for warn in warnings {
            eprintln!("warning: {warn}");
        }
    }
    Ok(())
}

fn cmd_path(args: PathArgs) -> Result<()> {
    let schema = load_schema()?;
    let path = schema
        .manager
        .get_migration_path(&args.from, &args.to)
        .ok_or_else(|| MigrationError::PathNotFound {
            from: args.from.as_str().into(),
            to: args.to.as_str().into(),
        })?;
    let steps = StepRow::from_path(&path);
    if args.json {
        print_json(&JsonResponse::ok().with_path(steps))?;
    } else {
        print_steps(&steps);
    }
    Ok(())
}

fn cmd_compat(args: CompatArgs) -> Result<()> {
    let schema = load_schema()?;
    let app = args
        .app
        .clone()
        .unwrap_or_else(|| schema.app_version().to_string());
    let compatible = schema
        .manager
        .is_compatible(&args.schema, args.app.as_deref());
    if args.json {
        print_json(&JsonResponse::ok().with_compatible(compatible))?;
    } else if compatible {
        println!("schema {} is compatible with lore {app}", args.schema);
    } else {
        println!("schema {} is not compatible with lore {app}", args.schema);
    }
    Ok(())
}

fn cmd_history(json: bool) -> Result<()> {
    let location = StoreLocation::from_cwd()?;
    let store = Store::open_unchecked(&location.store_path, StoreMode::ReadOnly)?;
    let history = store.history()?;
    if json {
        print_json(&JsonResponse::ok().with_history(history))?;
    } else {
        for row in history {
            println!("{}  {} -> {}", row.applied_at, row.from, row.to);
        }
    }
    Ok(())
}

fn cmd_doctor(json: bool) -> Result<()> {
    let mut warnings = Vec::new();
    let (schema, location) = match StoreLocation::from_cwd() {
        Ok(location) => (Schema::from_config(&location.config), Some(location)),
        Err(err) => {
            warnings.push(format!("{err}; skipped store checks"));
            (load_schema()?, None)
        }
    };

    let mut checks = doctor::release_checks(&schema);
    if let Some(location) = location {
        let store = Store::open_unchecked(&location.store_path, StoreMode::ReadOnly)?;
        checks.extend(doctor::store_checks(&schema, &store)?);
    }

    if json {
        let resp = JsonResponse::ok()
            .with_checks(checks)
            .with_warnings(warnings);
        print_json(&resp)?;
        return Ok(());
    }

    for check in &checks {
        let label = if check.ok { "ok" } else { "FAIL" };
        println!("[{label}] {}: {}", check.name, check.detail);
    }
    for warn in warnings {
        eprintln!("warning: {warn}");
    }
    let failed = checks.iter().filter(|check| !check.ok).count();
    if failed > 0 {
        anyhow::bail!("doctor found {failed} failing check(s)");
    }
    Ok(())
}
