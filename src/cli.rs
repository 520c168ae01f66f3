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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(name = "lore", version, about = "Schema-versioned knowledge store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new store at the current schema
    Init {
        /// Path to the store directory
        path: Option<PathBuf>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored, target and application versions
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Migrate the store to the target schema
    Migrate(MigrateArgs),

    /// Show the migration path between two schema versions
    Path(PathArgs),

    /// Check whether a schema version is usable by an application version
    Compat(CompatArgs),

    /// List applied migration steps
    History {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Run version consistency and integrity checks
    Doctor {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Target schema version (defaults to the configured target)
    #[arg(long)]
    pub to: Option<String>,

    /// Print the path without applying it
    #[arg(long)]
    pub dry_run: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Source schema version
    pub from: String,

    /// Target schema version
    pub to: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CompatArgs {
    /// Schema version to check
    pub schema: String,

    /// Application version (defaults to this build)
    #[arg(long)]
    pub app: Option<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}
