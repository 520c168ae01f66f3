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

//! User configuration, read from `<config dir>/lore/lore.toml`.

use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Store file, relative to the directory it is discovered in.
    pub store_path: PathBuf,
    /// Schema version stores are migrated to; the built-in current schema when unset.
    pub target_schema: Option<String>,
    pub auto_migrate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("lore.db"),
            target_schema: None,
            auto_migrate: true,
        }
    }
}

impl Config {
    /// Location of the global config file, if a config dir can be resolved.
    pub fn path() -> Option<PathBuf> {
        config_dir(|key| std::env::var_os(key)).map(|dir| dir.join("lore").join("lore.toml"))
    }

    /// Reads the global config, falling back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text)?;
        config.target_schema = config
            .target_schema
            .map(|target| target.trim().to_string())
            .filter(|target| !target.is_empty());
        if config.store_path.as_os_str().is_empty() {
            anyhow::bail!("store_path must not be empty");
        }
        Ok(config)
    }

    /// Store file for a store created under `root`.
    pub fn store_path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.store_path)
    }
}

/// An existing store together with the config it was found with.
#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub config: Config,
    pub store_path: PathBuf,
}

impl StoreLocation {
    pub fn from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::discover(&cwd, Config::load()?)
    }

    /// Walks up from `start` to the nearest directory holding the configured
    /// store file. Absolute store paths are used as-is.
    pub fn discover(start: &Path, config: Config) -> Result<Self> {
        let store_path = if config.store_path.is_absolute() {
            Some(config.store_path.clone()).filter(|path| path.exists())
        } else {
            let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
            start
                .ancestors()
                .map(|dir| config.store_path_under(dir))
                .find(|candidate| candidate.exists())
        };
        let store_path =
            store_path.ok_or_else(|| anyhow::anyhow!("store not found; run `lore init` first"))?;
        Ok(Self { config, store_path })
    }
}

fn config_dir(var: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    let dir = |key: &str| var(key).map(PathBuf::from);
    if cfg!(target_os = "windows") {
        dir("APPDATA").or_else(|| dir("USERPROFILE").map(|p| p.join("AppData").join("Roaming")))
    } else if cfg!(target_os = "macos") {
        dir("HOME").map(|home| home.join("Library").join("Application Support"))
    } else {
        dir("XDG_CONFIG_HOME").or_else(|| dir("HOME").map(|home| home.join(".config")))
    }
}
