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

//! Schema-versioned record store.
//!
//! The [`migrate`] module holds the migration graph, path finder and executor;
//! [`compat`] holds the application/schema compatibility matrix. [`store`] is
//! the SQLite storage handle they operate on and [`schema`] registers its
//! built-in migration chain.

pub mod compat;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod model;
pub mod output;
pub mod schema;
pub mod store;
pub mod version;
