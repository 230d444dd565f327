// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cloud client libraries for Rust - Bigtable
//!
//! This crate contains a client for the [Bigtable] table-admin surface:
//! creating, inspecting and deleting tables, their column families and
//! garbage-collection rules. The data plane (`ReadRows`, `MutateRow`, ...)
//! is not part of this crate.
//!
//! ```no_run
//! # use gcp_sdk_bigtable::client::TableAdmin;
//! # use gcp_sdk_bigtable::model::{ColumnFamily, GcRule};
//! # async fn sample() -> anyhow::Result<()> {
//! let client = TableAdmin::builder().build()?;
//! let table = client
//!     .create_table("projects/my-project/instances/my-instance", "my-table")
//!     .with_column_family("cf", ColumnFamily::new().set_gc_rule(GcRule::MaxNumVersions(3)))
//!     .send()
//!     .await?;
//! println!("created table {}", table.name);
//! # Ok(()) }
//! ```
//!
//! [Bigtable]: https://cloud.google.com/bigtable

pub use gax::Result;
pub use gax::error::Error;

/// The resource types used by the Bigtable admin API.
pub mod model;

mod admin;

/// Clients to interact with Bigtable.
pub mod client {
    pub use crate::admin::{ClientBuilder, TableAdmin};
}

/// Request builders.
pub mod builder {
    pub use crate::admin::{CreateTable, DropRowRange};
}
