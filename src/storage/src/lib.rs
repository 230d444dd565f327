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

//! Cloud client libraries for Rust - Storage
//!
//! This crate contains traits, types, and functions to interact with the
//! [Cloud Storage] JSON API. Most applications start with the
//! [Storage][client::Storage] client:
//!
//! ```no_run
//! # use gcp_sdk_storage::client::Storage;
//! # async fn sample() -> anyhow::Result<()> {
//! let client = Storage::builder().build()?;
//! let object = client
//!     .insert_object("my-bucket", "my-object", "hello world")
//!     .send()
//!     .await?;
//! println!("uploaded {} (generation {})", object.name, object.generation);
//! # Ok(()) }
//! ```
//!
//! Large objects can be uploaded in parallel shards, composed server-side
//! into the final object, see
//! [parallel_upload_object][client::Storage::parallel_upload_object].
//!
//! [Cloud Storage]: https://cloud.google.com/storage

pub use gax::Result;
pub use gax::error::Error;

/// Storage-specific error details.
pub mod error;

/// The resource types used by the Cloud Storage API.
pub mod model;

pub mod retry_policy;

mod storage;

pub use crate::storage::streaming_source;

/// Clients to interact with Cloud Storage.
pub mod client {
    pub use crate::storage::client::{ClientBuilder, Storage};
}

/// Request builders.
pub mod builder {
    pub use crate::storage::compose_object::ComposeObject;
    pub use crate::storage::delete_object::DeleteObject;
    pub use crate::storage::get_object::GetObject;
    pub use crate::storage::insert_object::InsertObject;
    pub use crate::storage::list_objects::ListObjects;
    pub use crate::storage::parallel_upload::{ParallelUpload, ParallelUploadHandle, ShardWriter};
    pub use crate::storage::read_object::{ReadObject, ReadObjectResponse};
    pub use crate::storage::upload_object::UploadObject;
}
