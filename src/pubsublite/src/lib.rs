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

//! Cloud client libraries for Rust - Pub/Sub Lite
//!
//! This crate contains a client for the [Pub/Sub Lite] admin surface:
//! zonal topics with provisioned partitions and capacity, and their
//! subscriptions. The data plane (publish/subscribe streams) is not part of
//! this crate.
//!
//! [Pub/Sub Lite]: https://cloud.google.com/pubsub/lite

pub use gax::Result;
pub use gax::error::Error;

/// The resource types used by the Pub/Sub Lite admin API.
pub mod model;

mod admin;

/// Clients to interact with Pub/Sub Lite.
pub mod client {
    pub use crate::admin::{AdminClient, ClientBuilder};
}
