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

//! Cloud client libraries for Rust - Pub/Sub
//!
//! This crate contains a client for the [Pub/Sub] service: topic
//! administration, and message publishing with transparent batching.
//!
//! ```no_run
//! # use gcp_sdk_pubsub::client::Publisher;
//! # use gcp_sdk_pubsub::model::PubsubMessage;
//! # async fn sample() -> anyhow::Result<()> {
//! let client = Publisher::builder().build()?;
//! let publisher = client.batching_publisher("projects/my-project/topics/my-topic").build();
//! let handle = publisher.publish(PubsubMessage::new().set_data("hello world"));
//! let id = handle.wait().await?;
//! println!("published message {id}");
//! # Ok(()) }
//! ```
//!
//! [Pub/Sub]: https://cloud.google.com/pubsub

pub use gax::Result;
pub use gax::error::Error;

/// The resource types used by the Pub/Sub API.
pub mod model;

mod publisher;

/// Clients to interact with Pub/Sub.
pub mod client {
    pub use crate::publisher::client::{ClientBuilder, Publisher};
}

/// Message publishing with transparent batching.
pub mod batching {
    pub use crate::publisher::batching_publisher::{
        BatchingPublisher, BatchingPublisherBuilder, PublishHandle,
    };
    pub use crate::publisher::options::BatchingOptions;
}
