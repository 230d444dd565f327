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

use crate::Error;
use crate::model::PubsubMessage;
use crate::publisher::client::Publisher;
use crate::publisher::options::BatchingOptions;
use crate::publisher::worker::{BundledMessage, Command, Worker};
use tokio::sync::{mpsc, oneshot};

/// Configures a [BatchingPublisher].
///
/// Created via
/// [Publisher::batching_publisher][crate::client::Publisher::batching_publisher].
pub struct BatchingPublisherBuilder {
    client: Publisher,
    topic: String,
    options: BatchingOptions,
}

impl BatchingPublisherBuilder {
    pub(crate) fn new(client: Publisher, topic: String) -> Self {
        Self {
            client,
            topic,
            options: BatchingOptions::default(),
        }
    }

    /// Flush after this many messages.
    pub fn with_max_messages(mut self, v: usize) -> Self {
        self.options = self.options.set_max_messages(v);
        self
    }

    /// Flush once the accumulated payload reaches this size.
    pub fn with_max_bytes(mut self, v: usize) -> Self {
        self.options = self.options.set_max_bytes(v);
        self
    }

    /// Flush after the first message has been waiting this long.
    pub fn with_max_delay(mut self, v: std::time::Duration) -> Self {
        self.options = self.options.set_max_delay(v);
        self
    }

    /// Starts the publisher.
    ///
    /// Spawns the background worker, so this must be called within a Tokio
    /// runtime.
    pub fn build(self) -> BatchingPublisher {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker::new(self.client, self.topic, self.options, rx);
        tokio::spawn(worker.run());
        BatchingPublisher { tx }
    }
}

/// Publishes messages to one topic, bundling them into fewer requests.
///
/// Cheap to clone; all clones feed the same background worker. When the
/// last clone is dropped the worker publishes any buffered messages and
/// exits. Use [flush][BatchingPublisher::flush] before shutting down to
/// wait for that delivery.
///
/// # Example
/// ```no_run
/// # use gcp_sdk_pubsub::client::Publisher;
/// # use gcp_sdk_pubsub::model::PubsubMessage;
/// # async fn sample(client: &Publisher) -> anyhow::Result<()> {
/// let publisher = client
///     .batching_publisher("projects/my-project/topics/my-topic")
///     .with_max_messages(50)
///     .build();
/// let handle = publisher.publish(PubsubMessage::new().set_data("hello"));
/// let id = handle.wait().await?;
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct BatchingPublisher {
    tx: mpsc::UnboundedSender<Command>,
}

impl BatchingPublisher {
    /// Queues a message for publishing.
    ///
    /// Returns immediately; await the returned handle for the
    /// server-assigned message id.
    pub fn publish(&self, msg: PubsubMessage) -> PublishHandle {
        let (tx, rx) = oneshot::channel();
        let command = Command::Publish(BundledMessage { msg, tx });
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            // The worker is gone; fail the message instead of hanging.
            if let Command::Publish(bundled) = command {
                let _ = bundled
                    .tx
                    .send(Err(Error::other("the publisher was already shut down")));
            }
        }
        PublishHandle { rx }
    }

    /// Publishes all buffered messages and waits for their delivery.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Resumes publishing on an ordering key paused by a failure.
    ///
    /// Messages published to a paused key fail immediately, so the
    /// application controls what to do about the gap. Resuming simply
    /// allows new messages through.
    pub fn resume_publish<K: Into<String>>(&self, ordering_key: K) {
        let _ = self.tx.send(Command::ResumePublish(ordering_key.into()));
    }
}

/// The pending result of a [BatchingPublisher::publish] call.
pub struct PublishHandle {
    rx: oneshot::Receiver<crate::Result<String>>,
}

impl PublishHandle {
    /// Waits for the message to be published, returning its
    /// server-assigned id.
    pub async fn wait(self) -> crate::Result<String> {
        self.rx.await.unwrap_or_else(|_| {
            Err(Error::other(
                "the publisher was shut down before the message was sent",
            ))
        })
    }
}
