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

//! The background task behind a [BatchingPublisher].
//!
//! The worker owns the open batches. Messages without an ordering key are
//! bundled under the empty key and their batches publish concurrently.
//! Batches with an ordering key publish sequentially, in the order the
//! messages were accepted; a failure pauses the key until the application
//! calls `resume_publish`.
//!
//! [BatchingPublisher]: crate::batching::BatchingPublisher

use crate::Error;
use crate::model::PubsubMessage;
use crate::publisher::batch::Batch;
use crate::publisher::client::Publisher;
use crate::publisher::options::BatchingOptions;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};

/// A message waiting in a batch, plus the channel to report its outcome.
#[derive(Debug)]
pub(crate) struct BundledMessage {
    pub(crate) msg: PubsubMessage,
    pub(crate) tx: oneshot::Sender<crate::Result<String>>,
}

#[derive(Debug)]
pub(crate) enum Command {
    Publish(BundledMessage),
    Flush(oneshot::Sender<()>),
    ResumePublish(String),
}

pub(crate) struct Worker {
    client: Publisher,
    topic: String,
    options: BatchingOptions,
    rx: mpsc::UnboundedReceiver<Command>,
    batches: HashMap<String, Batch>,
    inflight: FuturesUnordered<tokio::task::JoinHandle<()>>,
    paused: HashSet<String>,
}

impl Worker {
    pub(crate) fn new(
        client: Publisher,
        topic: String,
        options: BatchingOptions,
        rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            client,
            topic,
            options,
            rx,
            batches: HashMap::new(),
            inflight: FuturesUnordered::new(),
            paused: HashSet::new(),
        }
    }

    pub(crate) async fn run(mut self) {
        // The first tick is delayed: `interval()` would fire immediately
        // and flush partial batches before any limit is reached.
        let mut linger = tokio::time::interval_at(
            tokio::time::Instant::now() + self.options.max_delay(),
            self.options.max_delay(),
        );
        linger.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    None => break,
                    Some(Command::Publish(m)) => self.on_publish(m).await,
                    Some(Command::Flush(tx)) => {
                        self.flush_all().await;
                        self.drain_inflight().await;
                        let _ = tx.send(());
                    }
                    Some(Command::ResumePublish(key)) => {
                        self.paused.remove(&key);
                    }
                },
                _ = linger.tick() => self.flush_all().await,
                Some(_) = self.inflight.next(), if !self.inflight.is_empty() => {},
            }
        }
        // The publisher was dropped: publish what is left.
        self.flush_all().await;
        self.drain_inflight().await;
    }

    async fn on_publish(&mut self, m: BundledMessage) {
        let key = m.msg.ordering_key.clone();
        if self.paused.contains(&key) {
            let _ = m.tx.send(Err(Error::other(format!(
                "the ordering key `{key}` is paused after a publish failure, \
                 call resume_publish() to resume"
            ))));
            return;
        }
        let batch = self.batches.entry(key.clone()).or_default();
        batch.push(m);
        if batch.len() >= self.options.max_messages() || batch.size() >= self.options.max_bytes() {
            self.flush_key(&key).await;
        }
    }

    async fn flush_all(&mut self) {
        let keys = self.batches.keys().cloned().collect::<Vec<_>>();
        for key in keys {
            self.flush_key(&key).await;
        }
    }

    async fn flush_key(&mut self, key: &str) {
        let Some(batch) = self.batches.remove(key) else {
            return;
        };
        if batch.is_empty() {
            return;
        }
        let client = self.client.clone();
        let topic = self.topic.clone();
        if key.is_empty() {
            // Unordered batches publish concurrently.
            self.inflight.push(tokio::spawn(async move {
                let _ = batch.send(client, topic).await;
            }));
            return;
        }
        // Ordered batches publish inline: the worker does not accept new
        // work until the batch completes, which keeps the key in order.
        if !batch.send(client, topic).await {
            tracing::warn!("pausing ordering key `{key}` after a publish failure");
            self.paused.insert(key.to_string());
        }
    }

    async fn drain_inflight(&mut self) {
        while self.inflight.next().await.is_some() {}
    }
}
