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

//! Uploads one object as N parallel shards.
//!
//! Each shard is uploaded as a temporary object. When the last shard
//! completes, the shards are composed (server side, in shard order) into
//! the final object, and the temporary objects are deleted. The coordinator
//! is a small state machine:
//!
//! ```norust
//! Writing -> AllFinished -> Composed
//!                        -> Failed
//! ```
//!
//! Shard completions drive the transitions. The first shard failure moves
//! the state to `Failed`: writes and finishes on the remaining shards fail
//! fast, the already-uploaded temporaries are deleted, and the first error
//! is what [ParallelUploadHandle::join] reports.
//!
//! More than 32 shards cannot be composed in one request, the coordinator
//! composes them in stages and deletes each intermediate as soon as the
//! stage that consumed it completes.

use super::client::StorageInner;
use super::compose_object::{ComposeObject, MAX_COMPOSE_SOURCES};
use super::delete_object::DeleteObject;
use super::insert_object::InsertObject;
use crate::error::ParallelUploadAborted;
use crate::model::{ComposeSourceObject, Object};
use crate::{Error, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

const DEFAULT_SHARD_COUNT: usize = 4;

/// Configures a parallel upload.
///
/// Created via
/// [Storage::parallel_upload_object][crate::client::Storage::parallel_upload_object].
pub struct ParallelUpload {
    inner: Arc<StorageInner>,
    bucket: String,
    destination: String,
    shard_count: usize,
    prefix: Option<String>,
    content_type: Option<String>,
    if_generation_match: Option<i64>,
    options: gax::options::RequestOptions,
}

impl ParallelUpload {
    pub(crate) fn new<B, O>(inner: Arc<StorageInner>, bucket: B, destination: O) -> Self
    where
        B: Into<String>,
        O: Into<String>,
    {
        let options = inner.options.retry.clone();
        Self {
            inner,
            bucket: bucket.into(),
            destination: destination.into(),
            shard_count: DEFAULT_SHARD_COUNT,
            prefix: None,
            content_type: None,
            if_generation_match: None,
            options,
        }
    }

    /// Sets the number of parallel shards. At least one.
    pub fn with_shard_count(mut self, v: usize) -> Self {
        self.shard_count = std::cmp::max(v, 1);
        self
    }

    /// Sets the name prefix for the temporary shard objects.
    ///
    /// By default the prefix is the destination name plus a random suffix,
    /// so concurrent uploads of the same object do not collide.
    pub fn with_prefix<S: Into<String>>(mut self, v: S) -> Self {
        self.prefix = Some(v.into());
        self
    }

    /// Sets the `Content-Type` of the destination object.
    pub fn with_content_type<S: Into<String>>(mut self, v: S) -> Self {
        self.content_type = Some(v.into());
        self
    }

    /// Fails with `FAILED_PRECONDITION` if the current generation of the
    /// destination does not match the given value. Use `0` to require that
    /// the destination does not exist yet.
    pub fn with_if_generation_match(mut self, v: i64) -> Self {
        self.if_generation_match = Some(v);
        self
    }

    /// Changes the retry policy for the shard uploads and the compose.
    pub fn with_retry_policy<V: Into<gax::retry_policy::RetryPolicyArg>>(mut self, v: V) -> Self {
        self.options.set_retry_policy(v);
        self
    }

    /// Starts the upload.
    ///
    /// Returns one [ShardWriter] per shard, and the [ParallelUploadHandle]
    /// that resolves to the composed object once every shard finishes.
    pub fn start(self) -> (Vec<ShardWriter>, ParallelUploadHandle) {
        let prefix = self
            .prefix
            .unwrap_or_else(|| format!("{}.{}", self.destination, uuid::Uuid::new_v4()));
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(ParallelUploadState {
            inner: self.inner,
            bucket: self.bucket,
            destination: self.destination,
            prefix,
            content_type: self.content_type,
            if_generation_match: self.if_generation_match,
            options: self.options,
            deleter: ScopedDeleter::default(),
            coordinator: Mutex::new(Coordinator {
                phase: Phase::Writing,
                remaining: self.shard_count,
                shards: (0..self.shard_count).map(|_| None).collect(),
                first_failure: None,
                result_tx: Some(tx),
            }),
        });
        let writers = (0..self.shard_count)
            .map(|index| ShardWriter {
                state: state.clone(),
                index,
                buffer: Vec::new(),
                finished: false,
            })
            .collect();
        (writers, ParallelUploadHandle { rx })
    }
}

/// The writer for one shard of a parallel upload.
///
/// Writes accumulate in memory; [finish][ShardWriter::finish] uploads the
/// shard and notifies the coordinator. Dropping a writer without finishing
/// it aborts the whole upload.
pub struct ShardWriter {
    state: Arc<ParallelUploadState>,
    index: usize,
    buffer: Vec<bytes::Bytes>,
    finished: bool,
}

impl ShardWriter {
    /// The index of this shard. Shard contents appear in the final object
    /// in index order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Appends data to this shard.
    pub fn write<B: Into<bytes::Bytes>>(&mut self, data: B) {
        self.buffer.push(data.into());
    }

    /// Uploads the shard and reports its completion to the coordinator.
    ///
    /// The returned result covers this shard only. Errors in other shards,
    /// or in the final compose, are reported by
    /// [ParallelUploadHandle::join].
    pub async fn finish(mut self) -> Result<()> {
        self.finished = true;
        let state = self.state.clone();
        if let Some(shard) = state.failed_shard() {
            return Err(Error::other(ParallelUploadAborted { shard }));
        }

        let mut payload = bytes::BytesMut::new();
        for buffer in self.buffer.drain(..) {
            payload.extend_from_slice(&buffer);
        }
        let shard_name = state.shard_name(self.index);
        let insert = InsertObject::new(
            state.inner.clone(),
            state.bucket.clone(),
            shard_name,
            payload.freeze(),
        )
        .with_request_options(state.options.clone())
        .with_forced_idempotency();
        match insert.send().await {
            Ok(object) => state.on_shard_uploaded(self.index, object).await,
            Err(e) => {
                state.fail(self.index, e);
                state.cleanup().await;
                Err(Error::other(ParallelUploadAborted { shard: self.index }))
            }
        }
    }
}

impl Drop for ShardWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.state.fail(
            self.index,
            Error::other(format!(
                "shard writer {} dropped before finish()",
                self.index
            )),
        );
        // Deleting the uploaded temporaries needs a runtime; without one
        // the orphans are reported when the handle resolves.
        let state = self.state.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { state.cleanup().await });
        }
    }
}

/// The result side of a parallel upload.
pub struct ParallelUploadHandle {
    rx: oneshot::Receiver<Result<Object>>,
}

impl ParallelUploadHandle {
    /// Waits for the upload to complete, returning the composed object.
    ///
    /// Resolves when the last shard finishes and the compose completes, or
    /// as soon as any shard fails.
    pub async fn join(self) -> Result<Object> {
        self.rx.await.unwrap_or_else(|_| {
            Err(Error::other(
                "all shard writers were dropped before the upload completed",
            ))
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Writing,
    AllFinished,
    Composed,
    Failed,
}

struct Coordinator {
    phase: Phase,
    remaining: usize,
    shards: Vec<Option<Object>>,
    first_failure: Option<usize>,
    result_tx: Option<oneshot::Sender<Result<Object>>>,
}

struct ParallelUploadState {
    inner: Arc<StorageInner>,
    bucket: String,
    destination: String,
    prefix: String,
    content_type: Option<String>,
    if_generation_match: Option<i64>,
    options: gax::options::RequestOptions,
    deleter: ScopedDeleter,
    coordinator: Mutex<Coordinator>,
}

impl ParallelUploadState {
    fn shard_name(&self, index: usize) -> String {
        format!("{}.upload_shard.{}", self.prefix, index)
    }

    /// The shard whose failure aborted the upload, if any.
    fn failed_shard(&self) -> Option<usize> {
        self.coordinator
            .lock()
            .expect("coordinator lock poisoned")
            .first_failure
    }

    /// Moves the state machine to `Failed` and publishes the first error.
    fn fail(&self, shard: usize, error: Error) {
        let mut guard = self.coordinator.lock().expect("coordinator lock poisoned");
        if guard.phase == Phase::Failed {
            return;
        }
        tracing::warn!("parallel upload of {} aborted by shard {shard}: {error}", self.destination);
        guard.phase = Phase::Failed;
        guard.first_failure = Some(shard);
        if let Some(tx) = guard.result_tx.take() {
            let _ = tx.send(Err(error));
        }
    }

    /// Records a successful shard upload. The last shard triggers the
    /// compose.
    async fn on_shard_uploaded(&self, index: usize, object: Object) -> Result<()> {
        self.deleter.add(object.name.clone(), object.generation);
        let all_finished = {
            let mut guard = self.coordinator.lock().expect("coordinator lock poisoned");
            if guard.phase == Phase::Failed {
                // Another shard aborted the upload while this one was in
                // flight. Its temporary object is already recorded, clean
                // it up and report the abort.
                drop(guard);
                self.cleanup().await;
                let shard = self.failed_shard().unwrap_or(index);
                return Err(Error::other(ParallelUploadAborted { shard }));
            }
            guard.shards[index] = Some(object);
            guard.remaining -= 1;
            if guard.remaining == 0 {
                guard.phase = Phase::AllFinished;
            }
            guard.phase == Phase::AllFinished
        };
        if all_finished {
            self.compose_and_cleanup().await;
        }
        Ok(())
    }

    /// Composes the shards into the destination, deletes the temporaries,
    /// and publishes the final result.
    async fn compose_and_cleanup(&self) {
        let sources = {
            let guard = self.coordinator.lock().expect("coordinator lock poisoned");
            guard
                .shards
                .iter()
                .map(|o| {
                    let o = o.as_ref().expect("all shards finished");
                    ComposeSourceObject::new(o.name.clone()).set_generation(o.generation)
                })
                .collect::<Vec<_>>()
        };
        let result = self.compose_all(sources).await;
        self.cleanup().await;

        let mut guard = self.coordinator.lock().expect("coordinator lock poisoned");
        guard.phase = match &result {
            Ok(_) => Phase::Composed,
            Err(_) => Phase::Failed,
        };
        if let Some(tx) = guard.result_tx.take() {
            let _ = tx.send(result);
        }
    }

    /// Composes `sources` in stages of at most 32, in order.
    async fn compose_all(&self, mut sources: Vec<ComposeSourceObject>) -> Result<Object> {
        let mut round = 0;
        while sources.len() > MAX_COMPOSE_SOURCES {
            let mut next = Vec::new();
            for (i, group) in chunk_sources(sources, MAX_COMPOSE_SOURCES)
                .into_iter()
                .enumerate()
            {
                let name = format!("{}.compose_tmp.{round}.{i}", self.prefix);
                let object = ComposeObject::new(
                    self.inner.clone(),
                    self.bucket.clone(),
                    name,
                    group.clone(),
                )
                .with_request_options(self.options.clone())
                .with_if_generation_match(0)
                .send()
                .await?;
                self.deleter.add(object.name.clone(), object.generation);
                // The consumed sources are no longer needed, delete them
                // eagerly rather than waiting for the whole upload.
                for source in group {
                    if let Some((name, generation)) = self.deleter.remove(&source.name) {
                        self.delete_quietly(name, generation).await;
                    }
                }
                next.push(
                    ComposeSourceObject::new(object.name).set_generation(object.generation),
                );
            }
            sources = next;
            round += 1;
        }
        let mut compose = ComposeObject::new(
            self.inner.clone(),
            self.bucket.clone(),
            self.destination.clone(),
            sources,
        )
        .with_request_options(self.options.clone());
        if let Some(v) = &self.content_type {
            compose = compose.with_content_type(v.clone());
        }
        if let Some(v) = self.if_generation_match {
            compose = compose.with_if_generation_match(v);
        }
        compose.send().await
    }

    /// Deletes all recorded temporary objects, best effort.
    async fn cleanup(&self) {
        for (name, generation) in self.deleter.take_all() {
            self.delete_quietly(name, generation).await;
        }
    }

    async fn delete_quietly(&self, name: String, generation: i64) {
        let delete = DeleteObject::new(self.inner.clone(), self.bucket.clone(), name.clone())
            .with_request_options(self.options.clone())
            .with_generation(generation);
        if let Err(e) = delete.send().await {
            tracing::warn!("cannot delete temporary object {name} (generation {generation}): {e}");
        }
    }
}

/// Records the temporary objects created by a parallel upload, so they can
/// be deleted when the upload completes or aborts.
///
/// Deletes are generation-pinned: a temporary recorded here can only be
/// deleted at the generation this upload created, concurrent writers are
/// not affected.
#[derive(Debug, Default)]
struct ScopedDeleter {
    objects: Mutex<Vec<(String, i64)>>,
}

impl ScopedDeleter {
    fn add(&self, name: String, generation: i64) {
        self.objects
            .lock()
            .expect("deleter lock poisoned")
            .push((name, generation));
    }

    fn remove(&self, name: &str) -> Option<(String, i64)> {
        let mut guard = self.objects.lock().expect("deleter lock poisoned");
        let pos = guard.iter().position(|(n, _)| n == name)?;
        Some(guard.swap_remove(pos))
    }

    fn take_all(&self) -> Vec<(String, i64)> {
        std::mem::take(&mut *self.objects.lock().expect("deleter lock poisoned"))
    }
}

/// Splits `sources` into consecutive groups of at most `limit`, keeping the
/// order.
fn chunk_sources(
    sources: Vec<ComposeSourceObject>,
    limit: usize,
) -> Vec<Vec<ComposeSourceObject>> {
    let mut groups = Vec::with_capacity(sources.len().div_ceil(limit));
    let mut current = Vec::with_capacity(limit);
    for source in sources {
        current.push(source);
        if current.len() == limit {
            groups.push(std::mem::replace(&mut current, Vec::with_capacity(limit)));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
