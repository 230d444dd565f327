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

use super::client::{StorageInner, enc};
use gaxi::http as transport;
use crate::Result;
use std::sync::Arc;

/// Deletes an object.
///
/// Created via [Storage::delete_object][crate::client::Storage::delete_object].
pub struct DeleteObject {
    inner: Arc<StorageInner>,
    bucket: String,
    object: String,
    generation: Option<i64>,
    if_generation_match: Option<i64>,
    options: gax::options::RequestOptions,
}

impl DeleteObject {
    pub(crate) fn new<B, O>(inner: Arc<StorageInner>, bucket: B, object: O) -> Self
    where
        B: Into<String>,
        O: Into<String>,
    {
        let options = inner.options.retry.clone();
        Self {
            inner,
            bucket: bucket.into(),
            object: object.into(),
            generation: None,
            if_generation_match: None,
            options,
        }
    }

    /// Deletes a specific revision of the object.
    ///
    /// Setting the generation also makes the request idempotent: deleting a
    /// pinned revision twice fails the second time with `NOT_FOUND`, it
    /// cannot delete data written by another writer.
    pub fn with_generation(mut self, v: i64) -> Self {
        self.generation = Some(v);
        self
    }

    /// Fails with `FAILED_PRECONDITION` if the current object generation
    /// does not match the given value.
    pub fn with_if_generation_match(mut self, v: i64) -> Self {
        self.if_generation_match = Some(v);
        self
    }

    /// Changes the retry policy for this request.
    pub fn with_retry_policy<V: Into<gax::retry_policy::RetryPolicyArg>>(mut self, v: V) -> Self {
        self.options.set_retry_policy(v);
        self
    }

    /// Replaces the request options wholesale.
    pub(crate) fn with_request_options(mut self, options: gax::options::RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Sends the request.
    pub async fn send(self) -> Result<()> {
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self.inner.client.delete(format!(
                "{}/storage/v1/b/{}/o/{}",
                self.inner.endpoint,
                self.bucket,
                enc(&self.object)
            ));
            for (name, value) in [
                ("generation", self.generation),
                ("ifGenerationMatch", self.if_generation_match),
            ] {
                if let Some(v) = value {
                    builder = builder.query(&[(name, v.to_string())]);
                }
            }
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            Ok(())
        };
        // Unqualified deletes are not idempotent: a retry may delete an
        // object written by another client in between the attempts.
        let idempotent = self.generation.is_some() || self.if_generation_match.is_some();
        transport::execute_retry(&self.options, idempotent, attempt).await
    }
}
