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
use crate::model::{ComposeSourceObject, Object};
use crate::{Error, Result};
use std::sync::Arc;

/// The maximum number of sources in a single compose request.
///
/// See <https://cloud.google.com/storage/docs/composite-objects>.
pub(crate) const MAX_COMPOSE_SOURCES: usize = 32;

/// Concatenates up to 32 existing objects into a new object.
///
/// The operation is server side, no object data moves through the client.
/// The destination and all sources must live in the same bucket.
///
/// Created via
/// [Storage::compose_object][crate::client::Storage::compose_object].
pub struct ComposeObject {
    inner: Arc<StorageInner>,
    bucket: String,
    destination: String,
    sources: Vec<ComposeSourceObject>,
    content_type: Option<String>,
    if_generation_match: Option<i64>,
    options: gax::options::RequestOptions,
}

impl ComposeObject {
    pub(crate) fn new<B, O>(
        inner: Arc<StorageInner>,
        bucket: B,
        destination: O,
        sources: Vec<ComposeSourceObject>,
    ) -> Self
    where
        B: Into<String>,
        O: Into<String>,
    {
        let options = inner.options.retry.clone();
        Self {
            inner,
            bucket: bucket.into(),
            destination: destination.into(),
            sources,
            content_type: None,
            if_generation_match: None,
            options,
        }
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
    pub async fn send(self) -> Result<Object> {
        if self.sources.is_empty() {
            return Err(Error::binding("compose requires at least one source object"));
        }
        if self.sources.len() > MAX_COMPOSE_SOURCES {
            return Err(Error::binding(format!(
                "compose supports at most {MAX_COMPOSE_SOURCES} sources, got {}",
                self.sources.len()
            )));
        }
        let body = serde_json::json!({
            "sourceObjects": self.sources,
            "destination": {
                "contentType": self.content_type,
            },
        });
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!(
                    "{}/storage/v1/b/{}/o/{}/compose",
                    self.inner.endpoint,
                    self.bucket,
                    enc(&self.destination)
                ))
                .json(&body);
            if let Some(v) = self.if_generation_match {
                builder = builder.query(&[("ifGenerationMatch", v.to_string())]);
            }
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response.json::<Object>().await.map_err(Error::deser)
        };
        // Composing creates a new generation of the destination on each
        // call; only a generation precondition makes retries safe.
        let idempotent = self.if_generation_match.is_some();
        transport::execute_retry(&self.options, idempotent, attempt).await
    }
}
