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

use super::checksum::{ChecksumEngine, validate};
use super::client::StorageInner;
use gaxi::http as transport;
use crate::model::Object;
use crate::{Error, Result};
use std::sync::Arc;

/// Uploads an object in a single request.
///
/// The whole payload is kept in memory: retries resend it from the start.
/// For large objects or streaming sources prefer
/// [upload_object][crate::client::Storage::upload_object].
///
/// Created via
/// [Storage::insert_object][crate::client::Storage::insert_object].
pub struct InsertObject {
    inner: Arc<StorageInner>,
    bucket: String,
    object: String,
    payload: bytes::Bytes,
    content_type: Option<String>,
    if_generation_match: Option<i64>,
    compute_md5: bool,
    options: gax::options::RequestOptions,
}

impl InsertObject {
    pub(crate) fn new<B, O>(
        inner: Arc<StorageInner>,
        bucket: B,
        object: O,
        payload: bytes::Bytes,
    ) -> Self
    where
        B: Into<String>,
        O: Into<String>,
    {
        let options = inner.options.retry.clone();
        Self {
            inner,
            bucket: bucket.into(),
            object: object.into(),
            payload,
            content_type: None,
            if_generation_match: None,
            compute_md5: false,
            options,
        }
    }

    /// Sets the `Content-Type` of the object.
    pub fn with_content_type<S: Into<String>>(mut self, v: S) -> Self {
        self.content_type = Some(v.into());
        self
    }

    /// Fails with `FAILED_PRECONDITION` if the current object generation
    /// does not match the given value. Use `0` to require that the object
    /// does not exist yet.
    ///
    /// Setting this also makes the upload idempotent, and therefore
    /// retryable on transient failures.
    pub fn with_if_generation_match(mut self, v: i64) -> Self {
        self.if_generation_match = Some(v);
        self
    }

    /// Also computes (and validates) the MD5 hash of the payload.
    ///
    /// The CRC32C checksum is always computed and validated.
    pub fn with_md5_hash(mut self, v: bool) -> Self {
        self.compute_md5 = v;
        self
    }

    /// Changes the retry policy for this request.
    pub fn with_retry_policy<V: Into<gax::retry_policy::RetryPolicyArg>>(mut self, v: V) -> Self {
        self.options.set_retry_policy(v);
        self
    }

    /// Treats this insert as idempotent even without preconditions.
    ///
    /// Used by the parallel upload coordinator: shard names are unique to
    /// one upload, replaying an insert can only overwrite the shard with
    /// the same data.
    pub(crate) fn with_forced_idempotency(mut self) -> Self {
        self.options.set_idempotency(true);
        self
    }

    /// Replaces the request options wholesale.
    pub(crate) fn with_request_options(mut self, options: gax::options::RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Sends the request.
    pub async fn send(self) -> Result<Object> {
        let mut engine = if self.compute_md5 {
            ChecksumEngine::with_md5()
        } else {
            ChecksumEngine::new()
        };
        engine.update(0, &self.payload);
        let computed = engine.finalize();

        let content_type = self
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!(
                    "{}/upload/storage/v1/b/{}/o",
                    self.inner.endpoint, self.bucket
                ))
                .query(&[("uploadType", "media"), ("name", self.object.as_str())])
                .header(http::header::CONTENT_TYPE, content_type.as_str())
                .body(self.payload.clone());
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
        let idempotent = self.if_generation_match.is_some();
        let object = transport::execute_retry(&self.options, idempotent, attempt).await?;

        validate(&computed, &object.checksums()).map_err(Error::other)?;
        Ok(object)
    }
}
