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

//! Drives a [resumable upload] session.
//!
//! The protocol is a small state machine:
//! 1. `POST .../o?uploadType=resumable` creates a session, returned in the
//!    `Location` header.
//! 2. `PUT` requests send the data in chunks. Intermediate chunks use
//!    `Content-Range: bytes {first}-{last}/*` and must be multiples of
//!    256 KiB; the service acknowledges them with `308 Resume Incomplete`
//!    and a `Range` header reporting the persisted prefix.
//! 3. The final chunk carries the total size (`bytes {first}-{last}/{total}`)
//!    and finalizes the object.
//!
//! After a transient failure the client queries the session
//! (`Content-Range: bytes */*`), seeks the source to the persisted offset,
//! and continues from there.
//!
//! [resumable upload]: https://cloud.google.com/storage/docs/resumable-uploads

use super::checksum::{ChecksumEngine, validate};
use super::client::StorageInner;
use super::request_options::RequestOptions;
use super::streaming_source::{Seek, StreamingSource};
use gaxi::http as transport;
use crate::model::Object;
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

const RESUME_INCOMPLETE: reqwest::StatusCode = reqwest::StatusCode::PERMANENT_REDIRECT;

/// A resumable upload in progress.
///
/// The payload lives behind a `Mutex` because it is re-used across retry
/// attempts: an attempt seeks the source back to the persisted offset
/// before replaying data.
pub(crate) struct PerformUpload<S> {
    payload: Arc<Mutex<S>>,
    engine: std::sync::Mutex<ChecksumEngine>,
    inner: Arc<StorageInner>,
    bucket: String,
    object: String,
    content_type: Option<String>,
    if_generation_match: Option<i64>,
    options: RequestOptions,
}

impl<S> PerformUpload<S>
where
    S: StreamingSource + Seek + Send + Sync,
{
    pub(crate) fn new(
        payload: S,
        engine: ChecksumEngine,
        inner: Arc<StorageInner>,
        bucket: String,
        object: String,
        content_type: Option<String>,
        if_generation_match: Option<i64>,
        options: RequestOptions,
    ) -> Self {
        Self {
            payload: Arc::new(Mutex::new(payload)),
            engine: std::sync::Mutex::new(engine),
            inner,
            bucket,
            object,
            content_type,
            if_generation_match,
            options,
        }
    }

    pub(crate) async fn send(self) -> Result<Object> {
        let upload_url = self.start_session().await?;

        let first_attempt = AtomicBool::new(true);
        let attempt = async |timeout: Option<std::time::Duration>| {
            let offset = if first_attempt.swap(false, Ordering::SeqCst) {
                0
            } else {
                match self.query_status(&upload_url, timeout).await? {
                    ResumeStatus::Finalized(object) => return Ok(*object),
                    ResumeStatus::Partial(persisted) => persisted,
                }
            };
            self.upload_from(&upload_url, offset, timeout).await
        };
        // The session deduplicates by offset, replaying data is safe.
        let object = transport::execute_retry(&self.options.retry, true, attempt).await?;

        let computed = self.engine.lock().expect("checksum lock poisoned").finalize();
        validate(&computed, &object.checksums()).map_err(Error::other)?;
        Ok(object)
    }

    /// Creates the upload session, retrying transient failures.
    async fn start_session(&self) -> Result<String> {
        let body = serde_json::json!({
            "name": self.object,
            "contentType": self.content_type,
        });
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!(
                    "{}/upload/storage/v1/b/{}/o",
                    self.inner.endpoint, self.bucket
                ))
                .query(&[("uploadType", "resumable"), ("name", self.object.as_str())])
                .header(http::header::CONTENT_TYPE, "application/json")
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
            let location = response
                .headers()
                .get(http::header::LOCATION)
                .ok_or_else(|| Error::deser("missing Location header starting resumable upload"))?;
            location.to_str().map(str::to_string).map_err(Error::deser)
        };
        transport::execute_retry(&self.options.retry, true, attempt).await
    }

    /// Queries the persisted offset of the session.
    async fn query_status(
        &self,
        upload_url: &str,
        timeout: Option<std::time::Duration>,
    ) -> Result<ResumeStatus> {
        let mut builder = self
            .inner
            .client
            .put(upload_url)
            .header(http::header::CONTENT_RANGE, "bytes */*");
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let builder = self.inner.apply_auth_headers(builder).await?;
        let response = builder.send().await.map_err(transport::map_send_error)?;
        if response.status() == RESUME_INCOMPLETE {
            let persisted = persisted_size(response.headers()).ok_or_else(|| {
                Error::deser("malformed Range header in resumable upload status")
            })?;
            return Ok(ResumeStatus::Partial(persisted));
        }
        if !response.status().is_success() {
            return transport::to_http_error(response).await;
        }
        let object = response.json::<Object>().await.map_err(Error::deser)?;
        Ok(ResumeStatus::Finalized(Box::new(object)))
    }

    /// Sends the data starting at `start_offset`, in chunks.
    async fn upload_from(
        &self,
        upload_url: &str,
        start_offset: u64,
        timeout: Option<std::time::Duration>,
    ) -> Result<Object> {
        let chunk_size = self.options.upload_chunk_size;
        let mut source = self.payload.lock().await;
        source.seek(start_offset).await.map_err(Error::ser)?;

        let mut offset = start_offset;
        let mut carry: Option<bytes::Bytes> = None;
        loop {
            // Assemble the next chunk from the source.
            let mut chunk = bytes::BytesMut::with_capacity(chunk_size);
            let mut at_eof = false;
            while chunk.len() < chunk_size {
                let next = match carry.take() {
                    Some(b) => Some(Ok(b)),
                    None => source.next().await,
                };
                match next {
                    None => {
                        at_eof = true;
                        break;
                    }
                    Some(Err(e)) => return Err(Error::ser(e)),
                    Some(Ok(mut buffer)) => {
                        let room = chunk_size - chunk.len();
                        if buffer.len() > room {
                            carry = Some(buffer.split_off(room));
                        }
                        chunk.extend_from_slice(&buffer);
                    }
                }
            }
            let chunk = chunk.freeze();
            self.engine
                .lock()
                .expect("checksum lock poisoned")
                .update(offset, &chunk);
            let end = offset + chunk.len() as u64;

            if at_eof {
                return self
                    .finalize(upload_url, offset, chunk, end, timeout)
                    .await;
            }

            // An intermediate chunk. The service may persist less than we
            // sent, continue from its high-water mark.
            let content_range = format!("bytes {offset}-{}/*", end - 1);
            let persisted = self
                .put_chunk(upload_url, &content_range, chunk, timeout)
                .await?;
            if persisted < end {
                tracing::debug!(
                    "service persisted {persisted} of {end} bytes, rewinding the source"
                );
                source.seek(persisted).await.map_err(Error::ser)?;
                carry = None;
            }
            offset = persisted;
        }
    }

    async fn finalize(
        &self,
        upload_url: &str,
        offset: u64,
        chunk: bytes::Bytes,
        total: u64,
        timeout: Option<std::time::Duration>,
    ) -> Result<Object> {
        let content_range = match (chunk.is_empty(), total) {
            (true, 0) => "bytes */0".to_string(),
            (true, total) => format!("bytes */{total}"),
            (false, total) => format!("bytes {offset}-{}/{total}", total - 1),
        };
        let mut builder = self
            .inner
            .client
            .put(upload_url)
            .header(http::header::CONTENT_RANGE, content_range)
            .body(chunk);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let builder = self.inner.apply_auth_headers(builder).await?;
        let response = builder.send().await.map_err(transport::map_send_error)?;
        if !response.status().is_success() {
            return transport::to_http_error(response).await;
        }
        response.json::<Object>().await.map_err(Error::deser)
    }

    async fn put_chunk(
        &self,
        upload_url: &str,
        content_range: &str,
        chunk: bytes::Bytes,
        timeout: Option<std::time::Duration>,
    ) -> Result<u64> {
        let mut builder = self
            .inner
            .client
            .put(upload_url)
            .header(http::header::CONTENT_RANGE, content_range)
            .body(chunk);
        if let Some(d) = timeout {
            builder = builder.timeout(d);
        }
        let builder = self.inner.apply_auth_headers(builder).await?;
        let response = builder.send().await.map_err(transport::map_send_error)?;
        if response.status() != RESUME_INCOMPLETE {
            return transport::to_http_error(response).await;
        }
        persisted_size(response.headers())
            .ok_or_else(|| Error::deser("malformed Range header in resumable upload response"))
    }
}

enum ResumeStatus {
    Finalized(Box<Object>),
    Partial(u64),
}

/// The number of bytes persisted by the service, from the `Range` header.
///
/// A missing header means no bytes are persisted. The persisted range
/// always starts at zero, uploads are sequential and the service does not
/// accept holes. The header reports an inclusive range, i.e.
/// `bytes=0-999` means 1000 bytes are persisted.
fn persisted_size(headers: &http::HeaderMap) -> Option<u64> {
    let Some(range) = headers.get(http::header::RANGE) else {
        return Some(0);
    };
    let end = std::str::from_utf8(range.as_bytes().strip_prefix(b"bytes=0-").ok()?).ok()?;
    end.parse::<u64>().ok().map(|end| end + 1)
}
