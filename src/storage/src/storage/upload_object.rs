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

use super::checksum::ChecksumEngine;
use super::client::StorageInner;
use super::perform_upload::PerformUpload;
use super::request_options::RequestOptions;
use super::streaming_source::{Payload, Seek, StreamingSource};
use crate::Result;
use crate::model::Object;
use std::sync::Arc;

/// Uploads an object from a streaming source using a resumable session.
///
/// Created via
/// [Storage::upload_object][crate::client::Storage::upload_object].
pub struct UploadObject<P> {
    inner: Arc<StorageInner>,
    bucket: String,
    object: String,
    payload: Payload<P>,
    content_type: Option<String>,
    if_generation_match: Option<i64>,
    compute_md5: bool,
    options: RequestOptions,
}

impl<P> UploadObject<P>
where
    Payload<P>: StreamingSource + Seek + Send + Sync,
{
    pub(crate) fn new<B, O>(
        inner: Arc<StorageInner>,
        bucket: B,
        object: O,
        payload: Payload<P>,
    ) -> Self
    where
        B: Into<String>,
        O: Into<String>,
    {
        let options = inner.options.clone();
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
    pub fn with_if_generation_match(mut self, v: i64) -> Self {
        self.if_generation_match = Some(v);
        self
    }

    /// Also computes (and validates) the MD5 hash of the payload.
    pub fn with_md5_hash(mut self, v: bool) -> Self {
        self.compute_md5 = v;
        self
    }

    /// Changes the chunk size for this upload.
    ///
    /// The value is rounded up to the next 256 KiB boundary, as required by
    /// the resumable upload protocol. Larger chunks use more memory and
    /// fewer requests.
    pub fn with_upload_chunk_size(mut self, v: usize) -> Self {
        self.options.set_upload_chunk_size(v);
        self
    }

    /// Changes the retry policy for this upload.
    pub fn with_retry_policy<V: Into<gax::retry_policy::RetryPolicyArg>>(mut self, v: V) -> Self {
        self.options.retry.set_retry_policy(v);
        self
    }

    /// Starts the upload and waits for it to complete.
    pub async fn send(self) -> Result<Object> {
        let engine = if self.compute_md5 {
            ChecksumEngine::with_md5()
        } else {
            ChecksumEngine::new()
        };
        PerformUpload::new(
            self.payload,
            engine,
            self.inner,
            self.bucket,
            self.object,
            self.content_type,
            self.if_generation_match,
            self.options,
        )
        .send()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::tests::test_client;
    use super::super::request_options::RESUMABLE_UPLOAD_QUANTUM;
    use crate::model::crc32c_to_base64;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    const SESSION: &str = "/upload-session/test-only-12345";

    fn object_json(payload: &[u8]) -> serde_json::Value {
        serde_json::json!({
            "name": "my-object",
            "bucket": "my-bucket",
            "generation": "123",
            "metageneration": "1",
            "size": payload.len().to_string(),
            "crc32c": crc32c_to_base64(crc32c::crc32c(payload)),
        })
    }

    // httptest returns relative `location` headers as-is; the client treats
    // the value as a URL. Prefix the server's base URL.
    fn absolute_session(server: &Server) -> Expectation {
        Expectation::matching(all_of![
            request::method_path("POST", "/upload/storage/v1/b/my-bucket/o"),
            request::query(url_decoded(contains(("uploadType", "resumable")))),
        ])
        .respond_with(
            status_code(200).append_header("location", server.url_str(SESSION)),
        )
    }

    #[tokio::test]
    async fn small_upload_single_put() -> anyhow::Result<()> {
        let payload: &[u8] = b"The quick brown fox jumps over the lazy dog";
        let server = Server::run();
        server.expect(absolute_session(&server));
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", SESSION),
                request::headers(contains(("content-range", "bytes 0-42/43"))),
                request::body(eq(payload)),
            ])
            .respond_with(json_encoded(object_json(payload))),
        );

        let client = test_client(server.url_str(""));
        let object = client
            .upload_object("my-bucket", "my-object", bytes::Bytes::from_static(payload))
            .send()
            .await?;
        assert_eq!(object.size, 43);
        Ok(())
    }

    #[tokio::test]
    async fn empty_upload() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(absolute_session(&server));
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", SESSION),
                request::headers(contains(("content-range", "bytes */0"))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "name": "my-object",
                "bucket": "my-bucket",
                "generation": "1",
                "metageneration": "1",
                "size": "0",
                "crc32c": crc32c_to_base64(0),
            }))),
        );

        let client = test_client(server.url_str(""));
        let object = client
            .upload_object("my-bucket", "my-object", bytes::Bytes::new())
            .send()
            .await?;
        assert_eq!(object.size, 0);
        Ok(())
    }

    #[tokio::test]
    async fn chunked_upload() -> anyhow::Result<()> {
        // One full chunk plus a small tail.
        let payload = vec![42_u8; RESUMABLE_UPLOAD_QUANTUM + 5];
        let tail_range = format!(
            "bytes {}-{}/{}",
            RESUMABLE_UPLOAD_QUANTUM,
            payload.len() - 1,
            payload.len()
        );
        let server = Server::run();
        server.expect(absolute_session(&server));
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", SESSION),
                request::headers(contains((
                    "content-range",
                    format!("bytes 0-{}/*", RESUMABLE_UPLOAD_QUANTUM - 1)
                ))),
            ])
            .respond_with(
                status_code(308)
                    .append_header("range", format!("bytes=0-{}", RESUMABLE_UPLOAD_QUANTUM - 1)),
            ),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", SESSION),
                request::headers(contains(("content-range", tail_range))),
            ])
            .respond_with(json_encoded(object_json(&payload))),
        );

        let client = test_client(server.url_str(""));
        let object = client
            .upload_object("my-bucket", "my-object", bytes::Bytes::from(payload))
            .with_upload_chunk_size(RESUMABLE_UPLOAD_QUANTUM)
            .send()
            .await?;
        assert_eq!(object.generation, 123);
        Ok(())
    }

    #[tokio::test]
    async fn resume_after_transient_failure() -> anyhow::Result<()> {
        let payload: &[u8] = b"The quick brown fox jumps over the lazy dog";
        let server = Server::run();
        server.expect(absolute_session(&server));
        // The first data PUT fails. The client queries the session status,
        // learns nothing was persisted, and replays the full payload.
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", SESSION),
                request::headers(contains(("content-range", "bytes 0-42/43"))),
            ])
            .times(2)
            .respond_with(cycle![
                status_code(503).body("unavailable"),
                json_encoded(object_json(payload)),
            ]),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", SESSION),
                request::headers(contains(("content-range", "bytes */*"))),
            ])
            .respond_with(status_code(308)),
        );

        let client = test_client(server.url_str(""));
        let object = client
            .upload_object("my-bucket", "my-object", bytes::Bytes::from_static(payload))
            .send()
            .await?;
        assert_eq!(object.size, 43);
        Ok(())
    }

    #[tokio::test]
    async fn upload_checksum_mismatch() {
        let payload: &[u8] = b"The quick brown fox jumps over the lazy dog";
        let server = Server::run();
        server.expect(absolute_session(&server));
        server.expect(
            Expectation::matching(request::method_path("PUT", SESSION)).respond_with(
                json_encoded(serde_json::json!({
                    "name": "my-object",
                    "bucket": "my-bucket",
                    "generation": "123",
                    "metageneration": "1",
                    "size": "43",
                    "crc32c": crc32c_to_base64(0xdeadbeef_u32),
                })),
            ),
        );

        let client = test_client(server.url_str(""));
        let err = client
            .upload_object("my-bucket", "my-object", bytes::Bytes::from_static(payload))
            .send()
            .await
            .unwrap_err();
        use std::error::Error as _;
        let source = err.source().expect("checksum errors have a source");
        assert!(format!("{source}").contains("CRC32C"), "{source}");
    }
}
