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
use super::client::{StorageInner, enc};
use gaxi::http as transport;
use crate::model::ObjectChecksums;
use crate::{Error, Result};
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use std::sync::Arc;

/// Downloads the contents of an object.
///
/// Created via [Storage::read_object][crate::client::Storage::read_object].
pub struct ReadObject {
    inner: Arc<StorageInner>,
    bucket: String,
    object: String,
    generation: Option<i64>,
    read_offset: Option<u64>,
    read_limit: Option<u64>,
    if_generation_match: Option<i64>,
    options: gax::options::RequestOptions,
}

impl ReadObject {
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
            read_offset: None,
            read_limit: None,
            if_generation_match: None,
            options,
        }
    }

    /// Reads a specific revision of the object.
    pub fn with_generation(mut self, v: i64) -> Self {
        self.generation = Some(v);
        self
    }

    /// Starts reading at the given offset.
    ///
    /// Ranged reads skip checksum validation: the service checksums cover
    /// the full object.
    pub fn with_read_offset(mut self, v: u64) -> Self {
        self.read_offset = Some(v);
        self
    }

    /// Reads at most the given number of bytes.
    pub fn with_read_limit(mut self, v: u64) -> Self {
        self.read_limit = Some(v);
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

    fn range_header(&self) -> Option<String> {
        match (self.read_offset, self.read_limit) {
            (None, None) => None,
            (Some(offset), None) => Some(format!("bytes={offset}-")),
            (None, Some(limit)) => Some(format!("bytes=0-{}", limit.saturating_sub(1))),
            (Some(offset), Some(limit)) => {
                Some(format!("bytes={offset}-{}", offset + limit.saturating_sub(1)))
            }
        }
    }

    /// Sends the request.
    ///
    /// The returned [ReadObjectResponse] holds the open download, call
    /// [all_bytes][ReadObjectResponse::all_bytes] to collect the data.
    pub async fn send(self) -> Result<ReadObjectResponse> {
        let range = self.range_header();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!(
                    "{}/storage/v1/b/{}/o/{}",
                    self.inner.endpoint,
                    self.bucket,
                    enc(&self.object)
                ))
                .query(&[("alt", "media")]);
            for (name, value) in [
                ("generation", self.generation),
                ("ifGenerationMatch", self.if_generation_match),
            ] {
                if let Some(v) = value {
                    builder = builder.query(&[(name, v.to_string())]);
                }
            }
            if let Some(range) = &range {
                builder = builder.header(http::header::RANGE, range.as_str());
            }
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            Ok(response)
        };
        let response = transport::execute_retry(&self.options, true, attempt).await?;

        // Only full reads can be validated against the object checksums.
        let full_read = response.status() == reqwest::StatusCode::OK;
        let reported = parse_hash_header(response.headers());
        Ok(ReadObjectResponse {
            response,
            reported: if full_read { reported } else { ObjectChecksums::default() },
        })
    }
}

/// An open object download.
pub struct ReadObjectResponse {
    response: reqwest::Response,
    reported: ObjectChecksums,
}

impl ReadObjectResponse {
    /// The size of the downloaded range, when reported by the service.
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Collects the full download into a buffer, validating checksums.
    ///
    /// Fails if the connection drops before all bytes arrive, or when the
    /// computed CRC32C checksum does not match the value reported by the
    /// service. Ranged reads are not validated.
    pub async fn all_bytes(self) -> Result<bytes::Bytes> {
        let data = self.response.bytes().await.map_err(Error::io)?;
        let mut engine = ChecksumEngine::new();
        engine.update(0, &data);
        validate(&engine.finalize(), &self.reported).map_err(Error::other)?;
        Ok(data)
    }
}

/// Parses the `x-goog-hash` header(s).
///
/// The header carries comma-separated `<algorithm>=<base64>` pairs, and may
/// appear multiple times.
fn parse_hash_header(headers: &http::HeaderMap) -> ObjectChecksums {
    let mut checksums = ObjectChecksums::default();
    for value in headers.get_all("x-goog-hash") {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(',') {
            let Some((algorithm, encoded)) = pair.trim().split_once('=') else {
                continue;
            };
            match algorithm {
                "crc32c" => {
                    checksums.crc32c = BASE64_STANDARD
                        .decode(encoded)
                        .ok()
                        .and_then(|b| <[u8; 4]>::try_from(b.as_slice()).ok())
                        .map(u32::from_be_bytes);
                }
                "md5" => {
                    checksums.md5_hash = BASE64_STANDARD
                        .decode(encoded)
                        .ok()
                        .map(bytes::Bytes::from);
                }
                _ => {}
            }
        }
    }
    checksums
}

#[cfg(test)]
mod tests {
    use super::super::client::tests::test_client;
    use super::*;
    use crate::model::crc32c_to_base64;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    const PAYLOAD: &[u8] = b"The quick brown fox jumps over the lazy dog";

    fn media_path() -> &'static str {
        "/storage/v1/b/my-bucket/o/my-object"
    }

    #[tokio::test]
    async fn full_read_validates_checksum() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", media_path()),
                request::query(url_decoded(contains(("alt", "media")))),
            ])
            .respond_with(
                status_code(200)
                    .append_header(
                        "x-goog-hash",
                        format!("crc32c={}", crc32c_to_base64(crc32c::crc32c(PAYLOAD))),
                    )
                    .body(PAYLOAD),
            ),
        );

        let client = test_client(server.url_str(""));
        let contents = client
            .read_object("my-bucket", "my-object")
            .send()
            .await?
            .all_bytes()
            .await?;
        assert_eq!(contents, bytes::Bytes::from_static(PAYLOAD));
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_download_is_an_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", media_path())).respond_with(
                status_code(200)
                    .append_header(
                        "x-goog-hash",
                        format!("crc32c={}", crc32c_to_base64(0xdeadbeef_u32)),
                    )
                    .body(PAYLOAD),
            ),
        );

        let client = test_client(server.url_str(""));
        let err = client
            .read_object("my-bucket", "my-object")
            .send()
            .await
            .unwrap()
            .all_bytes()
            .await
            .unwrap_err();
        use std::error::Error as _;
        let source = err.source().expect("checksum errors have a source");
        assert!(format!("{source}").contains("CRC32C"), "{source}");
    }

    #[tokio::test]
    async fn ranged_reads_skip_validation() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", media_path()),
                request::headers(contains(("range", "bytes=4-8"))),
            ])
            .respond_with(
                status_code(206)
                    .append_header(
                        "x-goog-hash",
                        format!("crc32c={}", crc32c_to_base64(crc32c::crc32c(PAYLOAD))),
                    )
                    .body(&PAYLOAD[4..9]),
            ),
        );

        let client = test_client(server.url_str(""));
        let contents = client
            .read_object("my-bucket", "my-object")
            .with_read_offset(4)
            .with_read_limit(5)
            .send()
            .await?
            .all_bytes()
            .await?;
        assert_eq!(contents, bytes::Bytes::from_static(&PAYLOAD[4..9]));
        Ok(())
    }

    #[tokio::test]
    async fn transient_errors_are_retried() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", media_path()))
                .times(2)
                .respond_with(cycle![
                    status_code(429).body("slow down"),
                    status_code(200).body(PAYLOAD),
                ]),
        );

        let client = test_client(server.url_str(""));
        let contents = client
            .read_object("my-bucket", "my-object")
            .send()
            .await?
            .all_bytes()
            .await?;
        assert_eq!(contents, bytes::Bytes::from_static(PAYLOAD));
        Ok(())
    }

    #[test]
    fn hash_header_parsing() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            "x-goog-hash",
            http::HeaderValue::from_static("crc32c=ImIEBA==,md5=nhB9nTcrtoJr2B01QqQZ1g=="),
        );
        let checksums = parse_hash_header(&headers);
        assert_eq!(checksums.crc32c, Some(0x22620404));
        assert_eq!(checksums.md5_hash.map(|b| b.len()), Some(16));

        let empty = parse_hash_header(&http::HeaderMap::new());
        assert_eq!(empty, ObjectChecksums::default());
    }
}
