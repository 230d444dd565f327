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

use super::request_options::RequestOptions;
use crate::Error;
use crate::builder::{
    ComposeObject, DeleteObject, GetObject, InsertObject, ListObjects, ParallelUpload, ReadObject,
    UploadObject,
};
use crate::storage::streaming_source::{Payload, Seek, StreamingSource};
use std::sync::Arc;

/// The default host used by the service.
const DEFAULT_HOST: &str = "https://storage.googleapis.com";

/// Implements a client for the Cloud Storage API.
///
/// # Example
/// ```no_run
/// # use gcp_sdk_storage::client::Storage;
/// # fn sample() -> anyhow::Result<()> {
/// let client = Storage::builder().build()?;
/// // use `client` to make requests to Cloud Storage.
/// # Ok(()) }
/// ```
///
/// # Configuration
///
/// To configure `Storage` use the `with_*` methods in the type returned by
/// [builder()][Storage::builder]. The default configuration should work for
/// most applications. Common configuration changes include
///
/// * [with_endpoint()][ClientBuilder::with_endpoint]: by default this client
///   uses the global endpoint (`https://storage.googleapis.com`).
/// * [with_credentials()][ClientBuilder::with_credentials]: by default this
///   client uses [Application Default Credentials].
///
/// # Pooling and Cloning
///
/// `Storage` holds a connection pool internally, it is advised to create one
/// and then reuse it. You do not need to wrap `Storage` in an
/// [Rc](std::rc::Rc) or [Arc](std::sync::Arc) to reuse it, because it
/// already uses an `Arc` internally.
///
/// [Application Default Credentials]: https://cloud.google.com/docs/authentication#adc
#[derive(Clone, Debug)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

#[derive(Debug)]
pub(crate) struct StorageInner {
    pub(crate) client: reqwest::Client,
    pub(crate) cred: auth::credentials::Credentials,
    pub(crate) endpoint: String,
    pub(crate) options: RequestOptions,
}

impl Storage {
    /// Returns a builder for [Storage].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Uploads an object from a local buffer in a single request.
    ///
    /// Use this function for small objects, or objects whose contents are
    /// already in memory. The client library computes the CRC32C checksum
    /// of the payload and compares it against the checksum reported by the
    /// service when the object is finalized.
    ///
    /// # Example
    /// ```no_run
    /// # use gcp_sdk_storage::client::Storage;
    /// # async fn sample(client: &Storage) -> anyhow::Result<()> {
    /// let object = client
    ///     .insert_object("my-bucket", "my-object", "hello world")
    ///     .send()
    ///     .await?;
    /// println!("object generation={}", object.generation);
    /// # Ok(()) }
    /// ```
    pub fn insert_object<B, O, P>(&self, bucket: B, object: O, payload: P) -> InsertObject
    where
        B: Into<String>,
        O: Into<String>,
        P: Into<bytes::Bytes>,
    {
        InsertObject::new(self.inner.clone(), bucket, object, payload.into())
    }

    /// Uploads an object from a streaming source, resuming after transient
    /// failures.
    ///
    /// The client library starts a [resumable upload] session, sends the
    /// data in chunks, and queries the persisted offset to resume after
    /// transient failures. The source must implement [Seek] so the upload
    /// can replay data the service has not persisted.
    ///
    /// # Example
    /// ```no_run
    /// # use gcp_sdk_storage::client::Storage;
    /// # async fn sample(client: &Storage) -> anyhow::Result<()> {
    /// let file = tokio::fs::File::open("large-file.bin").await?;
    /// let object = client
    ///     .upload_object("my-bucket", "large-object", file)
    ///     .send()
    ///     .await?;
    /// println!("object size={}", object.size);
    /// # Ok(()) }
    /// ```
    ///
    /// [resumable upload]: https://cloud.google.com/storage/docs/resumable-uploads
    pub fn upload_object<B, O, T, P>(&self, bucket: B, object: O, payload: T) -> UploadObject<P>
    where
        B: Into<String>,
        O: Into<String>,
        T: Into<Payload<P>>,
        Payload<P>: StreamingSource + Seek + Send + Sync,
    {
        UploadObject::new(self.inner.clone(), bucket, object, payload.into())
    }

    /// Uploads an object in parallel shards.
    ///
    /// The returned builder starts N independent shard uploads. Once every
    /// shard completes, the shards are composed (server side) into the
    /// final object, and the temporary shard objects are deleted.
    ///
    /// # Example
    /// ```no_run
    /// # use gcp_sdk_storage::client::Storage;
    /// # async fn sample(client: &Storage) -> anyhow::Result<()> {
    /// let (mut writers, handle) = client
    ///     .parallel_upload_object("my-bucket", "my-object")
    ///     .with_shard_count(4)
    ///     .start();
    /// let tasks = writers.drain(..).enumerate().map(|(i, mut w)| tokio::spawn(async move {
    ///     w.write(vec![i as u8; 1024]);
    ///     w.finish().await
    /// }));
    /// for t in tasks { t.await??; }
    /// let object = handle.join().await?;
    /// println!("composed object size={}", object.size);
    /// # Ok(()) }
    /// ```
    pub fn parallel_upload_object<B, O>(&self, bucket: B, object: O) -> ParallelUpload
    where
        B: Into<String>,
        O: Into<String>,
    {
        ParallelUpload::new(self.inner.clone(), bucket, object)
    }

    /// Downloads an object into a buffer.
    ///
    /// # Example
    /// ```no_run
    /// # use gcp_sdk_storage::client::Storage;
    /// # async fn sample(client: &Storage) -> anyhow::Result<()> {
    /// let contents = client
    ///     .read_object("my-bucket", "my-object")
    ///     .send()
    ///     .await?
    ///     .all_bytes()
    ///     .await?;
    /// println!("object contents={contents:?}");
    /// # Ok(()) }
    /// ```
    pub fn read_object<B, O>(&self, bucket: B, object: O) -> ReadObject
    where
        B: Into<String>,
        O: Into<String>,
    {
        ReadObject::new(self.inner.clone(), bucket, object)
    }

    /// Retrieves the metadata of an object.
    pub fn get_object<B, O>(&self, bucket: B, object: O) -> GetObject
    where
        B: Into<String>,
        O: Into<String>,
    {
        GetObject::new(self.inner.clone(), bucket, object)
    }

    /// Deletes an object.
    pub fn delete_object<B, O>(&self, bucket: B, object: O) -> DeleteObject
    where
        B: Into<String>,
        O: Into<String>,
    {
        DeleteObject::new(self.inner.clone(), bucket, object)
    }

    /// Lists the objects in a bucket.
    pub fn list_objects<B>(&self, bucket: B) -> ListObjects
    where
        B: Into<String>,
    {
        ListObjects::new(self.inner.clone(), bucket)
    }

    /// Concatenates existing objects into a new object.
    ///
    /// The sources must be in the same bucket as the destination. At most
    /// 32 sources can be composed in a single request.
    pub fn compose_object<B, O, I, S>(&self, bucket: B, destination: O, sources: I) -> ComposeObject
    where
        B: Into<String>,
        O: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<crate::model::ComposeSourceObject>,
    {
        ComposeObject::new(
            self.inner.clone(),
            bucket,
            destination,
            sources.into_iter().map(|s| s.into()).collect(),
        )
    }

    #[cfg(test)]
    pub(crate) fn inner_for_tests(&self) -> Arc<StorageInner> {
        self.inner.clone()
    }

    fn new(builder: ClientBuilder) -> crate::Result<Self> {
        // Automatic decompression would break checksum validation, the
        // client requests (and expects) the raw object data.
        let client = reqwest::Client::builder()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .no_zstd()
            .build()
            .map_err(Error::io)?;
        let cred = match builder.credentials {
            Some(c) => c,
            None => auth::credentials::Builder::default()
                .build()
                .map_err(Error::other)?,
        };
        let inner = Arc::new(StorageInner {
            client,
            cred,
            endpoint: builder.endpoint.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            options: builder.default_options,
        });
        Ok(Self { inner })
    }
}

impl StorageInner {
    /// Applies the authentication headers to a request builder.
    pub(crate) async fn apply_auth_headers(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> crate::Result<reqwest::RequestBuilder> {
        let headers = self
            .cred
            .headers()
            .await
            .map_err(Error::authentication)?;
        Ok(builder.headers(headers))
    }
}

/// A builder for [Storage].
///
/// ```no_run
/// # use gcp_sdk_storage::client::Storage;
/// # fn sample() -> anyhow::Result<()> {
/// let client = Storage::builder()
///     .with_endpoint("https://storage.googleapis.com")
///     .build()?;
/// # Ok(()) }
/// ```
pub struct ClientBuilder {
    endpoint: Option<String>,
    credentials: Option<auth::credentials::Credentials>,
    default_options: RequestOptions,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            endpoint: None,
            credentials: None,
            default_options: RequestOptions::new(),
        }
    }

    /// Creates the client.
    pub fn build(self) -> crate::Result<Storage> {
        Storage::new(self)
    }

    /// Sets the endpoint.
    ///
    /// Applications using regional endpoints, private access, or a local
    /// emulator may want to override the default.
    pub fn with_endpoint<V: Into<String>>(mut self, v: V) -> Self {
        self.endpoint = Some(v.into());
        self
    }

    /// Configures the authentication credentials.
    ///
    /// By default the client uses [Application Default Credentials]. Use
    /// this method with the builders in [auth::credentials] to change that.
    ///
    /// [Application Default Credentials]: https://cloud.google.com/docs/authentication#adc
    pub fn with_credentials<V: Into<auth::credentials::Credentials>>(mut self, v: V) -> Self {
        self.credentials = Some(v.into());
        self
    }

    /// Configures the retry policy.
    ///
    /// # Example
    /// ```no_run
    /// # use gcp_sdk_storage::client::Storage;
    /// # fn sample() -> anyhow::Result<()> {
    /// use gax::retry_policy::RetryPolicyExt;
    /// use gcp_sdk_storage::retry_policy::RetryableErrors;
    /// let client = Storage::builder()
    ///     .with_retry_policy(RetryableErrors.with_attempt_limit(3))
    ///     .build()?;
    /// # Ok(()) }
    /// ```
    pub fn with_retry_policy<V: Into<gax::retry_policy::RetryPolicyArg>>(mut self, v: V) -> Self {
        self.default_options.retry.set_retry_policy(v);
        self
    }

    /// Configures the retry backoff policy.
    pub fn with_backoff_policy<V: Into<gax::backoff_policy::BackoffPolicyArg>>(
        mut self,
        v: V,
    ) -> Self {
        self.default_options.retry.set_backoff_policy(v);
        self
    }

    /// Configures the retry throttler.
    ///
    /// Advanced applications may want to configure a retry throttler to
    /// avoid retry storms, see [gax::retry_throttler] for details.
    pub fn with_retry_throttler<V: Into<gax::retry_throttler::RetryThrottlerArg>>(
        mut self,
        v: V,
    ) -> Self {
        self.default_options.retry.set_retry_throttler(v);
        self
    }

    /// Changes the chunk size used by resumable uploads.
    ///
    /// The value is rounded up to the next 256 KiB boundary, as required by
    /// the resumable upload protocol.
    pub fn with_upload_chunk_size(mut self, size: usize) -> Self {
        self.default_options.set_upload_chunk_size(size);
        self
    }
}

/// The set of characters that are percent encoded.
///
/// This set is defined at
/// <https://cloud.google.com/storage/docs/request-endpoints#encoding>: encode
/// `!`, `#`, `$`, `&`, `'`, `(`, `)`, `*`, `+`, `,`, `/`, `:`, `;`, `=`,
/// `?`, `@`, `[`, `]`, and space characters when they appear in the object
/// name or the query string of a request URL.
const ENCODED_CHARS: percent_encoding::AsciiSet = percent_encoding::CONTROLS
    .add(b'!')
    .add(b'#')
    .add(b'$')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b']')
    .add(b' ');

/// Percent encodes an object name for use in a request path.
pub(crate) fn enc(value: &str) -> String {
    percent_encoding::utf8_percent_encode(value, &ENCODED_CHARS).to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    /// Used by the request builder tests: no auth, short backoffs.
    pub(crate) fn test_client(endpoint: String) -> Storage {
        Storage::builder()
            .with_endpoint(endpoint)
            .with_credentials(auth::credentials::testing::test_credentials())
            .with_backoff_policy(
                gax::exponential_backoff::ExponentialBackoffBuilder::new()
                    .with_initial_delay(Duration::from_millis(1))
                    .with_maximum_delay(Duration::from_millis(2))
                    .clamp(),
            )
            .build()
            .expect("test client creation succeeds")
    }

    #[test]
    fn object_names_are_percent_encoded() {
        assert_eq!(enc("plain-name"), "plain-name");
        assert_eq!(enc("folder/object"), "folder%2Fobject");
        assert_eq!(enc("with space"), "with%20space");
        assert_eq!(enc("q?&="), "q%3F%26%3D");
    }

    #[tokio::test]
    async fn auth_errors_are_reported() {
        let client = Storage::builder()
            .with_endpoint("http://localhost:1")
            .with_credentials(auth::credentials::testing::error_credentials(false))
            .build()
            .unwrap();
        let err = client
            .get_object("bucket", "object")
            .send()
            .await
            .unwrap_err();
        assert!(err.is_authentication(), "{err:?}");
    }
}
