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

use super::client::StorageInner;
use gaxi::http as transport;
use crate::model::ListObjectsResponse;
use crate::{Error, Result};
use std::sync::Arc;

/// Lists the objects in a bucket.
///
/// The request returns a single page; pass
/// [next_page_token][ListObjectsResponse::next_page_token] to
/// [with_page_token][ListObjects::with_page_token] to fetch the following
/// page.
///
/// Created via [Storage::list_objects][crate::client::Storage::list_objects].
pub struct ListObjects {
    inner: Arc<StorageInner>,
    bucket: String,
    prefix: Option<String>,
    delimiter: Option<String>,
    page_token: Option<String>,
    max_results: Option<i32>,
    options: gax::options::RequestOptions,
}

impl ListObjects {
    pub(crate) fn new<B>(inner: Arc<StorageInner>, bucket: B) -> Self
    where
        B: Into<String>,
    {
        let options = inner.options.retry.clone();
        Self {
            inner,
            bucket: bucket.into(),
            prefix: None,
            delimiter: None,
            page_token: None,
            max_results: None,
            options,
        }
    }

    /// Restricts the results to objects whose names begin with this prefix.
    pub fn with_prefix<S: Into<String>>(mut self, v: S) -> Self {
        self.prefix = Some(v.into());
        self
    }

    /// Groups object names by the given delimiter, returning the groups as
    /// [prefixes][ListObjectsResponse::prefixes].
    pub fn with_delimiter<S: Into<String>>(mut self, v: S) -> Self {
        self.delimiter = Some(v.into());
        self
    }

    /// Continues listing from a previously returned page token.
    pub fn with_page_token<S: Into<String>>(mut self, v: S) -> Self {
        self.page_token = Some(v.into());
        self
    }

    /// Limits the number of items per page.
    pub fn with_max_results(mut self, v: i32) -> Self {
        self.max_results = Some(v);
        self
    }

    /// Changes the retry policy for this request.
    pub fn with_retry_policy<V: Into<gax::retry_policy::RetryPolicyArg>>(mut self, v: V) -> Self {
        self.options.set_retry_policy(v);
        self
    }

    /// Sends the request.
    pub async fn send(self) -> Result<ListObjectsResponse> {
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self.inner.client.get(format!(
                "{}/storage/v1/b/{}/o",
                self.inner.endpoint, self.bucket
            ));
            for (name, value) in [
                ("prefix", self.prefix.as_deref()),
                ("delimiter", self.delimiter.as_deref()),
                ("pageToken", self.page_token.as_deref()),
            ] {
                if let Some(v) = value {
                    builder = builder.query(&[(name, v)]);
                }
            }
            if let Some(v) = self.max_results {
                builder = builder.query(&[("maxResults", v.to_string())]);
            }
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response
                .json::<ListObjectsResponse>()
                .await
                .map_err(Error::deser)
        };
        transport::execute_retry(&self.options, true, attempt).await
    }
}
