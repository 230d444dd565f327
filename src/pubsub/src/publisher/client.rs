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

use crate::model::{ListTopicsResponse, PublishResponse, PubsubMessage, Topic};
use crate::publisher::batching_publisher::BatchingPublisherBuilder;
use crate::{Error, Result};
use gax::retry_policy::{Aip194Strict, RetryPolicyExt};
use gaxi::http as transport;
use std::sync::Arc;

/// The default host used by the service.
const DEFAULT_HOST: &str = "https://pubsub.googleapis.com";

/// Implements a client for the Pub/Sub API: topic administration and
/// publishing.
///
/// For high-throughput publishing use
/// [batching_publisher][Publisher::batching_publisher], which bundles
/// messages into fewer requests.
///
/// # Example
/// ```no_run
/// # use gcp_sdk_pubsub::client::Publisher;
/// # async fn sample() -> anyhow::Result<()> {
/// let client = Publisher::builder().build()?;
/// let topic = client.create_topic("projects/my-project/topics/my-topic").await?;
/// println!("created topic {}", topic.name);
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

#[derive(Debug)]
pub(crate) struct PublisherInner {
    pub(crate) client: reqwest::Client,
    pub(crate) cred: auth::credentials::Credentials,
    pub(crate) endpoint: String,
    pub(crate) options: gax::options::RequestOptions,
}

impl Publisher {
    /// Returns a builder for [Publisher].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a topic.
    ///
    /// # Parameters
    /// * `name` - the topic name, in `projects/{project}/topics/{topic}`
    ///   format.
    pub async fn create_topic<N: Into<String>>(&self, name: N) -> Result<Topic> {
        let name = name.into();
        let body = serde_json::json!({});
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .put(format!("{}/v1/{}", self.inner.endpoint, name))
                .json(&body);
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response.json::<Topic>().await.map_err(Error::deser)
        };
        // Creating the same topic twice fails with ALREADY_EXISTS, a retry
        // cannot clobber anything.
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Fetches the metadata of a topic.
    pub async fn get_topic<N: Into<String>>(&self, name: N) -> Result<Topic> {
        let name = name.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!("{}/v1/{}", self.inner.endpoint, name));
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response.json::<Topic>().await.map_err(Error::deser)
        };
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Lists the topics in a project.
    ///
    /// # Parameters
    /// * `project` - the project name, in `projects/{project}` format.
    /// * `page_token` - continue listing from a previous response, or
    ///   `None` for the first page.
    pub async fn list_topics<P: Into<String>>(
        &self,
        project: P,
        page_token: Option<String>,
    ) -> Result<ListTopicsResponse> {
        let project = project.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!("{}/v1/{}/topics", self.inner.endpoint, project));
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token.as_str())]);
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
                .json::<ListTopicsResponse>()
                .await
                .map_err(Error::deser)
        };
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Deletes a topic.
    pub async fn delete_topic<N: Into<String>>(&self, name: N) -> Result<()> {
        let name = name.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .delete(format!("{}/v1/{}", self.inner.endpoint, name));
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
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Publishes a batch of messages to a topic, without batching.
    ///
    /// Most applications should prefer
    /// [batching_publisher][Publisher::batching_publisher].
    pub async fn publish<N: Into<String>>(
        &self,
        topic: N,
        messages: Vec<PubsubMessage>,
    ) -> Result<PublishResponse> {
        let topic = topic.into();
        let body = serde_json::json!({"messages": messages});
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!("{}/v1/{}:publish", self.inner.endpoint, topic))
                .json(&body);
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response
                .json::<PublishResponse>()
                .await
                .map_err(Error::deser)
        };
        // Pub/Sub is an at-least-once system: a retried publish may result
        // in duplicate deliveries, which subscribers must tolerate anyway.
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Returns a builder for a batching publisher bound to `topic`.
    pub fn batching_publisher<N: Into<String>>(&self, topic: N) -> BatchingPublisherBuilder {
        BatchingPublisherBuilder::new(self.clone(), topic.into())
    }

    fn new(builder: ClientBuilder) -> Result<Self> {
        let client = reqwest::Client::new();
        let cred = match builder.credentials {
            Some(c) => c,
            None => auth::credentials::Builder::default()
                .build()
                .map_err(Error::other)?,
        };
        Ok(Self {
            inner: Arc::new(PublisherInner {
                client,
                cred,
                endpoint: builder.endpoint.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                options: builder.options,
            }),
        })
    }
}

impl PublisherInner {
    pub(crate) async fn apply_auth_headers(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        let headers = self
            .cred
            .headers()
            .await
            .map_err(Error::authentication)?;
        Ok(builder.headers(headers))
    }
}

/// A builder for [Publisher].
pub struct ClientBuilder {
    endpoint: Option<String>,
    credentials: Option<auth::credentials::Credentials>,
    options: gax::options::RequestOptions,
}

impl ClientBuilder {
    pub(crate) fn new() -> Self {
        Self {
            endpoint: None,
            credentials: None,
            options: gax::options::RequestOptions::new(
                Aip194Strict.with_time_limit(std::time::Duration::from_secs(60)),
            ),
        }
    }

    /// Creates the client.
    pub fn build(self) -> Result<Publisher> {
        Publisher::new(self)
    }

    /// Sets the endpoint. Mostly useful for emulators and tests.
    pub fn with_endpoint<V: Into<String>>(mut self, v: V) -> Self {
        self.endpoint = Some(v.into());
        self
    }

    /// Configures the authentication credentials.
    pub fn with_credentials<V: Into<auth::credentials::Credentials>>(mut self, v: V) -> Self {
        self.credentials = Some(v.into());
        self
    }

    /// Configures the retry policy.
    pub fn with_retry_policy<V: Into<gax::retry_policy::RetryPolicyArg>>(mut self, v: V) -> Self {
        self.options.set_retry_policy(v);
        self
    }

    /// Configures the retry backoff policy.
    pub fn with_backoff_policy<V: Into<gax::backoff_policy::BackoffPolicyArg>>(
        mut self,
        v: V,
    ) -> Self {
        self.options.set_backoff_policy(v);
        self
    }
}
