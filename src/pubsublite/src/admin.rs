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

use crate::model::{ListTopicsResponse, Subscription, Topic};
use crate::{Error, Result};
use gax::retry_policy::{Aip194Strict, RetryPolicyExt};
use gaxi::http as transport;
use std::sync::Arc;

/// Implements a client for the Pub/Sub Lite admin API.
///
/// Pub/Sub Lite is a zonal service: the admin endpoint is regional, and
/// every resource name carries its location. The client requires the region
/// at construction time.
///
/// # Example
/// ```no_run
/// # use gcp_sdk_pubsublite::client::AdminClient;
/// # use gcp_sdk_pubsublite::model::{PartitionConfig, Topic};
/// # async fn sample() -> anyhow::Result<()> {
/// let client = AdminClient::builder("us-central1").build()?;
/// let topic = client
///     .create_topic(
///         "projects/my-project/locations/us-central1-a",
///         "my-topic",
///         Topic::new().set_partition_config(PartitionConfig::new(2).set_capacity(4, 8)),
///     )
///     .await?;
/// println!("created topic {}", topic.name);
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct AdminClient {
    inner: Arc<AdminInner>,
}

#[derive(Debug)]
struct AdminInner {
    client: reqwest::Client,
    cred: auth::credentials::Credentials,
    endpoint: String,
    options: gax::options::RequestOptions,
}

impl AdminClient {
    /// Returns a builder for [AdminClient], targeting the given region.
    pub fn builder<R: Into<String>>(region: R) -> ClientBuilder {
        ClientBuilder::new(region.into())
    }

    /// Creates a topic.
    ///
    /// # Parameters
    /// * `parent` - in `projects/{project}/locations/{location}` format.
    /// * `topic_id` - the short topic name.
    /// * `topic` - the partition and retention configuration.
    pub async fn create_topic<P, T>(&self, parent: P, topic_id: T, topic: Topic) -> Result<Topic>
    where
        P: Into<String>,
        T: Into<String>,
    {
        let parent = parent.into();
        let topic_id = topic_id.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!(
                    "{}/v1/admin/{}/topics",
                    self.inner.endpoint, parent
                ))
                .query(&[("topicId", topic_id.as_str())])
                .json(&topic);
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

    /// Fetches the configuration of a topic.
    pub async fn get_topic<N: Into<String>>(&self, name: N) -> Result<Topic> {
        let name = name.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!("{}/v1/admin/{}", self.inner.endpoint, name));
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

    /// Lists the topics under a location.
    pub async fn list_topics<P: Into<String>>(
        &self,
        parent: P,
        page_token: Option<String>,
    ) -> Result<ListTopicsResponse> {
        let parent = parent.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!(
                    "{}/v1/admin/{}/topics",
                    self.inner.endpoint, parent
                ));
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
                .delete(format!("{}/v1/admin/{}", self.inner.endpoint, name));
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

    /// Creates a subscription.
    ///
    /// # Parameters
    /// * `parent` - in `projects/{project}/locations/{location}` format.
    /// * `subscription_id` - the short subscription name.
    /// * `subscription` - the topic and delivery configuration.
    pub async fn create_subscription<P, S>(
        &self,
        parent: P,
        subscription_id: S,
        subscription: Subscription,
    ) -> Result<Subscription>
    where
        P: Into<String>,
        S: Into<String>,
    {
        let parent = parent.into();
        let subscription_id = subscription_id.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!(
                    "{}/v1/admin/{}/subscriptions",
                    self.inner.endpoint, parent
                ))
                .query(&[("subscriptionId", subscription_id.as_str())])
                .json(&subscription);
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response.json::<Subscription>().await.map_err(Error::deser)
        };
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Fetches the configuration of a subscription.
    pub async fn get_subscription<N: Into<String>>(&self, name: N) -> Result<Subscription> {
        let name = name.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!("{}/v1/admin/{}", self.inner.endpoint, name));
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response.json::<Subscription>().await.map_err(Error::deser)
        };
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Deletes a subscription.
    pub async fn delete_subscription<N: Into<String>>(&self, name: N) -> Result<()> {
        let name = name.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .delete(format!("{}/v1/admin/{}", self.inner.endpoint, name));
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
}

impl AdminInner {
    async fn apply_auth_headers(
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

/// A builder for [AdminClient].
pub struct ClientBuilder {
    region: String,
    endpoint: Option<String>,
    credentials: Option<auth::credentials::Credentials>,
    options: gax::options::RequestOptions,
}

impl ClientBuilder {
    fn new(region: String) -> Self {
        Self {
            region,
            endpoint: None,
            credentials: None,
            options: gax::options::RequestOptions::new(
                Aip194Strict.with_time_limit(std::time::Duration::from_secs(60)),
            ),
        }
    }

    /// Creates the client.
    pub fn build(self) -> Result<AdminClient> {
        let cred = match self.credentials {
            Some(c) => c,
            None => auth::credentials::Builder::default()
                .build()
                .map_err(Error::other)?,
        };
        Ok(AdminClient {
            inner: Arc::new(AdminInner {
                client: reqwest::Client::new(),
                cred,
                endpoint: self
                    .endpoint
                    .unwrap_or_else(|| format!("https://{}-pubsublite.googleapis.com", self.region)),
                options: self.options,
            }),
        })
    }

    /// Overrides the endpoint derived from the region. Mostly useful for
    /// tests.
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartitionConfig;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    const PARENT: &str = "projects/my-project/locations/us-central1-a";

    fn test_client(endpoint: String) -> AdminClient {
        AdminClient::builder("us-central1")
            .with_endpoint(endpoint)
            .with_credentials(auth::credentials::testing::test_credentials())
            .build()
            .expect("test client creation succeeds")
    }

    #[tokio::test]
    async fn create_topic() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", format!("/v1/admin/{PARENT}/topics")),
                request::query(url_decoded(contains(("topicId", "my-topic")))),
                request::body(json_decoded(eq(serde_json::json!({
                    "name": "",
                    "partitionConfig": {
                        "count": "2",
                        "capacity": {"publishMibPerSec": 4, "subscribeMibPerSec": 8}
                    }
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "name": format!("{PARENT}/topics/my-topic"),
                "partitionConfig": {"count": "2"}
            }))),
        );

        let client = test_client(server.url_str(""));
        let topic = client
            .create_topic(
                PARENT,
                "my-topic",
                Topic::new().set_partition_config(PartitionConfig::new(2).set_capacity(4, 8)),
            )
            .await?;
        assert_eq!(topic.name, format!("{PARENT}/topics/my-topic"));
        Ok(())
    }

    #[tokio::test]
    async fn get_and_delete_topic() -> anyhow::Result<()> {
        let name = format!("{PARENT}/topics/my-topic");
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/v1/admin/{name}")))
                .respond_with(json_encoded(serde_json::json!({"name": name}))),
        );
        server.expect(
            Expectation::matching(request::method_path("DELETE", format!("/v1/admin/{name}")))
                .respond_with(json_encoded(serde_json::json!({}))),
        );

        let client = test_client(server.url_str(""));
        let topic = client.get_topic(&name).await?;
        assert_eq!(topic.name, name);
        client.delete_topic(&name).await?;
        Ok(())
    }

    #[tokio::test]
    async fn create_subscription() -> anyhow::Result<()> {
        let topic = format!("{PARENT}/topics/my-topic");
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", format!("/v1/admin/{PARENT}/subscriptions")),
                request::query(url_decoded(contains(("subscriptionId", "my-sub")))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "name": format!("{PARENT}/subscriptions/my-sub"),
                "topic": topic,
            }))),
        );

        let client = test_client(server.url_str(""));
        let sub = client
            .create_subscription(PARENT, "my-sub", Subscription::new(&topic))
            .await?;
        assert_eq!(sub.topic, topic);
        Ok(())
    }

    #[tokio::test]
    async fn missing_topic_is_not_found() {
        let name = format!("{PARENT}/topics/nope");
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/v1/admin/{name}")))
                .respond_with(status_code(404).body(
                    r#"{"error": {"code": 404, "message": "no topic", "status": "NOT_FOUND"}}"#,
                )),
        );

        let client = test_client(server.url_str(""));
        let err = client.get_topic(&name).await.unwrap_err();
        assert_eq!(
            err.status().map(|s| s.code),
            Some(gax::error::rpc::Code::NotFound)
        );
    }
}
