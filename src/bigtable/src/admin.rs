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

use crate::model::{ColumnFamily, ListTablesResponse, Table};
use crate::{Error, Result};
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use gax::retry_policy::{Aip194Strict, RetryPolicyExt};
use gaxi::http as transport;
use std::collections::HashMap;
use std::sync::Arc;

/// The default host used by the service.
const DEFAULT_HOST: &str = "https://bigtableadmin.googleapis.com";

/// Implements a client for the Bigtable table-admin API.
///
/// # Example
/// ```no_run
/// # use gcp_sdk_bigtable::client::TableAdmin;
/// # async fn sample() -> anyhow::Result<()> {
/// let client = TableAdmin::builder().build()?;
/// let tables = client
///     .list_tables("projects/my-project/instances/my-instance", None)
///     .await?;
/// for table in tables.tables {
///     println!("{}", table.name);
/// }
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct TableAdmin {
    inner: Arc<TableAdminInner>,
}

#[derive(Debug)]
pub(crate) struct TableAdminInner {
    client: reqwest::Client,
    cred: auth::credentials::Credentials,
    endpoint: String,
    options: gax::options::RequestOptions,
}

impl TableAdmin {
    /// Returns a builder for [TableAdmin].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a table in an instance.
    ///
    /// # Parameters
    /// * `parent` - in `projects/{project}/instances/{instance}` format.
    /// * `table_id` - the short table name.
    pub fn create_table<P, T>(&self, parent: P, table_id: T) -> CreateTable
    where
        P: Into<String>,
        T: Into<String>,
    {
        CreateTable {
            inner: self.inner.clone(),
            parent: parent.into(),
            table_id: table_id.into(),
            column_families: HashMap::new(),
            split_keys: Vec::new(),
        }
    }

    /// Fetches the metadata of a table.
    pub async fn get_table<N: Into<String>>(&self, name: N) -> Result<Table> {
        let name = name.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!("{}/v2/{}", self.inner.endpoint, name));
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response.json::<Table>().await.map_err(Error::deser)
        };
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Lists the tables in an instance.
    pub async fn list_tables<P: Into<String>>(
        &self,
        parent: P,
        page_token: Option<String>,
    ) -> Result<ListTablesResponse> {
        let parent = parent.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .get(format!("{}/v2/{}/tables", self.inner.endpoint, parent));
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
                .json::<ListTablesResponse>()
                .await
                .map_err(Error::deser)
        };
        transport::execute_retry(&self.inner.options, true, attempt).await
    }

    /// Permanently deletes a table and all of its data.
    pub async fn delete_table<N: Into<String>>(&self, name: N) -> Result<()> {
        let name = name.into();
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .delete(format!("{}/v2/{}", self.inner.endpoint, name));
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

    /// Deletes a range of rows from a table.
    pub fn drop_row_range<N: Into<String>>(&self, name: N) -> DropRowRange {
        DropRowRange {
            inner: self.inner.clone(),
            name: name.into(),
            row_key_prefix: None,
            delete_all: false,
        }
    }

    fn new(builder: ClientBuilder) -> Result<Self> {
        let cred = match builder.credentials {
            Some(c) => c,
            None => auth::credentials::Builder::default()
                .build()
                .map_err(Error::other)?,
        };
        Ok(Self {
            inner: Arc::new(TableAdminInner {
                client: reqwest::Client::new(),
                cred,
                endpoint: builder.endpoint.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                options: builder.options,
            }),
        })
    }
}

impl TableAdminInner {
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

/// Creates a table.
///
/// Created via [TableAdmin::create_table].
pub struct CreateTable {
    inner: Arc<TableAdminInner>,
    parent: String,
    table_id: String,
    column_families: HashMap<String, ColumnFamily>,
    split_keys: Vec<bytes::Bytes>,
}

impl CreateTable {
    /// Adds a column family to the new table.
    pub fn with_column_family<S: Into<String>>(mut self, id: S, family: ColumnFamily) -> Self {
        self.column_families.insert(id.into(), family);
        self
    }

    /// Pre-splits the table at the given row keys.
    pub fn with_split_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<bytes::Bytes>,
    {
        self.split_keys = keys.into_iter().map(|k| k.into()).collect();
        self
    }

    /// Sends the request.
    pub async fn send(self) -> Result<Table> {
        let splits = self
            .split_keys
            .iter()
            .map(|k| serde_json::json!({"key": BASE64_STANDARD.encode(k)}))
            .collect::<Vec<_>>();
        let body = serde_json::json!({
            "tableId": self.table_id,
            "table": Table {
                column_families: self.column_families.clone(),
                ..Table::default()
            },
            "initialSplits": splits,
        });
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!(
                    "{}/v2/{}/tables",
                    self.inner.endpoint, self.parent
                ))
                .json(&body);
            if let Some(d) = timeout {
                builder = builder.timeout(d);
            }
            let builder = self.inner.apply_auth_headers(builder).await?;
            let response = builder.send().await.map_err(transport::map_send_error)?;
            if !response.status().is_success() {
                return transport::to_http_error(response).await;
            }
            response.json::<Table>().await.map_err(Error::deser)
        };
        // Creating the same table twice fails with ALREADY_EXISTS, a retry
        // cannot clobber anything.
        transport::execute_retry(&self.inner.options, true, attempt).await
    }
}

/// Deletes a range of rows from a table.
///
/// Created via [TableAdmin::drop_row_range].
pub struct DropRowRange {
    inner: Arc<TableAdminInner>,
    name: String,
    row_key_prefix: Option<bytes::Bytes>,
    delete_all: bool,
}

impl DropRowRange {
    /// Deletes all rows whose keys start with this prefix.
    pub fn with_row_key_prefix<K: Into<bytes::Bytes>>(mut self, prefix: K) -> Self {
        self.row_key_prefix = Some(prefix.into());
        self.delete_all = false;
        self
    }

    /// Deletes every row in the table.
    pub fn with_delete_all(mut self) -> Self {
        self.delete_all = true;
        self.row_key_prefix = None;
        self
    }

    /// Sends the request.
    pub async fn send(self) -> Result<()> {
        let body = match (&self.row_key_prefix, self.delete_all) {
            (Some(prefix), _) => {
                serde_json::json!({"rowKeyPrefix": BASE64_STANDARD.encode(prefix)})
            }
            (None, true) => serde_json::json!({"deleteAllDataFromTable": true}),
            (None, false) => {
                return Err(Error::binding(
                    "drop_row_range requires a row key prefix or delete_all",
                ));
            }
        };
        let attempt = async |timeout: Option<std::time::Duration>| {
            let mut builder = self
                .inner
                .client
                .post(format!(
                    "{}/v2/{}:dropRowRange",
                    self.inner.endpoint, self.name
                ))
                .json(&body);
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
        // Dropping the same range twice deletes nothing new.
        transport::execute_retry(&self.inner.options, true, attempt).await
    }
}

/// A builder for [TableAdmin].
pub struct ClientBuilder {
    endpoint: Option<String>,
    credentials: Option<auth::credentials::Credentials>,
    options: gax::options::RequestOptions,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            endpoint: None,
            credentials: None,
            options: gax::options::RequestOptions::new(
                Aip194Strict.with_time_limit(std::time::Duration::from_secs(60)),
            ),
        }
    }

    /// Creates the client.
    pub fn build(self) -> Result<TableAdmin> {
        TableAdmin::new(self)
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GcRule;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    const PARENT: &str = "projects/my-project/instances/my-instance";

    fn test_client(endpoint: String) -> TableAdmin {
        TableAdmin::builder()
            .with_endpoint(endpoint)
            .with_credentials(auth::credentials::testing::test_credentials())
            .build()
            .expect("test client creation succeeds")
    }

    #[tokio::test]
    async fn create_table_with_families() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", format!("/v2/{PARENT}/tables")),
                request::body(json_decoded(eq(serde_json::json!({
                    "tableId": "my-table",
                    "table": {
                        "name": "",
                        "columnFamilies": {
                            "cf": {"gcRule": {"maxNumVersions": 3}}
                        }
                    },
                    "initialSplits": []
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "name": format!("{PARENT}/tables/my-table"),
                "columnFamilies": {"cf": {"gcRule": {"maxNumVersions": 3}}}
            }))),
        );

        let client = test_client(server.url_str(""));
        let table = client
            .create_table(PARENT, "my-table")
            .with_column_family("cf", ColumnFamily::new().set_gc_rule(GcRule::MaxNumVersions(3)))
            .send()
            .await?;
        assert_eq!(table.name, format!("{PARENT}/tables/my-table"));
        Ok(())
    }

    #[tokio::test]
    async fn create_table_already_exists() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", format!("/v2/{PARENT}/tables")))
                .respond_with(status_code(409).body(
                    r#"{"error": {"code": 409, "message": "exists", "status": "ALREADY_EXISTS"}}"#,
                )),
        );

        let client = test_client(server.url_str(""));
        let err = client
            .create_table(PARENT, "my-table")
            .send()
            .await
            .unwrap_err();
        assert_eq!(
            err.status().map(|s| s.code),
            Some(gax::error::rpc::Code::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn get_list_delete() -> anyhow::Result<()> {
        let name = format!("{PARENT}/tables/my-table");
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/v2/{name}")))
                .respond_with(json_encoded(serde_json::json!({"name": name}))),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/v2/{PARENT}/tables")))
                .respond_with(json_encoded(serde_json::json!({
                    "tables": [{"name": name}],
                    "nextPageToken": "token-1"
                }))),
        );
        server.expect(
            Expectation::matching(request::method_path("DELETE", format!("/v2/{name}")))
                .respond_with(json_encoded(serde_json::json!({}))),
        );

        let client = test_client(server.url_str(""));
        let table = client.get_table(&name).await?;
        assert_eq!(table.name, name);
        let page = client.list_tables(PARENT, None).await?;
        assert_eq!(page.tables.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("token-1"));
        client.delete_table(&name).await?;
        Ok(())
    }

    #[tokio::test]
    async fn drop_row_range_by_prefix() -> anyhow::Result<()> {
        let name = format!("{PARENT}/tables/my-table");
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", format!("/v2/{name}:dropRowRange")),
                request::body(json_decoded(eq(serde_json::json!({
                    "rowKeyPrefix": "dXNlci0="
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({}))),
        );

        let client = test_client(server.url_str(""));
        client
            .drop_row_range(&name)
            .with_row_key_prefix("user-")
            .send()
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn drop_row_range_requires_a_target() {
        let server = Server::run();
        let client = test_client(server.url_str(""));
        let err = client
            .drop_row_range("projects/p/instances/i/tables/t")
            .send()
            .await
            .unwrap_err();
        assert!(err.is_binding(), "{err:?}");
    }
}
