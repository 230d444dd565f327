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

//! [Metadata Service] credentials.
//!
//! Google Cloud environments such as Compute Engine, GKE, or Cloud Run
//! provide a local metadata service. The service provides access tokens for
//! the default service account of the VM (or pod), so applications can
//! authenticate without downloading secrets.
//!
//! These credentials are the last step of the [Application Default
//! Credentials] lookup, so most applications get them without naming this
//! module. Use the builder directly to customize scopes or the endpoint.
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
//! [Metadata Service]: https://cloud.google.com/compute/docs/metadata/overview

use crate::Result;
use crate::credentials::internal::to_credentials_error;
use crate::credentials::{Credentials, CredentialsProvider, DEFAULT_SCOPE};
use crate::errors;
use crate::headers_util::build_bearer_headers;
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use http::HeaderMap;
use http::header::HeaderValue;
use std::time::Duration;
use tokio::time::Instant;

const METADATA_FLAVOR: &str = "metadata-flavor";
const METADATA_FLAVOR_VALUE: &str = "Google";
const METADATA_ROOT: &str = "http://metadata.google.internal";

/// Creates [Credentials] backed by the metadata service.
///
/// # Example
/// ```
/// # use gcp_sdk_auth::credentials::mds::Builder;
/// let credentials = Builder::default()
///     .with_scopes(["https://www.googleapis.com/auth/cloud-platform.read-only"])
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct Builder {
    endpoint: Option<String>,
    quota_project_id: Option<String>,
    scopes: Option<Vec<String>>,
}

impl Builder {
    /// Sets the endpoint for these credentials.
    ///
    /// If not set, the credentials use `http://metadata.google.internal`.
    /// Mostly useful for testing.
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the [quota project] for these credentials.
    ///
    /// [quota project]: https://cloud.google.com/docs/quotas/quota-project
    pub fn with_quota_project_id<S: Into<String>>(mut self, quota_project_id: S) -> Self {
        self.quota_project_id = Some(quota_project_id.into());
        self
    }

    /// Sets the [scopes] requested for the access tokens.
    ///
    /// The metadata service issues tokens based on the requested scopes. If
    /// no scopes are specified, the credentials use the default
    /// `cloud-platform` scope.
    ///
    /// [scopes]: https://developers.google.com/identity/protocols/oauth2/scopes
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Returns [Credentials] with the configured settings.
    pub fn build(self) -> Credentials {
        let token_provider = MetadataTokenProvider {
            endpoint: self.endpoint.unwrap_or_else(|| METADATA_ROOT.to_string()),
            scopes: self
                .scopes
                .unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]),
            client: reqwest::Client::new(),
        };
        Credentials::from(MDSCredentials {
            quota_project_id: self.quota_project_id,
            token_provider: TokenCache::new(token_provider),
        })
    }
}

#[derive(Debug)]
struct MDSCredentials<T>
where
    T: TokenProvider,
{
    quota_project_id: Option<String>,
    token_provider: T,
}

#[async_trait::async_trait]
impl<T> CredentialsProvider for MDSCredentials<T>
where
    T: TokenProvider,
{
    async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token_provider.token().await?;
        build_bearer_headers(&token, &self.quota_project_id)
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    token_type: String,
}

#[derive(Debug)]
struct MetadataTokenProvider {
    endpoint: String,
    scopes: Vec<String>,
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn token(&self) -> Result<Token> {
        let request = self
            .client
            .get(format!(
                "{}/computeMetadata/v1/instance/service-accounts/default/token",
                self.endpoint
            ))
            .query(&[("scopes", self.scopes.join(","))])
            .header(
                METADATA_FLAVOR,
                HeaderValue::from_static(METADATA_FLAVOR_VALUE),
            );

        // Connection failures are always retryable: the metadata service is
        // local to the VM and may simply not be up yet.
        let response = request.send().await.map_err(errors::transient)?;
        if !response.status().is_success() {
            return Err(to_credentials_error("the metadata service token request", response).await);
        }
        let response = response
            .json::<MetadataTokenResponse>()
            .await
            .map_err(|e| errors::CredentialsError::new(!e.is_decode(), e))?;
        Ok(Token {
            token: response.access_token,
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|d| Instant::now() + Duration::from_secs(d)),
            metadata: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    type TestResult = anyhow::Result<()>;

    const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

    #[tokio::test]
    async fn token_success() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", TOKEN_PATH),
                request::headers(contains(("metadata-flavor", "Google"))),
                request::query(url_decoded(contains((
                    "scopes",
                    matches("cloud-platform")
                )))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "access_token": "mds-token",
                "expires_in": 3600,
                "token_type": "Bearer"
            }))),
        );

        let credentials = Builder::default()
            .with_endpoint(server.url_str(""))
            .build();
        let headers = credentials.headers().await?;
        let auth = headers.get(http::header::AUTHORIZATION).unwrap();
        assert_eq!(auth.to_str()?, "Bearer mds-token");
        assert!(auth.is_sensitive());
        Ok(())
    }

    #[tokio::test]
    async fn token_is_cached() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", TOKEN_PATH))
                .times(1)
                .respond_with(json_encoded(serde_json::json!({
                    "access_token": "mds-token",
                    "expires_in": 3600,
                    "token_type": "Bearer"
                }))),
        );

        let credentials = Builder::default()
            .with_endpoint(server.url_str(""))
            .build();
        let first = credentials.headers().await?;
        let second = credentials.headers().await?;
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn quota_project() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", TOKEN_PATH)).respond_with(
                json_encoded(serde_json::json!({
                    "access_token": "mds-token",
                    "token_type": "Bearer"
                })),
            ),
        );

        let credentials = Builder::default()
            .with_endpoint(server.url_str(""))
            .with_quota_project_id("my-quota-project")
            .build();
        let headers = credentials.headers().await?;
        assert_eq!(
            headers.get("x-goog-user-project").unwrap().to_str()?,
            "my-quota-project"
        );
        Ok(())
    }

    #[tokio::test]
    async fn service_error_maps_to_transient() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", TOKEN_PATH))
                .respond_with(status_code(503).body("unavailable")),
        );

        let credentials = Builder::default()
            .with_endpoint(server.url_str(""))
            .build();
        let err = credentials.headers().await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    async fn service_error_maps_to_permanent() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", TOKEN_PATH))
                .respond_with(status_code(404).body("no such service account")),
        );

        let credentials = Builder::default()
            .with_endpoint(server.url_str(""))
            .build();
        let err = credentials.headers().await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
        assert!(
            format!("{err}").contains("no such service account"),
            "{err}"
        );
    }
}
