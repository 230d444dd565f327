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

//! Impersonated service account credentials.
//!
//! [Service account impersonation] lets a principal (the source credentials)
//! obtain short-lived access tokens for a target service account, without
//! holding that account's keys. The credential calls the IAM Credentials
//! `generateAccessToken` endpoint, authenticated with the source
//! credentials, and caches the returned token.
//!
//! [Service account impersonation]: https://cloud.google.com/iam/docs/service-account-impersonation

use crate::Result;
use crate::credentials::internal::to_credentials_error;
use crate::credentials::{Credentials, CredentialsProvider, DEFAULT_SCOPE};
use crate::errors;
use crate::headers_util::build_bearer_headers;
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use http::HeaderMap;
use tokio::time::Instant;

const IAM_CREDENTIALS_ENDPOINT: &str = "https://iamcredentials.googleapis.com";

/// The default lifetime requested for the impersonated tokens.
const DEFAULT_LIFETIME: std::time::Duration = std::time::Duration::from_secs(3600);

/// Creates [Credentials] that impersonate a service account.
///
/// # Example
/// ```
/// # use gcp_sdk_auth::credentials::{anonymous, impersonated::Builder};
/// let source = anonymous::Builder::new().build();
/// let credentials = Builder::new(source, "target-sa@my-project.iam.gserviceaccount.com")
///     .with_scopes(["https://www.googleapis.com/auth/devstorage.read_write"])
///     .build();
/// ```
#[derive(Debug)]
pub struct Builder {
    source: Credentials,
    service_account: String,
    endpoint: Option<String>,
    quota_project_id: Option<String>,
    scopes: Option<Vec<String>>,
    lifetime: std::time::Duration,
    delegates: Vec<String>,
}

impl Builder {
    /// Creates a builder for tokens impersonating `service_account`,
    /// authenticated by `source`.
    pub fn new<S: Into<String>>(source: Credentials, service_account: S) -> Self {
        Self {
            source,
            service_account: service_account.into(),
            endpoint: None,
            quota_project_id: None,
            scopes: None,
            lifetime: DEFAULT_LIFETIME,
            delegates: Vec::new(),
        }
    }

    /// Overrides the IAM Credentials endpoint. Mostly useful for testing.
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

    /// Sets the [scopes] requested for the impersonated tokens.
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

    /// Sets the requested token lifetime. The service rejects lifetimes
    /// above 12 hours.
    pub fn with_lifetime(mut self, lifetime: std::time::Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets the [delegation chain] for the impersonation.
    ///
    /// [delegation chain]: https://cloud.google.com/iam/docs/create-short-lived-credentials-direct#sa-credentials-permissions
    pub fn with_delegates<I, S>(mut self, delegates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delegates = delegates.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Returns [Credentials] with the configured settings.
    pub fn build(self) -> Credentials {
        let token_provider = ImpersonatedTokenProvider {
            source: self.source,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| IAM_CREDENTIALS_ENDPOINT.to_string()),
            service_account: self.service_account,
            scopes: self
                .scopes
                .unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]),
            lifetime: self.lifetime,
            delegates: self.delegates,
            client: reqwest::Client::new(),
        };
        Credentials::from(ImpersonatedCredentials {
            quota_project_id: self.quota_project_id,
            token_provider: TokenCache::new(token_provider),
        })
    }
}

#[derive(Debug)]
struct ImpersonatedCredentials<T>
where
    T: TokenProvider,
{
    quota_project_id: Option<String>,
    token_provider: T,
}

#[async_trait::async_trait]
impl<T> CredentialsProvider for ImpersonatedCredentials<T>
where
    T: TokenProvider,
{
    async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token_provider.token().await?;
        build_bearer_headers(&token, &self.quota_project_id)
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenRequest {
    scope: Vec<String>,
    lifetime: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    delegates: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
    access_token: String,
    expire_time: String,
}

#[derive(Debug)]
struct ImpersonatedTokenProvider {
    source: Credentials,
    endpoint: String,
    service_account: String,
    scopes: Vec<String>,
    lifetime: std::time::Duration,
    delegates: Vec<String>,
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl TokenProvider for ImpersonatedTokenProvider {
    async fn token(&self) -> Result<Token> {
        let source_headers = self.source.headers().await?;
        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:generateAccessToken",
            self.endpoint, self.service_account
        );
        let body = GenerateAccessTokenRequest {
            scope: self.scopes.clone(),
            lifetime: format!("{}s", self.lifetime.as_secs()),
            delegates: self.delegates.clone(),
        };
        let response = self
            .client
            .post(url)
            .headers(source_headers)
            .json(&body)
            .send()
            .await
            .map_err(errors::transient)?;
        if !response.status().is_success() {
            return Err(to_credentials_error("generateAccessToken", response).await);
        }
        let response = response
            .json::<GenerateAccessTokenResponse>()
            .await
            .map_err(|e| errors::CredentialsError::new(!e.is_decode(), e))?;

        let expires_at = parse_expire_time(&response.expire_time)?;
        Ok(Token {
            token: response.access_token,
            token_type: "Bearer".to_string(),
            expires_at: Some(expires_at),
            metadata: None,
        })
    }
}

/// Converts the RFC 3339 `expireTime` field into a local instant.
fn parse_expire_time(expire_time: &str) -> Result<Instant> {
    let expire =
        time::OffsetDateTime::parse(expire_time, &time::format_description::well_known::Rfc3339)
            .map_err(errors::non_transient)?;
    let remaining = expire - time::OffsetDateTime::now_utc();
    let remaining = std::time::Duration::try_from(remaining).unwrap_or_default();
    Ok(Instant::now() + remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::anonymous;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    type TestResult = anyhow::Result<()>;

    const TARGET: &str = "target-sa@my-project.iam.gserviceaccount.com";

    fn token_path() -> String {
        format!("/v1/projects/-/serviceAccounts/{TARGET}:generateAccessToken")
    }

    fn expire_time_in(seconds: i64) -> String {
        let expire = time::OffsetDateTime::now_utc() + time::Duration::seconds(seconds);
        expire
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap()
    }

    #[tokio::test]
    async fn generate_access_token() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", token_path()),
                request::body(json_decoded(eq(serde_json::json!({
                    "scope": ["https://www.googleapis.com/auth/devstorage.read_write"],
                    "lifetime": "600s"
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "accessToken": "impersonated-token",
                "expireTime": expire_time_in(600)
            }))),
        );

        let credentials = Builder::new(anonymous::Builder::new().build(), TARGET)
            .with_endpoint(server.url_str(""))
            .with_scopes(["https://www.googleapis.com/auth/devstorage.read_write"])
            .with_lifetime(std::time::Duration::from_secs(600))
            .build();
        let headers = credentials.headers().await?;
        assert_eq!(
            headers
                .get(http::header::AUTHORIZATION)
                .unwrap()
                .to_str()?,
            "Bearer impersonated-token"
        );
        Ok(())
    }

    #[tokio::test]
    async fn delegates_are_forwarded() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", token_path()),
                request::body(json_decoded(eq(serde_json::json!({
                    "scope": ["https://www.googleapis.com/auth/cloud-platform"],
                    "lifetime": "3600s",
                    "delegates": ["delegate-sa@my-project.iam.gserviceaccount.com"]
                })))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "accessToken": "impersonated-token",
                "expireTime": expire_time_in(3600)
            }))),
        );

        let credentials = Builder::new(anonymous::Builder::new().build(), TARGET)
            .with_endpoint(server.url_str(""))
            .with_delegates(["delegate-sa@my-project.iam.gserviceaccount.com"])
            .build();
        let _ = credentials.headers().await?;
        Ok(())
    }

    #[tokio::test]
    async fn permission_denied_is_permanent() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", token_path()))
                .respond_with(status_code(403).body("caller lacks iam.serviceAccounts.getAccessToken")),
        );

        let credentials = Builder::new(anonymous::Builder::new().build(), TARGET)
            .with_endpoint(server.url_str(""))
            .build();
        let err = credentials.headers().await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
        assert!(
            format!("{err}").contains("getAccessToken"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let credentials = Builder::new(crate::credentials::testing::error_credentials(true), TARGET)
            .build();
        let err = credentials.headers().await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }

    #[test]
    fn expire_time_parsing() {
        let expires_at = parse_expire_time(&expire_time_in(3600)).unwrap();
        // Within a minute of the expected expiration, to allow for slow tests.
        let delta = expires_at - Instant::now();
        assert!(delta <= std::time::Duration::from_secs(3600), "{delta:?}");
        assert!(delta >= std::time::Duration::from_secs(3540), "{delta:?}");

        let err = parse_expire_time("not-a-timestamp").unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
    }
}
