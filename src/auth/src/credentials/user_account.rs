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

//! User account credentials.
//!
//! A user account credential carries the OAuth2 refresh token obtained when
//! a person authorizes the application, typically via
//! `gcloud auth application-default login`. The credential exchanges the
//! refresh token for short-lived access tokens as needed.

use crate::BuildResult;
use crate::Result;
use crate::build_errors::Error as BuilderError;
use crate::credentials::internal::exchange_token;
use crate::credentials::{Credentials, CredentialsProvider};
use crate::headers_util::build_bearer_headers;
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use http::HeaderMap;

const OAUTH2_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// The parsed contents of an `authorized_user` JSON file.
#[derive(Clone, serde::Deserialize)]
struct AuthorizedUserFile {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

impl std::fmt::Debug for AuthorizedUserFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedUserFile")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[censored]")
            .field("refresh_token", &"[censored]")
            .finish()
    }
}

/// Creates [Credentials] from an `authorized_user` JSON document.
///
/// # Example
/// ```
/// # use gcp_sdk_auth::credentials::user_account::Builder;
/// # fn example() -> gcp_sdk_auth::BuildResult<()> {
/// let json = serde_json::json!({
///     "type": "authorized_user",
///     "client_id": "a-client-id",
///     "client_secret": "a-client-secret",
///     "refresh_token": "a-refresh-token"
/// });
/// let credentials = Builder::new(json).build()?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Builder {
    json: serde_json::Value,
    endpoint: Option<String>,
    quota_project_id: Option<String>,
    scopes: Option<Vec<String>>,
}

impl Builder {
    /// Creates a builder from the JSON contents of the credentials file.
    pub fn new(json: serde_json::Value) -> Self {
        Self {
            json,
            endpoint: None,
            quota_project_id: None,
            scopes: None,
        }
    }

    /// Overrides the token endpoint. Mostly useful for testing.
    pub fn with_token_uri<S: Into<String>>(mut self, endpoint: S) -> Self {
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
    pub fn build(self) -> BuildResult<Credentials> {
        let file = serde_json::from_value::<AuthorizedUserFile>(self.json)
            .map_err(BuilderError::parsing)?;
        let token_provider = UserTokenProvider {
            file,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| OAUTH2_ENDPOINT.to_string()),
            scopes: self.scopes.map(|s| s.join(" ")),
            client: reqwest::Client::new(),
        };
        Ok(Credentials::from(UserCredentials {
            quota_project_id: self.quota_project_id,
            token_provider: TokenCache::new(token_provider),
        }))
    }
}

#[derive(Debug)]
struct UserCredentials<T>
where
    T: TokenProvider,
{
    quota_project_id: Option<String>,
    token_provider: T,
}

#[async_trait::async_trait]
impl<T> CredentialsProvider for UserCredentials<T>
where
    T: TokenProvider,
{
    async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token_provider.token().await?;
        build_bearer_headers(&token, &self.quota_project_id)
    }
}

#[derive(Debug)]
struct UserTokenProvider {
    file: AuthorizedUserFile,
    endpoint: String,
    scopes: Option<String>,
    client: reqwest::Client,
}

#[async_trait::async_trait]
impl TokenProvider for UserTokenProvider {
    async fn token(&self) -> Result<Token> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.file.client_id.as_str()),
            ("client_secret", self.file.client_secret.as_str()),
            ("refresh_token", self.file.refresh_token.as_str()),
        ];
        if let Some(scopes) = &self.scopes {
            params.push(("scope", scopes.as_str()));
        }
        exchange_token(&self.client, &self.endpoint, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    type TestResult = anyhow::Result<()>;

    fn test_json() -> serde_json::Value {
        serde_json::json!({
            "type": "authorized_user",
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "refresh_token": "test-refresh-token"
        })
    }

    #[test]
    fn missing_fields_are_build_errors() {
        let err = Builder::new(serde_json::json!({"type": "authorized_user"}))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuilderError::Parsing(_)), "{err:?}");
    }

    #[test]
    fn debug_censors_secrets() {
        let file = serde_json::from_value::<AuthorizedUserFile>(test_json()).unwrap();
        let got = format!("{file:?}");
        assert!(!got.contains("test-client-secret"), "{got}");
        assert!(!got.contains("test-refresh-token"), "{got}");
        assert!(got.contains("test-client-id"), "{got}");
    }

    #[tokio::test]
    async fn refresh_token_grant() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/token"),
                request::body(url_decoded(contains(("grant_type", "refresh_token")))),
                request::body(url_decoded(contains(("client_id", "test-client-id")))),
                request::body(url_decoded(contains((
                    "refresh_token",
                    "test-refresh-token"
                )))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "access_token": "user-access-token",
                "token_type": "Bearer",
                "expires_in": 3600
            }))),
        );

        let credentials = Builder::new(test_json())
            .with_token_uri(server.url_str("/token"))
            .build()?;
        let headers = credentials.headers().await?;
        assert_eq!(
            headers
                .get(http::header::AUTHORIZATION)
                .unwrap()
                .to_str()?,
            "Bearer user-access-token"
        );
        Ok(())
    }

    #[tokio::test]
    async fn scopes_are_forwarded() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/token"),
                request::body(url_decoded(contains(("scope", "scope1 scope2")))),
            ])
            .respond_with(json_encoded(serde_json::json!({
                "access_token": "user-access-token",
                "token_type": "Bearer"
            }))),
        );

        let credentials = Builder::new(test_json())
            .with_token_uri(server.url_str("/token"))
            .with_scopes(["scope1", "scope2"])
            .build()?;
        let _ = credentials.headers().await?;
        Ok(())
    }

    #[tokio::test]
    async fn invalid_grant_is_permanent() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/token"))
                .respond_with(status_code(400).body(r#"{"error": "invalid_grant"}"#)),
        );

        let credentials = Builder::new(test_json())
            .with_token_uri(server.url_str("/token"))
            .build()?;
        let err = credentials.headers().await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
        Ok(())
    }
}
