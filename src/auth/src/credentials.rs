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

//! Types and functions to work with authentication credentials.
//!
//! The service clients consume a [Credentials] instance and use it to build
//! the auth headers for every RPC. Most applications create credentials via
//! [Application Default Credentials] (ADC):
//!
//! ```
//! # use gcp_sdk_auth::credentials::Builder;
//! # fn example() -> gcp_sdk_auth::BuildResult<()> {
//! let credentials = Builder::default().build()?;
//! # Ok(()) }
//! ```
//!
//! Applications needing a specific credential type use the builder in the
//! corresponding submodule, e.g. [mds::Builder] or
//! [service_account::Builder].
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials

use crate::BuildResult;
use crate::Result;
use crate::build_errors::Error as BuilderError;
use http::HeaderMap;
use std::sync::Arc;

pub mod anonymous;
pub mod api_key;
pub mod impersonated;
pub mod mds;
pub mod service_account;
pub mod user_account;

pub(crate) mod internal;

/// The default universe domain for Google Cloud services.
pub const DEFAULT_UNIVERSE_DOMAIN: &str = "googleapis.com";

/// The scope used when the application does not specify any.
pub(crate) const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// The environment variable pointing to the ADC file.
pub(crate) const ADC_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Implementations of this trait create auth headers.
///
/// Applications rarely implement this trait directly, the builders in this
/// module return working implementations. The trait is useful to mock
/// credentials in tests.
#[async_trait::async_trait]
pub trait CredentialsProvider: std::fmt::Debug + Send + Sync {
    /// Asynchronously constructs the auth headers.
    ///
    /// Different credential types have different ways to construct them.
    /// Some credentials hit additional endpoints (and may fail transiently),
    /// others are created locally.
    async fn headers(&self) -> Result<HeaderMap>;

    /// The universe domain targeted by these credentials.
    async fn universe_domain(&self) -> Option<String> {
        Some(DEFAULT_UNIVERSE_DOMAIN.to_string())
    }
}

/// A type-erased handle to any supported credential type.
///
/// `Credentials` is cheap to clone: implementations share their token cache
/// across clones, so a token refreshed through one clone is visible to all.
#[derive(Clone, Debug)]
pub struct Credentials {
    inner: Arc<dyn CredentialsProvider>,
}

impl<T> From<T> for Credentials
where
    T: CredentialsProvider + 'static,
{
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl Credentials {
    /// Asynchronously constructs the auth headers.
    pub async fn headers(&self) -> Result<HeaderMap> {
        self.inner.headers().await
    }

    /// The universe domain targeted by these credentials.
    pub async fn universe_domain(&self) -> Option<String> {
        self.inner.universe_domain().await
    }
}

/// Creates credentials via [Application Default Credentials].
///
/// The lookup order is:
/// 1. The file named by the `GOOGLE_APPLICATION_CREDENTIALS` environment
///    variable.
/// 2. The well-known gcloud file
///    (`$HOME/.config/gcloud/application_default_credentials.json`).
/// 3. The metadata service, when running on Google Cloud.
///
/// [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
#[derive(Debug, Default)]
pub struct Builder {
    quota_project_id: Option<String>,
    scopes: Option<Vec<String>>,
}

impl Builder {
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
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Creates the credentials, running the ADC lookup.
    pub fn build(self) -> BuildResult<Credentials> {
        match load_adc()? {
            AdcContents::Contents(contents) => {
                let json: serde_json::Value =
                    serde_json::from_str(&contents).map_err(BuilderError::parsing)?;
                build_credentials_from_json(json, self.quota_project_id, self.scopes)
            }
            AdcContents::FallbackToMds => {
                let mut builder = mds::Builder::default();
                if let Some(project) = self.quota_project_id {
                    builder = builder.with_quota_project_id(project);
                }
                if let Some(scopes) = self.scopes {
                    builder = builder.with_scopes(scopes);
                }
                Ok(builder.build())
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum AdcContents {
    Contents(String),
    FallbackToMds,
}

fn adc_well_known_path() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(|home| {
        std::path::PathBuf::from(home)
            .join(".config")
            .join("gcloud")
            .join("application_default_credentials.json")
    })
}

fn load_adc() -> BuildResult<AdcContents> {
    if let Some(path) = std::env::var_os(ADC_ENV_VAR) {
        let path = std::path::PathBuf::from(path);
        // An explicitly configured file must exist; a missing file is an
        // error, not a fallback.
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| BuilderError::loading(path.display().to_string(), e))?;
        return Ok(AdcContents::Contents(contents));
    }
    if let Some(path) = adc_well_known_path() {
        match std::fs::read_to_string(&path) {
            Ok(contents) => return Ok(AdcContents::Contents(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuilderError::loading(path.display().to_string(), e)),
        }
    }
    Ok(AdcContents::FallbackToMds)
}

fn build_credentials_from_json(
    json: serde_json::Value,
    quota_project_id: Option<String>,
    scopes: Option<Vec<String>>,
) -> BuildResult<Credentials> {
    let cred_type = json
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(BuilderError::MissingField("type"))?;
    match cred_type {
        "service_account" => {
            let mut builder = service_account::Builder::new(json);
            if let Some(project) = quota_project_id {
                builder = builder.with_quota_project_id(project);
            }
            if let Some(scopes) = scopes {
                builder = builder.with_scopes(scopes);
            }
            builder.build()
        }
        "authorized_user" => {
            let mut builder = user_account::Builder::new(json);
            if let Some(project) = quota_project_id {
                builder = builder.with_quota_project_id(project);
            }
            if let Some(scopes) = scopes {
                builder = builder.with_scopes(scopes);
            }
            builder.build()
        }
        unknown => Err(BuilderError::UnknownType(unknown.to_string())),
    }
}

/// Test-only credentials, for use in this workspace's unit tests.
pub mod testing {
    use super::*;

    /// Credentials that produce no headers.
    ///
    /// Useful to test clients against local fake servers.
    pub fn test_credentials() -> Credentials {
        Credentials::from(TestCredentials)
    }

    /// Credentials that always fail.
    ///
    /// Useful to test how clients report auth problems.
    pub fn error_credentials(is_transient: bool) -> Credentials {
        Credentials::from(ErrorCredentials(is_transient))
    }

    #[derive(Debug)]
    struct TestCredentials;

    #[async_trait::async_trait]
    impl CredentialsProvider for TestCredentials {
        async fn headers(&self) -> Result<HeaderMap> {
            Ok(HeaderMap::new())
        }
    }

    #[derive(Debug)]
    struct ErrorCredentials(bool);

    #[async_trait::async_trait]
    impl CredentialsProvider for ErrorCredentials {
        async fn headers(&self) -> Result<HeaderMap> {
            Err(crate::errors::CredentialsError::from_msg(
                self.0,
                "test-only error credentials",
            ))
        }

        async fn universe_domain(&self) -> Option<String> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoped_env::ScopedEnv;
    use serial_test::serial;
    use std::io::Write;

    type TestResult = anyhow::Result<()>;

    #[test]
    #[serial]
    fn adc_env_var_missing_file_is_an_error() {
        let _e = ScopedEnv::set(ADC_ENV_VAR, "/no/such/file.json");
        let err = Builder::default().build().unwrap_err();
        assert!(matches!(err, BuilderError::Loading { .. }), "{err:?}");
    }

    #[test]
    #[serial]
    fn adc_env_var_malformed_json() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "not json")?;
        let _e = ScopedEnv::set(ADC_ENV_VAR, file.path());
        let err = Builder::default().build().unwrap_err();
        assert!(matches!(err, BuilderError::Parsing(_)), "{err:?}");
        Ok(())
    }

    #[test]
    #[serial]
    fn adc_env_var_unknown_type() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"type": "new_fangled_credentials"}}"#)?;
        let _e = ScopedEnv::set(ADC_ENV_VAR, file.path());
        let err = Builder::default().build().unwrap_err();
        assert!(matches!(err, BuilderError::UnknownType(_)), "{err:?}");
        Ok(())
    }

    #[test]
    #[serial]
    fn adc_env_var_missing_type() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"no_type_here": true}}"#)?;
        let _e = ScopedEnv::set(ADC_ENV_VAR, file.path());
        let err = Builder::default().build().unwrap_err();
        assert!(matches!(err, BuilderError::MissingField("type")), "{err:?}");
        Ok(())
    }

    #[test]
    #[serial]
    fn adc_fallback_to_mds() {
        let _e1 = ScopedEnv::remove(ADC_ENV_VAR);
        let _e2 = ScopedEnv::set("HOME", "/no/such/directory");
        let credentials = Builder::default().build().unwrap();
        // The fallback credentials are backed by the metadata service.
        assert!(format!("{credentials:?}").contains("MDSCredentials"));
    }

    #[test]
    #[serial]
    fn adc_authorized_user() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{
                "type": "authorized_user",
                "client_id": "test-client-id",
                "client_secret": "test-client-secret",
                "refresh_token": "test-refresh-token"
            }}"#
        )?;
        let _e = ScopedEnv::set(ADC_ENV_VAR, file.path());
        let credentials = Builder::default().build()?;
        assert!(format!("{credentials:?}").contains("UserCredentials"));
        Ok(())
    }

    #[tokio::test]
    async fn test_credentials_are_empty() -> TestResult {
        let credentials = testing::test_credentials();
        assert!(credentials.headers().await?.is_empty());
        assert_eq!(
            credentials.universe_domain().await,
            Some(DEFAULT_UNIVERSE_DOMAIN.to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn error_credentials_report_errors() {
        let credentials = testing::error_credentials(true);
        let err = credentials.headers().await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
        assert_eq!(credentials.universe_domain().await, None);

        let credentials = testing::error_credentials(false);
        let err = credentials.headers().await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
    }
}
