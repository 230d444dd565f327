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

//! Anonymous credentials.
//!
//! Use these credentials to access resources that do not require
//! authentication, such as public storage buckets or local emulators. The
//! credentials produce no headers.

use crate::Result;
use crate::credentials::{Credentials, CredentialsProvider};
use http::HeaderMap;

/// Creates anonymous [Credentials].
///
/// # Example
/// ```
/// # use gcp_sdk_auth::credentials::anonymous::Builder;
/// let credentials = Builder::new().build();
/// ```
#[derive(Debug, Default)]
pub struct Builder;

impl Builder {
    pub fn new() -> Self {
        Self
    }

    /// Returns anonymous [Credentials].
    pub fn build(self) -> Credentials {
        Credentials::from(AnonymousCredentials)
    }
}

#[derive(Debug)]
struct AnonymousCredentials;

#[async_trait::async_trait]
impl CredentialsProvider for AnonymousCredentials {
    async fn headers(&self) -> Result<HeaderMap> {
        Ok(HeaderMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn headers_are_empty() -> anyhow::Result<()> {
        let credentials = Builder::new().build();
        assert!(credentials.headers().await?.is_empty());
        Ok(())
    }
}
