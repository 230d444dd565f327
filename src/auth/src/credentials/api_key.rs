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

//! API key credentials.
//!
//! [API keys] authenticate a project rather than a principal. Only a few
//! services accept them. The key is sent on every request in the
//! `x-goog-api-key` header; there is no token exchange and nothing to
//! refresh.
//!
//! [API keys]: https://cloud.google.com/docs/authentication/api-keys

use crate::Result;
use crate::credentials::{Credentials, CredentialsProvider};
use crate::headers_util::build_api_key_headers;
use crate::token::Token;
use http::HeaderMap;

/// Creates [Credentials] backed by an API key.
///
/// # Example
/// ```
/// # use gcp_sdk_auth::credentials::api_key::Builder;
/// let credentials = Builder::new("my-api-key").build();
/// ```
#[derive(Debug)]
pub struct Builder {
    api_key: String,
}

impl Builder {
    /// Creates a builder with the given API key.
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Returns [Credentials] sending the key on every request.
    pub fn build(self) -> Credentials {
        Credentials::from(ApiKeyCredentials {
            token: Token {
                token: self.api_key,
                token_type: String::new(),
                expires_at: None,
                metadata: None,
            },
        })
    }
}

struct ApiKeyCredentials {
    token: Token,
}

impl std::fmt::Debug for ApiKeyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The token Debug implementation censors the key.
        f.debug_struct("ApiKeyCredentials")
            .field("token", &self.token)
            .finish()
    }
}

#[async_trait::async_trait]
impl CredentialsProvider for ApiKeyCredentials {
    async fn headers(&self) -> Result<HeaderMap> {
        build_api_key_headers(&self.token)
    }
}
