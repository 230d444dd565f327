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

//! Shared plumbing for the OAuth2 token endpoints.

use crate::Result;
use crate::errors;
use crate::token::Token;
use std::time::Duration;
use tokio::time::Instant;

/// The response from an OAuth2 token endpoint.
#[derive(Clone, Debug, serde::Deserialize)]
pub(crate) struct Oauth2TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl From<Oauth2TokenResponse> for Token {
    fn from(response: Oauth2TokenResponse) -> Self {
        Token {
            token: response.access_token,
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|d| Instant::now() + Duration::from_secs(d)),
            metadata: response
                .scope
                .map(|s| std::collections::HashMap::from([("scope".to_string(), s)])),
        }
    }
}

/// POSTs a form-encoded grant to an OAuth2 token endpoint.
///
/// Transport failures are transient. HTTP errors are transient or permanent
/// depending on the status code, see [errors::is_retryable].
pub(crate) async fn exchange_token(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> Result<Token> {
    let response = client
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(errors::transient)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| errors::CredentialsError::new(errors::is_retryable(status), e))?;
        return Err(errors::CredentialsError::from_msg(
            errors::is_retryable(status),
            format!("the token exchange failed with status {status}: {body}"),
        ));
    }
    let response = response
        .json::<Oauth2TokenResponse>()
        .await
        .map_err(|e| errors::CredentialsError::new(!e.is_decode(), e))?;
    Ok(Token::from(response))
}

/// Maps a non-success HTTP response into a credentials error.
pub(crate) async fn to_credentials_error(
    what: &str,
    response: reqwest::Response,
) -> errors::CredentialsError {
    let status = response.status();
    let retryable = errors::is_retryable(status);
    match response.text().await {
        Ok(body) => errors::CredentialsError::from_msg(
            retryable,
            format!("{what} failed with status {status}: {body}"),
        ),
        Err(e) => errors::CredentialsError::new(retryable, e),
    }
}
