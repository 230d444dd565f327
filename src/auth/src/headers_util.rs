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

use crate::Result;
use crate::errors;
use crate::token::Token;
use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// The header used to bill a different project for the request.
pub(crate) const QUOTA_PROJECT_KEY: &str = "x-goog-user-project";

const API_KEY_HEADER_KEY: &str = "x-goog-api-key";

/// A utility function to create bearer auth headers.
pub(crate) fn build_bearer_headers(
    token: &Token,
    quota_project_id: &Option<String>,
) -> Result<HeaderMap> {
    build_headers(token, quota_project_id, AUTHORIZATION, |token| {
        HeaderValue::from_str(&format!("{} {}", token.token_type, token.token))
            .map_err(errors::non_transient)
    })
}

/// A utility function to create API key headers.
pub(crate) fn build_api_key_headers(token: &Token) -> Result<HeaderMap> {
    build_headers(
        token,
        &None,
        HeaderName::from_static(API_KEY_HEADER_KEY),
        |token| HeaderValue::from_str(&token.token).map_err(errors::non_transient),
    )
}

fn build_headers(
    token: &Token,
    quota_project_id: &Option<String>,
    header_name: HeaderName,
    build_header_value: impl FnOnce(&Token) -> Result<HeaderValue>,
) -> Result<HeaderMap> {
    let mut value = build_header_value(token)?;
    value.set_sensitive(true);

    let mut header_map = HeaderMap::new();
    header_map.insert(header_name, value);

    if let Some(project) = quota_project_id {
        header_map.insert(
            HeaderName::from_static(QUOTA_PROJECT_KEY),
            HeaderValue::from_str(project).map_err(errors::non_transient)?,
        );
    }

    Ok(header_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_token(value: &str) -> Token {
        Token {
            token: value.to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            metadata: None,
        }
    }

    #[test]
    fn bearer_headers() {
        let headers = build_bearer_headers(&test_token("abc123"), &None).unwrap();
        let auth = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer abc123");
        assert!(auth.is_sensitive());
        assert!(!headers.contains_key(QUOTA_PROJECT_KEY));
    }

    #[test]
    fn bearer_headers_with_quota_project() {
        let headers =
            build_bearer_headers(&test_token("abc123"), &Some("my-project".to_string())).unwrap();
        assert_eq!(
            headers.get(QUOTA_PROJECT_KEY).unwrap().to_str().unwrap(),
            "my-project"
        );
    }

    #[test]
    fn api_key_headers() {
        let headers = build_api_key_headers(&test_token("key-value")).unwrap();
        let key = headers.get(API_KEY_HEADER_KEY).unwrap();
        assert_eq!(key.to_str().unwrap(), "key-value");
        assert!(key.is_sensitive());
        assert!(!headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn invalid_header_value() {
        let result = build_bearer_headers(&test_token("bad\nvalue"), &None);
        let err = result.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
    }
}
