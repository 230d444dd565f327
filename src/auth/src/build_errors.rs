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

//! Errors reported while building credentials.
//!
//! These errors happen before any token is requested: a missing credentials
//! file, malformed JSON, or an unsupported credential type. They are never
//! transient.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type for credential builders.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The credentials file could not be read.
    #[error("cannot read the credentials file at {path}: {source}")]
    Loading {
        path: String,
        #[source]
        source: BoxError,
    },

    /// The credentials file could not be parsed.
    #[error("cannot parse the credentials contents: {0}")]
    Parsing(#[source] BoxError),

    /// The `type` field in the credentials file is not supported.
    #[error("unknown credential type: {0}")]
    UnknownType(String),

    /// A required field is missing from the credentials file.
    #[error("missing field `{0}` in the credentials contents")]
    MissingField(&'static str),
}

impl Error {
    pub(crate) fn loading<P: Into<String>, T: Into<BoxError>>(path: P, source: T) -> Self {
        Self::Loading {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn parsing<T: Into<BoxError>>(source: T) -> Self {
        Self::Parsing(source.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let e = Error::loading("/tmp/key.json", std::io::Error::other("no such file"));
        let got = format!("{e}");
        assert!(got.contains("/tmp/key.json"), "{got}");
        assert!(got.contains("no such file"), "{got}");

        let e = Error::UnknownType("external_account_wat".to_string());
        assert!(format!("{e}").contains("external_account_wat"));

        let e = Error::MissingField("private_key");
        assert!(format!("{e}").contains("private_key"));
    }
}
