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

//! Authentication components for the cloud client libraries.
//!
//! This crate contains types and functions used to authenticate applications.
//! The service clients in this workspace consume an implementation of
//! [credentials::Credentials] and use it to authenticate the RPCs issued by
//! the application.
//!
//! Most applications do not need to use this crate directly: the clients
//! default to [Application Default Credentials]. Use the builders in
//! [credentials] when you need to customize the credential type or its
//! parameters.
//!
//! [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials

/// Error types for credential creation and use.
pub mod errors;

/// Types and functions to work with authentication credentials.
pub mod credentials;

/// Types and functions to work with auth tokens.
pub mod token;

/// Errors reported when building credentials.
pub mod build_errors;

pub(crate) mod headers_util;
pub(crate) mod token_cache;

/// A `Result` alias where the `Err` case is
/// [errors::CredentialsError].
pub(crate) type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;

/// A `Result` alias for credential builders.
pub type BuildResult<T> = std::result::Result<T, crate::build_errors::Error>;
