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

//! Implementation details shared by the cloud client libraries.
//!
//! The types and functions in this crate are **not** intended for general
//! use, there are no stability guarantees. Applications should depend on
//! the service crates (`gcp-sdk-storage`, `gcp-sdk-pubsub`, ...) and on
//! `gcp-sdk-gax` only.

pub mod http;
