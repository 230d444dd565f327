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

pub(crate) mod checksum;
pub(crate) mod client;
pub(crate) mod compose_object;
pub(crate) mod delete_object;
pub(crate) mod get_object;
pub(crate) mod insert_object;
pub(crate) mod list_objects;
pub(crate) mod parallel_upload;
pub(crate) mod perform_upload;
pub(crate) mod read_object;
pub(crate) mod request_options;
pub mod streaming_source;
pub(crate) mod upload_object;
