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

//! The resource types used by the Cloud Storage [JSON API].
//!
//! [JSON API]: https://cloud.google.com/storage/docs/json_api

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};

/// An object resource, as returned by the service.
///
/// The service encodes 64-bit integers as decimal strings, and the CRC32C
/// checksum as a big-endian 32-bit integer in base64. The deserializer
/// normalizes both.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Object {
    /// The name of the object, without the bucket name.
    pub name: String,

    /// The name of the bucket containing this object.
    pub bucket: String,

    /// The content generation of this object. Used for object versioning
    /// and preconditions.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub generation: i64,

    /// The version of the metadata for this object at this generation.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub metageneration: i64,

    /// The size of the object data, in bytes.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub size: u64,

    /// `Content-Type` of the object data.
    pub content_type: String,

    /// The storage class of the object.
    pub storage_class: String,

    /// The entity tag of the object.
    pub etag: String,

    /// The number of source objects composed into this object. Absent for
    /// objects created by regular uploads.
    pub component_count: Option<i32>,

    /// CRC32C checksum of the object data.
    #[serde_as(as = "Option<Crc32cAsBase64>")]
    pub crc32c: Option<u32>,

    /// MD5 hash of the object data, base64 on the wire. Composite objects
    /// have no MD5 hash.
    #[serde_as(as = "Option<serde_with::base64::Base64>")]
    pub md5_hash: Option<bytes::Bytes>,

    /// User-provided metadata, in key/value pairs.
    pub metadata: std::collections::HashMap<String, String>,
}

impl Object {
    /// The checksums reported by the service for this object.
    pub fn checksums(&self) -> ObjectChecksums {
        ObjectChecksums {
            crc32c: self.crc32c,
            md5_hash: self.md5_hash.clone(),
        }
    }
}

/// Message used for storing full (not subrange) object checksums.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ObjectChecksums {
    /// CRC32C digest of the object data.
    pub crc32c: Option<u32>,

    /// MD5 digest of the object data. 16 bytes when present.
    pub md5_hash: Option<bytes::Bytes>,
}

/// One of the source objects for a compose operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ComposeSourceObject {
    /// The source object name. Must be in the same bucket as the
    /// destination.
    pub name: String,

    /// If present, selects a specific revision of the source object.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(with = "i64_as_string_option")]
    pub generation: Option<i64>,
}

impl ComposeSourceObject {
    /// Creates a new source from the object name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            generation: None,
        }
    }

    /// Pins the source to a specific generation.
    pub fn set_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }
}

/// The response from a list objects request.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListObjectsResponse {
    /// The objects in the requested page.
    pub items: Vec<Object>,

    /// Object name prefixes, when grouping by delimiter.
    pub prefixes: Vec<String>,

    /// Pass this token in a new request to fetch the next page. Empty on
    /// the last page.
    pub next_page_token: Option<String>,
}

// The CRC32C checksum is an unsigned 32-bit integer encoded using base64 in
// big-endian byte order.
struct Crc32cAsBase64;

impl serde_with::SerializeAs<u32> for Crc32cAsBase64 {
    fn serialize_as<S>(source: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64_STANDARD.encode(source.to_be_bytes()))
    }
}

impl<'de> serde_with::DeserializeAs<'de, u32> for Crc32cAsBase64 {
    fn deserialize_as<D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = u32;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a base64 encoded string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let bytes = BASE64_STANDARD
                    .decode(value)
                    .map_err(serde::de::Error::custom)?;
                let bytes: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    serde::de::Error::invalid_length(value.len(), &"a 4-byte value")
                })?;
                Ok(u32::from_be_bytes(bytes))
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}

mod i64_as_string_option {
    pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

/// Encodes a CRC32C checksum the way the service expects it.
pub(crate) fn crc32c_to_base64(value: u32) -> String {
    BASE64_STANDARD.encode(value.to_be_bytes())
}
