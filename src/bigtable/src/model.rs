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

//! The resource types used by the Bigtable admin [REST API].
//!
//! [REST API]: https://cloud.google.com/bigtable/docs/reference/admin/rest

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A collection of user data indexed by row, column, and timestamp.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Table {
    /// The name of the table, in
    /// `projects/{project}/instances/{instance}/tables/{table}` format.
    pub name: String,

    /// The column families of this table, keyed by family id.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub column_families: HashMap<String, ColumnFamily>,

    /// The granularity at which timestamps are stored.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub granularity: String,
}

/// A group of columns within a table sharing a common configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ColumnFamily {
    /// The rule deciding which cells the service garbage-collects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_rule: Option<GcRule>,
}

impl ColumnFamily {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the garbage collection rule.
    pub fn set_gc_rule(mut self, v: GcRule) -> Self {
        self.gc_rule = Some(v);
        self
    }
}

/// A rule deciding which cells the service garbage-collects.
///
/// Rules compose: a union collects a cell when *any* nested rule would, an
/// intersection only when *all* of them would. The externally tagged enum
/// matches the wire format, e.g. `{"maxNumVersions": 3}` or
/// `{"union": {"rules": [...]}}`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub enum GcRule {
    /// Collect all cells except the N most recent versions.
    #[serde(rename = "maxNumVersions")]
    MaxNumVersions(i32),

    /// Collect cells older than the given age, in the `{seconds}s` wire
    /// format.
    #[serde(rename = "maxAge")]
    MaxAge(String),

    /// Collect cells that any of the nested rules would collect.
    #[serde(rename = "union")]
    Union(GcRuleList),

    /// Collect cells that all of the nested rules would collect.
    #[serde(rename = "intersection")]
    Intersection(GcRuleList),
}

impl GcRule {
    /// A `maxAge` rule from a duration, truncated to seconds.
    pub fn max_age(v: std::time::Duration) -> Self {
        Self::MaxAge(format!("{}s", v.as_secs()))
    }

    /// A union of the given rules.
    pub fn union<I: IntoIterator<Item = GcRule>>(rules: I) -> Self {
        Self::Union(GcRuleList {
            rules: rules.into_iter().collect(),
        })
    }

    /// An intersection of the given rules.
    pub fn intersection<I: IntoIterator<Item = GcRule>>(rules: I) -> Self {
        Self::Intersection(GcRuleList {
            rules: rules.into_iter().collect(),
        })
    }
}

/// The nested rules of a union or intersection.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct GcRuleList {
    pub rules: Vec<GcRule>,
}

/// The response from a list tables request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListTablesResponse {
    /// The tables in the requested page.
    pub tables: Vec<Table>,

    /// Pass this token in a new request to fetch the next page. Empty on
    /// the last page.
    pub next_page_token: Option<String>,
}
