pub mod merge;
pub mod watermark;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format of the `last_updated` query filter.
pub const FILTER_DATE_FORMAT: &str = "%Y-%m-%d";

/// Version attributes of a plugin.
///
/// Only the two timestamps take part in merging; everything else the API
/// sends (CVEs, CVSS vectors, VPR, ...) is kept verbatim in `extra` so a
/// snapshot round-trips without losing data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginAttributes {
    /// RFC 3339 publication timestamp
    #[serde(default, deserialize_with = "null_as_empty")]
    pub plugin_publication_date: String,

    /// RFC 3339 modification timestamp
    #[serde(default, deserialize_with = "null_as_empty")]
    pub plugin_modification_date: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single plugin in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,

    #[serde(default)]
    pub attributes: PluginAttributes,
}

impl CatalogEntry {
    #[cfg(test)]
    pub fn new(id: i64, name: &str, published: &str, modified: &str) -> Self {
        CatalogEntry {
            id,
            name: name.to_string(),
            attributes: PluginAttributes {
                plugin_publication_date: published.to_string(),
                plugin_modification_date: modified.to_string(),
                extra: serde_json::Map::new(),
            },
        }
    }

    /// Identifier and both timestamps match. Other attributes are ignored.
    pub fn content_eq(&self, other: &CatalogEntry) -> bool {
        self.id == other.id
            && self.attributes.plugin_publication_date == other.attributes.plugin_publication_date
            && self.attributes.plugin_modification_date
                == other.attributes.plugin_modification_date
    }
}

/// Query parameters of one catalog page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchParams {
    /// 1-based page number
    pub page: u32,

    /// Entries per page
    #[serde(rename = "size")]
    pub page_size: u32,

    /// Only entries modified on or after this date
    #[serde(with = "filter_date")]
    pub last_updated: Option<NaiveDate>,
}

impl FetchParams {
    pub fn new(page_size: u32, last_updated: Option<NaiveDate>) -> Self {
        FetchParams {
            page: 1,
            page_size,
            last_updated,
        }
    }

    /// Pairs for the request query string. `last_updated` is omitted when unset.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("size", self.page_size.to_string()),
        ];
        if let Some(date) = self.last_updated {
            pairs.push(("last_updated", date.format(FILTER_DATE_FORMAT).to_string()));
        }
        pairs
    }

    /// True once the current page covers the last of `total_count` entries.
    pub fn is_last_page(&self, total_count: u64) -> bool {
        u64::from(self.page) * u64::from(self.page_size) > total_count
    }
}

impl Default for FetchParams {
    fn default() -> Self {
        FetchParams::new(crate::config::DEFAULT_PAGE_SIZE, None)
    }
}

/// JSON `null` reads as an empty string.
fn null_as_empty<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// `last_updated` is written as `YYYY-MM-DD`, or `""` when unset.
///
/// Reading also accepts a full RFC 3339 timestamp (its calendar date is kept).
/// Anything else reads as unset: the block only echoes the request and no
/// decision depends on it.
mod filter_date {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::FILTER_DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format(FILTER_DATE_FORMAT).to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.as_deref().map(str::trim).and_then(parse))
    }

    fn parse(value: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(value, FILTER_DATE_FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|t| t.date_naive()))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginDetailsList {
    #[serde(default)]
    pub plugin_details: Vec<CatalogEntry>,
}

/// The local copy of the catalog. Same shape as one API response page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub total_count: u64,

    #[serde(default)]
    pub params: Option<FetchParams>,

    #[serde(default)]
    pub data: PluginDetailsList,
}

impl Snapshot {
    /// Build a snapshot whose counts match `entries`.
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let count = entries.len() as u64;
        Snapshot {
            size: count,
            total_count: count,
            params: None,
            data: PluginDetailsList {
                plugin_details: entries,
            },
        }
    }

    pub fn empty() -> Self {
        Snapshot::from_entries(Vec::new())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.data.plugin_details
    }

    pub fn len(&self) -> usize {
        self.data.plugin_details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.plugin_details.is_empty()
    }

    /// Check `size == total_count == len(entries)` and identifier uniqueness.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.len() as u64;
        if self.size != len || self.total_count != len {
            return Err(format!(
                "counts disagree: size={}, total_count={}, entries={}",
                self.size, self.total_count, len
            ));
        }
        let mut seen = std::collections::HashSet::with_capacity(self.len());
        for entry in self.entries() {
            if !seen.insert(entry.id) {
                return Err(format!("duplicate plugin id {}", entry.id));
            }
        }
        Ok(())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot::empty()
    }
}
