use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One preprint as returned by the item listing, with volatile fields removed.
///
/// Only the fields the pipelines read are typed; everything else is kept verbatim in `extra` so
/// the snapshot stays a faithful copy of the upstream record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preprint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default)]
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vor: Option<VersionOfRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Revision counter. The API is not consistent about serialising it as a number or a string, so
/// both are accepted and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Version {
    Number(u64),
    Text(String),
}

impl Default for Version {
    fn default() -> Self {
        Version::Number(1)
    }
}

impl Version {
    /// Numeric revision, at least 1.
    pub fn number(&self) -> u64 {
        let n = match self {
            Version::Number(n) => *n,
            Version::Text(s) => s.trim().parse().unwrap_or(1),
        };
        n.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub institutions: Vec<Institution>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionOfRecord {
    #[serde(rename = "vorDoi", default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

impl Preprint {
    /// Build a record from one listing hit: unwrap the `item` envelope and drop `volatile` keys.
    pub fn from_hit(hit: Value, volatile: &[String]) -> Result<Self, String> {
        let mut doc = match hit {
            Value::Object(mut map) => match map.remove("item") {
                Some(Value::Object(item)) => item,
                Some(other) => return Err(format!("`item` is not an object: {other}")),
                None => map,
            },
            other => return Err(format!("hit is not an object: {other}")),
        };
        for key in volatile {
            doc.remove(key);
        }
        serde_json::from_value(Value::Object(doc)).map_err(|e| e.to_string())
    }

    /// Free-text country of every affiliation of every author, empty ones excluded.
    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.authors
            .iter()
            .flat_map(|a| &a.institutions)
            .filter_map(|i| i.country.as_deref())
            .filter(|c| !c.trim().is_empty())
    }

    /// DOI of the peer-reviewed version, if any.
    pub fn vor_doi(&self) -> Option<&str> {
        self.vor
            .as_ref()
            .and_then(|v| v.doi.as_deref())
            .filter(|d| !d.trim().is_empty())
    }

    /// Timestamp used to place the record in the monthly histogram.
    pub fn first_public_date(&self) -> Option<&str> {
        self.published_date
            .as_deref()
            .or(self.submitted_date.as_deref())
    }
}
