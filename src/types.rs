use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::error::{DeployError, Result};

/// Answer key that opts an app into automatic upgrades.
pub const AUTO_UPDATE_ANSWER: &str = "rancher.autoUpdate";

/// A Rancher collection response. Only the first page is ever read.
#[derive(Debug, Deserialize, Clone)]
pub struct Collection<T> {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        bound(deserialize = "T: Deserialize<'de>")
    )]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Pagination {
    #[serde(default)]
    pub next: Option<String>,
}

/// Rancher sends `null` for empty maps and strings; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T> Collection<T> {
    /// Link to the page after this one, if the server reported one.
    pub fn next_page(&self) -> Option<&str> {
        self.pagination.as_ref()?.next.as_deref()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Project {
    pub name: String,
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answers: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: BTreeMap<String, String>,
}

impl App {
    pub fn auto_update(&self) -> bool {
        self.answers.get(AUTO_UPDATE_ANSWER).map(String::as_str) == Some("true")
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSync {
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transitioning: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transitioning_message: String,
}

impl CatalogSync {
    pub fn is_transitioning(&self) -> bool {
        self.transitioning == "yes"
    }
}

/// Body POSTed to an app's `upgrade` action.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    pub external_id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub answers: BTreeMap<String, String>,
}

/// The `catalog://?catalog=..&template=..&version=..` reference an app was
/// deployed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalId {
    pub catalog: String,
    pub template: String,
    pub version: String,
}

impl ExternalId {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: String| DeployError::InvalidExternalId {
            external_id: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        let param = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
                .ok_or_else(|| invalid(format!("missing {key} parameter")))
        };

        Ok(Self {
            catalog: param("catalog")?,
            template: param("template")?,
            version: param("version")?,
        })
    }

    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "catalog://?catalog={}&template={}&version={}",
            self.catalog, self.template, self.version
        )
    }
}
