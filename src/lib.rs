use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod aggregate;
pub mod extract;
pub mod fetch;
pub mod links;

/// Identity key for an author mention: `pid:<pid>` when dblp knows the
/// person, otherwise `name:<display name>`.
pub fn identity_key(pid: Option<&str>, name: &str) -> String {
    match pid {
        Some(pid) => format!("pid:{pid}"),
        None => format!("name:{}", name.trim()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorMention {
    pub id: String,
    pub pid: Option<String>,
    pub name: String,
}

impl AuthorMention {
    pub fn new(name: &str, pid: Option<&str>) -> Self {
        let name = name.trim();
        let pid = pid.map(str::trim).filter(|p| !p.is_empty());
        Self {
            id: identity_key(pid, name),
            pid: pid.map(String::from),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub year: i32,
    pub title: String,
    pub authors: Vec<AuthorMention>,
    pub author_ids: Vec<String>,
    pub venue: String,
    pub pages: String,
    pub doi: String,
    pub url: String,
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorMeta {
    pub id: String,
    pub pid: Option<String>,
    pub name: String,
    pub canonical_name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub pid: Option<String>,
    pub name: String,
    pub aliases: Vec<String>,
    pub pubs: u32,
    pub first_auth: u32,
    pub last_auth: u32,
    pub solo: u32,
    pub coauthors: usize,
    pub avg_team: f64,
    pub active_years: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    pub conference_only: bool,
    pub page_filter_end_year: i32,
    pub min_pages: u32,
    pub key_order: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notes {
    pub max_hits_per_toc: u32,
    pub skipped_non_conf_or_editorship: u64,
    pub skipped_by_page_length: u64,
    pub years_with_no_hits: u64,
    pub toc_keys: BTreeMap<i32, String>,
}

/// The single JSON artifact written by `fetch` and read by `links`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub fetched_at: u64,
    pub start_year: i32,
    pub end_year: i32,
    pub venue: String,
    pub filters: FilterSettings,
    pub records: Vec<Record>,
    pub author_meta: BTreeMap<String, AuthorMeta>,
    pub authors: Vec<AuthorSummary>,
    pub notes: Notes,
}
