use anyhow::{Context, Result};
use glob::glob;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const DEFAULT_CSRANKINGS_BASE: &str =
    "https://raw.githubusercontent.com/emeryberger/CSRankings/gh-pages";
pub const NO_SCHOLAR_PAGE: &str = "NOSCHOLARPAGE";

static DBLP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{4}$").expect("static regex"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("static regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Match key for person names: accents, case, punctuation and dblp's
/// " 0001" disambiguation suffix are all ignored.
pub fn norm_name(name: &str) -> String {
    let stripped: String = name.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let folded = stripped.to_lowercase();
    let folded = DBLP_SUFFIX.replace(folded.trim(), "");
    let spaced = PUNCTUATION.replace_all(&folded, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

#[derive(Debug, Deserialize)]
struct CsRankingsRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    homepage: String,
    #[serde(default)]
    scholarid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsRankingsEntry {
    pub name: String,
    pub homepage: String,
    pub scholar_id: String,
}

/// CSRankings rows keyed by `norm_name`. The first row for a key wins; later
/// rows only fill in a missing homepage or scholar id.
#[derive(Debug, Clone, Default)]
pub struct CsRankingsMap {
    entries: HashMap<String, CsRankingsEntry>,
}

impl CsRankingsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, homepage: &str, scholar_id: &str) {
        let name = name.trim();
        let key = norm_name(name);
        if key.is_empty() {
            return;
        }
        let homepage = homepage.trim();
        let scholar_id = scholar_id.trim();

        match self.entries.get_mut(&key) {
            Some(existing) => {
                if existing.homepage.is_empty() && !homepage.is_empty() {
                    existing.homepage = homepage.to_string();
                }
                if (existing.scholar_id.is_empty() || existing.scholar_id == NO_SCHOLAR_PAGE)
                    && !scholar_id.is_empty()
                {
                    existing.scholar_id = scholar_id.to_string();
                }
            }
            None => {
                self.entries.insert(
                    key,
                    CsRankingsEntry {
                        name: name.to_string(),
                        homepage: homepage.to_string(),
                        scholar_id: scholar_id.to_string(),
                    },
                );
            }
        }
    }

    /// Returns the number of rows loaded. Rows that fail to decode are logged
    /// and skipped; only a read error aborts the file.
    pub fn load_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut rows = 0;
        for row in csv_reader.deserialize::<CsRankingsRow>() {
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping CSRankings row: {}", e);
                    continue;
                }
            };
            if row.name.trim().is_empty() {
                continue;
            }
            self.insert(&row.name, &row.homepage, &row.scholarid);
            rows += 1;
        }
        Ok(rows)
    }

    /// First entry matching any of `names`, in order.
    pub fn find_first<'a, I>(&self, names: I) -> Option<&CsRankingsEntry>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().find_map(|name| {
            let key = norm_name(name);
            if key.is_empty() {
                None
            } else {
                self.entries.get(&key)
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn csrankings_file_names() -> Vec<String> {
    ('a'..='z').map(|c| format!("csrankings-{c}.csv")).collect()
}

pub fn find_csrankings_files<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    let pattern = directory.as_ref().join("csrankings-*.csv");
    let pattern_str = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob(&pattern_str)?.filter_map(Result::ok).collect();
    files.sort();
    Ok(files)
}

/// Loads every `csrankings-*.csv` in a local directory. Files that cannot be
/// opened or read are skipped.
pub fn load_csrankings_dir<P: AsRef<Path>>(directory: P) -> Result<CsRankingsMap> {
    let mut map = CsRankingsMap::new();
    for path in find_csrankings_files(&directory)? {
        let loaded = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))
            .and_then(|file| map.load_csv(file));
        match loaded {
            Ok(rows) => debug!("{}: {} rows", path.display(), rows),
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
    }
    Ok(map)
}

/// Fetches `csrankings-a.csv` .. `csrankings-z.csv` under `base_url`, one at
/// a time. Files that fail to download or parse are skipped.
pub async fn load_csrankings_remote(base_url: &str, timeout_secs: u64) -> Result<CsRankingsMap> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(crate::fetch::USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let mut map = CsRankingsMap::new();
    for file_name in csrankings_file_names() {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), file_name);
        let text = match fetch_text(&client, &url).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping {}: {:#}", url, e);
                continue;
            }
        };
        match map.load_csv(text.as_bytes()) {
            Ok(rows) => debug!("{}: {} rows", file_name, rows),
            Err(e) => warn!("Skipping {}: {:#}", url, e),
        }
    }
    Ok(map)
}

async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.text().await?)
}
