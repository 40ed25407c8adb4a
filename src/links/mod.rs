mod csrankings;
pub use csrankings::{
    csrankings_file_names, find_csrankings_files, load_csrankings_dir, load_csrankings_remote,
    norm_name, CsRankingsEntry, CsRankingsMap, DEFAULT_CSRANKINGS_BASE, NO_SCHOLAR_PAGE,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::{AuthorMeta, Dataset};

#[derive(Args)]
pub struct LinksArgs {
    /// Dataset written by `fetch`
    #[arg(short, long, default_value = "data/sigmetrics.json")]
    pub dataset: PathBuf,

    /// Directory of csrankings-*.csv files, or an http(s) base URL to fetch them from
    #[arg(short, long, default_value = DEFAULT_CSRANKINGS_BASE)]
    pub csrankings: String,

    /// Output JSON path
    #[arg(short, long, default_value = "data/author_links.json")]
    pub output: PathBuf,

    /// HTTP timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dblp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_scholar: Option<String>,
}

impl AuthorLinks {
    pub fn is_empty(&self) -> bool {
        self.dblp.is_none() && self.homepage.is_none() && self.google_scholar.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub authors: usize,
    pub authors_with_pid: usize,
    pub authors_matched_in_csrankings: usize,
    pub csrankings_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorLinksFile {
    pub generated_at: u64,
    pub source: String,
    pub stats: LinkStats,
    pub by_pid: BTreeMap<String, AuthorLinks>,
    pub by_name: BTreeMap<String, AuthorLinks>,
}

pub fn dblp_url_from_pid(pid: &str) -> Option<String> {
    let pid = pid.trim();
    if pid.is_empty() {
        None
    } else {
        Some(format!("https://dblp.org/pid/{pid}.html"))
    }
}

pub fn scholar_url_from_id(scholar_id: &str) -> Option<String> {
    let sid = scholar_id.trim();
    if sid.is_empty() || sid.eq_ignore_ascii_case(NO_SCHOLAR_PAGE) {
        None
    } else {
        Some(format!("https://scholar.google.com/citations?user={sid}&hl=en"))
    }
}

/// Links for one author. The canonical name is tried before the aliases.
pub fn links_for(meta: &AuthorMeta, csrankings: &CsRankingsMap) -> AuthorLinks {
    let mut links = AuthorLinks {
        dblp: meta.pid.as_deref().and_then(dblp_url_from_pid),
        ..AuthorLinks::default()
    };

    let names = std::iter::once(meta.canonical_name.as_str())
        .chain(meta.aliases.iter().map(String::as_str));
    if let Some(entry) = csrankings.find_first(names) {
        if !entry.homepage.is_empty() {
            links.homepage = Some(entry.homepage.clone());
        }
        links.google_scholar = scholar_url_from_id(&entry.scholar_id);
    }
    links
}

pub fn build_author_links(
    author_meta: &BTreeMap<String, AuthorMeta>,
    csrankings: &CsRankingsMap,
    source: &str,
) -> AuthorLinksFile {
    let mut by_pid = BTreeMap::new();
    let mut by_name = BTreeMap::new();
    let mut stats = LinkStats {
        authors: author_meta.len(),
        csrankings_entries: csrankings.len(),
        ..LinkStats::default()
    };

    for meta in author_meta.values() {
        let links = links_for(meta, csrankings);
        if links.dblp.is_some() {
            stats.authors_with_pid += 1;
        }
        if links.homepage.is_some() || links.google_scholar.is_some() {
            stats.authors_matched_in_csrankings += 1;
        }
        if links.is_empty() {
            continue;
        }

        match meta.pid.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(pid) => {
                by_pid.insert(pid.to_string(), links);
            }
            None if !meta.canonical_name.is_empty() => {
                by_name.insert(meta.canonical_name.clone(), links);
            }
            None => {}
        }
    }

    AuthorLinksFile {
        generated_at: u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default(),
        source: source.to_string(),
        stats,
        by_pid,
        by_name,
    }
}

pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

pub fn run(args: LinksArgs) -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dblp_toc=info".parse()?),
        )
        .try_init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(args))?;
    Ok(())
}

pub async fn run_async(args: LinksArgs) -> Result<AuthorLinksFile> {
    let dataset = load_dataset(&args.dataset)?;
    info!("Loaded {} authors from {}", dataset.author_meta.len(), args.dataset.display());

    let csrankings = if is_remote(&args.csrankings) {
        info!("Loading CSRankings name map from {}", args.csrankings);
        load_csrankings_remote(&args.csrankings, args.timeout).await?
    } else {
        info!("Loading CSRankings name map from directory {}", args.csrankings);
        load_csrankings_dir(&args.csrankings)?
    };
    info!("CSRankings entries loaded: {}", csrankings.len());

    let source = format!(
        "CSRankings csrankings-*.csv from {} (name -> homepage + scholarid) + dblp pid from {}",
        args.csrankings,
        args.dataset.display()
    );
    let links = build_author_links(&dataset.author_meta, &csrankings, &source);

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &links)?;
    writer.flush()?;

    info!("Wrote {}", args.output.display());
    info!("byPid entries: {}", links.by_pid.len());
    info!("byName entries: {}", links.by_name.len());

    Ok(links)
}
