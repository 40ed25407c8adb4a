use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::aggregate::Aggregator;
use crate::extract::{FilterConfig, FilterCounts, HitFilter, HitOutcome};
use crate::{Dataset, FilterSettings, Notes, Record};

mod client;
mod toc;
pub use client::{Backoff, DblpClient, FetchError, USER_AGENT};
pub use toc::{candidate_toc_keys, toc_query_url, KeyOrder, DEFAULT_API_BASE, MAX_HITS_PER_TOC};

pub const DEFAULT_START_YEAR: i32 = 1974;

#[derive(Args)]
pub struct FetchArgs {
    /// dblp venue slug, as in db/conf/<venue>/<venue><year>.bht
    #[arg(long, default_value = "sigmetrics")]
    pub venue: String,

    /// First year to fetch
    #[arg(short, long, default_value_t = DEFAULT_START_YEAR)]
    pub start: i32,

    /// Last year to fetch (default: current year)
    #[arg(short, long)]
    pub end: Option<i32>,

    /// Delay between years in seconds; also the backoff base when above 1s
    #[arg(short, long, default_value_t = 0.6, value_parser = parse_delay)]
    pub delay: f64,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    pub timeout: u64,

    /// Retries on 429 and transient network errors
    #[arg(short, long, default_value_t = 6)]
    pub retries: u32,

    /// Output JSON path (default: data/<venue>.json)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// dblp publication search API URL
    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Maximum hits requested per TOC query
    #[arg(long, default_value_t = MAX_HITS_PER_TOC)]
    pub max_hits: u32,

    /// Entries with fewer pages than this are dropped up to --page-filter-end-year
    #[arg(long, default_value_t = crate::extract::DEFAULT_MIN_PAGES)]
    pub min_pages: u32,

    /// Last year (inclusive) the page-length filter applies to
    #[arg(long, default_value_t = crate::extract::DEFAULT_PAGE_FILTER_END_YEAR)]
    pub page_filter_end_year: i32,

    /// Keep journal/book/thesis entries too (editorships are always dropped)
    #[arg(long)]
    pub keep_nonconf: bool,

    /// Which TOC key spelling to try first
    #[arg(long, value_enum, default_value_t = KeyOrder::FourDigitFirst)]
    pub key_order: KeyOrder,
}

/// Seconds as a finite, non-negative number.
pub fn parse_delay(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("`{s}` is not a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("delay must be a finite number >= 0, got `{s}`"));
    }
    Ok(secs)
}

impl FetchArgs {
    pub fn end_year(&self) -> i32 {
        self.end.unwrap_or_else(|| Utc::now().year())
    }

    pub fn out_path(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("data/{}.json", self.venue)))
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            conference_only: !self.keep_nonconf,
            page_filter_end_year: self.page_filter_end_year,
            min_pages: self.min_pages,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::with_base_delay(self.delay.max(1.0))
    }

    pub fn settings(&self) -> HarvestSettings {
        HarvestSettings {
            venue: self.venue.clone(),
            start_year: self.start,
            end_year: self.end_year(),
            key_order: self.key_order,
            max_hits: self.max_hits,
            filter: self.filter_config(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestSettings {
    pub venue: String,
    pub start_year: i32,
    pub end_year: i32,
    pub key_order: KeyOrder,
    pub max_hits: u32,
    pub filter: FilterConfig,
}

/// Hits of the first TOC key that produced any.
#[derive(Debug, Clone, PartialEq)]
pub struct YearHits {
    pub toc_key: String,
    pub hits: Vec<Value>,
}

/// Tries each candidate key in order and stops at the first non-empty hit
/// list. A failed key is treated like an empty one.
pub async fn fetch_year(
    client: &DblpClient,
    venue: &str,
    year: i32,
    order: KeyOrder,
) -> Option<YearHits> {
    for toc_key in candidate_toc_keys(venue, year, order) {
        match client.fetch_toc(&toc_key).await {
            Ok(hits) if !hits.is_empty() => return Some(YearHits { toc_key, hits }),
            Ok(_) => debug!("{}: no hits for {}", year, toc_key),
            Err(e) => debug!("{}: {} failed: {}", year, toc_key, e),
        }
    }
    None
}

/// Accumulates kept records and author tables across years, in year order.
pub struct Harvest {
    settings: HarvestSettings,
    filter: HitFilter,
    aggregator: Aggregator,
    records: Vec<Record>,
    totals: FilterCounts,
    notes: Notes,
}

impl Harvest {
    pub fn new(settings: HarvestSettings) -> Self {
        let notes = Notes {
            max_hits_per_toc: settings.max_hits,
            ..Notes::default()
        };
        Self {
            filter: HitFilter::new(settings.filter.clone()),
            settings,
            aggregator: Aggregator::new(),
            records: Vec::new(),
            totals: FilterCounts::default(),
            notes,
        }
    }

    pub fn ingest_year(&mut self, year: i32, year_hits: Option<YearHits>) -> FilterCounts {
        let Some(YearHits { toc_key, hits }) = year_hits else {
            self.notes.years_with_no_hits += 1;
            return FilterCounts::default();
        };

        for hit in &hits {
            if let HitOutcome::Kept(record) = self.filter.filter_hit(hit, year) {
                self.aggregator.observe(&record);
                self.records.push(record);
            }
        }

        let counts = self.filter.take_counts();
        self.totals.add(counts);
        self.notes.toc_keys.insert(year, toc_key);
        counts
    }

    pub fn into_dataset(self, fetched_at: u64) -> Dataset {
        let (author_meta, authors) = self.aggregator.finish();
        let filter = &self.settings.filter;

        let mut notes = self.notes;
        notes.skipped_non_conf_or_editorship = self.totals.skipped_type;
        notes.skipped_by_page_length = self.totals.skipped_pages;

        Dataset {
            fetched_at,
            start_year: self.settings.start_year,
            end_year: self.settings.end_year,
            venue: self.settings.venue.clone(),
            filters: FilterSettings {
                conference_only: filter.conference_only,
                page_filter_end_year: filter.page_filter_end_year,
                min_pages: filter.min_pages,
                key_order: self.settings.key_order.as_str().to_string(),
            },
            records: self.records,
            author_meta,
            authors,
            notes,
        }
    }
}

pub fn write_dataset(dataset: &Dataset, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, dataset).context("Failed to serialize dataset")?;
    writer.flush().context("Failed to flush dataset")?;
    Ok(())
}

pub fn run(args: FetchArgs) -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dblp_toc=info".parse()?),
        )
        .try_init();

    // One request in flight at a time, so a single-threaded runtime is enough.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(args))?;
    Ok(())
}

pub async fn run_async(args: FetchArgs) -> Result<Dataset> {
    let settings = args.settings();
    let out_path = args.out_path();
    let delay = Duration::try_from_secs_f64(args.delay)
        .with_context(|| format!("Invalid delay {}", args.delay))?;

    let client = DblpClient::new(args.api_base.clone(), args.timeout, args.retries, args.backoff())
        .context("Failed to build dblp client")?
        .with_max_hits(args.max_hits);

    info!(
        "Downloading {} TOC records from {}..{}",
        settings.venue, settings.start_year, settings.end_year
    );
    info!(
        "Page filter: years <= {} drop if pages < {}; type filter: {}",
        settings.filter.page_filter_end_year,
        settings.filter.min_pages,
        if settings.filter.conference_only {
            "conference/workshop only"
        } else {
            "keep non-conference"
        }
    );

    let years = settings.start_year..=settings.end_year;
    let pb = ProgressBar::new(years.clone().count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut harvest = Harvest::new(settings.clone());
    for year in years {
        pb.set_message(year.to_string());
        let year_hits = fetch_year(&client, &settings.venue, year, settings.key_order).await;

        match &year_hits {
            Some(found) => info!("{}: {} hits (toc={})", year, found.hits.len(), found.toc_key),
            None => info!("{}: 0 records (no TOC key matched)", year),
        }
        let counts = harvest.ingest_year(year, year_hits);
        if counts.skipped_type > 0 || counts.skipped_pages > 0 {
            info!(
                "{}: kept={} skipped_type={} skipped_pages={}",
                year, counts.kept, counts.skipped_type, counts.skipped_pages
            );
        }

        pb.inc(1);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    pb.finish_and_clear();

    let fetched_at = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let dataset = harvest.into_dataset(fetched_at);
    write_dataset(&dataset, &out_path)?;

    info!(
        "Wrote {} ({} records, {} authors)",
        out_path.display(),
        dataset.records.len(),
        dataset.authors.len()
    );
    if dataset.notes.skipped_by_page_length > 0 {
        info!("Skipped short entries by page rule: {}", dataset.notes.skipped_by_page_length);
    }
    if dataset.notes.skipped_non_conf_or_editorship > 0 {
        info!(
            "Skipped non-conference/editorship entries: {}",
            dataset.notes.skipped_non_conf_or_editorship
        );
    }
    if dataset.notes.years_with_no_hits > 0 {
        info!("Years with no hits (no TOC key matched): {}", dataset.notes.years_with_no_hits);
    }

    Ok(dataset)
}
