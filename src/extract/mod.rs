use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::Record;

mod parser;
pub use parser::{extract_hits, info_str, info_year, parse_authors, RawAuthor};

pub const DEFAULT_PAGE_FILTER_END_YEAR: i32 = 2016;
pub const DEFAULT_MIN_PAGES: u32 = 5;

// Digit runs not glued to a preceding letter or digit, so "e12" yields nothing.
static PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^A-Za-z0-9])(\d+)").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperType {
    ConferenceLike,
    Editorship,
    Other,
}

/// Classifies a dblp `info.type` such as "Conference and Workshop Papers".
/// Missing types are common on older entries and count as conference papers.
pub fn classify_type(info_type: &str) -> PaperType {
    let t = info_type.trim().to_lowercase();
    if t.is_empty() {
        return PaperType::ConferenceLike;
    }
    if t.contains("editorship") {
        return PaperType::Editorship;
    }
    if t.contains("conference") || t.contains("workshop") {
        return PaperType::ConferenceLike;
    }
    if t.contains("journal") || t.contains("book") || t.contains("thesis") {
        return PaperType::Other;
    }
    PaperType::ConferenceLike
}

fn page_numbers(s: &str) -> Vec<u32> {
    PAGE_NUMBER
        .captures_iter(s)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Page count of a dblp page string, or None when it can't be trusted.
///
/// Only the first comma-separated range is considered. For a range the start
/// is the last number left of the dash and the end the last number right of
/// it, which handles article-style pages like "1:83-1:94".
pub fn parse_page_count(pages: &str) -> Option<u32> {
    let first = pages.split(',').next().unwrap_or_default().trim();
    if first.is_empty() {
        return None;
    }

    let (start, end) = match first.split_once(['-', '\u{2013}']) {
        Some((left, right)) => {
            let start = page_numbers(left).last().copied()?;
            let end = page_numbers(right).last().copied()?;
            (start, end)
        }
        None => {
            let numbers = page_numbers(first);
            match numbers.as_slice() {
                [] => return None,
                [_] => return Some(1),
                [.., start, end] => (*start, *end),
            }
        }
    };

    if start == 0 || end < start {
        return None;
    }
    Some(end - start + 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// Reject `PaperType::Other`. Editorships are rejected regardless.
    pub conference_only: bool,
    /// Last year (inclusive) the poster filter applies to.
    pub page_filter_end_year: i32,
    pub min_pages: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            conference_only: true,
            page_filter_end_year: DEFAULT_PAGE_FILTER_END_YEAR,
            min_pages: DEFAULT_MIN_PAGES,
        }
    }
}

impl FilterConfig {
    pub fn keep_by_page_rule(&self, year: i32, pages: &str) -> bool {
        if year > self.page_filter_end_year {
            return true;
        }
        match parse_page_count(pages) {
            Some(count) => count >= self.min_pages,
            None => true,
        }
    }

    pub fn keep_type(&self, paper_type: PaperType) -> bool {
        match paper_type {
            PaperType::ConferenceLike => true,
            PaperType::Editorship => false,
            PaperType::Other => !self.conference_only,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HitOutcome {
    Kept(Record),
    Untitled,
    SkippedType,
    SkippedPages,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCounts {
    pub kept: u64,
    pub skipped_type: u64,
    pub skipped_pages: u64,
}

impl FilterCounts {
    pub fn add(&mut self, other: FilterCounts) {
        self.kept += other.kept;
        self.skipped_type += other.skipped_type;
        self.skipped_pages += other.skipped_pages;
    }
}

/// Turns raw hits into records, tallying rejections.
pub struct HitFilter {
    config: FilterConfig,
    counts: FilterCounts,
}

impl HitFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            counts: FilterCounts::default(),
        }
    }

    /// Counts since the last call; used for per-year reporting.
    pub fn take_counts(&mut self) -> FilterCounts {
        std::mem::take(&mut self.counts)
    }

    pub fn filter_hit(&mut self, hit: &Value, toc_year: i32) -> HitOutcome {
        let outcome = normalize_hit(hit, toc_year, &self.config);
        match outcome {
            HitOutcome::Kept(_) => self.counts.kept += 1,
            HitOutcome::SkippedType => self.counts.skipped_type += 1,
            HitOutcome::SkippedPages => self.counts.skipped_pages += 1,
            HitOutcome::Untitled => {}
        }
        outcome
    }
}

pub fn normalize_hit(hit: &Value, toc_year: i32, config: &FilterConfig) -> HitOutcome {
    let info = match hit.get("info") {
        Some(info @ Value::Object(_)) => info,
        _ => return HitOutcome::Untitled,
    };

    let title = info_str(info, "title");
    if title.is_empty() {
        return HitOutcome::Untitled;
    }

    let kind = info_str(info, "type");
    if !config.keep_type(classify_type(&kind)) {
        return HitOutcome::SkippedType;
    }

    let year = info_year(info).unwrap_or(toc_year);
    let pages = info_str(info, "pages");
    if !config.keep_by_page_rule(year, &pages) {
        return HitOutcome::SkippedPages;
    }

    let authors = info
        .get("authors")
        .map(parse_authors)
        .unwrap_or_default();
    let author_ids = authors.iter().map(|a| a.id.clone()).collect();

    HitOutcome::Kept(Record {
        year,
        title,
        authors,
        author_ids,
        venue: info_str(info, "venue"),
        pages,
        doi: info_str(info, "doi"),
        url: info_str(info, "url"),
        key: info_str(info, "key"),
        kind,
    })
}
