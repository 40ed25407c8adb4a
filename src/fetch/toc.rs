use clap::ValueEnum;
use urlencoding::encode;

pub const DEFAULT_API_BASE: &str = "https://dblp.org/search/publ/api";
pub const MAX_HITS_PER_TOC: u32 = 1000;

/// dblp names a venue's yearly TOC with either a 4-digit or a 2-digit year
/// suffix, and not consistently across years.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum KeyOrder {
    #[default]
    FourDigitFirst,
    TwoDigitFirst,
}

impl KeyOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FourDigitFirst => "four-digit-first",
            Self::TwoDigitFirst => "two-digit-first",
        }
    }
}

pub fn candidate_toc_keys(venue: &str, year: i32, order: KeyOrder) -> Vec<String> {
    let four = format!("db/conf/{venue}/{venue}{year}.bht");
    let two = format!("db/conf/{venue}/{venue}{:02}.bht", year.rem_euclid(100));
    match order {
        KeyOrder::FourDigitFirst => vec![four, two],
        KeyOrder::TwoDigitFirst => vec![two, four],
    }
}

pub fn toc_query_url(api_base: &str, toc_key: &str, max_hits: u32) -> String {
    format!(
        "{}?format=json&h={}&q={}",
        api_base.trim_end_matches('/'),
        max_hits,
        encode(&format!("toc:{toc_key}:"))
    )
}
