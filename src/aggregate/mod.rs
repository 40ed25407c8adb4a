//! Author identity resolution and per-author career metrics.
//!
//! Both tables are fed once per kept record and joined by identity key at
//! the end of a run.

mod identity;
mod metrics;
pub use identity::{AuthorIdentity, IdentityAggregator};
pub use metrics::{AuthorCareerStats, MetricsAggregator};

use std::collections::BTreeMap;

use crate::{AuthorMeta, AuthorSummary, Record};

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    pub identities: IdentityAggregator,
    pub metrics: MetricsAggregator,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, record: &Record) {
        self.identities.observe(&record.authors);
        self.metrics.observe(record);
    }

    pub fn merge(&mut self, other: Aggregator) {
        self.identities.merge(other.identities);
        self.metrics.merge(other.metrics);
    }

    pub fn finish(&self) -> (BTreeMap<String, AuthorMeta>, Vec<AuthorSummary>) {
        let author_meta = self.identities.finalize();

        let authors = self
            .metrics
            .iter()
            .map(|stats| {
                let meta = author_meta.get(&stats.id);
                AuthorSummary {
                    id: stats.id.clone(),
                    pid: meta.and_then(|m| m.pid.clone()),
                    name: meta
                        .map(|m| m.canonical_name.clone())
                        .unwrap_or_else(|| stats.id.clone()),
                    aliases: meta.map(|m| m.aliases.clone()).unwrap_or_default(),
                    pubs: stats.pubs,
                    first_auth: stats.first_auth,
                    last_auth: stats.last_auth,
                    solo: stats.solo,
                    coauthors: stats.coauthors(),
                    avg_team: stats.avg_team(),
                    active_years: stats.active_years(),
                    first_year: stats.first_year(),
                    last_year: stats.last_year(),
                }
            })
            .collect();

        (author_meta, authors)
    }
}
