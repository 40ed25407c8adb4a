use std::collections::{BTreeMap, HashMap};

use crate::Record;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorCareerStats {
    pub id: String,
    pub pubs: u32,
    pub first_auth: u32,
    pub last_auth: u32,
    pub solo: u32,
    pub year_counts: BTreeMap<i32, u32>,
    pub coauthor_counts: HashMap<String, u32>,
    pub team_sizes: Vec<usize>,
}

impl AuthorCareerStats {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn active_years(&self) -> usize {
        self.year_counts.len()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.year_counts.keys().next().copied()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.year_counts.keys().next_back().copied()
    }

    pub fn avg_team(&self) -> f64 {
        if self.team_sizes.is_empty() {
            return 0.0;
        }
        self.team_sizes.iter().sum::<usize>() as f64 / self.team_sizes.len() as f64
    }

    pub fn coauthors(&self) -> usize {
        self.coauthor_counts.len()
    }

    fn absorb(&mut self, other: AuthorCareerStats) {
        self.pubs += other.pubs;
        self.first_auth += other.first_auth;
        self.last_auth += other.last_auth;
        self.solo += other.solo;
        for (year, count) in other.year_counts {
            *self.year_counts.entry(year).or_insert(0) += count;
        }
        for (coauthor, count) in other.coauthor_counts {
            *self.coauthor_counts.entry(coauthor).or_insert(0) += count;
        }
        self.team_sizes.extend(other.team_sizes);
    }
}

/// Per-author counters, kept in first-appearance order.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    index: HashMap<String, usize>,
    stats: Vec<AuthorCareerStats>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, id: &str) -> &mut AuthorCareerStats {
        let idx = match self.index.get(id) {
            Some(&idx) => idx,
            None => {
                self.stats.push(AuthorCareerStats::new(id));
                self.index.insert(id.to_string(), self.stats.len() - 1);
                self.stats.len() - 1
            }
        };
        &mut self.stats[idx]
    }

    pub fn observe(&mut self, record: &Record) {
        // Keyed off the mentions so identities and metrics always share ids.
        let ids: Vec<&str> = record.authors.iter().map(|a| a.id.as_str()).collect();
        let team = ids.len();
        for (i, &id) in ids.iter().enumerate() {
            let stats = self.entry(id);
            stats.pubs += 1;
            *stats.year_counts.entry(record.year).or_insert(0) += 1;
            stats.team_sizes.push(team);
            if team == 1 {
                stats.solo += 1;
            }
            if i == 0 {
                stats.first_auth += 1;
            }
            if i == team - 1 {
                stats.last_auth += 1;
            }
            for &other in ids.iter().filter(|&&other| other != id) {
                *stats.coauthor_counts.entry(other.to_string()).or_insert(0) += 1;
            }
        }
    }

    pub fn merge(&mut self, other: MetricsAggregator) {
        for theirs in other.stats {
            let id = theirs.id.clone();
            self.entry(&id).absorb(theirs);
        }
    }

    pub fn get(&self, id: &str) -> Option<&AuthorCareerStats> {
        self.index.get(id).map(|&idx| &self.stats[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthorCareerStats> {
        self.stats.iter()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
