use std::collections::{BTreeMap, HashMap};

use crate::{AuthorMention, AuthorMeta};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorIdentity {
    pub id: String,
    pub pid: Option<String>,
    pub alias_counts: HashMap<String, u32>,
}

impl AuthorIdentity {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            pid: None,
            alias_counts: HashMap::new(),
        }
    }

    /// Most frequent alias; ties go to the shorter string, then the
    /// lexicographically smaller one.
    pub fn canonical_name(&self) -> Option<&str> {
        self.alias_counts
            .iter()
            .min_by(|(a, a_count), (b, b_count)| {
                b_count
                    .cmp(a_count)
                    .then_with(|| a.chars().count().cmp(&b.chars().count()))
                    .then_with(|| a.cmp(b))
            })
            .map(|(name, _)| name.as_str())
    }

    pub fn sorted_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.alias_counts.keys().cloned().collect();
        aliases.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        aliases
    }

    pub fn to_meta(&self) -> AuthorMeta {
        let canonical = self.canonical_name().unwrap_or(&self.id).to_string();
        AuthorMeta {
            id: self.id.clone(),
            pid: self.pid.clone(),
            name: canonical.clone(),
            canonical_name: canonical,
            aliases: self.sorted_aliases(),
        }
    }
}

/// Identities keyed by identity key. Two keys for the same person (a
/// name-keyed mention seen before dblp attached a pid) stay separate.
#[derive(Debug, Clone, Default)]
pub struct IdentityAggregator {
    identities: HashMap<String, AuthorIdentity>,
}

impl IdentityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, id: &str) -> &mut AuthorIdentity {
        self.identities
            .entry(id.to_string())
            .or_insert_with(|| AuthorIdentity::new(id))
    }

    pub fn observe(&mut self, mentions: &[AuthorMention]) {
        for mention in mentions {
            let identity = self.entry(&mention.id);
            if identity.pid.is_none() {
                identity.pid = mention.pid.clone();
            }
            *identity.alias_counts.entry(mention.name.clone()).or_insert(0) += 1;
        }
    }

    /// Folds another shard's identities in. Canonical names are only chosen
    /// in `finalize`, after every shard is merged.
    pub fn merge(&mut self, other: IdentityAggregator) {
        for (id, theirs) in other.identities {
            let ours = self.entry(&id);
            if ours.pid.is_none() {
                ours.pid = theirs.pid;
            }
            for (alias, count) in theirs.alias_counts {
                *ours.alias_counts.entry(alias).or_insert(0) += count;
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&AuthorIdentity> {
        self.identities.get(id)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn finalize(&self) -> BTreeMap<String, AuthorMeta> {
        self.identities
            .iter()
            .map(|(id, identity)| (id.clone(), identity.to_meta()))
            .collect()
    }
}
