//! Normalizing and merging the three record streams
//!
//! Records are keyed by [`IdentityKey`]. When two records share a key the more
//! complete one wins; equal completeness falls back to the source priority of
//! the [`MergePolicy`]. Output order is date, then title.

use crate::error::{Result, WrapupError};
use crate::record::{normalize_title, title_similarity, Category, HistoryRecord, IdentityKey, Source};
use crate::stats::Aggregates;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Minimum [`title_similarity`] for a Goodreads book to enrich a checkout
/// whose normalized title differs
pub const FUZZY_TITLE_CUTOFF: f64 = 0.9;

/// Tie-break order between sources, highest priority first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    priority: Vec<Source>,
}

impl Default for MergePolicy {
    /// scraped > goodreads > strava
    fn default() -> Self {
        Self { priority: Source::ALL.to_vec() }
    }
}

impl MergePolicy {
    /// Sources left out of `priority` rank after the listed ones, in default order
    pub fn new(priority: Vec<Source>) -> Result<Self> {
        let mut ordered: Vec<Source> = Vec::with_capacity(Source::ALL.len());
        for source in priority {
            if ordered.contains(&source) {
                return Err(WrapupError::Config(format!("source '{}' listed twice in merge priority", source)));
            }
            ordered.push(source);
        }
        for source in Source::ALL {
            if !ordered.contains(&source) {
                ordered.push(source);
            }
        }
        Ok(Self { priority: ordered })
    }

    pub fn priority(&self) -> &[Source] {
        &self.priority
    }

    fn rank(&self, source: Source) -> usize {
        self.priority.iter().position(|s| *s == source).unwrap_or(self.priority.len())
    }

    /// Whether `candidate` should replace `current` for the same identity
    pub fn prefers(&self, candidate: &HistoryRecord, current: &HistoryRecord) -> bool {
        match candidate.completeness().cmp(&current.completeness()) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.rank(candidate.source) < self.rank(current.source),
        }
    }
}

impl FromStr for MergePolicy {
    type Err = WrapupError;

    /// Comma-separated source names, e.g. `goodreads,scraped,strava`
    fn from_str(s: &str) -> Result<Self> {
        let priority = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| part.parse::<Source>().map_err(WrapupError::Config))
            .collect::<Result<Vec<_>>>()?;
        Self::new(priority)
    }
}

/// De-duplicated records plus their aggregates; read-only once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDataset {
    records: Vec<HistoryRecord>,
    aggregates: Aggregates,
}

impl MergedDataset {
    /// Sort `records` into snapshot order and compute aggregates.
    ///
    /// Callers are expected to pass de-duplicated records; use [`Merger`].
    pub fn from_records(mut records: Vec<HistoryRecord>) -> Self {
        records.sort_by(snapshot_order);
        let aggregates = Aggregates::compute(&records);
        Self { records, aggregates }
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn aggregates(&self) -> &Aggregates {
        &self.aggregates
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn snapshot_order(a: &HistoryRecord, b: &HistoryRecord) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.item_title.cmp(&b.item_title))
        .then_with(|| a.category.cmp(&b.category))
        .then_with(|| a.source.cmp(&b.source))
}

#[derive(Debug, Clone, Default)]
pub struct Merger {
    policy: MergePolicy,
}

impl Merger {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Merge the scraped history with both exports
    pub fn merge(
        &self,
        scraped: Vec<HistoryRecord>,
        goodreads: Vec<HistoryRecord>,
        strava: Vec<HistoryRecord>,
    ) -> MergedDataset {
        self.merge_all(scraped.into_iter().chain(goodreads).chain(strava).collect())
    }

    /// Merge any mix of records
    pub fn merge_all(&self, inputs: Vec<HistoryRecord>) -> MergedDataset {
        let donors = Self::rating_donors(&inputs);

        let mut winners: BTreeMap<IdentityKey, HistoryRecord> = BTreeMap::new();
        let total = inputs.len();
        for record in inputs {
            match winners.entry(record.identity()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    if self.policy.prefers(&record, slot.get()) {
                        slot.insert(record);
                    }
                }
            }
        }

        let records: Vec<HistoryRecord> = winners
            .into_values()
            .map(|record| {
                if record.source != Source::Scraped || record.category != Category::Book {
                    return record;
                }
                match find_donor(&donors, &normalize_title(&record.item_title)) {
                    Some(donor) => enrich(record, donor),
                    None => record,
                }
            })
            .collect();

        log::info!("Merged {} input records into {} unique records", total, records.len());
        MergedDataset::from_records(records)
    }

    /// The most complete Goodreads book per normalized title
    fn rating_donors(inputs: &[HistoryRecord]) -> BTreeMap<String, HistoryRecord> {
        let mut donors: BTreeMap<String, HistoryRecord> = BTreeMap::new();
        for record in inputs.iter().filter(|r| r.source == Source::Goodreads && r.category == Category::Book) {
            match donors.entry(normalize_title(&record.item_title)) {
                Entry::Vacant(slot) => {
                    slot.insert(record.clone());
                }
                Entry::Occupied(mut slot) => {
                    if record.completeness() > slot.get().completeness() {
                        slot.insert(record.clone());
                    }
                }
            }
        }
        donors
    }
}

/// Exact normalized title first, then the closest title above the cutoff.
/// Ties keep the alphabetically first title.
fn find_donor<'a>(donors: &'a BTreeMap<String, HistoryRecord>, title: &str) -> Option<&'a HistoryRecord> {
    if let Some(donor) = donors.get(title) {
        return Some(donor);
    }

    let mut best: Option<(f64, &HistoryRecord)> = None;
    for (candidate, donor) in donors {
        let score = title_similarity(title, candidate);
        if score >= FUZZY_TITLE_CUTOFF && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, donor));
        }
    }
    if let Some((score, donor)) = best {
        log::debug!("Matched '{}' to '{}' ({:.2})", title, donor.item_title, score);
    }
    best.map(|(_, donor)| donor)
}

/// A copy of `record` with the gaps filled from `donor`
fn enrich(record: HistoryRecord, donor: &HistoryRecord) -> HistoryRecord {
    let author = record.author.clone().or_else(|| donor.author.clone());
    let rating = record.rating.or(donor.rating);
    let pages = record.pages.or(donor.pages);

    record.with_author(author).with_rating(rating).with_pages(pages)
}
