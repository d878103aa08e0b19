//! Read-only views computed from a snapshot for the dashboard.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::{DateTime, Datelike, NaiveDate};

use crate::{
    normalize,
    snapshot::{JournalCache, Snapshot},
};

/// Label of the bucket holding everything outside the top entries.
pub const OTHERS: &str = "Others";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Year and month of an ISO-8601 timestamp or date, as written (no timezone conversion).
    pub fn parse(timestamp: &str) -> Option<Self> {
        let date = parse_date(timestamp)?;
        Some(YearMonth {
            year: date.year(),
            month: date.month(),
        })
    }

    /// First day of the month.
    pub fn first_day(&self) -> String {
        format!("{self}-01")
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Calendar date of a timestamp in its own offset.
pub fn parse_date(timestamp: &str) -> Option<NaiveDate> {
    let s = timestamp.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Preprints per month of first public appearance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MonthlyCounts {
    /// Months before the latest one, oldest first.
    pub completed: Vec<(YearMonth, usize)>,
    /// The latest month, possibly still in progress.
    pub current: Option<(YearMonth, usize)>,
    /// Records without a usable timestamp.
    pub undated: usize,
}

impl MonthlyCounts {
    /// All buckets in chronological order, current month last.
    #[cfg(test)]
    pub fn buckets(&self) -> impl Iterator<Item = (YearMonth, usize)> + '_ {
        self.completed.iter().copied().chain(self.current)
    }
}

pub fn monthly(snapshot: &Snapshot) -> MonthlyCounts {
    let mut months = BTreeMap::<YearMonth, usize>::new();
    let mut undated = 0;
    for p in snapshot.values() {
        match p.first_public_date().and_then(YearMonth::parse) {
            Some(ym) => *months.entry(ym).or_default() += 1,
            None => {
                log::warn!("preprint {} has no usable publication date", p.id);
                undated += 1;
            }
        }
    }
    let current = months.pop_last();
    MonthlyCounts {
        completed: months.into_iter().collect(),
        current,
        undated,
    }
}

/// Occurrence counter over string labels.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_single(&mut self, label: String) {
        self.add_single_with_count(label, 1);
    }

    pub fn add_single_with_count(&mut self, label: String, count: usize) {
        *self.counts.entry(label).or_insert(0) += count;
    }

    /// Count for `label`, or 0 if never seen.
    #[cfg(test)]
    pub fn get(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Every entry, most common first; ties are ordered by label.
    pub fn most_common(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<_> = self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by_key(|&(label, count)| (Reverse(count), label));
        entries
    }

    /// The `n` most common entries followed by an [`OTHERS`] bucket holding the remainder.
    pub fn top_with_others(&self, n: usize) -> Vec<(String, usize)> {
        let mut top: Vec<(String, usize)> = self
            .most_common()
            .into_iter()
            .take(n)
            .map(|(label, count)| (label.to_string(), count))
            .collect();
        let shown: usize = top.iter().map(|(_, c)| c).sum();
        top.push((OTHERS.to_string(), self.total().saturating_sub(shown)));
        top
    }

    /// Entries seen at least `min` times, most common first.
    pub fn at_least(&self, min: usize) -> Vec<(&str, usize)> {
        self.most_common()
            .into_iter()
            .filter(|&(_, count)| count >= min)
            .collect()
    }
}

impl FromIterator<String> for Tally {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut tally = Tally::new();
        tally.extend(iter);
        tally
    }
}

impl Extend<String> for Tally {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        for label in iter {
            self.add_single(label);
        }
    }
}

/// Papers per country. A paper counts once per distinct country among its affiliations.
pub fn countries(snapshot: &Snapshot) -> Tally {
    let mut tally = Tally::new();
    for p in snapshot.values() {
        let distinct: BTreeSet<String> = p
            .countries()
            .map(normalize::country)
            .filter(|c| !c.is_empty())
            .collect();
        tally.extend(distinct);
    }
    tally
}

/// Published papers per journal, after merging variant spellings.
pub fn journals(cache: &JournalCache) -> Tally {
    cache.journals().map(normalize::journal).collect()
}

/// Headline numbers of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub preprints: usize,
    /// Revisions beyond each preprint's first version.
    pub revisions: u64,
    /// Most recent status change seen in the data.
    pub as_of: Option<NaiveDate>,
}

impl Summary {
    pub fn of(snapshot: &Snapshot) -> Self {
        let revisions = snapshot.values().map(|p| p.version.number() - 1).sum();
        let latest = |field: fn(&crate::preprint::Preprint) -> Option<&str>| {
            snapshot
                .values()
                .filter_map(field)
                .filter_map(parse_date)
                .max()
        };
        let as_of = latest(|p| p.status_date.as_deref())
            .or_else(|| latest(|p| p.published_date.as_deref()));
        Summary {
            preprints: snapshot.len(),
            revisions,
            as_of,
        }
    }
}
