//! Time-gap clustering of photo records into focus stacks.
//!
//! Photos taken for focus stacking are shot in quick bursts. The engine walks
//! a timestamp-ordered sequence once and cuts it wherever two neighbours are
//! further apart than the configured threshold; runs that are too short to be
//! a stack are dropped and only counted.

use std::collections::BTreeMap;
use time::{Duration, PrimitiveDateTime};
use tracing::warn;

pub const DEFAULT_MAX_TIME_DELTA: Duration = Duration::seconds(2);
pub const DEFAULT_MIN_STACK_LEN: usize = 5;
pub const DEFAULT_WARN_STACK_LEN: usize = 10;

/// A photo identified by its file name together with its capture instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub name: String,
    pub timestamp: PrimitiveDateTime,
}

impl PhotoRecord {
    pub fn new(name: impl Into<String>, timestamp: PrimitiveDateTime) -> Self {
        Self {
            name: name.into(),
            timestamp,
        }
    }
}

/// Thresholds that drive [`cluster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterParams {
    /// Largest gap between neighbours that still keeps them in one stack.
    pub max_delta: Duration,
    /// Shortest run that is kept as a stack.
    pub min_len: usize,
    /// Stacks longer than this are kept but reported.
    pub warn_len: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            max_delta: DEFAULT_MAX_TIME_DELTA,
            min_len: DEFAULT_MIN_STACK_LEN,
            warn_len: DEFAULT_WARN_STACK_LEN,
        }
    }
}

/// A non-empty, timestamp-ordered run of photos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    records: Vec<PhotoRecord>,
}

impl Stack {
    fn from_run(records: Vec<PhotoRecord>) -> Option<Self> {
        if records.is_empty() {
            None
        } else {
            Some(Self { records })
        }
    }

    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> &PhotoRecord {
        &self.records[0]
    }

    pub fn last(&self) -> &PhotoRecord {
        &self.records[self.records.len() - 1]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.name.as_str())
    }
}

/// Stacks retained by a clustering pass together with its statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusteringResult {
    pub stacks: Vec<Stack>,
    /// Stack length -> number of retained stacks with that length.
    pub size_histogram: BTreeMap<usize, usize>,
    /// Runs dropped because they were shorter than the minimum.
    pub discarded_runs: usize,
    /// Photos that belonged to dropped runs.
    pub discarded_photos: usize,
    /// Indices into `stacks` of stacks longer than the warning length.
    pub oversized: Vec<usize>,
}

impl ClusteringResult {
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Number of photos that ended up in a retained stack.
    pub fn grouped_photos(&self) -> usize {
        self.stacks.iter().map(Stack::len).sum()
    }

    fn close_run(&mut self, run: Vec<PhotoRecord>, params: &ClusterParams) {
        if run.is_empty() {
            return;
        }
        if run.len() < params.min_len {
            self.discarded_runs += 1;
            self.discarded_photos += run.len();
            return;
        }
        let Some(stack) = Stack::from_run(run) else {
            return;
        };
        *self.size_histogram.entry(stack.len()).or_insert(0) += 1;
        if stack.len() > params.warn_len {
            warn!(
                length = stack.len(),
                first = %stack.first().name,
                last = %stack.last().name,
                "unusually long stack"
            );
            self.oversized.push(self.stacks.len());
        }
        self.stacks.push(stack);
    }
}

/// Partitions `records` into stacks.
///
/// `records` must be sorted ascending by timestamp. Equal timestamps are
/// treated as neighbours. Unsorted input does not panic, but the grouping it
/// produces is undefined.
pub fn cluster(records: &[PhotoRecord], params: &ClusterParams) -> ClusteringResult {
    let mut result = ClusteringResult::default();
    let mut run: Vec<PhotoRecord> = Vec::new();

    for record in records {
        if let Some(previous) = run.last() {
            let delta = record.timestamp - previous.timestamp;
            if delta > params.max_delta {
                result.close_run(std::mem::take(&mut run), params);
            }
        }
        run.push(record.clone());
    }
    result.close_run(run, params);

    result
}
