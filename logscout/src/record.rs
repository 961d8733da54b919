/// Analysis outcome types.
///
/// A [`Record`] is created once per analyzed file (or per summarized large file)
/// and never changes afterward. It moves by value: out of an engine, into a
/// persistence batch, into a merged view. Nothing in the crate hands out a
/// mutable reference to a record that another task can also see.
///
/// [`AggregateCount`] is the partial sum the large-file strategies pass around.
/// Its addition is associative and commutative with [`AggregateCount::ZERO`] as
/// identity, so partial sums may be combined in any order.
use chrono::{Local, NaiveDateTime};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// One immutable analysis outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    name: String,
    word_count: u64,
    keyword_count: u64,
    processed_at: NaiveDateTime,
}

impl Record {
    /// Creates a record stamped with the current local time
    pub fn new(name: impl Into<String>, word_count: u64, keyword_count: u64) -> Self {
        Self::with_timestamp(name, word_count, keyword_count, Local::now().naive_local())
    }

    pub fn with_timestamp(
        name: impl Into<String>,
        word_count: u64,
        keyword_count: u64,
        processed_at: NaiveDateTime,
    ) -> Self {
        Self {
            name: name.into(),
            word_count,
            keyword_count,
            processed_at,
        }
    }

    /// Builds a record from a large-file summary
    pub fn from_aggregate(name: impl Into<String>, total: AggregateCount) -> Self {
        Self::new(name, total.total_words, total.total_keywords)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn word_count(&self) -> u64 {
        self.word_count
    }

    pub fn keyword_count(&self) -> u64 {
        self.keyword_count
    }

    pub fn processed_at(&self) -> NaiveDateTime {
        self.processed_at
    }

    /// The counts without the timestamp, for comparing runs
    pub fn counts(&self) -> (&str, u64, u64) {
        (&self.name, self.word_count, self.keyword_count)
    }
}

/// Partial or total counts produced by the large-file strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCount {
    pub total_words: u64,
    pub total_keywords: u64,
}

impl AggregateCount {
    pub const ZERO: AggregateCount = AggregateCount {
        total_words: 0,
        total_keywords: 0,
    };

    pub fn new(total_words: u64, total_keywords: u64) -> Self {
        Self {
            total_words,
            total_keywords,
        }
    }
}

impl Add for AggregateCount {
    type Output = AggregateCount;

    fn add(self, rhs: AggregateCount) -> AggregateCount {
        AggregateCount {
            total_words: self.total_words + rhs.total_words,
            total_keywords: self.total_keywords + rhs.total_keywords,
        }
    }
}

impl AddAssign for AggregateCount {
    fn add_assign(&mut self, rhs: AggregateCount) {
        *self = *self + rhs;
    }
}

impl Sum for AggregateCount {
    fn sum<I: Iterator<Item = AggregateCount>>(iter: I) -> Self {
        iter.fold(AggregateCount::ZERO, Add::add)
    }
}

/// Provenance label attached while merging sources
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceTag(String);

impl SourceTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as it sits in a table, with the id the store assigned on commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    #[serde(flatten)]
    pub record: Record,
}

/// A stored record labeled with the source it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedRecord {
    pub id: u64,
    pub record: Record,
    pub source: SourceTag,
}

/// Result of a directory run: the records plus the files that contributed none
#[derive(Debug, Clone, Default)]
pub struct DirectoryAnalysis {
    pub records: Vec<Record>,
    pub failures: Vec<FileFailure>,
}

impl DirectoryAnalysis {
    pub fn new() -> Self {
        Default::default()
    }

    /// Total files the run attempted
    pub fn files_attempted(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// One file that failed inside a directory run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: std::path::PathBuf,
    pub reason: String,
}

/// Builds `count` synthetic records named `log_<i>.txt` (1-based) for load runs
pub fn generate_records(count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    (1..=count)
        .map(|i| {
            Record::new(
                format!("log_{}.txt", i),
                rng.gen_range(100..1000),
                rng.gen_range(1..=10),
            )
        })
        .collect()
}
