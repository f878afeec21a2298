use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Length of the window used when no bounds are given.
pub const DEFAULT_WINDOW_MONTHS: u32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
    pub path: String,
    pub added_lines: u32,
    pub deleted_lines: u32,
    pub is_binary: bool,
}

/// One commit as handed to the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub files: Vec<FileStat>,
}

impl CommitRecord {
    pub fn added_lines(&self) -> u64 {
        self.files.iter().map(|f| f.added_lines as u64).sum()
    }

    pub fn deleted_lines(&self) -> u64 {
        self.files.iter().map(|f| f.deleted_lines as u64).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionStat {
    pub name: String,
    pub added_rows: u64,
    pub deleted_rows: u64,
    pub commits_count: u64,
}

impl ContributionStat {
    /// Attribute a single commit to this identity. The display name is
    /// overwritten so the entry carries the last name seen.
    pub fn add_commit(&mut self, commit: &CommitRecord) {
        self.name = commit.author_name.clone();
        self.added_rows += commit.added_lines();
        self.deleted_rows += commit.deleted_lines();
        self.commits_count += 1;
    }

    /// Sum the counters of `other` into `self`, keeping `self`'s name.
    pub fn merge(&mut self, other: &ContributionStat) {
        self.added_rows += other.added_rows;
        self.deleted_rows += other.deleted_rows;
        self.commits_count += other.commits_count;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub repository_path: String,
    pub since: Option<String>,
    pub until: Option<String>,
    pub contributors: Vec<ContributionStat>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    /// The trailing window of [`DEFAULT_WINDOW_MONTHS`] ending at `now`.
    pub fn trailing_year(now: DateTime<Utc>) -> Self {
        Self::new()
            .with_since(months_before(now, DEFAULT_WINDOW_MONTHS))
            .with_until(now)
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if timestamp < &since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > &until {
                return false;
            }
        }
        true
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar-month subtraction, clamping to the start of the epoch range on
/// overflow.
pub fn months_before(at: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    at.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
