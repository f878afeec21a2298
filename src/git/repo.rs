use crate::error::{ContribError, Result};
use crate::model::{months_before, CommitRecord, DateRange, FileStat, DEFAULT_WINDOW_MONTHS};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gix::object::tree::diff::ChangeDetached;
use gix::object::tree::EntryMode;
use gix::{ObjectId, Repository};
use similar::{ChangeTag, TextDiff};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Bytes inspected when deciding whether a blob is binary, same as git.
const BINARY_PROBE_LEN: usize = 8000;

/// Which commits a walk visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Start from every reference plus HEAD instead of HEAD alone.
    pub all_refs: bool,
    pub include_merges: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            all_refs: true,
            include_merges: true,
        }
    }
}

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open the repository rooted at `path`. Parent directories are not
    /// searched.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = gix::open(path.as_ref())?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        debug!(path = %path.display(), "opened repository");

        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve `--since`/`--until` into a window. Missing bounds fall back to
    /// a trailing window of [`DEFAULT_WINDOW_MONTHS`] ending now.
    pub fn resolve_range(&self, since: Option<&str>, until: Option<&str>) -> Result<DateRange> {
        let now = Utc::now();

        let since_dt = since.map(|s| self.parse_commit_or_date(s, now)).transpose()?;
        let until_dt = until.map(|u| self.parse_commit_or_date(u, now)).transpose()?;

        let (since_dt, until_dt) = match (since_dt, until_dt) {
            (Some(s), Some(u)) => (s, u),
            (Some(s), None) => (s, now),
            (None, Some(u)) => (months_before(u, DEFAULT_WINDOW_MONTHS), u),
            (None, None) => {
                let range = DateRange::trailing_year(now);
                debug!(since = ?range.since, until = ?range.until, "using default date range");
                return Ok(range);
            }
        };

        if since_dt > until_dt {
            return Err(ContribError::InvalidDate(format!(
                "Invalid range: since ({}) is after until ({})",
                since_dt, until_dt
            )));
        }

        let range = DateRange::new().with_since(since_dt).with_until(until_dt);
        debug!(since = %since_dt, until = %until_dt, "resolved date range");
        Ok(range)
    }

    fn parse_commit_or_date(&self, input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        // RFC3339
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(dt.with_timezone(&Utc));
        }

        // YYYY-MM-DD
        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&datetime));
            }
        }

        // "3 weeks ago", "90days", ...
        if let Some(dt) = parse_relative(input, now) {
            return Ok(dt);
        }

        // Fallback to Git ref
        let id = self
            .repo
            .rev_parse_single(input)
            .map_err(|e| ContribError::Parse(format!("Invalid commit or date '{input}': {e}")))?;

        let commit = id
            .object()?
            .try_into_commit()
            .map_err(|_| ContribError::Parse(format!("Not a commit: {input}")))?;

        let secs = commit.time()?.seconds;
        DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| ContribError::InvalidDate(format!("Invalid timestamp: {secs}")))
    }

    /// Lazily walk the commits whose committer time falls inside `range`.
    pub fn commits<'r>(&'r self, range: &DateRange, options: WalkOptions) -> Result<CommitWalk<'r>> {
        let tips = self.tips(options.all_refs)?;
        debug!(tips = tips.len(), all_refs = options.all_refs, "starting commit walk");

        Ok(CommitWalk {
            repo: self,
            range: range.clone(),
            include_merges: options.include_merges,
            seen: HashSet::new(),
            stack: tips.into_iter().rev().collect(),
            done: false,
        })
    }

    fn tips(&self, all_refs: bool) -> Result<Vec<ObjectId>> {
        let mut tips = Vec::new();

        let mut head = self.repo.head()?;
        if !head.is_unborn() {
            tips.push(head.peel_to_commit_in_place()?.id);
        }

        if !all_refs {
            return Ok(tips);
        }

        let platform = self
            .repo
            .references()
            .map_err(|e| ContribError::GitRepo(format!("Failed to list references: {e}")))?;
        let refs = platform
            .all()
            .map_err(|e| ContribError::GitRepo(format!("Failed to list references: {e}")))?;

        for reference in refs {
            let mut reference =
                reference.map_err(|e| ContribError::GitRepo(format!("Failed to read reference: {e}")))?;
            let id = reference.peel_to_id_in_place().map_err(|e| {
                ContribError::GitRepo(format!("Failed to peel {}: {e}", reference.name().as_bstr()))
            })?;

            // Tags may point at trees or blobs
            if self.repo.find_object(id)?.kind != gix::object::Kind::Commit {
                continue;
            }
            let id = id.detach();
            if !tips.contains(&id) {
                tips.push(id);
            }
        }

        Ok(tips)
    }

    fn load_record(&self, commit_id: ObjectId) -> Result<(CommitRecord, Vec<ObjectId>)> {
        let commit = self.repo.find_commit(commit_id)?;
        let secs = commit.time()?.seconds;
        let timestamp = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ContribError::InvalidDate(format!("Invalid timestamp: {secs}")))?;
        let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.detach()).collect();
        let author = commit.author()?;

        let record = CommitRecord {
            id: commit_id.to_string(),
            author_name: author.name.to_string(),
            author_email: author.email.to_string(),
            timestamp,
            files: Vec::new(),
        };
        Ok((record, parents))
    }

    /// Per-file line stats against the first parent, or against the empty
    /// tree for a root commit.
    fn file_stats(&self, commit_id: ObjectId, first_parent: Option<ObjectId>) -> Result<Vec<FileStat>> {
        let commit_tree = self.repo.find_commit(commit_id)?.tree()?;
        // Renames are reported as a deletion plus an addition
        let options = gix::diff::Options::default().with_rewrites(None);
        let changes: Vec<ChangeDetached> = match first_parent {
            Some(parent_id) => {
                let parent_tree = self.repo.find_commit(parent_id)?.tree()?;
                self.repo
                    .diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), options)?
            }
            None => self.repo.diff_tree_to_tree(None, Some(&commit_tree), options)?,
        };

        let mut files = Vec::new();
        for change in changes {
            self.handle_change(change, &mut files)?;
        }
        Ok(files)
    }

    fn handle_change(&self, change: ChangeDetached, files: &mut Vec<FileStat>) -> Result<()> {
        let stat = match change {
            ChangeDetached::Addition {
                id,
                location,
                entry_mode,
                ..
            } => {
                if !is_content(entry_mode) {
                    return Ok(());
                }
                whole_file(location.to_string(), &self.blob(id)?, true)
            }
            ChangeDetached::Deletion {
                id,
                location,
                entry_mode,
                ..
            } => {
                if !is_content(entry_mode) {
                    return Ok(());
                }
                whole_file(location.to_string(), &self.blob(id)?, false)
            }
            ChangeDetached::Modification {
                previous_id,
                previous_entry_mode,
                id,
                entry_mode,
                location,
                ..
            } => {
                let old = if is_content(previous_entry_mode) {
                    self.blob(previous_id)?
                } else {
                    Vec::new()
                };
                let new = if is_content(entry_mode) {
                    self.blob(id)?
                } else {
                    Vec::new()
                };
                if !is_content(previous_entry_mode) && !is_content(entry_mode) {
                    return Ok(());
                }
                text_stat(location.to_string(), &old, &new)
            }
            ChangeDetached::Rewrite {
                source_id,
                source_entry_mode,
                source_location,
                id,
                entry_mode,
                location,
                copy,
                ..
            } => {
                if is_content(source_entry_mode) && !copy {
                    let old = self.blob(source_id)?;
                    files.push(whole_file(source_location.to_string(), &old, false));
                }
                if is_content(entry_mode) {
                    let new = self.blob(id)?;
                    files.push(whole_file(location.to_string(), &new, true));
                }
                return Ok(());
            }
        };
        files.push(stat);
        Ok(())
    }

    fn blob(&self, id: ObjectId) -> Result<Vec<u8>> {
        let object = self.repo.find_object(id)?;
        Ok(object.detach().data)
    }
}

/// Iterator over the commits of a repository inside a date window.
///
/// Each commit is visited once. Parents are followed even for commits
/// outside the window, so older in-range history stays reachable. After the
/// first error the walk yields nothing more.
pub struct CommitWalk<'r> {
    repo: &'r GitRepo,
    range: DateRange,
    include_merges: bool,
    seen: HashSet<ObjectId>,
    stack: VecDeque<ObjectId>,
    done: bool,
}

impl CommitWalk<'_> {
    fn step(&mut self, commit_id: ObjectId) -> Result<Option<CommitRecord>> {
        let (mut record, parents) = self
            .repo
            .load_record(commit_id)
            .map_err(|e| ContribError::in_commit(commit_id, e))?;
        for pid in parents.iter().rev() {
            self.stack.push_back(*pid);
        }

        if !self.range.contains(&record.timestamp) {
            return Ok(None);
        }
        if !self.include_merges && parents.len() > 1 {
            trace!(commit = %record.id, "skipping merge commit");
            return Ok(None);
        }

        record.files = self
            .repo
            .file_stats(commit_id, parents.first().copied())
            .map_err(|e| ContribError::in_commit(commit_id, e))?;
        Ok(Some(record))
    }
}

impl Iterator for CommitWalk<'_> {
    type Item = Result<CommitRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(commit_id) = self.stack.pop_back() {
            if !self.seen.insert(commit_id) {
                continue;
            }

            match self.step(commit_id) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        None
    }
}

fn is_content(mode: EntryMode) -> bool {
    !mode.is_tree() && !mode.is_commit()
}

fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_PROBE_LEN).any(|&b| b == 0)
}

fn count_lines(data: &[u8]) -> u32 {
    String::from_utf8_lossy(data).lines().count() as u32
}

/// A file that appears or disappears entirely.
fn whole_file(path: String, data: &[u8], added: bool) -> FileStat {
    let is_binary = is_binary(data);
    let lines = if is_binary { 0 } else { count_lines(data) };
    FileStat {
        path,
        added_lines: if added { lines } else { 0 },
        deleted_lines: if added { 0 } else { lines },
        is_binary,
    }
}

fn text_stat(path: String, old: &[u8], new: &[u8]) -> FileStat {
    if is_binary(old) || is_binary(new) {
        return FileStat {
            path,
            added_lines: 0,
            deleted_lines: 0,
            is_binary: true,
        };
    }

    let (added_lines, deleted_lines) = line_diff(old, new);
    FileStat {
        path,
        added_lines,
        deleted_lines,
        is_binary: false,
    }
}

fn line_diff(old: &[u8], new: &[u8]) -> (u32, u32) {
    let old_text = String::from_utf8_lossy(old);
    let new_text = String::from_utf8_lossy(new);
    let diff = TextDiff::from_lines(old_text.as_ref(), new_text.as_ref());

    let mut added = 0u32;
    let mut deleted = 0u32;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => deleted += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, deleted)
}

/// Relative dates: "N days ago", "N weeks ago", "N months ago" (calendar
/// months), or anything `humantime` understands such as "90days" or "-2w".
fn parse_relative(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let input = input.trim().to_lowercase();

    if let Some(months) = input.strip_suffix(" months ago") {
        let n = months.trim().parse::<u32>().ok()?;
        return Some(months_before(now, n));
    }

    let duration = parse_natural_duration(&input)?;
    let duration = chrono::Duration::from_std(duration).ok()?;
    now.checked_sub_signed(duration)
}

fn parse_natural_duration(input: &str) -> Option<Duration> {
    if let Some(days) = input.strip_suffix(" days ago") {
        if let Ok(n) = days.trim().parse::<u64>() {
            return n.checked_mul(86400).map(Duration::from_secs);
        }
    }

    if let Some(weeks) = input.strip_suffix(" weeks ago") {
        if let Ok(n) = weeks.trim().parse::<u64>() {
            return n.checked_mul(7 * 86400).map(Duration::from_secs);
        }
    }

    let compact = input.strip_suffix(" ago").unwrap_or(input);
    humantime::parse_duration(compact.trim_start_matches('-')).ok()
}
