use crate::cli::CommonArgs;
use crate::error::Result;
use crate::git::{GitRepo, WalkOptions};
use crate::model::{CommitRecord, ContributionStat, DateRange};
use crate::output::{output_json, output_ndjson, output_table, sorted};
use crate::progress::Spinner;
use anyhow::Context;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Contributions keyed by lower-cased author name.
pub type ContributionMap = HashMap<String, ContributionStat>;

static SIGNING_KEY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.*?) signingkey .*").expect("signing key pattern is valid")
});

pub fn exec(common: CommonArgs, json: bool, ndjson: bool, quiet: bool) -> anyhow::Result<()> {
    let repo = GitRepo::open(&common.repo).context("Failed to open git repository")?;

    let range = repo
        .resolve_range(common.since.as_deref(), common.until.as_deref())
        .context("Failed to resolve date range")?;

    let spinner = Spinner::start("Please wait", quiet);
    let result = repo
        .commits(&range, common.walk_options())
        .map_err(anyhow::Error::from)
        .and_then(|walk| aggregate(walk).map_err(anyhow::Error::from));
    spinner.finish();
    let contributors = sorted(result.context("Failed to aggregate contributions")?);

    if json {
        output_json(&contributors, &repo, &range)?;
    } else if ndjson {
        output_ndjson(&contributors)?;
    } else {
        output_table(&contributors, &range)?;
    }

    Ok(())
}

/// Open the repository at `path` and aggregate every commit in `range`.
pub fn contribution_stats<P: AsRef<Path>>(
    path: P,
    range: &DateRange,
    options: &WalkOptions,
) -> Result<ContributionMap> {
    let repo = GitRepo::open(path)?;
    let walk = repo.commits(range, *options)?;
    aggregate(walk)
}

/// Fold commits into per-author totals.
///
/// Commits are grouped by normalized email first, then the email groups are
/// merged by lower-cased display name. Distinct people sharing a display
/// name end up in the same entry. The first `Err` aborts the fold.
pub fn aggregate<I>(commits: I) -> Result<ContributionMap>
where
    I: IntoIterator<Item = Result<CommitRecord>>,
{
    let mut by_email: HashMap<String, ContributionStat> = HashMap::new();
    for commit in commits {
        let commit = commit?;
        let key = normalize_email(&commit.author_email);
        trace!(commit = %commit.id, email = %key, "folding commit");
        by_email.entry(key).or_default().add_commit(&commit);
    }

    let by_name = merge_by_name(by_email);
    debug!(contributors = by_name.len(), "aggregated contributions");
    Ok(by_name)
}

fn merge_by_name(by_email: HashMap<String, ContributionStat>) -> ContributionMap {
    let mut by_name = ContributionMap::new();
    for stat in by_email.into_values() {
        let key = stat.name.to_lowercase();
        match by_name.get_mut(&key) {
            Some(existing) => existing.merge(&stat),
            None => {
                by_name.insert(key, stat);
            }
        }
    }
    by_name
}

/// Lower-cased, trimmed email with any ` signingkey ...` tail removed.
pub fn normalize_email(email: &str) -> String {
    let mailbox = SIGNING_KEY_SUFFIX
        .captures(email)
        .and_then(|caps| caps.get(1))
        .map_or(email, |m| m.as_str());
    mailbox.trim().to_lowercase()
}
