use crate::contrib::ContributionMap;
use crate::git::GitRepo;
use crate::model::{ContributionOutput, ContributionStat, DateRange, SCHEMA_VERSION};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use console::style;
use std::io::{self, Write};

/// Most commits first, then most added lines, then name.
pub fn sorted(contributions: ContributionMap) -> Vec<ContributionStat> {
    let mut entries: Vec<_> = contributions.into_values().collect();
    entries.sort_by(|a, b| {
        b.commits_count
            .cmp(&a.commits_count)
            .then(b.added_rows.cmp(&a.added_rows))
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}

pub fn output_table(contributors: &[ContributionStat], range: &DateRange) -> Result<()> {
    let mut out = io::stdout().lock();
    write_table(&mut out, contributors, range)?;
    out.flush()?;
    Ok(())
}

pub fn write_table<W: Write>(out: &mut W, contributors: &[ContributionStat], range: &DateRange) -> Result<()> {
    writeln!(out, "From: {}", format_bound(range.since))?;
    writeln!(out, "To: {}", format_bound(range.until))?;
    writeln!(out)?;
    writeln!(
        out,
        "{}\t{}\t{}\t{}",
        style("Name").bold(),
        style("CommitsCount").bold(),
        style("AddedRows").bold(),
        style("DeletedRows").bold()
    )?;
    for c in contributors {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            c.name, c.commits_count, c.added_rows, c.deleted_rows
        )?;
    }
    Ok(())
}

pub fn output_json(contributors: &[ContributionStat], repo: &GitRepo, range: &DateRange) -> Result<()> {
    let output = ContributionOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository_path: repo.path().to_string_lossy().to_string(),
        since: range.since.map(rfc3339),
        until: range.until.map(rfc3339),
        contributors: contributors.to_vec(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_ndjson(contributors: &[ContributionStat]) -> Result<()> {
    for c in contributors {
        println!("{}", serde_json::to_string(c)?);
    }
    Ok(())
}

fn format_bound(bound: Option<DateTime<Utc>>) -> String {
    bound.map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S %Z").to_string())
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
