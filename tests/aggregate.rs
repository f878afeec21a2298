use chrono::{TimeZone, Utc};
use gcontrib::error::ContribError;
use gcontrib::output::{sorted, write_table};
use gcontrib::{aggregate, normalize_email, CommitRecord, ContributionStat, DateRange, FileStat};
use pretty_assertions::assert_eq;

fn file(path: &str, added: u32, deleted: u32) -> FileStat {
    FileStat {
        path: path.to_string(),
        added_lines: added,
        deleted_lines: deleted,
        is_binary: false,
    }
}

fn commit(id: &str, name: &str, email: &str, files: Vec<FileStat>) -> CommitRecord {
    CommitRecord {
        id: id.to_string(),
        author_name: name.to_string(),
        author_email: email.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        files,
    }
}

fn ok(commits: Vec<CommitRecord>) -> Vec<gcontrib::error::Result<CommitRecord>> {
    commits.into_iter().map(Ok).collect()
}

#[test]
fn normalize_strips_signing_key_suffix() {
    assert_eq!(
        normalize_email("Jane Doe <jane@x.com> signingkey ABC123"),
        "jane doe <jane@x.com>"
    );
    assert_eq!(normalize_email("JANE@X.COM"), "jane@x.com");
    assert_eq!(normalize_email("  jane@x.com  "), "jane@x.com");
    assert_eq!(normalize_email("jane@x.com   signingkey  ABC"), "jane@x.com");
}

#[test]
fn normalize_keeps_email_without_separated_token() {
    // the token must be surrounded by spaces
    assert_eq!(normalize_email("signingkey@x.com"), "signingkey@x.com");
    assert_eq!(normalize_email("jane@x.com signingkey"), "jane@x.com signingkey");
}

#[test]
fn same_email_sums_files_and_commits() {
    let commits = ok(vec![
        commit("1", "Jane", "jane@x.com", vec![file("a.rs", 10, 2), file("b.rs", 3, 0)]),
        commit("2", "Jane", "jane@x.com", vec![file("a.rs", 1, 5)]),
        commit("3", "Jane", "jane@x.com", vec![]),
    ]);

    let result = aggregate(commits).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(
        result["jane"],
        ContributionStat {
            name: "Jane".to_string(),
            added_rows: 14,
            deleted_rows: 7,
            commits_count: 3,
        }
    );
}

#[test]
fn email_case_variants_collapse() {
    let commits = ok(vec![
        commit("1", "Jane", "a@x.com", vec![file("a.rs", 1, 0)]),
        commit("2", "Jane", "A@X.COM", vec![file("a.rs", 2, 1)]),
    ]);

    let result = aggregate(commits).unwrap();

    assert_eq!(result.len(), 1);
    let jane = &result["jane"];
    assert_eq!(jane.name, "Jane");
    assert_eq!((jane.added_rows, jane.deleted_rows, jane.commits_count), (3, 1, 2));
}

#[test]
fn signed_and_plain_email_collapse() {
    let commits = ok(vec![
        commit("1", "Jane", "jane@x.com signingkey ABC123", vec![file("a.rs", 4, 0)]),
        commit("2", "Jane", "jane@x.com", vec![file("a.rs", 0, 4)]),
    ]);

    let result = aggregate(commits).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result["jane"].commits_count, 2);
}

#[test]
fn last_seen_name_wins_within_one_email() {
    let commits = ok(vec![
        commit("1", "jane", "jane@x.com", vec![file("a.rs", 1, 0)]),
        commit("2", "Jane Doe", "jane@x.com", vec![file("a.rs", 1, 0)]),
    ]);

    let result = aggregate(commits).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result["jane doe"].name, "Jane Doe");
    assert_eq!(result["jane doe"].commits_count, 2);
}

#[test]
fn distinct_emails_sharing_a_name_are_merged() {
    let commits = ok(vec![
        commit("1", "Alex", "alex@home.org", vec![file("a.rs", 5, 1)]),
        commit("2", "ALEX", "alex@work.com", vec![file("b.rs", 7, 2)]),
        commit("3", "Sam", "sam@x.com", vec![file("c.rs", 1, 1)]),
    ]);

    let result = aggregate(commits).unwrap();

    assert_eq!(result.len(), 2);
    let alex = &result["alex"];
    assert!(alex.name.eq_ignore_ascii_case("alex"));
    assert_eq!((alex.added_rows, alex.deleted_rows, alex.commits_count), (12, 3, 2));
    assert_eq!(result["sam"].commits_count, 1);
}

#[test]
fn empty_sequence_yields_empty_map() {
    let result = aggregate(ok(Vec::new())).unwrap();
    assert!(result.is_empty());
}

#[test]
fn failing_commit_aborts_the_fold() {
    let commits = vec![
        Ok(commit("1", "Jane", "jane@x.com", vec![file("a.rs", 1, 0)])),
        Err(ContribError::GitRepo("stats unavailable".to_string())),
        Ok(commit("3", "Sam", "sam@x.com", vec![file("a.rs", 1, 0)])),
    ];

    let err = aggregate(commits).unwrap_err();
    assert!(err.to_string().contains("stats unavailable"));
}

#[test]
fn aggregation_is_repeatable() {
    let commits = vec![
        commit("1", "Jane", "jane@x.com", vec![file("a.rs", 10, 2)]),
        commit("2", "Sam", "sam@x.com signingkey K", vec![file("b.rs", 3, 3)]),
        commit("3", "jane", "JANE@x.com", vec![file("c.rs", 0, 9)]),
    ];

    let first = aggregate(ok(commits.clone())).unwrap();
    let second = aggregate(ok(commits)).unwrap();

    assert_eq!(first, second);
}

#[test]
fn table_lists_sorted_rows() {
    let commits = ok(vec![
        commit("1", "Sam", "sam@x.com", vec![file("a.rs", 1, 0)]),
        commit("2", "Jane", "jane@x.com", vec![file("a.rs", 5, 2)]),
        commit("3", "Jane", "jane@x.com", vec![file("b.rs", 1, 1)]),
    ]);
    let contributors = sorted(aggregate(commits).unwrap());
    let range = DateRange::new()
        .with_since(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .with_until(Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap());

    let mut buf = Vec::new();
    write_table(&mut buf, &contributors, &range).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "From: 2024-01-01 00:00:00 UTC");
    assert_eq!(lines[1], "To: 2024-12-31 00:00:00 UTC");
    assert_eq!(lines[2], "");
    assert!(lines[3].contains("CommitsCount"));
    assert_eq!(lines[4..].to_vec(), vec!["Jane\t2\t6\t3", "Sam\t1\t1\t0"]);
}

#[test]
fn date_range_bounds_are_inclusive() {
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let until = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let range = DateRange::new().with_since(since).with_until(until);

    assert!(range.contains(&since));
    assert!(range.contains(&until));
    assert!(!range.contains(&Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()));
    assert!(!range.contains(&Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 1).unwrap()));
}

#[test]
fn trailing_year_spans_twelve_calendar_months() {
    let now = Utc.with_ymd_and_hms(2024, 3, 31, 8, 30, 0).unwrap();
    let range = DateRange::trailing_year(now);

    assert_eq!(range.since, Some(Utc.with_ymd_and_hms(2023, 3, 31, 8, 30, 0).unwrap()));
    assert_eq!(range.until, Some(now));
}
