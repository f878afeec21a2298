pub mod cli;
pub mod contrib;
pub mod error;
pub mod git;
pub mod model;
pub mod output;
pub mod progress;

pub use contrib::{aggregate, contribution_stats, normalize_email, ContributionMap};
pub use git::{GitRepo, WalkOptions};
pub use model::{CommitRecord, ContributionStat, DateRange, FileStat};
