use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContribError>;

#[derive(Error, Debug)]
pub enum ContribError {
    #[error("Git error: {0}")]
    Git(#[from] Box<gix::open::Error>),
    #[error("Git repository error: {0}")]
    GitRepo(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Failed to read stats for commit {commit}")]
    CommitStats {
        commit: String,
        #[source]
        source: Box<ContribError>,
    },
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
}

impl ContribError {
    /// Attach the id of the commit being read to `err`.
    pub fn in_commit(commit: impl ToString, err: ContribError) -> Self {
        ContribError::CommitStats {
            commit: commit.to_string(),
            source: Box::new(err),
        }
    }
}

// gix errors are large; keep the enum small by boxing them
impl From<gix::open::Error> for ContribError {
    fn from(err: gix::open::Error) -> Self {
        ContribError::Git(Box::new(err))
    }
}

impl From<gix::object::find::existing::Error> for ContribError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        ContribError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for ContribError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        ContribError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for ContribError {
    fn from(err: gix::object::commit::Error) -> Self {
        ContribError::Commit(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for ContribError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        ContribError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for ContribError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        ContribError::HeadPeel(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for ContribError {
    fn from(err: gix::objs::decode::Error) -> Self {
        ContribError::ObjectDecode(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for ContribError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        ContribError::DiffTreeToTree(Box::new(err))
    }
}
