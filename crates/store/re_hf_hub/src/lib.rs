//! A small, blocking client for the [Hugging Face Hub](https://huggingface.co).
//!
//! Only what is needed to publish a dataset is covered:
//! * creating a dataset repository, unless it already exists,
//! * uploading (an allow-listed subset of) a local folder to it in a single commit.
//!
//! Small text files are sent inline with the commit, while the Hub asks for everything else
//! to go through Git LFS first.
//!
//! The [`DatasetRegistry`] trait is implemented by [`HubClient`], and can be implemented by
//! anything else that wants to stand in for the Hub.

mod allow;
mod client;
mod commit;
mod config;
mod repo_id;

use std::path::{Path, PathBuf};

pub use self::allow::{AllowList, LEROBOT_DATASET_PATTERNS};
pub use self::client::{CommitInfo, HubClient, RepoCreation};
pub use self::config::{DEFAULT_ENDPOINT, HubConfig};
pub use self::repo_id::RepoId;

/// A place datasets can be published to.
pub trait DatasetRegistry {
    /// Creates the dataset repository, unless it already exists.
    fn ensure_dataset_repo(&self, repo: &RepoId, private: bool) -> Result<RepoCreation, HubError>;

    /// Uploads every file in `folder` that matches `allow`, as a single commit.
    fn upload_folder(
        &self,
        repo: &RepoId,
        folder: &Path,
        allow: &AllowList,
        commit_message: &str,
    ) -> Result<CommitInfo, HubError>;
}

#[derive(thiserror::Error, Debug)]
pub enum HubError {
    #[error(transparent)]
    Http(#[from] ureq::Error),

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error(
        "No Hugging Face token found. Set HF_TOKEN, or log in with `huggingface-cli login`"
    )]
    MissingToken,

    #[error("Invalid repository id {id:?}: {reason}")]
    InvalidRepoId { id: String, reason: &'static str },

    #[error("Invalid Hub endpoint {0:?}")]
    InvalidEndpoint(String, #[source] url::ParseError),

    #[error("Invalid upload pattern")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("IO error occurred on path: {1}")]
    IO(#[source] std::io::Error, PathBuf),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("Failed to walk directory")]
    Walk(#[from] walkdir::Error),

    #[error("LFS upload of {path} was rejected: {message}")]
    LfsRejected { path: String, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HubError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |err| Self::IO(err, path)
    }
}
