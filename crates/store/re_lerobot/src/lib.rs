//! Editing of `LeRobot` datasets on disk.
//!
//! A `LeRobot` (v2) dataset consists of structured metadata and recorded episode data stored
//! in Parquet files, with one video per camera and episode:
//!
//! ```text
//! .
//! ├── README.md
//! ├── data
//! │  └── chunk-000
//! │      ├── episode_000000.parquet
//! │      ├── episode_000001.parquet
//! │      ├── …
//! ├── meta
//! │  ├── episodes.jsonl
//! │  ├── episodes_stats.jsonl
//! │  ├── info.json
//! │  └── tasks.jsonl
//! └── videos
//!     └── chunk-000
//!         ├── observation.images.laptop
//!         │   ├── episode_000000.mp4
//!         │   ├── …
//!         └── observation.images.phone
//!             ├── episode_000000.mp4
//!             ├── …
//! ```
//!
//! This crate removes a set of episodes from such a dataset and renumbers the surviving ones,
//! so that episode indices stay dense and zero-based:
//!
//! 1. an optional full copy of the dataset is made next to it ([`backup_dataset`]),
//! 2. the data and video files of the removed episodes are deleted,
//! 3. every surviving episode `i` is renamed to `i - d(i)`, where `d(i)` is the number of
//!    removed episodes with a smaller index ([`RemovalSet::new_index`]),
//! 4. the records in `episodes.jsonl` and `episodes_stats.jsonl` are dropped or renumbered
//!    the same way,
//! 5. `total_episodes` in `info.json` is decremented.
//!
//! Steps 2 to 5 are performed by [`remove_and_reindex`].

mod backup;
mod files;
mod layout;
mod metadata;
mod reindex;
mod removal;

use std::path::PathBuf;

pub use self::backup::{BackupOutcome, backup_dataset, backup_path};
pub use self::files::{delete_episode_files, reindex_episode_files};
pub use self::layout::{
    DEFAULT_CAMERAS, DEFAULT_CHUNK, DatasetLayout, EPISODES_FILE, EPISODES_STATS_FILE, INFO_FILE,
    episode_file_name, parse_episode_file_name,
};
pub use self::metadata::{
    EpisodeCount, StreamRewrite, read_episode_indices, rewrite_episode_stream,
    update_total_episodes,
};
pub use self::reindex::{ReindexSummary, RemovalPlan, plan_removal, remove_and_reindex};
pub use self::removal::{EpisodeRemap, RemovalSet};

/// The index of an episode within a `LeRobot` dataset.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EpisodeIndex(pub usize);

impl std::fmt::Display for EpisodeIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<usize> for EpisodeIndex {
    #[inline]
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Errors that might happen while editing a `LeRobot` dataset.
#[derive(thiserror::Error, Debug)]
pub enum LeRobotError {
    #[error("IO error occurred on path: {1}")]
    IO(#[source] std::io::Error, PathBuf),

    #[error("Failed to parse JSON in {path}")]
    Json {
        path: PathBuf,

        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed record on line {line} of {path}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Missing or invalid field `{field}` in {path}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Refusing to rename {from} to {to}: the destination already exists")]
    RenameTargetOccupied { from: PathBuf, to: PathBuf },

    #[error("Not a LeRobot dataset: {0}")]
    InvalidRoot(PathBuf),

    #[error("Failed to walk directory")]
    Walk(#[from] walkdir::Error),
}

impl LeRobotError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |err| Self::IO(err, path)
    }
}
