use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::{EpisodeIndex, LeRobotError};

/// The only chunk that is supported.
pub const DEFAULT_CHUNK: &str = "chunk-000";

/// The camera views recorded per episode, unless configured otherwise.
pub const DEFAULT_CAMERAS: &[&str] = &["laptop", "phone"];

pub const EPISODES_FILE: &str = "episodes.jsonl";
pub const EPISODES_STATS_FILE: &str = "episodes_stats.jsonl";
pub const INFO_FILE: &str = "info.json";

const DATA_EXTENSION: &str = "parquet";
const VIDEO_EXTENSION: &str = "mp4";

/// Where the files of a `LeRobot` dataset live on disk.
///
/// All episode files belong to [`DEFAULT_CHUNK`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
    cameras: Vec<String>,
}

impl DatasetLayout {
    /// A dataset rooted at `root`, recorded with the [`DEFAULT_CAMERAS`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cameras: DEFAULT_CAMERAS.iter().map(|&camera| camera.to_owned()).collect(),
        }
    }

    /// Replace the set of camera views.
    pub fn with_cameras(mut self, cameras: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cameras = cameras.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn cameras(&self) -> &[String] {
        &self.cameras
    }

    /// `data/chunk-000`
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data").join(DEFAULT_CHUNK)
    }

    /// `videos/chunk-000/observation.images.{camera}`
    pub fn video_dir(&self, camera: &str) -> PathBuf {
        self.root
            .join("videos")
            .join(DEFAULT_CHUNK)
            .join(format!("observation.images.{camera}"))
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    pub fn episodes_path(&self) -> PathBuf {
        self.meta_dir().join(EPISODES_FILE)
    }

    pub fn episodes_stats_path(&self) -> PathBuf {
        self.meta_dir().join(EPISODES_STATS_FILE)
    }

    pub fn info_path(&self) -> PathBuf {
        self.meta_dir().join(INFO_FILE)
    }

    /// The Parquet file holding the data of `episode`.
    pub fn episode_data_path(&self, episode: EpisodeIndex) -> PathBuf {
        self.data_dir().join(episode_file_name(episode, DATA_EXTENSION))
    }

    /// The video of `episode`, as recorded by `camera`.
    pub fn episode_video_path(&self, camera: &str, episode: EpisodeIndex) -> PathBuf {
        self.video_dir(camera).join(episode_file_name(episode, VIDEO_EXTENSION))
    }

    /// The videos of `episode`, one per camera.
    pub fn episode_video_paths(&self, episode: EpisodeIndex) -> impl Iterator<Item = PathBuf> + '_ {
        self.cameras
            .iter()
            .map(move |camera| self.episode_video_path(camera, episode))
    }

    /// Checks that the root looks like a `LeRobot` dataset we can edit.
    ///
    /// Requires the data directory and `meta/info.json`.
    pub fn validate(&self) -> Result<(), LeRobotError> {
        if self.data_dir().is_dir() && self.info_path().is_file() {
            Ok(())
        } else {
            Err(LeRobotError::InvalidRoot(self.root.clone()))
        }
    }

    /// The indices of all episodes that have a data file.
    ///
    /// Entries that don't look like `episode_<digits>.parquet` are ignored.
    pub fn scan_episodes(&self) -> Result<BTreeSet<EpisodeIndex>, LeRobotError> {
        let data_dir = self.data_dir();

        let mut episodes = BTreeSet::new();
        for entry in std::fs::read_dir(&data_dir).map_err(LeRobotError::io(&data_dir))? {
            let entry = entry.map_err(LeRobotError::io(&data_dir))?;
            let is_file = entry
                .file_type()
                .map_err(LeRobotError::io(entry.path()))?
                .is_file();
            if !is_file {
                continue;
            }

            if let Some(episode) = entry
                .file_name()
                .to_str()
                .and_then(|name| parse_episode_file_name(name, DATA_EXTENSION))
            {
                episodes.insert(episode);
            }
        }

        Ok(episodes)
    }
}

/// `episode_{index:06}.{extension}`
pub fn episode_file_name(episode: EpisodeIndex, extension: &str) -> String {
    format!("episode_{:06}.{extension}", episode.0)
}

/// Inverse of [`episode_file_name`].
///
/// Accepts any number of digits, since indices past 999999 no longer fit the padding.
pub fn parse_episode_file_name(file_name: &str, extension: &str) -> Option<EpisodeIndex> {
    let digits = file_name
        .strip_prefix("episode_")?
        .strip_suffix(extension)?
        .strip_suffix('.')?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok().map(EpisodeIndex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_paths() {
        let layout = DatasetLayout::new("/datasets/pick_place");

        assert_eq!(
            layout.episode_data_path(EpisodeIndex(42)),
            Path::new("/datasets/pick_place/data/chunk-000/episode_000042.parquet")
        );
        assert_eq!(
            layout.episode_video_path("phone", EpisodeIndex(7)),
            Path::new(
                "/datasets/pick_place/videos/chunk-000/observation.images.phone/episode_000007.mp4"
            )
        );
        assert_eq!(
            layout.info_path(),
            Path::new("/datasets/pick_place/meta/info.json")
        );

        let videos = layout.episode_video_paths(EpisodeIndex(0)).collect::<Vec<_>>();
        assert_eq!(videos.len(), 2);
        assert!(videos[0].ends_with("observation.images.laptop/episode_000000.mp4"));
        assert!(videos[1].ends_with("observation.images.phone/episode_000000.mp4"));
    }

    #[test]
    fn test_custom_cameras() {
        let layout = DatasetLayout::new("ds").with_cameras(["wrist"]);
        assert_eq!(layout.cameras(), ["wrist".to_owned()]);
        assert_eq!(layout.episode_video_paths(EpisodeIndex(3)).count(), 1);
    }

    #[test]
    fn test_parse_episode_file_name() {
        assert_eq!(
            parse_episode_file_name("episode_000012.parquet", "parquet"),
            Some(EpisodeIndex(12))
        );
        assert_eq!(
            parse_episode_file_name("episode_1234567.parquet", "parquet"),
            Some(EpisodeIndex(1_234_567))
        );
        assert_eq!(
            parse_episode_file_name(&episode_file_name(EpisodeIndex(5), "mp4"), "mp4"),
            Some(EpisodeIndex(5))
        );

        assert_eq!(parse_episode_file_name("episode_000012.mp4", "parquet"), None);
        assert_eq!(parse_episode_file_name("episode_.parquet", "parquet"), None);
        assert_eq!(parse_episode_file_name("episode_-1.parquet", "parquet"), None);
        assert_eq!(parse_episode_file_name("episode_00001parquet", "parquet"), None);
        assert_eq!(parse_episode_file_name(".DS_Store", "parquet"), None);
    }

    #[test]
    fn test_scan_ignores_unrelated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path());
        let data_dir = layout.data_dir();
        std::fs::create_dir_all(data_dir.join("episode_000009.parquet")).unwrap(); // a directory
        for name in ["episode_000000.parquet", "episode_000002.parquet", "notes.txt"] {
            std::fs::write(data_dir.join(name), b"").unwrap();
        }

        let episodes = layout.scan_episodes().unwrap();
        assert_eq!(
            episodes.into_iter().collect::<Vec<_>>(),
            [EpisodeIndex(0), EpisodeIndex(2)]
        );
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(dir.path());
        assert!(matches!(layout.validate(), Err(LeRobotError::InvalidRoot(_))));

        std::fs::create_dir_all(layout.data_dir()).unwrap();
        std::fs::create_dir_all(layout.meta_dir()).unwrap();
        std::fs::write(layout.info_path(), "{}").unwrap();
        assert!(layout.validate().is_ok());
    }
}
