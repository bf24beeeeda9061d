//! Runs the whole command against a dataset on disk, with an in-memory registry.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use clap::Parser as _;

use re_hf_hub::{AllowList, CommitInfo, DatasetRegistry, HubError, RepoCreation, RepoId};
use re_lerobot::{DatasetLayout, EpisodeIndex};
use re_lerobot_cli::RemoveEpisodesCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    EnsureRepo {
        repo: String,
        private: bool,
    },
    Upload {
        repo: String,
        folder: PathBuf,
        commit_message: String,
        episodes_jsonl: String,
    },
}

#[derive(Default)]
struct FakeRegistry {
    calls: RefCell<Vec<Call>>,
    refuse_creation: bool,
}

impl DatasetRegistry for FakeRegistry {
    fn ensure_dataset_repo(&self, repo: &RepoId, private: bool) -> Result<RepoCreation, HubError> {
        if self.refuse_creation {
            return Err(HubError::MissingToken);
        }
        self.calls.borrow_mut().push(Call::EnsureRepo {
            repo: repo.to_string(),
            private,
        });
        Ok(RepoCreation::Created)
    }

    fn upload_folder(
        &self,
        repo: &RepoId,
        folder: &Path,
        allow: &AllowList,
        commit_message: &str,
    ) -> Result<CommitInfo, HubError> {
        assert!(allow.is_allowed("meta/episodes.jsonl"));
        assert!(allow.is_allowed("README.md"));
        assert!(!allow.is_allowed("notes.txt"));

        self.calls.borrow_mut().push(Call::Upload {
            repo: repo.to_string(),
            folder: folder.to_owned(),
            commit_message: commit_message.to_owned(),
            // What the registry sees at upload time:
            episodes_jsonl: std::fs::read_to_string(folder.join("meta/episodes.jsonl")).unwrap(),
        });
        Ok(CommitInfo {
            commit_url: Some(format!("https://huggingface.co/datasets/{repo}/commit/abc")),
            num_files: 1,
        })
    }
}

fn write_dataset(root: &Path, num_episodes: usize) -> DatasetLayout {
    let layout = DatasetLayout::new(root);
    std::fs::create_dir_all(layout.data_dir()).unwrap();
    std::fs::create_dir_all(layout.meta_dir()).unwrap();
    for camera in layout.cameras() {
        std::fs::create_dir_all(layout.video_dir(camera)).unwrap();
    }

    let mut episodes = String::new();
    for i in 0..num_episodes {
        let episode = EpisodeIndex(i);
        std::fs::write(layout.episode_data_path(episode), format!("data {i}")).unwrap();
        for path in layout.episode_video_paths(episode) {
            std::fs::write(path, format!("video {i}")).unwrap();
        }
        episodes.push_str(&format!("{{\"episode_index\":{i},\"length\":{i}}}\n"));
    }
    std::fs::write(layout.episodes_path(), episodes).unwrap();
    std::fs::write(
        layout.info_path(),
        format!("{{\n    \"total_episodes\": {num_episodes}\n}}\n"),
    )
    .unwrap();

    layout
}

fn command(root: &Path, extra_args: &[&str]) -> RemoveEpisodesCommand {
    let root = root.to_str().unwrap();
    let args = [
        "lerobot-remove-episodes",
        "--root",
        root,
        "--new-repo-id",
        "user/cleaned",
    ];
    RemoveEpisodesCommand::try_parse_from(args.iter().chain(extra_args)).unwrap()
}

fn total_episodes(layout: &DatasetLayout) -> u64 {
    let info: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(layout.info_path()).unwrap()).unwrap();
    info["total_episodes"].as_u64().unwrap()
}

#[test]
fn removes_then_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap().join("so100");
    let layout = write_dataset(&root, 4);
    let registry = FakeRegistry::default();

    command(&root, &["--episodes", "2", "0", "--private"])
        .run_with_registry(&registry)
        .unwrap();

    similar_asserts::assert_eq!(
        registry.calls.into_inner(),
        vec![
            Call::EnsureRepo {
                repo: "user/cleaned".to_owned(),
                private: true,
            },
            Call::Upload {
                repo: "user/cleaned".to_owned(),
                folder: root.clone(),
                commit_message: "Remove episodes [0, 2] and reindex".to_owned(),
                episodes_jsonl: "{\"episode_index\":0,\"length\":1}\n{\"episode_index\":1,\"length\":3}\n"
                    .to_owned(),
            },
        ]
    );
    assert_eq!(total_episodes(&layout), 2);
    assert!(!root.with_file_name("so100_backup").exists());
}

#[test]
fn backup_is_made_before_editing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap().join("so100");
    let layout = write_dataset(&root, 3);

    command(&root, &["--episodes", "1", "--backup", "--skip-upload"])
        .run_with_registry(&FakeRegistry::default())
        .unwrap();

    let backup = DatasetLayout::new(root.with_file_name("so100_backup"));
    assert_eq!(total_episodes(&backup), 3);
    assert_eq!(
        std::fs::read_to_string(backup.episode_data_path(EpisodeIndex(1))).unwrap(),
        "data 1"
    );
    assert_eq!(total_episodes(&layout), 2);
    assert_eq!(
        std::fs::read_to_string(layout.episode_data_path(EpisodeIndex(1))).unwrap(),
        "data 2"
    );
}

#[test]
fn skip_upload_never_talks_to_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let layout = write_dataset(dir.path(), 3);
    let registry = FakeRegistry::default();

    command(dir.path(), &["--episodes", "0", "--skip-upload"])
        .run_with_registry(&registry)
        .unwrap();

    assert!(registry.calls.borrow().is_empty());
    assert_eq!(total_episodes(&layout), 2);
}

#[test]
fn dry_run_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = write_dataset(dir.path(), 3);
    let registry = FakeRegistry::default();

    command(dir.path(), &["--episodes", "0", "7", "--dry-run", "--backup"])
        .run_with_registry(&registry)
        .unwrap();

    assert!(registry.calls.borrow().is_empty());
    assert_eq!(total_episodes(&layout), 3);
    assert_eq!(
        layout.scan_episodes().unwrap().len(),
        3,
        "no files should have been touched"
    );
    assert!(!dir.path().with_file_name(format!(
        "{}_backup",
        dir.path().file_name().unwrap().to_str().unwrap()
    ))
    .exists());
}

#[test]
fn custom_cameras() {
    let dir = tempfile::tempdir().unwrap();
    let layout = write_dataset(dir.path(), 2);
    let wrist = DatasetLayout::new(dir.path()).with_cameras(["wrist"]);
    std::fs::create_dir_all(wrist.video_dir("wrist")).unwrap();
    std::fs::write(wrist.episode_video_path("wrist", EpisodeIndex(1)), "wrist 1").unwrap();

    command(dir.path(), &["--episodes", "0", "--camera", "wrist", "--skip-upload"])
        .run_with_registry(&FakeRegistry::default())
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(wrist.episode_video_path("wrist", EpisodeIndex(0))).unwrap(),
        "wrist 1"
    );
    // Cameras that weren't asked for are left alone.
    assert!(layout.episode_video_path("laptop", EpisodeIndex(1)).exists());
}

#[test]
fn failed_upload_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let layout = write_dataset(dir.path(), 2);
    let registry = FakeRegistry {
        refuse_creation: true,
        ..Default::default()
    };

    let err = command(dir.path(), &["--episodes", "1"])
        .run_with_registry(&registry)
        .unwrap_err();

    assert!(format!("{err:#}").contains("Failed to create dataset repo user/cleaned"));
    // The local edit stays done:
    assert_eq!(total_episodes(&layout), 1);
}

#[test]
fn missing_root_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FakeRegistry::default();

    let err = command(&dir.path().join("nope"), &["--episodes", "1"])
        .run_with_registry(&registry)
        .unwrap_err();

    assert!(err.to_string().contains("No such dataset directory"));
    assert!(registry.calls.borrow().is_empty());
}
