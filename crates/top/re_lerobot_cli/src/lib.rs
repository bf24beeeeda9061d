//! The `lerobot-remove-episodes` command line tool.
//!
//! See [`RemoveEpisodesCommand`].

use anyhow::Context as _;
use camino::{Utf8Path, Utf8PathBuf};

use re_hf_hub::{
    AllowList, DatasetRegistry, HubClient, HubConfig, LEROBOT_DATASET_PATTERNS, RepoCreation,
    RepoId,
};
use re_lerobot::{
    BackupOutcome, DatasetLayout, RemovalSet, backup_dataset, plan_removal, remove_and_reindex,
};

/// Remove episodes from a `LeRobot` dataset, reindex the remaining ones,
/// and upload the result to the Hugging Face Hub.
#[derive(Debug, Clone, clap::Parser)]
#[clap(name = "lerobot-remove-episodes", version, about)]
pub struct RemoveEpisodesCommand {
    /// Root directory of the dataset, the one containing `data/`, `videos/` and `meta/`.
    #[clap(long)]
    pub root: Utf8PathBuf,

    /// Indices of the episodes to remove.
    #[clap(long, num_args = 1.., required = true)]
    pub episodes: Vec<usize>,

    /// Dataset repository to upload to, e.g. `lerobot/so100_pick_cleaned`.
    #[clap(long)]
    pub new_repo_id: RepoId,

    /// Copy the dataset to `<root>_backup` before touching it.
    #[clap(long, default_value = "false")]
    pub backup: bool,

    /// A camera view with one video per episode. Can be repeated.
    ///
    /// Defaults to `laptop` and `phone`.
    #[clap(long = "camera")]
    pub cameras: Vec<String>,

    /// Create the repository as private.
    #[clap(long, default_value = "false")]
    pub private: bool,

    /// Print what would be deleted and renamed, without touching anything.
    #[clap(long, default_value = "false")]
    pub dry_run: bool,

    /// Only edit the local dataset.
    #[clap(long, default_value = "false")]
    pub skip_upload: bool,

    /// URL of the Hub. Defaults to `HF_ENDPOINT`, or <https://huggingface.co>.
    #[clap(long)]
    pub endpoint: Option<String>,
}

impl RemoveEpisodesCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        let mut config = HubConfig::from_env();
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        let client = HubClient::new(config)?;

        self.run_with_registry(&client)
    }

    /// Like [`Self::run`], publishing to the given registry.
    pub fn run_with_registry(&self, registry: &dyn DatasetRegistry) -> anyhow::Result<()> {
        let Self {
            root,
            episodes,
            new_repo_id,
            backup,
            cameras,
            private,
            dry_run,
            skip_upload,
            endpoint: _,
        } = self;

        let root = resolve_root(root)?;
        let mut layout = DatasetLayout::new(root.as_std_path());
        if !cameras.is_empty() {
            layout = layout.with_cameras(cameras);
        }
        let removal = RemovalSet::new(episodes.iter().copied());

        if *dry_run {
            return print_plan(&layout, &removal);
        }

        if *backup {
            match backup_dataset(root.as_std_path())
                .with_context(|| format!("Failed to back up {root}"))?
            {
                BackupOutcome::Created(path) => {
                    re_log::info!("Backed up the dataset to {}", path.display());
                }
                BackupOutcome::AlreadyExists(path) => {
                    re_log::warn!("Keeping the existing backup at {}", path.display());
                }
            }
        }

        let summary = remove_and_reindex(&layout, &removal)
            .with_context(|| format!("Failed to remove episodes {removal} from {root}"))?;
        re_log::info!(
            "Removed {} episode(s), {} renumbered",
            summary.removed.len(),
            summary.remap.moved().count()
        );

        if *skip_upload {
            re_log::info!("Not uploading, as requested");
            return Ok(());
        }

        match registry
            .ensure_dataset_repo(new_repo_id, *private)
            .with_context(|| format!("Failed to create dataset repo {new_repo_id}"))?
        {
            RepoCreation::Created => re_log::info!("Created dataset repo {new_repo_id}"),
            RepoCreation::AlreadyExists => {
                re_log::info!("Uploading to existing dataset repo {new_repo_id}");
            }
        }

        let allow = AllowList::new(LEROBOT_DATASET_PATTERNS)?;
        let commit = registry
            .upload_folder(
                new_repo_id,
                root.as_std_path(),
                &allow,
                &commit_message(&removal),
            )
            .with_context(|| format!("Failed to upload {root} to {new_repo_id}"))?;

        match commit.commit_url {
            Some(url) => re_log::info!("Uploaded {} file(s): {url}", commit.num_files),
            None => re_log::info!("Uploaded {} file(s)", commit.num_files),
        }

        Ok(())
    }
}

/// Expands a leading `~/` and makes the path absolute.
fn resolve_root(root: &Utf8Path) -> anyhow::Result<Utf8PathBuf> {
    let expanded = match root.strip_prefix("~") {
        Ok(rest) => {
            let home = home::home_dir().context("Couldn't find the home directory")?;
            let home = Utf8PathBuf::from_path_buf(home)
                .map_err(|home| anyhow::anyhow!("Home directory is not UTF-8: {}", home.display()))?;
            home.join(rest)
        }
        Err(_) => root.to_owned(),
    };

    expanded
        .canonicalize_utf8()
        .with_context(|| format!("No such dataset directory: {expanded}"))
}

fn print_plan(layout: &DatasetLayout, removal: &RemovalSet) -> anyhow::Result<()> {
    let plan = plan_removal(layout, removal)?;

    println!("Dry run, nothing will be changed.");
    println!(
        "Removing {} episode(s): {}",
        plan.removed.len(),
        plan.removed.iter().copied().collect::<RemovalSet>()
    );
    if !plan.absent.is_empty() {
        println!(
            "Not in the dataset: {}",
            plan.absent.iter().copied().collect::<RemovalSet>()
        );
    }
    for path in &plan.deletions {
        println!("delete {}", path.display());
    }
    for (from, to) in &plan.renames {
        println!("rename {} -> {}", from.display(), to.display());
    }
    println!("New indices: {}", plan.remap);

    Ok(())
}

fn commit_message(removal: &RemovalSet) -> String {
    format!("Remove episodes {removal} and reindex")
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory as _, Parser as _};

    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        RemoveEpisodesCommand::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let command = RemoveEpisodesCommand::try_parse_from([
            "lerobot-remove-episodes",
            "--root",
            "~/datasets/so100_pick",
            "--episodes",
            "3",
            "1",
            "--new-repo-id",
            "user/so100_pick_cleaned",
            "--backup",
        ])
        .unwrap();

        assert_eq!(command.root, "~/datasets/so100_pick");
        assert_eq!(command.episodes, [3, 1]);
        assert_eq!(command.new_repo_id.to_string(), "user/so100_pick_cleaned");
        assert!(command.backup);
        assert!(!command.private);
        assert!(!command.dry_run);
        assert!(!command.skip_upload);
        assert!(command.cameras.is_empty());
        assert_eq!(command.endpoint, None);
    }

    #[test]
    fn test_repeated_cameras() {
        let command = RemoveEpisodesCommand::try_parse_from([
            "lerobot-remove-episodes",
            "--root=/data",
            "--episodes=0",
            "--new-repo-id=ds",
            "--camera=wrist",
            "--camera=top",
        ])
        .unwrap();

        assert_eq!(command.cameras, ["wrist", "top"]);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let parse = |args: &[&str]| {
            RemoveEpisodesCommand::try_parse_from(
                ["lerobot-remove-episodes"].iter().chain(args),
            )
        };

        // No episodes:
        assert!(parse(&["--root", "/data", "--new-repo-id", "user/ds"]).is_err());
        assert!(parse(&["--root", "/data", "--episodes", "--new-repo-id", "user/ds"]).is_err());

        // Not an index:
        assert!(parse(&["--root", "/data", "--episodes", "-1", "--new-repo-id", "user/ds"]).is_err());
        assert!(parse(&["--root", "/data", "--episodes", "x", "--new-repo-id", "user/ds"]).is_err());

        // Not a repository id:
        assert!(parse(&["--root", "/data", "--episodes", "1", "--new-repo-id", "a/b/c"]).is_err());
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message(&RemovalSet::new([5, 1, 1])),
            "Remove episodes [1, 5] and reindex"
        );
    }

    #[test]
    fn test_resolve_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_owned()).unwrap();

        let err = resolve_root(&path.join("nested/..")).unwrap_err();
        assert!(err.to_string().contains("No such dataset directory"));

        std::fs::create_dir(path.join("nested")).unwrap();
        assert_eq!(
            resolve_root(&path.join("nested/..")).unwrap(),
            path.canonicalize_utf8().unwrap()
        );
    }
}
