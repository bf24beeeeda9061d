use std::path::{Path, PathBuf};

use crate::LeRobotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A fresh copy was made.
    Created(PathBuf),

    /// A backup was already there, and was left alone.
    AlreadyExists(PathBuf),
}

impl BackupOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(path) | Self::AlreadyExists(path) => path,
        }
    }
}

/// The sibling directory `<name>_backup` of `root`.
pub fn backup_path(root: &Path) -> Result<PathBuf, LeRobotError> {
    let (Some(parent), Some(name)) = (root.parent(), root.file_name()) else {
        return Err(LeRobotError::InvalidRoot(root.to_owned()));
    };

    let mut backup_name = name.to_owned();
    backup_name.push("_backup");
    Ok(parent.join(backup_name))
}

/// Copies the whole tree at `root` to [`backup_path`], unless a backup already exists.
///
/// The copy goes to a `.partial` directory first and is only renamed into place once it is
/// complete, so that an interrupted copy never passes for a backup.
pub fn backup_dataset(root: &Path) -> Result<BackupOutcome, LeRobotError> {
    let backup = backup_path(root)?;

    if backup.try_exists().map_err(LeRobotError::io(&backup))? {
        re_log::info!(
            "Backup already exists at {}, skipping backup.",
            backup.display()
        );
        return Ok(BackupOutcome::AlreadyExists(backup));
    }

    let mut partial = backup.clone().into_os_string();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    if partial.try_exists().map_err(LeRobotError::io(&partial))? {
        re_log::debug!("Removing stale {}", partial.display());
        std::fs::remove_dir_all(&partial).map_err(LeRobotError::io(&partial))?;
    }

    let num_files = copy_dir_all(root, &partial)?;
    std::fs::rename(&partial, &backup).map_err(LeRobotError::io(&partial))?;

    re_log::info!(
        "Backup created at {} ({num_files} file(s))",
        backup.display()
    );

    Ok(BackupOutcome::Created(backup))
}

/// Recursively copies `from` into `to`, following symlinks. Returns the number of files copied.
fn copy_dir_all(from: &Path, to: &Path) -> Result<usize, LeRobotError> {
    let mut num_files = 0;

    for entry in walkdir::WalkDir::new(from)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|_err| LeRobotError::InvalidRoot(entry.path().to_owned()))?;
        let destination = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination).map_err(LeRobotError::io(&destination))?;
        } else {
            std::fs::copy(entry.path(), &destination).map_err(LeRobotError::io(entry.path()))?;
            num_files += 1;
        }
    }

    Ok(num_files)
}
