use std::path::{Path, PathBuf};

use crate::{DatasetLayout, EpisodeRemap, LeRobotError, RemovalSet};

/// Deletes the data file and the per-camera videos of every removed episode.
///
/// Files that don't exist are treated as already removed.
/// Returns the paths that were actually deleted.
pub fn delete_episode_files(
    layout: &DatasetLayout,
    removal: &RemovalSet,
) -> Result<Vec<PathBuf>, LeRobotError> {
    let mut deleted = Vec::new();

    for episode in removal.iter() {
        let paths = std::iter::once(layout.episode_data_path(episode))
            .chain(layout.episode_video_paths(episode));

        for path in paths {
            if remove_file_if_exists(&path)? {
                re_log::info!("Deleted {}", path.display());
                deleted.push(path);
            }
        }
    }

    Ok(deleted)
}

/// Renames the files of all surviving episodes so that their indices are dense again.
///
/// Must run after [`delete_episode_files`]: the surviving episodes are whatever data files are
/// left on disk. Video files follow their data file if they exist.
pub fn reindex_episode_files(
    layout: &DatasetLayout,
    removal: &RemovalSet,
) -> Result<EpisodeRemap, LeRobotError> {
    let remap = EpisodeRemap::new(layout.scan_episodes()?, removal);

    // `moved` is in increasing order of the old index, which guarantees every
    // destination has already been vacated.
    for (old, new) in remap.moved() {
        rename_if_exists(
            &layout.episode_data_path(old),
            &layout.episode_data_path(new),
        )?;

        for camera in layout.cameras() {
            rename_if_exists(
                &layout.episode_video_path(camera, old),
                &layout.episode_video_path(camera, new),
            )?;
        }
    }

    Ok(remap)
}

fn remove_file_if_exists(path: &Path) -> Result<bool, LeRobotError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(LeRobotError::IO(err, path.to_owned())),
    }
}

/// `rename(2)` silently replaces an existing destination, so we check first.
fn rename_if_exists(from: &Path, to: &Path) -> Result<bool, LeRobotError> {
    if !from.try_exists().map_err(LeRobotError::io(from))? {
        return Ok(false);
    }

    if to.try_exists().map_err(LeRobotError::io(to))? {
        return Err(LeRobotError::RenameTargetOccupied {
            from: from.to_owned(),
            to: to.to_owned(),
        });
    }

    std::fs::rename(from, to).map_err(LeRobotError::io(from))?;
    re_log::info!("Renamed {} -> {}", from.display(), to.display());

    Ok(true)
}
