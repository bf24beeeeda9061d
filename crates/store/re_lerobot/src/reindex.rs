use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::{
    DatasetLayout, EpisodeCount, EpisodeIndex, EpisodeRemap, LeRobotError, RemovalSet,
    StreamRewrite, delete_episode_files, read_episode_indices, reindex_episode_files,
    rewrite_episode_stream, update_total_episodes,
};

/// What [`remove_and_reindex`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReindexSummary {
    /// The requested episodes that were actually part of the dataset.
    pub removed: BTreeSet<EpisodeIndex>,

    /// Every file that was deleted.
    pub deleted: Vec<PathBuf>,

    /// Where the surviving episodes ended up.
    pub remap: EpisodeRemap,

    /// The metadata streams that were rewritten.
    pub streams: Vec<StreamRewrite>,

    /// `total_episodes`, before and after. `None` if nothing had to be done.
    pub total_episodes: Option<EpisodeCount>,
}

/// What [`remove_and_reindex`] would do, without touching anything.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovalPlan {
    /// The requested episodes that are part of the dataset.
    pub removed: BTreeSet<EpisodeIndex>,

    /// The requested episodes that aren't, and will be skipped.
    pub absent: BTreeSet<EpisodeIndex>,

    pub deletions: Vec<PathBuf>,

    /// `(from, to)`, in the order they will be applied.
    pub renames: Vec<(PathBuf, PathBuf)>,

    pub remap: EpisodeRemap,
}

/// The requested episodes that are present, either as a data file or an `episodes.jsonl` record.
fn split_present(
    removal: &RemovalSet,
    on_disk: &BTreeSet<EpisodeIndex>,
    in_metadata: &BTreeSet<EpisodeIndex>,
) -> (BTreeSet<EpisodeIndex>, BTreeSet<EpisodeIndex>) {
    removal
        .iter()
        .partition(|episode| on_disk.contains(episode) || in_metadata.contains(episode))
}

/// The metadata streams that exist and need rewriting, `episodes.jsonl` first.
///
/// `episodes_stats.jsonl` only exists since `LeRobot` v2.1.
fn episode_streams(layout: &DatasetLayout) -> Result<Vec<PathBuf>, LeRobotError> {
    let mut streams = vec![layout.episodes_path()];

    let stats_path = layout.episodes_stats_path();
    if stats_path.try_exists().map_err(LeRobotError::io(&stats_path))? {
        streams.push(stats_path);
    } else {
        re_log::warn!("{} not found, skipping it", stats_path.display());
    }

    Ok(streams)
}

/// Computes what [`remove_and_reindex`] would do, without modifying the dataset.
pub fn plan_removal(
    layout: &DatasetLayout,
    removal: &RemovalSet,
) -> Result<RemovalPlan, LeRobotError> {
    layout.validate()?;

    let in_metadata = read_episode_indices(&layout.episodes_path())?;
    plan_with_metadata(layout, removal, &in_metadata)
}

fn plan_with_metadata(
    layout: &DatasetLayout,
    removal: &RemovalSet,
    in_metadata: &BTreeSet<EpisodeIndex>,
) -> Result<RemovalPlan, LeRobotError> {
    let on_disk = layout.scan_episodes()?;
    let (removed, absent) = split_present(removal, &on_disk, in_metadata);

    let deletions = removal
        .iter()
        .flat_map(|episode| {
            std::iter::once(layout.episode_data_path(episode))
                .chain(layout.episode_video_paths(episode))
        })
        .filter(|path| path.is_file())
        .collect();

    // Same outcome as scanning again after the deletions, since removed episodes never map.
    let remap = EpisodeRemap::new(on_disk.iter().copied(), removal);

    let mut renames = Vec::new();
    for (old, new) in remap.moved() {
        renames.push((layout.episode_data_path(old), layout.episode_data_path(new)));
        for camera in layout.cameras() {
            let from = layout.episode_video_path(camera, old);
            if from.is_file() {
                renames.push((from, layout.episode_video_path(camera, new)));
            }
        }
    }

    Ok(RemovalPlan {
        removed,
        absent,
        deletions,
        renames,
        remap,
    })
}

/// Fails if a rename would land on a file that is neither deleted nor renamed away first.
///
/// Renames are applied in increasing order of the old index, and every new index is smaller
/// than its old one, so a destination that is also a source has been vacated by then.
fn check_rename_targets(plan: &RemovalPlan) -> Result<(), LeRobotError> {
    let sources: BTreeSet<&PathBuf> = plan.renames.iter().map(|(from, _)| from).collect();
    let deletions: BTreeSet<&PathBuf> = plan.deletions.iter().collect();

    for (from, to) in &plan.renames {
        if sources.contains(to) || deletions.contains(to) {
            continue;
        }
        if to.try_exists().map_err(LeRobotError::io(to))? {
            return Err(LeRobotError::RenameTargetOccupied {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }

    Ok(())
}

/// Removes the given episodes from the dataset and reindexes the remaining ones.
///
/// Requested episodes that aren't part of the dataset are skipped.
/// An empty removal set leaves the dataset untouched.
///
/// The metadata streams are parsed and every rename destination is checked up front,
/// so a malformed record or an occupied destination aborts the run before any file is touched.
pub fn remove_and_reindex(
    layout: &DatasetLayout,
    removal: &RemovalSet,
) -> Result<ReindexSummary, LeRobotError> {
    layout.validate()?;

    if removal.is_empty() {
        re_log::info!("No episodes to remove");
        return Ok(ReindexSummary::default());
    }

    re_log::info!("Removing episodes: {removal}");

    let streams = episode_streams(layout)?;
    let in_metadata = read_episode_indices(&layout.episodes_path())?;
    for stream in streams.iter().skip(1) {
        read_episode_indices(stream)?;
    }

    let plan = plan_with_metadata(layout, removal, &in_metadata)?;
    check_rename_targets(&plan)?;
    for episode in &plan.absent {
        re_log::info!("Episode {episode} is not part of the dataset, skipping it");
    }

    let deleted = delete_episode_files(layout, removal)?;
    let remap = reindex_episode_files(layout, removal)?;
    re_log::debug!("Episode remap: {remap}");

    let streams = streams
        .iter()
        .map(|stream| {
            let rewrite = rewrite_episode_stream(stream, removal)?;
            re_log::info!(
                "Updated {} ({} kept, {} dropped)",
                stream.display(),
                rewrite.kept,
                rewrite.dropped
            );
            Ok(rewrite)
        })
        .collect::<Result<Vec<_>, LeRobotError>>()?;

    let info_path = layout.info_path();
    let total_episodes = update_total_episodes(&info_path, plan.removed.len())?;
    re_log::info!(
        "Updated {} (total_episodes: {} -> {})",
        info_path.display(),
        total_episodes.before,
        total_episodes.after
    );

    Ok(ReindexSummary {
        removed: plan.removed,
        deleted,
        remap,
        streams,
        total_episodes: Some(total_episodes),
    })
}
