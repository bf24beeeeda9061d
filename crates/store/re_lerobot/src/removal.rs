use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools as _;

use crate::EpisodeIndex;

/// The episodes to remove from a dataset.
///
/// Duplicates collapse and the order of the input doesn't matter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemovalSet {
    removed: BTreeSet<EpisodeIndex>,
}

impl RemovalSet {
    pub fn new(episodes: impl IntoIterator<Item = usize>) -> Self {
        episodes.into_iter().map(EpisodeIndex).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    #[inline]
    pub fn contains(&self, episode: EpisodeIndex) -> bool {
        self.removed.contains(&episode)
    }

    /// In increasing order.
    pub fn iter(&self) -> impl Iterator<Item = EpisodeIndex> + '_ {
        self.removed.iter().copied()
    }

    /// The number of removed episodes with an index strictly less than `episode`.
    pub fn decrement(&self, episode: EpisodeIndex) -> usize {
        self.removed.range(..episode).count()
    }

    /// The index `episode` ends up with once the removal is applied,
    /// or `None` if it is removed.
    ///
    /// This is the one mapping used for both episode files and metadata records.
    pub fn new_index(&self, episode: EpisodeIndex) -> Option<EpisodeIndex> {
        if self.contains(episode) {
            None
        } else {
            Some(EpisodeIndex(episode.0 - self.decrement(episode)))
        }
    }
}

impl FromIterator<EpisodeIndex> for RemovalSet {
    fn from_iter<T: IntoIterator<Item = EpisodeIndex>>(iter: T) -> Self {
        Self {
            removed: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for RemovalSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.removed.iter().join(", "))
    }
}

/// Where each surviving episode moved to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EpisodeRemap {
    mapping: BTreeMap<EpisodeIndex, EpisodeIndex>,
}

impl EpisodeRemap {
    /// Maps every one of the `present` episodes that survives `removal` to its new index.
    pub fn new(present: impl IntoIterator<Item = EpisodeIndex>, removal: &RemovalSet) -> Self {
        let mapping = present
            .into_iter()
            .filter_map(|old| removal.new_index(old).map(|new| (old, new)))
            .collect();
        Self { mapping }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn get(&self, old: EpisodeIndex) -> Option<EpisodeIndex> {
        self.mapping.get(&old).copied()
    }

    /// `(old, new)` pairs, in increasing order of the old index.
    pub fn iter(&self) -> impl Iterator<Item = (EpisodeIndex, EpisodeIndex)> + '_ {
        self.mapping.iter().map(|(&old, &new)| (old, new))
    }

    /// Only the episodes whose index actually changes, in increasing order of the old index.
    ///
    /// Applying renames in this order never moves a file onto a slot that is still occupied
    /// by another surviving episode, because `new <= old` and the map is strictly increasing.
    pub fn moved(&self) -> impl Iterator<Item = (EpisodeIndex, EpisodeIndex)> + '_ {
        self.iter().filter(|(old, new)| old != new)
    }
}

impl std::fmt::Display for EpisodeRemap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs = self.iter().map(|(old, new)| format!("{old}→{new}")).join(", ");
        f.write_str(&pairs)
    }
}
