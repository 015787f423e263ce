use std::collections::{HashMap, HashSet};

use crate::config::{FeedConfig, PlaylistConfig, SortMode};

/// Identity of one podcast episode on the server. Equality and hashing cover
/// exactly this pair; everything else about an episode is transient input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EpisodeKey {
    pub(crate) item_id: String,
    pub(crate) episode_id: String,
}

impl EpisodeKey {
    pub(crate) fn new(item_id: impl Into<String>, episode_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            episode_id: episode_id.into(),
        }
    }
}

/// An episode as fetched from the server: identity plus the publish
/// timestamp (epoch millis) used for per-feed sorting.
#[derive(Debug, Clone)]
pub(crate) struct EpisodeCandidate {
    pub(crate) key: EpisodeKey,
    pub(crate) published_at: Option<i64>,
}

/// User progress on one episode. A missing map entry means the episode was
/// never started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Progress {
    pub(crate) fraction: f64,
    pub(crate) is_finished: bool,
}

pub(crate) type ProgressMap = HashMap<EpisodeKey, Progress>;

/// Whether an episode belongs in a playlist under the playlist's inclusion
/// flags. Finished and in-progress are mutually exclusive categories: a
/// finished episode is only ever admitted by `include_finished`.
pub(crate) fn should_include(policy: &PlaylistConfig, progress: Option<&Progress>) -> bool {
    match progress {
        None => policy.include_in_progress,
        Some(progress) if progress.is_finished => policy.include_finished,
        Some(progress) => {
            policy.include_in_progress && progress.fraction > 0.0 && progress.fraction < 1.0
        }
    }
}

/// Sorts, filters, and truncates one feed's episodes. The count limit applies
/// after filtering, so it bounds the included set rather than the raw feed.
pub(crate) fn prepare_feed(
    feed: &FeedConfig,
    policy: &PlaylistConfig,
    candidates: &[EpisodeCandidate],
    progress: &ProgressMap,
) -> Vec<EpisodeKey> {
    let mut sorted: Vec<&EpisodeCandidate> = candidates.iter().collect();
    match feed.sort_mode() {
        SortMode::Oldest => sorted.sort_by_key(|episode| episode.published_at.unwrap_or(0)),
        // Stable descending comparison keeps input order among equal timestamps.
        SortMode::Newest => sorted.sort_by(|a, b| {
            b.published_at
                .unwrap_or(0)
                .cmp(&a.published_at.unwrap_or(0))
        }),
        SortMode::Unsorted => {}
    }

    let mut seen = HashSet::new();
    let mut included = Vec::new();
    for episode in sorted {
        if !should_include(policy, progress.get(&episode.key)) {
            continue;
        }
        if seen.insert(episode.key.clone()) {
            included.push(episode.key.clone());
        }
    }

    if feed.count > 0 && included.len() > feed.count {
        included.truncate(feed.count);
    }
    included
}
