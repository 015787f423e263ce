use std::collections::HashSet;

use tracing::warn;

use super::episode::EpisodeKey;

/// A playlist as it currently exists on the server.
#[derive(Debug, Clone)]
pub(crate) struct RemotePlaylist {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) items: Vec<EpisodeKey>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReconcileAction {
    /// No remote playlist matches: create it with the full target sequence.
    Create { items: Vec<EpisodeKey> },
    /// Converge the matched playlist: add/remove the set differences, then
    /// pin the complete target order with a final update.
    Converge {
        playlist_id: String,
        add: Vec<EpisodeKey>,
        remove: Vec<EpisodeKey>,
        order: Vec<EpisodeKey>,
    },
}

/// Trim + lowercase, so user-entered names with incidental casing or
/// whitespace differences don't spawn duplicate playlists.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub(crate) fn reconcile(
    name: &str,
    target: Vec<EpisodeKey>,
    existing: &[RemotePlaylist],
) -> ReconcileAction {
    let normalized = normalize_name(name);
    let matches: Vec<&RemotePlaylist> = existing
        .iter()
        .filter(|playlist| normalize_name(&playlist.name) == normalized)
        .collect();

    let Some(matched) = matches.first() else {
        return ReconcileAction::Create { items: target };
    };
    if matches.len() > 1 {
        let names: Vec<&str> = matches.iter().map(|playlist| playlist.name.as_str()).collect();
        warn!(
            "server has {} playlists matching {name:?} after normalization ({names:?}); converging the first",
            matches.len()
        );
    }

    let target_set: HashSet<&EpisodeKey> = target.iter().collect();
    let existing_set: HashSet<&EpisodeKey> = matched.items.iter().collect();

    let add: Vec<EpisodeKey> = target
        .iter()
        .filter(|key| !existing_set.contains(*key))
        .cloned()
        .collect();
    let remove: Vec<EpisodeKey> = matched
        .items
        .iter()
        .filter(|key| !target_set.contains(*key))
        .cloned()
        .collect();

    ReconcileAction::Converge {
        playlist_id: matched.id.clone(),
        add,
        remove,
        order: target,
    }
}
