pub(crate) mod episode;
pub(crate) mod order;
pub(crate) mod reconcile;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use anyhow::Result;
use chrono::Local;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::abs::AbsClient;
use crate::cli::{Cli, Command};
use crate::config::{Config, ConfigIndex, OrderDirectives, PlaylistConfig};
use crate::paths::config_file_path;

use self::episode::{EpisodeCandidate, EpisodeKey, ProgressMap, prepare_feed};
use self::order::{group_by_tier, order_episodes};
use self::reconcile::{ReconcileAction, RemotePlaylist, reconcile};

pub fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };
    let config = Config::load(&config_path)?;

    match cli.command {
        Some(Command::Validate) => run_validate(&config),
        Some(Command::Sync { dry_run }) => run_sync(&config, dry_run),
        None => run_sync(&config, false),
    }
}

fn run_sync(config: &Config, dry_run: bool) -> Result<()> {
    let index = ConfigIndex::new(config);
    let client = AbsClient::login(
        &config.server.address,
        &config.server.user,
        &config.server.password,
    )?;

    let remote_playlists = client.user_playlists()?;
    let progress = client.progress_map()?;
    let mut rng = rand::thread_rng();

    for library in client.libraries()? {
        let Some(library_config) = index.library(&library.name) else {
            info!("library {:?} is not in the config, skipping", library.name);
            continue;
        };

        let items = client.library_items(&library.id)?;
        let podcasts: Vec<_> = items
            .into_iter()
            .filter(|item| index.is_configured_feed(&item.title))
            .collect();
        if podcasts.is_empty() {
            info!(
                "library {:?} has no podcasts matching any configured feed, skipping",
                library.name
            );
            continue;
        }

        // One episode fetch per podcast, shared by every playlist in the library.
        let mut feeds: HashMap<&str, Vec<EpisodeCandidate>> = HashMap::new();
        for podcast in &podcasts {
            feeds.insert(podcast.title.as_str(), client.podcast_episodes(&podcast.id)?);
        }

        for playlist in &library_config.playlists {
            let target = compose_playlist(playlist, &feeds, &progress, &mut rng);
            apply_playlist(
                &client,
                &library.id,
                playlist,
                target,
                &remote_playlists,
                dry_run,
            )?;
        }
    }
    Ok(())
}

/// Runs the composition pipeline for one playlist: prepare each configured
/// feed in declaration order, group by tier, then order per the playlist's
/// directives.
fn compose_playlist<R: Rng>(
    playlist: &PlaylistConfig,
    feeds: &HashMap<&str, Vec<EpisodeCandidate>>,
    progress: &ProgressMap,
    rng: &mut R,
) -> Vec<EpisodeKey> {
    let mut prepared = Vec::new();
    for feed in &playlist.feeds {
        let Some(candidates) = feeds.get(feed.feed_name.as_str()) else {
            warn!(
                "feed {:?} in playlist {:?} has no matching podcast in the library, skipping",
                feed.feed_name, playlist.playlist_name
            );
            continue;
        };
        let episodes = prepare_feed(feed, playlist, candidates, progress);
        if episodes.is_empty() {
            debug!(
                "feed {:?} contributes nothing to playlist {:?}",
                feed.feed_name, playlist.playlist_name
            );
            continue;
        }
        prepared.push((feed.tier, episodes));
    }

    let tiers = group_by_tier(prepared);
    let directives = OrderDirectives::parse(&playlist.sort_order);
    order_episodes(tiers, &directives, rng)
}

fn apply_playlist(
    client: &AbsClient,
    library_id: &str,
    playlist: &PlaylistConfig,
    target: Vec<EpisodeKey>,
    remote_playlists: &[RemotePlaylist],
    dry_run: bool,
) -> Result<()> {
    let name = &playlist.playlist_name;
    match reconcile(name, target, remote_playlists) {
        ReconcileAction::Create { items } => {
            if dry_run {
                info!(
                    "dry-run: would create playlist {name:?} with {} episode(s)",
                    items.len()
                );
                return Ok(());
            }
            info!("creating playlist {name:?} with {} episode(s)", items.len());
            client.create_playlist(library_id, name, &items)
        }
        ReconcileAction::Converge {
            playlist_id,
            add,
            remove,
            order,
        } => {
            if dry_run {
                info!(
                    "dry-run: would modify playlist {name:?}: add {}, remove {}, set order of {} episode(s)",
                    add.len(),
                    remove.len(),
                    order.len()
                );
                return Ok(());
            }
            info!(
                "modifying playlist {name:?}: add {}, remove {}, {} episode(s) total",
                add.len(),
                remove.len(),
                order.len()
            );
            if !add.is_empty() {
                client.batch_add(&playlist_id, &add)?;
            }
            if !remove.is_empty() {
                client.batch_remove(&playlist_id, &remove)?;
            }
            let description = format!("Last update: {}", Local::now().format("%c"));
            client.update_playlist(&playlist_id, name, &description, &order)
        }
    }
}

fn run_validate(config: &Config) -> Result<()> {
    println!("server: {}", config.server.address);
    for library in &config.libraries {
        println!("library: {}", library.library_name);
        for playlist in &library.playlists {
            let directives = OrderDirectives::parse(&playlist.sort_order);
            println!(
                "  playlist: {} (in_progress: {}, finished: {}, order: {directives:?})",
                playlist.playlist_name, playlist.include_in_progress, playlist.include_finished
            );
            for token in OrderDirectives::unrecognized(&playlist.sort_order) {
                println!("    warning: sort_order token {token:?} is not recognized and will be ignored");
            }
            for feed in &playlist.feeds {
                println!(
                    "    feed: {} (sort: {}, count: {}, tier: {})",
                    feed.feed_name,
                    if feed.sort.is_empty() { "none" } else { feed.sort.as_str() },
                    feed.count,
                    feed.tier
                );
            }
        }
    }
    Ok(())
}
