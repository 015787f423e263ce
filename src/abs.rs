use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::debug;

use crate::app::episode::{EpisodeCandidate, EpisodeKey, Progress, ProgressMap};
use crate::app::reconcile::RemotePlaylist;
use crate::http::{RequestOptions, request_json_with_retries};

#[derive(Debug, Clone)]
pub(crate) struct Library {
    pub(crate) id: String,
    pub(crate) name: String,
}

#[derive(Debug, Clone)]
pub(crate) struct LibraryItem {
    pub(crate) id: String,
    pub(crate) title: String,
}

/// Authorized client for one Audiobookshelf server.
pub(crate) struct AbsClient {
    base_url: String,
    token: String,
    options: RequestOptions,
}

impl AbsClient {
    pub(crate) fn login(address: &str, username: &str, password: &str) -> Result<Self> {
        let base_url = address.trim_end_matches('/').to_string();
        let body = json!({ "username": username, "password": password });
        let response = request_json_with_retries(
            "POST",
            &format!("{base_url}/login"),
            None,
            Some(&body),
            &RequestOptions::default(),
        )
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("login to {base_url} failed"))?;

        let token = response
            .pointer("/user/token")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("login response carried no user token"))?
            .to_string();

        Ok(Self {
            base_url,
            token,
            options: RequestOptions::default(),
        })
    }

    fn get(&self, path: &str) -> Result<Value> {
        debug!("GET {path}");
        request_json_with_retries(
            "GET",
            &format!("{}{path}", self.base_url),
            Some(&self.token),
            None,
            &self.options,
        )
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("GET {path}"))
    }

    fn send(&self, method: &str, path: &str, body: Value) -> Result<Value> {
        debug!("{method} {path}");
        request_json_with_retries(
            method,
            &format!("{}{path}", self.base_url),
            Some(&self.token),
            Some(&body),
            &self.options,
        )
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("{method} {path}"))
    }

    pub(crate) fn libraries(&self) -> Result<Vec<Library>> {
        let response = self.get("/api/libraries")?;
        Ok(parse_libraries(&response))
    }

    pub(crate) fn library_items(&self, library_id: &str) -> Result<Vec<LibraryItem>> {
        let response = self.get(&format!("/api/libraries/{library_id}/items?limit=0"))?;
        Ok(parse_library_items(&response))
    }

    pub(crate) fn podcast_episodes(&self, item_id: &str) -> Result<Vec<EpisodeCandidate>> {
        let response = self.get(&format!("/api/items/{item_id}"))?;
        Ok(parse_podcast_episodes(&response, item_id))
    }

    /// The user's media progress across the whole server, one request. The
    /// composition stages read it as a pure map afterwards.
    pub(crate) fn progress_map(&self) -> Result<ProgressMap> {
        let response = self.get("/api/me")?;
        Ok(parse_progress_map(&response))
    }

    pub(crate) fn user_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        let response = self.get("/api/playlists")?;
        Ok(parse_playlists(&response))
    }

    pub(crate) fn create_playlist(
        &self,
        library_id: &str,
        name: &str,
        items: &[EpisodeKey],
    ) -> Result<()> {
        let body = json!({
            "libraryId": library_id,
            "name": name,
            "items": playlist_items_json(items),
        });
        self.send("POST", "/api/playlists", body)?;
        Ok(())
    }

    pub(crate) fn batch_add(&self, playlist_id: &str, items: &[EpisodeKey]) -> Result<()> {
        let body = json!({ "items": playlist_items_json(items) });
        self.send("POST", &format!("/api/playlists/{playlist_id}/batch/add"), body)?;
        Ok(())
    }

    pub(crate) fn batch_remove(&self, playlist_id: &str, items: &[EpisodeKey]) -> Result<()> {
        let body = json!({ "items": playlist_items_json(items) });
        self.send("POST", &format!("/api/playlists/{playlist_id}/batch/remove"), body)?;
        Ok(())
    }

    /// Always the last call per playlist: pins the final order and refreshes
    /// the description.
    pub(crate) fn update_playlist(
        &self,
        playlist_id: &str,
        name: &str,
        description: &str,
        items: &[EpisodeKey],
    ) -> Result<()> {
        let body = json!({
            "name": name,
            "description": description,
            "items": playlist_items_json(items),
        });
        self.send("PATCH", &format!("/api/playlists/{playlist_id}"), body)?;
        Ok(())
    }
}

fn playlist_items_json(items: &[EpisodeKey]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|key| {
                json!({
                    "libraryItemId": key.item_id,
                    "episodeId": key.episode_id,
                })
            })
            .collect(),
    )
}

fn parse_libraries(value: &Value) -> Vec<Library> {
    let Some(entries) = value.get("libraries").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?.trim();
            let name = entry.get("name")?.as_str()?.trim();
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some(Library {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

fn parse_library_items(value: &Value) -> Vec<LibraryItem> {
    let Some(entries) = value.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?.trim();
            let title = entry.pointer("/media/metadata/title")?.as_str()?.trim();
            if id.is_empty() || title.is_empty() {
                return None;
            }
            Some(LibraryItem {
                id: id.to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}

fn parse_podcast_episodes(value: &Value, item_id: &str) -> Vec<EpisodeCandidate> {
    let Some(entries) = value.pointer("/media/episodes").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let episode_id = entry.get("id")?.as_str()?.trim();
            if episode_id.is_empty() {
                return None;
            }
            let library_item_id = entry
                .get("libraryItemId")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .unwrap_or(item_id);
            Some(EpisodeCandidate {
                key: EpisodeKey::new(library_item_id, episode_id),
                published_at: entry.get("publishedAt").and_then(Value::as_i64),
            })
        })
        .collect()
}

fn parse_progress_map(value: &Value) -> ProgressMap {
    let mut map = ProgressMap::new();
    let Some(entries) = value.get("mediaProgress").and_then(Value::as_array) else {
        return map;
    };
    for entry in entries {
        // Book-level progress rows have no episodeId; only episode rows count.
        let Some(episode_id) = entry.get("episodeId").and_then(Value::as_str) else {
            continue;
        };
        let Some(item_id) = entry.get("libraryItemId").and_then(Value::as_str) else {
            continue;
        };
        let progress = Progress {
            fraction: entry.get("progress").and_then(Value::as_f64).unwrap_or(0.0),
            is_finished: entry
                .get("isFinished")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };
        map.insert(EpisodeKey::new(item_id, episode_id), progress);
    }
    map
}

fn parse_playlists(value: &Value) -> Vec<RemotePlaylist> {
    let Some(entries) = value.get("playlists").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?.trim();
            let name = entry.get("name")?.as_str()?;
            if id.is_empty() {
                return None;
            }
            let items = entry
                .get("items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| {
                            let episode_id = item.get("episodeId")?.as_str()?;
                            let item_id = item.pointer("/episode/libraryItemId")?.as_str()?;
                            Some(EpisodeKey::new(item_id, episode_id))
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(RemotePlaylist {
                id: id.to_string(),
                name: name.to_string(),
                items,
            })
        })
        .collect()
}
