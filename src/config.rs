use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub libraries: Vec<LibraryConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LibraryConfig {
    pub library_name: String,
    #[serde(default)]
    pub playlists: Vec<PlaylistConfig>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistConfig {
    pub playlist_name: String,
    #[serde(default)]
    pub include_in_progress: bool,
    #[serde(default)]
    pub include_finished: bool,
    #[serde(default)]
    pub sort_order: Vec<String>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    pub feed_name: String,
    #[serde(default)]
    pub sort: String,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub tier: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Oldest,
    Newest,
    Unsorted,
}

impl FeedConfig {
    pub fn sort_mode(&self) -> SortMode {
        match self.sort.trim().to_ascii_lowercase().as_str() {
            "oldest" => SortMode::Oldest,
            "newest" => SortMode::Newest,
            _ => SortMode::Unsorted,
        }
    }
}

/// Recognized `sort_order` tokens, reduced to flags. Anything unrecognized is
/// dropped; a list with no recognized token at all degrades to pure shuffle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderDirectives {
    pub tier: bool,
    pub roundrobin: bool,
    pub shuffle: bool,
}

impl OrderDirectives {
    pub fn parse(tokens: &[String]) -> Self {
        let mut directives = Self::default();
        for token in tokens {
            match token.trim().to_ascii_lowercase().as_str() {
                "tier" => directives.tier = true,
                "roundrobin" => directives.roundrobin = true,
                "shuffle" => directives.shuffle = true,
                other => warn!("ignoring unknown sort_order token {other:?}"),
            }
        }
        if !directives.tier && !directives.roundrobin && !directives.shuffle {
            directives.shuffle = true;
        }
        directives
    }

    /// Tokens from `tokens` that `parse` would drop.
    pub fn unrecognized(tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .filter(|token| {
                !matches!(
                    token.trim().to_ascii_lowercase().as_str(),
                    "tier" | "roundrobin" | "shuffle"
                )
            })
            .cloned()
            .collect()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// O(1) lookups over a loaded config, built once per run. Name matching is
/// exact; normalization only applies to remote playlist names.
pub struct ConfigIndex<'a> {
    libraries: HashMap<&'a str, &'a LibraryConfig>,
    feed_names: HashSet<&'a str>,
}

impl<'a> ConfigIndex<'a> {
    pub fn new(config: &'a Config) -> Self {
        let mut libraries = HashMap::new();
        let mut feed_names = HashSet::new();
        for library in &config.libraries {
            libraries.insert(library.library_name.as_str(), library);
            for playlist in &library.playlists {
                for feed in &playlist.feeds {
                    feed_names.insert(feed.feed_name.as_str());
                }
            }
        }
        Self {
            libraries,
            feed_names,
        }
    }

    pub fn library(&self, name: &str) -> Option<&'a LibraryConfig> {
        self.libraries.get(name).copied()
    }

    /// Every feed name configured anywhere in the file. Library items are
    /// matched against this set when deciding which podcasts to fetch.
    pub fn is_configured_feed(&self, title: &str) -> bool {
        self.feed_names.contains(title)
    }
}
