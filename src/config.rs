use crate::wait::{DelayRange, WaitConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Melon web front end
pub const DEFAULT_BASE_URL: &str = "https://www.melon.com";

/// Environment variable overriding [`DEFAULT_BASE_URL`]
pub const BASE_URL_ENV: &str = "MELON_BASE_URL";

/// How an artist's songs are harvested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Open each row's detail view in place from the index page, read it,
    /// then go back. Per-row failures are logged and skipped.
    #[default]
    Inline,
    /// Collect song ids from every index page, then load each detail page and
    /// query the live DOM.
    Dom,
    /// Collect song ids like [`Strategy::Dom`], then parse each detail page's
    /// rendered HTML once with `scraper`.
    Html,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Inline, Strategy::Dom, Strategy::Html];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Inline => "inline",
            Strategy::Dom => "dom",
            Strategy::Html => "html",
        }
    }

    /// Whether this strategy collects song ids and visits detail pages by URL
    pub fn uses_song_ids(&self) -> bool {
        !matches!(self, Strategy::Inline)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown strategy '{s}' (expected inline, dom or html)"))
    }
}

/// Configuration of one harvester.
///
/// # Examples
///
/// ```rust
/// use melon_lyrics::{HarvestConfig, Strategy};
///
/// let config = HarvestConfig {
///     strategy: Strategy::Html,
///     songs_per_page: Some(3),
///     ..HarvestConfig::default()
/// };
///
/// assert_eq!(
///     config.song_url("30244931"),
///     "https://www.melon.com/song/detail.htm?songId=30244931"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Portal root, without a trailing slash
    pub base_url: String,
    /// Traversal and extraction strategy
    pub strategy: Strategy,
    /// Cap on the rows read from each index page, for reduced test runs
    pub songs_per_page: Option<usize>,
    /// Timeouts for every wait on the page
    pub wait: WaitConfig,
    /// Randomized pause before each detail-page load
    pub delay: Option<DelayRange>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            strategy: Strategy::default(),
            songs_per_page: None,
            wait: WaitConfig::default(),
            delay: Some(DelayRange::new(
                Duration::from_millis(500),
                Duration::from_millis(1500),
            )),
        }
    }
}

impl HarvestConfig {
    /// Default configuration with the base URL taken from `MELON_BASE_URL`
    /// when it is set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            log::debug!("Using base URL from {BASE_URL_ENV}: {base_url}");
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config
    }

    /// URL of the first page of an artist's song index
    pub fn artist_url(&self, artist_id: &str) -> String {
        format!("{}/artist/song.htm?artistId={artist_id}", self.base_url)
    }

    /// URL of a song's detail page
    pub fn song_url(&self, song_id: &str) -> String {
        format!("{}/song/detail.htm?songId={song_id}", self.base_url)
    }
}
